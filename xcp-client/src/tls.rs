//! Mutual TLS material for the XCP transports
//!
//! Loads the client certificate, private key and CA chain once, then builds any number
//! of `reqwest` clients that:
//! - present the client identity
//! - trust only the configured CA chain
//! - refuse anything below TLS 1.2

use crate::config::TlsPaths;
use crate::{Error, Result};
use reqwest::tls::Version;
use reqwest::{Certificate, Client, Identity};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// User agent sent on every request
pub const USER_AGENT: &str = concat!("XCP-B2B-Client/", env!("CARGO_PKG_VERSION"));

/// Loaded certificate material
#[derive(Clone)]
pub struct MtlsMaterial {
    identity: Identity,
    ca_chain: Vec<Certificate>,
}

impl std::fmt::Debug for MtlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MtlsMaterial")
            .field("ca_certificates", &self.ca_chain.len())
            .finish_non_exhaustive()
    }
}

impl MtlsMaterial {
    /// Read and parse all three PEM files; any failure is a configuration error
    pub fn load(paths: &TlsPaths) -> Result<Self> {
        let cert_pem = read_pem(&paths.client_cert_path)?;
        let key_pem = read_pem(&paths.client_key_path)?;
        let ca_pem = read_pem(&paths.ca_cert_path)?;

        let mut identity_pem = cert_pem;
        if !identity_pem.ends_with(b"\n") {
            identity_pem.push(b'\n');
        }
        identity_pem.extend_from_slice(&key_pem);

        let identity = Identity::from_pem(&identity_pem).map_err(|e| {
            Error::Configuration(format!("Invalid client certificate or private key: {}", e))
        })?;

        let ca_chain = Certificate::from_pem_bundle(&ca_pem)
            .map_err(|e| Error::Configuration(format!("Invalid CA certificate chain: {}", e)))?;

        if ca_chain.is_empty() {
            return Err(Error::Configuration(format!(
                "No CA certificates found in {}",
                paths.ca_cert_path.display()
            )));
        }

        info!(
            "Loaded mTLS material ({} CA certificate(s))",
            ca_chain.len()
        );

        Ok(Self { identity, ca_chain })
    }

    /// Build an HTTP client bound to this identity
    pub fn build_client(&self, timeout: Duration) -> Result<Client> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .identity(self.identity.clone())
            .tls_built_in_root_certs(false)
            .min_tls_version(Version::TLS_1_2)
            .timeout(timeout)
            .user_agent(USER_AGENT);

        for cert in &self.ca_chain {
            builder = builder.add_root_certificate(cert.clone());
        }

        builder
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build mTLS client: {}", e)))
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        Error::Configuration(format!(
            "Failed to load mTLS certificate {}: {}",
            path.display(),
            e
        ))
    })
}
