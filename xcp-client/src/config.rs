//! Configuration for the XCP client

use crate::retry::RetryPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration
///
/// Built once, validated, then shared read-only by every component of a client.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the XCP B2B API
    pub base_url: String,

    /// API key for the token endpoint
    pub api_key: String,

    /// Secret for HMAC request signing
    pub api_secret: String,

    /// Account ID
    pub account_id: String,

    /// Account holder ID (sent as `X-ACCOUNT-HOLDER-ID`)
    pub account_holder_id: String,

    /// Bank / correspondent bank ID
    pub bank_id: String,

    /// Permission ID for token requests
    pub permission_id: String,

    /// mTLS certificate locations
    pub tls: TlsPaths,

    /// Timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// mTLS certificate locations (PEM)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsPaths {
    /// Client certificate
    pub client_cert_path: PathBuf,

    /// Client private key
    pub client_key_path: PathBuf,

    /// CA certificate chain
    pub ca_cert_path: PathBuf,
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Token endpoint timeout (milliseconds)
    pub token_timeout_ms: u64,

    /// Business endpoint timeout (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            token_timeout_ms: 30_000,
            request_timeout_ms: 60_000,
        }
    }
}

impl TimeoutConfig {
    /// Token endpoint timeout
    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.token_timeout_ms)
    }

    /// Business endpoint timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_key", &mask_secret(&self.api_key, 4))
            .field("api_secret", &"***")
            .field("account_id", &self.account_id)
            .field("account_holder_id", &self.account_holder_id)
            .field("bank_id", &self.bank_id)
            .field("permission_id", &self.permission_id)
            .field("tls", &self.tls)
            .field("timeouts", &self.timeouts)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `XCP_*` environment variables (a `.env` file is honoured)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup using the `XCP_*` variable names
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();

        let mut required = |key: &str| -> String {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => value,
                _ => {
                    problems.push(format!("{}: required", key));
                    String::new()
                }
            }
        };

        let base_url = required("XCP_BASE_URL");
        let api_key = required("XCP_API_KEY");
        let api_secret = required("XCP_API_SECRET");
        let account_id = required("XCP_ACCOUNT_ID");
        let account_holder_id = required("XCP_ACCOUNT_HOLDER_ID");
        let bank_id = required("XCP_BANK_ID");
        let permission_id = required("XCP_PERMISSION_ID");
        let client_cert_path = required("XCP_CLIENT_CERT_PATH");
        let client_key_path = required("XCP_CLIENT_KEY_PATH");
        let ca_cert_path = required("XCP_CA_CERT_PATH");

        let timeout_defaults = TimeoutConfig::default();
        let retry_defaults = RetryPolicy::default();

        let token_timeout_ms = parse_or(
            &lookup,
            "XCP_TOKEN_TIMEOUT_MS",
            timeout_defaults.token_timeout_ms,
            &mut problems,
        );
        let request_timeout_ms = parse_or(
            &lookup,
            "XCP_REQUEST_TIMEOUT_MS",
            timeout_defaults.request_timeout_ms,
            &mut problems,
        );
        let max_retries = parse_or(
            &lookup,
            "XCP_MAX_RETRIES",
            retry_defaults.max_retries,
            &mut problems,
        );
        let initial_delay_ms = parse_or(
            &lookup,
            "XCP_RETRY_DELAY_MS",
            retry_defaults.initial_delay_ms,
            &mut problems,
        );

        if !problems.is_empty() {
            return Err(Error::Configuration(problems.join("; ")));
        }

        let config = Config {
            base_url,
            api_key,
            api_secret,
            account_id,
            account_holder_id,
            bank_id,
            permission_id,
            tls: TlsPaths {
                client_cert_path: PathBuf::from(client_cert_path),
                client_key_path: PathBuf::from(client_key_path),
                ca_cert_path: PathBuf::from(ca_cert_path),
            },
            timeouts: TimeoutConfig {
                token_timeout_ms,
                request_timeout_ms,
            },
            retry: RetryPolicy {
                max_retries,
                initial_delay_ms,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every field, reporting all problems at once
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        match reqwest::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => problems.push(format!("base_url: unsupported scheme '{}'", url.scheme())),
            Err(e) => problems.push(format!("base_url: {}", e)),
        }

        let required = [
            ("api_key", &self.api_key),
            ("api_secret", &self.api_secret),
            ("account_id", &self.account_id),
            ("account_holder_id", &self.account_holder_id),
            ("bank_id", &self.bank_id),
            ("permission_id", &self.permission_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{}: must not be empty", name));
            }
        }

        let paths = [
            ("tls.client_cert_path", &self.tls.client_cert_path),
            ("tls.client_key_path", &self.tls.client_key_path),
            ("tls.ca_cert_path", &self.tls.ca_cert_path),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                problems.push(format!("{}: must not be empty", name));
            }
        }

        if self.timeouts.token_timeout_ms == 0 {
            problems.push("timeouts.token_timeout_ms: must be positive".to_string());
        }
        if self.timeouts.request_timeout_ms == 0 {
            problems.push("timeouts.request_timeout_ms: must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(problems.join("; ")))
        }
    }

    /// Absolute URL for an API path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T, problems: &mut Vec<String>) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                problems.push(format!("{}: {}", key, e));
                default
            }
        },
        _ => default,
    }
}

/// Mask a secret for logging: `abcd...wxyz`, or `***` when too short to reveal anything
pub fn mask_secret(value: &str, visible_chars: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible_chars * 2 {
        return "***".to_string();
    }
    let head: String = chars[..visible_chars].iter().collect();
    let tail: String = chars[chars.len() - visible_chars..].iter().collect();
    format!("{}...{}", head, tail)
}
