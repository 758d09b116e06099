//! Bearer token lifecycle
//!
//! The credential lives in a `RwLock` cell: any number of business calls may read it
//! concurrently, while acquisitions are serialized behind a separate refresh mutex so
//! two callers never interleave token writes. Nothing here refreshes implicitly; an
//! expired token makes [`TokenManager::ensure_valid`] fail without touching the network.

use crate::config::mask_secret;
use crate::retry::{with_retry, RetryPolicy};
use crate::transport::{HttpTransport, RequestSpec};
use crate::types::{TokenRequest, TokenResponse};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

/// Token endpoint path
pub const TOKEN_PATH: &str = "/api-keys/token";

/// Default safety margin before expiry (seconds)
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 60;

/// Longest lifetime honoured for a token (100 years)
const MAX_LIFETIME_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// A bearer token and its absolute expiry
#[derive(Clone)]
pub struct Credential {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &mask_secret(&self.access_token, 12))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    /// Credential valid for `expires_in_secs` from `now`
    pub fn new(access_token: impl Into<String>, expires_in_secs: u64, now: DateTime<Utc>) -> Self {
        let secs = i64::try_from(expires_in_secs)
            .unwrap_or(MAX_LIFETIME_SECS)
            .min(MAX_LIFETIME_SECS);
        let lifetime = Duration::seconds(secs);
        Self {
            access_token: access_token.into(),
            expires_at: now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Bearer token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Absolute expiry
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// `now >= expires_at - buffer`.
    ///
    /// A buffer too large to represent reaches past any instant: positive means expired,
    /// negative means not expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer_secs: i64) -> bool {
        match Duration::try_seconds(buffer_secs)
            .and_then(|buffer| self.expires_at.checked_sub_signed(buffer))
        {
            Some(threshold) => now >= threshold,
            None => buffer_secs > 0,
        }
    }
}

/// Owns the bearer credential of one client
pub struct TokenManager {
    transport: HttpTransport,
    api_key: String,
    retry: RetryPolicy,
    credential: RwLock<Option<Credential>>,
    refresh: Mutex<()>,
}

impl TokenManager {
    /// Create a manager with no credential
    pub fn new(transport: HttpTransport, api_key: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            retry,
            credential: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Acquire a token from the token endpoint using the static API key.
    ///
    /// The validated response is stored as the current credential and returned.
    pub async fn get_token(&self, request: &TokenRequest) -> Result<TokenResponse> {
        let _writer = self.refresh.lock().await;
        info!("Requesting access token for permission {}", request.permission_id);

        let spec = RequestSpec::post_json(TOKEN_PATH, request)?;
        let transport = &self.transport;
        let spec = &spec;
        let api_key = self.api_key.as_str();

        let response: TokenResponse =
            match with_retry(&self.retry, || transport.execute_json(spec, Some(api_key))).await {
                Ok(response) => response,
                Err(e) => {
                    error!("Failed to obtain token: {}", e);
                    return Err(e);
                }
            };

        self.store(Credential::new(
            response.access_token.clone(),
            response.expires_in,
            Utc::now(),
        ))
        .await;

        info!(
            "Token obtained for permission {} (expires in {}s, scope {:?})",
            response.permission_id, response.expires_in, response.scope
        );
        Ok(response)
    }

    /// Install a token obtained elsewhere
    pub async fn set_access_token(&self, token: impl Into<String>, expires_in_secs: u64) {
        let _writer = self.refresh.lock().await;
        self.store(Credential::new(token, expires_in_secs, Utc::now()))
            .await;
    }

    async fn store(&self, credential: Credential) {
        info!(
            "Access token set ({}, expires at {})",
            mask_secret(credential.access_token(), 12),
            credential.expires_at().to_rfc3339()
        );
        *self.credential.write().await = Some(credential);
    }

    /// Snapshot of the current credential
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    /// Whether the token is missing or within `buffer_secs` of expiry
    pub async fn is_expired(&self, buffer_secs: i64) -> bool {
        match self.credential.read().await.as_ref() {
            Some(credential) => credential.is_expired_at(Utc::now(), buffer_secs),
            None => true,
        }
    }

    /// Current bearer token, or [`Error::TokenExpired`] with no network I/O
    pub async fn ensure_valid(&self) -> Result<String> {
        let guard = self.credential.read().await;
        match guard.as_ref() {
            Some(credential)
                if !credential.is_expired_at(Utc::now(), DEFAULT_EXPIRY_BUFFER_SECS) =>
            {
                Ok(credential.access_token().to_string())
            }
            _ => Err(Error::TokenExpired),
        }
    }

    /// A valid token is held
    pub async fn has_valid_token(&self) -> bool {
        self.ensure_valid().await.is_ok()
    }
}
