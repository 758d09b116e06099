//! XCP client facade
//!
//! Owns the configuration, the token manager and the business transport. Every business
//! operation follows the same path:
//!
//! 1. snapshot the bearer token (fails fast with [`Error::TokenExpired`])
//! 2. describe the call once as a [`RequestSpec`]
//! 3. run signed attempts through the retry engine

use crate::config::Config;
use crate::poller::{self, PollOptions, RemittanceStatusSource};
use crate::retry::{with_retry, RetryPolicy};
use crate::tls::MtlsMaterial;
use crate::token::TokenManager;
use crate::transport::{encode_path, HttpTransport, RequestSpec};
use crate::types::*;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use validator::Validate;

/// Client for the XCP B2B API
pub struct XcpClient {
    config: Arc<Config>,
    tokens: TokenManager,
    business: HttpTransport,
    retry: RetryPolicy,
}

impl std::fmt::Debug for XcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XcpClient")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl XcpClient {
    /// Create a client with mTLS transports built from the configured certificates.
    ///
    /// Any configuration or certificate problem is reported here, before any request.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        if !config.base_url.starts_with("https://") {
            return Err(Error::Configuration(format!(
                "base_url must use https for mutual TLS, got '{}'",
                config.base_url
            )));
        }

        let material = MtlsMaterial::load(&config.tls)?;
        let token_http = material.build_client(config.timeouts.token_timeout())?;
        let business_http = material.build_client(config.timeouts.request_timeout())?;

        info!("XCP client initialized for {}", config.base_url);
        Self::with_http_clients(config, token_http, business_http)
    }

    /// Create a client over caller supplied HTTP clients.
    ///
    /// This is the injection seam for test doubles and custom HTTP stacks. The TLS policy
    /// (client identity, trusted roots, certificate validation) is whatever the supplied
    /// clients carry, and plain `http` base URLs are accepted. Use [`XcpClient::new`] for
    /// production traffic.
    ///
    /// Configured timeouts and the client `User-Agent` still apply to every request.
    pub fn with_http_clients(
        config: Config,
        token_http: reqwest::Client,
        business_http: reqwest::Client,
    ) -> Result<Self> {
        config.validate()?;
        if !config.base_url.starts_with("https://") {
            warn!(
                "XCP client using unencrypted base URL {}; mutual TLS is not enforced",
                config.base_url
            );
        }

        let token_transport = HttpTransport::new(
            "token",
            &config,
            token_http,
            config.timeouts.token_timeout(),
        );
        let business = HttpTransport::new(
            "business",
            &config,
            business_http,
            config.timeouts.request_timeout(),
        );
        let tokens = TokenManager::new(token_transport, config.api_key.clone(), config.retry.clone());

        Ok(Self {
            retry: config.retry.clone(),
            config: Arc::new(config),
            tokens,
            business,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token manager
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Token request for the configured account, bank and permission
    pub fn token_request(&self, scope: Option<&str>) -> TokenRequest {
        TokenRequest {
            account_id: self.config.account_id.clone(),
            correspondent_bank_id: self.config.bank_id.clone(),
            permission_id: self.config.permission_id.clone(),
            scope: scope.map(str::to_string),
        }
    }

    // -----------------------------------------------------------------------
    // Token
    // -----------------------------------------------------------------------

    /// Obtain and store an access token
    pub async fn get_token(&self, request: &TokenRequest) -> Result<TokenResponse> {
        self.tokens.get_token(request).await
    }

    /// Install an externally obtained token
    pub async fn set_access_token(&self, token: impl Into<String>, expires_in_secs: u64) {
        self.tokens.set_access_token(token, expires_in_secs).await
    }

    /// Whether the token is missing or within `buffer_secs` of expiry
    pub async fn is_token_expired(&self, buffer_secs: i64) -> bool {
        self.tokens.is_expired(buffer_secs).await
    }

    /// Whether a usable token is held
    pub async fn has_valid_token(&self) -> bool {
        self.tokens.has_valid_token().await
    }

    // -----------------------------------------------------------------------
    // Remittances
    // -----------------------------------------------------------------------

    /// Create a remittance
    pub async fn create_remittance(
        &self,
        request: &RemittanceRequest,
        options: &RequestOptions,
    ) -> Result<RemittanceResponse> {
        let token = self.tokens.ensure_valid().await?;
        validate_request(request)?;

        let spec = RequestSpec::post_json("/remittance", request)?
            .with_idempotency_key(options.idempotency_key.clone())
            .with_timeout(options.timeout);
        let policy = if options.skip_retry {
            self.retry.no_retry()
        } else {
            self.retry.clone()
        };

        info!(
            "Creating remittance {} ({} {}, idempotency key {})",
            request.reference, request.amount.value, request.amount.currency, spec.idempotency_key
        );

        match self.send::<RemittanceResponse>(&spec, &token, &policy).await {
            Ok(response) => {
                info!(
                    "Remittance created: {} (status {})",
                    response.transaction_id, response.status
                );
                Ok(response)
            }
            Err(e) => {
                error!("Failed to create remittance {}: {}", request.reference, e);
                Err(e)
            }
        }
    }

    /// Current detail of a remittance
    pub async fn get_remittance(&self, transaction_id: &str) -> Result<RemittanceDetail> {
        let token = self.tokens.ensure_valid().await?;
        let spec = RequestSpec::get(encode_path(&["remittance", transaction_id])?);

        let detail: RemittanceDetail = self
            .send(&spec, &token, &self.retry)
            .await
            .map_err(|e| {
                error!("Failed to get remittance {}: {}", transaction_id, e);
                e
            })?;
        info!("Remittance {} status: {}", transaction_id, detail.status);
        Ok(detail)
    }

    /// Poll a remittance until it reaches a terminal status
    pub async fn wait_for_remittance_completion(
        &self,
        transaction_id: &str,
        options: &PollOptions,
    ) -> Result<RemittanceDetail> {
        poller::wait_for_completion(self, transaction_id, options).await
    }

    /// [`Self::wait_for_remittance_completion`] that also stops when `cancel` fires
    pub async fn wait_for_remittance_completion_with_cancel(
        &self,
        transaction_id: &str,
        options: &PollOptions,
        cancel: &CancellationToken,
    ) -> Result<RemittanceDetail> {
        poller::wait_for_completion_with_cancel(self, transaction_id, options, cancel).await
    }

    // -----------------------------------------------------------------------
    // Webhooks, balance, statements
    // -----------------------------------------------------------------------

    /// Register a webhook
    pub async fn register_webhook(&self, registration: &WebhookRegistration) -> Result<WebhookResponse> {
        let token = self.tokens.ensure_valid().await?;
        validate_request(registration)?;

        let spec = RequestSpec::post_json("/webhooks", registration)?;
        let response: WebhookResponse = self.send(&spec, &token, &self.retry).await.map_err(|e| {
            error!("Failed to register webhook {}: {}", registration.url, e);
            e
        })?;
        info!("Webhook registered: {} ({:?})", response.webhook_id, response.status);
        Ok(response)
    }

    /// Balance of an account
    pub async fn get_account_balance(&self, account_id: &str) -> Result<BalanceResponse> {
        let token = self.tokens.ensure_valid().await?;
        let spec = RequestSpec::get(encode_path(&["accounts", account_id, "balance"])?);

        self.send(&spec, &token, &self.retry).await.map_err(|e| {
            error!("Failed to get balance for {}: {}", account_id, e);
            e
        })
    }

    /// Account statement for a date range.
    ///
    /// `JSON` statements are parsed; `MT940` and `CSV` statements come back as text.
    pub async fn get_statements(&self, request: &StatementRequest) -> Result<StatementBody> {
        let token = self.tokens.ensure_valid().await?;
        validate_request(request)?;

        let spec = RequestSpec::post_json("/statements", request)?;
        let business = &self.business;
        let spec = &spec;
        let token = token.as_str();

        with_retry(&self.retry, || business.execute(spec, Some(token)))
            .await
            .and_then(|body| StatementBody::decode(request.format, &body))
            .map_err(|e| {
                error!(
                    "Failed to get statements {}..{}: {}",
                    request.from, request.to, e
                );
                e
            })
    }

    async fn send<T>(&self, spec: &RequestSpec, token: &str, policy: &RetryPolicy) -> Result<T>
    where
        T: DeserializeOwned + Validate,
    {
        let business = &self.business;
        with_retry(policy, || business.execute_json(spec, Some(token))).await
    }
}

#[async_trait]
impl RemittanceStatusSource for XcpClient {
    async fn fetch_remittance(&self, transaction_id: &str) -> Result<RemittanceDetail> {
        self.get_remittance(transaction_id).await
    }
}
