//! Signed HTTP transport
//!
//! A logical call is described once by a [`RequestSpec`] (method, path, serialized body,
//! idempotency key). Every physical attempt turns that spec into a [`SignedRequest`]
//! through [`build_signed_request`] with a fresh timestamp, so the idempotency key is
//! stable across retries while the timestamp and signature are not.

use crate::config::{mask_secret, Config};
use crate::metrics::{XCP_REQUESTS_TOTAL, XCP_REQUEST_DURATION};
use crate::signature::{generate_timestamp, sign_request};
use crate::tls::USER_AGENT;
use crate::types::ErrorPayload;
use crate::{Error, Result};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE,
    USER_AGENT as USER_AGENT_HEADER,
};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

/// Account holder header
pub const HEADER_ACCOUNT_HOLDER_ID: &str = "x-account-holder-id";
/// Idempotency header
pub const HEADER_IDEMPOTENCY_KEY: &str = "idempotency-key";
/// Request timestamp header
pub const HEADER_REQUEST_TIMESTAMP: &str = "x-request-timestamp";
/// Request signature header
pub const HEADER_REQUEST_SIGNATURE: &str = "x-request-signature";

/// Percent-encode `segments` into an absolute API path.
///
/// The result is what goes on the wire, so it is also what gets signed.
pub fn encode_path<S: AsRef<str>>(segments: &[S]) -> Result<String> {
    let mut url = Url::parse("http://xcp.invalid/")
        .map_err(|e| Error::RequestSetup(format!("Failed to build request path: {}", e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::RequestSetup("Failed to build request path".to_string()))?;
        path.clear();
        for segment in segments {
            path.push(segment.as_ref());
        }
    }
    Ok(url.path().to_string())
}

/// One logical API call, shared by all of its attempts
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL, starting with `/`
    pub path: String,
    /// Serialized body; empty for bodiless requests
    pub body: Vec<u8>,
    /// Idempotency key reused verbatim on every attempt
    pub idempotency_key: String,
    /// Overrides the transport timeout
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    /// Bodiless request with a freshly generated idempotency key
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self {
            method,
            path,
            body: Vec::new(),
            idempotency_key: Uuid::new_v4().to_string(),
            timeout: None,
        }
    }

    /// GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request with a JSON body serialized once, here
    pub fn post_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self> {
        let mut spec = Self::new(Method::POST, path);
        spec.body = serde_json::to_vec(body)?;
        Ok(spec)
    }

    /// Replace the generated idempotency key with a caller supplied one
    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key {
            self.idempotency_key = key;
        }
        self
    }

    /// Per-request timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A fully formed request for one physical attempt
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL
    pub path: String,
    /// Body bytes that were signed
    pub body: Vec<u8>,
    /// All headers, security headers included
    pub headers: HeaderMap,
    /// Timestamp bound into the signature
    pub timestamp: String,
    /// Base64 HMAC signature
    pub signature: String,
}

/// Build the request for one attempt. Pure: same inputs give the same request.
pub fn build_signed_request(
    spec: &RequestSpec,
    bearer: Option<&str>,
    account_holder_id: &str,
    secret: &str,
    timestamp: String,
) -> Result<SignedRequest> {
    let signature = sign_request(spec.method.as_str(), &spec.path, &spec.body, &timestamp, secret);

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));
    if let Some(token) = bearer {
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
    }
    headers.insert(
        HeaderName::from_static(HEADER_ACCOUNT_HOLDER_ID),
        header_value(account_holder_id)?,
    );
    headers.insert(
        HeaderName::from_static(HEADER_IDEMPOTENCY_KEY),
        header_value(&spec.idempotency_key)?,
    );
    headers.insert(
        HeaderName::from_static(HEADER_REQUEST_TIMESTAMP),
        header_value(&timestamp)?,
    );
    headers.insert(
        HeaderName::from_static(HEADER_REQUEST_SIGNATURE),
        header_value(&signature)?,
    );

    Ok(SignedRequest {
        method: spec.method.clone(),
        path: spec.path.clone(),
        body: spec.body.clone(),
        headers,
        timestamp,
        signature,
    })
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::RequestSetup(format!("Invalid header value: {}", e)))
}

/// HTTP transport for one family of endpoints (token or business)
#[derive(Debug, Clone)]
pub struct HttpTransport {
    name: &'static str,
    base_url: String,
    account_holder_id: String,
    api_secret: String,
    timeout: Duration,
    http: Client,
}

impl HttpTransport {
    /// Create a transport over an already configured HTTP client.
    ///
    /// `timeout` applies to every request whose [`RequestSpec`] does not override it.
    pub fn new(name: &'static str, config: &Config, http: Client, timeout: Duration) -> Self {
        Self {
            name,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_holder_id: config.account_holder_id.clone(),
            api_secret: config.api_secret.clone(),
            timeout,
            http,
        }
    }

    /// Transport name used in logs and metrics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Default per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform exactly one attempt and return the raw 2xx body
    pub async fn execute(&self, spec: &RequestSpec, bearer: Option<&str>) -> Result<Vec<u8>> {
        let request = build_signed_request(
            spec,
            bearer,
            &self.account_holder_id,
            &self.api_secret,
            generate_timestamp(),
        )?;

        debug!(
            transport = self.name,
            method = %request.method,
            path = %request.path,
            timestamp = %request.timestamp,
            idempotency_key = %spec.idempotency_key,
            signature = %mask_secret(&request.signature, 8),
            "Sending signed request"
        );

        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .headers(request.headers)
            .timeout(spec.timeout.unwrap_or(self.timeout));
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let start = Instant::now();
        let result = builder.send().await;
        XCP_REQUEST_DURATION
            .with_label_values(&[self.name])
            .observe(start.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.record(&request.method, "network_error");
                return Err(classify_send_error(e));
            }
        };

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            self.record(&request.method, "network_error");
            Error::Network(format!("Failed to read response body: {}", e))
        })?;

        if status.is_success() {
            self.record(&request.method, "success");
            Ok(body.to_vec())
        } else {
            self.record(&request.method, "http_error");
            Err(http_status_error(status, &body))
        }
    }

    /// Perform one attempt and decode + validate a JSON response
    pub async fn execute_json<T>(&self, spec: &RequestSpec, bearer: Option<&str>) -> Result<T>
    where
        T: DeserializeOwned + Validate,
    {
        let body = self.execute(spec, bearer).await?;
        decode_response(&body)
    }

    fn record(&self, method: &Method, outcome: &str) {
        XCP_REQUESTS_TOTAL
            .with_label_values(&[self.name, method.as_str(), outcome])
            .inc();
    }
}

/// Decode a 2xx body; shape mismatches are schema errors, never transport errors
pub fn decode_response<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_slice(body)
        .map_err(|e| Error::SchemaValidation(format!("Unexpected response shape: {}", e)))?;
    value
        .validate()
        .map_err(|e| Error::SchemaValidation(format!("Invalid response: {}", e)))?;
    Ok(value)
}

fn classify_send_error(err: reqwest::Error) -> Error {
    if err.is_builder() {
        Error::RequestSetup(err.to_string())
    } else {
        Error::Network(format!("No response received from server: {}", err))
    }
}

/// Build an [`Error::HttpStatus`] from a non-2xx response body
pub fn http_status_error(status: reqwest::StatusCode, body: &[u8]) -> Error {
    let payload = serde_json::from_slice::<ErrorPayload>(body).ok();
    let fallback_message = || {
        let text = String::from_utf8_lossy(body).trim().to_string();
        if text.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        } else {
            text
        }
    };

    match payload {
        Some(payload) => Error::HttpStatus {
            status: status.as_u16(),
            code: payload
                .code
                .unwrap_or_else(|| format!("HTTP_{}", status.as_u16())),
            message: payload.message.unwrap_or_else(fallback_message),
            correlation_id: payload.correlation_id,
            details: payload.details,
        },
        None => Error::HttpStatus {
            status: status.as_u16(),
            code: format!("HTTP_{}", status.as_u16()),
            message: fallback_message(),
            correlation_id: None,
            details: None,
        },
    }
}
