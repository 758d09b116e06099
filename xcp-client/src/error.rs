//! Error types for the XCP client

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Client errors
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unloadable configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bearer token missing or inside the expiry buffer; raised without network I/O
    #[error("Access token is missing or expired. Call get_token() first.")]
    TokenExpired,

    /// Server answered with a non-2xx status
    #[error("HTTP {status} {code}: {message}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Error code from the response body, or `HTTP_<status>`
        code: String,
        /// Human readable message
        message: String,
        /// Server correlation id for support escalation
        correlation_id: Option<String>,
        /// Structured details
        details: Option<serde_json::Value>,
    },

    /// Request reached the network but no response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Request could not be constructed
    #[error("Request setup error: {0}")]
    RequestSetup(String),

    /// Response did not match the expected shape
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    /// Poller ran out of wall-clock time
    #[error("Remittance {transaction_id} polling timed out after {timeout_ms}ms (attempt {attempt})")]
    PollingTimeout {
        /// Transaction ID
        transaction_id: String,
        /// Attempt that would have run
        attempt: u32,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Poller ran out of attempts without a terminal state
    #[error("Remittance {transaction_id} did not complete after {attempts} attempts")]
    MaxAttemptsExceeded {
        /// Transaction ID
        transaction_id: String,
        /// Attempts performed
        attempts: u32,
    },

    /// Poller stopped by its cancellation token
    #[error("Remittance {transaction_id} polling cancelled")]
    PollingCancelled {
        /// Transaction ID
        transaction_id: String,
    },
}

impl Error {
    /// Whether the retry engine should try again by default.
    ///
    /// Only throttling (429), server errors (>= 500) and network failures qualify.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Error::Network(_) => true,
            _ => false,
        }
    }

    /// Wire-style error code
    pub fn code(&self) -> &str {
        match self {
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::TokenExpired => "TOKEN_EXPIRED",
            Error::HttpStatus { code, .. } => code,
            Error::Network(_) => "NETWORK_ERROR",
            Error::RequestSetup(_) => "REQUEST_SETUP_ERROR",
            Error::SchemaValidation(_) => "SCHEMA_VALIDATION_ERROR",
            Error::PollingTimeout { .. } => "POLLING_TIMEOUT",
            Error::MaxAttemptsExceeded { .. } => "MAX_ATTEMPTS_EXCEEDED",
            Error::PollingCancelled { .. } => "POLLING_CANCELLED",
        }
    }

    /// HTTP-equivalent status, when one applies
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            Error::TokenExpired => Some(401),
            Error::PollingTimeout { .. } | Error::MaxAttemptsExceeded { .. } => Some(408),
            _ => None,
        }
    }

    /// Correlation id supplied by the server, if any
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Error::HttpStatus { correlation_id, .. } => correlation_id.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::RequestSetup(format!("JSON serialization failed: {}", err))
    }
}
