//! XCP B2B API data model

//!
//! Request bodies are checked with [`Validate`] before sending; response bodies are checked
//! after decoding.

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

lazy_static::lazy_static! {
    static ref DATE_PATTERN: regex::Regex =
        regex::Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles");
}

/// Supported currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Swiss Franc
    CHF,
    /// Japanese Yen
    JPY,
    /// Canadian Dollar
    CAD,
    /// Australian Dollar
    AUD,
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
            Currency::JPY => "JPY",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
        };
        f.write_str(code)
    }
}

/// Monetary amount (JSON number on the wire)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Amount {
    /// Value, strictly positive
    #[serde(with = "rust_decimal::serde::float")]
    #[validate(custom(function = "positive_decimal"))]
    pub value: Decimal,
    /// Currency
    pub currency: Currency,
}

impl Amount {
    /// Create an amount
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }
}

fn positive_decimal(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("positive");
        err.message = Some(format!("must be positive, got {}", value).into());
        Err(err)
    }
}

/// Bank account of an ordering customer or beneficiary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    /// Holder name
    pub name: String,
    /// IBAN
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
    /// BIC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
    /// Domestic account number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    /// Routing number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_number: Option<String>,
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Token endpoint request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Account ID
    pub account_id: String,
    /// Correspondent bank ID
    pub correspondent_bank_id: String,
    /// Permission ID
    pub permission_id: String,
    /// Space separated scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Token endpoint response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TokenResponse {
    /// Bearer token
    #[validate(length(min = 1))]
    pub access_token: String,
    /// Always `Bearer`
    #[validate(custom(function = "bearer_token_type"))]
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    /// Permission the token was issued for
    #[serde(rename = "permissionId")]
    pub permission_id: String,
    /// Granted scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Issue time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
}

fn bearer_token_type(token_type: &str) -> std::result::Result<(), ValidationError> {
    if token_type == "Bearer" {
        Ok(())
    } else {
        let mut err = ValidationError::new("bearer");
        err.message = Some(format!("must be 'Bearer', got '{}'", token_type).into());
        Err(err)
    }
}

// ---------------------------------------------------------------------------
// Remittance
// ---------------------------------------------------------------------------

/// Direction of a remittance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemittanceType {
    /// Debit
    Debit,
    /// Credit
    Credit,
}

/// Who pays the charges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargeBearer {
    /// Shared between parties
    #[default]
    Shared,
    /// Ordering customer pays
    Our,
    /// Beneficiary pays
    Ben,
}

/// Remittance creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RemittanceRequest {
    /// User ID
    pub user_id: String,
    /// Destination account number
    pub destination_account_number: String,
    /// Amount
    #[validate(nested)]
    pub amount: Amount,
    /// Remitting bank name
    pub remittance_bank_name: String,
    /// Correspondent bank ID
    pub correspondent_bank_id: String,
    /// Bank ID
    pub bank_id: String,
    /// Debit or credit
    pub remittance_type: RemittanceType,
    /// Payment reference
    #[validate(length(min = 1))]
    pub reference: String,
    /// Purpose code (e.g. `GDDS`)
    pub purpose_code: String,
    /// Ordering customer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering_customer: Option<BankAccount>,
    /// Beneficiary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beneficiary: Option<BankAccount>,
    /// Charge bearer
    #[serde(default)]
    pub charge_bearer: ChargeBearer,
    /// Requested execution date (`YYYY-MM-DD`)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = *DATE_PATTERN))]
    pub execution_date: Option<String>,
    /// Urgent processing
    #[serde(default)]
    pub urgent: bool,
    /// Free text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
}

/// Remittance creation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RemittanceResponse {
    /// Transaction ID used for polling
    #[validate(length(min = 1))]
    pub transaction_id: String,
    /// Initial status as reported by the server
    pub status: String,
    /// Creation time
    pub created_at: String,
    /// Echoed reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Remittance lifecycle status
///
/// `CREATED -> PROCESSING -> {COMPLETED | REJECTED | FAILED | CANCELLED}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemittanceStatus {
    /// Accepted, not yet processing
    #[serde(alias = "PENDING")]
    Created,
    /// In flight
    Processing,
    /// Settled
    Completed,
    /// Rejected by the bank
    Rejected,
    /// Failed during processing
    Failed,
    /// Cancelled
    Cancelled,
}

impl RemittanceStatus {
    /// No further transition happens from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemittanceStatus::Completed
                | RemittanceStatus::Rejected
                | RemittanceStatus::Failed
                | RemittanceStatus::Cancelled
        )
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RemittanceStatus::Created => "CREATED",
            RemittanceStatus::Processing => "PROCESSING",
            RemittanceStatus::Completed => "COMPLETED",
            RemittanceStatus::Rejected => "REJECTED",
            RemittanceStatus::Failed => "FAILED",
            RemittanceStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for RemittanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fees charged on a remittance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fees {
    /// Total fee
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    /// Fee currency
    pub currency: String,
}

/// Remittance status detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RemittanceDetail {
    /// Transaction ID
    #[validate(length(min = 1))]
    pub transaction_id: String,
    /// Current status
    pub status: RemittanceStatus,
    /// Value date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_date: Option<String>,
    /// SWIFT MT103 reference once settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mt103_reference: Option<String>,
    /// Amount
    #[validate(nested)]
    pub amount: Amount,
    /// Fees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<Fees>,
    /// Completion time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Reason for REJECTED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Reason for FAILED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// Webhook event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEvent {
    /// Remittance completed
    #[serde(rename = "remittance.completed")]
    RemittanceCompleted,
    /// Remittance rejected
    #[serde(rename = "remittance.rejected")]
    RemittanceRejected,
    /// Remittance pending
    #[serde(rename = "remittance.pending")]
    RemittancePending,
    /// Remittance failed
    #[serde(rename = "remittance.failed")]
    RemittanceFailed,
    /// Remittance cancelled
    #[serde(rename = "remittance.cancelled")]
    RemittanceCancelled,
}

/// Backoff strategy for webhook redelivery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Linear
    Linear,
    /// Exponential
    #[default]
    Exponential,
}

/// Server-side redelivery policy for a webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRetryPolicy {
    /// Redelivery attempts (0..=10)
    #[validate(range(max = 10))]
    pub max_retries: u32,
    /// Backoff strategy
    pub backoff_strategy: BackoffStrategy,
    /// Delay ceiling (seconds)
    #[validate(range(min = 1))]
    pub max_delay_seconds: u32,
}

impl Default for WebhookRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_strategy: BackoffStrategy::Exponential,
            max_delay_seconds: 300,
        }
    }
}

/// Webhook registration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRegistration {
    /// Callback URL
    #[validate(url)]
    pub url: String,
    /// Subscribed events
    pub events: Vec<WebhookEvent>,
    /// Secret the server signs deliveries with
    pub hmac_secret: String,
    /// Redelivery policy
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub retry_policy: Option<WebhookRetryPolicy>,
    /// Active on registration
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Webhook state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookStatus {
    /// Delivering
    Active,
    /// Paused
    Inactive,
    /// Disabled after delivery failures
    Failed,
}

/// Webhook registration response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    /// Webhook ID
    pub webhook_id: String,
    /// State
    pub status: WebhookStatus,
    /// Registration time
    pub registered_at: String,
}

// ---------------------------------------------------------------------------
// Statements & balance
// ---------------------------------------------------------------------------

/// Statement output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementFormat {
    /// JSON
    #[default]
    Json,
    /// SWIFT MT940
    Mt940,
    /// CSV
    Csv,
}

/// Statement request for a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StatementRequest {
    /// First day (`YYYY-MM-DD`)
    #[validate(regex(path = *DATE_PATTERN))]
    pub from: String,
    /// Last day (`YYYY-MM-DD`)
    #[validate(regex(path = *DATE_PATTERN))]
    pub to: String,
    /// Output format
    #[serde(default)]
    pub format: StatementFormat,
}

/// Statement content as returned by the API
///
/// `JSON` statements are parsed; `MT940` and `CSV` statements are kept as text.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementBody {
    /// Parsed JSON statement
    Json(serde_json::Value),
    /// MT940 or CSV statement text
    Text(String),
}

impl StatementBody {
    /// Decode a 2xx statement body for the requested format
    pub fn decode(format: StatementFormat, body: &[u8]) -> Result<Self> {
        match format {
            StatementFormat::Json => serde_json::from_slice(body)
                .map(StatementBody::Json)
                .map_err(|e| Error::SchemaValidation(format!("Unexpected statement shape: {}", e))),
            StatementFormat::Mt940 | StatementFormat::Csv => String::from_utf8(body.to_vec())
                .map(StatementBody::Text)
                .map_err(|e| Error::SchemaValidation(format!("Statement is not UTF-8: {}", e))),
        }
    }

    /// Statement text, if not JSON
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StatementBody::Text(text) => Some(text),
            StatementBody::Json(_) => None,
        }
    }
}

/// Account balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// Account ID
    pub account_id: String,
    /// Ledger balance
    #[validate(nested)]
    pub balance: Amount,
    /// Available balance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub available_balance: Option<Amount>,
    /// Account currency
    pub currency: String,
    /// Last update time
    pub last_updated: String,
}


// ---------------------------------------------------------------------------
// Errors & options
// ---------------------------------------------------------------------------

/// Error body returned by the API on non-2xx responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Error code
    pub code: Option<String>,
    /// Message
    pub message: Option<String>,
    /// Correlation ID
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Structured details
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    /// Server time
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Per-call options for business operations
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Idempotency key to use instead of a generated one
    pub idempotency_key: Option<String>,
    /// Per-request timeout overriding the transport default
    pub timeout: Option<Duration>,
    /// Perform a single attempt only
    pub skip_retry: bool,
}

/// Run a request-side [`Validate`] check, mapping failures to [`Error::RequestSetup`]
pub(crate) fn validate_request<T: Validate>(value: &T) -> Result<()> {
    value
        .validate()
        .map_err(|e| Error::RequestSetup(format!("Invalid request: {}", e)))
}
