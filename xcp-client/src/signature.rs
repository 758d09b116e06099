//! HMAC-SHA256 request signing
//!
//! The server verifies every request independently, so these functions must stay
//! byte-for-byte deterministic:
//!
//! ```text
//! canonical = METHOD \n PATH \n base64(sha256(body)) \n TIMESTAMP
//! signature = base64(hmac_sha256(secret, canonical))
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Default acceptance window for request timestamps (minutes)
pub const DEFAULT_TIMESTAMP_WINDOW_MINUTES: i64 = 5;

/// Base64-encoded SHA-256 of the request body. An empty body hashes the empty string.
pub fn hash_body(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

/// Build the canonical request string that gets signed
pub fn canonicalize(method: &str, path: &str, body_hash: &str, timestamp: &str) -> String {
    [method.to_uppercase().as_str(), path, body_hash, timestamp].join("\n")
}

/// Base64-encoded HMAC-SHA256 of `canonical` keyed with `secret`
pub fn sign(canonical: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(canonical.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Hash, canonicalize and sign in one step
pub fn sign_request(method: &str, path: &str, body: &[u8], timestamp: &str, secret: &str) -> String {
    let canonical = canonicalize(method, path, &hash_body(body), timestamp);
    sign(&canonical, secret)
}

/// Current time as RFC3339 UTC with millisecond precision (`2025-01-15T10:00:00.000Z`)
pub fn generate_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether `ts` lies within `window_minutes` of now (inclusive). Unparseable input is stale.
pub fn timestamp_is_fresh(ts: &str, window_minutes: i64) -> bool {
    timestamp_is_fresh_at(ts, window_minutes, Utc::now())
}

/// [`timestamp_is_fresh`] against an explicit clock reading
pub fn timestamp_is_fresh_at(ts: &str, window_minutes: i64, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(ts) {
        Ok(parsed) => {
            let diff_ms = now
                .signed_duration_since(parsed.with_timezone(&Utc))
                .num_milliseconds()
                .abs();
            diff_ms <= window_minutes.saturating_mul(60_000)
        }
        Err(_) => false,
    }
}
