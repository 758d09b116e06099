//! # XCP B2B Client
//!
//! Client for the XCP B2B banking API:
//! - mutual TLS with a dedicated CA chain
//! - HMAC-SHA256 request signing with per-attempt timestamps
//! - bearer token lifecycle with fail-fast expiry
//! - exponential backoff with jitter on 429 / 5xx / network failures
//! - remittance completion polling
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     XcpClient                        │
//! └───────┬──────────────────┬───────────────────┬───────┘
//!         │                  │                   │
//! ┌───────▼──────┐   ┌───────▼───────┐   ┌───────▼───────┐
//! │ TokenManager │   │  Retry engine │   │    Poller     │
//! └───────┬──────┘   └───────┬───────┘   └───────────────┘
//!         │                  │
//! ┌───────▼──────────────────▼───────────────────────────┐
//! │   HttpTransport (signature + headers per attempt)    │
//! └───────────────────────────┬──────────────────────────┘
//!                             │
//! ┌───────────────────────────▼──────────────────────────┐
//! │              reqwest + rustls (mTLS)                 │
//! └──────────────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod client;
pub mod config;
pub mod error;
#[allow(missing_docs)]
pub mod metrics;
pub mod poller;
pub mod retry;
pub mod signature;
pub mod tls;
pub mod token;
pub mod transport;
pub mod types;

pub use client::XcpClient;
pub use config::{Config, TimeoutConfig, TlsPaths};
pub use error::{Error, Result};
pub use poller::{PollOptions, RemittanceStatusSource};
pub use retry::RetryPolicy;
pub use types::*;
pub use validator::Validate;
