//! Client metrics

use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter,
};

lazy_static::lazy_static! {
    pub static ref XCP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "xcp_requests_total",
        "Physical XCP API requests",
        &["transport", "method", "outcome"]
    )
    .expect("xcp_requests_total registers once");

    pub static ref XCP_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "xcp_request_duration_seconds",
        "XCP API request duration",
        &["transport"]
    )
    .expect("xcp_request_duration_seconds registers once");

    pub static ref XCP_RETRIES_TOTAL: IntCounter = register_int_counter!(
        "xcp_retries_total",
        "Retries scheduled by the backoff engine"
    )
    .expect("xcp_retries_total registers once");

    pub static ref XCP_POLL_ATTEMPTS_TOTAL: CounterVec = register_counter_vec!(
        "xcp_poll_attempts_total",
        "Remittance poll attempts by observed status",
        &["status"]
    )
    .expect("xcp_poll_attempts_total registers once");
}
