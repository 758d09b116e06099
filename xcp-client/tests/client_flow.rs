//! End-to-end client behaviour against a wiremock server

use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};
use xcp_client::signature::sign_request;
use xcp_client::transport::{
    HEADER_ACCOUNT_HOLDER_ID, HEADER_IDEMPOTENCY_KEY, HEADER_REQUEST_SIGNATURE,
    HEADER_REQUEST_TIMESTAMP,
};
use xcp_client::tls::USER_AGENT;
use xcp_client::{
    Amount, Config, Currency, Error, PollOptions, RemittanceRequest, RemittanceStatus,
    RemittanceType, RequestOptions, RetryPolicy, StatementBody, StatementFormat,
    StatementRequest, TimeoutConfig, TlsPaths, XcpClient,
};

const SECRET: &str = "test-secret";

fn config(base_url: &str, max_retries: u32) -> Config {
    Config {
        base_url: base_url.to_string(),
        api_key: "api-key".to_string(),
        api_secret: SECRET.to_string(),
        account_id: "acc_123".to_string(),
        account_holder_id: "holder_1".to_string(),
        bank_id: "bank_abc".to_string(),
        permission_id: "perm_remit".to_string(),
        tls: TlsPaths {
            client_cert_path: PathBuf::from("client.crt"),
            client_key_path: PathBuf::from("client.key"),
            ca_cert_path: PathBuf::from("ca.crt"),
        },
        timeouts: TimeoutConfig {
            token_timeout_ms: 5_000,
            request_timeout_ms: 5_000,
        },
        retry: RetryPolicy {
            max_retries,
            initial_delay_ms: 10,
        },
    }
}

fn client(base_url: &str, max_retries: u32) -> XcpClient {
    XcpClient::with_http_clients(
        config(base_url, max_retries),
        reqwest::Client::new(),
        reqwest::Client::new(),
    )
    .unwrap()
}

async fn authorized_client(server: &MockServer, max_retries: u32) -> XcpClient {
    let client = client(&server.uri(), max_retries);
    client.set_access_token("jwt-token", 3600).await;
    client
}

fn header_str<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
}

fn assert_signed(request: &Request) {
    let expected = sign_request(
        request.method.as_str(),
        request.url.path(),
        &request.body,
        header_str(request, HEADER_REQUEST_TIMESTAMP),
        SECRET,
    );
    assert_eq!(header_str(request, HEADER_REQUEST_SIGNATURE), expected);
    assert_eq!(header_str(request, HEADER_ACCOUNT_HOLDER_ID), "holder_1");
    assert_eq!(header_str(request, "user-agent"), USER_AGENT);
}

fn remittance_request() -> RemittanceRequest {
    RemittanceRequest {
        user_id: "user_001".to_string(),
        destination_account_number: "acc_456".to_string(),
        amount: Amount::new(rust_decimal::Decimal::new(100_000, 2), Currency::USD),
        remittance_bank_name: "Your Bank".to_string(),
        correspondent_bank_id: "bank_abc".to_string(),
        bank_id: "xcp_main".to_string(),
        remittance_type: RemittanceType::Debit,
        reference: "INV-2025-0001".to_string(),
        purpose_code: "GDDS".to_string(),
        ordering_customer: None,
        beneficiary: None,
        charge_bearer: Default::default(),
        execution_date: None,
        urgent: false,
        additional_info: None,
    }
}

fn detail(status: &str) -> Value {
    json!({
        "transactionId": "tx-1",
        "status": status,
        "amount": { "value": 1000.0, "currency": "USD" }
    })
}

#[tokio::test]
async fn token_flow_uses_api_key_and_stores_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api-keys/token"))
        .and(header("authorization", "Bearer api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-token",
            "token_type": "Bearer",
            "expires_in": 3600,
            "permissionId": "perm_remit",
            "scope": "remittance:write"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/remittance/tx-1"))
        .and(header("authorization", "Bearer jwt-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail("PROCESSING")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), 0);
    let token = client
        .get_token(&client.token_request(Some("remittance:write")))
        .await
        .unwrap();
    assert_eq!(token.expires_in, 3600);
    assert!(client.has_valid_token().await);
    assert!(!client.is_token_expired(60).await);

    let status = client.get_remittance("tx-1").await.unwrap();
    assert_eq!(status.status, RemittanceStatus::Processing);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({
            "accountId": "acc_123",
            "correspondentBankId": "bank_abc",
            "permissionId": "perm_remit",
            "scope": "remittance:write"
        })
    );
    requests.iter().for_each(assert_signed);
}

#[tokio::test]
async fn expired_token_fails_without_network() {
    let server = MockServer::start().await;
    let client = client(&server.uri(), 3);

    assert!(matches!(
        client.get_remittance("tx-1").await,
        Err(Error::TokenExpired)
    ));

    client.set_access_token("short-lived", 30).await;
    let err = client
        .create_remittance(&remittance_request(), &RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_EXPIRED");
    assert_eq!(err.status(), Some(401));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn throttled_fetch_retries_with_same_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/remittance/tx-1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/remittance/tx-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail("COMPLETED")))
        .mount(&server)
        .await;

    let client = authorized_client(&server, 3).await;
    let detail = client.get_remittance("tx-1").await.unwrap();
    assert_eq!(detail.status, RemittanceStatus::Completed);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let key = header_str(&requests[0], HEADER_IDEMPOTENCY_KEY);
    assert!(uuid::Uuid::parse_str(key).is_ok());
    for request in &requests {
        assert_eq!(header_str(request, HEADER_IDEMPOTENCY_KEY), key);
        assert_signed(request);
    }

    // Backoff of at least 10ms separates attempts, so each carries its own timestamp
    let timestamps: std::collections::HashSet<&str> = requests
        .iter()
        .map(|r| header_str(r, HEADER_REQUEST_TIMESTAMP))
        .collect();
    let signatures: std::collections::HashSet<&str> = requests
        .iter()
        .map(|r| header_str(r, HEADER_REQUEST_SIGNATURE))
        .collect();
    assert_eq!(timestamps.len(), 3);
    assert_eq!(signatures.len(), 3);
}

#[tokio::test]
async fn path_segments_are_encoded_before_signing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/remittance/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail("PROCESSING")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/accounts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accountId": "acc 1",
            "balance": { "value": 500.0, "currency": "EUR" },
            "currency": "EUR",
            "lastUpdated": "2025-01-15T10:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = authorized_client(&server, 0).await;
    client.get_remittance("tx 1").await.unwrap();
    client.get_account_balance("acc 1?x#y").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), "/remittance/tx%201");
    assert_eq!(requests[1].url.path(), "/accounts/acc%201%3Fx%23y/balance");
    assert!(requests[1].url.query().is_none());
    requests.iter().for_each(assert_signed);
}

#[tokio::test]
async fn configured_request_timeout_applies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/remittance/tx-slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(detail("PROCESSING"))
                .set_delay(Duration::from_millis(2_000)),
        )
        .mount(&server)
        .await;

    let mut config = config(&server.uri(), 0);
    config.timeouts.request_timeout_ms = 100;
    let client =
        XcpClient::with_http_clients(config, reqwest::Client::new(), reqwest::Client::new())
            .unwrap();
    client.set_access_token("jwt-token", 3600).await;

    let started = std::time::Instant::now();
    let err = client.get_remittance("tx-slow").await.unwrap_err();

    assert!(matches!(err, Error::Network(_)));
    assert!(started.elapsed() < Duration::from_millis(1_500));
}

#[tokio::test]
async fn per_request_timeout_overrides_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remittance"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({
                    "transactionId": "tx-10",
                    "status": "CREATED",
                    "createdAt": "2025-01-15T10:00:00Z"
                }))
                .set_delay(Duration::from_millis(2_000)),
        )
        .mount(&server)
        .await;

    let client = authorized_client(&server, 0).await;
    let options = RequestOptions {
        timeout: Some(Duration::from_millis(100)),
        ..RequestOptions::default()
    };
    let err = client
        .create_remittance(&remittance_request(), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Network(_)));
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/remittance/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "NOT_FOUND",
            "message": "Remittance not found",
            "correlationId": "corr-404"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = authorized_client(&server, 3).await;
    let err = client.get_remittance("missing").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(err.correlation_id(), Some("corr-404"));
}

#[tokio::test]
async fn server_error_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acc_123/balance"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "code": "INTERNAL",
            "message": "boom"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = authorized_client(&server, 2).await;
    let err = client.get_account_balance("acc_123").await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
    assert_eq!(err.code(), "INTERNAL");
}

#[tokio::test]
async fn malformed_success_body_is_schema_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/remittance/tx-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = authorized_client(&server, 3).await;
    let err = client.get_remittance("tx-1").await.unwrap_err();

    assert!(matches!(err, Error::SchemaValidation(_)));
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let client = client("http://127.0.0.1:1", 1);
    client.set_access_token("jwt-token", 3600).await;

    let err = client.get_remittance("tx-1").await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));
    assert_eq!(err.code(), "NETWORK_ERROR");
}

#[tokio::test]
async fn caller_idempotency_key_survives_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remittance"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/remittance"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "transactionId": "tx-9",
            "status": "CREATED",
            "createdAt": "2025-01-15T10:00:00Z",
            "reference": "INV-2025-0001"
        })))
        .mount(&server)
        .await;

    let client = authorized_client(&server, 3).await;
    let options = RequestOptions {
        idempotency_key: Some("order-42".to_string()),
        ..RequestOptions::default()
    };
    let created = client
        .create_remittance(&remittance_request(), &options)
        .await
        .unwrap();
    assert_eq!(created.transaction_id, "tx-9");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(header_str(request, HEADER_IDEMPOTENCY_KEY), "order-42");
        assert_signed(request);
    }
    let body: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(body["amount"], json!({ "value": 1000.0, "currency": "USD" }));
    assert_eq!(body["chargeBearer"], json!("SHARED"));
}

#[tokio::test]
async fn skip_retry_performs_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remittance"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = authorized_client(&server, 3).await;
    let options = RequestOptions {
        skip_retry: true,
        ..RequestOptions::default()
    };
    let err = client
        .create_remittance(&remittance_request(), &options)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn invalid_request_is_rejected_before_sending() {
    let server = MockServer::start().await;
    let client = authorized_client(&server, 3).await;

    let mut request = remittance_request();
    request.amount = Amount::new(rust_decimal::Decimal::ZERO, Currency::USD);
    let err = client
        .create_remittance(&request, &RequestOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RequestSetup(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

fn statement_request(format: StatementFormat) -> StatementRequest {
    StatementRequest {
        from: "2025-01-01".to_string(),
        to: "2025-01-31".to_string(),
        format,
    }
}

#[tokio::test]
async fn csv_statements_are_returned_as_text() {
    let server = MockServer::start().await;
    let csv = "date,amount,currency\n2025-01-02,10.00,USD\n";
    Mock::given(method("POST"))
        .and(path("/statements"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(csv, "text/csv"))
        .expect(1)
        .mount(&server)
        .await;

    let client = authorized_client(&server, 0).await;
    let statements = client
        .get_statements(&statement_request(StatementFormat::Csv))
        .await
        .unwrap();
    assert_eq!(statements, StatementBody::Text(csv.to_string()));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["format"], json!("CSV"));
}

#[tokio::test]
async fn json_statements_are_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/statements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{ "amount": 10.0 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = authorized_client(&server, 0).await;
    match client
        .get_statements(&statement_request(StatementFormat::Json))
        .await
        .unwrap()
    {
        StatementBody::Json(value) => assert_eq!(value["entries"][0]["amount"], json!(10.0)),
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[tokio::test]
async fn polls_until_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/remittance/tx-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail("PROCESSING")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    let mut completed = detail("COMPLETED");
    completed["mt103Reference"] = json!("MT103-998877");
    Mock::given(method("GET"))
        .and(path("/remittance/tx-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completed))
        .mount(&server)
        .await;

    let client = authorized_client(&server, 3).await;
    let detail = client
        .wait_for_remittance_completion("tx-1", &PollOptions::from_millis(5, 20, 10_000))
        .await
        .unwrap();

    assert_eq!(detail.status, RemittanceStatus::Completed);
    assert_eq!(detail.mt103_reference.as_deref(), Some("MT103-998877"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[test]
fn new_rejects_missing_certificates() {
    let mut config = config("https://api.xcp.example", 3);
    config.tls.client_cert_path = PathBuf::from("/nonexistent/client.crt");

    assert!(matches!(
        XcpClient::new(config),
        Err(Error::Configuration(_))
    ));
}
