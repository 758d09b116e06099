//! Remittance demo: token -> balance -> create remittance -> poll -> report

use anyhow::Context;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use xcp_client::{
    Amount, BankAccount, ChargeBearer, Config, Currency, PollOptions, RemittanceRequest,
    RemittanceStatus, RemittanceType, RequestOptions, XcpClient,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Err(e) = run().await {
        match e.downcast_ref::<xcp_client::Error>() {
            Some(api) => {
                error!(
                    code = api.code(),
                    status = ?api.status(),
                    correlation_id = ?api.correlation_id(),
                    "Remittance flow failed: {}",
                    api
                );
                if let xcp_client::Error::HttpStatus {
                    details: Some(details),
                    ..
                } = api
                {
                    error!("Details: {}", details);
                }
            }
            None => error!("Remittance flow failed: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let client = XcpClient::new(config)?;
    let config = client.config();
    info!(
        "Client initialized (base URL {}, account {})",
        config.base_url, config.account_id
    );

    // Step 1: token
    let token = client
        .get_token(&client.token_request(Some(
            "remittance:write remittance:read account:read",
        )))
        .await?;
    info!(
        "Token obtained (permission {}, expires in {}s, scope {:?})",
        token.permission_id, token.expires_in, token.scope
    );

    // Step 2: balance (optional)
    match client.get_account_balance(&config.account_id).await {
        Ok(balance) => {
            info!(
                "Balance: {} {}",
                balance.balance.value, balance.balance.currency
            );
            if let Some(available) = balance.available_balance {
                info!("Available: {} {}", available.value, available.currency);
            }
        }
        Err(e) => warn!("Balance check skipped: {}", e),
    }

    // Step 3: remittance
    let now = Utc::now();
    let request = RemittanceRequest {
        user_id: "user_xcp_demo_001".to_string(),
        destination_account_number: "acc_demo_destination_456".to_string(),
        amount: Amount::new(Decimal::new(100_000, 2), Currency::USD),
        remittance_bank_name: "CoreBanking DAES".to_string(),
        correspondent_bank_id: config.bank_id.clone(),
        bank_id: config.bank_id.clone(),
        remittance_type: RemittanceType::Debit,
        reference: format!("DEMO-{}", now.timestamp_millis()),
        purpose_code: "GDDS".to_string(),
        ordering_customer: Some(BankAccount {
            name: "ACME Corporation LLC".to_string(),
            iban: Some("GB29NWBK60161331926819".to_string()),
            bic: Some("NWBKGB2L".to_string()),
            ..BankAccount::default()
        }),
        beneficiary: Some(BankAccount {
            name: "Beta Trading SA".to_string(),
            iban: Some("DE89370400440532013000".to_string()),
            bic: Some("COBADEFF".to_string()),
            ..BankAccount::default()
        }),
        charge_bearer: ChargeBearer::Shared,
        execution_date: Some((now + Duration::days(1)).format("%Y-%m-%d").to_string()),
        urgent: false,
        additional_info: Some("Payment for invoice DEMO-2025-001".to_string()),
    };

    let remittance = client
        .create_remittance(&request, &RequestOptions::default())
        .await?;
    info!(
        "Remittance {} created (status {}, reference {:?}, at {})",
        remittance.transaction_id, remittance.status, remittance.reference, remittance.created_at
    );

    // Step 4: poll
    let detail = client
        .wait_for_remittance_completion(
            &remittance.transaction_id,
            &PollOptions::from_millis(24, 5_000, 120_000),
        )
        .await
        .with_context(|| format!("polling remittance {}", remittance.transaction_id))?;

    info!(
        "Final status {} ({} {})",
        detail.status, detail.amount.value, detail.amount.currency
    );
    if let Some(mt103) = &detail.mt103_reference {
        info!("MT103 reference: {}", mt103);
    }
    if let Some(value_date) = &detail.value_date {
        info!("Value date: {}", value_date);
    }
    if let Some(fees) = &detail.fees {
        info!("Fees: {} {}", fees.total, fees.currency);
    }
    if let Some(completed_at) = &detail.completed_at {
        info!("Completed at: {}", completed_at);
    }
    match detail.status {
        RemittanceStatus::Rejected => {
            warn!("Rejection reason: {}", detail.rejection_reason.as_deref().unwrap_or("n/a"))
        }
        RemittanceStatus::Failed => {
            warn!("Failure reason: {}", detail.failure_reason.as_deref().unwrap_or("n/a"))
        }
        _ => {}
    }

    Ok(())
}
