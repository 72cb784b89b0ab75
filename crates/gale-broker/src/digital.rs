//! Digital-options API gateway.
//!
//! Placement: `POST {base_url}/api/trade/digital/buy` (201 on success)
//! Balance:   `GET  {base_url}/api/account/balance` (`Wallets[{type, amount}]`)
//!
//! The API has no order-status endpoint, so settlement relies entirely on
//! channel outcomes and balance deltas.

use std::time::Duration;

use gale_core::{AccountType, Money};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BrokerError, BrokerResult};
use crate::gateway::{BoxFuture, BrokerGateway, OrderReceipt, OrderRequest, OrderStatusReport};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`DigitalBrokerGateway`].
#[derive(Debug, Clone)]
pub struct DigitalBrokerConfig {
    pub base_url: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DigitalBuyRequest<'a> {
    email: &'a str,
    password: &'a str,
    asset_name: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    operation_value: Decimal,
    direction: &'static str,
    #[serde(rename = "account_type")]
    account_type: &'static str,
    period: u32,
}

#[derive(Debug, Default, Deserialize)]
struct DigitalBuyResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    open_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(rename = "Wallets", default)]
    wallets: Vec<Wallet>,
}

#[derive(Debug, Deserialize)]
struct Wallet {
    #[serde(rename = "type")]
    wallet_type: String,
    amount: Decimal,
}

/// Gateway for the digital-options API.
pub struct DigitalBrokerGateway {
    client: Client,
    config: DigitalBrokerConfig,
}

impl DigitalBrokerGateway {
    pub fn new(config: DigitalBrokerConfig) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn buy(&self, request: OrderRequest) -> BrokerResult<OrderReceipt> {
        let body = DigitalBuyRequest {
            email: &self.config.email,
            password: &self.config.password,
            asset_name: &request.symbol,
            operation_value: request.stake.inner(),
            direction: request.direction.option_side(),
            account_type: request.account_type.as_str(),
            period: request.duration_seconds,
        };

        info!(
            symbol = %request.symbol,
            direction = body.direction,
            stake = %request.stake,
            period = body.period,
            "Placing digital option"
        );

        let response = self
            .client
            .post(self.url("/api/trade/digital/buy"))
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::CREATED && status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Rejected(format!("HTTP {status}: {body}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("Failed to read response: {e}")))?;
        let receipt = accepted_receipt(&text);

        debug!(order_id = %receipt.order_id, "Digital option accepted");

        Ok(receipt)
    }

    async fn fetch_balance(&self, account_type: AccountType) -> BrokerResult<Money> {
        let response = self
            .client
            .get(self.url("/api/account/balance"))
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let parsed: BalanceResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("Failed to parse balance response: {e}")))?;

        select_wallet(&parsed, account_type)
    }
}

fn select_wallet(parsed: &BalanceResponse, account_type: AccountType) -> BrokerResult<Money> {
    parsed
        .wallets
        .iter()
        .find(|w| w.wallet_type.eq_ignore_ascii_case(account_type.as_str()))
        .map(|w| Money::from(w.amount))
        .ok_or_else(|| BrokerError::Parse(format!("no {account_type} wallet in balance response")))
}

/// Receipt for an accepted buy. The order is live once the venue answered
/// 2xx, so an empty or unreadable body gets a local id instead of an error.
fn accepted_receipt(text: &str) -> OrderReceipt {
    let parsed = if text.trim().is_empty() {
        DigitalBuyResponse::default()
    } else {
        serde_json::from_str::<DigitalBuyResponse>(text).unwrap_or_else(|e| {
            warn!(error = %e, "Unparseable buy response, using local order id");
            DigitalBuyResponse::default()
        })
    };

    let order_id = match parsed.id {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    OrderReceipt {
        order_id,
        open_price: parsed.open_price,
    }
}

impl BrokerGateway for DigitalBrokerGateway {
    fn name(&self) -> &'static str {
        "digital"
    }

    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, BrokerResult<OrderReceipt>> {
        Box::pin(self.buy(request))
    }

    fn order_status<'a>(
        &'a self,
        _order_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<OrderStatusReport>> {
        Box::pin(async {
            Err(BrokerError::Unsupported {
                venue: "digital",
                operation: "order_status",
            })
        })
    }

    fn balance(&self, account_type: AccountType) -> BoxFuture<'_, BrokerResult<Money>> {
        Box::pin(self.fetch_balance(account_type))
    }
}
