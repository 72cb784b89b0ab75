//! REST venue authenticated with an `api-token` header.
//!
//! Placement: `POST {base_url}/trades/open`
//! Status:    `GET  {base_url}/trades/{id}` (result + pnl once settled)
//!
//! The venue exposes no balance endpoint; PnL always comes from the status
//! payload.

use std::time::Duration;

use gale_core::{AccountType, Money};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BrokerError, BrokerResult};
use crate::gateway::{
    BoxFuture, BrokerGateway, OrderReceipt, OrderRequest, OrderState, OrderStatusReport,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`TokenBrokerGateway`].
#[derive(Debug, Clone)]
pub struct TokenBrokerConfig {
    /// Base URL, e.g. `https://broker-api.example/token`.
    pub base_url: String,
    pub api_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenTradeRequest<'a> {
    is_demo: bool,
    close_type: String,
    direction: &'a str,
    symbol: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenTradeResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    open_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct TradeStatusResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    pnl: Option<Decimal>,
}

/// Gateway for the token-authenticated REST venue.
pub struct TokenBrokerGateway {
    client: Client,
    config: TokenBrokerConfig,
}

impl TokenBrokerGateway {
    pub fn new(config: TokenBrokerConfig) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn open_trade(&self, request: OrderRequest) -> BrokerResult<OrderReceipt> {
        let body = OpenTradeRequest {
            is_demo: request.account_type == AccountType::Demo,
            close_type: request.close_type(),
            direction: request.direction.as_str(),
            symbol: &request.symbol,
            amount: request.stake.inner(),
        };

        info!(
            symbol = %request.symbol,
            direction = %request.direction,
            stake = %request.stake,
            close_type = %body.close_type,
            "Opening trade"
        );

        let response = self
            .client
            .post(self.url("trades/open"))
            .header("api-token", &self.config.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Rejected(format!("HTTP {status}: {body}")));
        }

        let parsed: OpenTradeResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("Failed to parse open response: {e}")))?;

        let order_id = match parsed.id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(BrokerError::Rejected("response carried no order id".to_string())),
        };

        debug!(%order_id, open_price = ?parsed.open_price, "Trade opened");

        Ok(OrderReceipt {
            order_id,
            open_price: parsed.open_price,
        })
    }

    async fn fetch_status(&self, order_id: &str) -> BrokerResult<OrderStatusReport> {
        let response = self
            .client
            .get(self.url(&format!("trades/{order_id}")))
            .header("api-token", &self.config.api_token)
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let parsed: TradeStatusResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("Failed to parse status response: {e}")))?;

        Ok(parse_status(parsed))
    }
}

fn parse_status(parsed: TradeStatusResponse) -> OrderStatusReport {
    let state = match parsed.result.as_deref() {
        Some("WON") => OrderState::Won,
        Some("LOST") => OrderState::Lost,
        Some("DRAW") => OrderState::Draw,
        Some(other) => {
            debug!(result = other, "Trade not settled yet");
            OrderState::Pending
        }
        None => OrderState::Pending,
    };

    let pnl = if state.is_terminal() {
        parsed.pnl.map(Money::from)
    } else {
        None
    };

    if state == OrderState::Won && pnl.is_none() {
        warn!("Venue reported WON without pnl");
    }

    OrderStatusReport { state, pnl }
}

impl BrokerGateway for TokenBrokerGateway {
    fn name(&self) -> &'static str {
        "token"
    }

    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, BrokerResult<OrderReceipt>> {
        Box::pin(self.open_trade(request))
    }

    fn order_status<'a>(
        &'a self,
        order_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<OrderStatusReport>> {
        Box::pin(self.fetch_status(order_id))
    }

    fn balance(&self, _account_type: AccountType) -> BoxFuture<'_, BrokerResult<Money>> {
        Box::pin(async {
            Err(BrokerError::Unsupported {
                venue: "token",
                operation: "balance",
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gale_core::Direction;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_request_wire_format() {
        let body = OpenTradeRequest {
            is_demo: true,
            close_type: "01:00".to_string(),
            direction: Direction::Sell.as_str(),
            symbol: "EURUSD",
            amount: dec!(25),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["isDemo"], true);
        assert_eq!(json["closeType"], "01:00");
        assert_eq!(json["direction"], "SELL");
        assert_eq!(json["amount"], 25.0);
    }

    #[test]
    fn test_parse_settled_status() {
        let parsed: TradeStatusResponse =
            serde_json::from_str(r#"{"result":"WON","pnl":8.5}"#).unwrap();
        let report = parse_status(parsed);
        assert_eq!(report.state, OrderState::Won);
        assert_eq!(report.pnl, Some(Money(dec!(8.5))));
    }

    #[test]
    fn test_parse_pending_status_ignores_pnl() {
        let parsed: TradeStatusResponse =
            serde_json::from_str(r#"{"result":"OPEN","pnl":0}"#).unwrap();
        let report = parse_status(parsed);
        assert_eq!(report.state, OrderState::Pending);
        assert_eq!(report.pnl, None);
    }

    #[test]
    fn test_url_join() {
        let gw = TokenBrokerGateway::new(TokenBrokerConfig {
            base_url: "https://broker.test/token/".to_string(),
            api_token: "t".to_string(),
        })
        .unwrap();
        assert_eq!(gw.url("trades/open"), "https://broker.test/token/trades/open");
    }
}
