//! HTTP client for the bot-options / trade-order service.
//!
//! Endpoints (HTTP basic auth):
//! - `GET  /bot-options/admin/{user}/{brokerage}`: options and accumulators
//! - `PUT  /bot-options/admin/{user}/{brokerage}`: `{win_value}` or `{loss_value}`
//! - `POST /trade-order-info`: new trade row
//! - `PUT  /trade-order-info/{order_id}`: status and pnl
//!
//! Accumulators are updated read-modify-write; the service offers no atomic
//! increment. Per-account execution is serialized, so a single bot never races
//! itself.

use std::time::Duration;

use gale_core::{AccountId, AccountRiskState, BotOptions, BoxFuture, Money, TradeStatus};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{ConfigSource, Ledger, NewTradeRecord};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`BotApiClient`].
#[derive(Debug, Clone)]
pub struct BotApiConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

/// Bot-options payload as served by the API.
#[derive(Debug, Default, Deserialize)]
struct BotOptionsPayload {
    #[serde(default)]
    entry_price: Option<Decimal>,
    #[serde(default)]
    is_demo: bool,
    #[serde(default)]
    gale_one: bool,
    #[serde(default)]
    gale_two: bool,
    #[serde(default)]
    stop_win: Option<Decimal>,
    #[serde(default)]
    stop_loss: Option<Decimal>,
    #[serde(default)]
    win_value: Option<Decimal>,
    #[serde(default)]
    loss_value: Option<Decimal>,
}

impl BotOptionsPayload {
    fn to_options(&self) -> BotOptions {
        BotOptions {
            stake: self.entry_price.map(Money::from),
            is_demo: self.is_demo,
            gale1_enabled: self.gale_one,
            gale2_enabled: self.gale_two,
            stop_win: self.stop_win.map(Money::from),
            stop_loss: self.stop_loss.map(Money::from),
        }
    }

    fn to_risk_state(&self) -> AccountRiskState {
        AccountRiskState {
            win_accum: self.win_value.map(Money::from).unwrap_or_default(),
            loss_accum: self.loss_value.map(Money::from).unwrap_or_default(),
            stop_win: self.stop_win.map(Money::from).unwrap_or_default(),
            stop_loss: self.stop_loss.map(Money::from).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TradeOrderUpdate<'a> {
    user_id: Value,
    order_id: &'a str,
    status: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    pnl: Decimal,
}

/// Numeric ids go over the wire as numbers, anything else as a string.
fn id_value(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

fn float(d: Decimal) -> Value {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().map(Value::from).unwrap_or(Value::Null)
}

/// Client for the bot-options service.
pub struct BotApiClient {
    client: Client,
    config: BotApiConfig,
}

impl BotApiClient {
    pub fn new(config: BotApiConfig) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn options_url(&self, account: &AccountId) -> String {
        self.url(&format!(
            "/bot-options/admin/{}/{}",
            account.user_id, account.brokerage_id
        ))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.config.username, Some(&self.config.password))
    }

    async fn send(&self, builder: RequestBuilder) -> LedgerResult<reqwest::Response> {
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| LedgerError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::NotFound(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::HttpClient(format!("HTTP {status}: {body}")));
        }
        Ok(response)
    }

    async fn fetch_options(&self, account: &AccountId) -> LedgerResult<BotOptionsPayload> {
        let response = self.send(self.client.get(self.options_url(account))).await?;
        response
            .json()
            .await
            .map_err(|e| LedgerError::Parse(format!("Failed to parse bot options: {e}")))
    }

    async fn put_options(&self, account: &AccountId, body: Value) -> LedgerResult<()> {
        self.send(self.client.put(self.options_url(account)).json(&body))
            .await?;
        Ok(())
    }

    async fn create(&self, record: NewTradeRecord) -> LedgerResult<()> {
        let body = json!({
            "user_id": id_value(&record.account.user_id),
            "order_id": record.order_id,
            "symbol": record.symbol,
            "order_type": record.direction.as_str(),
            "quantity": float(record.stake.inner()),
            "price": float(record.open_price.unwrap_or_default()),
            "status": record.status.label(),
            "date_time": record.opened_at.to_rfc3339(),
            "brokerage_id": id_value(&record.account.brokerage_id),
            "pnl": 0,
        });

        debug!(order_id = %record.order_id, "Creating trade record");
        self.send(self.client.post(self.url("/trade-order-info")).json(&body))
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        account: &AccountId,
        order_id: &str,
        status: TradeStatus,
        pnl: Money,
    ) -> LedgerResult<()> {
        let body = TradeOrderUpdate {
            user_id: id_value(&account.user_id),
            order_id,
            status: status.label(),
            pnl: pnl.inner(),
        };

        debug!(%order_id, status = %status, pnl = %pnl, "Updating trade record");
        self.send(
            self.client
                .put(self.url(&format!("/trade-order-info/{order_id}")))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn accumulate(&self, account: &AccountId, field: &str, amount: Money) -> LedgerResult<()> {
        let current = self.fetch_options(account).await?;
        let existing = match field {
            "win_value" => current.win_value,
            _ => current.loss_value,
        }
        .unwrap_or_default();

        if existing.is_sign_negative() {
            warn!(%account, field, %existing, "Negative accumulator on server, leaving untouched");
            return Ok(());
        }

        let updated = existing + amount.inner();
        debug!(%account, field, %existing, %updated, "Accumulating");
        let mut body = serde_json::Map::new();
        body.insert(field.to_string(), float(updated));
        self.put_options(account, Value::Object(body)).await
    }
}

impl Ledger for BotApiClient {
    fn create_trade_record(&self, record: NewTradeRecord) -> BoxFuture<'_, LedgerResult<()>> {
        Box::pin(self.create(record))
    }

    fn update_trade_record<'a>(
        &'a self,
        account: &'a AccountId,
        order_id: &'a str,
        status: TradeStatus,
        pnl: Money,
    ) -> BoxFuture<'a, LedgerResult<()>> {
        Box::pin(self.update(account, order_id, status, pnl))
    }

    fn get_risk_state<'a>(
        &'a self,
        account: &'a AccountId,
    ) -> BoxFuture<'a, LedgerResult<AccountRiskState>> {
        Box::pin(async move { Ok(self.fetch_options(account).await?.to_risk_state()) })
    }

    fn accumulate_win<'a>(
        &'a self,
        account: &'a AccountId,
        amount: Money,
    ) -> BoxFuture<'a, LedgerResult<()>> {
        Box::pin(self.accumulate(account, "win_value", amount))
    }

    fn accumulate_loss<'a>(
        &'a self,
        account: &'a AccountId,
        amount: Money,
    ) -> BoxFuture<'a, LedgerResult<()>> {
        Box::pin(self.accumulate(account, "loss_value", amount))
    }
}

impl ConfigSource for BotApiClient {
    fn get_bot_options<'a>(
        &'a self,
        account: &'a AccountId,
    ) -> BoxFuture<'a, LedgerResult<BotOptions>> {
        Box::pin(async move { Ok(self.fetch_options(account).await?.to_options()) })
    }
}
