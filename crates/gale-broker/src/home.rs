//! Home Broker venue.
//!
//! Session-token API spread over three hosts:
//! - Login:  `POST {login_url}` with application basic auth, returns a bearer token
//! - Trade:  `POST {trade_url}/op` (stake in USD cents, duration in milliseconds)
//! - Status: `GET  {status_url}/op/get/{id}` (`Gain` / `Loss` / `Draw`, profit in cents)
//!
//! The access token is cached per gateway, i.e. per account login. A 401
//! drops it and logs in again once. There is no balance endpoint.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use gale_core::{AccountType, Money};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BrokerError, BrokerResult};
use crate::gateway::{
    BoxFuture, BrokerGateway, OrderReceipt, OrderRequest, OrderState, OrderStatusReport,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`HomeBrokerGateway`].
#[derive(Debug, Clone)]
pub struct HomeBrokerConfig {
    pub login_url: String,
    pub trade_url: String,
    pub status_url: String,
    /// Application credentials for the login endpoint's basic auth.
    pub app_login: String,
    pub app_password: String,
    /// The account's own brokerage login.
    pub username: String,
    pub password: String,
    pub role: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    role: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct OpenOpRequest<'a> {
    id: String,
    direction: &'a str,
    bet_value_usd_cents: i64,
    duration_milliseconds: u64,
    start_time_utc: String,
    ticker_symbol: &'a str,
    account_type: &'static str,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenOpResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpStatusResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    profit_usd_cents: Option<Decimal>,
}

/// Gateway for the Home Broker API.
pub struct HomeBrokerGateway {
    client: Client,
    config: HomeBrokerConfig,
    access_token: RwLock<Option<String>>,
}

impl HomeBrokerGateway {
    pub fn new(config: HomeBrokerConfig) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            access_token: RwLock::new(None),
        })
    }

    fn trade_url(&self, path: &str) -> String {
        format!("{}{}", self.config.trade_url.trim_end_matches('/'), path)
    }

    fn status_url(&self, order_id: &str) -> String {
        format!(
            "{}/op/get/{order_id}",
            self.config.status_url.trim_end_matches('/')
        )
    }

    async fn login(&self) -> BrokerResult<String> {
        let body = LoginRequest {
            username: &self.config.username,
            password: &self.config.password,
            role: &self.config.role,
        };

        let response = self
            .client
            .post(&self.config.login_url)
            .basic_auth(&self.config.app_login, Some(&self.config.app_password))
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Auth(format!("HTTP {status}: {body}")));
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("Failed to parse login response: {e}")))?;

        *self.access_token.write() = Some(parsed.access_token.clone());
        info!(username = %self.config.username, "Home Broker login succeeded");
        Ok(parsed.access_token)
    }

    async fn ensure_login(&self) -> BrokerResult<String> {
        let cached = self.access_token.read().clone();
        match cached {
            Some(token) => Ok(token),
            None => self.login().await,
        }
    }

    /// Send with the cached bearer token; on 401 log in again and resend once.
    async fn send_authed(
        &self,
        build: impl Fn(&str) -> RequestBuilder,
    ) -> BrokerResult<Response> {
        let token = self.ensure_login().await?;
        let response = build(&token)
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("HTTP request failed: {e}")))?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(username = %self.config.username, "Home Broker session expired, logging in again");
        *self.access_token.write() = None;
        let token = self.login().await?;
        build(&token)
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("HTTP request failed: {e}")))
    }

    async fn open_op(&self, request: OrderRequest) -> BrokerResult<OrderReceipt> {
        let body = OpenOpRequest {
            id: format!("op-{}", Uuid::new_v4()),
            direction: request.direction.as_str(),
            bet_value_usd_cents: to_cents(request.stake)?,
            duration_milliseconds: u64::from(request.duration_seconds) * 1000,
            start_time_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ticker_symbol: &request.symbol,
            account_type: request.account_type.as_str(),
            currency: &self.config.currency,
        };

        info!(
            symbol = %request.symbol,
            direction = %request.direction,
            stake = %request.stake,
            cents = body.bet_value_usd_cents,
            "Opening Home Broker operation"
        );

        let url = self.trade_url("/op");
        let response = self
            .send_authed(|token| self.client.post(&url).bearer_auth(token).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Rejected(format!("HTTP {status}: {body}")));
        }

        let parsed: OpenOpResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("Failed to parse open response: {e}")))?;

        let order_id = match parsed.id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(BrokerError::Rejected("response carried no order id".to_string())),
        };

        debug!(%order_id, "Home Broker operation opened");

        Ok(OrderReceipt {
            order_id,
            open_price: None,
        })
    }

    async fn fetch_status(&self, order_id: &str) -> BrokerResult<OrderStatusReport> {
        let url = self.status_url(order_id);
        let response = self
            .send_authed(|token| self.client.get(&url).bearer_auth(token))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let parsed: OpStatusResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("Failed to parse status response: {e}")))?;

        Ok(parse_status(parsed))
    }
}

/// Stake in whole USD cents.
fn to_cents(stake: Money) -> BrokerResult<i64> {
    (stake.inner() * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| BrokerError::Rejected(format!("stake {stake} out of range")))
}

fn parse_status(parsed: OpStatusResponse) -> OrderStatusReport {
    let state = match parsed.result.as_deref() {
        Some("Gain") => OrderState::Won,
        Some("Loss") => OrderState::Lost,
        Some("Draw") => OrderState::Draw,
        _ => OrderState::Pending,
    };

    let pnl = if state.is_terminal() {
        parsed
            .profit_usd_cents
            .map(|cents| Money::from(cents / Decimal::ONE_HUNDRED))
    } else {
        None
    };

    OrderStatusReport { state, pnl }
}

impl BrokerGateway for HomeBrokerGateway {
    fn name(&self) -> &'static str {
        "homebroker"
    }

    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, BrokerResult<OrderReceipt>> {
        Box::pin(self.open_op(request))
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
                venue: "homebroker",
                operation: "balance",
            })
        })
    }
}
