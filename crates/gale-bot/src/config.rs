//! Application configuration.
//!
//! Loaded from TOML. Secrets are never stored in the file: each adapter names
//! the environment variable holding its token or password. Broker secrets are
//! per account, so every account trades its own wallet.

use std::collections::{HashMap, HashSet};

use gale_channel::FeedConfig;
use gale_core::AccountId;
use gale_executor::{EngineConfig, ScheduleConfig};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Signal relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Relay WebSocket URL.
    pub url: String,
    /// Channel to subscribe to.
    #[serde(default = "default_channel_name")]
    pub name: String,
    /// Maximum reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

fn default_channel_name() -> String {
    "signals".to_string()
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_ping_interval_ms() -> u64 {
    30_000
}

fn default_idle_timeout_ms() -> u64 {
    90_000
}

impl From<ChannelConfig> for FeedConfig {
    fn from(c: ChannelConfig) -> Self {
        Self {
            url: c.url,
            channel: c.name,
            max_reconnect_attempts: c.max_reconnect_attempts,
            reconnect_base_delay_ms: c.reconnect_base_delay_ms,
            reconnect_max_delay_ms: c.reconnect_max_delay_ms,
            ping_interval_ms: c.ping_interval_ms,
            idle_timeout_ms: c.idle_timeout_ms,
        }
    }
}

/// Broker venue selection. Holds venue-wide settings only; each account
/// brings its own credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "venue", rename_all = "lowercase")]
pub enum BrokerConfig {
    /// REST venue authenticated with a per-account API token.
    Token { base_url: String },
    /// Digital-options API authenticated with the brokerage login.
    Digital { base_url: String },
    /// Home Broker session API (login, trade and status hosts).
    Home {
        #[serde(default = "default_home_login_url")]
        login_url: String,
        #[serde(default = "default_home_trade_url")]
        trade_url: String,
        #[serde(default = "default_home_status_url")]
        status_url: String,
        /// Application credentials shared by every account's login.
        #[serde(default = "default_home_app_login_env")]
        app_login_env: String,
        #[serde(default = "default_home_app_password_env")]
        app_password_env: String,
        #[serde(default = "default_home_role")]
        role: String,
        #[serde(default = "default_home_currency")]
        currency: String,
    },
}

fn default_home_login_url() -> String {
    "https://bot-account-manager-api.homebroker.com/v3/login".to_string()
}

fn default_home_trade_url() -> String {
    "https://trade-api-edge.homebroker.com".to_string()
}

fn default_home_status_url() -> String {
    "https://bot-trade-api.homebroker.com".to_string()
}

fn default_home_app_login_env() -> String {
    "GALE_HOME_APP_LOGIN".to_string()
}

fn default_home_app_password_env() -> String {
    "GALE_HOME_APP_PASSWORD".to_string()
}

fn default_home_role() -> String {
    "hbb".to_string()
}

fn default_home_currency() -> String {
    "BRL".to_string()
}

impl BrokerConfig {
    pub fn venue_name(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Digital { .. } => "digital",
            Self::Home { .. } => "home",
        }
    }

    /// Whether accounts authenticate with an API token rather than a login.
    pub fn uses_api_token(&self) -> bool {
        matches!(self, Self::Token { .. })
    }
}

/// Bot-options / trade ledger service.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub base_url: String,
    pub username: String,
    #[serde(default = "default_ledger_password_env")]
    pub password_env: String,
    /// Orchestrator notified on stop-win / stop-loss. Disabled when absent.
    #[serde(default)]
    pub orchestrator_url: Option<String>,
}

fn default_ledger_password_env() -> String {
    "GALE_LEDGER_PASSWORD".to_string()
}

/// Telemetry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Session summary interval in seconds.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_stats_interval_secs() -> u64 {
    3600
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

/// Names of the environment variables holding one account's broker secrets.
///
/// Unset names default to `GALE_BROKER_{TOKEN|LOGIN|PASSWORD}_{user}_{brokerage}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_token_env: Option<String>,
    #[serde(default)]
    pub login_env: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
}

/// Account traded by this bot.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub user_id: String,
    pub brokerage_id: String,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

impl AccountConfig {
    pub fn id(&self) -> AccountId {
        AccountId::new(self.user_id.clone(), self.brokerage_id.clone())
    }

    pub fn api_token_env(&self) -> String {
        self.credentials
            .api_token_env
            .clone()
            .unwrap_or_else(|| self.default_env("TOKEN"))
    }

    pub fn login_env(&self) -> String {
        self.credentials
            .login_env
            .clone()
            .unwrap_or_else(|| self.default_env("LOGIN"))
    }

    pub fn password_env(&self) -> String {
        self.credentials
            .password_env
            .clone()
            .unwrap_or_else(|| self.default_env("PASSWORD"))
    }

    /// Environment variable naming the broker identity for `broker`.
    fn identity_env(&self, broker: &BrokerConfig) -> String {
        if broker.uses_api_token() {
            self.api_token_env()
        } else {
            self.login_env()
        }
    }

    fn default_env(&self, kind: &str) -> String {
        let suffix: String = format!("{}_{}", self.user_id, self.brokerage_id)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("GALE_BROKER_{kind}_{suffix}")
    }
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub channel: ChannelConfig,
    pub broker: BrokerConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub execution: EngineConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl AppConfig {
    /// Load configuration from file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.accounts.is_empty() {
            return Err(AppError::Config("no [[accounts]] configured".to_string()));
        }
        if self.channel.url.trim().is_empty() {
            return Err(AppError::Config("channel.url is empty".to_string()));
        }
        let mut ids = HashSet::new();
        let mut identities = HashMap::new();
        for account in &self.accounts {
            let id = account.id();
            if !ids.insert(id.clone()) {
                return Err(AppError::Config(format!("account {id} configured twice")));
            }
            let env = account.identity_env(&self.broker);
            if let Some(other) = identities.insert(env.clone(), id.clone()) {
                return Err(AppError::Config(format!(
                    "accounts {other} and {id} share broker credentials ({env})"
                )));
            }
        }
        if !self.execution.max_stake.is_positive() {
            return Err(AppError::Config(format!(
                "execution.max_stake must be positive, got {}",
                self.execution.max_stake
            )));
        }
        Ok(())
    }

    pub fn account_ids(&self) -> Vec<AccountId> {
        self.accounts.iter().map(AccountConfig::id).collect()
    }
}

/// Read a secret from the named environment variable.
pub fn secret(env_name: &str) -> AppResult<String> {
    std::env::var(env_name)
        .map_err(|_| AppError::Config(format!("environment variable {env_name} is not set")))
}
