//! Stop notifications to the bot orchestrator.
//!
//! The orchestrator exposes `GET {base}/stop_win/{user}/{brokerage}` and
//! `GET {base}/stop_loss/{user}/{brokerage}`; it decides what stopping means
//! for the account (typically tearing the bot down).

use std::sync::Arc;
use std::time::Duration;

use gale_core::{AccountId, BoxFuture};
use parking_lot::Mutex;
use reqwest::Client;
use tracing::info;

use crate::error::{RiskError, RiskResult};
use crate::governor::StopSignal;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives stop events.
pub trait StopNotifier: Send + Sync {
    fn notify<'a>(&'a self, account: &'a AccountId, signal: StopSignal)
        -> BoxFuture<'a, RiskResult<()>>;
}

pub type DynStopNotifier = Arc<dyn StopNotifier>;

/// HTTP notifier for the orchestrator service.
pub struct OrchestratorNotifier {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl OrchestratorNotifier {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> RiskResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RiskError::Notification(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    fn url(&self, account: &AccountId, signal: StopSignal) -> Option<String> {
        let path = match signal {
            StopSignal::StopWin => "stop_win",
            StopSignal::StopLoss => "stop_loss",
            StopSignal::None => return None,
        };
        Some(format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            path,
            account.user_id,
            account.brokerage_id
        ))
    }

    async fn send(&self, account: &AccountId, signal: StopSignal) -> RiskResult<()> {
        let Some(url) = self.url(account, signal) else {
            return Ok(());
        };

        info!(%account, %signal, %url, "Notifying orchestrator");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| RiskError::Notification(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RiskError::Notification(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

impl StopNotifier for OrchestratorNotifier {
    fn notify<'a>(
        &'a self,
        account: &'a AccountId,
        signal: StopSignal,
    ) -> BoxFuture<'a, RiskResult<()>> {
        Box::pin(self.send(account, signal))
    }
}

/// Recording notifier for tests.
#[derive(Debug, Default)]
pub struct MockStopNotifier {
    notifications: Mutex<Vec<(AccountId, StopSignal)>>,
}

impl MockStopNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<(AccountId, StopSignal)> {
        self.notifications.lock().clone()
    }
}

impl StopNotifier for MockStopNotifier {
    fn notify<'a>(
        &'a self,
        account: &'a AccountId,
        signal: StopSignal,
    ) -> BoxFuture<'a, RiskResult<()>> {
        Box::pin(async move {
            self.notifications.lock().push((account.clone(), signal));
            Ok(())
        })
    }
}
