//! Main application orchestration.
//!
//! Coordinates all components:
//! - Signal relay subscription (raw payloads over an mpsc channel)
//! - Entry dispatch: one execution task per configured account
//! - Outcome routing to each account's waiting attempt
//! - Periodic session statistics
//! - Graceful shutdown of in-flight executions

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use gale_broker::{
    DigitalBrokerConfig, DigitalBrokerGateway, DynBrokerGateway, HomeBrokerConfig,
    HomeBrokerGateway, TokenBrokerConfig, TokenBrokerGateway,
};
use gale_channel::{parse_message, ChannelMessage, FeedState, SignalFeed};
use gale_core::{AccountId, OutcomeEvent, Signal};
use gale_executor::{
    Delivery, ExecutionContext, ExecutionEngine, ExecutorError, ExecutorResult,
    ExecutionReport, OutcomeRouter, Scheduler, SystemClock,
};
use gale_ledger::{BotApiClient, BotApiConfig, DynConfigSource, DynLedger};
use gale_risk::{DynStopNotifier, OrchestratorNotifier, RiskGovernor, StopLatch};
use gale_telemetry::{Metrics, SessionStatsReporter};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{secret, AccountConfig, AppConfig, BrokerConfig};
use crate::error::{AppError, AppResult};

/// Grace period for in-flight executions after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Collaborators the application is wired with.
pub struct Components {
    /// One broker session per configured account.
    pub gateways: HashMap<AccountId, DynBrokerGateway>,
    pub ledger: DynLedger,
    pub options: DynConfigSource,
    pub notifier: Option<DynStopNotifier>,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    engine: Arc<ExecutionEngine>,
    latch: Arc<StopLatch>,
    routers: HashMap<AccountId, Arc<OutcomeRouter>>,
    gateways: HashMap<AccountId, DynBrokerGateway>,
    accounts: Vec<AccountId>,
    in_flight: HashSet<AccountId>,
    tasks: JoinSet<(AccountId, ExecutorResult<ExecutionReport>)>,
    stats: SessionStatsReporter,
    shutdown: CancellationToken,
    signal_count: u64,
}

impl Application {
    /// Create the application with HTTP adapters built from config.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let gateways = config
            .accounts
            .iter()
            .map(|account| build_gateway(&config.broker, account).map(|g| (account.id(), g)))
            .collect::<AppResult<HashMap<_, _>>>()?;

        let ledger_password = secret(&config.ledger.password_env)?;
        let client = Arc::new(BotApiClient::new(BotApiConfig {
            base_url: config.ledger.base_url.clone(),
            username: config.ledger.username.clone(),
            password: ledger_password.clone(),
        })?);

        let notifier: Option<DynStopNotifier> = match &config.ledger.orchestrator_url {
            Some(url) => Some(Arc::new(OrchestratorNotifier::new(
                url.clone(),
                config.ledger.username.clone(),
                ledger_password,
            )?)),
            None => None,
        };

        Self::with_components(
            config,
            Components {
                gateways,
                ledger: client.clone(),
                options: client,
                notifier,
            },
        )
    }

    /// Create the application around the given collaborators.
    pub fn with_components(config: AppConfig, components: Components) -> AppResult<Self> {
        let latch = Arc::new(StopLatch::new());
        let mut governor = RiskGovernor::new(components.ledger.clone(), latch.clone());
        if let Some(notifier) = components.notifier {
            governor = governor.with_notifier(notifier);
        }

        let accounts = config.account_ids();
        if let Some(missing) = accounts.iter().find(|a| !components.gateways.contains_key(*a)) {
            return Err(AppError::Config(format!("no broker gateway for account {missing}")));
        }

        let scheduler = Scheduler::from_config(&config.schedule, Arc::new(SystemClock))?;
        let engine = Arc::new(ExecutionEngine::new(
            components.ledger,
            components.options,
            Arc::new(governor),
            scheduler,
            config.execution.clone(),
        ));

        let routers = accounts
            .iter()
            .map(|a| (a.clone(), OutcomeRouter::new()))
            .collect();
        let stats = SessionStatsReporter::new(accounts.iter().map(ToString::to_string).collect());

        Ok(Self {
            config,
            engine,
            latch,
            routers,
            gateways: components.gateways,
            accounts,
            in_flight: HashSet::new(),
            tasks: JoinSet::new(),
            stats,
            shutdown: CancellationToken::new(),
            signal_count: 0,
        })
    }

    /// Token that stops the event loop and cancels in-flight executions.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stop_latch(&self) -> &Arc<StopLatch> {
        &self.latch
    }

    pub fn signal_count(&self) -> u64 {
        self.signal_count
    }

    /// Subscribe to the relay and run until ctrl-c.
    pub async fn run(mut self) -> AppResult<()> {
        info!(accounts = ?self.accounts, "Starting application");

        let (message_tx, message_rx) = mpsc::channel::<String>(1000);
        let feed = Arc::new(SignalFeed::with_shutdown(
            self.config.channel.clone().into(),
            message_tx,
            self.shutdown.child_token(),
        ));

        let feed_clone = feed.clone();
        let feed_handle = tokio::spawn(async move {
            if let Err(e) = feed_clone.run().await {
                error!(?e, "Signal feed stopped");
            }
        });

        self.serve(message_rx, Some(feed.as_ref())).await;
        self.finish().await;

        feed.shutdown();
        feed_handle.abort();
        Ok(())
    }

    /// Main event loop over raw channel payloads.
    ///
    /// Returns when the channel closes, the shutdown token fires or ctrl-c
    /// is received.
    pub async fn serve(&mut self, mut message_rx: mpsc::Receiver<String>, feed: Option<&SignalFeed>) {
        info!("Entering main event loop");
        let stats_every = Duration::from_secs(self.config.telemetry.stats_interval_secs.max(1));
        let mut stats_interval = tokio::time::interval(stats_every);
        stats_interval.reset();

        loop {
            tokio::select! {
                msg = message_rx.recv() => match msg {
                    Some(text) => self.handle_payload(&text),
                    None => {
                        info!("Signal channel closed");
                        break;
                    }
                },

                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    match joined {
                        Ok((account, result)) => self.on_execution_done(account, result),
                        Err(e) => error!(?e, "Execution task failed"),
                    }
                }

                _ = stats_interval.tick() => {
                    if let Some(feed) = feed {
                        if feed.state() == FeedState::Connected {
                            Metrics::feed_connected();
                        } else {
                            Metrics::feed_disconnected();
                        }
                    }
                    self.stats.output_summary();
                }

                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
    }

    /// Cancel in-flight executions and wait for them to unwind.
    pub async fn finish(&mut self) {
        info!(
            signal_count = self.signal_count,
            in_flight = self.tasks.len(),
            "Shutting down"
        );
        self.shutdown.cancel();

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while let Some(joined) = self.tasks.join_next().await {
                if let Ok((account, result)) = joined {
                    self.on_execution_done(account, result);
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(remaining = self.tasks.len(), "Executions did not stop in time, aborting");
            self.tasks.abort_all();
        }

        info!("Final statistics summary:");
        self.stats.output_summary();
    }

    /// Decode one payload and act on it. Bad payloads are logged and skipped.
    pub fn handle_payload(&mut self, text: &str) {
        match parse_message(text) {
            Ok(ChannelMessage::Entry(signal)) => {
                Metrics::signal_received("entry");
                self.dispatch(signal);
            }
            Ok(ChannelMessage::Outcome(event)) => {
                let kind = match event {
                    OutcomeEvent::Result { .. } => "result",
                    OutcomeEvent::GaleTrigger { .. } => "gale_trigger",
                };
                Metrics::signal_received(kind);
                self.route(event);
            }
            Err(e) => {
                Metrics::signal_received("invalid");
                warn!(error = %e, payload = %text, "Ignoring channel message");
            }
        }
    }

    /// Start an execution of `signal` for every eligible account.
    fn dispatch(&mut self, signal: Signal) {
        self.signal_count += 1;
        info!(
            symbol = %signal.symbol,
            direction = %signal.direction,
            entry_time = ?signal.entry_time.map(|t| t.to_string()),
            "Entry signal (#{})",
            self.signal_count
        );

        for account in self.accounts.clone() {
            if self.latch.is_stopped(&account) {
                info!(%account, "Account stopped, skipping signal");
                continue;
            }
            if self.in_flight.contains(&account) {
                warn!(%account, symbol = %signal.symbol, "Account busy, dropping signal");
                continue;
            }
            let (Some(router), Some(gateway)) =
                (self.routers.get(&account), self.gateways.get(&account))
            else {
                continue;
            };

            let ctx = ExecutionContext::new(
                account.clone(),
                gateway.clone(),
                router.clone(),
                self.shutdown.child_token(),
            );
            let engine = self.engine.clone();
            let signal = signal.clone();
            self.in_flight.insert(account.clone());
            self.tasks.spawn(async move {
                let result = engine.execute(&signal, &ctx).await;
                (ctx.account, result)
            });
        }
    }

    /// Deliver an outcome to every account's waiting attempt.
    fn route(&self, event: OutcomeEvent) {
        for (account, router) in &self.routers {
            match router.deliver(event) {
                Delivery::Delivered => debug!(%account, %event, "Outcome delivered"),
                other => {
                    Metrics::outcome_discarded(other.as_str());
                    debug!(%account, %event, reason = other.as_str(), "Outcome discarded");
                }
            }
        }
    }

    fn on_execution_done(&mut self, account: AccountId, result: ExecutorResult<ExecutionReport>) {
        self.in_flight.remove(&account);
        match result {
            Ok(report) => debug!(%account, terminal = %report.terminal, "Execution complete"),
            Err(ExecutorError::Cancelled) => info!(%account, "Execution cancelled"),
            Err(e) => error!(%account, error = %e, "Execution failed"),
        }
    }
}

/// Broker session for one account, authenticated with that account's secrets.
fn build_gateway(broker: &BrokerConfig, account: &AccountConfig) -> AppResult<DynBrokerGateway> {
    let gateway: DynBrokerGateway = match broker {
        BrokerConfig::Token { base_url } => Arc::new(TokenBrokerGateway::new(TokenBrokerConfig {
            base_url: base_url.clone(),
            api_token: secret(&account.api_token_env())?,
        })?),
        BrokerConfig::Digital { base_url } => {
            Arc::new(DigitalBrokerGateway::new(DigitalBrokerConfig {
                base_url: base_url.clone(),
                email: secret(&account.login_env())?,
                password: secret(&account.password_env())?,
            })?)
        }
        BrokerConfig::Home {
            login_url,
            trade_url,
            status_url,
            app_login_env,
            app_password_env,
            role,
            currency,
        } => Arc::new(HomeBrokerGateway::new(HomeBrokerConfig {
            login_url: login_url.clone(),
            trade_url: trade_url.clone(),
            status_url: status_url.clone(),
            app_login: secret(app_login_env)?,
            app_password: secret(app_password_env)?,
            username: secret(&account.login_env())?,
            password: secret(&account.password_env())?,
            role: role.clone(),
            currency: currency.clone(),
        })?),
    };

    info!(account = %account.id(), venue = broker.venue_name(), "Broker session configured");
    Ok(gateway)
}
