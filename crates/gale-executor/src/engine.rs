//! Per-signal execution state machine.
//!
//! ```text
//! options ─► [wait entry time] ─► place ENTRY ─► await outcome ─► settle
//!                                        ▲                           │
//!                                        │ LOSS/DRAW, gale enabled,  │ WIN
//!                                        │ gale time known, no stop  ▼
//!                                  place GALE1/GALE2           terminal state
//! ```
//!
//! Every settled stage writes one ledger update, feeds the account
//! accumulators and runs the risk governor. Aborts never do.

use std::sync::Arc;

use gale_broker::{
    invert_symbol, BrokerError, BrokerGateway, DynBrokerGateway, OrderReceipt, OrderRequest,
    OrderState,
};
use gale_core::{
    AccountId, AccountType, BotOptions, Money, Signal, Stage, TerminalState, TradeAttempt,
    TradeResult, TradeStatus,
};
use gale_ledger::{DynConfigSource, DynLedger, NewTradeRecord};
use gale_risk::{RiskGovernor, StopSignal};
use gale_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{ExecutorError, ExecutorResult};
use crate::locks::AccountLocks;
use crate::pnl::{PnlOutcome, PnlResolver};
use crate::router::{OutcomeRouter, OutcomeSlot};
use crate::schedule::Scheduler;

/// State scoped to one signal for one account.
///
/// `gateway` is the account's own broker session: orders, status reads and
/// balance polls for this account never go through another account's login.
#[derive(Clone)]
pub struct ExecutionContext {
    pub account: AccountId,
    pub gateway: DynBrokerGateway,
    pub router: Arc<OutcomeRouter>,
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(
        account: AccountId,
        gateway: DynBrokerGateway,
        router: Arc<OutcomeRouter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            account,
            gateway,
            router,
            cancel,
        }
    }
}

/// How one signal ended for one account.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub account: AccountId,
    pub terminal: TerminalState,
    pub attempts: Vec<TradeAttempt>,
    /// Last risk check result.
    pub stop: StopSignal,
}

impl ExecutionReport {
    /// Sum of settled PnL across attempts.
    pub fn net_pnl(&self) -> Money {
        self.attempts
            .iter()
            .fold(Money::ZERO, |acc, a| acc + a.pnl())
    }
}

/// Result of waiting for one attempt's outcome.
struct Settlement {
    result: TradeResult,
    reported_pnl: Option<Money>,
}

pub struct ExecutionEngine {
    ledger: DynLedger,
    options: DynConfigSource,
    governor: Arc<RiskGovernor>,
    scheduler: Scheduler,
    pnl: PnlResolver,
    locks: AccountLocks,
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new(
        ledger: DynLedger,
        options: DynConfigSource,
        governor: Arc<RiskGovernor>,
        scheduler: Scheduler,
        config: EngineConfig,
    ) -> Self {
        let pnl = PnlResolver::new(config.balance_poll_interval(), config.balance_timeout());
        Self {
            ledger,
            options,
            governor,
            scheduler,
            pnl,
            locks: AccountLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn governor(&self) -> &Arc<RiskGovernor> {
        &self.governor
    }

    /// Whether an execution currently holds the account.
    pub fn is_busy(&self, account: &AccountId) -> bool {
        self.locks.is_locked(account)
    }

    /// Execute `signal` for the context's account.
    ///
    /// Holds the account lock for the whole run. Only cancellation surfaces
    /// as an error; every other failure ends in a terminal state.
    pub async fn execute(
        &self,
        signal: &Signal,
        ctx: &ExecutionContext,
    ) -> ExecutorResult<ExecutionReport> {
        let _guard = tokio::select! {
            guard = self.locks.acquire(&ctx.account) => guard,
            () = ctx.cancel.cancelled() => return Err(ExecutorError::Cancelled),
        };

        let account_label = ctx.account.to_string();
        info!(
            account = %ctx.account,
            symbol = %signal.symbol,
            direction = %signal.direction,
            expiration = %signal.expiration(),
            "Executing signal"
        );

        let report = self.run(signal, ctx).await?;

        Metrics::execution_finished(&account_label, report.terminal.as_str());
        info!(
            account = %ctx.account,
            symbol = %signal.symbol,
            terminal = %report.terminal,
            attempts = report.attempts.len(),
            net_pnl = %report.net_pnl(),
            "Signal finished"
        );
        Ok(report)
    }

    async fn run(&self, signal: &Signal, ctx: &ExecutionContext) -> ExecutorResult<ExecutionReport> {
        let account = &ctx.account;
        let gateway = ctx.gateway.as_ref();
        let mut report = ExecutionReport {
            account: account.clone(),
            terminal: TerminalState::AbortedConfig,
            attempts: Vec::new(),
            stop: StopSignal::None,
        };

        let options = match self.options.get_bot_options(account).await {
            Ok(options) => options,
            Err(e) => {
                let err = ExecutorError::Config(e.to_string());
                error!(%account, error = %err, "Aborting signal");
                return Ok(report);
            }
        };
        let base_stake = match options.validated_stake() {
            Ok(stake) => stake,
            Err(e) => {
                let err = ExecutorError::Config(e.to_string());
                error!(%account, error = %err, "Aborting signal");
                return Ok(report);
            }
        };
        let account_type = options.account_type();

        let mut stage = Stage::Entry;
        loop {
            if let Some(at) = signal.time_for(stage) {
                self.scheduler.wait_until(at, &ctx.cancel).await?;
            }

            let stake = base_stake.scaled(stage.multiplier()).capped(self.config.max_stake);
            let slot = ctx.router.arm(stage);
            let balance_before = self.read_balance(gateway, account_type).await;

            let (receipt, symbol) = match self
                .place_with_retry(gateway, signal, stake, account_type, stage)
                .await
            {
                Ok(placed) => placed,
                Err(err) => {
                    error!(%account, symbol = %signal.symbol, %stage, error = %err, "Aborting signal");
                    report.terminal = TerminalState::AbortedNoOrder;
                    return Ok(report);
                }
            };

            let mut attempt = TradeAttempt::new(
                receipt.order_id.clone(),
                stage,
                symbol,
                signal.direction,
                stake,
                balance_before,
            );
            Metrics::attempt_placed(&account.to_string(), stage.as_str());
            info!(
                %account,
                %stage,
                order_id = %attempt.order_id,
                symbol = %attempt.symbol,
                %stake,
                balance_before = ?balance_before,
                "Order placed"
            );
            self.record_open(account, &attempt, &receipt).await;

            let Some(settlement) = self
                .await_outcome(gateway, account, &attempt, slot, &ctx.cancel)
                .await?
            else {
                report.terminal = TerminalState::AbortedTimeout;
                return Ok(report);
            };

            let result = self
                .settle(gateway, account, account_type, &mut attempt, settlement, &ctx.cancel)
                .await?;
            report.stop = self.check_risk(account).await;
            report.attempts.push(attempt);

            if result.is_win() {
                report.terminal = TerminalState::won_at(stage);
                return Ok(report);
            }

            if report.stop.is_stop() {
                info!(%account, %stage, stop = %report.stop, "Stop reached, no further gales");
                report.terminal = TerminalState::LostFinal;
                return Ok(report);
            }

            match self.next_stage(signal, &options, stage) {
                Some(next) => {
                    info!(%account, from = %stage, to = %next, "Loss, escalating");
                    stage = next;
                }
                None => {
                    report.terminal = TerminalState::LostFinal;
                    return Ok(report);
                }
            }
        }
    }

    /// Next gale, if enabled for the account and scheduled by the signal.
    fn next_stage(
        &self,
        signal: &Signal,
        options: &BotOptions,
        stage: Stage,
    ) -> Option<Stage> {
        let next = stage.next()?;
        if !options.gale_enabled(next) {
            debug!(%next, "Gale disabled for account");
            return None;
        }
        if signal.time_for(next).is_none() && !self.config.gale_without_schedule {
            debug!(%next, "Signal has no time for gale");
            return None;
        }
        Some(next)
    }

    async fn read_balance(
        &self,
        gateway: &dyn BrokerGateway,
        account_type: AccountType,
    ) -> Option<Money> {
        match gateway.balance(account_type).await {
            Ok(balance) => Some(balance),
            Err(e) if e.is_unsupported() => None,
            Err(e) => {
                warn!(venue = gateway.name(), error = %e, "Balance read failed");
                None
            }
        }
    }

    /// Place the order, retrying once with the inverted pair on failure.
    async fn place_with_retry(
        &self,
        gateway: &dyn BrokerGateway,
        signal: &Signal,
        stake: Money,
        account_type: AccountType,
        stage: Stage,
    ) -> ExecutorResult<(OrderReceipt, String)> {
        let request = |symbol: &str| OrderRequest {
            symbol: symbol.to_string(),
            direction: signal.direction,
            stake,
            duration_seconds: signal.timeframe_seconds,
            account_type,
        };

        let first = match gateway.place_order(request(&signal.symbol)).await {
            Ok(receipt) => return Ok((receipt, signal.symbol.clone())),
            Err(e) => e,
        };
        warn!(symbol = %signal.symbol, %stage, error = %first, "Order placement failed");

        let inverted = invert_symbol(&signal.symbol);
        if !self.config.invert_symbol_retry || inverted == signal.symbol {
            return Err(placement_error(stage, &first));
        }

        info!(symbol = %signal.symbol, %inverted, %stage, "Retrying with inverted symbol");
        match gateway.place_order(request(&inverted)).await {
            Ok(receipt) => Ok((receipt, inverted)),
            Err(e) => Err(placement_error(stage, &e)),
        }
    }

    async fn record_open(&self, account: &AccountId, attempt: &TradeAttempt, receipt: &OrderReceipt) {
        let record = NewTradeRecord {
            account: account.clone(),
            order_id: attempt.order_id.clone(),
            symbol: attempt.symbol.clone(),
            direction: attempt.direction,
            stake: attempt.stake,
            open_price: receipt.open_price,
            status: TradeStatus::Open,
            opened_at: attempt.opened_at,
        };
        if let Err(e) = self.ledger.create_trade_record(record).await {
            Metrics::ledger_error("create_trade_record");
            warn!(%account, order_id = %attempt.order_id, error = %e, "Ledger create failed");
        }
    }

    /// Wait for the channel outcome while polling order status, then keep
    /// polling status once the outcome timeout has passed.
    ///
    /// `None` means the outcome can never be known.
    async fn await_outcome(
        &self,
        gateway: &dyn BrokerGateway,
        account: &AccountId,
        attempt: &TradeAttempt,
        mut slot: OutcomeSlot,
        cancel: &CancellationToken,
    ) -> ExecutorResult<Option<Settlement>> {
        let stage = attempt.stage;
        let timeout = self.config.outcome_timeout(stage);
        let poll = self.config.status_poll_interval();
        let started = Instant::now();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let account_label = account.to_string();
        let mut slot_open = true;
        let mut timed_out = false;
        // Cleared once the venue says it has no status endpoint.
        let mut status_supported = true;

        loop {
            let polling = status_supported
                && if timed_out {
                    self.config.fallback_polling
                } else {
                    self.config.poll_status_during_wait
                };

            if timed_out && !polling {
                if status_supported {
                    warn!(%account, %stage, order_id = %attempt.order_id, "Status polling disabled, giving up");
                } else {
                    warn!(
                        %account,
                        %stage,
                        order_id = %attempt.order_id,
                        venue = gateway.name(),
                        "Venue has no status endpoint, giving up"
                    );
                }
                return Ok(None);
            }

            tokio::select! {
                received = slot.recv(), if slot_open => match received {
                    Some(result) => {
                        Metrics::outcome_wait(stage.as_str(), started.elapsed().as_secs_f64());
                        info!(%account, %stage, order_id = %attempt.order_id, %result, "Outcome received");
                        return Ok(Some(Settlement { result, reported_pnl: None }));
                    }
                    None => {
                        warn!(%account, %stage, "Outcome slot replaced, relying on status");
                        slot_open = false;
                        continue;
                    }
                },
                () = &mut deadline, if !timed_out => {
                    timed_out = true;
                    let err = ExecutorError::CorrelationTimeout { stage, timeout_secs: timeout.as_secs() };
                    warn!(%account, order_id = %attempt.order_id, error = %err, "Outcome timeout");
                    continue;
                }
                () = tokio::time::sleep(poll), if polling => {}
                () = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            }

            match gateway.order_status(&attempt.order_id).await {
                Ok(report) => {
                    let result = match report.state {
                        OrderState::Pending => {
                            debug!(%account, order_id = %attempt.order_id, "Order still pending");
                            continue;
                        }
                        OrderState::Won => TradeResult::Win,
                        OrderState::Lost => TradeResult::Loss,
                        OrderState::Draw => TradeResult::Draw,
                    };
                    if timed_out {
                        Metrics::fallback_poll(&account_label);
                    }
                    Metrics::outcome_wait(stage.as_str(), started.elapsed().as_secs_f64());
                    info!(%account, %stage, order_id = %attempt.order_id, %result, timed_out, "Outcome from status poll");
                    return Ok(Some(Settlement { result, reported_pnl: report.pnl }));
                }
                Err(e) if e.is_unsupported() => {
                    debug!(%account, venue = gateway.name(), "Venue has no status endpoint");
                    status_supported = false;
                }
                Err(e) => {
                    warn!(%account, order_id = %attempt.order_id, error = %e, "Status poll failed");
                }
            }
        }
    }

    /// Determine PnL, write the ledger and accumulators. Returns the final result
    /// after any reclassification.
    async fn settle(
        &self,
        gateway: &dyn BrokerGateway,
        account: &AccountId,
        account_type: AccountType,
        attempt: &mut TradeAttempt,
        settlement: Settlement,
        cancel: &CancellationToken,
    ) -> ExecutorResult<TradeResult> {
        let account_label = account.to_string();
        let (result, pnl) = match settlement.result {
            TradeResult::Win => {
                let verified = self
                    .win_pnl(gateway, attempt, account_type, settlement.reported_pnl, cancel)
                    .await?;
                match verified {
                    Some(pnl) => (TradeResult::Win, pnl),
                    None => {
                        Metrics::reclassified(&account_label);
                        (TradeResult::Loss, -attempt.stake)
                    }
                }
            }
            TradeResult::Loss | TradeResult::Draw => (settlement.result, -attempt.stake),
        };

        if let Err(e) = attempt.settle(pnl) {
            error!(%account, order_id = %attempt.order_id, error = %e, "Attempt settled twice");
        }
        Metrics::attempt_settled(
            &account_label,
            attempt.stage.as_str(),
            &result.to_string(),
            pnl.inner().to_f64().unwrap_or(0.0),
        );

        let status = if result.is_win() {
            TradeStatus::Won(attempt.stage)
        } else {
            TradeStatus::Lost
        };
        info!(%account, stage = %attempt.stage, order_id = %attempt.order_id, %status, %pnl, "Attempt settled");

        if let Err(e) = self
            .ledger
            .update_trade_record(account, &attempt.order_id, status, pnl)
            .await
        {
            Metrics::ledger_error("update_trade_record");
            warn!(%account, order_id = %attempt.order_id, error = %e, "Ledger update failed");
        }

        let accumulated = if result.is_win() {
            if pnl.is_positive() {
                self.ledger.accumulate_win(account, pnl).await
            } else {
                Ok(())
            }
        } else {
            self.ledger.accumulate_loss(account, attempt.stake).await
        };
        if let Err(e) = accumulated {
            Metrics::ledger_error("accumulate");
            warn!(%account, order_id = %attempt.order_id, error = %e, "Ledger accumulate failed");
        }

        Ok(result)
    }

    /// PnL for a reported win, or `None` when the win must be reclassified.
    async fn win_pnl(
        &self,
        gateway: &dyn BrokerGateway,
        attempt: &TradeAttempt,
        account_type: AccountType,
        reported: Option<Money>,
        cancel: &CancellationToken,
    ) -> ExecutorResult<Option<Money>> {
        if let Some(pnl) = reported {
            return Ok(Some(pnl));
        }
        if let Some(pnl) = self.reported_pnl(gateway, attempt).await {
            return Ok(Some(pnl));
        }
        match self
            .pnl
            .resolve_win(gateway, attempt, account_type, cancel)
            .await?
        {
            PnlOutcome::Confirmed(pnl) => Ok(Some(pnl)),
            PnlOutcome::Unverified => Ok(Some(Money::ZERO)),
            PnlOutcome::Reclassified(_) => Ok(None),
        }
    }

    /// One best-effort status read for a venue-reported PnL.
    async fn reported_pnl(&self, gateway: &dyn BrokerGateway, attempt: &TradeAttempt) -> Option<Money> {
        match gateway.order_status(&attempt.order_id).await {
            Ok(report) if report.state == OrderState::Won => report.pnl,
            Ok(_) => None,
            Err(e) => {
                if !e.is_unsupported() {
                    debug!(order_id = %attempt.order_id, error = %e, "Status read for PnL failed");
                }
                None
            }
        }
    }

    async fn check_risk(&self, account: &AccountId) -> StopSignal {
        match self.governor.check(account).await {
            Ok(signal) => signal,
            Err(e) => {
                warn!(%account, error = %e, "Risk check failed");
                StopSignal::None
            }
        }
    }
}

fn placement_error(stage: Stage, e: &BrokerError) -> ExecutorError {
    ExecutorError::OrderPlacement {
        stage,
        reason: e.to_string(),
    }
}
