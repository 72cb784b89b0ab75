//! Shared harness for execution engine tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use gale_broker::MockBrokerGateway;
use gale_core::{AccountId, BotOptions, ClockTime, Direction, Money, Signal, Stage};
use gale_executor::{
    Clock, EngineConfig, ExecutionContext, ExecutionEngine, ExecutionReport, ExecutorResult, MockClock,
    OutcomeRouter, Scheduler,
};
use gale_ledger::MockLedger;
use gale_risk::{MockStopNotifier, RiskGovernor, StopLatch};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Harness {
    /// Broker session of the primary account.
    pub gateway: Arc<MockBrokerGateway>,
    pub ledger: Arc<MockLedger>,
    pub latch: Arc<StopLatch>,
    pub notifier: Arc<MockStopNotifier>,
    pub engine: Arc<ExecutionEngine>,
    pub ctx: ExecutionContext,
    clock: Arc<MockClock>,
}

pub fn money(v: i64) -> Money {
    Money(Decimal::from(v))
}

pub fn options(stake: i64, gale1: bool, gale2: bool) -> BotOptions {
    BotOptions {
        stake: Some(money(stake)),
        is_demo: true,
        gale1_enabled: gale1,
        gale2_enabled: gale2,
        stop_win: Some(money(1000)),
        stop_loss: Some(money(1000)),
    }
}

/// EURUSD signal with both gales scheduled at a time already past.
pub fn signal() -> Signal {
    let past = ClockTime::new(0, 0).ok();
    Signal::new("EURUSD", Direction::Buy, 60).with_gale_times(past, past)
}

impl Harness {
    pub fn new(options: BotOptions) -> Self {
        Self::with_config(options, EngineConfig::default())
    }

    pub fn with_config(options: BotOptions, config: EngineConfig) -> Self {
        let gateway = Arc::new(MockBrokerGateway::new());
        let ledger = Arc::new(MockLedger::new());
        let latch = Arc::new(StopLatch::new());
        let notifier = Arc::new(MockStopNotifier::new());
        let account = AccountId::new("42", "7");
        ledger.set_options(&account, options);

        let governor = Arc::new(
            RiskGovernor::new(ledger.clone(), latch.clone()).with_notifier(notifier.clone()),
        );
        // 12:00 in Sao Paulo.
        let clock = Arc::new(MockClock::starting_at(
            Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap(),
        ));
        let scheduler = Scheduler::new(
            chrono_tz::America::Sao_Paulo,
            Duration::from_secs(5),
            clock.clone(),
        );

        let engine = Arc::new(ExecutionEngine::new(
            ledger.clone(),
            ledger.clone(),
            governor,
            scheduler,
            config,
        ));
        let ctx = ExecutionContext::new(
            account,
            gateway.clone(),
            OutcomeRouter::new(),
            CancellationToken::new(),
        );

        Self {
            gateway,
            ledger,
            latch,
            notifier,
            engine,
            ctx,
            clock,
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.ctx.account
    }

    /// Register another account on the same engine and ledger, with its own
    /// broker session and outcome router.
    pub fn add_account(
        &self,
        account: AccountId,
        options: BotOptions,
    ) -> (ExecutionContext, Arc<MockBrokerGateway>) {
        self.ledger.set_options(&account, options);
        let gateway = Arc::new(MockBrokerGateway::new());
        let ctx = ExecutionContext::new(
            account,
            gateway.clone(),
            OutcomeRouter::new(),
            CancellationToken::new(),
        );
        (ctx, gateway)
    }

    pub fn spawn(&self, signal: Signal) -> JoinHandle<ExecutorResult<ExecutionReport>> {
        self.spawn_for(&self.ctx, signal)
    }

    pub fn spawn_for(
        &self,
        ctx: &ExecutionContext,
        signal: Signal,
    ) -> JoinHandle<ExecutorResult<ExecutionReport>> {
        let engine = self.engine.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { engine.execute(&signal, &ctx).await })
    }

    /// Current wall-clock time as seen by the scheduler.
    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// Wait until `stage` is armed and its order has been placed.
    pub async fn wait_for_order(&self, stage: Stage, placements: usize) {
        loop {
            if self.ctx.router.armed_stage() == Some(stage)
                && self.gateway.placements().len() >= placements
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
