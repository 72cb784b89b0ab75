//! Prometheus metrics for the gale bot.
//!
//! Covers:
//! - Signal feed traffic and relay connection state
//! - Execution attempts, settlements and terminal states per account
//! - Outcome correlation (waits, discards, fallback polling)
//! - Risk stops and ledger failures
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    CounterVec, Gauge, GaugeVec, HistogramVec,
};

/// Relay connection state (1 = connected, 0 = disconnected).
pub static FEED_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("gale_feed_connected", "Signal relay connection state (1=connected)").unwrap()
});

/// Channel messages received.
/// Labels: kind (entry/result/gale_trigger/invalid)
pub static SIGNALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gale_signals_total",
        "Total channel messages received",
        &["kind"]
    )
    .unwrap()
});

/// Finished executions by terminal state.
pub static EXECUTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gale_executions_total",
        "Total executions by terminal state",
        &["account", "terminal"]
    )
    .unwrap()
});

/// Orders placed per stage.
pub static ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gale_attempts_total",
        "Total orders placed per stage",
        &["account", "stage"]
    )
    .unwrap()
});

/// Settled attempts by stage and result.
pub static SETTLED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gale_settled_total",
        "Total settled attempts",
        &["account", "stage", "result"]
    )
    .unwrap()
});

/// Session profit and loss per account.
pub static SESSION_PNL: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "gale_session_pnl",
        "Realized profit and loss since startup",
        &["account"]
    )
    .unwrap()
});

/// Outcomes resolved through broker status polling.
pub static FALLBACK_POLLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gale_fallback_polls_total",
        "Outcomes resolved by polling the broker",
        &["account"]
    )
    .unwrap()
});

/// Time from order placement to outcome.
pub static OUTCOME_WAIT_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "gale_outcome_wait_seconds",
        "Seconds between order placement and outcome",
        &["stage"],
        vec![5.0, 15.0, 30.0, 60.0, 90.0, 120.0, 300.0, 600.0]
    )
    .unwrap()
});

/// Wins reclassified to losses after balance verification.
pub static RECLASSIFIED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gale_reclassified_total",
        "Reported wins reclassified as losses",
        &["account"]
    )
    .unwrap()
});

/// Outcome events that matched no open attempt.
/// Labels: reason (no_open_trade/duplicate/stage_mismatch)
pub static OUTCOMES_DISCARDED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gale_outcomes_discarded_total",
        "Outcome events discarded",
        &["reason"]
    )
    .unwrap()
});

/// Stops triggered.
pub static RISK_STOPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gale_risk_stops_total",
        "Accounts stopped by stop-win or stop-loss",
        &["account", "signal"]
    )
    .unwrap()
});

/// Failed ledger writes.
pub static LEDGER_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gale_ledger_errors_total",
        "Ledger operations that failed",
        &["operation"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn feed_connected() {
        FEED_CONNECTED.set(1.0);
    }

    pub fn feed_disconnected() {
        FEED_CONNECTED.set(0.0);
    }

    /// Record a channel message by kind.
    pub fn signal_received(kind: &str) {
        SIGNALS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn execution_finished(account: &str, terminal: &str) {
        EXECUTIONS_TOTAL
            .with_label_values(&[account, terminal])
            .inc();
    }

    pub fn attempt_placed(account: &str, stage: &str) {
        ATTEMPTS_TOTAL.with_label_values(&[account, stage]).inc();
    }

    /// Record a settled attempt and fold its pnl into the session gauge.
    pub fn attempt_settled(account: &str, stage: &str, result: &str, pnl: f64) {
        SETTLED_TOTAL
            .with_label_values(&[account, stage, result])
            .inc();
        SESSION_PNL.with_label_values(&[account]).add(pnl);
    }

    pub fn fallback_poll(account: &str) {
        FALLBACK_POLLS_TOTAL.with_label_values(&[account]).inc();
    }

    pub fn outcome_wait(stage: &str, seconds: f64) {
        OUTCOME_WAIT_SECONDS
            .with_label_values(&[stage])
            .observe(seconds);
    }

    pub fn reclassified(account: &str) {
        RECLASSIFIED_TOTAL.with_label_values(&[account]).inc();
    }

    pub fn outcome_discarded(reason: &str) {
        OUTCOMES_DISCARDED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn risk_stop(account: &str, signal: &str) {
        RISK_STOPS_TOTAL.with_label_values(&[account, signal]).inc();
    }

    pub fn ledger_error(operation: &str) {
        LEDGER_ERRORS_TOTAL.with_label_values(&[operation]).inc();
    }
}
