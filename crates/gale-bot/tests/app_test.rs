//! Application event loop tests.
//!
//! Drives the loop with raw channel payloads and checks what reaches the
//! broker and the ledger for each configured account.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gale_bot::app::Components;
use gale_bot::{AppConfig, Application};
use gale_broker::{DynBrokerGateway, MockBrokerGateway, OrderState, OrderStatusReport};
use gale_core::{AccountId, BotOptions, Money, TradeStatus};
use gale_ledger::MockLedger;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
    [channel]
    url = "ws://127.0.0.1:1"

    [broker]
    venue = "digital"
    base_url = "http://127.0.0.1:1"

    [ledger]
    base_url = "http://127.0.0.1:1"
    username = "bot"

    [[accounts]]
    user_id = "1"
    brokerage_id = "7"

    [[accounts]]
    user_id = "2"
    brokerage_id = "7"
"#;

const ENTRY: &str =
    r#"{"type":"entry","symbol":"EURUSD","direction":"BUY","expiration":"01:00"}"#;

fn alice() -> AccountId {
    AccountId::new("1", "7")
}

fn bob() -> AccountId {
    AccountId::new("2", "7")
}

fn options(stop_loss: Money) -> BotOptions {
    BotOptions {
        stake: Some(Money(dec!(10))),
        is_demo: true,
        gale1_enabled: true,
        gale2_enabled: true,
        stop_win: Some(Money(dec!(1000))),
        stop_loss: Some(stop_loss),
    }
}

struct Running {
    alice_gateway: Arc<MockBrokerGateway>,
    bob_gateway: Arc<MockBrokerGateway>,
    ledger: Arc<MockLedger>,
    tx: mpsc::Sender<String>,
    shutdown: CancellationToken,
    handle: JoinHandle<Application>,
}

impl Running {
    /// Placements across both accounts' broker sessions.
    fn placements(&self) -> usize {
        self.alice_gateway.placements().len() + self.bob_gateway.placements().len()
    }
}

fn start(alice_stop_loss: Money) -> Running {
    let alice_gateway = Arc::new(MockBrokerGateway::new());
    let bob_gateway = Arc::new(MockBrokerGateway::new());
    let gateways: HashMap<AccountId, DynBrokerGateway> = HashMap::from([
        (alice(), alice_gateway.clone() as DynBrokerGateway),
        (bob(), bob_gateway.clone() as DynBrokerGateway),
    ]);
    let ledger = Arc::new(MockLedger::new());
    ledger.set_options(&alice(), options(alice_stop_loss));
    ledger.set_options(&bob(), options(Money(dec!(1000))));

    let config = AppConfig::from_toml(CONFIG).unwrap();
    let mut app = Application::with_components(
        config,
        Components {
            gateways,
            ledger: ledger.clone(),
            options: ledger.clone(),
            notifier: None,
        },
    )
    .unwrap();

    let (tx, rx) = mpsc::channel(16);
    let shutdown = app.shutdown_token();
    let handle = tokio::spawn(async move {
        app.serve(rx, None).await;
        app.finish().await;
        app
    });

    Running {
        alice_gateway,
        bob_gateway,
        ledger,
        tx,
        shutdown,
        handle,
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn won(pnl: Money) -> Vec<OrderStatusReport> {
    vec![OrderStatusReport {
        state: OrderState::Won,
        pnl: Some(pnl),
    }]
}

#[tokio::test(start_paused = true)]
async fn test_entry_executes_for_every_account() {
    let r = start(Money(dec!(1000)));
    r.alice_gateway.push_statuses("mock-1", won(Money(dec!(8.50))));
    r.bob_gateway.push_statuses("mock-1", won(Money(dec!(8.50))));

    r.tx.send(ENTRY.to_string()).await.unwrap();
    wait_until(|| r.placements() == 2).await;

    r.tx.send(r#"{"type":"result","result":"WIN"}"#.to_string())
        .await
        .unwrap();
    wait_until(|| r.ledger.updates().len() == 2).await;

    for (_, status, pnl) in r.ledger.updates() {
        assert_eq!(status, TradeStatus::Won(gale_core::Stage::Entry));
        assert_eq!(pnl, Money(dec!(8.50)));
    }
    assert_eq!(r.ledger.risk_state(&alice()).win_accum, Money(dec!(8.50)));
    assert_eq!(r.ledger.risk_state(&bob()).win_accum, Money(dec!(8.50)));

    r.shutdown.cancel();
    let app = r.handle.await.unwrap();
    assert_eq!(app.signal_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_each_account_trades_on_its_own_gateway() {
    let r = start(Money(dec!(1000)));
    // Neither venue session reports status; PnL comes from each wallet.
    r.alice_gateway.set_status_supported(false);
    r.bob_gateway.set_status_supported(false);
    r.alice_gateway
        .push_balances(vec![Money(dec!(100)), Money(dec!(108.50))]);
    r.bob_gateway.push_balances(vec![Money(dec!(50))]);

    r.tx.send(ENTRY.to_string()).await.unwrap();
    wait_until(|| {
        r.alice_gateway.placements().len() == 1 && r.bob_gateway.placements().len() == 1
    })
    .await;
    r.tx.send(r#"{"type":"result","result":"WIN"}"#.to_string())
        .await
        .unwrap();
    wait_until(|| r.ledger.updates().len() == 2).await;

    let updates: Vec<_> = r
        .ledger
        .updates()
        .into_iter()
        .map(|(_, status, pnl)| (status, pnl))
        .collect();
    assert!(updates.contains(&(TradeStatus::Won(gale_core::Stage::Entry), Money(dec!(8.50)))));
    assert!(updates.contains(&(TradeStatus::Lost, Money(dec!(-10)))));
    assert_eq!(r.alice_gateway.balance_calls(), 2);

    assert_eq!(r.ledger.risk_state(&alice()).win_accum, Money(dec!(8.50)));
    assert_eq!(r.ledger.risk_state(&bob()).win_accum, Money::ZERO);
    assert_eq!(r.ledger.risk_state(&bob()).loss_accum, Money(dec!(10)));

    r.shutdown.cancel();
    r.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_missing_gateway_is_config_error() {
    let ledger = Arc::new(MockLedger::new());
    let gateway: DynBrokerGateway = Arc::new(MockBrokerGateway::new());
    let result = Application::with_components(
        AppConfig::from_toml(CONFIG).unwrap(),
        Components {
            gateways: HashMap::from([(alice(), gateway)]),
            ledger: ledger.clone(),
            options: ledger,
            notifier: None,
        },
    );
    let err = result.err().unwrap();
    assert!(err.to_string().contains("no broker gateway for account 2/7"));
}

#[tokio::test(start_paused = true)]
async fn test_stopped_account_skips_later_signals() {
    let r = start(Money(dec!(10)));

    r.tx.send(ENTRY.to_string()).await.unwrap();
    wait_until(|| r.placements() == 2).await;
    r.tx.send(r#"{"type":"result","result":"LOSS"}"#.to_string())
        .await
        .unwrap();
    wait_until(|| r.ledger.updates().len() == 2).await;
    // Give both executions time to finish and release their accounts.
    tokio::time::sleep(Duration::from_secs(1)).await;

    r.tx.send(ENTRY.to_string()).await.unwrap();
    wait_until(|| r.placements() == 3).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(r.placements(), 3);

    r.shutdown.cancel();
    let app = r.handle.await.unwrap();
    assert!(app.stop_latch().is_stopped(&alice()));
    assert!(!app.stop_latch().is_stopped(&bob()));
    assert_eq!(app.signal_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_bad_payloads_and_stray_outcomes_are_ignored() {
    let r = start(Money(dec!(1000)));

    for payload in [
        "not json",
        r#"{"type":"heartbeat"}"#,
        r#"{"type":"entry","symbol":"EURUSD","direction":"HOLD","expiration":"01:00"}"#,
        r#"{"type":"result","result":"WIN"}"#,
        r#"{"type":"gale","gale":1}"#,
    ] {
        r.tx.send(payload.to_string()).await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(r.placements() == 0);

    r.tx.send(ENTRY.to_string()).await.unwrap();
    wait_until(|| r.placements() == 2).await;

    r.shutdown.cancel();
    let app = r.handle.await.unwrap();
    assert_eq!(app.signal_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_busy_account_drops_overlapping_entry() {
    let r = start(Money(dec!(1000)));

    r.tx.send(ENTRY.to_string()).await.unwrap();
    wait_until(|| r.placements() == 2).await;
    r.tx.send(ENTRY.to_string()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(r.placements(), 2);

    r.shutdown.cancel();
    let app = r.handle.await.unwrap();
    assert_eq!(app.signal_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_in_flight_executions() {
    let r = start(Money(dec!(1000)));

    r.tx.send(ENTRY.to_string()).await.unwrap();
    wait_until(|| r.placements() == 2).await;

    r.shutdown.cancel();
    r.handle.await.unwrap();

    assert_eq!(r.ledger.records().len(), 2);
    assert!(r.ledger.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_closed_channel_ends_loop() {
    let r = start(Money(dec!(1000)));
    drop(r.tx);
    let app = r.handle.await.unwrap();
    assert_eq!(app.signal_count(), 0);
}
