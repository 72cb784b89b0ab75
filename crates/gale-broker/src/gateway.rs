//! Broker gateway trait and shared types.
//!
//! Provides a trait-based abstraction over binary-option venues. This allows
//! the execution engine to be driven by a scripted mock in tests and by
//! HTTP adapters in production.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use gale_core::{AccountType, Direction, Money};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::{BrokerError, BrokerResult};

pub use gale_core::BoxFuture;

/// Order to place on the venue.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub stake: Money,
    pub duration_seconds: u32,
    pub account_type: AccountType,
}

impl OrderRequest {
    /// Expiration formatted as "MM:SS".
    pub fn close_type(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.duration_seconds / 60,
            self.duration_seconds % 60
        )
    }
}

/// Venue acknowledgement of a placed order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub order_id: String,
    pub open_price: Option<Decimal>,
}

/// Normalized order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Pending,
    Won,
    Lost,
    Draw,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Order status as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStatusReport {
    pub state: OrderState,
    /// Realized PnL when the venue reports it.
    pub pnl: Option<Money>,
}

impl OrderStatusReport {
    pub fn pending() -> Self {
        Self {
            state: OrderState::Pending,
            pnl: None,
        }
    }
}

/// Trait for placing and tracking binary-option orders.
pub trait BrokerGateway: Send + Sync {
    /// Venue name for logs.
    fn name(&self) -> &'static str;

    /// Place an order.
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, BrokerResult<OrderReceipt>>;

    /// Current state of a previously placed order.
    ///
    /// Venues without a status endpoint return [`BrokerError::Unsupported`].
    fn order_status<'a>(&'a self, order_id: &'a str)
        -> BoxFuture<'a, BrokerResult<OrderStatusReport>>;

    /// Wallet balance for the account type.
    fn balance(&self, account_type: AccountType) -> BoxFuture<'_, BrokerResult<Money>>;
}

/// Arc wrapper for BrokerGateway trait objects.
pub type DynBrokerGateway = Arc<dyn BrokerGateway>;

// ============================================================================
// MockBrokerGateway
// ============================================================================

/// Scripted broker gateway for testing.
///
/// Placements succeed with generated ids unless a rejection is queued.
/// Balances are consumed in order; the last one repeats.
#[derive(Debug)]
pub struct MockBrokerGateway {
    placements: Mutex<Vec<OrderRequest>>,
    place_script: Mutex<VecDeque<Result<OrderReceipt, String>>>,
    statuses: Mutex<HashMap<String, VecDeque<OrderStatusReport>>>,
    balances: Mutex<VecDeque<Money>>,
    status_supported: AtomicBool,
    status_calls: AtomicU64,
    balance_calls: AtomicU64,
    next_id: AtomicU64,
}

impl Default for MockBrokerGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrokerGateway {
    pub fn new() -> Self {
        Self {
            placements: Mutex::new(Vec::new()),
            place_script: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(HashMap::new()),
            balances: Mutex::new(VecDeque::new()),
            status_supported: AtomicBool::new(true),
            status_calls: AtomicU64::new(0),
            balance_calls: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue a rejection for the next placement.
    pub fn reject_next_order(&self, reason: impl Into<String>) {
        self.place_script.lock().push_back(Err(reason.into()));
    }

    /// Queue a specific receipt for the next placement.
    pub fn accept_next_order(&self, order_id: impl Into<String>) {
        self.place_script.lock().push_back(Ok(OrderReceipt {
            order_id: order_id.into(),
            open_price: None,
        }));
    }

    /// Queue status reports for an order id. The last one repeats.
    pub fn push_statuses(&self, order_id: &str, reports: Vec<OrderStatusReport>) {
        self.statuses
            .lock()
            .entry(order_id.to_string())
            .or_default()
            .extend(reports);
    }

    /// Queue balances. The last one repeats.
    pub fn push_balances(&self, balances: Vec<Money>) {
        self.balances.lock().extend(balances);
    }

    pub fn set_status_supported(&self, supported: bool) {
        self.status_supported.store(supported, Ordering::SeqCst);
    }

    /// Recorded placement requests, including rejected ones.
    pub fn placements(&self) -> Vec<OrderRequest> {
        self.placements.lock().clone()
    }

    pub fn status_calls(&self) -> u64 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> u64 {
        self.balance_calls.load(Ordering::SeqCst)
    }

    fn pop_sticky<T: Copy>(queue: &mut VecDeque<T>) -> Option<T> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        }
    }
}

impl BrokerGateway for MockBrokerGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, BrokerResult<OrderReceipt>> {
        Box::pin(async move {
            self.placements.lock().push(request);
            match self.place_script.lock().pop_front() {
                Some(Ok(receipt)) => Ok(receipt),
                Some(Err(reason)) => Err(BrokerError::Rejected(reason)),
                None => {
                    let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                    Ok(OrderReceipt {
                        order_id: format!("mock-{n}"),
                        open_price: None,
                    })
                }
            }
        })
    }

    fn order_status<'a>(
        &'a self,
        order_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<OrderStatusReport>> {
        Box::pin(async move {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if !self.status_supported.load(Ordering::SeqCst) {
                return Err(BrokerError::Unsupported {
                    venue: "mock",
                    operation: "order_status",
                });
            }
            let mut statuses = self.statuses.lock();
            Ok(statuses
                .get_mut(order_id)
                .and_then(Self::pop_sticky)
                .unwrap_or_else(OrderStatusReport::pending))
        })
    }

    fn balance(&self, _account_type: AccountType) -> BoxFuture<'_, BrokerResult<Money>> {
        Box::pin(async move {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            Self::pop_sticky(&mut self.balances.lock())
                .ok_or_else(|| BrokerError::HttpClient("balance unavailable".to_string()))
        })
    }
}
