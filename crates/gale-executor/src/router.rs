//! Outcome rendezvous.
//!
//! The channel consumer and the execution waiting for a result never share a
//! global "last result". Instead the execution arms a single-slot channel for
//! the stage it is about to place, before placing it, and the consumer
//! delivers into whatever slot is armed. Each slot accepts exactly one
//! outcome; anything else is reported back so the caller can count it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gale_core::{OutcomeEvent, Stage, TradeResult};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What happened to a delivered outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the waiting attempt.
    Delivered,
    /// No attempt is waiting.
    NoOpenTrade,
    /// The waiting attempt already has its outcome.
    Duplicate,
    /// The event refers to a different stage than the one awaited.
    StageMismatch,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::NoOpenTrade => "no_open_trade",
            Self::Duplicate => "duplicate",
            Self::StageMismatch => "stage_mismatch",
        }
    }
}

struct Armed {
    generation: u64,
    stage: Stage,
    tx: mpsc::Sender<TradeResult>,
    filled: bool,
}

/// Per-account outcome router.
#[derive(Default)]
pub struct OutcomeRouter {
    slot: Mutex<Option<Armed>>,
    generation: AtomicU64,
}

impl OutcomeRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Open a slot for `stage`, replacing any previous one.
    pub fn arm(self: &Arc<Self>, stage: Stage) -> OutcomeSlot {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel(1);

        let previous = self.slot.lock().replace(Armed {
            generation,
            stage,
            tx,
            filled: false,
        });
        if let Some(previous) = previous {
            warn!(previous = %previous.stage, %stage, "Replacing armed outcome slot");
        }
        debug!(%stage, generation, "Outcome slot armed");

        OutcomeSlot {
            router: Arc::clone(self),
            generation,
            stage,
            rx,
        }
    }

    /// Stage currently waiting for an outcome.
    pub fn armed_stage(&self) -> Option<Stage> {
        self.slot.lock().as_ref().map(|a| a.stage)
    }

    /// Route an outcome event to the waiting attempt.
    pub fn deliver(&self, event: OutcomeEvent) -> Delivery {
        let mut guard = self.slot.lock();
        let Some(armed) = guard.as_mut() else {
            return Delivery::NoOpenTrade;
        };
        let Some(result) = event.result_for(armed.stage) else {
            return Delivery::StageMismatch;
        };
        if armed.filled {
            return Delivery::Duplicate;
        }

        match armed.tx.try_send(result) {
            Ok(()) => {
                armed.filled = true;
                Delivery::Delivered
            }
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Duplicate,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::NoOpenTrade,
        }
    }

    fn disarm(&self, generation: u64) {
        let mut guard = self.slot.lock();
        if guard.as_ref().is_some_and(|a| a.generation == generation) {
            *guard = None;
        }
    }
}

/// Receiving end held by the waiting attempt. Disarms on drop.
pub struct OutcomeSlot {
    router: Arc<OutcomeRouter>,
    generation: u64,
    stage: Stage,
    rx: mpsc::Receiver<TradeResult>,
}

impl OutcomeSlot {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Wait for the outcome. `None` only if the router replaced this slot.
    pub async fn recv(&mut self) -> Option<TradeResult> {
        self.rx.recv().await
    }
}

impl Drop for OutcomeSlot {
    fn drop(&mut self) {
        self.router.disarm(self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outcome_before_recv_is_kept() {
        let router = OutcomeRouter::new();
        let mut slot = router.arm(Stage::Entry);

        assert_eq!(
            router.deliver(OutcomeEvent::result(TradeResult::Win)),
            Delivery::Delivered
        );
        assert_eq!(slot.recv().await, Some(TradeResult::Win));
    }

    #[tokio::test]
    async fn test_second_outcome_is_duplicate() {
        let router = OutcomeRouter::new();
        let mut slot = router.arm(Stage::Entry);

        router.deliver(OutcomeEvent::result(TradeResult::Loss));
        assert_eq!(
            router.deliver(OutcomeEvent::result(TradeResult::Win)),
            Delivery::Duplicate
        );
        assert_eq!(slot.recv().await, Some(TradeResult::Loss));
        // Still a duplicate after the first was consumed.
        assert_eq!(
            router.deliver(OutcomeEvent::result(TradeResult::Win)),
            Delivery::Duplicate
        );
    }

    #[test]
    fn test_no_open_trade() {
        let router = OutcomeRouter::new();
        assert_eq!(
            router.deliver(OutcomeEvent::result(TradeResult::Win)),
            Delivery::NoOpenTrade
        );

        let slot = router.arm(Stage::Entry);
        assert_eq!(router.armed_stage(), Some(Stage::Entry));
        drop(slot);
        assert_eq!(router.armed_stage(), None);
        assert_eq!(
            router.deliver(OutcomeEvent::result(TradeResult::Win)),
            Delivery::NoOpenTrade
        );
    }

    #[test]
    fn test_stage_mismatch_discarded() {
        let router = OutcomeRouter::new();
        let _slot = router.arm(Stage::Gale1);

        let gale2_win = OutcomeEvent::Result {
            result: TradeResult::Win,
            stage: Some(Stage::Gale2),
        };
        assert_eq!(router.deliver(gale2_win), Delivery::StageMismatch);
        // GALE_TRIGGER 1 settles the entry, not gale 1.
        assert_eq!(
            router.deliver(OutcomeEvent::GaleTrigger { step: 1 }),
            Delivery::StageMismatch
        );
        assert_eq!(
            router.deliver(OutcomeEvent::GaleTrigger { step: 2 }),
            Delivery::Delivered
        );
    }

    #[test]
    fn test_stale_slot_drop_keeps_new_slot() {
        let router = OutcomeRouter::new();
        let old = router.arm(Stage::Entry);
        let _new = router.arm(Stage::Gale1);
        drop(old);
        assert_eq!(router.armed_stage(), Some(Stage::Gale1));
    }
}
