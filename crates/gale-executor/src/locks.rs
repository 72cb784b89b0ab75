//! Per-account execution locks.

use std::sync::Arc;

use dashmap::DashMap;
use gale_core::AccountId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per account. Accounts never block each other.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the account.
    pub async fn acquire(&self, account: &AccountId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(account.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub fn is_locked(&self, account: &AccountId) -> bool {
        self.locks
            .get(account)
            .is_some_and(|l| l.try_lock().is_err())
    }
}
