//! Commitment list cache
//!
//! Deposits are append-only, so a cached list whose length equals the
//! on-chain deposit counter is the current list. Each network gets its own
//! slot behind an async mutex; a resolver holds the slot while it refetches,
//! so concurrent misses on one network cost one fetch.

use std::sync::Arc;

use dashmap::DashMap;
use shade_privacy::Felt;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub(crate) type Slot = Arc<Mutex<Option<Arc<Vec<Felt>>>>>;

#[derive(Debug, Default)]
pub struct CommitmentCache {
    slots: DashMap<String, Slot>,
}

impl CommitmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, network: &str) -> Slot {
        self.slots.entry(network.to_string()).or_default().clone()
    }

    /// Exclusive access to one network's entry
    pub(crate) async fn lock(&self, network: &str) -> OwnedSlotGuard {
        let slot = self.slot(network);
        OwnedSlotGuard {
            guard: slot.lock_owned().await,
        }
    }

    /// Cached commitments for `network`, if any
    pub async fn get(&self, network: &str) -> Option<Arc<Vec<Felt>>> {
        self.slot(network).lock().await.clone()
    }

    /// Number of cached commitments for `network`
    pub async fn len(&self, network: &str) -> Option<usize> {
        self.get(network).await.map(|c| c.len())
    }

    /// Forget `network`'s list; the next resolution refetches it
    pub async fn invalidate(&self, network: &str) {
        *self.slot(network).lock().await = None;
    }

    pub async fn invalidate_all(&self) {
        let slots: Vec<Slot> = self.slots.iter().map(|entry| entry.value().clone()).collect();
        for slot in slots {
            *slot.lock().await = None;
        }
    }
}

pub(crate) struct OwnedSlotGuard {
    guard: OwnedMutexGuard<Option<Arc<Vec<Felt>>>>,
}

impl OwnedSlotGuard {
    pub(crate) fn cached(&self) -> Option<&Arc<Vec<Felt>>> {
        self.guard.as_ref()
    }

    pub(crate) fn store(&mut self, commitments: Arc<Vec<Felt>>) {
        *self.guard = Some(commitments);
    }
}
