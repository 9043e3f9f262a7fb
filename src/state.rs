//! Shared per-session state containers
//!
//! The partition-state map is the only resource shared between a session's
//! extraction tasks, the verification pipeline, and observer-facing snapshot
//! building. All mutation goes through [`StateMap::update`], a closure-based
//! read-modify-write under one lock, so a cancel racing a progress event is
//! resolved entirely by update order rather than by two stale reads racing
//! each other.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::types::PartitionState;

/// Concurrent map of partition name to [`PartitionState`]
///
/// Cloning is cheap and shares the underlying map. The lock is held only for
/// the duration of one closure; it is never held across an await point or an
/// engine call.
#[derive(Clone, Default)]
pub(crate) struct StateMap {
    inner: Arc<Mutex<BTreeMap<String, PartitionState>>>,
}

impl StateMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replace the entire map with fresh states for the given partitions
    pub(crate) fn seed(&self, partitions: impl IntoIterator<Item = crate::manifest::Partition>) {
        let mut map = self.lock();
        map.clear();
        for partition in partitions {
            map.insert(partition.name.clone(), PartitionState::new(partition));
        }
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    /// Clone of one partition's current state
    pub(crate) fn get(&self, name: &str) -> Option<PartitionState> {
        self.lock().get(name).cloned()
    }

    /// Atomic read-modify-write on one partition's state.
    ///
    /// Returns false (without running the closure) when the partition is
    /// unknown, so updates for partitions removed by a reset are dropped
    /// rather than resurrected.
    pub(crate) fn update(&self, name: &str, f: impl FnOnce(&mut PartitionState)) -> bool {
        let mut map = self.lock();
        match map.get_mut(name) {
            Some(state) => {
                f(state);
                true
            }
            None => false,
        }
    }

    /// Names of all known partitions
    pub(crate) fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Full clone of the map, for snapshot publication
    pub(crate) fn clone_map(&self) -> BTreeMap<String, PartitionState> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, PartitionState>> {
        // A poisoned lock only means a task panicked mid-update; the map is
        // still structurally sound, so recover the guard.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One cancellation token per in-flight partition
///
/// A fresh token is installed at the start of each extraction attempt,
/// replacing whatever the previous attempt left behind. Tokens are observed
/// cooperatively: by the progress bridge on every engine event and by the
/// extraction task immediately after permit acquisition.
#[derive(Clone, Default)]
pub(crate) struct CancelRegistry {
    inner: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl CancelRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Install and return a fresh token for a new extraction attempt
    pub(crate) fn begin(&self, name: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.lock().insert(name.to_string(), token.clone());
        token
    }

    /// Cancel the token for one partition, if any attempt is registered
    pub(crate) fn cancel(&self, name: &str) -> bool {
        match self.lock().get(name) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered token (used by reset)
    pub(crate) fn cancel_all(&self) {
        for token in self.lock().values() {
            token.cancel();
        }
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
