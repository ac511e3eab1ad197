//! Debounced, cancellable delayed notifications
//!
//! [`DelayedNotifier`] keeps at most one pending task per key. Arming a key
//! that is already pending replaces the earlier task. A task that fires
//! removes its own entry before running, and only if the entry still belongs
//! to it, so a fire racing a cancel or a re-arm has exactly one winner.

use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct PendingTask {
    /// Distinguishes successive armings of the same key
    id: u64,
    handle: JoinHandle<()>,
}

type PendingMap<K> = Mutex<HashMap<K, PendingTask>>;

pub struct DelayedNotifier<K> {
    pending: Arc<PendingMap<K>>,
    next_id: AtomicU64,
}

impl<K> DelayedNotifier<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Runs `action` after `delay` unless cancelled first
    ///
    /// Any task still pending for `key` is aborted and replaced. Must be
    /// called from within a tokio runtime.
    pub fn arm<F>(&self, key: K, delay: Duration, action: F) -> PendingReport<K>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(&self.pending);
        let deadline = Instant::now() + delay;

        let mut pending = self.pending.lock();
        let handle = {
            let weak = weak.clone();
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if take_if_current(&weak, &key, id) {
                    action();
                }
            })
        };

        if let Some(previous) = pending.insert(key.clone(), PendingTask { id, handle }) {
            debug!("Replacing pending notification for {:?}", key);
            previous.handle.abort();
        }

        PendingReport {
            key,
            id,
            pending: weak,
        }
    }

    /// Cancels every pending task whose key matches, returning true if any was
    pub fn cancel_matching<P>(&self, mut predicate: P) -> bool
    where
        P: FnMut(&K) -> bool,
    {
        let mut pending = self.pending.lock();
        let mut cancelled = false;
        pending.retain(|key, task| {
            if predicate(key) {
                debug!("Cancelling pending notification for {:?}", key);
                task.handle.abort();
                cancelled = true;
                false
            } else {
                true
            }
        });
        cancelled
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<K> Default for DelayedNotifier<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for DelayedNotifier<K> {
    fn drop(&mut self) {
        for (_, task) in self.pending.lock().drain() {
            task.handle.abort();
        }
    }
}

/// Removes the entry for `key` if it is still arming `id`
fn take_if_current<K: Eq + Hash>(pending: &Weak<PendingMap<K>>, key: &K, id: u64) -> bool {
    let Some(pending) = pending.upgrade() else {
        return false;
    };
    let mut pending = pending.lock();
    match pending.get(key) {
        Some(task) if task.id == id => {
            pending.remove(key);
            true
        }
        _ => false,
    }
}

/// Cancellation token for one arming of a key
///
/// Cancelling is a no-op once the task has fired or the key was re-armed.
#[derive(Debug)]
pub struct PendingReport<K> {
    key: K,
    id: u64,
    pending: Weak<PendingMap<K>>,
}

impl<K: Eq + Hash> PendingReport<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns true if this call prevented the action from running
    pub fn cancel(&self) -> bool {
        let Some(pending) = self.pending.upgrade() else {
            return false;
        };
        let mut pending = pending.lock();
        match pending.get(&self.key) {
            Some(task) if task.id == self.id => {
                task.handle.abort();
                pending.remove(&self.key);
                true
            }
            _ => false,
        }
    }
}
