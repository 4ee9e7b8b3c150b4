use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Per-key lock state: the mutex plus the number of tasks holding or waiting on it.
struct LockEntry {
    mutex: Arc<Mutex<()>>,
    refs: AtomicUsize,
}

impl LockEntry {
    fn new() -> Self {
        Self {
            mutex: Arc::new(Mutex::new(())),
            refs: AtomicUsize::new(0),
        }
    }
}

/// Mutual exclusion scoped to an arbitrary string key.
///
/// Tasks locking the same key run one at a time; tasks on different keys never
/// contend. Entries are created on first use and removed as soon as the last
/// holder or waiter goes away, so the registry does not grow with the number of
/// distinct keys ever seen.
///
/// The registry is a plain value: construct one and share it by cloning (clones
/// share state). Independent registries never interact.
#[derive(Clone, Default)]
pub struct KeyedMutex {
    entries: Arc<DashMap<String, Arc<LockEntry>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for the current holder if any.
    ///
    /// The returned guard releases the lock when dropped. Dropping this future
    /// before it resolves (e.g. under `tokio::time::timeout`) gives up the
    /// reference without ever holding the lock.
    pub async fn lock(&self, key: impl Into<String>) -> KeyedGuard {
        let key = key.into();

        // The count is bumped while the shard is write-locked, so a concurrent
        // release can never remove an entry someone is about to wait on.
        let entry = {
            let slot = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(LockEntry::new()));
            slot.refs.fetch_add(1, Ordering::AcqRel);
            Arc::clone(slot.value())
        };

        let reference = EntryRef {
            registry: self.clone(),
            key,
            entry,
        };
        let guard = Arc::clone(&reference.entry.mutex).lock_owned().await;
        trace!(key = %reference.key, "keyed lock acquired");

        KeyedGuard {
            _guard: guard,
            reference,
        }
    }

    /// Number of keys with live lock state (holders or waiters).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A counted reference to a registry entry. Dropping the last one removes the entry.
struct EntryRef {
    registry: KeyedMutex,
    key: String,
    entry: Arc<LockEntry>,
}

impl Drop for EntryRef {
    fn drop(&mut self) {
        if self.entry.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            let entry = &self.entry;
            self.registry.entries.remove_if(&self.key, |_, current| {
                Arc::ptr_eq(current, entry) && current.refs.load(Ordering::Acquire) == 0
            });
        }
    }
}

/// Holds a [`KeyedMutex`] lock until dropped.
pub struct KeyedGuard {
    // Field order matters: the mutex is unlocked before the reference is released.
    _guard: OwnedMutexGuard<()>,
    reference: EntryRef,
}

impl KeyedGuard {
    pub fn key(&self) -> &str {
        &self.reference.key
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        trace!(key = %self.reference.key, "keyed lock released");
    }
}
