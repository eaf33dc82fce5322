use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::domain::entries::Identifier;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "rwlock.read",
                result = "poisoned_recovered",
                hint = "index may be stale after panic in another thread",
                "Recovered from poisoned cache index lock"
            );
            poisoned.into_inner()
        }
    }
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "rwlock.write",
                result = "poisoned_recovered",
                hint = "index may be stale after panic in another thread",
                "Recovered from poisoned cache index lock"
            );
            poisoned.into_inner()
        }
    }
}

/// Per-identifier async mutexes.
///
/// Operations on the same identifier serialise; different identifiers never
/// contend. A slot is dropped from the map once its last guard is released.
#[derive(Debug, Default)]
pub(crate) struct EntryLocks {
    slots: Arc<DashMap<Identifier, Arc<Mutex<()>>>>,
}

impl EntryLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, identifier: &Identifier) -> EntryGuard {
        let slot = self
            .slots
            .entry(identifier.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;
        EntryGuard {
            identifier: identifier.clone(),
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

pub(crate) struct EntryGuard {
    identifier: Identifier,
    slots: Arc<DashMap<Identifier, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or awaits this slot.
        self.slots
            .remove_if(&self.identifier, |_, slot| Arc::strong_count(slot) == 1);
    }
}
