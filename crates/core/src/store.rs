//! Keyed record storage.
//!
//! Services never hold global maps directly; they are handed a
//! `KeyedStore<V>` so the same logic runs against the in-memory table here,
//! a test double, or an external store.
//!
//! Every mutation goes through `update`, which is an atomic
//! read-modify-write of a single key. No operation spans two keys.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;

/// How long a record should physically outlive its logical expiry.
///
/// `None` means the record is kept until explicitly removed.
pub trait Retention {
    fn retain_until(&self) -> Option<DateTime<Utc>>;
}

/// Keyed table with per-key atomic updates.
pub trait KeyedStore<V>: Send + Sync {
    /// Returns a copy of the record, if present.
    fn get(&self, key: &str) -> Result<Option<V>>;

    /// Atomically reads and rewrites one record.
    ///
    /// `apply` sees the current value (`None` if absent) and may replace it,
    /// mutate it in place, or set it to `None` to delete it.
    fn update(&self, key: &str, apply: &mut dyn FnMut(&mut Option<V>)) -> Result<()>;

    /// Deletes a record. Returns whether one existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Deletes every record whose retention ended before `cutoff`.
    fn purge(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Number of records currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs a one-shot closure through `KeyedStore::update` and returns its output.
pub fn modify<S, V, T>(store: &S, key: &str, f: impl FnOnce(&mut Option<V>) -> T) -> Result<T>
where
    S: KeyedStore<V> + ?Sized,
{
    let mut f = Some(f);
    let mut out = None;
    store.update(key, &mut |slot| {
        if let Some(f) = f.take() {
            out = Some(f(slot));
        }
    })?;
    out.ok_or_else(|| crate::error::Error::internal("store update did not run"))
}

struct Slot<V> {
    value: Option<V>,
    /// Set once the slot has been unlinked from the map. Writers that raced
    /// the removal must look the key up again.
    detached: bool,
}

/// In-memory table with one mutex per key.
///
/// The outer `RwLock` is held for writing only while a key is inserted or
/// unlinked; updates to existing keys take it for reading, so different keys
/// never wait on each other.
pub struct InMemoryStore<V> {
    slots: RwLock<HashMap<String, Arc<Mutex<Slot<V>>>>>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &str) -> Arc<Mutex<Slot<V>>> {
        if let Some(slot) = self.slots.read().get(key) {
            return slot.clone();
        }

        self.slots
            .write()
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Slot {
                    value: None,
                    detached: false,
                }))
            })
            .clone()
    }

    fn unlink(&self, key: &str, slot: &Arc<Mutex<Slot<V>>>) {
        let mut slots = self.slots.write();
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyedStore<V> for InMemoryStore<V>
where
    V: Clone + Retention + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>> {
        let slot = match self.slots.read().get(key) {
            Some(slot) => slot.clone(),
            None => return Ok(None),
        };
        let guard = slot.lock();
        Ok(guard.value.clone())
    }

    fn update(&self, key: &str, apply: &mut dyn FnMut(&mut Option<V>)) -> Result<()> {
        loop {
            let slot = self.slot(key);
            let mut guard = slot.lock();
            if guard.detached {
                continue;
            }

            apply(&mut guard.value);

            if guard.value.is_none() {
                guard.detached = true;
                drop(guard);
                self.unlink(key, &slot);
            }
            return Ok(());
        }
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let slot = match self.slots.read().get(key) {
            Some(slot) => slot.clone(),
            None => return Ok(false),
        };

        let mut guard = slot.lock();
        if guard.detached {
            return Ok(false);
        }
        let existed = guard.value.take().is_some();
        guard.detached = true;
        drop(guard);
        self.unlink(key, &slot);
        Ok(existed)
    }

    fn purge(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let candidates: Vec<(String, Arc<Mutex<Slot<V>>>)> = self
            .slots
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut purged = 0;
        for (key, slot) in candidates {
            let mut guard = slot.lock();
            if guard.detached {
                continue;
            }
            let stale = match &guard.value {
                Some(value) => value.retain_until().is_some_and(|until| until < cutoff),
                None => true,
            };
            if stale {
                if guard.value.take().is_some() {
                    purged += 1;
                }
                guard.detached = true;
                drop(guard);
                self.unlink(&key, &slot);
            }
        }
        Ok(purged)
    }

    fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.lock().value.is_some())
            .count()
    }
}
