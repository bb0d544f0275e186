//! Mock implementations for testing.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use wizard_core::{Error, InMemoryStore, KeyedStore, Result, Retention};

/// Keyed store that can be switched into a failing mode.
///
/// Delegates to an `InMemoryStore` until `set_should_fail(true)`, after
/// which every call returns a `STORE_001` error.
#[derive(Clone)]
pub struct FailingStore<V> {
    inner: Arc<InMemoryStore<V>>,
    should_fail: Arc<Mutex<bool>>,
}

impl<V> FailingStore<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InMemoryStore::new()),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    fn check(&self) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(Error::store("simulated store outage"));
        }
        Ok(())
    }
}

impl<V> Default for FailingStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyedStore<V> for FailingStore<V>
where
    V: Clone + Retention + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>> {
        self.check()?;
        self.inner.get(key)
    }

    fn update(&self, key: &str, apply: &mut dyn FnMut(&mut Option<V>)) -> Result<()> {
        self.check()?;
        self.inner.update(key, apply)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.check()?;
        self.inner.remove(key)
    }

    fn purge(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.check()?;
        self.inner.purge(cutoff)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
