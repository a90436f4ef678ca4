use crate::error::Result;
use crate::store::{Backend, Namespace, SharedStore};

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct LocalStoreInner {
    entries: Mutex<HashMap<(Namespace, usize), Arc<Vec<u8>>>>,
    changed: Condvar,
    writes: AtomicUsize,
}

/// An in-process store. Clones share the same entries.
///
/// Writes are immediately visible to every clone and wake any thread blocked
/// in [SharedStore::wait_for_change].
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    inner: Arc<LocalStoreInner>,
}

impl LocalStore {
    pub fn new() -> LocalStore {
        LocalStore::default()
    }

    /// Number of entries currently held in `namespace`
    pub fn len(&self, namespace: Namespace) -> usize {
        self.inner
            .entries
            .lock()
            .keys()
            .filter(|(ns, _)| *ns == namespace)
            .count()
    }

    /// Total number of successful writes since creation
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn wrote(&self) {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.changed.notify_all();
    }
}

impl SharedStore for LocalStore {
    #[tracing::instrument(skip(self, value), level = "trace")]
    fn put(&self, namespace: Namespace, key: usize, value: Vec<u8>) -> Result<()> {
        self.inner
            .entries
            .lock()
            .insert((namespace, key), Arc::new(value));
        self.wrote();
        Ok(())
    }

    #[tracing::instrument(skip(self, value), level = "trace")]
    fn put_if_absent(&self, namespace: Namespace, key: usize, value: Vec<u8>) -> Result<bool> {
        let inserted = {
            let mut entries = self.inner.entries.lock();
            match entries.entry((namespace, key)) {
                std::collections::hash_map::Entry::Occupied(_) => false,
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(Arc::new(value));
                    true
                }
            }
        };
        if inserted {
            self.wrote();
        }
        Ok(inserted)
    }

    fn get(&self, namespace: Namespace, key: usize) -> Result<Option<Vec<u8>>> {
        Ok(self
            .inner
            .entries
            .lock()
            .get(&(namespace, key))
            .map(|v| v.as_ref().clone()))
    }

    fn contains_key(&self, namespace: Namespace, key: usize) -> Result<bool> {
        Ok(self.inner.entries.lock().contains_key(&(namespace, key)))
    }

    fn wait_for_change(&self, timeout: Duration) {
        let mut entries = self.inner.entries.lock();
        let _ = self.inner.changed.wait_for(&mut entries, timeout);
    }

    fn backend(&self) -> Backend {
        Backend::Local
    }
}
