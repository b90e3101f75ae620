use super::config::StorageScope;
use super::error::FilterError;
use super::handle::Handle;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// A write to the store made by someone else (another tab).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub scope: StorageScope,
    pub key: String,
    /// `None` when the key was removed
    pub new_value: Option<String>,
}

pub type StorageWatcher = Rc<dyn Fn(&StorageChange)>;

/// Key-value store holding the serialized filter blob.
pub trait FilterStorage {
    fn get_item(&self, scope: StorageScope, key: &str) -> Result<Option<String>, FilterError>;

    fn set_item(&self, scope: StorageScope, key: &str, value: &str) -> Result<(), FilterError>;

    fn remove_item(&self, scope: StorageScope, key: &str) -> Result<(), FilterError>;

    /// Get notified of changes made outside this page. Writes made through
    /// this store itself are not reported back.
    fn watch(&self, watcher: StorageWatcher) -> Handle;
}

#[derive(Default)]
struct MemoryInner {
    items: RefCell<HashMap<(StorageScope, String), String>>,
    watchers: RefCell<Vec<(u64, StorageWatcher)>>,
    next_watcher: Cell<u64>,
    fail_writes: Cell<bool>,
    unavailable: Cell<bool>,
}

/// In-memory store. Clones share the same data, which makes it usable as a
/// stand-in for the browser store and as a test double.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with `QuotaExceeded`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.set(fail);
    }

    /// Make every operation fail as if storage were disabled.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.set(unavailable);
    }

    pub fn raw(&self, scope: StorageScope, key: &str) -> Option<String> {
        self.inner
            .items
            .borrow()
            .get(&(scope, key.to_string()))
            .cloned()
    }

    /// Write as another tab would: the value changes and watchers are told.
    pub fn write_from_elsewhere(&self, scope: StorageScope, key: &str, value: Option<&str>) {
        {
            let mut items = self.inner.items.borrow_mut();
            match value {
                Some(value) => {
                    items.insert((scope, key.to_string()), value.to_string());
                }
                None => {
                    items.remove(&(scope, key.to_string()));
                }
            }
        }

        let change = StorageChange {
            scope,
            key: key.to_string(),
            new_value: value.map(str::to_string),
        };
        let watchers: Vec<StorageWatcher> = self
            .inner
            .watchers
            .borrow()
            .iter()
            .map(|(_, w)| w.clone())
            .collect();
        for watcher in watchers {
            watcher(&change);
        }
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }

    fn check_available(&self) -> Result<(), FilterError> {
        if self.inner.unavailable.get() {
            return Err(FilterError::StorageUnavailable("storage is disabled".to_string()));
        }
        Ok(())
    }
}

impl FilterStorage for MemoryStorage {
    fn get_item(&self, scope: StorageScope, key: &str) -> Result<Option<String>, FilterError> {
        self.check_available()?;
        Ok(self.raw(scope, key))
    }

    fn set_item(&self, scope: StorageScope, key: &str, value: &str) -> Result<(), FilterError> {
        self.check_available()?;
        if self.inner.fail_writes.get() {
            return Err(FilterError::QuotaExceeded);
        }
        self.inner
            .items
            .borrow_mut()
            .insert((scope, key.to_string()), value.to_string());
        Ok(())
    }

    fn remove_item(&self, scope: StorageScope, key: &str) -> Result<(), FilterError> {
        self.check_available()?;
        self.inner
            .items
            .borrow_mut()
            .remove(&(scope, key.to_string()));
        Ok(())
    }

    fn watch(&self, watcher: StorageWatcher) -> Handle {
        let id = self.inner.next_watcher.get();
        self.inner.next_watcher.set(id + 1);
        self.inner.watchers.borrow_mut().push((id, watcher));

        let inner = Rc::downgrade(&self.inner);
        Handle::on_drop(move || {
            if let Some(inner) = inner.upgrade() {
                inner.watchers.borrow_mut().retain(|(existing, _)| *existing != id);
            }
        })
    }
}
