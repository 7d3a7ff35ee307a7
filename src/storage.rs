/// Storage backends for shortlink mappings

use crate::error::StorageError;
use crate::shortlink::{StorageChange, StorageChanges, StoredShortlinks};
use async_trait::async_trait;
use std::cell::{Cell, RefCell};

pub type Result<T> = std::result::Result<T, StorageError>;

/// A key/value storage area holding canonical alias → destination pairs.
///
/// Every call may suspend and may fail; failures are never retried here.
#[async_trait(?Send)]
pub trait ShortlinkStorage {
    /// Value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Entire contents of the area.
    async fn get_all(&self) -> Result<StoredShortlinks>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-process storage area.
///
/// Writes queue up change notifications the way the host's
/// `storage.onChanged` would deliver them; drain them with
/// [`MemoryStorage::take_changes`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    contents: RefCell<StoredShortlinks>,
    pending_changes: RefCell<Vec<StorageChanges>>,
    unavailable: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: StoredShortlinks) -> Self {
        MemoryStorage {
            contents: RefCell::new(contents),
            ..Self::default()
        }
    }

    /// Make every following call fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    pub fn contents(&self) -> StoredShortlinks {
        self.contents.borrow().clone()
    }

    /// Drain the change notifications produced since the last call
    pub fn take_changes(&self) -> Vec<StorageChanges> {
        std::mem::take(&mut *self.pending_changes.borrow_mut())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.get() {
            Err(StorageError::Unavailable("memory storage offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn notify(&self, key: &str, change: StorageChange) {
        let mut changes = StorageChanges::new();
        changes.insert(key.to_string(), change);
        self.pending_changes.borrow_mut().push(changes);
    }
}

#[async_trait(?Send)]
impl ShortlinkStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.contents.borrow().get(key).cloned())
    }

    async fn get_all(&self) -> Result<StoredShortlinks> {
        self.check_available()?;
        Ok(self.contents.borrow().clone())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        let old_value = self
            .contents
            .borrow_mut()
            .insert(key.to_string(), value.to_string());

        if old_value.as_deref() != Some(value) {
            self.notify(
                key,
                StorageChange {
                    old_value,
                    new_value: Some(value.to_string()),
                },
            );
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_available()?;
        let old_value = self.contents.borrow_mut().remove(key);

        if old_value.is_some() {
            self.notify(
                key,
                StorageChange {
                    old_value,
                    new_value: None,
                },
            );
        }
        Ok(())
    }
}
