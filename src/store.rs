/// Shortlink store: the background context's view of the mapping
use crate::canonicalize::{canonicalize, strip_scheme};
use crate::config::Config;
use crate::error::StoreError;
use crate::redirect::{RedirectHook, RequestInterceptor};
use crate::shortlink::{InstallReason, ShortlinkMap, StorageChanges};
use crate::storage::ShortlinkStorage;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Owns the in-memory mapping and keeps it, and the redirect registration,
/// in step with the storage area.
///
/// The mapping is only ever replaced wholesale by [`ShortlinkStore::resync`];
/// add and delete write to storage and rely on the resulting change
/// notification to bring the mapping up to date.
pub struct ShortlinkStore<S, I: RequestInterceptor> {
    storage: S,
    interceptor: I,
    config: Config,
    mapping: RefCell<Rc<ShortlinkMap>>,
    generation: Cell<u64>,
    registration: RefCell<Option<I::Registration>>,
}

impl<S: ShortlinkStorage, I: RequestInterceptor> ShortlinkStore<S, I> {
    pub fn new(storage: S, interceptor: I, config: Config) -> Self {
        ShortlinkStore {
            storage,
            interceptor,
            config,
            mapping: RefCell::new(Rc::new(ShortlinkMap::new())),
            generation: Cell::new(0),
            registration: RefCell::new(None),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn interceptor(&self) -> &I {
        &self.interceptor
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current mapping snapshot
    pub fn mapping(&self) -> Rc<ShortlinkMap> {
        Rc::clone(&self.mapping.borrow())
    }

    /// Number of successful resyncs so far
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn is_hook_registered(&self) -> bool {
        self.registration.borrow().is_some()
    }

    /// Hook over the current snapshot
    pub fn redirect_hook(&self) -> RedirectHook {
        RedirectHook::new(self.mapping())
    }

    pub async fn add_shortlink(&self, alias: &str, destination: &str) -> Result<()> {
        let alias = canonicalize(alias);
        let destination = canonicalize(destination);

        let existing = self.storage.get(&alias).await.map_err(|e| {
            log::error!("Failed to query storage for shortlink {}: {}", alias, e);
            e
        })?;

        if existing.is_some() {
            log::info!("Rejecting duplicate shortlink {}", alias);
            return Err(StoreError::Duplicate(strip_scheme(&alias)));
        }

        log::info!("Adding shortlink {}: {}", alias, destination);
        self.storage.set(&alias, &destination).await.map_err(|e| {
            log::error!(
                "Failed to add shortlink {}: {} to storage: {}",
                alias,
                destination,
                e
            );
            e
        })?;

        Ok(())
    }

    /// Idempotent: deleting an unknown alias succeeds
    pub async fn delete_shortlink(&self, alias: &str) -> Result<()> {
        let alias = canonicalize(alias);

        log::info!("Deleting shortlink {}", alias);
        self.storage.remove(&alias).await.map_err(|e| {
            log::error!("Failed to delete shortlink {}: {}", alias, e);
            e
        })?;

        Ok(())
    }

    /// Display form of the cached mapping; never reads storage
    pub fn fetch_shortlinks(&self) -> BTreeMap<String, String> {
        self.mapping.borrow().to_display()
    }

    /// Reload the whole mapping from storage and replace the redirect
    /// registration to match. On failure the previous mapping stays.
    pub async fn resync(&self) -> Result<()> {
        let contents = self.storage.get_all().await.map_err(|e| {
            log::error!("Failed to sync shortlinks: {}", e);
            e
        })?;

        let mapping = Rc::new(ShortlinkMap::from_storage(contents));
        log::debug!("Synced {} shortlinks", mapping.len());

        *self.mapping.borrow_mut() = Rc::clone(&mapping);
        self.generation.set(self.generation.get() + 1);
        self.replace_registration(mapping);

        Ok(())
    }

    /// Handler for the host's storage change notification
    pub async fn on_storage_changed(&self, changes: &StorageChanges, area_name: &str) {
        if area_name != self.config.storage_area.as_str() {
            log::trace!("Ignoring change in storage area {}", area_name);
            return;
        }

        log::info!("Detected change in {} shortlinks", changes.len());
        // Failure is already logged; the previous mapping stays until the next change.
        let _ = self.resync().await;
    }

    /// Seed the configured defaults on a first-ever install.
    ///
    /// Skipped when storage already has entries, which means another device
    /// synced them first. Returns the number of shortlinks added.
    pub async fn install_defaults(&self, reason: InstallReason) -> Result<usize> {
        log::info!("Install detected with reason {:?}", reason);
        if reason != InstallReason::Install {
            return Ok(0);
        }

        let contents = self.storage.get_all().await.map_err(|e| {
            log::error!("Failed to read storage on install: {}", e);
            e
        })?;
        if !contents.is_empty() {
            log::info!("Storage already holds {} shortlinks, skipping defaults", contents.len());
            return Ok(0);
        }

        let mut seeded = 0;
        for default in &self.config.default_shortlinks {
            match self.add_shortlink(&default.alias, &default.destination).await {
                Ok(()) => seeded += 1,
                Err(e) => log::warn!("Failed to add default shortlink {}: {}", default.alias, e),
            }
        }

        Ok(seeded)
    }

    /// Tear down the current registration and install one scoped to
    /// `mapping`, with no suspension point between the two.
    fn replace_registration(&self, mapping: Rc<ShortlinkMap>) {
        let mut registration = self.registration.borrow_mut();

        if let Some(old) = registration.take() {
            self.interceptor.unregister(old);
        }

        if !mapping.is_empty() {
            let hook = RedirectHook::new(mapping);
            let patterns = hook.url_patterns();
            *registration = Some(self.interceptor.register(patterns, hook));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::redirect::RedirectInstruction;
    use crate::shortlink::{StorageChange, StoredShortlinks};
    use crate::storage::MemoryStorage;
    use crate::testing::{InterceptorEvent, TestStore, deliver_changes, test_store};

    async fn add_and_sync(store: &TestStore, alias: &str, destination: &str) {
        store.add_shortlink(alias, destination).await.unwrap();
        deliver_changes(store).await;
    }

    #[tokio::test]
    async fn test_add_then_fetch() {
        let store = test_store();

        add_and_sync(&store, "c/", "calendar.google.com").await;

        let shortlinks = store.fetch_shortlinks();
        assert_eq!(shortlinks.len(), 1);
        assert_eq!(shortlinks["c/"], "calendar.google.com/");
    }

    #[tokio::test]
    async fn test_add_persists_canonical_pair() {
        let store = test_store();

        store.add_shortlink("m", "https://mail.google.com").await.unwrap();

        let contents = store.storage().contents();
        assert_eq!(contents["http://m/"], "https://mail.google.com/");
    }

    #[tokio::test]
    async fn test_add_does_not_touch_mapping_until_notified() {
        let store = test_store();

        store.add_shortlink("c/", "calendar.google.com").await.unwrap();

        assert!(store.fetch_shortlinks().is_empty());
        assert_eq!(store.generation(), 0);
    }

    #[tokio::test]
    async fn test_add_duplicate() {
        let store = test_store();
        add_and_sync(&store, "c/", "calendar.google.com").await;
        let before = store.mapping();

        let err = store.add_shortlink("c/", "contacts.google.com").await.unwrap_err();

        assert_eq!(err, StoreError::Duplicate("c/".to_string()));
        deliver_changes(&store).await;
        assert_eq!(store.fetch_shortlinks().len(), 1);
        assert_eq!(store.fetch_shortlinks()["c/"], "calendar.google.com/");
        assert!(Rc::ptr_eq(&before, &store.mapping()));
    }

    #[tokio::test]
    async fn test_add_duplicate_after_canonicalization() {
        let store = test_store();
        add_and_sync(&store, "m/", "mail.google.com").await;

        let err = store.add_shortlink("http://m", "maps.google.com").await.unwrap_err();

        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_add_storage_failure() {
        let store = test_store();
        store.storage().set_unavailable(true);

        let err = store.add_shortlink("c/", "calendar.google.com").await.unwrap_err();

        assert!(matches!(err, StoreError::Storage(StorageError::Unavailable(_))));
        assert_eq!(err.to_string(), "storage unavailable: memory storage offline");
    }

    #[tokio::test]
    async fn test_delete_existing() {
        let store = test_store();
        add_and_sync(&store, "c/", "calendar.google.com").await;
        add_and_sync(&store, "m/", "mail.google.com").await;

        store.delete_shortlink("c/").await.unwrap();
        deliver_changes(&store).await;

        let shortlinks = store.fetch_shortlinks();
        assert_eq!(shortlinks.len(), 1);
        assert!(shortlinks.contains_key("m/"));
    }

    #[tokio::test]
    async fn test_delete_never_added() {
        let store = test_store();
        add_and_sync(&store, "c/", "calendar.google.com").await;
        let before = store.mapping();

        store.delete_shortlink("z/").await.unwrap();
        deliver_changes(&store).await;

        assert_eq!(store.fetch_shortlinks().len(), 1);
        assert!(Rc::ptr_eq(&before, &store.mapping()));
    }

    #[tokio::test]
    async fn test_delete_storage_failure() {
        let store = test_store();
        store.storage().set_unavailable(true);

        let err = store.delete_shortlink("c/").await.unwrap_err();

        assert!(matches!(err, StoreError::Storage(_)));
    }

    #[tokio::test]
    async fn test_redirect_after_add() {
        let store = test_store();

        add_and_sync(&store, "m/", "mail.google.com").await;

        assert_eq!(
            store.interceptor().dispatch("http://m/"),
            Some(RedirectInstruction {
                redirect_url: "http://mail.google.com/".to_string()
            })
        );
        assert_eq!(store.interceptor().dispatch("http://unknown/"), None);
        assert_eq!(
            store.redirect_hook().redirect("http://m/").map(|r| r.redirect_url),
            Some("http://mail.google.com/".to_string())
        );
    }

    #[tokio::test]
    async fn test_resync_replaces_mapping() {
        let mut contents = StoredShortlinks::new();
        contents.insert("http://c/".to_string(), "https://calendar.google.com/".to_string());
        let store = TestStore::new(
            MemoryStorage::with_contents(contents),
            Default::default(),
            Config::default(),
        );

        store.resync().await.unwrap();

        assert_eq!(store.generation(), 1);
        assert_eq!(store.fetch_shortlinks()["c/"], "calendar.google.com/");
        assert!(store.is_hook_registered());
    }

    #[tokio::test]
    async fn test_resync_failure_keeps_previous_mapping() {
        let store = test_store();
        add_and_sync(&store, "c/", "calendar.google.com").await;
        let before = store.mapping();
        let generation = store.generation();

        store.storage().set_unavailable(true);
        assert!(store.resync().await.is_err());

        assert!(Rc::ptr_eq(&before, &store.mapping()));
        assert_eq!(store.generation(), generation);
        assert!(store.is_hook_registered());
    }

    #[tokio::test]
    async fn test_resync_replaces_registration() {
        let store = test_store();

        add_and_sync(&store, "c/", "calendar.google.com").await;
        add_and_sync(&store, "m/", "mail.google.com").await;

        assert_eq!(
            store.interceptor().events(),
            vec![
                InterceptorEvent::Registered(0, vec!["http://c/".to_string()]),
                InterceptorEvent::Unregistered(0),
                InterceptorEvent::Registered(
                    1,
                    vec!["http://c/".to_string(), "http://m/".to_string()]
                ),
            ]
        );
        assert_eq!(store.interceptor().active_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_mapping_tears_down_registration() {
        let store = test_store();
        add_and_sync(&store, "c/", "calendar.google.com").await;
        assert!(store.is_hook_registered());

        store.delete_shortlink("c/").await.unwrap();
        deliver_changes(&store).await;

        assert!(!store.is_hook_registered());
        assert_eq!(store.interceptor().active_count(), 0);
        assert_eq!(store.interceptor().dispatch("http://c/"), None);
    }

    #[tokio::test]
    async fn test_resync_of_empty_storage_registers_nothing() {
        let store = test_store();

        store.resync().await.unwrap();

        assert_eq!(store.generation(), 1);
        assert!(store.interceptor().events().is_empty());
    }

    #[tokio::test]
    async fn test_change_in_other_area_is_ignored() {
        let store = test_store();
        add_and_sync(&store, "c/", "calendar.google.com").await;
        let before = store.mapping();
        let generation = store.generation();

        let mut changes = StorageChanges::new();
        changes.insert(
            "http://x/".to_string(),
            StorageChange {
                old_value: None,
                new_value: Some("http://example.com/".to_string()),
            },
        );
        store.on_storage_changed(&changes, "local").await;

        assert!(Rc::ptr_eq(&before, &store.mapping()));
        assert_eq!(store.generation(), generation);
    }

    #[tokio::test]
    async fn test_install_defaults_on_first_install() {
        let store = test_store();

        let seeded = store.install_defaults(InstallReason::Install).await.unwrap();
        deliver_changes(&store).await;

        assert_eq!(seeded, 2);
        let shortlinks = store.fetch_shortlinks();
        assert_eq!(shortlinks["c/"], "calendar.google.com/");
        assert_eq!(shortlinks["m/"], "mail.google.com/");
    }

    #[tokio::test]
    async fn test_install_defaults_skipped_on_update() {
        let store = test_store();

        let seeded = store.install_defaults(InstallReason::Update).await.unwrap();

        assert_eq!(seeded, 0);
        assert!(store.storage().contents().is_empty());
    }

    #[tokio::test]
    async fn test_install_defaults_skipped_when_storage_not_empty() {
        let store = test_store();
        add_and_sync(&store, "x/", "example.com").await;

        let seeded = store.install_defaults(InstallReason::Install).await.unwrap();

        assert_eq!(seeded, 0);
        assert_eq!(store.storage().contents().len(), 1);
    }

    #[tokio::test]
    async fn test_install_defaults_storage_failure() {
        let store = test_store();
        store.storage().set_unavailable(true);

        assert!(store.install_defaults(InstallReason::Install).await.is_err());
    }
}
