/// Test doubles for the host collaborators and a store wired to them
use std::cell::{Cell, RefCell};

use crate::config::Config;
use crate::redirect::{RedirectHook, RedirectInstruction, RequestInterceptor};
use crate::store::ShortlinkStore;
use crate::storage::MemoryStorage;

pub type TestStore = ShortlinkStore<MemoryStorage, RecordingInterceptor>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorEvent {
    Registered(u64, Vec<String>),
    Unregistered(u64),
}

#[derive(Debug, Default)]
pub struct RecordingInterceptor {
    next_id: Cell<u64>,
    active: RefCell<Vec<(u64, Vec<String>, RedirectHook)>>,
    events: RefCell<Vec<InterceptorEvent>>,
}

impl RecordingInterceptor {
    /// Offer a request to every active registration whose filter lists `url`
    pub fn dispatch(&self, url: &str) -> Option<RedirectInstruction> {
        self.active
            .borrow()
            .iter()
            .filter(|(_, patterns, _)| patterns.iter().any(|p| p == url))
            .find_map(|(_, _, hook)| hook.redirect(url))
    }

    pub fn active_count(&self) -> usize {
        self.active.borrow().len()
    }

    pub fn events(&self) -> Vec<InterceptorEvent> {
        self.events.borrow().clone()
    }
}

impl RequestInterceptor for RecordingInterceptor {
    type Registration = u64;

    fn register(&self, patterns: Vec<String>, hook: RedirectHook) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.events
            .borrow_mut()
            .push(InterceptorEvent::Registered(id, patterns.clone()));
        self.active.borrow_mut().push((id, patterns, hook));
        id
    }

    fn unregister(&self, registration: u64) {
        self.events
            .borrow_mut()
            .push(InterceptorEvent::Unregistered(registration));
        self.active.borrow_mut().retain(|(id, _, _)| *id != registration);
    }
}

pub fn test_store() -> TestStore {
    ShortlinkStore::new(
        MemoryStorage::new(),
        RecordingInterceptor::default(),
        Config::default(),
    )
}

/// Deliver pending notifications for the configured area, as the host would
pub async fn deliver_changes(store: &TestStore) {
    let area = store.config().storage_area.as_str();
    for changes in store.storage().take_changes() {
        store.on_storage_changed(&changes, area).await;
    }
}
