/// Bridge to the browser extension APIs
use crate::config::Config;
use crate::error::{MessengerError, StorageError};
use crate::messenger::{self, Message, MessageTransport, Response};
use crate::redirect::{RedirectHook, RequestDetails, RequestInterceptor};
use crate::shortlink::{InstallReason, StorageArea, StorageChanges, StoredShortlinks};
use crate::storage::{self, ShortlinkStorage};
use crate::store::ShortlinkStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

// Import JS bridge functions
#[wasm_bindgen(module = "/extension.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn storageGet(area: &str, keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageSet(area: &str, items: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageRemove(area: &str, key: &str) -> Result<(), JsValue>;

    fn addStorageChangedListener(callback: &js_sys::Function);

    fn addInstalledListener(callback: &js_sys::Function);

    fn addMessageListener(callback: &js_sys::Function);

    fn addBeforeRequestListener(callback: &js_sys::Function, urls: JsValue);

    fn removeBeforeRequestListener(callback: &js_sys::Function);

    #[wasm_bindgen(catch)]
    async fn sendMessage(message: JsValue) -> Result<JsValue, JsValue>;
}

pub type BrowserStore = ShortlinkStore<BrowserStorage, BrowserInterceptor>;

/// One `storage.<area>` of the host
#[derive(Debug, Clone, Copy)]
pub struct BrowserStorage {
    area: StorageArea,
}

impl BrowserStorage {
    pub fn new(area: StorageArea) -> Self {
        BrowserStorage { area }
    }

    async fn read(&self, keys: JsValue) -> storage::Result<StoredShortlinks> {
        let value = storageGet(self.area.as_str(), keys)
            .await
            .map_err(unavailable)?;
        parse_contents(value)
    }
}

#[async_trait(?Send)]
impl ShortlinkStorage for BrowserStorage {
    async fn get(&self, key: &str) -> storage::Result<Option<String>> {
        let mut contents = self.read(JsValue::from_str(key)).await?;
        Ok(contents.remove(key))
    }

    async fn get_all(&self) -> storage::Result<StoredShortlinks> {
        self.read(JsValue::NULL).await
    }

    async fn set(&self, key: &str, value: &str) -> storage::Result<()> {
        let items = js_sys::Object::new();
        js_sys::Reflect::set(&items, &JsValue::from_str(key), &JsValue::from_str(value))
            .map_err(unavailable)?;

        storageSet(self.area.as_str(), items.into())
            .await
            .map_err(unavailable)
    }

    async fn remove(&self, key: &str) -> storage::Result<()> {
        storageRemove(self.area.as_str(), key)
            .await
            .map_err(unavailable)
    }
}

fn unavailable(e: JsValue) -> StorageError {
    StorageError::Unavailable(format!("{:?}", e))
}

/// Keep string values only; anything else in the area is not a shortlink
fn parse_contents(value: JsValue) -> storage::Result<StoredShortlinks> {
    let raw: HashMap<String, serde_json::Value> = serde_wasm_bindgen::from_value(value)
        .map_err(|e| StorageError::InvalidData(format!("Failed to parse storage: {:?}", e)))?;

    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(destination) => Some((key, destination)),
            other => {
                log::warn!("Skipping non-string value stored under {}: {}", key, other);
                None
            }
        })
        .collect())
}

/// `webRequest.onBeforeRequest` with the `blocking` option
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserInterceptor;

/// Keeps the listener alive while it is registered
pub struct BrowserRegistration {
    listener: Closure<dyn Fn(JsValue) -> JsValue>,
}

impl RequestInterceptor for BrowserInterceptor {
    type Registration = BrowserRegistration;

    fn register(&self, patterns: Vec<String>, hook: RedirectHook) -> BrowserRegistration {
        log::debug!("Registering redirect listener for {} shortlinks", patterns.len());

        let listener = Closure::wrap(Box::new(move |details: JsValue| -> JsValue {
            redirect_response(&hook, details)
        }) as Box<dyn Fn(JsValue) -> JsValue>);

        let urls: js_sys::Array = patterns.iter().map(|p| JsValue::from_str(p)).collect();
        addBeforeRequestListener(listener.as_ref().unchecked_ref(), urls.into());

        BrowserRegistration { listener }
    }

    fn unregister(&self, registration: BrowserRegistration) {
        removeBeforeRequestListener(registration.listener.as_ref().unchecked_ref());
    }
}

fn redirect_response(hook: &RedirectHook, details: JsValue) -> JsValue {
    let details: RequestDetails = match serde_wasm_bindgen::from_value(details) {
        Ok(details) => details,
        Err(e) => {
            log::warn!("Failed to parse request details: {:?}", e);
            return JsValue::UNDEFINED;
        }
    };

    hook.redirect(&details.url)
        .and_then(|instruction| to_js(&instruction).ok())
        .unwrap_or(JsValue::UNDEFINED)
}

#[derive(Debug, Deserialize)]
struct InstallDetails {
    reason: InstallReason,
}

fn install_reason(details: JsValue) -> Option<InstallReason> {
    match serde_wasm_bindgen::from_value::<InstallDetails>(details) {
        Ok(details) => Some(details.reason),
        Err(e) => {
            log::warn!("Failed to parse install details: {:?}", e);
            None
        }
    }
}

/// Build the background store and hook it up to the host events.
///
/// Listeners are registered synchronously so events fired while the
/// background context starts are not missed.
pub fn start_background(config: Config) {
    log::set_max_level(config.log_level_filter());
    log::info!("Starting shortlinks background with {:?} storage", config.storage_area);

    let storage = BrowserStorage::new(config.storage_area);
    let store = Rc::new(ShortlinkStore::new(storage, BrowserInterceptor, config));

    listen_for_install(Rc::clone(&store));
    listen_for_storage_changes(Rc::clone(&store));
    listen_for_messages(Rc::clone(&store));

    spawn_local(async move {
        // Failure is logged by resync; the next storage change retries.
        let _ = store.resync().await;
    });
}

fn listen_for_install(store: Rc<BrowserStore>) {
    let callback = Closure::wrap(Box::new(move |details: JsValue| {
        let store = Rc::clone(&store);
        spawn_local(async move {
            let Some(reason) = install_reason(details) else {
                return;
            };

            match store.install_defaults(reason).await {
                Ok(0) => {}
                Ok(seeded) => log::info!("Seeded {} default shortlinks", seeded),
                Err(e) => log::error!("Failed to install default shortlinks: {}", e),
            }
        });
    }) as Box<dyn FnMut(JsValue)>);

    addInstalledListener(callback.as_ref().unchecked_ref());
    callback.forget();
}

fn listen_for_storage_changes(store: Rc<BrowserStore>) {
    let callback = Closure::wrap(Box::new(move |changes: JsValue, area_name: String| {
        // The delta is only informational; the store resyncs wholesale.
        let changes: StorageChanges = serde_wasm_bindgen::from_value(changes).unwrap_or_else(|e| {
            log::debug!("Could not parse storage changes: {:?}", e);
            StorageChanges::new()
        });

        let store = Rc::clone(&store);
        spawn_local(async move {
            store.on_storage_changed(&changes, &area_name).await;
        });
    }) as Box<dyn FnMut(JsValue, String)>);

    addStorageChangedListener(callback.as_ref().unchecked_ref());
    callback.forget();
}

fn listen_for_messages(store: Rc<BrowserStore>) {
    let callback = Closure::wrap(Box::new(move |message: JsValue| -> js_sys::Promise {
        let store = Rc::clone(&store);
        future_to_promise(async move {
            let response = match serde_wasm_bindgen::from_value::<Message>(message) {
                Ok(message) => messenger::handle_message(&store, message).await,
                Err(e) => {
                    let err = MessengerError::Malformed(format!("{:?}", e));
                    log::warn!("Rejecting message: {}", err);
                    Response::error(err)
                }
            };
            to_js(&response).map_err(JsValue::from)
        })
    }) as Box<dyn FnMut(JsValue) -> js_sys::Promise>);

    addMessageListener(callback.as_ref().unchecked_ref());
    callback.forget();
}

/// `runtime.sendMessage` from a UI page
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeTransport;

#[async_trait(?Send)]
impl MessageTransport for RuntimeTransport {
    async fn send(&self, message: Message) -> messenger::Result<Response> {
        let payload = to_js(&message)
            .map_err(|e| MessengerError::Transport(format!("Failed to serialize: {:?}", e)))?;

        let reply = sendMessage(payload)
            .await
            .map_err(|e| MessengerError::Transport(format!("{:?}", e)))?;

        serde_wasm_bindgen::from_value(reply)
            .map_err(|e| MessengerError::Malformed(format!("Failed to parse response: {:?}", e)))
    }
}

/// Plain JS objects rather than `Map`s, so values survive structured cloning
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}
