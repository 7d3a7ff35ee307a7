/// Shortlinks - Browser Extension for Local Short URLs
/// Built with Rust + WASM

pub mod canonicalize;
pub mod config;
pub mod error;
pub mod extension;
pub mod form;
pub mod messenger;
pub mod redirect;
pub mod shortlink;
pub mod storage;
pub mod store;
#[cfg(test)]
mod testing;

use crate::config::Config;
use crate::extension::RuntimeTransport;
use crate::messenger::ShortlinkMessenger;
use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    // Log everything through wasm-logger; the max level does the filtering.
    wasm_logger::init(wasm_logger::Config::new(log::Level::Trace));
    log::set_max_level(Config::default().log_level_filter());
}

// Start the background context; `config` may be undefined for defaults
#[wasm_bindgen]
pub fn start_background(config: JsValue) -> Result<(), JsValue> {
    let config: Config = if config.is_undefined() || config.is_null() {
        Config::default()
    } else {
        serde_wasm_bindgen::from_value(config)?
    };

    extension::start_background(config);
    Ok(())
}

// Re-export form helpers for the popup and options page
#[wasm_bindgen]
pub fn canonicalize(link: &str) -> String {
    canonicalize::canonicalize(link)
}

#[wasm_bindgen]
pub fn strip_scheme(canonical: &str) -> String {
    canonicalize::strip_scheme(canonical)
}

#[wasm_bindgen]
pub fn preview_alias(input: &str) -> String {
    form::preview_alias(input)
}

// Messenger calls for the UI pages; failures reject with a displayable message
#[wasm_bindgen]
pub async fn add_shortlink(alias: String, destination: String) -> Result<(), JsValue> {
    form::validate_add(&alias, &destination).map_err(|e| JsValue::from_str(&e.to_string()))?;

    ShortlinkMessenger::new(RuntimeTransport)
        .send_add(&alias, &destination)
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub async fn delete_shortlink(alias: String) -> Result<(), JsValue> {
    ShortlinkMessenger::new(RuntimeTransport)
        .send_delete(&alias)
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub async fn fetch_shortlinks() -> Result<JsValue, JsValue> {
    let shortlinks = ShortlinkMessenger::new(RuntimeTransport)
        .send_fetch()
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    serde_wasm_bindgen::to_value(&shortlinks)
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize: {:?}", e)))
}
