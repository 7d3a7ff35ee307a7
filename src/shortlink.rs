/// Data structures for Shortlinks
use crate::canonicalize::strip_scheme;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Raw key/value contents of a storage area
pub type StoredShortlinks = HashMap<String, String>;

/// One entry of a `storage.onChanged` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
}

/// Changed keys of a storage area, as delivered by the host
pub type StorageChanges = HashMap<String, StorageChange>;

/// Named storage area of the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    #[default]
    Sync,
    Local,
    Managed,
    Session,
}

impl StorageArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
            StorageArea::Managed => "managed",
            StorageArea::Session => "session",
        }
    }
}

/// Why `runtime.onInstalled` fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    ChromeUpdate,
    SharedModuleUpdate,
    #[serde(other)]
    Other,
}

/// Canonical alias → canonical destination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortlinkMap {
    links: HashMap<String, String>,
}

impl ShortlinkMap {
    pub fn new() -> Self {
        ShortlinkMap {
            links: HashMap::new(),
        }
    }

    /// Build the mapping from the full contents of a storage area
    pub fn from_storage(contents: StoredShortlinks) -> Self {
        ShortlinkMap { links: contents }
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.links.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Canonical aliases, sorted
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.links.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    /// Scheme-stripped form for the popup and options page.
    ///
    /// `http://c/` and `https://c/` both display as `c/`; the alias that
    /// sorts first (`http://`) is the one shown.
    pub fn to_display(&self) -> BTreeMap<String, String> {
        let mut display = BTreeMap::new();
        for alias in self.aliases() {
            if let Some(destination) = self.links.get(&alias) {
                display
                    .entry(strip_scheme(&alias))
                    .or_insert_with(|| strip_scheme(destination));
            }
        }
        display
    }
}
