/// Background configuration, passed in from the extension's JS entry point
use crate::shortlink::StorageArea;
use serde::{Deserialize, Serialize};

/// A shortlink seeded on first install
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultShortlink {
    pub alias: String,
    pub destination: String,
}

impl DefaultShortlink {
    pub fn new(alias: &str, destination: &str) -> Self {
        DefaultShortlink {
            alias: alias.to_string(),
            destination: destination.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Area holding the mapping; change notifications for other areas are ignored
    pub storage_area: StorageArea,
    pub default_shortlinks: Vec<DefaultShortlink>,
    pub log_level: String,
}

impl Config {
    /// Parsed `log_level`, falling back to `Info` for unknown names
    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_area: StorageArea::Sync,
            default_shortlinks: vec![
                DefaultShortlink::new("c/", "https://calendar.google.com/"),
                DefaultShortlink::new("m/", "https://mail.google.com/"),
            ],
            log_level: "info".to_string(),
        }
    }
}
