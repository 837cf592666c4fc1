use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::controller::{DEFAULT_POLL_INTERVAL, DEFAULT_PRESS_FLASH};

/// Front panel tunables, loadable from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poll_interval_ms: u64,
    pub press_flash_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            press_flash_ms: DEFAULT_PRESS_FLASH.as_millis() as u64,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing or unreadable file
    /// falls back to defaults with a warning.
    pub fn load(path: Option<&str>) -> Self {
        let Some(path) = path else {
            return Settings::default();
        };
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Failed to parse settings file, using defaults: {e}");
                    Settings::default()
                }
            },
            Err(_) => {
                warn!("Failed to read settings file, using default settings");
                Settings::default()
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn press_flash(&self) -> Duration {
        Duration::from_millis(self.press_flash_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.poll_interval(), Duration::from_millis(2000));
        assert_eq!(settings.press_flash(), Duration::from_millis(300));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let settings = Settings::load(Some("/nonexistent/settings.json"));
        assert_eq!(settings.poll_interval_ms, 2000);
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"poll_interval_ms": 500}"#).unwrap();
        assert_eq!(settings.poll_interval_ms, 500);
        assert_eq!(settings.press_flash_ms, 300);
    }
}
