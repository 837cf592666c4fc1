use std::fmt;

use serde::{Deserialize, Serialize};

/// Desired relay state carried in a toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayAction {
    On,
    Off,
}

impl RelayAction {
    pub fn is_on(&self) -> bool {
        matches!(self, RelayAction::On)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayAction::On => "on",
            RelayAction::Off => "off",
        }
    }
}

impl From<bool> for RelayAction {
    fn from(on: bool) -> Self {
        if on { RelayAction::On } else { RelayAction::Off }
    }
}

impl fmt::Display for RelayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/toggle`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToggleRequest {
    pub action: RelayAction,
}

/// Response body of both `/api/status` and `/api/toggle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatus {
    pub relay_on: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_request_wire_format() {
        let json = serde_json::to_string(&ToggleRequest {
            action: RelayAction::On,
        })
        .unwrap();
        assert_eq!(json, r#"{"action":"on"}"#);
        let json = serde_json::to_string(&ToggleRequest {
            action: RelayAction::Off,
        })
        .unwrap();
        assert_eq!(json, r#"{"action":"off"}"#);
    }

    #[test]
    fn test_relay_status_wire_format() {
        let status: RelayStatus = serde_json::from_str(r#"{"relay_on":true}"#).unwrap();
        assert!(status.relay_on);
        let status: RelayStatus = serde_json::from_str(r#"{"relay_on":false}"#).unwrap();
        assert!(!status.relay_on);
    }

    #[test]
    fn test_action_from_bool() {
        assert_eq!(RelayAction::from(true), RelayAction::On);
        assert_eq!(RelayAction::from(false), RelayAction::Off);
        assert!(RelayAction::On.is_on());
        assert!(!RelayAction::Off.is_on());
    }
}
