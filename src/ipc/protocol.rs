//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::events::EngineEvent;
use crate::hotkey::KeyCode;
use crate::macros::{Macro, MacroAction, RegistryError};
use crate::state::EngineState;

/// Requests from an editor to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// All macros in registry order
    ListMacros,

    /// Append a macro
    AddMacro {
        hotkeys: Vec<KeyCode>,
        actions: Vec<MacroAction>,
    },

    /// Replace the macro at `index`
    UpdateMacro {
        index: usize,
        hotkeys: Vec<KeyCode>,
        actions: Vec<MacroAction>,
    },

    RemoveMacro { index: usize },

    /// Replace the registry from a macro file (the configured one when
    /// `path` is absent)
    Load { path: Option<PathBuf> },

    /// Write the registry to a macro file
    Save { path: Option<PathBuf> },

    /// Subscribe to engine event notifications
    Subscribe,
}

/// Responses from daemon to editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    Macros { macros: Vec<Macro> },

    /// Macro appended at `index`
    Added { index: usize },

    /// Update or removal applied
    Ok,

    Loaded { count: usize, skipped: usize },

    Saved { count: usize },

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<RegistryError> for Response {
    fn from(err: RegistryError) -> Self {
        let code = match err {
            RegistryError::Invalid(_) => "invalid_macro",
            RegistryError::IndexOutOfRange { .. } => "index_out_of_range",
        };
        Response::error(code, err.to_string())
    }
}

/// Push notification from daemon to editor (for subscribed clients)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: EngineEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    pub engine_state: EngineState,

    /// Whether the keyboard hook is intercepting
    pub hook_installed: bool,

    pub macro_count: usize,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            engine_state: EngineState::default(),
            hook_installed: false,
            macro_count: 0,
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::RemoveMacro { index: 2 };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"type":"remove_macro","index":2}"#);
    }

    #[test]
    fn test_add_macro_from_json() {
        let req: Request = serde_json::from_str(
            r#"{"type":"add_macro","hotkeys":[17,65],"actions":[{"type":"combo","keys":[17,67]}]}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            Request::AddMacro {
                hotkeys: vec![KeyCode::CONTROL, KeyCode(65)],
                actions: vec![MacroAction::Combo {
                    keys: vec![KeyCode::CONTROL, KeyCode(67)]
                }],
            }
        );
    }

    #[test]
    fn test_load_path_is_optional() {
        let req: Request = serde_json::from_str(r#"{"type":"load"}"#).unwrap();
        assert_eq!(req, Request::Load { path: None });
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""engine_state":"enabled""#));
    }

    #[test]
    fn test_registry_error_codes() {
        let resp: Response = RegistryError::IndexOutOfRange { index: 4, len: 1 }.into();
        assert!(matches!(resp, Response::Error { ref code, .. } if code == "index_out_of_range"));
    }

    #[test]
    fn test_notification_wraps_event() {
        let note = Notification::Event {
            event: EngineEvent::EngineToggled { enabled: true },
        };
        let json = serde_json::to_string(&note).unwrap();
        assert_eq!(
            json,
            r#"{"type":"event","event":{"type":"engine_toggled","enabled":true}}"#
        );
    }
}
