//! Engine lifecycle notifications
//!
//! Emitted on a broadcast channel; the daemon logs them and control-surface
//! subscribers receive them as push frames.

use serde::{Deserialize, Serialize};

use crate::hotkey::KeyCode;

/// Discrete things that happened inside the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The keyboard hook is registered and intercepting
    ListenerInstalled,

    /// The keyboard hook could not be registered; running without interception
    ListenerFailed { reason: String },

    /// A hotkey matched and its actions were dispatched
    MacroTriggered {
        /// Registry index of the macro
        index: usize,
        /// Key whose press completed the combination
        key: KeyCode,
    },

    /// A dispatched macro finished playing
    MacroCompleted {
        index: usize,
        /// Wall time from dispatch to the end of the restore phase
        duration_ms: u64,
    },

    /// A trigger arrived while the same macro was still playing and the
    /// overlap policy dropped it
    MacroRejected { index: usize },

    /// The engine was switched on or off with the control key
    EngineToggled { enabled: bool },

    /// The control key asked the process to exit
    TerminationRequested,

    /// The registry was replaced from a macro file
    RegistryLoaded { count: usize, skipped: usize },

    /// The registry was written to a macro file
    RegistrySaved { count: usize },
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::ListenerInstalled => write!(f, "LISTENER_INSTALLED"),
            EngineEvent::ListenerFailed { reason } => write!(f, "LISTENER_FAILED ({})", reason),
            EngineEvent::MacroTriggered { index, key } => {
                write!(f, "MACRO_TRIGGERED (#{} by {})", index, key)
            }
            EngineEvent::MacroCompleted { index, duration_ms } => {
                write!(f, "MACRO_COMPLETED (#{} in {}ms)", index, duration_ms)
            }
            EngineEvent::MacroRejected { index } => write!(f, "MACRO_REJECTED (#{})", index),
            EngineEvent::EngineToggled { enabled } => {
                write!(f, "ENGINE_{}", if *enabled { "ENABLED" } else { "DISABLED" })
            }
            EngineEvent::TerminationRequested => write!(f, "TERMINATION_REQUESTED"),
            EngineEvent::RegistryLoaded { count, skipped } => {
                write!(f, "REGISTRY_LOADED ({} macros, {} lines skipped)", count, skipped)
            }
            EngineEvent::RegistrySaved { count } => write!(f, "REGISTRY_SAVED ({} macros)", count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = EngineEvent::MacroCompleted { index: 2, duration_ms: 1500 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("macro_completed"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"engine_toggled","enabled":false}"#;
        let event: EngineEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, EngineEvent::EngineToggled { enabled: false });
    }

    #[test]
    fn test_display() {
        let event = EngineEvent::MacroTriggered { index: 0, key: KeyCode::F1 };
        assert_eq!(event.to_string(), "MACRO_TRIGGERED (#0 by F1)");
        assert_eq!(EngineEvent::EngineToggled { enabled: true }.to_string(), "ENGINE_ENABLED");
    }
}
