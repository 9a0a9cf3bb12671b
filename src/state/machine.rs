//! Engine on/off switch
//!
//! Read on every keystroke by the hook thread, flipped only by the control
//! key combination.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::events::EngineEvent;

/// Whether hotkeys are being matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Hotkeys fire macros
    #[default]
    Enabled,
    /// Every key passes through except the control key
    Disabled,
}

impl EngineState {
    pub fn is_enabled(self) -> bool {
        self == EngineState::Enabled
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Enabled => write!(f, "Enabled"),
            EngineState::Disabled => write!(f, "Disabled"),
        }
    }
}

/// Process-wide engine state, starting [`EngineState::Enabled`]
pub struct EngineSwitch {
    enabled: AtomicBool,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl EngineSwitch {
    pub fn new(event_tx: broadcast::Sender<EngineEvent>) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            event_tx,
        }
    }

    pub fn current(&self) -> EngineState {
        if self.enabled.load(Ordering::Acquire) {
            EngineState::Enabled
        } else {
            EngineState::Disabled
        }
    }

    /// Flip the state and return the new one
    pub fn toggle(&self) -> EngineState {
        let was_enabled = self.enabled.fetch_xor(true, Ordering::AcqRel);
        let state = if was_enabled {
            EngineState::Disabled
        } else {
            EngineState::Enabled
        };

        info!(%state, "engine toggled");
        let event = EngineEvent::EngineToggled {
            enabled: state.is_enabled(),
        };
        debug!(?event, "emitting toggle event");
        let _ = self.event_tx.send(event);

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_switch() -> (EngineSwitch, broadcast::Receiver<EngineEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (EngineSwitch::new(tx), rx)
    }

    #[test]
    fn test_initial_state() {
        let (switch, _) = create_switch();
        assert_eq!(switch.current(), EngineState::Enabled);
    }

    #[test]
    fn test_toggle_round_trip() {
        let (switch, _) = create_switch();

        assert_eq!(switch.toggle(), EngineState::Disabled);
        assert_eq!(switch.current(), EngineState::Disabled);

        assert_eq!(switch.toggle(), EngineState::Enabled);
        assert_eq!(switch.current(), EngineState::Enabled);
    }

    #[test]
    fn test_toggle_emits_event() {
        let (switch, mut rx) = create_switch();
        switch.toggle();

        assert_eq!(rx.try_recv().unwrap(), EngineEvent::EngineToggled { enabled: false });
    }

    #[test]
    fn test_toggle_without_subscribers() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        let switch = EngineSwitch::new(tx);
        assert_eq!(switch.toggle(), EngineState::Disabled);
    }
}
