//! Single macro playback with modifier release/restore
//!
//! A run walks through Settling → Releasing → Playing → Restoring → Done.
//! Modifiers the user is physically holding are released before the first
//! action so they do not combine with the macro's own keys, and pressed
//! again afterwards only if the user is still holding them.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::hotkey::{KeyCode, RELEASE_CHECK_LIST};
use crate::input::{InputSender, KeyStateOracle};
use crate::macros::MacroAction;

/// Fixed delays of the playback protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTimings {
    /// Pause before any injection so the hook callback has returned
    pub settle: Duration,
    /// Pause between releasing held modifiers and the first action
    pub release_gap: Duration,
    /// How long every combo keeps its keys down
    pub combo_hold: Duration,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(10),
            release_gap: Duration::from_millis(5),
            combo_hold: Duration::from_millis(10),
        }
    }
}

/// Protocol phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Settling,
    Releasing,
    Playing,
    Restoring,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Settling => write!(f, "Settling"),
            Phase::Releasing => write!(f, "Releasing"),
            Phase::Playing => write!(f, "Playing"),
            Phase::Restoring => write!(f, "Restoring"),
            Phase::Done => write!(f, "Done"),
        }
    }
}

/// What a run did to the user's modifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Modifiers force-released before playing
    pub released: Vec<KeyCode>,
    /// Released modifiers pressed again afterwards
    pub restored: Vec<KeyCode>,
}

/// Plays one action list against a keyboard backend
#[derive(Clone)]
pub struct Playback {
    oracle: Arc<dyn KeyStateOracle>,
    sender: Arc<dyn InputSender>,
    timings: PlaybackTimings,
}

impl Playback {
    pub fn new(
        oracle: Arc<dyn KeyStateOracle>,
        sender: Arc<dyn InputSender>,
        timings: PlaybackTimings,
    ) -> Self {
        Self {
            oracle,
            sender,
            timings,
        }
    }

    /// Run the full protocol. Never fails; the keyboard backend logs its
    /// own injection problems.
    pub async fn run(&self, actions: &[MacroAction]) -> PlaybackReport {
        let mut phase = Phase::Settling;
        debug!(%phase, "playback phase");
        sleep(self.timings.settle).await;

        phase = Phase::Releasing;
        debug!(%phase, "playback phase");
        let released = self.release_held_modifiers();
        if !released.is_empty() {
            debug!(?released, "released held modifiers");
        }
        sleep(self.timings.release_gap).await;

        phase = Phase::Playing;
        debug!(%phase, actions = actions.len(), "playback phase");
        for action in actions {
            self.play(action).await;
        }

        phase = Phase::Restoring;
        debug!(%phase, "playback phase");
        let restored = self.restore_modifiers(&released);
        if !restored.is_empty() {
            debug!(?restored, "restored held modifiers");
        }

        phase = Phase::Done;
        debug!(%phase, "playback phase");

        PlaybackReport { released, restored }
    }

    async fn play(&self, action: &MacroAction) {
        match action {
            MacroAction::Combo { keys } => {
                for key in keys {
                    self.sender.key_down(*key);
                }
                sleep(self.timings.combo_hold).await;
                for key in keys {
                    self.sender.key_up(*key);
                }
            }
            MacroAction::Text { text } => {
                for ch in text.chars() {
                    self.sender.type_char(ch);
                }
            }
            MacroAction::Wait { ms } => {
                if *ms > 0 {
                    sleep(Duration::from_millis(*ms)).await;
                }
            }
        }
    }

    fn release_held_modifiers(&self) -> Vec<KeyCode> {
        RELEASE_CHECK_LIST
            .iter()
            .copied()
            .filter(|key| self.oracle.is_down(*key))
            .inspect(|key| self.sender.key_up(*key))
            .collect()
    }

    fn restore_modifiers(&self, released: &[KeyCode]) -> Vec<KeyCode> {
        released
            .iter()
            .copied()
            .filter(|key| self.oracle.is_down(*key))
            .inspect(|key| self.sender.key_down(*key))
            .collect()
    }
}
