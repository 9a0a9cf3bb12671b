//! Macro definitions

use serde::{Deserialize, Serialize};

use crate::hotkey::KeyCode;

/// One step of a macro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MacroAction {
    /// Press every key in order, then release them all
    Combo { keys: Vec<KeyCode> },
    /// Type text as Unicode input, independent of keyboard layout
    Text { text: String },
    /// Pause playback
    Wait { ms: u64 },
}

impl MacroAction {
    /// Short tag used by the persistence format
    pub fn kind(&self) -> &'static str {
        match self {
            MacroAction::Combo { .. } => "COMBO",
            MacroAction::Text { .. } => "TEXT",
            MacroAction::Wait { .. } => "WAIT",
        }
    }
}

/// A hotkey combination and the actions it replays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MacroDef")]
pub struct Macro {
    hotkeys: Vec<KeyCode>,
    actions: Vec<MacroAction>,
}

impl Macro {
    /// Build a validated macro.
    ///
    /// Null codes and duplicates are dropped from the hotkeys; the first
    /// occurrence keeps its position.
    pub fn new(hotkeys: Vec<KeyCode>, actions: Vec<MacroAction>) -> Result<Self, MacroError> {
        let hotkeys = normalize_hotkeys(hotkeys);
        if hotkeys.is_empty() {
            return Err(MacroError::EmptyHotkeys);
        }
        if actions.is_empty() {
            return Err(MacroError::EmptyActions);
        }
        if let Some(position) = actions
            .iter()
            .position(|action| matches!(action, MacroAction::Combo { keys } if keys.is_empty()))
        {
            return Err(MacroError::EmptyCombo { position });
        }
        if let Some(position) = actions
            .iter()
            .position(|action| matches!(action, MacroAction::Text { text } if !is_storable_text(text)))
        {
            return Err(MacroError::UnstorableText { position });
        }
        Ok(Self { hotkeys, actions })
    }

    pub fn hotkeys(&self) -> &[KeyCode] {
        &self.hotkeys
    }

    pub fn actions(&self) -> &[MacroAction] {
        &self.actions
    }

    /// Order-insensitive hotkey set comparison
    pub fn has_hotkeys(&self, other: &[KeyCode]) -> bool {
        let other = normalize_hotkeys(other.to_vec());
        other.len() == self.hotkeys.len() && other.iter().all(|key| self.hotkeys.contains(key))
    }

    pub(crate) fn push_action(&mut self, action: MacroAction) {
        self.actions.push(action);
    }
}

/// Unvalidated wire form of a [`Macro`]
#[derive(Debug, Clone, Deserialize)]
struct MacroDef {
    hotkeys: Vec<KeyCode>,
    actions: Vec<MacroAction>,
}

impl TryFrom<MacroDef> for Macro {
    type Error = MacroError;

    fn try_from(def: MacroDef) -> Result<Self, Self::Error> {
        Macro::new(def.hotkeys, def.actions)
    }
}

/// Text the macro file can hold as one line and read back unchanged
fn is_storable_text(text: &str) -> bool {
    !text.contains(['\n', '\r']) && text.trim_matches([' ', '\t']) == text
}

fn normalize_hotkeys(hotkeys: Vec<KeyCode>) -> Vec<KeyCode> {
    let mut normalized: Vec<KeyCode> = Vec::with_capacity(hotkeys.len());
    for key in hotkeys {
        if !key.is_null() && !normalized.contains(&key) {
            normalized.push(key);
        }
    }
    normalized
}

/// Reasons a macro definition is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacroError {
    #[error("macro has no hotkeys")]
    EmptyHotkeys,

    #[error("macro has no actions")]
    EmptyActions,

    #[error("combo action {position} has no keys")]
    EmptyCombo { position: usize },

    #[error("text action {position} has a line break or leading/trailing whitespace")]
    UnstorableText { position: usize },
}
