//! In-memory keyboard used by tests and by non-Windows builds

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use super::{InputSender, KeyStateOracle};
use crate::hotkey::KeyCode;

/// Synthetic output recorded by [`SimulatedKeyboard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticEvent {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    /// A Unicode down+up pair
    Char(char),
}

/// Keyboard whose physical state is set by hand.
///
/// Synthetic output is recorded but never changes the physical state, the
/// same way a finger on a key stays there no matter what gets injected.
#[derive(Debug, Default)]
pub struct SimulatedKeyboard {
    held: Mutex<HashSet<KeyCode>>,
    output: Mutex<Vec<SyntheticEvent>>,
}

impl SimulatedKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physically press a key
    pub fn press(&self, key: KeyCode) {
        lock(&self.held).insert(key);
    }

    /// Physically release a key
    pub fn release(&self, key: KeyCode) {
        lock(&self.held).remove(&key);
    }

    /// Everything injected so far, in order
    pub fn output(&self) -> Vec<SyntheticEvent> {
        lock(&self.output).clone()
    }

    /// Typed characters collected into a string
    pub fn typed_text(&self) -> String {
        lock(&self.output)
            .iter()
            .filter_map(|event| match event {
                SyntheticEvent::Char(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: SyntheticEvent) {
        trace!(?event, "simulated input");
        lock(&self.output).push(event);
    }
}

impl KeyStateOracle for SimulatedKeyboard {
    fn is_down(&self, key: KeyCode) -> bool {
        let held = lock(&self.held);
        if held.contains(&key) {
            return true;
        }
        match key.modifier_class() {
            Some(class) if key.is_generic_modifier() => {
                class.sides().iter().any(|side| held.contains(side))
            }
            _ => false,
        }
    }
}

impl InputSender for SimulatedKeyboard {
    fn key_down(&self, key: KeyCode) {
        self.record(SyntheticEvent::KeyDown(key));
    }

    fn key_up(&self, key: KeyCode) {
        self.record(SyntheticEvent::KeyUp(key));
    }

    fn type_char(&self, ch: char) {
        self.record(SyntheticEvent::Char(ch));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_does_not_touch_physical_state() {
        let kb = SimulatedKeyboard::new();
        kb.press(KeyCode::LSHIFT);
        kb.key_up(KeyCode::LSHIFT);

        assert!(kb.is_down(KeyCode::LSHIFT));
        assert_eq!(kb.output(), vec![SyntheticEvent::KeyUp(KeyCode::LSHIFT)]);
    }

    #[test]
    fn test_generic_reports_down_for_either_side() {
        let kb = SimulatedKeyboard::new();
        kb.press(KeyCode::LMENU);
        assert!(kb.is_down(KeyCode::MENU));
        assert!(!kb.is_down(KeyCode::RMENU));
    }

    #[test]
    fn test_typed_text() {
        let kb = SimulatedKeyboard::new();
        for c in "hi".chars() {
            kb.type_char(c);
        }
        kb.key_down(KeyCode::RETURN);
        assert_eq!(kb.typed_text(), "hi");
    }
}
