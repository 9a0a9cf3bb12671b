//! Keyboard state polling and synthetic input injection
//!
//! The hotkey matcher and the action executor only talk to the keyboard
//! through the two traits defined here, so they can run against the real
//! Windows backend or the in-memory [`SimulatedKeyboard`].

mod simulated;
#[cfg(windows)]
mod win32;

use std::sync::Arc;

pub use simulated::{SimulatedKeyboard, SyntheticEvent};
#[cfg(windows)]
pub use win32::WindowsKeyboard;

use crate::hotkey::KeyCode;

/// Value stored in the extra-info field of every injected event
pub const SYNTHETIC_TAG: usize = 0x5748_4B59;

/// Instantaneous view of which keys are physically held
pub trait KeyStateOracle: Send + Sync {
    /// Raw query for a single code. A generic modifier code reports down
    /// when either side is down.
    fn is_down(&self, key: KeyCode) -> bool;

    /// Held-state with modifier canonicalisation: a generic modifier is held
    /// when either side of its class is held.
    fn is_held(&self, key: KeyCode) -> bool {
        if key.is_generic_modifier() {
            if let Some(class) = key.modifier_class() {
                return class.sides().iter().any(|side| self.is_down(*side)) || self.is_down(key);
            }
        }
        self.is_down(key)
    }
}

/// Emits synthetic keyboard events that the OS treats as real input
pub trait InputSender: Send + Sync {
    fn key_down(&self, key: KeyCode);

    fn key_up(&self, key: KeyCode);

    /// Type a single character as Unicode input (one down+up pair),
    /// bypassing the active keyboard layout
    fn type_char(&self, ch: char);
}

/// Oracle and sender for the current platform.
///
/// Windows gets the real backend. Elsewhere there is nothing to hook, so the
/// daemon runs degraded and a simulated keyboard stands in.
pub fn platform_keyboard() -> (Arc<dyn KeyStateOracle>, Arc<dyn InputSender>) {
    #[cfg(windows)]
    {
        let keyboard = Arc::new(WindowsKeyboard::new());
        (keyboard.clone(), keyboard)
    }

    #[cfg(not(windows))]
    {
        let keyboard = Arc::new(SimulatedKeyboard::new());
        (keyboard.clone(), keyboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_modifier_held_via_either_side() {
        let kb = SimulatedKeyboard::new();
        kb.press(KeyCode::RCONTROL);

        assert!(kb.is_held(KeyCode::CONTROL));
        assert!(kb.is_held(KeyCode::RCONTROL));
        assert!(!kb.is_held(KeyCode::LCONTROL));
        assert!(!kb.is_held(KeyCode::SHIFT));
    }

    #[test]
    fn test_plain_key_held() {
        let kb = SimulatedKeyboard::new();
        let a = KeyCode(b'A' as u16);
        assert!(!kb.is_held(a));
        kb.press(a);
        assert!(kb.is_held(a));
        kb.release(a);
        assert!(!kb.is_held(a));
    }
}
