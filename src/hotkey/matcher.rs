//! Hotkey matching
//!
//! Decides which macro, if any, a key-down fires. Pure: the result depends
//! only on the pressed key, the macro list and the oracle's answers.

use super::keys::KeyCode;
use crate::input::KeyStateOracle;
use crate::macros::Macro;

/// Index of the first macro fully satisfied by `pressed` plus the keys held
/// right now. Registry order breaks ties.
pub fn find_match(pressed: KeyCode, macros: &[Macro], oracle: &dyn KeyStateOracle) -> Option<usize> {
    macros
        .iter()
        .position(|m| is_triggered_by(m, pressed) && all_held(m, pressed, oracle))
}

/// The macro contains a key trigger-equivalent to the one just pressed
fn is_triggered_by(m: &Macro, pressed: KeyCode) -> bool {
    m.hotkeys().iter().any(|hotkey| hotkey.is_trigger_equivalent(pressed))
}

fn all_held(m: &Macro, pressed: KeyCode, oracle: &dyn KeyStateOracle) -> bool {
    m.hotkeys().iter().all(|hotkey| is_held(*hotkey, pressed, oracle))
}

fn is_held(hotkey: KeyCode, pressed: KeyCode, oracle: &dyn KeyStateOracle) -> bool {
    // The OS key state is not updated until the hook returns, so the key
    // being pressed has to be counted explicitly.
    if hotkey == pressed {
        return true;
    }
    if hotkey.is_generic_modifier() && hotkey.modifier_class() == pressed.modifier_class() {
        return true;
    }
    oracle.is_held(hotkey)
}
