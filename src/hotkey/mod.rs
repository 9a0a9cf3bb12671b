//! Global keystroke interception and hotkey matching
//!
//! The OS hook (`hook`) feeds physical key transitions to the listener,
//! which consults the matcher and hands matched macros to the executor.

pub mod hook;
mod keys;
mod listener;
mod matcher;

pub use hook::HookHandle;
pub use keys::{KeyCode, ModifierClass, CONTROL_KEY, RELEASE_CHECK_LIST};
pub use listener::{Disposition, HotkeyListener, KeyDirection, KeyTransition, ListenerError};
pub use matcher::find_match;
