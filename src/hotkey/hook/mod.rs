//! OS keyboard hook
//!
//! Installs the process-wide low-level hook that feeds every physical key
//! transition to a [`HotkeyListener`]. Only Windows has a backend; elsewhere
//! [`install`] fails with [`ListenerError::Unsupported`] and the daemon runs
//! without interception.

#[cfg(windows)]
mod win32;

use std::sync::Arc;
use std::thread;

use tracing::warn;

use super::keys::KeyCode;
use super::listener::{HotkeyListener, KeyDirection, KeyTransition, ListenerError};
use crate::input::SYNTHETIC_TAG;

#[cfg(windows)]
pub use win32::HookHandle;

/// Keeps the hook installed until dropped
#[cfg(not(windows))]
pub struct HookHandle {
    _private: (),
}

/// Register `listener` with the OS. The hook stays active until the returned
/// handle is dropped.
#[cfg(windows)]
pub fn install(listener: Arc<HotkeyListener>) -> Result<HookHandle, ListenerError> {
    win32::install(listener)
}

#[cfg(not(windows))]
pub fn install(_listener: Arc<HotkeyListener>) -> Result<HookHandle, ListenerError> {
    Err(ListenerError::Unsupported)
}

/// Tell the user interception is unavailable. Shows a message box on
/// Windows; elsewhere the log line is all there is.
///
/// The dialog is modal, so it gets a detached thread of its own and the
/// caller carries on starting the daemon.
pub fn report_failure(err: &ListenerError) {
    #[cfg(windows)]
    {
        let message = format!("Keyboard hook could not be installed.\n\n{}", err);
        let _ = show_detached(message, |text| win32::show_error(text));
    }

    #[cfg(not(windows))]
    let _ = err;
}

/// Run a blocking notification on its own thread and return immediately
#[cfg_attr(not(windows), allow(dead_code))]
fn show_detached<F>(message: String, show: F) -> Option<thread::JoinHandle<()>>
where
    F: FnOnce(&str) + Send + 'static,
{
    match thread::Builder::new()
        .name("hook-failure-dialog".to_string())
        .spawn(move || show(&message))
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(?e, "failed to show hook failure dialog");
            None
        }
    }
}

/// Build a transition from the raw fields the OS hands the hook
#[cfg_attr(not(windows), allow(dead_code))]
fn transition_from_raw(vk_code: u32, is_down: bool, injected: bool, extra_info: usize) -> KeyTransition {
    KeyTransition {
        key: KeyCode(vk_code as u16),
        direction: if is_down { KeyDirection::Down } else { KeyDirection::Up },
        synthetic: injected || extra_info == SYNTHETIC_TAG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_dialog_does_not_block_caller() {
        use std::sync::mpsc;

        let (dismiss_tx, dismiss_rx) = mpsc::channel::<()>();
        let (shown_tx, shown_rx) = mpsc::channel::<String>();

        // Stays "open" until dismissed, like a modal message box
        let dialog = show_detached("hook failed".to_string(), move |text| {
            shown_tx.send(text.to_string()).unwrap();
            dismiss_rx.recv().unwrap();
        })
        .unwrap();

        assert_eq!(shown_rx.recv().unwrap(), "hook failed");
        assert!(!dialog.is_finished());

        dismiss_tx.send(()).unwrap();
        dialog.join().unwrap();
    }

    #[test]
    fn test_physical_key_down() {
        let t = transition_from_raw(0x41, true, false, 0);
        assert_eq!(t, KeyTransition::down(KeyCode(0x41)));
    }

    #[test]
    fn test_key_up() {
        let t = transition_from_raw(0x7B, false, false, 0);
        assert_eq!(t.direction, KeyDirection::Up);
        assert!(!t.synthetic);
    }

    #[test]
    fn test_injected_flag_marks_synthetic() {
        assert!(transition_from_raw(0x41, true, true, 0).synthetic);
    }

    #[test]
    fn test_own_tag_marks_synthetic() {
        assert!(transition_from_raw(0x41, true, false, SYNTHETIC_TAG).synthetic);
        assert!(!transition_from_raw(0x41, true, false, SYNTHETIC_TAG + 1).synthetic);
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_install_unsupported() {
        use tokio::runtime::Handle;
        use tokio::sync::broadcast;

        use crate::executor::{ActionExecutor, OverlapPolicy, PlaybackTimings};
        use crate::input::SimulatedKeyboard;
        use crate::lifecycle::ShutdownSignal;
        use crate::macros::MacroRegistry;
        use crate::state::EngineSwitch;

        let (tx, _rx) = broadcast::channel(4);
        let keyboard = Arc::new(SimulatedKeyboard::new());
        let executor = ActionExecutor::new(
            Handle::current(),
            keyboard.clone(),
            keyboard.clone(),
            PlaybackTimings::default(),
            OverlapPolicy::Allow,
            tx.clone(),
        );
        let listener = Arc::new(HotkeyListener::new(
            Arc::new(MacroRegistry::new()),
            Arc::new(EngineSwitch::new(tx.clone())),
            executor,
            keyboard,
            ShutdownSignal::new().handle(),
            tx,
        ));

        assert!(matches!(install(listener), Err(ListenerError::Unsupported)));
    }
}
