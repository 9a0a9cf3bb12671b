//! Global keystroke interception decisions
//!
//! [`HotkeyListener::handle`] is called synchronously for every physical key
//! transition and decides whether the key reaches applications. It is kept
//! free of OS types; the platform hook only translates events in and the
//! disposition out.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use super::keys::{KeyCode, CONTROL_KEY};
use super::matcher::find_match;
use crate::events::EngineEvent;
use crate::executor::ActionExecutor;
use crate::input::KeyStateOracle;
use crate::lifecycle::TerminationHandle;
use crate::macros::MacroRegistry;
use crate::state::EngineSwitch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// One key transition as seen by the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: KeyCode,
    pub direction: KeyDirection,
    /// Injected by software, including by this engine
    pub synthetic: bool,
}

impl KeyTransition {
    pub fn down(key: KeyCode) -> Self {
        Self {
            key,
            direction: KeyDirection::Down,
            synthetic: false,
        }
    }

    pub fn up(key: KeyCode) -> Self {
        Self {
            key,
            direction: KeyDirection::Up,
            synthetic: false,
        }
    }

    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }
}

/// Whether a transition continues to applications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    PassThrough,
    Suppress,
}

/// Errors that can occur while installing the keyboard hook
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("keyboard hook is already installed")]
    AlreadyRunning,

    #[error("global keyboard interception is not supported on this platform")]
    Unsupported,

    #[error("failed to install keyboard hook: {0}")]
    HookInstall(String),

    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),
}

/// Decides the fate of each physical keystroke
pub struct HotkeyListener {
    registry: Arc<MacroRegistry>,
    switch: Arc<EngineSwitch>,
    executor: ActionExecutor,
    oracle: Arc<dyn KeyStateOracle>,
    termination: TerminationHandle,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl HotkeyListener {
    pub fn new(
        registry: Arc<MacroRegistry>,
        switch: Arc<EngineSwitch>,
        executor: ActionExecutor,
        oracle: Arc<dyn KeyStateOracle>,
        termination: TerminationHandle,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            registry,
            switch,
            executor,
            oracle,
            termination,
            event_tx,
        }
    }

    /// Handle one transition. Must return quickly: the OS drops hooks that
    /// stall, so playback is only dispatched from here, never awaited.
    pub fn handle(&self, transition: KeyTransition) -> Disposition {
        if transition.synthetic {
            trace!(key = %transition.key, "synthetic event passed through");
            return Disposition::PassThrough;
        }

        if transition.direction == KeyDirection::Up {
            return Disposition::PassThrough;
        }

        let key = transition.key;

        if key == CONTROL_KEY {
            if self.oracle.is_held(KeyCode::CONTROL) {
                self.switch.toggle();
            } else {
                info!("control key pressed, requesting termination");
                self.termination.request();
                let _ = self.event_tx.send(EngineEvent::TerminationRequested);
            }
            return Disposition::Suppress;
        }

        if !self.switch.current().is_enabled() {
            return Disposition::PassThrough;
        }

        let macros = self.registry.snapshot();
        let Some(index) = find_match(key, &macros, self.oracle.as_ref()) else {
            return Disposition::PassThrough;
        };

        debug!(index, %key, "hotkey matched");
        let _ = self.event_tx.send(EngineEvent::MacroTriggered { index, key });
        self.executor.dispatch(index, macros[index].actions().to_vec());

        Disposition::Suppress
    }
}
