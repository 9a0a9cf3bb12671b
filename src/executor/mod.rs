//! Macro dispatch
//!
//! Every trigger becomes its own tokio task so the keyboard hook returns
//! immediately. Runs are not pooled and cannot be cancelled once started.

mod playback;

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use playback::{Phase, Playback, PlaybackReport, PlaybackTimings};

use crate::events::EngineEvent;
use crate::input::{InputSender, KeyStateOracle};
use crate::macros::MacroAction;

/// What happens when a macro is triggered while an earlier run of the same
/// macro is still playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Start another run alongside the first
    #[default]
    Allow,
    /// Swallow the trigger without playing anything
    Reject,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown overlap policy {0:?} (expected \"allow\" or \"reject\")")]
pub struct ParsePolicyError(String);

impl FromStr for OverlapPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(OverlapPolicy::Allow),
            "reject" => Ok(OverlapPolicy::Reject),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// Spawns playback runs on the tokio runtime
pub struct ActionExecutor {
    runtime: Handle,
    playback: Playback,
    overlap: OverlapPolicy,
    in_flight: Arc<Mutex<HashSet<usize>>>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl ActionExecutor {
    /// `runtime` must outlive the executor; runs are spawned on it from the
    /// hook thread, which is not a tokio thread.
    pub fn new(
        runtime: Handle,
        oracle: Arc<dyn KeyStateOracle>,
        sender: Arc<dyn InputSender>,
        timings: PlaybackTimings,
        overlap: OverlapPolicy,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            runtime,
            playback: Playback::new(oracle, sender, timings),
            overlap,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            event_tx,
        }
    }

    /// Start playing `actions` for the macro at `index` and return at once.
    ///
    /// Returns `None` when the overlap policy rejected the trigger.
    pub fn dispatch(&self, index: usize, actions: Vec<MacroAction>) -> Option<JoinHandle<PlaybackReport>> {
        let guard = match self.overlap {
            OverlapPolicy::Allow => None,
            OverlapPolicy::Reject => match InFlightGuard::claim(&self.in_flight, index) {
                Some(guard) => Some(guard),
                None => {
                    warn!(index, "macro still playing, trigger rejected");
                    let _ = self.event_tx.send(EngineEvent::MacroRejected { index });
                    return None;
                }
            },
        };

        let playback = self.playback.clone();
        let event_tx = self.event_tx.clone();

        let handle = self.runtime.spawn(async move {
            let _guard = guard;
            let started = Instant::now();

            let report = playback.run(&actions).await;

            let duration_ms = started.elapsed().as_millis() as u64;
            info!(index, duration_ms, "macro completed");
            let _ = event_tx.send(EngineEvent::MacroCompleted { index, duration_ms });
            report
        });

        debug!(index, "macro dispatched");
        Some(handle)
    }
}

/// Marks a macro index as playing until dropped
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<usize>>>,
    index: usize,
}

impl InFlightGuard {
    fn claim(in_flight: &Arc<Mutex<HashSet<usize>>>, index: usize) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !set.insert(index) {
            return None;
        }
        Some(Self {
            in_flight: Arc::clone(in_flight),
            index,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        set.remove(&self.index);
    }
}
