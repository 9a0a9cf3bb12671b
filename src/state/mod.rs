//! Engine state
//!
//! Two states, switched by Ctrl + the control key:
//! - Enabled: hotkeys fire macros
//! - Disabled: keys pass through untouched

mod machine;

pub use machine::{EngineState, EngineSwitch};
