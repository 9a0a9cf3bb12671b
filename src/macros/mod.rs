//! Macro definitions, the shared registry and the on-disk format

pub mod codec;
mod model;
mod registry;

pub use codec::{CodecError, LineError, SkippedLine};
pub use model::{Macro, MacroAction, MacroError};
pub use registry::{LoadSummary, MacroRegistry, RegistryError};
