//! Process lifecycle

mod shutdown;

pub use shutdown::{ShutdownSignal, TerminationHandle};
