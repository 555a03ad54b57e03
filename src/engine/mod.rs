pub mod backend;
pub mod simulated;

pub use backend::{Command, EngineError, RecordingEngine};
pub use simulated::{SimulatedEngine, SimulatedEngineConfig};
