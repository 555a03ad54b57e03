pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod session;

pub use config::Config;
pub use engine::{Command, EngineError, RecordingEngine, SimulatedEngine, SimulatedEngineConfig};
pub use error::RecorderError;
pub use events::{BusError, EngineEvent, EventBus, EventKind, Subscription};
pub use session::{
    IdentityAllocator, Quality, Recorder, RecorderEvent, RecorderFactory, RecorderOptions,
    RecorderState, SessionId,
};
