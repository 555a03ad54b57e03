use crate::session::{RecorderOptions, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Commands a recorder issues to its engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Prepare,
    Record,
    Pause,
    Stop,
    Destroy,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => write!(f, "prepare"),
            Self::Record => write!(f, "record"),
            Self::Pause => write!(f, "pause"),
            Self::Stop => write!(f, "stop"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

/// Failure reported by an engine for a single command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct EngineError {
    /// Short machine-readable reason (e.g. "invalidpath", "notprepared")
    pub code: String,
    pub message: String,
}

impl EngineError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Audio recording engine
///
/// The engine does the actual capture work. Every command completes exactly
/// once; unsolicited notifications (`ended`, `info`, `error`, ...) travel
/// separately through an [`EventBus`](crate::events::EventBus) keyed by
/// session identity.
///
/// Implementations:
/// - [`SimulatedEngine`](super::SimulatedEngine): in-process engine with
///   metering and duration limits, no device access
#[async_trait::async_trait]
pub trait RecordingEngine: Send + Sync {
    /// Allocate resources for `id` and report where output will be written
    async fn prepare(
        &self,
        id: SessionId,
        target_path: &Path,
        options: &RecorderOptions,
    ) -> Result<PathBuf, EngineError>;

    /// Start (or resume) capturing
    async fn record(&self, id: SessionId) -> Result<(), EngineError>;

    async fn pause(&self, id: SessionId) -> Result<(), EngineError>;

    async fn stop(&self, id: SessionId) -> Result<(), EngineError>;

    /// Release every engine-side resource held for `id`
    async fn destroy(&self, id: SessionId) -> Result<(), EngineError>;

    /// Get engine name for logging
    fn name(&self) -> &str;
}
