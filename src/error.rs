use crate::engine::{Command, EngineError};
use crate::session::{RecorderState, SessionId};

/// Why a recorder command did not succeed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecorderError {
    /// The engine reported a failure for the command
    #[error("{command} failed: {source}")]
    Engine {
        command: Command,
        #[source]
        source: EngineError,
    },

    /// The session was destroyed; its identity is retired
    #[error("{0} is already destroyed")]
    AlreadyDestroyed(SessionId),

    /// The command is not legal in the current state
    #[error("cannot {command} while {state}")]
    InvalidState {
        command: Command,
        state: RecorderState,
    },
}

impl RecorderError {
    pub fn engine(command: Command, source: EngineError) -> Self {
        Self::Engine { command, source }
    }

    /// The engine's own error, if this failure came from the engine
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::Engine { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_already_destroyed(&self) -> bool {
        matches!(self, Self::AlreadyDestroyed(_))
    }
}
