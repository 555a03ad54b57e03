use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a recorder session
///
/// Variants are declared in order of progress, so comparisons such as
/// `state >= RecorderState::Recording` read as "has reached recording".
/// `Destroyed` and `Error` sit below `Idle`: neither counts as progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// Capture finished; only `destroy` is meaningful from here
    Destroyed,
    /// The last command failed
    Error,
    /// Initial state, nothing allocated on the engine side
    Idle,
    /// A prepare command is in flight
    Preparing,
    /// The engine is ready to record into the resolved path
    Prepared,
    /// Audio is being captured
    Recording,
    /// Capture is suspended and can be resumed with `record`
    Paused,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Idle
    }
}

impl RecorderState {
    /// Ready to record, or already recording
    pub fn can_record(self) -> bool {
        self >= Self::Prepared
    }

    pub fn can_prepare(self) -> bool {
        self == Self::Idle
    }

    pub fn is_recording(self) -> bool {
        self == Self::Recording
    }

    pub fn is_prepared(self) -> bool {
        self == Self::Prepared
    }

    /// Recording or paused; `pause` and `stop` only reach the engine from here
    pub fn is_capturing(self) -> bool {
        self >= Self::Recording
    }

    /// Result of an `ended` event: progress is pulled back to at most `Prepared`
    pub fn clamp_ended(self) -> Self {
        self.min(Self::Prepared)
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destroyed => write!(f, "destroyed"),
            Self::Error => write!(f, "error"),
            Self::Idle => write!(f, "idle"),
            Self::Preparing => write!(f, "preparing"),
            Self::Prepared => write!(f, "prepared"),
            Self::Recording => write!(f, "recording"),
            Self::Paused => write!(f, "paused"),
        }
    }
}
