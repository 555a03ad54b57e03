use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Capture quality requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Options passed through to the engine when a session is prepared
///
/// Missing keys in a deserialized table take their default, so a partial
/// `[recorder]` section is merged over the defaults. In code, use struct
/// update syntax: `RecorderOptions { channels: 1, ..Default::default() }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderOptions {
    /// Whether the engine releases its resources on its own after stop
    pub auto_destroy: bool,

    /// Encoder bitrate in bits per second
    pub bitrate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    pub quality: Quality,

    /// How often the engine emits metering `info` events (zero disables them)
    #[serde(rename = "metering_interval_ms", with = "duration_ms")]
    pub metering_interval: Duration,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            auto_destroy: true,
            bitrate: 1_280_000,
            channels: 2,
            sample_rate: 44_100,
            quality: Quality::Medium,
            metering_interval: Duration::from_millis(250),
        }
    }
}

mod duration_ms {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        // Saturates; no real interval comes near u64::MAX millis
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
