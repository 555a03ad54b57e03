use super::options::RecorderOptions;
use super::recorder::Recorder;
use crate::engine::RecordingEngine;
use crate::events::EventBus;
use std::path::PathBuf;
use std::sync::Arc;

/// Creates recorders that share one engine and one event bus
///
/// Identities come from the bus, so any number of factories on the same bus
/// never hand out the same one.
pub struct RecorderFactory {
    engine: Arc<dyn RecordingEngine>,
    bus: EventBus,
}

impl RecorderFactory {
    pub fn new(engine: Arc<dyn RecordingEngine>, bus: EventBus) -> Self {
        Self { engine, bus }
    }

    /// Create a recorder for `target_path` with a fresh identity
    pub fn create(&self, target_path: impl Into<PathBuf>, options: RecorderOptions) -> Recorder {
        Recorder::new(&self.bus, Arc::clone(&self.engine), target_path, options)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
