// Scripted engine shared by the integration tests
#![allow(dead_code)]

use audio_recorder::{
    Command, EngineError, EventBus, RecorderFactory, RecorderOptions, RecordingEngine, SessionId,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Holds one engine command open until released
#[derive(Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Wait until the engine is inside the held command
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Engine double that records every call and fails or blocks on demand
#[derive(Default)]
pub struct ScriptedEngine {
    calls: Mutex<Vec<(Command, SessionId)>>,
    failures: Mutex<HashMap<Command, EngineError>>,
    gates: Mutex<HashMap<Command, Gate>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later `command` fail with `code`
    pub fn fail(&self, command: Command, code: &str) {
        self.failures.lock().unwrap().insert(
            command,
            EngineError::new(code, format!("scripted {} failure", command)),
        );
    }

    pub fn succeed(&self, command: Command) {
        self.failures.lock().unwrap().remove(&command);
    }

    /// Block the next `command` until the returned gate is released
    pub fn hold(&self, command: Command) -> Gate {
        let gate = Gate::default();
        self.gates.lock().unwrap().insert(command, gate.clone());
        gate
    }

    pub fn commands(&self) -> Vec<Command> {
        self.calls.lock().unwrap().iter().map(|(command, _)| *command).collect()
    }

    pub fn calls(&self) -> Vec<(Command, SessionId)> {
        self.calls.lock().unwrap().clone()
    }

    async fn run(&self, command: Command, id: SessionId) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push((command, id));

        let gate = self.gates.lock().unwrap().remove(&command);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        match self.failures.lock().unwrap().get(&command) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Where the scripted engine says a target ends up
pub fn resolved(target: &str) -> PathBuf {
    let name = Path::new(target).file_name().unwrap_or_default();
    PathBuf::from("/engine/recordings").join(name)
}

#[async_trait::async_trait]
impl RecordingEngine for ScriptedEngine {
    async fn prepare(
        &self,
        id: SessionId,
        target_path: &Path,
        _options: &RecorderOptions,
    ) -> Result<PathBuf, EngineError> {
        self.run(Command::Prepare, id).await?;
        Ok(resolved(&target_path.to_string_lossy()))
    }

    async fn record(&self, id: SessionId) -> Result<(), EngineError> {
        self.run(Command::Record, id).await
    }

    async fn pause(&self, id: SessionId) -> Result<(), EngineError> {
        self.run(Command::Pause, id).await
    }

    async fn stop(&self, id: SessionId) -> Result<(), EngineError> {
        self.run(Command::Stop, id).await
    }

    async fn destroy(&self, id: SessionId) -> Result<(), EngineError> {
        self.run(Command::Destroy, id).await
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn factory() -> (Arc<ScriptedEngine>, RecorderFactory) {
    let engine = ScriptedEngine::new();
    let factory = RecorderFactory::new(engine.clone(), EventBus::new());
    (engine, factory)
}
