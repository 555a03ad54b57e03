use super::identity::SessionId;
use super::options::RecorderOptions;
use super::state::RecorderState;
use crate::engine::{Command, EngineError, RecordingEngine};
use crate::error::RecorderError;
use crate::events::{EngineEvent, EventBus, EventKind, Subscription};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Capacity of the per-session notification channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// An engine event re-broadcast to the recorder's subscribers
///
/// `name` and `data` are exactly what the engine sent; state effects of the
/// event have already been applied when subscribers see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderEvent {
    pub session_id: SessionId,
    pub name: String,
    pub data: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl RecorderEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::from_name(&self.name)
    }
}

/// Transient fields, cleared by every reset
#[derive(Debug, Default)]
struct Inner {
    state: RecorderState,
    resolved_path: Option<PathBuf>,
    position: Option<Duration>,
    duration: Option<Duration>,
    /// Set once by `destroy`; the identity is retired from then on
    retired: bool,
}

struct Shared {
    id: SessionId,
    target_path: PathBuf,
    options: RecorderOptions,
    engine: Arc<dyn RecordingEngine>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<RecorderState>,
    events_tx: broadcast::Sender<RecorderEvent>,
    subscription: Mutex<Option<Subscription>>,
}

/// A single recording session driven against a [`RecordingEngine`]
///
/// The recorder owns the session's lifecycle state. Command completions and
/// engine events both mutate it under one lock that is never held across an
/// engine call, so events are applied while commands are in flight and each
/// mutation is complete before anyone is notified of it.
///
/// Cloning is cheap; clones drive the same session.
#[derive(Clone)]
pub struct Recorder {
    shared: Arc<Shared>,
}

impl Recorder {
    /// Create a session under a fresh identity allocated by `bus`
    ///
    /// The session is subscribed to `bus` for its identity until it is
    /// destroyed or dropped.
    pub fn new(
        bus: &EventBus,
        engine: Arc<dyn RecordingEngine>,
        target_path: impl Into<PathBuf>,
        options: RecorderOptions,
    ) -> Self {
        let target_path = target_path.into();
        let (state_tx, _) = watch::channel(RecorderState::Idle);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let weak = weak.clone();
            let subscription = bus.register(move |event| {
                if let Some(shared) = weak.upgrade() {
                    shared.apply_event(event);
                }
            });

            Shared {
                id: subscription.id(),
                target_path,
                options,
                engine,
                inner: Mutex::new(Inner::default()),
                state_tx,
                events_tx,
                subscription: Mutex::new(Some(subscription)),
            }
        });

        info!(
            "Created recorder {} for {} (engine: {})",
            shared.id,
            shared.target_path.display(),
            shared.engine.name()
        );

        Self { shared }
    }

    /// Ask the engine to get ready for recording
    ///
    /// Legal from `Idle`, or from `Error` after a reset. Resolves with the path
    /// the engine will write to.
    pub async fn prepare(&self) -> Result<PathBuf, RecorderError> {
        {
            let mut inner = self.shared.lock();
            self.shared.ensure_live(&inner)?;
            let current = inner.state;
            match current {
                RecorderState::Idle => {}
                RecorderState::Error => self.shared.reset(&mut inner),
                state => {
                    return Err(RecorderError::InvalidState {
                        command: Command::Prepare,
                        state,
                    })
                }
            }
            self.shared.set_state(&mut inner, RecorderState::Preparing);
        }

        self.shared.run_prepare().await
    }

    /// Start recording, preparing first if the session is still `Idle`
    ///
    /// From `Paused` this resumes capture. The engine record command is only
    /// issued once the prepare step has succeeded.
    pub async fn record(&self) -> Result<(), RecorderError> {
        let needs_prepare = {
            let mut inner = self.shared.lock();
            self.shared.ensure_live(&inner)?;
            let current = inner.state;
            match current {
                RecorderState::Idle => {
                    self.shared.set_state(&mut inner, RecorderState::Preparing);
                    true
                }
                RecorderState::Prepared | RecorderState::Paused => false,
                state => {
                    return Err(RecorderError::InvalidState {
                        command: Command::Record,
                        state,
                    })
                }
            }
        };

        if needs_prepare {
            self.shared.run_prepare().await?;
        }

        let outcome = self.shared.engine.record(self.shared.id).await;
        self.shared
            .complete(Command::Record, outcome, RecorderState::Recording)
    }

    /// Suspend capture; a no-op unless recording or paused
    pub async fn pause(&self) -> Result<(), RecorderError> {
        if !self.shared.capturing(Command::Pause)? {
            return Ok(());
        }

        let outcome = self.shared.engine.pause(self.shared.id).await;
        self.shared
            .complete(Command::Pause, outcome, RecorderState::Paused)
    }

    /// Finish capture; a no-op unless recording or paused
    ///
    /// A stopped session is finished: it only accepts `destroy` afterwards
    /// (`pause` and `stop` stay no-ops).
    pub async fn stop(&self) -> Result<(), RecorderError> {
        if !self.shared.capturing(Command::Stop)? {
            return Ok(());
        }

        let outcome = self.shared.engine.stop(self.shared.id).await;
        self.shared
            .complete(Command::Stop, outcome, RecorderState::Destroyed)
    }

    /// Stop if recording, otherwise record
    ///
    /// Resolves with whether the session was recording before the call.
    pub async fn toggle_record(&self) -> Result<bool, RecorderError> {
        if self.state().is_recording() {
            self.stop().await?;
            Ok(true)
        } else {
            self.record().await?;
            Ok(false)
        }
    }

    /// Reset the session, retire its identity and release the engine side
    ///
    /// Callable while another command is in flight; that command's outcome
    /// no longer touches the session. Every later command fails with
    /// [`RecorderError::AlreadyDestroyed`].
    pub async fn destroy(&self) -> Result<SessionId, RecorderError> {
        let id = self.shared.id;
        {
            let mut inner = self.shared.lock();
            self.shared.ensure_live(&inner)?;
            self.shared.reset(&mut inner);
            inner.retired = true;
        }

        // Late events for a retired identity are no longer routed here
        drop(
            self.shared
                .subscription
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        match self.shared.engine.destroy(id).await {
            Ok(()) => {
                info!("Recorder {} destroyed", id);
                Ok(id)
            }
            Err(e) => {
                error!("Engine failed to destroy {}: {}", id, e);
                Err(RecorderError::engine(Command::Destroy, e))
            }
        }
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn target_path(&self) -> &Path {
        &self.shared.target_path
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.shared.options
    }

    pub fn state(&self) -> RecorderState {
        self.shared.lock().state
    }

    pub fn can_record(&self) -> bool {
        self.state().can_record()
    }

    pub fn can_prepare(&self) -> bool {
        self.state().can_prepare()
    }

    pub fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    pub fn is_prepared(&self) -> bool {
        self.state().is_prepared()
    }

    /// Whether `destroy` has been called
    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().retired
    }

    /// Output location reported by the engine's last successful prepare
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.shared.lock().resolved_path.clone()
    }

    /// Last position reported through `info` events
    pub fn position(&self) -> Option<Duration> {
        self.shared.lock().position
    }

    /// Last duration reported through `info` events
    pub fn duration(&self) -> Option<Duration> {
        self.shared.lock().duration
    }

    /// Receive every engine event after its state effects are applied
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Observe state transitions
    pub fn watch_state(&self) -> watch::Receiver<RecorderState> {
        self.shared.state_tx.subscribe()
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Recorder")
            .field("id", &self.shared.id)
            .field("target_path", &self.shared.target_path)
            .field("state", &inner.state)
            .field("resolved_path", &inner.resolved_path)
            .field("destroyed", &inner.retired)
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_live(&self, inner: &Inner) -> Result<(), RecorderError> {
        if inner.retired {
            Err(RecorderError::AlreadyDestroyed(self.id))
        } else {
            Ok(())
        }
    }

    fn set_state(&self, inner: &mut Inner, state: RecorderState) {
        if inner.state != state {
            debug!("{}: {} -> {}", self.id, inner.state, state);
        }
        inner.state = state;
        self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    fn reset(&self, inner: &mut Inner) {
        self.set_state(inner, RecorderState::Idle);
        inner.resolved_path = None;
        inner.position = None;
        inner.duration = None;
    }

    /// Whether `command` has to reach the engine (recording or paused)
    fn capturing(&self, command: Command) -> Result<bool, RecorderError> {
        let inner = self.lock();
        self.ensure_live(&inner)?;
        if inner.state.is_capturing() {
            Ok(true)
        } else {
            debug!("{}: {} while {} is a no-op", self.id, command, inner.state);
            Ok(false)
        }
    }

    /// Issue the engine prepare; the caller has already moved to `Preparing`
    async fn run_prepare(&self) -> Result<PathBuf, RecorderError> {
        let outcome = self
            .engine
            .prepare(self.id, &self.target_path, &self.options)
            .await;

        let mut inner = self.lock();
        self.ensure_settled(&inner, Command::Prepare)?;
        match outcome {
            Ok(path) => {
                info!("Recorder {} prepared at {}", self.id, path.display());
                inner.resolved_path = Some(path.clone());
                self.set_state(&mut inner, RecorderState::Prepared);
                Ok(path)
            }
            Err(e) => {
                error!("Recorder {} failed to prepare: {}", self.id, e);
                inner.resolved_path = None;
                self.set_state(&mut inner, RecorderState::Error);
                Err(RecorderError::engine(Command::Prepare, e))
            }
        }
    }

    /// Apply the outcome of an engine command
    fn complete(
        &self,
        command: Command,
        outcome: Result<(), EngineError>,
        next: RecorderState,
    ) -> Result<(), RecorderError> {
        let mut inner = self.lock();
        self.ensure_settled(&inner, command)?;
        match outcome {
            Ok(()) => {
                info!("Recorder {}: {} succeeded", self.id, command);
                self.set_state(&mut inner, next);
                Ok(())
            }
            Err(e) => {
                error!("Recorder {}: {} failed: {}", self.id, command, e);
                self.set_state(&mut inner, RecorderState::Error);
                Err(RecorderError::engine(command, e))
            }
        }
    }

    /// Outcomes arriving after `destroy` are swallowed
    fn ensure_settled(&self, inner: &Inner, command: Command) -> Result<(), RecorderError> {
        if inner.retired {
            debug!("{}: ignoring {} outcome after destroy", self.id, command);
            return Err(RecorderError::AlreadyDestroyed(self.id));
        }
        Ok(())
    }

    fn apply_event(&self, event: EngineEvent) {
        let mut inner = self.lock();
        if inner.retired {
            debug!("{}: ignoring late '{}' event", self.id, event.name);
            return;
        }

        match event.kind() {
            EventKind::Ended => {
                let clamped = inner.state.clamp_ended();
                if clamped != inner.state {
                    info!("Recorder {} ended by engine", self.id);
                }
                self.set_state(&mut inner, clamped);
            }
            EventKind::Info => {
                if let Some(position) = millis_field(&event.data, "position") {
                    inner.position = Some(position);
                }
                if let Some(duration) = millis_field(&event.data, "duration") {
                    inner.duration = Some(duration);
                }
            }
            EventKind::Error => {
                // Only raw event subscribers see this; it does not fail a command
                warn!("Engine reported error for {}: {}", self.id, event.data);
                self.reset(&mut inner);
            }
            EventKind::Other => {}
        }

        // No receivers is fine
        let _ = self.events_tx.send(RecorderEvent {
            session_id: self.id,
            name: event.name,
            data: event.data,
            received_at: Utc::now(),
        });
    }
}

fn millis_field(data: &serde_json::Value, key: &str) -> Option<Duration> {
    let millis = data.get(key)?.as_f64()?;
    Duration::try_from_secs_f64(millis / 1000.0).ok()
}
