use super::backend::{EngineError, RecordingEngine};
use crate::events::{EngineEvent, EventBus};
use crate::session::{RecorderOptions, SessionId};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Configuration for the simulated engine
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimulatedEngineConfig {
    /// Directory that relative target paths are resolved against
    pub output_dir: PathBuf,

    /// Recordings end on their own once this much audio is captured
    pub max_duration_ms: Option<u64>,
}

impl SimulatedEngineConfig {
    fn max_duration(&self) -> Option<Duration> {
        self.max_duration_ms.map(Duration::from_millis)
    }
}

/// Engine-side bookkeeping for one prepared session
struct Slot {
    path: PathBuf,
    options: RecorderOptions,
    /// Audio captured before the current run
    recorded: Duration,
    started_at: Option<Instant>,
    ticker: Option<JoinHandle<()>>,
}

impl Slot {
    fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Stop the current run, keeping what it captured
    fn halt(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(started_at) = self.started_at.take() {
            self.recorded += started_at.elapsed();
        }
    }
}

type Slots = Arc<Mutex<HashMap<SessionId, Slot>>>;

/// In-process recording engine without device access
///
/// Tracks one slot per prepared session and publishes the events a real
/// engine would: `info` metering every `metering_interval` while recording,
/// and `ended` once `max_duration_ms` of audio has been captured.
pub struct SimulatedEngine {
    config: SimulatedEngineConfig,
    bus: EventBus,
    slots: Slots,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedEngineConfig, bus: EventBus) -> Self {
        info!(
            "Simulated engine initialized (output: {}, limit: {:?})",
            config.output_dir.display(),
            config.max_duration()
        );

        Self {
            config,
            bus,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `id` currently holds engine resources
    pub async fn is_prepared(&self, id: SessionId) -> bool {
        self.slots.lock().await.contains_key(&id)
    }

    pub async fn is_recording(&self, id: SessionId) -> bool {
        self.slots
            .lock()
            .await
            .get(&id)
            .is_some_and(Slot::is_running)
    }

    /// Audio captured so far for `id`
    pub async fn recorded(&self, id: SessionId) -> Option<Duration> {
        self.slots.lock().await.get(&id).map(|slot| {
            slot.recorded + slot.started_at.map_or(Duration::ZERO, |started| started.elapsed())
        })
    }

    fn resolve(&self, target_path: &Path) -> Result<PathBuf, EngineError> {
        if target_path.as_os_str().is_empty() {
            return Err(EngineError::new("invalidpath", "target path is empty"));
        }

        if target_path.is_absolute() {
            Ok(target_path.to_path_buf())
        } else {
            Ok(self.config.output_dir.join(target_path))
        }
    }
}

#[async_trait::async_trait]
impl RecordingEngine for SimulatedEngine {
    async fn prepare(
        &self,
        id: SessionId,
        target_path: &Path,
        options: &RecorderOptions,
    ) -> Result<PathBuf, EngineError> {
        let path = self.resolve(target_path)?;

        let slot = Slot {
            path: path.clone(),
            options: options.clone(),
            recorded: Duration::ZERO,
            started_at: None,
            ticker: None,
        };

        if let Some(mut previous) = self.slots.lock().await.insert(id, slot) {
            previous.halt();
        }

        debug!(
            "Prepared {} at {} ({} Hz, {} ch, {} bps, {} quality)",
            id,
            path.display(),
            options.sample_rate,
            options.channels,
            options.bitrate,
            options.quality
        );

        Ok(path)
    }

    async fn record(&self, id: SessionId) -> Result<(), EngineError> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .get_mut(&id)
            .ok_or_else(|| EngineError::new("notprepared", format!("{} is not prepared", id)))?;

        if slot.is_running() {
            return Ok(());
        }

        let metering = Some(slot.options.metering_interval).filter(|interval| !interval.is_zero());
        let ticker = Ticker {
            id,
            slots: Arc::clone(&self.slots),
            bus: self.bus.clone(),
            base: slot.recorded,
            metering,
            max_duration: self.config.max_duration(),
        };

        slot.started_at = Some(Instant::now());
        slot.ticker = Some(tokio::spawn(ticker.run()));

        debug!("Recording {} into {}", id, slot.path.display());
        Ok(())
    }

    async fn pause(&self, id: SessionId) -> Result<(), EngineError> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .get_mut(&id)
            .ok_or_else(|| EngineError::new("notprepared", format!("{} is not prepared", id)))?;

        slot.halt();
        debug!("Paused {} after {:?}", id, slot.recorded);
        Ok(())
    }

    async fn stop(&self, id: SessionId) -> Result<(), EngineError> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .get_mut(&id)
            .ok_or_else(|| EngineError::new("notprepared", format!("{} is not prepared", id)))?;

        slot.halt();
        info!(
            "Stopped {}: {:?} captured into {}",
            id,
            slot.recorded,
            slot.path.display()
        );

        if slot.options.auto_destroy {
            slots.remove(&id);
            debug!("Released {} after stop", id);
        }
        Ok(())
    }

    async fn destroy(&self, id: SessionId) -> Result<(), EngineError> {
        if let Some(mut slot) = self.slots.lock().await.remove(&id) {
            slot.halt();
            debug!("Released {}", id);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.slots.try_lock() {
            for slot in slots.values_mut() {
                slot.halt();
            }
        }
    }
}

/// Background task publishing events for one recording run
struct Ticker {
    id: SessionId,
    slots: Slots,
    bus: EventBus,
    base: Duration,
    metering: Option<Duration>,
    max_duration: Option<Duration>,
}

impl Ticker {
    async fn run(self) {
        let started = Instant::now();

        loop {
            let position = self.base + started.elapsed();
            let remaining = self.max_duration.map(|max| max.saturating_sub(position));

            if remaining == Some(Duration::ZERO) {
                self.finish(position).await;
                return;
            }

            let wait = match (self.metering, remaining) {
                (Some(interval), Some(remaining)) => interval.min(remaining),
                (Some(interval), None) => interval,
                (None, Some(remaining)) => remaining,
                (None, None) => return,
            };
            tokio::time::sleep(wait).await;

            let position = self.base + started.elapsed();
            let below_limit = self.max_duration.map_or(true, |max| position < max);
            if self.metering.is_some() && below_limit {
                let delivered = self.bus.publish(
                    self.id,
                    EngineEvent::info(json!({
                        "metering": metering_level(position),
                        "position": millis(position),
                    })),
                );
                // Nobody is listening any more, e.g. the recorder was dropped without destroy
                if !delivered {
                    debug!("No subscriber for {}, halting capture", self.id);
                    self.settle(position).await;
                    return;
                }
            }
        }
    }

    async fn finish(&self, position: Duration) {
        self.settle(position).await;

        info!("{} reached its duration limit after {:?}", self.id, position);
        self.bus.publish(
            self.id,
            EngineEvent::new("ended", json!({ "position": millis(position) })),
        );
    }

    /// Record the captured time and mark the slot as no longer recording
    async fn settle(&self, position: Duration) {
        if let Some(slot) = self.slots.lock().await.get_mut(&self.id) {
            slot.recorded = position;
            slot.started_at = None;
            // Dropping our own handle detaches it; this task returns right after
            slot.ticker = None;
        }
    }
}

fn millis(value: Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}

/// Synthetic level in dBFS, between -30 and -10
fn metering_level(position: Duration) -> f64 {
    let level = -30.0 + 20.0 * (position.as_secs_f64() * 2.0).sin().abs();
    (level * 10.0).round() / 10.0
}
