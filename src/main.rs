use anyhow::{Context, Result};
use audio_recorder::{Config, EventBus, RecorderFactory, SimulatedEngine};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Drive one recording session against the simulated engine
#[derive(Debug, Parser)]
#[command(name = "audio-recorder", version)]
struct Args {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/audio-recorder")]
    config: String,

    /// Recording target, relative to engine.output_dir unless absolute
    #[arg(long, default_value = "take-1.wav")]
    path: String,

    /// How long to record before stopping
    #[arg(long, default_value_t = 1500)]
    record_ms: u64,

    /// Pause this long halfway through, then resume
    #[arg(long)]
    pause_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.service.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Output directory: {}", cfg.engine.output_dir().display());

    let bus = EventBus::new();
    let engine = Arc::new(SimulatedEngine::new(cfg.engine.simulated(), bus.clone()));
    let factory = RecorderFactory::new(engine, bus);

    let recorder = factory.create(&args.path, cfg.recorder.clone());

    // Log every engine event the session sees
    let mut events = recorder.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("[{}] {} {}", event.session_id, event.name, event.data),
                Err(RecvError::Lagged(skipped)) => warn!("Event listener lagged by {}", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let half = Duration::from_millis(args.record_ms / 2);

    let was_recording = recorder.toggle_record().await.context("Failed to start recording")?;
    info!(
        "Recording {} (was recording: {})",
        recorder
            .resolved_path()
            .map(|path| path.display().to_string())
            .unwrap_or_default(),
        was_recording
    );

    if let Some(pause_ms) = args.pause_ms {
        tokio::time::sleep(half).await;
        recorder.pause().await.context("Failed to pause")?;
        info!("Paused for {}ms", pause_ms);
        tokio::time::sleep(Duration::from_millis(pause_ms)).await;
        recorder.record().await.context("Failed to resume")?;
        tokio::time::sleep(half).await;
    } else {
        tokio::time::sleep(Duration::from_millis(args.record_ms)).await;
    }

    // The engine may already have ended the recording on its own
    info!("State before stop: {}", recorder.state());
    if recorder.is_recording() {
        recorder.toggle_record().await.context("Failed to stop recording")?;
    } else {
        recorder.stop().await.context("Failed to stop recording")?;
    }
    if let Some(position) = recorder.position() {
        info!("Last reported position: {:?}", position);
    }

    let id = recorder.destroy().await.context("Failed to destroy recorder")?;
    info!("Session {} finished", id);

    drop(recorder);
    listener.await.context("Event listener panicked")?;

    Ok(())
}
