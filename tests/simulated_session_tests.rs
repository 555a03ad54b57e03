// End-to-end tests: recorder sessions against the simulated engine
//
// The clock is paused so metering ticks and duration limits fire
// deterministically.

use audio_recorder::{
    EventBus, RecorderFactory, RecorderOptions, RecorderState, SimulatedEngine,
    SimulatedEngineConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn setup(max_duration_ms: Option<u64>) -> (Arc<SimulatedEngine>, RecorderFactory) {
    let bus = EventBus::new();
    let config = SimulatedEngineConfig {
        output_dir: PathBuf::from("/recordings"),
        max_duration_ms,
    };
    let engine = Arc::new(SimulatedEngine::new(config, bus.clone()));
    let factory = RecorderFactory::new(engine.clone(), bus);
    (engine, factory)
}

fn metered(interval_ms: u64) -> RecorderOptions {
    RecorderOptions {
        metering_interval: Duration::from_millis(interval_ms),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_session_lifecycle() {
    let (engine, factory) = setup(None);
    let recorder = factory.create("standup.wav", metered(0));

    recorder.record().await.unwrap();
    assert_eq!(
        recorder.resolved_path(),
        Some(PathBuf::from("/recordings/standup.wav"))
    );
    assert!(engine.is_recording(recorder.id()).await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    recorder.pause().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    recorder.record().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        engine.recorded(recorder.id()).await,
        Some(Duration::from_millis(500))
    );

    recorder.stop().await.unwrap();
    assert_eq!(recorder.state(), RecorderState::Destroyed);
    // auto_destroy defaults to true
    assert!(!engine.is_prepared(recorder.id()).await);

    let id = recorder.destroy().await.unwrap();
    assert_eq!(id, recorder.id());
}

#[tokio::test(start_paused = true)]
async fn test_metering_updates_position() {
    let (_engine, factory) = setup(None);
    let recorder = factory.create("a.wav", metered(100));
    let mut events = recorder.subscribe();

    recorder.record().await.unwrap();

    for _ in 0..3 {
        let event = events.recv().await.unwrap();
        assert_eq!(event.name, "info");
        assert!(event.data["metering"].is_number());
    }
    assert_eq!(recorder.position(), Some(Duration::from_millis(300)));
    assert_eq!(recorder.state(), RecorderState::Recording);

    recorder.destroy().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_duration_limit_ends_recording() {
    let (engine, factory) = setup(Some(250));
    let recorder = factory.create("a.wav", metered(0));
    let mut state = recorder.watch_state();

    recorder.record().await.unwrap();
    assert_eq!(*state.borrow_and_update(), RecorderState::Recording);

    state.changed().await.unwrap();
    assert_eq!(*state.borrow(), RecorderState::Prepared);
    assert_eq!(recorder.position(), None);
    assert!(!engine.is_recording(recorder.id()).await);

    // Stopping after the engine ended on its own is a no-op
    recorder.stop().await.unwrap();
    assert_eq!(recorder.state(), RecorderState::Prepared);
}

#[tokio::test]
async fn test_invalid_target_fails_prepare() {
    let (_engine, factory) = setup(None);
    let recorder = factory.create("", metered(0));

    let err = recorder.record().await.unwrap_err();

    assert_eq!(err.engine_error().map(|e| e.code.as_str()), Some("invalidpath"));
    assert_eq!(recorder.state(), RecorderState::Error);
}
