// Tests for loading configuration files

use anyhow::Result;
use audio_recorder::{Config, Quality, RecorderOptions};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> Result<String> {
    let path = dir.path().join("recorder.toml");
    fs::write(&path, contents)?;
    Ok(path.to_string_lossy().into_owned())
}

#[test]
fn test_partial_recorder_section_merges_over_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        r#"
[service]
name = "studio"

[recorder]
channels = 1
quality = "high"
metering_interval_ms = 100

[engine]
output_dir = "/var/recordings"
max_duration_ms = 5000
"#,
    )?;

    let cfg = Config::load(&path)?;

    assert_eq!(cfg.service.name, "studio");
    assert_eq!(cfg.service.log_level, "info");

    assert_eq!(cfg.recorder.channels, 1);
    assert_eq!(cfg.recorder.quality, Quality::High);
    assert_eq!(cfg.recorder.metering_interval, Duration::from_millis(100));
    assert_eq!(cfg.recorder.sample_rate, 44_100);
    assert_eq!(cfg.recorder.bitrate, 1_280_000);
    assert!(cfg.recorder.auto_destroy);

    let engine = cfg.engine.simulated();
    assert_eq!(engine.output_dir, PathBuf::from("/var/recordings"));
    assert_eq!(engine.max_duration_ms, Some(5000));

    Ok(())
}

#[test]
fn test_missing_file_uses_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("does-not-exist");

    let cfg = Config::load(&path.to_string_lossy())?;

    assert_eq!(cfg.service.name, "audio-recorder");
    assert_eq!(cfg.recorder, RecorderOptions::default());
    assert_eq!(cfg.engine.max_duration_ms, None);

    Ok(())
}

#[test]
fn test_invalid_quality_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(&dir, "[recorder]\nquality = \"lossless\"\n")?;

    assert!(Config::load(&path).is_err());

    Ok(())
}

#[test]
fn test_output_dir_expands_home() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(&dir, "[engine]\noutput_dir = \"~/Recordings\"\n")?;

    let cfg = Config::load(&path)?;
    let output_dir = cfg.engine.output_dir();

    if std::env::var_os("HOME").is_none() {
        return Ok(());
    }
    assert!(!output_dir.starts_with("~"));
    assert!(output_dir.ends_with("Recordings"));

    Ok(())
}
