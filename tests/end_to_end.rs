// tests/end_to_end.rs
//! Producer to reader through the shared store, as two agents' worth of
//! handles would see it.

use std::sync::Arc;
use std::thread;
use tempfile::tempdir;
use transfer_telemetry::recording::RING_FORMAT_VERSION;
use transfer_telemetry::{
    Event, EventCategory, ExporterInitParams, ExporterRegistry, TelemetryConfig, TelemetryError,
    TelemetryExporter, TelemetryReader, TelemetryRecorder,
};

#[test]
fn registry_exporter_feeds_reader() {
    let dir = tempdir().unwrap();
    let params = ExporterInitParams::new("agent-e2e")
        .with_buffer_size(64)
        .with_telemetry_dir(dir.path());

    let exporter = ExporterRegistry::global()
        .create_exporter("BUFFER", &params)
        .unwrap();
    assert_eq!(exporter.agent_name(), "agent-e2e");

    let mut reader = TelemetryReader::open(dir.path(), "agent-e2e").unwrap();
    assert!(reader.poll().is_empty());

    for i in 0..10 {
        exporter
            .export_event(&Event::new(EventCategory::Transfer, "tx_bytes", i * 100))
            .unwrap();
    }

    let snapshot = reader.poll();
    assert_eq!(snapshot.len(), 10);
    assert!(!snapshot.has_gap());
    let values: Vec<u64> = snapshot.events.iter().map(|e| e.event.value()).collect();
    assert_eq!(values, (0..10).map(|i| i * 100).collect::<Vec<_>>());

    // Nothing new since the last poll
    assert!(reader.poll().is_empty());
    assert_eq!(reader.total_read(), 10);
}

#[test]
fn recorder_from_env_config() {
    let dir = tempdir().unwrap();
    let dir_str = dir.path().to_string_lossy().into_owned();
    let config = TelemetryConfig::from_env_map([
        ("TRANSFER_TELEMETRY_ENABLED", "true"),
        ("TRANSFER_TELEMETRY_DIR", dir_str.as_str()),
        ("TRANSFER_TELEMETRY_BUFFER_SIZE", "4"),
    ])
    .unwrap();

    let recorder = TelemetryRecorder::from_config(&config, "agent-env").unwrap();
    let mut reader = TelemetryReader::open(dir.path(), "agent-env").unwrap();

    for i in 0..6 {
        assert!(recorder.record_backend("posted_xfers", i));
    }

    // Capacity 4: the first two were overwritten before the reader looked.
    let snapshot = reader.poll();
    assert_eq!(snapshot.dropped, 2);
    assert!(snapshot.has_gap());
    let values: Vec<u64> = snapshot.events.iter().map(|e| e.event.value()).collect();
    assert_eq!(values, vec![2, 3, 4, 5]);
    assert_eq!(reader.total_dropped(), 2);
}

#[test]
fn unset_directory_is_configuration_error() {
    let config = TelemetryConfig {
        enabled: true,
        ..Default::default()
    };

    let result = TelemetryRecorder::from_config(&config, "agent-nodir");
    assert!(matches!(result, Err(TelemetryError::Configuration(_))));
    assert!(!std::path::Path::new("agent-nodir").exists());
}

#[test]
fn concurrent_producers_single_reader() {
    let dir = tempdir().unwrap();
    let params = ExporterInitParams::new("agent-mt")
        .with_buffer_size(4096)
        .with_telemetry_dir(dir.path());
    let exporter: Arc<dyn TelemetryExporter> = ExporterRegistry::global()
        .create_exporter("buffer", &params)
        .unwrap()
        .into();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let exporter = Arc::clone(&exporter);
            thread::spawn(move || {
                for i in 0..250u64 {
                    exporter
                        .export_event(&Event::new(EventCategory::Performance, "post_latency_us", t * 1000 + i))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut reader = TelemetryReader::open(dir.path(), "agent-mt").unwrap();
    let snapshot = reader.poll();
    assert_eq!(snapshot.len(), 1000);
    assert_eq!(snapshot.dropped, 0);

    let sequences: Vec<u64> = snapshot.events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=1000).collect::<Vec<_>>());
}

#[test]
fn version_mismatch_rejected_by_reader() {
    let dir = tempdir().unwrap();
    let params = ExporterInitParams::new("agent-v")
        .with_buffer_size(8)
        .with_telemetry_dir(dir.path());
    let _exporter = ExporterRegistry::global()
        .create_exporter("buffer", &params)
        .unwrap();

    let result = TelemetryReader::attach_with_version(dir.path().join("agent-v"), RING_FORMAT_VERSION + 1);
    assert!(matches!(
        result,
        Err(TelemetryError::VersionMismatch { expected, found })
            if expected == RING_FORMAT_VERSION + 1 && found == RING_FORMAT_VERSION
    ));
}

#[test]
fn store_removed_when_exporter_dropped() {
    let dir = tempdir().unwrap();
    let params = ExporterInitParams::new("agent-drop")
        .with_buffer_size(8)
        .with_telemetry_dir(dir.path());

    let exporter = ExporterRegistry::global()
        .create_exporter("buffer", &params)
        .unwrap();
    let reader = TelemetryReader::open(dir.path(), "agent-drop").unwrap();
    assert!(reader.is_live());

    drop(exporter);
    assert!(!dir.path().join("agent-drop").exists());
    assert!(!reader.is_live());
}
