// src/main.rs
//! Telemetry Reader
//!
//! Attaches to an agent's telemetry ring buffer and prints every event as a
//! JSON line on stdout until the writer goes away or Ctrl-C is pressed.
//!
//! ```text
//! telemetry-reader <agent-name>      # resolved under TRANSFER_TELEMETRY_DIR
//! telemetry-reader /path/to/store
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use transfer_telemetry::observability::init_tracing;
use transfer_telemetry::recording::{SequencedEvent, Snapshot, TelemetryReader};
use transfer_telemetry::TelemetryConfig;

#[derive(Serialize)]
struct EventLine<'a> {
    sequence: u64,
    time: String,
    timestamp_us: u64,
    category: &'a str,
    name: &'a str,
    value: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(false)?;

    info!("Starting telemetry reader v{}", env!("CARGO_PKG_VERSION"));

    let config = TelemetryConfig::load()?;
    let target = std::env::args().nth(1);
    let path = resolve_store_path(&config, target.as_deref())?;

    let mut reader = TelemetryReader::attach(&path)
        .with_context(|| format!("Failed to attach to telemetry store {:?}", path))?;

    info!(
        "Attached to {:?} (capacity: {}, cursor: {})",
        path,
        reader.ring().capacity(),
        reader.ring().cursor()
    );

    let mut interval = tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                print_snapshot(&reader.poll())?;

                if !reader.is_live() {
                    // Writer exited; pick up anything published before the unlink.
                    print_snapshot(&reader.poll())?;
                    warn!("Telemetry store {:?} was removed, writer has exited", path);
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal, stopping reader");
                break;
            }
        }
    }

    info!(
        "Reader stopped: {} events read, {} dropped",
        reader.total_read(),
        reader.total_dropped()
    );

    Ok(())
}

fn resolve_store_path(config: &TelemetryConfig, target: Option<&str>) -> Result<PathBuf> {
    let Some(target) = target else {
        bail!("usage: telemetry-reader <agent-name | store-path>");
    };

    let as_path = Path::new(target);
    if as_path.components().count() > 1 || as_path.is_file() {
        return Ok(as_path.to_path_buf());
    }

    match config.store_path(target) {
        Some(path) => Ok(path),
        None => bail!(
            "agent name '{}' given but TRANSFER_TELEMETRY_DIR is not set",
            target
        ),
    }
}

fn print_snapshot(snapshot: &Snapshot) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for event in &snapshot.events {
        writeln!(out, "{}", format_event(event)?)?;
    }
    out.flush()?;
    Ok(())
}

fn format_event(entry: &SequencedEvent) -> Result<String> {
    let event = &entry.event;
    let line = EventLine {
        sequence: entry.sequence,
        time: format_timestamp(event.timestamp_us()),
        timestamp_us: event.timestamp_us(),
        category: event.category().as_str(),
        name: event.name(),
        value: event.value(),
    };
    Ok(serde_json::to_string(&line)?)
}

fn format_timestamp(timestamp_us: u64) -> String {
    let secs = (timestamp_us / 1_000_000) as i64;
    let nsecs = ((timestamp_us % 1_000_000) * 1_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, nsecs)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use transfer_telemetry::{Event, EventCategory};

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(
            format_timestamp(1_500_000),
            "1970-01-01T00:00:01.500+00:00"
        );
    }

    #[test]
    fn test_format_event() {
        let entry = SequencedEvent {
            sequence: 3,
            event: Event::with_timestamp(0, EventCategory::Backend, "posted_xfers", 12),
        };

        let line = format_event(&entry).unwrap();
        assert!(line.contains(r#""sequence":3"#));
        assert!(line.contains(r#""category":"BACKEND""#));
        assert!(line.contains(r#""name":"posted_xfers""#));
    }

    #[test]
    fn test_resolve_agent_name() {
        let config = TelemetryConfig {
            dir: Some(PathBuf::from("/run/telemetry")),
            ..Default::default()
        };

        let path = resolve_store_path(&config, Some("agent-1")).unwrap();
        assert_eq!(path, PathBuf::from("/run/telemetry/agent-1"));
    }

    #[test]
    fn test_resolve_explicit_path() {
        let config = TelemetryConfig::default();
        let path = resolve_store_path(&config, Some("/tmp/store")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/store"));
    }

    #[test]
    fn test_resolve_requires_dir_for_agent_name() {
        let config = TelemetryConfig::default();
        assert!(resolve_store_path(&config, Some("agent-1")).is_err());
        assert!(resolve_store_path(&config, None).is_err());
    }
}
