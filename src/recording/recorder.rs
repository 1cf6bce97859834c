// src/recording/recorder.rs
//! Producer-side telemetry handle
//!
//! Wraps the configured exporter so instrumented code can record events
//! without handling errors. Failures are counted and logged with rate
//! limiting, never returned to the call site.

use crate::exporters::{ExporterRegistry, TelemetryExporter};
use crate::recording::event::{Event, EventCategory};
use crate::utils::config::TelemetryConfig;
use crate::utils::errors::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info};

/// Failures logged individually before switching to a single summary line
const MAX_LOGGED_FAILURES: u64 = 5;

/// Telemetry recorder
pub struct TelemetryRecorder {
    exporter: Option<Box<dyn TelemetryExporter>>,
    events_recorded: AtomicU64,
    events_failed: AtomicU64,
}

impl TelemetryRecorder {
    /// Build the recorder an agent uses for its lifetime
    ///
    /// Returns a disabled recorder when telemetry is off. Unknown backends
    /// and bad configuration are startup errors.
    pub fn from_config(config: &TelemetryConfig, agent_name: &str) -> Result<Self> {
        Self::from_registry(ExporterRegistry::global(), config, agent_name)
    }

    /// Same as [`TelemetryRecorder::from_config`] with an explicit registry
    pub fn from_registry(
        registry: &ExporterRegistry,
        config: &TelemetryConfig,
        agent_name: &str,
    ) -> Result<Self> {
        if !config.enabled {
            info!("Telemetry disabled for agent {}", agent_name);
            return Ok(Self::disabled());
        }

        let exporter = registry.create_exporter(&config.exporter, &config.init_params(agent_name))?;
        Ok(Self::with_exporter(exporter))
    }

    /// Recorder that forwards to an already-built exporter
    pub fn with_exporter(exporter: Box<dyn TelemetryExporter>) -> Self {
        Self {
            exporter: Some(exporter),
            events_recorded: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
        }
    }

    /// Recorder that drops everything
    pub fn disabled() -> Self {
        Self {
            exporter: None,
            events_recorded: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.exporter.is_some()
    }

    pub fn exporter(&self) -> Option<&dyn TelemetryExporter> {
        self.exporter.as_deref()
    }

    /// Record one event
    ///
    /// Returns whether the backend accepted it.
    pub fn record(&self, category: EventCategory, name: &str, value: u64) -> bool {
        match self.exporter {
            Some(_) => self.record_event(&Event::new(category, name, value)),
            None => false,
        }
    }

    /// Record a pre-built event
    pub fn record_event(&self, event: &Event) -> bool {
        let Some(exporter) = self.exporter.as_deref() else {
            return false;
        };

        match exporter.export_event(event) {
            Ok(()) => {
                self.events_recorded.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                let failures = self.events_failed.fetch_add(1, Ordering::Relaxed) + 1;
                if failures <= MAX_LOGGED_FAILURES {
                    error!("Failed to export telemetry event '{}': {}", event.name(), e);
                } else if failures == MAX_LOGGED_FAILURES + 1 {
                    error!("Telemetry export keeps failing, further failures will not be logged");
                }
                false
            }
        }
    }

    pub fn record_transfer_bytes(&self, name: &str, bytes: u64) -> bool {
        self.record(EventCategory::Transfer, name, bytes)
    }

    pub fn record_backend(&self, name: &str, value: u64) -> bool {
        self.record(EventCategory::Backend, name, value)
    }

    pub fn record_latency_us(&self, name: &str, micros: u64) -> bool {
        self.record(EventCategory::Performance, name, micros)
    }

    pub fn record_memory(&self, name: &str, bytes: u64) -> bool {
        self.record(EventCategory::Memory, name, bytes)
    }

    pub fn record_error(&self, name: &str) -> bool {
        self.record(EventCategory::Error, name, 1)
    }

    /// Get recorder statistics
    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            events_recorded: self.events_recorded.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
        }
    }
}

/// Recorder statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub events_recorded: u64,
    pub events_failed: u64,
}

impl RecorderStats {
    pub fn failure_rate(&self) -> f64 {
        let total = self.events_recorded + self.events_failed;
        if total == 0 {
            0.0
        } else {
            self.events_failed as f64 / total as f64
        }
    }
}
