// src/exporters/exporter.rs
//! Exporter capability shared by every telemetry backend

use crate::recording::event::Event;
use crate::utils::config::{DEFAULT_BUFFER_SIZE, DEFAULT_METRICS_PORT};
use crate::utils::errors::Result;
use std::path::PathBuf;

/// Parameters every exporter is constructed from
#[derive(Debug, Clone)]
pub struct ExporterInitParams {
    /// Agent identity; namespaces the backing resource and tags exported data
    pub agent_name: String,

    /// Ring capacity, or the backend's equivalent target size
    pub max_events_buffered: usize,

    /// Base directory for file-backed stores
    pub telemetry_dir: Option<PathBuf>,

    /// Metrics endpoint port for network sinks
    pub metrics_port: u16,

    /// Bind network sinks to loopback only
    pub metrics_local: bool,
}

impl ExporterInitParams {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            max_events_buffered: DEFAULT_BUFFER_SIZE,
            telemetry_dir: None,
            metrics_port: DEFAULT_METRICS_PORT,
            metrics_local: false,
        }
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.max_events_buffered = size;
        self
    }

    pub fn with_telemetry_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.telemetry_dir = Some(dir.into());
        self
    }

    pub fn with_metrics_endpoint(mut self, port: u16, local: bool) -> Self {
        self.metrics_port = port;
        self.metrics_local = local;
        self
    }
}

/// A telemetry backend
///
/// `export_event` is called from instrumented hot paths on many threads at
/// once. It must not block on other processes, and must report ordinary
/// backend trouble as an `Err` value rather than panicking.
pub trait TelemetryExporter: Send + Sync {
    /// Forward one event to the backend
    fn export_event(&self, event: &Event) -> Result<()>;

    /// Configured capacity or target size
    fn buffer_size(&self) -> usize;

    /// Agent identity this exporter was built for
    fn agent_name(&self) -> &str;
}
