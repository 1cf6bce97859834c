// src/exporters/ring_buffer_exporter.rs
//! Exporter that appends events to a shared ring buffer
//!
//! The store lives at `<telemetry_dir>/<agent_name>` so that readers can
//! find it from the same two settings.

use crate::exporters::exporter::{ExporterInitParams, TelemetryExporter};
use crate::recording::event::Event;
use crate::recording::reader::store_path;
use crate::recording::ring_buffer::{RingBuffer, RING_FORMAT_VERSION};
use crate::utils::errors::{Result, TelemetryError};
use std::path::Path;
use tracing::info;

/// Ring buffer backed exporter
pub struct RingBufferExporter {
    agent_name: String,
    buffer_size: usize,
    buffer: RingBuffer,
}

impl RingBufferExporter {
    /// Validate configuration and create the backing store
    ///
    /// Configuration problems are reported before anything is written to
    /// disk.
    pub fn new(params: &ExporterInitParams) -> Result<Self> {
        if params.agent_name.is_empty() {
            return Err(TelemetryError::config("Agent name cannot be empty"));
        }

        if params.agent_name.contains(['/', '\\'])
            || params.agent_name == "."
            || params.agent_name == ".."
        {
            return Err(TelemetryError::config(format!(
                "Agent name '{}' cannot be used as a file name",
                params.agent_name
            )));
        }

        let dir = match params.telemetry_dir.as_deref() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => return Err(TelemetryError::config("Telemetry directory cannot be empty")),
        };

        if !dir.is_dir() {
            return Err(TelemetryError::config(format!(
                "Telemetry directory {:?} does not exist or is not a directory",
                dir
            )));
        }

        if params.max_events_buffered == 0 {
            return Err(TelemetryError::config("Telemetry buffer size must be at least 1"));
        }

        let output_path = store_path(dir, &params.agent_name);
        let buffer = RingBuffer::create(&output_path, params.max_events_buffered, RING_FORMAT_VERSION)?;

        info!(
            "Telemetry enabled, using buffer path: {:?} with size: {}",
            output_path, params.max_events_buffered
        );

        Ok(Self {
            agent_name: params.agent_name.clone(),
            buffer_size: params.max_events_buffered,
            buffer,
        })
    }

    /// Path of the backing store
    pub fn path(&self) -> &Path {
        self.buffer.path()
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.buffer
    }
}

impl TelemetryExporter for RingBufferExporter {
    fn export_event(&self, event: &Event) -> Result<()> {
        if !self.buffer.push(event) {
            return Err(TelemetryError::export(format!(
                "ring buffer {:?} rejected event '{}'",
                self.buffer.path(),
                event.name()
            )));
        }

        Ok(())
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn agent_name(&self) -> &str {
        &self.agent_name
    }
}
