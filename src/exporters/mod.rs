// src/exporters/mod.rs
//! Telemetry exporters
//!
//! Every backend implements [`TelemetryExporter`] and is selected by name
//! through the [`ExporterRegistry`]:
//!
//! - **buffer**: shared ring buffer drained by out-of-process readers
//! - **prometheus**: counters and gauges served on an HTTP scrape endpoint
//!
//! # Architecture
//!
//! ```text
//! Agent startup
//!     │
//!     └─ ExporterRegistry::create_exporter("buffer", params)
//!                          │
//!                          ▼
//!                Box<dyn TelemetryExporter>
//!                          │
//! call sites ── export_event() ──► RingBuffer::push ──► mmap store ◄── readers
//! ```

pub mod exporter;
pub mod prometheus;
pub mod registry;
pub mod ring_buffer_exporter;

// Re-export commonly used types
pub use exporter::{ExporterInitParams, TelemetryExporter};
pub use prometheus::PrometheusExporter;
pub use registry::{ExporterCreator, ExporterRegistry, BUFFER_BACKEND, PROMETHEUS_BACKEND};
pub use ring_buffer_exporter::RingBufferExporter;
