// src/lib.rs
//! Transfer Agent Telemetry Library
//!
//! Records timestamped events from any thread of a data-transfer agent and
//! makes them available to out-of-process observers without ever blocking
//! the producing thread.
//!
//! # Architecture
//!
//! - **recording**: Events, the shared ring buffer, producer and reader handles
//! - **exporters**: Exporter capability, built-in backends, backend registry
//! - **observability**: Process logging setup
//! - **utils**: Configuration, errors, timestamps
//!
//! # Example
//!
//! ```no_run
//! use transfer_telemetry::{TelemetryConfig, TelemetryRecorder};
//!
//! let config = TelemetryConfig::load()?;
//! let telemetry = TelemetryRecorder::from_config(&config, "agent-0")?;
//! telemetry.record_transfer_bytes("tx_bytes", 4096);
//! # Ok::<(), transfer_telemetry::TelemetryError>(())
//! ```

// Public module exports
pub mod exporters;
pub mod observability;
pub mod recording;
pub mod utils;

// Re-export commonly used types
pub use exporters::{ExporterInitParams, ExporterRegistry, TelemetryExporter};
pub use recording::{Event, EventCategory, RingBuffer, Snapshot, TelemetryReader, TelemetryRecorder};
pub use utils::config::TelemetryConfig;
pub use utils::errors::{Result, TelemetryError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
