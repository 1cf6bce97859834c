// src/recording/mod.rs
//! Event capture and shared storage
//!
//! - **Event**: fixed-size telemetry record
//! - **Ring Buffer**: file-backed circular store shared with other processes
//! - **Recorder**: producer-side handle used by instrumented code
//! - **Reader**: consumer-side cursor over an attached ring buffer
//!
//! # Architecture
//!
//! ```text
//! Agent threads → record() → export_event() → RingBuffer::push
//!                                                   │  fetch_add(cursor)
//!                                                   ▼
//!                                      <telemetry_dir>/<agent_name>
//!                                                   ▲
//!                              TelemetryReader::poll │ (other process)
//! ```
//!
//! # Guarantees
//!
//! - **push**: bounded time, never waits on readers
//! - **Overflow**: oldest event overwritten, reported to readers as a gap
//! - **Torn reads**: detected via per-slot sequence numbers and skipped

pub mod event;
pub mod reader;
pub mod recorder;
pub mod ring_buffer;

// Re-export commonly used types
pub use event::{Event, EventCategory, EVENT_NAME_CAPACITY, EVENT_SIZE};
pub use reader::TelemetryReader;
pub use recorder::{RecorderStats, TelemetryRecorder};
pub use ring_buffer::{RingBuffer, SequencedEvent, Snapshot, RING_FORMAT_VERSION};
