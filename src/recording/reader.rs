// src/recording/reader.rs
//! Out-of-process reader for telemetry ring buffers
//!
//! Keeps a cursor into an attached ring buffer. When the writer laps the
//! reader, the missed window is reported and reading resumes from the
//! oldest event still available.

use crate::recording::ring_buffer::{RingBuffer, Snapshot, RING_FORMAT_VERSION};
use crate::utils::errors::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Polling reader over an attached ring buffer
pub struct TelemetryReader {
    ring: RingBuffer,
    last_seen: u64,
    total_read: u64,
    total_dropped: u64,
}

impl TelemetryReader {
    /// Attach to the store at `path`
    pub fn attach<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::attach_with_version(path, RING_FORMAT_VERSION)
    }

    /// Attach to the store at `path`, requiring a specific layout version
    pub fn attach_with_version<P: AsRef<Path>>(path: P, version: u32) -> Result<Self> {
        let ring = RingBuffer::attach_with_version(path, version)?;
        Ok(Self {
            ring,
            last_seen: 0,
            total_read: 0,
            total_dropped: 0,
        })
    }

    /// Attach to the store an agent writes under `dir`
    pub fn open<P: AsRef<Path>>(dir: P, agent_name: &str) -> Result<Self> {
        Self::attach(store_path(dir, agent_name))
    }

    /// Read everything published since the previous poll
    pub fn poll(&mut self) -> Snapshot {
        let snapshot = self.ring.snapshot_from(self.last_seen);

        if snapshot.has_gap() {
            warn!(
                "Telemetry reader fell behind on {:?}: {} events dropped after sequence {}",
                self.ring.path(),
                snapshot.dropped,
                snapshot.last_seen
            );
        }

        if !snapshot.is_empty() {
            debug!(
                "Read {} events (sequence {} -> {})",
                snapshot.len(),
                snapshot.last_seen,
                snapshot.next_cursor
            );
        }

        self.last_seen = snapshot.next_cursor;
        self.total_read += snapshot.len() as u64;
        self.total_dropped += snapshot.dropped;
        snapshot
    }

    /// Skip everything currently buffered
    pub fn skip_to_latest(&mut self) {
        self.last_seen = self.ring.cursor();
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    /// Whether the writer's backing file is still in place
    pub fn is_live(&self) -> bool {
        self.ring.store_exists()
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }
}

/// Backing store path for an agent under a base directory
pub fn store_path<P: AsRef<Path>>(dir: P, agent_name: &str) -> PathBuf {
    dir.as_ref().join(agent_name)
}
