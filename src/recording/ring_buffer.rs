// src/recording/ring_buffer.rs
//! File-backed circular event buffer shared across processes
//!
//! One writer process creates the store and pushes events; any number of
//! reader processes attach read-only and drain it at their own pace.
//!
//! # Layout
//!
//! ```text
//! offset  0  magic        u64   "XFERTELE"
//! offset  8  version      u32   (+ u32 reserved)
//! offset 16  capacity     u64   slot count
//! offset 24  slot_size    u64
//! offset 64  cursor       u64   atomic, own cache line
//! offset 128 slots[capacity]:
//!            sequence     u64   atomic: 2-bit state + 62-bit sequence
//!            event        [u64; 9]
//! ```
//!
//! Slot states:
//!
//! ```text
//! PUBLISHED  seq   payload is the event pushed under `seq`
//! CLAIMED    seq   the writer holding ticket `seq` is filling the payload
//! STOLEN     seq   a newer push (`seq`) found the slot claimed and gave up
//! DROPPED    seq   the payload is garbage; everything up to `seq` is lost
//! ```
//!
//! A slot's sequence never moves backwards: a push only takes a slot whose
//! sequence is older than its own ticket, and a writer that finds the slot
//! claimed by an older, still running write records its own loss instead
//! of writing alongside it. Readers never lock; they validate each slot by
//! reading its sequence word before and after copying the payload.

use crate::recording::event::{Event, EVENT_SIZE, EVENT_WORDS};
use crate::utils::errors::{Result, TelemetryError};
use memmap2::{Mmap, MmapMut, MmapOptions};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Magic marker at offset 0 of every store
pub const RING_MAGIC: u64 = u64::from_le_bytes(*b"XFERTELE");

/// Current layout version
pub const RING_FORMAT_VERSION: u32 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 128;

/// Slot size in bytes (sequence word + encoded event)
pub const SLOT_SIZE: usize = 8 + EVENT_SIZE;

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 8;
const CAPACITY_OFFSET: usize = 16;
const SLOT_SIZE_OFFSET: usize = 24;
const CURSOR_OFFSET: usize = 64;

const SEQ_MASK: u64 = (1 << 62) - 1;
const STATE_MASK: u64 = !SEQ_MASK;

const SLOT_PUBLISHED: u64 = 0;
const SLOT_DROPPED: u64 = 1 << 62;
const SLOT_CLAIMED: u64 = 2 << 62;
const SLOT_STOLEN: u64 = 3 << 62;

enum Mapping {
    Writer(MmapMut),
    // Only held to keep the read-only mapping alive.
    #[allow(dead_code)]
    Reader(Mmap),
}

/// Shared circular event buffer
pub struct RingBuffer {
    path: PathBuf,
    mapping: Mapping,
    base: *mut u8,
    capacity: u64,
    version: u32,
    closed: AtomicBool,
}

// All shared-memory access goes through atomics at 8-byte aligned offsets
// inside the mapping, which lives as long as the RingBuffer.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a new store at `path` holding `capacity` events
    ///
    /// A stale store left at the same path is unlinked first; readers still
    /// attached to it keep their old mapping.
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize, version: u32) -> Result<Self> {
        let path = path.as_ref();

        if capacity == 0 {
            return Err(TelemetryError::StoreCreation(
                "capacity must be at least 1".to_string(),
            ));
        }

        let total_size = capacity
            .checked_mul(SLOT_SIZE)
            .and_then(|slots| slots.checked_add(HEADER_SIZE))
            .ok_or_else(|| {
                TelemetryError::StoreCreation(format!("capacity {} is too large", capacity))
            })?;

        match fs::remove_file(path) {
            Ok(()) => debug!("Removed stale ring buffer at {:?}", path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(TelemetryError::StoreCreation(format!(
                    "Failed to remove stale store {:?}: {}",
                    path, e
                )))
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                TelemetryError::StoreCreation(format!("Failed to open {:?}: {}", path, e))
            })?;

        // Zero-filled: cursor 0 and every slot PUBLISHED with sequence 0.
        file.set_len(total_size as u64).map_err(|e| {
            TelemetryError::StoreCreation(format!("Failed to set file size: {}", e))
        })?;

        let mut mmap = unsafe {
            MmapOptions::new().len(total_size).map_mut(&file).map_err(|e| {
                TelemetryError::StoreCreation(format!("Failed to create memory map: {}", e))
            })?
        };

        let base = mmap.as_mut_ptr();
        let ring = Self {
            path: path.to_path_buf(),
            mapping: Mapping::Writer(mmap),
            base,
            capacity: capacity as u64,
            version,
            closed: AtomicBool::new(false),
        };

        ring.word(VERSION_OFFSET).store(u64::from(version), Ordering::Relaxed);
        ring.word(CAPACITY_OFFSET).store(capacity as u64, Ordering::Relaxed);
        ring.word(SLOT_SIZE_OFFSET).store(SLOT_SIZE as u64, Ordering::Relaxed);
        ring.word(CURSOR_OFFSET).store(0, Ordering::Relaxed);
        // Magic last: a reader that sees it sees the whole header.
        ring.word(MAGIC_OFFSET).store(RING_MAGIC, Ordering::Release);

        info!(
            "Created ring buffer at {:?} (capacity: {}, version: {}, {} bytes)",
            path, capacity, version, total_size
        );

        Ok(ring)
    }

    /// Attach read-only to an existing store of the current layout version
    pub fn attach<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::attach_with_version(path, RING_FORMAT_VERSION)
    }

    /// Attach read-only, requiring the store to carry `expected_version`
    pub fn attach_with_version<P: AsRef<Path>>(path: P, expected_version: u32) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| {
            TelemetryError::StoreNotFound(format!("Failed to open {:?}: {}", path, e))
        })?;

        let file_len = file
            .metadata()
            .map_err(|e| TelemetryError::StoreNotFound(format!("Failed to stat {:?}: {}", path, e)))?
            .len();

        if file_len < HEADER_SIZE as u64 {
            return Err(TelemetryError::StoreNotFound(format!(
                "{:?} is too small to be a ring buffer ({} bytes)",
                path, file_len
            )));
        }

        let mmap = unsafe {
            MmapOptions::new().map(&file).map_err(|e| {
                TelemetryError::StoreNotFound(format!("Failed to map {:?}: {}", path, e))
            })?
        };

        let base = mmap.as_ptr() as *mut u8;
        let mut ring = Self {
            path: path.to_path_buf(),
            mapping: Mapping::Reader(mmap),
            base,
            capacity: 0,
            version: 0,
            closed: AtomicBool::new(false),
        };

        let magic = ring.word(MAGIC_OFFSET).load(Ordering::Acquire);
        if magic != RING_MAGIC {
            return Err(TelemetryError::StoreNotFound(format!(
                "{:?} has invalid magic 0x{:X}",
                path, magic
            )));
        }

        let version = ring.word(VERSION_OFFSET).load(Ordering::Relaxed) as u32;
        if version != expected_version {
            return Err(TelemetryError::VersionMismatch {
                expected: expected_version,
                found: version,
            });
        }

        let capacity = ring.word(CAPACITY_OFFSET).load(Ordering::Relaxed);
        let slot_size = ring.word(SLOT_SIZE_OFFSET).load(Ordering::Relaxed);
        if capacity == 0 || slot_size != SLOT_SIZE as u64 {
            return Err(TelemetryError::StoreNotFound(format!(
                "{:?} has a corrupt header (capacity: {}, slot size: {})",
                path, capacity, slot_size
            )));
        }

        let expected_len = capacity
            .checked_mul(SLOT_SIZE as u64)
            .and_then(|slots| slots.checked_add(HEADER_SIZE as u64));
        match expected_len {
            Some(len) if len <= file_len => {}
            _ => {
                return Err(TelemetryError::StoreNotFound(format!(
                    "{:?} is truncated ({} bytes for capacity {})",
                    path, file_len, capacity
                )))
            }
        }

        ring.capacity = capacity;
        ring.version = version;

        debug!(
            "Attached to ring buffer at {:?} (capacity: {}, cursor: {})",
            path,
            capacity,
            ring.cursor()
        );

        Ok(ring)
    }

    /// Append an event, overwriting the oldest one when full
    ///
    /// Never blocks. Returns false only when this handle cannot write:
    /// it is attached read-only or has been closed. A push overtaken by
    /// a newer one on the same slot still returns true; readers count it
    /// as dropped.
    pub fn push(&self, event: &Event) -> bool {
        if !self.is_writer() || self.closed.load(Ordering::Relaxed) {
            return false;
        }

        let ticket = self.word(CURSOR_OFFSET).fetch_add(1, Ordering::AcqRel);
        if let Some(claim) = self.claim_slot(ticket) {
            self.publish_slot(ticket, claim, event);
        }
        true
    }

    /// Take the slot for `ticket`, or give up when a newer push owns it
    ///
    /// Returns the claim word to publish against. `None` means this push
    /// has already been superseded and is accounted for as a loss.
    fn claim_slot(&self, ticket: u64) -> Option<u64> {
        let seq = ticket + 1;
        let sequence = self.word(self.slot_offset(ticket));
        let mut current = sequence.load(Ordering::Acquire);

        loop {
            if current & SEQ_MASK >= seq {
                // Lapped: a newer push already owns this slot.
                return None;
            }

            let next = match current & STATE_MASK {
                SLOT_CLAIMED | SLOT_STOLEN => SLOT_STOLEN | seq,
                _ => SLOT_CLAIMED | seq,
            };

            match sequence.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) if next & STATE_MASK == SLOT_STOLEN => return None,
                Ok(_) => return Some(next),
                Err(actual) => current = actual,
            }
        }
    }

    /// Fill a claimed slot and publish it
    ///
    /// If a newer push marked the slot stolen while this write was running,
    /// the payload is retired as dropped up to the thief's sequence.
    fn publish_slot(&self, ticket: u64, claim: u64, event: &Event) {
        let slot = self.slot_offset(ticket);
        let sequence = self.word(slot);

        fence(Ordering::Release);
        for (i, word) in event.to_words().iter().enumerate() {
            self.word(slot + 8 + i * 8).store(*word, Ordering::Relaxed);
        }

        let mut expected = claim;
        let mut publish = ticket + 1;
        while let Err(actual) =
            sequence.compare_exchange(expected, publish, Ordering::Release, Ordering::Relaxed)
        {
            // Only the claimant leaves CLAIMED/STOLEN, so `actual` is STOLEN.
            expected = actual;
            publish = SLOT_DROPPED | (actual & SEQ_MASK);
        }
    }

    /// Collect the consistent events newer than `last_seen`
    ///
    /// `last_seen` is the sequence number of the last event the caller has
    /// consumed (0 for a fresh reader). Events come back in sequence order.
    /// Events the writer overwrote before they could be read are counted in
    /// [`Snapshot::dropped`] rather than returned torn.
    pub fn snapshot_from(&self, last_seen: u64) -> Snapshot {
        let cursor = self.cursor();

        if last_seen > cursor {
            // The store behind this path started over; resume from its head.
            warn!(
                "Reader cursor {} is ahead of writer cursor {}, resynchronizing",
                last_seen, cursor
            );
            return Snapshot {
                events: Vec::new(),
                last_seen,
                next_cursor: cursor,
                dropped: 0,
            };
        }

        let oldest_retained = cursor.saturating_sub(self.capacity) + 1;
        let start = (last_seen + 1).max(oldest_retained);

        let mut events = Vec::with_capacity((cursor + 1 - start) as usize);
        let mut dropped = start - (last_seen + 1);
        let mut next_cursor = start - 1;

        for seq in start..=cursor {
            match self.read_slot(seq) {
                SlotRead::Event(event) => events.push(SequencedEvent {
                    sequence: seq,
                    event,
                }),
                SlotRead::Overwritten => dropped += 1,
                SlotRead::InFlight => break,
            }
            next_cursor = seq;
        }

        Snapshot {
            events,
            last_seen,
            next_cursor,
            dropped,
        }
    }

    fn read_slot(&self, seq: u64) -> SlotRead {
        let slot = self.slot_offset(seq - 1);
        let sequence = self.word(slot);

        let before = sequence.load(Ordering::Acquire);
        let mark = before & SEQ_MASK;
        if mark < seq {
            return SlotRead::InFlight;
        }
        match before & STATE_MASK {
            _ if mark > seq => return SlotRead::Overwritten,
            SLOT_CLAIMED => return SlotRead::InFlight,
            SLOT_STOLEN | SLOT_DROPPED => return SlotRead::Overwritten,
            _ => {}
        }

        let mut words = [0u64; EVENT_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = self.word(slot + 8 + i * 8).load(Ordering::Relaxed);
        }

        fence(Ordering::Acquire);
        if sequence.load(Ordering::Relaxed) != before {
            return SlotRead::Overwritten;
        }

        match Event::from_words(&words) {
            Some(event) => SlotRead::Event(event),
            None => SlotRead::Overwritten,
        }
    }

    /// Stop accepting pushes on this handle
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::Relaxed) {
            debug!("Closed ring buffer at {:?}", self.path);
        }
    }

    /// Schedule dirty pages of the store to be written to disk
    pub fn flush(&self) -> Result<()> {
        if let Mapping::Writer(ref mmap) = self.mapping {
            mmap.flush_async().map_err(|e| {
                TelemetryError::export(format!("Failed to flush memory map: {}", e))
            })?;
        }
        Ok(())
    }

    /// Number of pushes ever made; also the newest sequence number
    pub fn cursor(&self) -> u64 {
        self.word(CURSOR_OFFSET).load(Ordering::Acquire)
    }

    /// Slot count
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Number of events currently retained
    pub fn len(&self) -> usize {
        self.cursor().min(self.capacity) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.cursor() == 0
    }

    /// Layout version recorded in the header
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writer(&self) -> bool {
        matches!(self.mapping, Mapping::Writer(_))
    }

    /// Whether the backing file is still reachable at its path
    pub fn store_exists(&self) -> bool {
        self.path.exists()
    }

    fn slot_offset(&self, ticket: u64) -> usize {
        HEADER_SIZE + (ticket % self.capacity) as usize * SLOT_SIZE
    }

    fn word(&self, offset: usize) -> &AtomicU64 {
        debug_assert!(offset % 8 == 0);
        unsafe { &*(self.base.add(offset) as *const AtomicU64) }
    }
}

impl Drop for RingBuffer {
    fn drop(&mut self) {
        if self.is_writer() {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove ring buffer {:?}: {}", self.path, e);
                }
            }
            debug!("Released ring buffer at {:?}", self.path);
        }
    }
}

enum SlotRead {
    Event(Event),
    Overwritten,
    InFlight,
}

/// An event together with the sequence number it was written under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequencedEvent {
    pub sequence: u64,
    pub event: Event,
}

/// Result of one read pass over the ring
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Consistent events in sequence order
    pub events: Vec<SequencedEvent>,

    /// Cursor the snapshot was taken from
    pub last_seen: u64,

    /// Cursor to pass to the next snapshot
    pub next_cursor: u64,

    /// Events missed since `last_seen`
    pub dropped: u64,
}

impl Snapshot {
    /// Whether events between `last_seen` and the returned ones were lost
    pub fn has_gap(&self) -> bool {
        self.dropped > 0
    }

    /// Sequence number of the oldest returned event
    pub fn oldest_sequence(&self) -> Option<u64> {
        self.events.first().map(|e| e.sequence)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
