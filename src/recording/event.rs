// src/recording/event.rs
//! Telemetry events and their fixed-size slot encoding
//!
//! Every event encodes to exactly [`EVENT_SIZE`] bytes so ring buffer slots
//! can be addressed by index. Changing this layout requires bumping
//! [`crate::recording::ring_buffer::RING_FORMAT_VERSION`].

use crate::utils::clock;
use bytes::{Buf, BufMut};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Maximum event name length in bytes
pub const EVENT_NAME_CAPACITY: usize = 48;

/// Encoded event size in bytes
pub const EVENT_SIZE: usize = 8 + 8 + 4 + 4 + EVENT_NAME_CAPACITY;

/// Encoded event size in 64-bit words
pub const EVENT_WORDS: usize = EVENT_SIZE / 8;

const _: () = assert!(EVENT_SIZE % 8 == 0);

/// Event categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum EventCategory {
    Transfer = 0,
    Backend = 1,
    Performance = 2,
    Memory = 3,
    Connection = 4,
    Error = 5,
    System = 6,
    Custom = 7,
}

impl EventCategory {
    pub const ALL: [EventCategory; 8] = [
        EventCategory::Transfer,
        EventCategory::Backend,
        EventCategory::Performance,
        EventCategory::Memory,
        EventCategory::Connection,
        EventCategory::Error,
        EventCategory::System,
        EventCategory::Custom,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Transfer => "TRANSFER",
            EventCategory::Backend => "BACKEND",
            EventCategory::Performance => "PERFORMANCE",
            EventCategory::Memory => "MEMORY",
            EventCategory::Connection => "CONNECTION",
            EventCategory::Error => "ERROR",
            EventCategory::System => "SYSTEM",
            EventCategory::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One telemetry occurrence
///
/// Immutable once constructed. The name lives inline so that building and
/// pushing an event never allocates.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Event {
    timestamp_us: u64,
    category: EventCategory,
    name: [u8; EVENT_NAME_CAPACITY],
    name_len: u8,
    value: u64,
}

impl Event {
    /// Create an event stamped with the current time
    ///
    /// Names longer than [`EVENT_NAME_CAPACITY`] bytes are truncated at a
    /// character boundary.
    pub fn new(category: EventCategory, name: &str, value: u64) -> Self {
        Self::with_timestamp(clock::now_us(), category, name, value)
    }

    /// Create an event with an explicit timestamp
    pub fn with_timestamp(timestamp_us: u64, category: EventCategory, name: &str, value: u64) -> Self {
        let mut end = name.len().min(EVENT_NAME_CAPACITY);
        while !name.is_char_boundary(end) {
            end -= 1;
        }

        let mut buf = [0u8; EVENT_NAME_CAPACITY];
        buf[..end].copy_from_slice(&name.as_bytes()[..end]);

        Self {
            timestamp_us,
            category,
            name: buf,
            name_len: end as u8,
            value,
        }
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn name(&self) -> &str {
        // Construction and decoding both guarantee valid UTF-8 here.
        std::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or_default()
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Encode into the fixed-size slot representation
    pub fn encode(&self) -> [u8; EVENT_SIZE] {
        let mut raw = [0u8; EVENT_SIZE];
        let mut out = &mut raw[..];
        out.put_u64_le(self.timestamp_us);
        out.put_u64_le(self.value);
        out.put_u32_le(self.category.as_u32());
        out.put_u32_le(self.name_len as u32);
        out.put_slice(&self.name);
        raw
    }

    /// Decode from the fixed-size slot representation
    ///
    /// Returns `None` when the bytes cannot be an encoded event, which
    /// readers treat the same as a torn slot.
    pub fn decode(raw: &[u8; EVENT_SIZE]) -> Option<Self> {
        let mut input = &raw[..];
        let timestamp_us = input.get_u64_le();
        let value = input.get_u64_le();
        let category = EventCategory::from_u32(input.get_u32_le())?;
        let name_len = input.get_u32_le() as usize;
        if name_len > EVENT_NAME_CAPACITY {
            return None;
        }

        let mut name = [0u8; EVENT_NAME_CAPACITY];
        input.copy_to_slice(&mut name);
        std::str::from_utf8(&name[..name_len]).ok()?;

        Some(Self {
            timestamp_us,
            category,
            name,
            name_len: name_len as u8,
            value,
        })
    }

    /// Encode as 64-bit words for atomic slot storage
    pub fn to_words(&self) -> [u64; EVENT_WORDS] {
        let raw = self.encode();
        let mut words = [0u64; EVENT_WORDS];
        for (word, chunk) in words.iter_mut().zip(raw.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }
        words
    }

    /// Decode from 64-bit words read out of a slot
    pub fn from_words(words: &[u64; EVENT_WORDS]) -> Option<Self> {
        let mut raw = [0u8; EVENT_SIZE];
        for (chunk, word) in raw.chunks_exact_mut(8).zip(words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Self::decode(&raw)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("timestamp_us", &self.timestamp_us)
            .field("category", &self.category)
            .field("name", &self.name())
            .field("value", &self.value)
            .finish()
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Event", 4)?;
        state.serialize_field("timestamp_us", &self.timestamp_us)?;
        state.serialize_field("category", &self.category)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}
