// src/utils/clock.rs
//! Microsecond timestamps for telemetry events
//!
//! Timestamps are anchored to wall-clock time once per process and advanced
//! with a monotonic clock afterwards, so they never step backwards.

use once_cell::sync::Lazy;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

struct Anchor {
    instant: Instant,
    epoch_us: u64,
}

static ANCHOR: Lazy<Anchor> = Lazy::new(|| Anchor {
    instant: Instant::now(),
    epoch_us: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0),
});

/// Current timestamp in microseconds since the Unix epoch
pub fn now_us() -> u64 {
    let anchor = &*ANCHOR;
    anchor.epoch_us + anchor.instant.elapsed().as_micros() as u64
}
