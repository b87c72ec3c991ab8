//! Clock readings used by the engine
//!
//! Book update stamps come from a process-wide steady clock so they are
//! monotone non-decreasing; order and fill timestamps use the wall clock so
//! hosts can correlate them with their own records.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed on a process-wide steady clock.
pub fn monotonic_ns() -> i64 {
    let anchor = ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_nanos() as i64
}

/// Wall-clock nanoseconds since the Unix epoch.
pub fn unix_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
