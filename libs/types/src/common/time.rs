//! Wall-clock helpers
//!
//! Message timestamps are wall-clock seconds since the Unix epoch so that
//! persisted logs stay meaningful across restarts. Freshness and rate
//! calculations never use these; they run on the monotonic clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, 0.0 if the system clock is before it
pub fn unix_time_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
