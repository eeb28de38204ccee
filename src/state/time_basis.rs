//! Elapsed/remaining arithmetic for the total and session clocks
//!
//! All durations are whole milliseconds. Nothing here reads the wall clock;
//! callers pass `at` explicitly (the current instant, or the pause instant
//! for a paused timer).

use chrono::{DateTime, Utc};

/// One clock measured at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub elapsed: u64,
    pub remaining: u64,
}

/// `at - started_at - accumulated_pause`, never negative.
pub fn elapsed_ms(at: DateTime<Utc>, started_at: DateTime<Utc>, accumulated_pause: u64) -> u64 {
    let since_start = (at - started_at).num_milliseconds();
    let accumulated = i64::try_from(accumulated_pause).unwrap_or(i64::MAX);
    u64::try_from(since_start.saturating_sub(accumulated)).unwrap_or(0)
}

/// `max(0, duration - elapsed)`.
pub fn remaining_ms(duration: u64, elapsed: u64) -> u64 {
    duration.saturating_sub(elapsed)
}

/// Measure a running clock.
pub fn measure(
    at: DateTime<Utc>,
    started_at: DateTime<Utc>,
    accumulated_pause: u64,
    duration: u64,
) -> ClockReading {
    let elapsed = elapsed_ms(at, started_at, accumulated_pause);
    ClockReading {
        elapsed,
        remaining: remaining_ms(duration, elapsed),
    }
}

/// Length of the pause that began at `paused_at`, clamped at zero on clock skew.
pub fn pause_length_ms(now: DateTime<Utc>, paused_at: DateTime<Utc>) -> u64 {
    u64::try_from((now - paused_at).num_milliseconds()).unwrap_or(0)
}

/// Convert a minute count from the API into milliseconds.
pub fn minutes_to_ms(minutes: f64) -> u64 {
    (minutes * 60_000.0).round() as u64
}
