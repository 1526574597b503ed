//! Metric helpers for `wshub`.
//!
//! This module defines metric names and simple helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. Without the `metrics`
//! feature the helpers compile to no-ops, so call sites stay unconditional.

/// Name of the gauge tracking open sessions.
pub const SESSIONS_ACTIVE: &str = "wshub_sessions_active";
/// Name of the counter tracking processed frames.
pub const FRAMES_PROCESSED: &str = "wshub_frames_processed_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "wshub_errors_total";

/// Direction of frame processing.
#[derive(Clone, Copy)]
pub enum Direction {
    /// Inbound frames received from a client.
    Inbound,
    /// Outbound frames delivered to a client.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

#[cfg(feature = "metrics")]
mod imp {
    use metrics::{counter, gauge};

    use super::{Direction, ERRORS_TOTAL, FRAMES_PROCESSED, SESSIONS_ACTIVE};

    /// Increment the open sessions gauge.
    pub fn inc_sessions() { gauge!(SESSIONS_ACTIVE).increment(1.0); }

    /// Decrement the open sessions gauge.
    pub fn dec_sessions() { gauge!(SESSIONS_ACTIVE).decrement(1.0); }

    /// Record a processed frame for the given direction.
    pub fn inc_frames(direction: Direction) {
        counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    }

    /// Record an error occurrence.
    pub fn inc_errors() { counter!(ERRORS_TOTAL).increment(1); }
}

#[cfg(not(feature = "metrics"))]
mod imp {
    use super::Direction;

    pub fn inc_sessions() {}
    pub fn dec_sessions() {}
    pub fn inc_frames(_direction: Direction) {}
    pub fn inc_errors() {}
}

pub use imp::{dec_sessions, inc_errors, inc_frames, inc_sessions};
