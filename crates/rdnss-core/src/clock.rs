//! Monotonic time base for cache expiry
//!
//! All expiry values are whole seconds since the clock was created. The clock
//! never goes backwards, so wall-clock adjustments cannot expire entries early.

use std::time::Duration;
use tokio::time::Instant;

/// Whole seconds on the daemon's monotonic clock
pub type Timestamp = u64;

/// Largest representable expiry; lifetimes are saturated to this value
pub const MAX_EXPIRY: Timestamp = i32::MAX as Timestamp;

/// Monotonic clock shared by the worker and the packet sources
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    /// Start a clock at the current instant
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Seconds elapsed since the clock was started
    pub fn now(&self) -> Timestamp {
        self.epoch.elapsed().as_secs()
    }

    /// The instant at which `timestamp` is reached
    pub fn instant_at(&self, timestamp: Timestamp) -> Instant {
        self.epoch + Duration::from_secs(timestamp)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute expiry for a lifetime received at `now`
pub fn expiry_from_lifetime(now: Timestamp, lifetime_secs: u32) -> Timestamp {
    now.saturating_add(Timestamp::from(lifetime_secs)).min(MAX_EXPIRY)
}
