//! Pacing between remote operations
//!
//! The remote API tolerates a fixed number of calls per interval, with separate budgets
//! for history fetches and media downloads. After each operation the caller sleeps for
//! whatever is left of the interval.
//!
//! The delay calculation is a pure function of the interval and the time already spent,
//! clamped to `[0, interval]` so a clock jump in either direction can never produce a
//! negative sleep or one longer than the configured interval.

use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Operation classes with independent pacing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Fetching a page of items
    History,
    /// Downloading one media blob
    Media,
}

/// Remaining delay for an operation that took `elapsed`
///
/// # Examples
///
/// ```
/// use feed_harvest::rate_limit::remaining_delay;
/// use std::time::Duration;
///
/// let interval = Duration::from_secs(3);
/// assert_eq!(remaining_delay(interval, Duration::from_secs(1)), Duration::from_secs(2));
/// assert_eq!(remaining_delay(interval, Duration::from_secs(10)), Duration::ZERO);
/// ```
#[must_use]
pub fn remaining_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed).min(interval)
}

/// Remaining delay measured with wall-clock timestamps
///
/// If `now` is earlier than `started` (the clock moved backward) the full interval is
/// returned.
#[must_use]
pub fn remaining_delay_between(interval: Duration, started: SystemTime, now: SystemTime) -> Duration {
    match now.duration_since(started) {
        Ok(elapsed) => remaining_delay(interval, elapsed),
        Err(_) => interval,
    }
}

/// Per-class pacing for one harvester
///
/// Holds only the two interval constants; feeds are processed one at a time so no
/// state is shared between operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimiter {
    history_interval: Duration,
    media_interval: Duration,
}

impl RateLimiter {
    /// Create a limiter with the given history and media intervals
    #[must_use]
    pub fn new(history_interval: Duration, media_interval: Duration) -> Self {
        Self {
            history_interval,
            media_interval,
        }
    }

    /// Configured interval of an operation class
    #[must_use]
    pub fn interval(&self, class: OperationClass) -> Duration {
        match class {
            OperationClass::History => self.history_interval,
            OperationClass::Media => self.media_interval,
        }
    }

    /// How long to wait after an operation of `class` that began at `started`
    #[must_use]
    pub fn delay_after(&self, class: OperationClass, started: Instant) -> Duration {
        remaining_delay(self.interval(class), started.elapsed())
    }

    /// Sleep out the rest of the interval unless cancelled first
    ///
    /// Returns `false` if the token fired during the wait.
    pub async fn pace(
        &self,
        class: OperationClass,
        started: Instant,
        cancel: &CancellationToken,
    ) -> bool {
        let delay = self.delay_after(class, started);
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
