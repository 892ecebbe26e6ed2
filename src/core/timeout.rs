//! Blocking timeout vocabulary
//!
//! Every blocking operation in the core (mailbox sends/receives, the join
//! retry loop) takes an explicit [`Timeout`] covering the three cases the
//! RTOS vocabulary distinguishes: do not wait, wait up to a bound, wait
//! forever. Callers that need bounded end-to-end latency pick a bounded
//! wait and handle the failure path themselves.

use std::time::{Duration, Instant};

/// How long a blocking operation may wait before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout(Option<Duration>);

impl Timeout {
    /// Fail immediately if the operation cannot complete right now.
    pub const NO_WAIT: Timeout = Timeout(Some(Duration::ZERO));

    /// Wait indefinitely.
    pub const FOREVER: Timeout = Timeout(None);

    /// Wait up to the given duration.
    pub const fn bounded(duration: Duration) -> Self {
        Timeout(Some(duration))
    }

    /// Wait up to `ms` milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Timeout(Some(Duration::from_millis(ms)))
    }

    /// True if this timeout never expires.
    pub fn is_forever(&self) -> bool {
        self.0.is_none()
    }

    /// Absolute deadline for this timeout, measured from `start`.
    ///
    /// `None` means no deadline (wait forever).
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        self.0.map(|d| start + d)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::bounded(duration)
    }
}
