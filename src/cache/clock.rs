//! Clock Module
//!
//! Monotonic time source used for all expiration math.

use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// == Timestamp ==
/// Opaque instant measured in nanoseconds from a clock-specific origin.
///
/// Timestamps from different clocks are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock origin.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Creates a timestamp from nanoseconds since the clock origin.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Nanoseconds since the clock origin.
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Returns `self - earlier`, or zero if `earlier` is later than `self`.
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let nanos = u64::try_from(rhs.as_nanos()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(nanos))
    }
}

// == Clock Trait ==
/// Source of non-decreasing timestamps.
pub trait Clock: Send + Sync {
    /// Current time. Successive calls never go backwards.
    fn now(&self) -> Timestamp;
}

// == Monotonic Clock ==
/// Process clock built on [`Instant`].
///
/// A high-water mark guards against any platform regression, so two threads
/// racing on `now()` still observe a non-decreasing sequence.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
    high_water: AtomicU64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            high_water: AtomicU64::new(0),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let elapsed = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let previous = self.high_water.fetch_max(elapsed, Ordering::AcqRel);
        Timestamp(previous.max(elapsed))
    }
}

// == Manual Clock ==
/// Clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to a
/// cache and keep another to advance it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(nanos))
            });
    }

    /// Sets the clock to `to`, ignoring attempts to move it backwards.
    pub fn set(&self, to: Timestamp) {
        self.nanos.fetch_max(to.0, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.nanos.load(Ordering::Acquire))
    }
}
