//! Monotonic clock capability.
//!
//! The prestop confirmation delay spans real elapsed time between frames,
//! so the detector never reads the wall clock directly. It is handed a
//! [`MonotonicClock`] at construction instead:
//! - [`SystemClock`] for production, anchored to an [`Instant`]
//! - [`ManualClock`] for tests that need to control elapsed time

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A source of monotonic timestamps, in nanoseconds since an arbitrary epoch.
///
/// Readings must never go backwards and must be immune to wall-clock
/// adjustments.
pub trait MonotonicClock: Send {
    /// Nanoseconds elapsed since the clock's epoch.
    fn now_ns(&self) -> u64;

    /// Seconds elapsed since the clock's epoch.
    fn now_secs(&self) -> f64 {
        ns_to_secs(self.now_ns())
    }
}

/// A clock that provides monotonic timestamps relative to the moment it
/// was started.
#[derive(Debug, Clone)]
pub struct SystemClock {
    /// The instant the clock started.
    epoch: Instant,

    /// Wall-clock time at epoch.
    epoch_wall: chrono::DateTime<chrono::Utc>,
}

impl SystemClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now(),
        }
    }

    /// Wall-clock time at clock start (RFC 3339).
    pub fn epoch_wall(&self) -> String {
        self.epoch_wall.to_rfc3339()
    }

    /// Wall-clock time corresponding to a monotonic reading of this clock.
    ///
    /// Only as accurate as the wall clock was at start; used for labelling
    /// events, never for timing.
    pub fn wall_at(&self, elapsed_ns: u64) -> chrono::DateTime<chrono::Utc> {
        self.epoch_wall + chrono::Duration::nanoseconds(elapsed_ns.min(i64::MAX as u64) as i64)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::start()
    }
}

impl MonotonicClock for SystemClock {
    fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

/// A hand-driven clock for deterministic tests.
///
/// Clones share the same reading, so a test can keep one handle and give
/// the other to the detector.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a manual clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current reading. Readings before the current one are ignored.
    pub fn set_ns(&self, ns: u64) {
        self.now_ns.fetch_max(ns, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance_ns(&self, ns: u64) {
        self.now_ns.fetch_add(ns, Ordering::SeqCst);
    }

    /// Move the clock forward by fractional seconds.
    pub fn advance_secs(&self, secs: f64) {
        self.advance_ns(secs_to_ns(secs));
    }
}

impl MonotonicClock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

/// Convert a nanosecond value to seconds.
pub fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / 1_000_000_000.0
}

/// Convert seconds to nanoseconds.
pub fn secs_to_ns(secs: f64) -> u64 {
    (secs * 1_000_000_000.0) as u64
}
