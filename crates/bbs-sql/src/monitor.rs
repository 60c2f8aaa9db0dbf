//! Query monitor — counts and times every statement the helpers run.
//!
//! Counters are plain atomics so observation costs nothing on the hot path.
//! The two maxima are read-and-reset, one window per metrics emission.

use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::DriverError;

#[derive(Debug, Default)]
pub struct QueryMonitor {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicI64,
    in_flight_max: AtomicI64,
    /// Longest observed duration, in nanoseconds.
    duration_max: AtomicU64,
}

impl QueryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` as one monitored statement. A "no rows" result is a
    /// successful query.
    pub async fn observe<T, F>(&self, fut: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        self.total.fetch_add(1, Ordering::Relaxed);
        let mut guard = InFlight::enter(self);

        let started = Instant::now();
        let result = fut.await;
        let elapsed = started.elapsed().as_nanos() as u64;

        guard.finished = true;
        drop(guard);
        self.duration_max.fetch_max(elapsed, Ordering::Relaxed);

        match &result {
            Ok(_) | Err(DriverError::NoRows) => self.succeeded.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest concurrency seen since the last call; resets to the current
    /// in-flight count.
    pub fn read_and_reset_in_flight_max(&self) -> i64 {
        self.in_flight_max.swap(self.in_flight(), Ordering::Relaxed)
    }

    pub fn read_and_reset_duration_max(&self) -> Duration {
        Duration::from_nanos(self.duration_max.swap(0, Ordering::Relaxed))
    }
}

/// Holds one slot of the in-flight gauge. A statement dropped before it
/// completes still releases its slot and counts as failed.
struct InFlight<'a> {
    monitor: &'a QueryMonitor,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn enter(monitor: &'a QueryMonitor) -> Self {
        let current = monitor.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        monitor.in_flight_max.fetch_max(current, Ordering::Relaxed);
        Self {
            monitor,
            finished: false,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.monitor.in_flight.fetch_sub(1, Ordering::Relaxed);
        if !self.finished {
            self.monitor.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}
