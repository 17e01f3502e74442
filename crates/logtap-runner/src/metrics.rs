//! Lock-free per-runner metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-runner counters using atomics (no locks on the read path).
#[derive(Debug, Default)]
pub struct RunnerMetrics {
    /// Successful `open()` calls.
    pub opens: AtomicU64,
    /// Failed `open()` calls, retried or not.
    pub open_failures: AtomicU64,
    /// Successful `read()` calls.
    pub reads: AtomicU64,
    /// Reads that returned no records.
    pub empty_polls: AtomicU64,
    /// Records accepted by the publisher.
    pub records_published: AtomicU64,
    /// `reset()` calls.
    pub resets: AtomicU64,
    /// Failed `reset()` calls.
    pub reset_failures: AtomicU64,
    /// Returns from the read loop to opening after a read fault.
    pub reopens: AtomicU64,
}

impl RunnerMetrics {
    /// Records a successful open.
    pub fn record_open(&self) {
        self.opens.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed open.
    pub fn record_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed read of `records` records.
    pub fn record_read(&self, records: usize) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if records == 0 {
            self.empty_polls.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records one published record.
    pub fn record_published(&self) {
        self.records_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a reset attempt and its outcome.
    pub fn record_reset(&self, ok: bool) {
        self.resets.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.reset_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a read fault that sends the runner back to opening.
    pub fn record_reopen(&self) {
        self.reopens.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of the current metrics.
    #[must_use]
    pub fn snapshot(&self) -> RunnerMetricsSnapshot {
        RunnerMetricsSnapshot {
            opens: self.opens.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            records_published: self.records_published.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            reset_failures: self.reset_failures.load(Ordering::Relaxed),
            reopens: self.reopens.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of runner metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunnerMetricsSnapshot {
    /// Successful opens.
    pub opens: u64,
    /// Failed opens.
    pub open_failures: u64,
    /// Completed reads.
    pub reads: u64,
    /// Empty reads.
    pub empty_polls: u64,
    /// Published records.
    pub records_published: u64,
    /// Reset attempts.
    pub resets: u64,
    /// Failed resets.
    pub reset_failures: u64,
    /// Reopens after read faults.
    pub reopens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = RunnerMetrics::default();
        metrics.record_open();
        metrics.record_read(0);
        metrics.record_read(3);
        metrics.record_published();
        metrics.record_reset(false);
        metrics.record_reset(true);

        let snap = metrics.snapshot();
        assert_eq!(snap.opens, 1);
        assert_eq!(snap.reads, 2);
        assert_eq!(snap.empty_polls, 1);
        assert_eq!(snap.records_published, 1);
        assert_eq!(snap.resets, 2);
        assert_eq!(snap.reset_failures, 1);
        assert_eq!(snap.reopens, 0);
    }
}
