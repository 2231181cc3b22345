//! Per-kind counters and latency samples.

use crate::metrics::{LatencyReport, LatencyWindow};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

/// Queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Number of pending requests
    pub pending: usize,
    /// Number of requests currently being processed
    pub processing: usize,
    /// Number of completed requests
    pub completed: usize,
    /// Number of failed requests
    pub failed: usize,
}

#[derive(Debug, Default)]
struct Counters {
    processing: usize,
    completed: usize,
    failed: usize,
    latency: LatencyWindow,
}

/// Shared between a worker and the scheduler that reports on it
#[derive(Debug, Default)]
pub(crate) struct KindStats {
    counters: Mutex<Counters>,
}

impl KindStats {
    pub(crate) fn begin(&self) {
        self.counters.lock().processing += 1;
    }

    pub(crate) fn finish(&self, succeeded: bool, waiting: Duration, turnaround: Duration) {
        let mut counters = self.counters.lock();
        counters.processing = counters.processing.saturating_sub(1);
        if succeeded {
            counters.completed += 1;
        } else {
            counters.failed += 1;
        }
        counters.latency.record(waiting, turnaround);
    }

    /// Counters with `pending` supplied by the queue
    pub(crate) fn snapshot(&self, pending: usize) -> QueueStats {
        let counters = self.counters.lock();
        QueueStats {
            pending,
            processing: counters.processing,
            completed: counters.completed,
            failed: counters.failed,
        }
    }

    pub(crate) fn latency(&self) -> LatencyReport {
        self.counters.lock().latency.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_outcomes() {
        let stats = KindStats::default();
        stats.begin();
        stats.begin();
        assert_eq!(stats.snapshot(3).processing, 2);

        stats.finish(true, Duration::from_millis(1), Duration::from_millis(2));
        stats.finish(false, Duration::from_millis(3), Duration::from_millis(4));
        assert_eq!(
            stats.snapshot(0),
            QueueStats {
                pending: 0,
                processing: 0,
                completed: 1,
                failed: 1
            }
        );
        let report = stats.latency();
        assert_eq!(report.waiting.count, 2);
        assert!((report.turnaround.avg_ms - 3.0).abs() < 1e-9);
    }
}
