//! Latency accounting for completed requests.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Samples kept per kind before the oldest are dropped
pub const DEFAULT_SAMPLE_WINDOW: usize = 4096;

/// Average and tail percentiles over a sample set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub avg_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

/// Waiting and turnaround summaries for one kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyReport {
    pub waiting: LatencySummary,
    pub turnaround: LatencySummary,
}

/// Summarize samples; percentiles interpolate linearly between ranks.
pub fn summarize(samples: &[Duration]) -> LatencySummary {
    if samples.is_empty() {
        return LatencySummary::default();
    }
    let mut ms: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
    ms.sort_by(|a, b| a.total_cmp(b));

    LatencySummary {
        count: ms.len(),
        avg_ms: ms.iter().sum::<f64>() / ms.len() as f64,
        p90_ms: percentile(&ms, 90.0),
        p99_ms: percentile(&ms, 99.0),
    }
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Bounded window of waiting/turnaround samples
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    limit: usize,
    waiting: VecDeque<Duration>,
    turnaround: VecDeque<Duration>,
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_WINDOW)
    }
}

impl LatencyWindow {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            waiting: VecDeque::new(),
            turnaround: VecDeque::new(),
        }
    }

    pub fn record(&mut self, waiting: Duration, turnaround: Duration) {
        if self.waiting.len() == self.limit {
            self.waiting.pop_front();
            self.turnaround.pop_front();
        }
        self.waiting.push_back(waiting);
        self.turnaround.push_back(turnaround);
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn report(&self) -> LatencyReport {
        let waiting: Vec<Duration> = self.waiting.iter().copied().collect();
        let turnaround: Vec<Duration> = self.turnaround.iter().copied().collect();
        LatencyReport {
            waiting: summarize(&waiting),
            turnaround: summarize(&turnaround),
        }
    }
}
