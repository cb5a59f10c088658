//! Round metrics.
//!
//! Aggregates outcomes and round durations per strategy, with average and
//! p95 over a sliding window.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::executor::RoundOutcome;

/// Strategy-scoped metrics snapshot.
#[derive(Debug, Clone)]
pub struct StrategyStats {
    pub strategy: String,
    pub rounds: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub average_duration: Option<Duration>,
    pub p95_duration: Option<Duration>,
    pub consecutive_failures: u32,
}

impl StrategyStats {
    fn from_accumulator(strategy: &str, acc: &StrategyAccumulator) -> Self {
        let (avg, p95) = acc.duration_stats();
        Self {
            strategy: strategy.to_string(),
            rounds: acc.rounds,
            successes: acc.successes,
            failures: acc.failures,
            timeouts: acc.timeouts,
            average_duration: avg,
            p95_duration: p95,
            consecutive_failures: acc.consecutive_failures,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub started_at: DateTime<Utc>,
    pub rounds: u64,
    pub successes: u64,
    pub failures: u64,
    pub strategies: Vec<StrategyStats>,
}

#[derive(Debug)]
struct StrategyAccumulator {
    rounds: u64,
    successes: u64,
    failures: u64,
    timeouts: u64,
    durations: VecDeque<Duration>,
    max_window: usize,
    consecutive_failures: u32,
}

impl StrategyAccumulator {
    fn new(max_window: usize) -> Self {
        Self {
            rounds: 0,
            successes: 0,
            failures: 0,
            timeouts: 0,
            durations: VecDeque::with_capacity(max_window),
            max_window,
            consecutive_failures: 0,
        }
    }

    fn record(&mut self, outcome: RoundOutcome, elapsed: Duration) {
        self.rounds += 1;
        if outcome.is_success() {
            self.successes += 1;
            self.consecutive_failures = 0;
        } else {
            self.failures += 1;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        if outcome == RoundOutcome::Timeout {
            self.timeouts += 1;
        }

        if self.durations.len() == self.max_window {
            self.durations.pop_front();
        }
        self.durations.push_back(elapsed);
    }

    fn duration_stats(&self) -> (Option<Duration>, Option<Duration>) {
        if self.durations.is_empty() {
            return (None, None);
        }
        let mut samples: Vec<_> = self.durations.iter().copied().collect();
        samples.sort_unstable();
        let avg = samples.iter().map(Duration::as_secs_f64).sum::<f64>() / samples.len() as f64;
        let p95_index = ((samples.len() as f64 * 0.95).ceil() as usize).saturating_sub(1);
        (Some(Duration::from_secs_f64(avg)), Some(samples[p95_index]))
    }
}

#[derive(Debug)]
struct MetricsState {
    started_at: DateTime<Utc>,
    max_window: usize,
    strategies: HashMap<String, StrategyAccumulator>,
}

/// Thread-safe round metrics collector.
#[derive(Clone, Debug)]
pub struct RoundMetrics {
    inner: Arc<Mutex<MetricsState>>,
}

impl RoundMetrics {
    pub fn new() -> Self {
        Self::with_window(128)
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                started_at: Utc::now(),
                max_window: window.max(16),
                strategies: HashMap::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MetricsState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_round(&self, strategy: &str, outcome: RoundOutcome, elapsed: Duration) {
        let mut guard = self.state();
        let window = guard.max_window;
        guard
            .strategies
            .entry(strategy.to_string())
            .or_insert_with(|| StrategyAccumulator::new(window))
            .record(outcome, elapsed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let guard = self.state();
        let mut strategies: Vec<StrategyStats> = guard
            .strategies
            .iter()
            .map(|(name, acc)| StrategyStats::from_accumulator(name, acc))
            .collect();
        strategies.sort_by(|a, b| a.strategy.cmp(&b.strategy));

        MetricsSnapshot {
            started_at: guard.started_at,
            rounds: strategies.iter().map(|s| s.rounds).sum(),
            successes: strategies.iter().map(|s| s.successes).sum(),
            failures: strategies.iter().map(|s| s.failures).sum(),
            strategies,
        }
    }
}

impl Default for RoundMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_outcomes_per_strategy() {
        let metrics = RoundMetrics::new();
        metrics.record_round("sheep-normal", RoundOutcome::Success, Duration::from_secs(300));
        metrics.record_round("sheep-normal", RoundOutcome::Timeout, Duration::from_secs(900));
        metrics.record_round("sheep-normal", RoundOutcome::Failure, Duration::from_secs(120));
        metrics.record_round("cave-normal", RoundOutcome::Success, Duration::from_secs(60));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rounds, 4);
        assert_eq!(snapshot.successes, 2);
        assert_eq!(snapshot.failures, 2);

        let sheep = snapshot
            .strategies
            .iter()
            .find(|s| s.strategy == "sheep-normal")
            .unwrap();
        assert_eq!(sheep.timeouts, 1);
        assert_eq!(sheep.consecutive_failures, 2);
        assert_eq!(sheep.average_duration, Some(Duration::from_secs(440)));
        assert_eq!(sheep.p95_duration, Some(Duration::from_secs(900)));
    }
}
