//! Rolling evaluation counters.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Summary of one finished evaluation, as seen by the aggregator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EvaluationSample {
    /// Whether the action was allowed.
    pub allowed: bool,
    /// Overall score in `[0, 1]`.
    pub score: f64,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: f64,
    /// Whether a hard layer blocked the action.
    pub hard_blocked: bool,
    /// Violations recorded by soft layers.
    pub soft_violations: u64,
    /// Warnings recorded.
    pub warnings: u64,
    /// Whether the deadline cut the evaluation short.
    pub incomplete: bool,
    /// Whether the evaluation faulted and was failed closed.
    pub error: bool,
}

/// Point-in-time copy of the aggregated counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Evaluations recorded.
    pub total_evaluations: u64,
    /// Evaluations that allowed the action.
    pub allowed: u64,
    /// Evaluations that denied the action.
    pub denied: u64,
    /// Evaluations blocked by a hard layer.
    pub hard_violations: u64,
    /// Violations recorded by soft layers.
    pub soft_violations: u64,
    /// Warnings recorded.
    pub warnings: u64,
    /// Evaluations cut short by their deadline.
    pub incomplete: u64,
    /// Evaluations that faulted.
    pub errors: u64,
    /// Rolling mean of overall scores.
    pub average_score: f64,
    /// Rolling mean of latencies.
    pub average_latency_ms: f64,
    /// Per-layer invocation counts.
    pub layer_invocations: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    /// Fraction of evaluations that allowed the action, `0.0` before the first.
    #[must_use]
    pub fn approval_rate(&self) -> f64 {
        if self.total_evaluations == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.allowed as f64 / self.total_evaluations as f64;
        rate
    }

    /// Fraction of evaluations blocked by a hard layer.
    #[must_use]
    pub fn hard_violation_rate(&self) -> f64 {
        if self.total_evaluations == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.hard_violations as f64 / self.total_evaluations as f64;
        rate
    }
}

/// Thread-safe accumulator shared by concurrent evaluations.
///
/// Every update is a single critical section, so concurrent recordings
/// never lose counts.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    state: Mutex<MetricsSnapshot>,
}

impl MetricsAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a layer name with a zero count.
    pub fn register_layer(&self, name: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.layer_invocations.entry(name.to_owned()).or_insert(0);
    }

    /// Counts one evaluation of the named layer.
    pub fn record_layer_invocation(&self, name: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state.layer_invocations.entry(name.to_owned()).or_insert(0) += 1;
    }

    /// Folds one finished evaluation into the counters.
    pub fn record(&self, sample: EvaluationSample) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.total_evaluations += 1;
        if sample.allowed {
            state.allowed += 1;
        } else {
            state.denied += 1;
        }
        state.hard_violations += u64::from(sample.hard_blocked);
        state.soft_violations += sample.soft_violations;
        state.warnings += sample.warnings;
        state.incomplete += u64::from(sample.incomplete);
        state.errors += u64::from(sample.error);

        #[allow(clippy::cast_precision_loss)]
        let n = state.total_evaluations as f64;
        state.average_score = (state.average_score * (n - 1.0) + sample.score) / n;
        state.average_latency_ms = (state.average_latency_ms * (n - 1.0) + sample.latency_ms) / n;
    }

    /// Returns a copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn rolling_means_and_counters() {
        let metrics = MetricsAggregator::new();
        metrics.record(EvaluationSample {
            allowed: true,
            score: 1.0,
            latency_ms: 10.0,
            ..EvaluationSample::default()
        });
        metrics.record(EvaluationSample {
            allowed: false,
            score: 0.0,
            latency_ms: 30.0,
            hard_blocked: true,
            warnings: 2,
            ..EvaluationSample::default()
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_evaluations, 2);
        assert_eq!(snapshot.allowed, 1);
        assert_eq!(snapshot.denied, 1);
        assert_eq!(snapshot.hard_violations, 1);
        assert_eq!(snapshot.warnings, 2);
        assert!((snapshot.average_score - 0.5).abs() < 1e-12);
        assert!((snapshot.average_latency_ms - 20.0).abs() < 1e-12);
        assert!((snapshot.approval_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_snapshot_rates() {
        let snapshot = MetricsAggregator::new().snapshot();
        assert!(snapshot.approval_rate().abs() < f64::EPSILON);
        assert!(snapshot.hard_violation_rate().abs() < f64::EPSILON);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_recording_loses_nothing() {
        let metrics = Arc::new(MetricsAggregator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = Arc::clone(&metrics);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    metrics.record_layer_invocation("SafetyLayer");
                    metrics.record(EvaluationSample {
                        allowed: true,
                        score: 1.0,
                        ..EvaluationSample::default()
                    });
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_evaluations, 800);
        assert_eq!(snapshot.layer_invocations["SafetyLayer"], 800);
    }
}
