//! Threshold alerts evaluated against metrics snapshots.
//!
//! Alerts are only produced here; delivering them is the caller's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::MetricsSnapshot;

/// Urgency of an alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational.
    Info,
    /// Low urgency.
    Low,
    /// Needs attention.
    Medium,
    /// Needs prompt attention.
    High,
    /// Needs immediate attention.
    Critical,
}

/// Alert raised by an [`AlertPolicy`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Short title.
    pub title: String,
    /// Human-readable detail.
    pub message: String,
    /// Urgency.
    pub severity: AlertSeverity,
    /// Observed value that tripped the threshold.
    pub observed: f64,
    /// Threshold that was crossed.
    pub threshold: f64,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

/// Thresholds checked against a snapshot. `None` disables a check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertPolicy {
    /// Maximum tolerated fraction of evaluations blocked by a hard layer.
    pub max_hard_violation_rate: Option<f64>,
    /// Minimum tolerated rolling average score.
    pub min_average_score: Option<f64>,
    /// Maximum tolerated rolling average latency.
    pub max_average_latency_ms: Option<f64>,
    /// Raise an alert whenever evaluations have faulted.
    pub alert_on_errors: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            max_hard_violation_rate: None,
            min_average_score: None,
            max_average_latency_ms: None,
            alert_on_errors: true,
        }
    }
}

impl AlertPolicy {
    /// Returns every alert the snapshot triggers. Nothing is raised before
    /// the first evaluation.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        if snapshot.total_evaluations == 0 {
            return Vec::new();
        }
        let now = Utc::now();
        let mut alerts = Vec::new();
        let mut raise = |title: &str,
                         message: String,
                         severity: AlertSeverity,
                         observed: f64,
                         threshold: f64| {
            warn!(alert = title, observed, threshold, "alert threshold crossed");
            alerts.push(Alert {
                title: title.to_owned(),
                message,
                severity,
                observed,
                threshold,
                raised_at: now,
            });
        };

        if let Some(limit) = self.max_hard_violation_rate {
            let rate = snapshot.hard_violation_rate();
            if rate > limit {
                raise(
                    "hard_violation_rate",
                    format!("{:.1}% of evaluations were blocked by a hard layer", rate * 100.0),
                    AlertSeverity::Critical,
                    rate,
                    limit,
                );
            }
        }
        if let Some(floor) = self.min_average_score {
            if snapshot.average_score < floor {
                raise(
                    "average_score",
                    format!("average score {:.3} is below {floor}", snapshot.average_score),
                    AlertSeverity::High,
                    snapshot.average_score,
                    floor,
                );
            }
        }
        if let Some(ceiling) = self.max_average_latency_ms {
            if snapshot.average_latency_ms > ceiling {
                raise(
                    "average_latency",
                    format!(
                        "average latency {:.1}ms exceeds {ceiling}ms",
                        snapshot.average_latency_ms
                    ),
                    AlertSeverity::Medium,
                    snapshot.average_latency_ms,
                    ceiling,
                );
            }
        }
        if self.alert_on_errors && snapshot.errors > 0 {
            #[allow(clippy::cast_precision_loss)]
            let errors = snapshot.errors as f64;
            raise(
                "evaluation_errors",
                format!("{} evaluations faulted and were denied", snapshot.errors),
                AlertSeverity::High,
                errors,
                0.0,
            );
        }
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            total_evaluations: 10,
            hard_violations: 5,
            average_score: 0.4,
            average_latency_ms: 900.0,
            errors: 1,
            ..MetricsSnapshot::default()
        }
    }

    #[test]
    fn every_threshold_can_fire() {
        let policy = AlertPolicy {
            max_hard_violation_rate: Some(0.25),
            min_average_score: Some(0.5),
            max_average_latency_ms: Some(500.0),
            alert_on_errors: true,
        };
        let alerts = policy.evaluate(&snapshot());
        let titles: Vec<_> = alerts.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            ["hard_violation_rate", "average_score", "average_latency", "evaluation_errors"]
        );
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn quiet_when_disabled_or_empty() {
        let policy = AlertPolicy {
            alert_on_errors: false,
            ..AlertPolicy::default()
        };
        assert!(policy.evaluate(&snapshot()).is_empty());
        assert!(AlertPolicy::default().evaluate(&MetricsSnapshot::default()).is_empty());
    }
}
