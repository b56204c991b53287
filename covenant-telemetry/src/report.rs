//! Compliance reports derived from metrics snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::MetricsSnapshot;

/// Provider string stamped on every report.
pub const PROVIDER: &str = concat!("covenant ", env!("CARGO_PKG_VERSION"));

/// Bundle name used when the caller does not scope the report.
pub const DEFAULT_BUNDLE: &str = "all";

/// Overall verdict of a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// No evaluation was blocked by a hard layer.
    Compliant,
    /// At least one evaluation was blocked by a hard layer.
    NonCompliant,
}

/// Point-in-time compliance summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Reporting system.
    pub provider: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Constraint bundle the report covers.
    pub bundle: String,
    /// `(total - hard) / total * 100`, or `100` before any evaluation.
    pub compliance_score: f64,
    /// Evaluations recorded.
    pub total_evaluations: u64,
    /// Evaluations blocked by a hard layer.
    pub hard_violations: u64,
    /// Violations recorded by soft layers.
    pub soft_violations: u64,
    /// Rolling mean of overall scores.
    pub average_score: f64,
    /// Rolling mean of latencies.
    pub average_latency_ms: f64,
    /// Per-layer invocation counts.
    pub layer_statistics: BTreeMap<String, u64>,
    /// Overall verdict.
    pub status: ComplianceStatus,
}

impl ComplianceReport {
    /// Builds a report from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &MetricsSnapshot, bundle: Option<&str>) -> Self {
        let total = snapshot.total_evaluations;
        let hard = snapshot.hard_violations;
        #[allow(clippy::cast_precision_loss)]
        let compliance_score = if total == 0 {
            100.0
        } else {
            (total - hard.min(total)) as f64 / total as f64 * 100.0
        };

        Self {
            provider: PROVIDER.to_owned(),
            generated_at: Utc::now(),
            bundle: bundle.unwrap_or(DEFAULT_BUNDLE).to_owned(),
            compliance_score,
            total_evaluations: total,
            hard_violations: hard,
            soft_violations: snapshot.soft_violations,
            average_score: snapshot.average_score,
            average_latency_ms: snapshot.average_latency_ms,
            layer_statistics: snapshot.layer_invocations.clone(),
            status: if hard == 0 {
                ComplianceStatus::Compliant
            } else {
                ComplianceStatus::NonCompliant
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_is_fully_compliant() {
        let report = ComplianceReport::from_snapshot(&MetricsSnapshot::default(), None);
        assert!((report.compliance_score - 100.0).abs() < f64::EPSILON);
        assert_eq!(report.bundle, "all");
        assert_eq!(report.status, ComplianceStatus::Compliant);
    }

    #[test]
    fn hard_violations_reduce_score() {
        let snapshot = MetricsSnapshot {
            total_evaluations: 4,
            hard_violations: 1,
            ..MetricsSnapshot::default()
        };
        let report = ComplianceReport::from_snapshot(&snapshot, Some("gdpr"));
        assert!((report.compliance_score - 75.0).abs() < 1e-12);
        assert_eq!(report.status, ComplianceStatus::NonCompliant);
        assert_eq!(report.bundle, "gdpr");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "non_compliant");
    }
}
