//! Observability for the Covenant engine.
//!
//! [`MetricsAggregator`] keeps rolling counters across evaluations,
//! [`ComplianceReport`] and [`AlertPolicy`] interpret its snapshots, and
//! [`tracing_support`] installs the process-wide subscriber.

#![warn(missing_docs, clippy::pedantic)]

mod alerts;
mod error;
mod metrics;
mod report;
pub mod tracing_support;

pub use alerts::{Alert, AlertPolicy, AlertSeverity};
pub use error::{TelemetryError, TelemetryResult};
pub use metrics::{EvaluationSample, MetricsAggregator, MetricsSnapshot};
pub use report::{ComplianceReport, ComplianceStatus, DEFAULT_BUNDLE, PROVIDER};
