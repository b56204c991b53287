//! Audit persistence for evaluation results.
//!
//! The engine never writes audit records itself. Callers pair each
//! [`EvaluationResult`](covenant_policy::EvaluationResult) with its action in
//! an [`AuditRecord`] and append it to an [`AuditLog`], which seals it into a
//! hash-linked [`AuditEntry`].

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod journal;
mod record;
mod volatile;

use async_trait::async_trait;
use covenant_primitives::AuditId;

pub use error::{AuditError, AuditResult};
pub use journal::FileAuditLog;
pub use record::{AuditEntry, AuditRecord, GENESIS_DIGEST, verify_entries};
pub use volatile::MemoryAuditLog;

/// Append-only store of sealed audit entries.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Seals a record at the next position and stores it.
    async fn append(&self, record: AuditRecord) -> AuditResult<AuditEntry>;

    /// Returns the most recent `limit` entries, ordered oldest to newest.
    async fn tail(&self, limit: usize) -> AuditResult<Vec<AuditEntry>>;

    /// Returns the entry carrying `audit_id`, if retained.
    async fn find(&self, audit_id: AuditId) -> AuditResult<Option<AuditEntry>>;
}
