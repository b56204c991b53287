//! In-memory audit log backed by a bounded ring buffer.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use async_trait::async_trait;
use covenant_primitives::AuditId;
use tokio::sync::RwLock;

use crate::record::{AuditEntry, AuditRecord, GENESIS_DIGEST};
use crate::{AuditLog, AuditResult};

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(255);

#[derive(Debug)]
struct Ring {
    entries: VecDeque<AuditEntry>,
    next_sequence: u64,
    last_digest: String,
}

/// Audit log retaining only the most recent entries.
///
/// Sequence numbers and digests keep counting across evictions, so the
/// retained window still chains.
#[derive(Debug)]
pub struct MemoryAuditLog {
    capacity: NonZeroUsize,
    inner: RwLock<Ring>,
}

impl MemoryAuditLog {
    /// Creates a log retaining at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Ring {
                entries: VecDeque::with_capacity(capacity.get()),
                next_sequence: 0,
                last_digest: GENESIS_DIGEST.to_owned(),
            }),
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Returns the number of retained entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Returns `true` when no entry is retained.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, record: AuditRecord) -> AuditResult<AuditEntry> {
        let mut guard = self.inner.write().await;
        let entry = AuditEntry::seal(record, guard.next_sequence, &guard.last_digest)?;
        guard.next_sequence += 1;
        guard.last_digest = entry.digest().to_owned();
        guard.entries.push_back(entry.clone());
        while guard.entries.len() > self.capacity.get() {
            guard.entries.pop_front();
        }
        Ok(entry)
    }

    async fn tail(&self, limit: usize) -> AuditResult<Vec<AuditEntry>> {
        let guard = self.inner.read().await;
        let skip = guard.entries.len().saturating_sub(limit);
        Ok(guard.entries.iter().skip(skip).cloned().collect())
    }

    async fn find(&self, audit_id: AuditId) -> AuditResult<Option<AuditEntry>> {
        let guard = self.inner.read().await;
        Ok(guard
            .entries
            .iter()
            .rev()
            .find(|entry| entry.record().audit_id() == audit_id)
            .cloned())
    }
}
