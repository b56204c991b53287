//! Audit records and their hash-linked envelopes.

use chrono::{DateTime, Utc};
use covenant_policy::{EvaluationResult, verify_proof_chain};
use covenant_primitives::{Action, AuditId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AuditError, AuditResult};

/// `previous_digest` of the first entry in a log.
pub const GENESIS_DIGEST: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An evaluated action together with its verdict.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    audit_id: AuditId,
    action: Action,
    result: EvaluationResult,
    recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Pairs an action with the result produced for it.
    #[must_use]
    pub fn new(action: Action, result: EvaluationResult) -> Self {
        Self {
            audit_id: result.audit_id(),
            action,
            result,
            recorded_at: Utc::now(),
        }
    }

    /// Returns the audit identifier, copied from the result.
    #[must_use]
    pub const fn audit_id(&self) -> AuditId {
        self.audit_id
    }

    /// Returns the evaluated action.
    #[must_use]
    pub const fn action(&self) -> &Action {
        &self.action
    }

    /// Returns the evaluation result.
    #[must_use]
    pub const fn result(&self) -> &EvaluationResult {
        &self.result
    }

    /// Returns when the record was created.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Recomputes the proof chain from the stored action and layer results.
    ///
    /// Results produced by an internal fault carry no chain and never
    /// verify.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Canonicalization`] when the stored values cannot
    /// be canonicalised.
    pub fn verify(&self) -> AuditResult<bool> {
        if self.result.proof_chain().is_empty() || self.result.action_id() != self.action.id() {
            return Ok(false);
        }
        verify_proof_chain(&self.action, self.result.layer_results(), self.result.proof_chain())
            .map_err(|err| AuditError::Canonicalization {
                reason: err.to_string(),
            })
    }
}

/// A record sealed into a log position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    sequence: u64,
    previous_digest: String,
    digest: String,
    record: AuditRecord,
}

#[derive(Serialize)]
struct Preimage<'a> {
    sequence: u64,
    previous_digest: &'a str,
    record: &'a AuditRecord,
}

fn entry_digest(sequence: u64, previous_digest: &str, record: &AuditRecord) -> AuditResult<String> {
    let canonical = serde_jcs::to_vec(&Preimage {
        sequence,
        previous_digest,
        record,
    })
    .map_err(|err| AuditError::Canonicalization {
        reason: err.to_string(),
    })?;
    Ok(hex::encode(Sha256::digest(canonical)))
}

impl AuditEntry {
    /// Seals `record` at `sequence`, linking it to the previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Canonicalization`] when the record cannot be
    /// canonicalised.
    pub fn seal(record: AuditRecord, sequence: u64, previous_digest: &str) -> AuditResult<Self> {
        let digest = entry_digest(sequence, previous_digest, &record)?;
        Ok(Self {
            sequence,
            previous_digest: previous_digest.to_owned(),
            digest,
            record,
        })
    }

    /// Returns the zero-based log position.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the digest of the preceding entry.
    #[must_use]
    pub fn previous_digest(&self) -> &str {
        &self.previous_digest
    }

    /// Returns this entry's digest.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Returns the sealed record.
    #[must_use]
    pub const fn record(&self) -> &AuditRecord {
        &self.record
    }

    fn check(&self) -> AuditResult<()> {
        let expected = entry_digest(self.sequence, &self.previous_digest, &self.record)?;
        if expected != self.digest {
            return Err(AuditError::Tampered {
                sequence: self.sequence,
                reason: "entry digest mismatch".into(),
            });
        }
        Ok(())
    }
}

/// Checks that `entries` form an unbroken chain.
///
/// The slice may start anywhere in a log, as returned by
/// [`AuditLog::tail`](crate::AuditLog::tail); only a slice starting at
/// sequence zero is checked against [`GENESIS_DIGEST`].
///
/// # Errors
///
/// Returns [`AuditError::Tampered`] naming the first inconsistent entry.
pub fn verify_entries(entries: &[AuditEntry]) -> AuditResult<()> {
    let mut previous: Option<&AuditEntry> = None;
    for entry in entries {
        entry.check()?;
        let linked = match previous {
            Some(prev) => prev.sequence + 1 == entry.sequence && prev.digest == entry.previous_digest,
            None => entry.sequence != 0 || entry.previous_digest == GENESIS_DIGEST,
        };
        if !linked {
            return Err(AuditError::Tampered {
                sequence: entry.sequence,
                reason: "broken link to previous entry".into(),
            });
        }
        previous = Some(entry);
    }
    Ok(())
}
