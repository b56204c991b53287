//! Append-only audit log persisted as newline-delimited JSON.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use covenant_primitives::AuditId;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::record::{AuditEntry, AuditRecord, GENESIS_DIGEST, verify_entries};
use crate::{AuditLog, AuditResult};

#[derive(Debug)]
struct Head {
    file: fs::File,
    next_sequence: u64,
    last_digest: String,
}

/// File-backed audit log; one JSON entry per line.
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    head: Mutex<Head>,
}

impl FileAuditLog {
    /// Opens (or creates) a log file, verifying any entries already present.
    ///
    /// # Errors
    ///
    /// Propagates I/O and serialization errors, and returns
    /// [`AuditError::Tampered`](crate::AuditError::Tampered) when existing
    /// entries do not chain.
    pub async fn open(path: impl Into<PathBuf>) -> AuditResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .await?;

        let existing = read_entries(&path).await?;
        verify_entries(&existing)?;
        let (next_sequence, last_digest) = existing.last().map_or_else(
            || (0, GENESIS_DIGEST.to_owned()),
            |last| (last.sequence() + 1, last.digest().to_owned()),
        );
        debug!(path = %path.display(), entries = existing.len(), "opened audit log");

        Ok(Self {
            path,
            head: Mutex::new(Head {
                file,
                next_sequence,
                last_digest,
            }),
        })
    }

    /// Returns the underlying path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and verifies every entry in the file.
    ///
    /// # Errors
    ///
    /// Propagates I/O and serialization errors, and returns
    /// [`AuditError::Tampered`](crate::AuditError::Tampered) for a broken
    /// chain.
    pub async fn verify(&self) -> AuditResult<usize> {
        let _guard = self.head.lock().await;
        let entries = read_entries(&self.path).await?;
        verify_entries(&entries)?;
        Ok(entries.len())
    }
}

async fn read_entries(path: &Path) -> AuditResult<Vec<AuditEntry>> {
    let data = fs::read(path).await?;
    let mut entries = Vec::new();
    for chunk in data
        .split(|byte| *byte == b'\n')
        .filter(|chunk| !chunk.is_empty())
    {
        entries.push(serde_json::from_slice(chunk)?);
    }
    Ok(entries)
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, record: AuditRecord) -> AuditResult<AuditEntry> {
        let mut head = self.head.lock().await;
        let entry = AuditEntry::seal(record, head.next_sequence, &head.last_digest)?;
        let line = serde_json::to_vec(&entry)?;
        head.file.write_all(&line).await?;
        head.file.write_u8(b'\n').await?;
        head.file.flush().await?;
        head.next_sequence += 1;
        head.last_digest = entry.digest().to_owned();
        Ok(entry)
    }

    async fn tail(&self, limit: usize) -> AuditResult<Vec<AuditEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let _guard = self.head.lock().await;
        let entries = read_entries(&self.path).await?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).collect())
    }

    async fn find(&self, audit_id: AuditId) -> AuditResult<Option<AuditEntry>> {
        let _guard = self.head.lock().await;
        let entries = read_entries(&self.path).await?;
        Ok(entries
            .into_iter()
            .rev()
            .find(|entry| entry.record().audit_id() == audit_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditError;
    use crate::record::tests::record;

    #[tokio::test]
    async fn append_tail_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("log.ndjson");
        let log = FileAuditLog::open(&path).await.unwrap();

        let mut ids = Vec::new();
        for harm in [0, 1, 0] {
            let entry = log.append(record(harm).await).await.unwrap();
            ids.push(entry.record().audit_id());
        }

        let tail = log.tail(2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence(), 1);
        assert!(!tail[0].record().result().is_allowed());
        assert_eq!(tail[1].sequence(), 2);

        let found = log.find(ids[1]).await.unwrap().unwrap();
        assert_eq!(found.sequence(), 1);
        assert!(found.record().verify().unwrap());
        assert!(log.find(covenant_primitives::AuditId::random()).await.unwrap().is_none());
        assert_eq!(log.verify().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reopen_continues_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.ndjson");
        {
            let log = FileAuditLog::open(&path).await.unwrap();
            log.append(record(0).await).await.unwrap();
        }
        let log = FileAuditLog::open(&path).await.unwrap();
        let entry = log.append(record(1).await).await.unwrap();
        assert_eq!(entry.sequence(), 1);
        assert_eq!(log.verify().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn edited_file_is_rejected_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.ndjson");
        {
            let log = FileAuditLog::open(&path).await.unwrap();
            log.append(record(1).await).await.unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("\"is_allowed\":false", "\"is_allowed\":true")).unwrap();

        assert!(matches!(
            FileAuditLog::open(&path).await,
            Err(AuditError::Tampered { sequence: 0, .. })
        ));
    }
}
