//! Append-only audit log of completed runs.
//!
//! Each successful question produces one JSON object on its own line:
//! `{"question": ..., "sql": ..., "rows": ..., "timestamp": ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{AskError, Result};

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    /// The question as asked.
    pub question: String,
    /// The exact statement that was executed.
    pub sql: String,
    /// Number of rows returned.
    pub rows: usize,
    /// When the run completed. Older logs may lack it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl QueryLogEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(question: impl Into<String>, sql: impl Into<String>, rows: usize) -> Self {
        Self {
            question: question.into(),
            sql: sql.into(),
            rows,
            timestamp: Some(Utc::now()),
        }
    }
}

/// JSON-lines audit file.
///
/// Appends are serialized through an in-process lock and each entry is written
/// with a single `write_all` on a file opened in append mode, so concurrent runs
/// never interleave within a line.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    /// Creates a log writing to `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry as a single line.
    pub async fn append(&self, entry: &QueryLogEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| AskError::audit(format!("Failed to serialize log entry: {e}")))?;
        line.push('\n');

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AskError::audit(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AskError::audit(format!("Failed to open {}: {e}", self.path.display())))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AskError::audit(format!("Failed to write log entry: {e}")))?;
        file.flush()
            .await
            .map_err(|e| AskError::audit(format!("Failed to flush log entry: {e}")))?;

        debug!("Appended audit entry to {}", self.path.display());
        Ok(())
    }

    /// Returns the last `limit` well-formed entries, oldest first.
    ///
    /// A missing file yields no entries. Malformed lines are skipped.
    pub async fn tail(&self, limit: usize) -> Result<Vec<QueryLogEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AskError::audit(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let mut entries: Vec<QueryLogEntry> = content
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping malformed audit line: {}", e);
                    None
                }
            })
            .take(limit)
            .collect();

        entries.reverse();
        Ok(entries)
    }
}
