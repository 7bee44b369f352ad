use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SessionId;
use super::snapshot::BufferSnapshot;
use crate::diff;
use crate::error::BridgeError;

/// One tracked edit: the buffer before and after a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Position in the session's change log, starting at 1
    pub seq: u64,
    pub session_id: SessionId,
    pub path: PathBuf,
    pub before: Arc<BufferSnapshot>,
    pub after: Arc<BufferSnapshot>,
    pub recorded_at: DateTime<Utc>,
    /// Text of the command that produced the change
    pub command: String,
}

impl ChangeRecord {
    /// Create a record; both snapshots must come from the same session and file
    pub fn new(
        seq: u64,
        before: Arc<BufferSnapshot>,
        after: Arc<BufferSnapshot>,
        command: impl Into<String>,
    ) -> Result<Self, BridgeError> {
        if !before.same_origin(&after) {
            return Err(BridgeError::Internal(format!(
                "snapshot mismatch: before is {}@{}, after is {}@{}",
                before.path().display(),
                before.session_id().short(),
                after.path().display(),
                after.session_id().short(),
            )));
        }
        Ok(Self {
            seq,
            session_id: *before.session_id(),
            path: before.path().to_path_buf(),
            before,
            after,
            recorded_at: Utc::now(),
            command: command.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unified diff between the before and after snapshots
    pub fn diff(&self) -> String {
        self.diff_with_context(diff::DEFAULT_CONTEXT_LINES)
    }

    pub fn diff_with_context(&self, context_lines: usize) -> String {
        diff::unified_diff(
            &self.path,
            &self.before.text(),
            &self.after.text(),
            context_lines,
        )
    }

    /// Number of (added, removed) lines
    pub fn line_stats(&self) -> (usize, usize) {
        diff::line_stats(&self.before.text(), &self.after.text())
    }
}
