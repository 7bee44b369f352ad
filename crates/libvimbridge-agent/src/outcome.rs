use std::path::PathBuf;

use serde::Serialize;

/// Result of one caller-facing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpOutcome {
    pub ok: bool,
    pub message: String,
    /// Unified diff of everything this operation changed; empty if nothing
    pub diff: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Change records appended by this operation
    pub changes: usize,
    /// Message output captured from the editor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl OpOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            diff: String::new(),
            path: None,
            changes: 0,
            output: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_diff(mut self, diff: String, changes: usize) -> Self {
        self.diff = diff;
        self.changes = changes;
        self
    }

    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.output = output;
        self
    }

    pub fn changed(&self) -> bool {
        self.changes > 0
    }
}
