//! Caller-facing editing operations
//!
//! Every operation makes its target file current, starts tracking it, runs
//! its plan through the tracker, and reports the combined diff of the
//! records it appended. With `tracking.auto_write` the buffer is written
//! after an operation that changed it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libvimbridge_core::config::{BridgeConfig, TrackingConfig};
use libvimbridge_core::diff::{render_changes, unified_diff};
use libvimbridge_core::translate::{
    escape_path, normalize_path, plan_add_import, plan_at, plan_insert_after, EditAction, Intent,
    Translator,
};
use libvimbridge_core::{
    BridgeError, ChangeRecord, ChangeTracker, Changes, EditorChannel, EditorCommand,
};
use libvimbridge_rpc::Session;
use tracing::{debug, info};

use crate::executor::run_plan;
use crate::outcome::OpOutcome;

pub struct EditorAgent<C: EditorChannel> {
    channel: C,
    tracker: ChangeTracker,
    translator: Translator,
    tracking: TrackingConfig,
    /// Relative paths are resolved against this directory
    root: PathBuf,
}

impl EditorAgent<Session> {
    /// Connect to the editor server named by `config`
    pub fn connect(
        config: &BridgeConfig,
        translator: Translator,
        root: impl Into<PathBuf>,
    ) -> Result<Self, BridgeError> {
        let session = Session::connect(&config.endpoint(), &config.rpc)?;
        Ok(Self::new(session, translator, config.tracking.clone(), root))
    }

    pub fn close(&self) -> Result<(), BridgeError> {
        self.channel.close()
    }
}

impl<C: EditorChannel> EditorAgent<C> {
    pub fn new(
        channel: C,
        translator: Translator,
        tracking: TrackingConfig,
        root: impl Into<PathBuf>,
    ) -> Self {
        let tracker = ChangeTracker::new(*channel.session_id());
        Self {
            channel,
            tracker,
            translator,
            tracking,
            root: root.into(),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Absolute form of `path` as the editor names its buffer
    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.root.join(path))
        }
    }

    /// Make `path` the current file and track it
    fn focus(&mut self, path: &Path) -> Result<(), BridgeError> {
        if self.channel.current_file()?.as_deref() != Some(path) {
            self.channel
                .send_command(&EditorCommand::ex(format!("edit {}", escape_path(path))))?;
        }
        self.tracker.begin_tracking(&self.channel, path)?;
        Ok(())
    }

    /// Write the current buffer when auto-write is on and something changed
    fn finish(
        &self,
        path: &Path,
        records: &[Arc<ChangeRecord>],
        message: String,
    ) -> Result<OpOutcome, BridgeError> {
        if !records.is_empty() && self.tracking.auto_write {
            self.channel.send_command(&EditorCommand::ex("write"))?;
        }
        Ok(self.outcome(path, records, message))
    }

    fn outcome(&self, path: &Path, records: &[Arc<ChangeRecord>], message: String) -> OpOutcome {
        let diff = match (records.first(), records.last()) {
            (Some(first), Some(last)) => unified_diff(
                path,
                &first.before.text(),
                &last.after.text(),
                self.tracking.context_lines,
            ),
            _ => String::new(),
        };
        info!(path = %path.display(), changes = records.len(), "{}", message);
        OpOutcome::success(message)
            .with_path(path)
            .with_diff(diff, records.len())
    }

    /// Open `path` in the editor and start tracking it
    pub fn open(&mut self, path: &Path) -> Result<OpOutcome, BridgeError> {
        let path = self.absolute(path);
        self.focus(&path)?;
        let lines = self
            .tracker
            .baseline(&path)
            .map(|b| b.lines().len())
            .unwrap_or_default();
        Ok(OpOutcome::success(format!("Opened {} ({} lines)", path.display(), lines)).with_path(path))
    }

    /// Create (or overwrite) `path` with `content` and write it to disk
    pub fn create_file(&mut self, path: &Path, content: &str) -> Result<OpOutcome, BridgeError> {
        let path = self.absolute(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.focus(&path)?;

        let lines: Vec<String> = if content.is_empty() {
            Vec::new()
        } else {
            content
                .trim_end_matches('\n')
                .split('\n')
                .map(String::from)
                .collect()
        };
        let records: Vec<_> = self
            .tracker
            .record(&self.channel, &EditorCommand::replace_all(lines))?
            .into_iter()
            .collect();
        // A new file is written even without auto-write
        self.channel.send_command(&EditorCommand::ex("write"))?;
        let message = format!("Created {}", path.display());
        Ok(self.outcome(&path, &records, message))
    }

    /// Navigate to function `name`, replacing it with `new_content` if given
    pub fn edit_function(
        &mut self,
        name: &str,
        file: Option<&Path>,
        new_content: Option<&str>,
    ) -> Result<OpOutcome, BridgeError> {
        let intent = Intent::function(name, file.map(|f| self.absolute(f)));
        self.edit_declaration(intent, new_content)
    }

    /// Navigate to class `class`, or to its method `method`, replacing the
    /// block with `new_content` if given
    pub fn edit_class(
        &mut self,
        class: &str,
        method: Option<&str>,
        file: Option<&Path>,
        new_content: Option<&str>,
    ) -> Result<OpOutcome, BridgeError> {
        let file = file.map(|f| self.absolute(f));
        let intent = match method {
            Some(method) => Intent::method(class, method, file),
            None => Intent::class(class, file),
        };
        self.edit_declaration(intent, new_content)
    }

    fn edit_declaration(
        &mut self,
        intent: Intent,
        new_content: Option<&str>,
    ) -> Result<OpOutcome, BridgeError> {
        intent.target.validate()?;
        let mut location = self.translator.resolve(&intent)?;
        location.path = self.absolute(&location.path);
        debug!(intent = %intent.target, location = %location, resolver = self.translator.resolver_name(), "Resolved");

        let path = location.path.clone();
        self.focus(&path)?;
        let action = match new_content {
            Some(content) => EditAction::ReplaceBlock(content.to_string()),
            None => EditAction::Navigate,
        };
        let plan = plan_at(location, action, Some(&path));
        let records = run_plan(&mut self.tracker, &self.channel, &plan)?;

        let kind = intent.target.kind();
        let message = match (new_content, records.is_empty()) {
            (None, _) => format!("Moved to {} {}", kind, intent.target),
            (Some(_), false) => format!("Replaced {} {}", kind, intent.target),
            (Some(_), true) => format!("{} {} already up to date", kind, intent.target),
        };
        self.finish(&path, &records, message)
    }

    /// Add `statement` after the last import of `path`. An import that is
    /// already present is a success with no change.
    pub fn add_import(&mut self, path: &Path, statement: &str) -> Result<OpOutcome, BridgeError> {
        let path = self.absolute(path);
        self.focus(&path)?;
        let buffer = self.channel.read_buffer(&path)?;

        let Some(plan) = plan_add_import(&path, statement, &buffer, Some(&path)) else {
            return Ok(OpOutcome::success(format!(
                "Import '{}' already present in {}",
                statement.trim(),
                path.display()
            ))
            .with_path(path));
        };
        let records = run_plan(&mut self.tracker, &self.channel, &plan)?;
        let message = format!("Added '{}' to {}", statement.trim(), path.display());
        self.finish(&path, &records, message)
    }

    /// Insert `content` below the first line matching `pattern`
    pub fn insert_after_pattern(
        &mut self,
        path: &Path,
        pattern: &str,
        content: &str,
    ) -> Result<OpOutcome, BridgeError> {
        let path = self.absolute(path);
        self.focus(&path)?;
        let plan = plan_insert_after(&path, pattern, content, Some(&path));
        let records = run_plan(&mut self.tracker, &self.channel, &plan)?;
        let message = format!("Inserted after /{}/ in {}", pattern, path.display());
        self.finish(&path, &records, message)
    }

    /// Send raw command text: `:cmd` for Ex, anything else as keys
    pub fn execute(&mut self, raw: &str) -> Result<OpOutcome, BridgeError> {
        self.execute_command(&EditorCommand::parse(raw))
    }

    /// Send one command, tracking the current file if it is named
    pub fn execute_command(&mut self, command: &EditorCommand) -> Result<OpOutcome, BridgeError> {
        if let Some(current) = self.channel.current_file()? {
            self.tracker.begin_tracking(&self.channel, &current)?;
        }

        let (result, record) = self.tracker.submit(&self.channel, command)?;
        let records: Vec<_> = record.into_iter().collect();
        let message = format!("Executed {}", command);
        match self.channel.current_file()? {
            Some(path) => Ok(self.finish(&path, &records, message)?.with_output(result.output)),
            None => Ok(OpOutcome::success(message).with_output(result.output)),
        }
    }

    /// Changes recorded in this session, optionally for one file
    pub fn get_changes(&self, file: Option<&Path>) -> Changes {
        let file = file.map(|f| self.absolute(f));
        self.tracker.changes(file.as_deref())
    }

    /// Rendered diffs of the recorded changes
    pub fn diff_changes(&self, file: Option<&Path>) -> String {
        render_changes(self.get_changes(file), self.tracking.context_lines)
    }

    /// Drop the change log; returns how many records were dropped
    pub fn reset_changes(&mut self) -> usize {
        let dropped = self.tracker.len();
        self.tracker.reset();
        dropped
    }
}
