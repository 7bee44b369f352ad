//! Per-session change tracking
//!
//! The tracker holds one baseline snapshot per tracked file and an ordered log
//! of change records. A command that leaves the current file unchanged, or
//! targets an untracked file, records nothing. A command or snapshot failure
//! leaves both the log and the baselines untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::channel::EditorChannel;
use crate::error::BridgeError;
use crate::types::{BufferSnapshot, ChangeRecord, CommandResult, EditorCommand, SessionId};

/// Change log for one editor session
#[derive(Debug)]
pub struct ChangeTracker {
    session_id: SessionId,
    baselines: HashMap<PathBuf, Arc<BufferSnapshot>>,
    /// Shared with outstanding `Changes` iterators; appends copy on write
    log: Arc<Vec<Arc<ChangeRecord>>>,
    next_seq: u64,
}

impl ChangeTracker {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            baselines: HashMap::new(),
            log: Arc::new(Vec::new()),
            next_seq: 1,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Take the baseline snapshot for `path`. Tracking an already tracked
    /// file keeps its current baseline.
    pub fn begin_tracking<C: EditorChannel>(
        &mut self,
        channel: &C,
        path: &Path,
    ) -> Result<Arc<BufferSnapshot>, BridgeError> {
        self.check_session(channel)?;
        if let Some(baseline) = self.baselines.get(path) {
            return Ok(Arc::clone(baseline));
        }

        let snapshot = Arc::new(channel.read_buffer(path)?);
        debug!(
            session = %self.session_id.short(),
            path = %path.display(),
            lines = snapshot.lines().len(),
            "Tracking file"
        );
        self.baselines
            .insert(path.to_path_buf(), Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn is_tracking(&self, path: &Path) -> bool {
        self.baselines.contains_key(path)
    }

    pub fn baseline(&self, path: &Path) -> Option<&Arc<BufferSnapshot>> {
        self.baselines.get(path)
    }

    pub fn tracked_files(&self) -> impl Iterator<Item = &Path> {
        self.baselines.keys().map(PathBuf::as_path)
    }

    /// Send `command` and record the resulting change to the current file.
    ///
    /// Returns the new record, or `None` when nothing observable changed.
    pub fn record<C: EditorChannel>(
        &mut self,
        channel: &C,
        command: &EditorCommand,
    ) -> Result<Option<Arc<ChangeRecord>>, BridgeError> {
        self.submit(channel, command).map(|(_, record)| record)
    }

    /// Like `record`, also returning the editor's result for the command
    pub fn submit<C: EditorChannel>(
        &mut self,
        channel: &C,
        command: &EditorCommand,
    ) -> Result<(CommandResult, Option<Arc<ChangeRecord>>), BridgeError> {
        self.check_session(channel)?;

        let result = channel.send_command(command)?;

        let Some(path) = channel.current_file()? else {
            trace!(command = %command, "No current file after command");
            return Ok((result, None));
        };
        let Some(baseline) = self.baselines.get(&path).cloned() else {
            trace!(command = %command, path = %path.display(), "Current file is not tracked");
            return Ok((result, None));
        };

        let after = channel.read_buffer(&path)?;
        if after.same_content(&baseline) {
            trace!(command = %command, path = %path.display(), "No change");
            return Ok((result, None));
        }

        let after = Arc::new(after);
        let record = Arc::new(ChangeRecord::new(
            self.next_seq,
            baseline,
            Arc::clone(&after),
            command.to_string(),
        )?);
        self.next_seq += 1;
        self.baselines.insert(path, after);
        Arc::make_mut(&mut self.log).push(Arc::clone(&record));

        let (added, removed) = record.line_stats();
        debug!(
            session = %self.session_id.short(),
            seq = record.seq,
            path = %record.path.display(),
            added,
            removed,
            "Recorded change"
        );
        Ok((result, Some(record)))
    }

    /// Changes recorded so far, optionally for one file only.
    ///
    /// The iterator sees the log as of this call; later records are not
    /// included.
    pub fn changes(&self, file: Option<&Path>) -> Changes {
        Changes {
            log: Arc::clone(&self.log),
            file: file.map(Path::to_path_buf),
            pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Drop the change log. Baselines stay at the latest known content.
    pub fn reset(&mut self) {
        debug!(session = %self.session_id.short(), dropped = self.log.len(), "Reset change log");
        self.log = Arc::new(Vec::new());
    }

    fn check_session<C: EditorChannel>(&self, channel: &C) -> Result<(), BridgeError> {
        if channel.session_id() != &self.session_id {
            return Err(BridgeError::Session(format!(
                "tracker for session {} cannot observe session {}",
                self.session_id.short(),
                channel.session_id().short()
            )));
        }
        Ok(())
    }
}

/// Lazy, restartable iterator over a change log
#[derive(Debug, Clone)]
pub struct Changes {
    log: Arc<Vec<Arc<ChangeRecord>>>,
    file: Option<PathBuf>,
    pos: usize,
}

impl Changes {
    /// A fresh iterator over the same records
    pub fn restart(&self) -> Self {
        Self {
            pos: 0,
            ..self.clone()
        }
    }
}

impl Iterator for Changes {
    type Item = Arc<ChangeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(record) = self.log.get(self.pos) {
            self.pos += 1;
            match &self.file {
                Some(file) if record.path() != file.as_path() => continue,
                _ => return Some(Arc::clone(record)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommandResult;
    use std::cell::RefCell;

    /// Minimal in-memory channel: `:edit` switches buffers, `SetLines`
    /// replaces the current buffer, `:fail` is rejected.
    struct StubChannel {
        id: SessionId,
        buffers: RefCell<HashMap<PathBuf, Vec<String>>>,
        current: RefCell<Option<PathBuf>>,
        fail_reads: RefCell<bool>,
    }

    impl StubChannel {
        fn new() -> Self {
            Self {
                id: SessionId::generate(),
                buffers: RefCell::new(HashMap::new()),
                current: RefCell::new(None),
                fail_reads: RefCell::new(false),
            }
        }
    }

    impl EditorChannel for StubChannel {
        fn session_id(&self) -> &SessionId {
            &self.id
        }

        fn send_command(&self, command: &EditorCommand) -> Result<CommandResult, BridgeError> {
            match command {
                EditorCommand::Ex(cmd) if cmd == "fail" => {
                    Err(BridgeError::command(command, "E492: Not an editor command"))
                }
                EditorCommand::Ex(cmd) => {
                    if let Some(path) = cmd.strip_prefix("edit ") {
                        let path = PathBuf::from(path);
                        self.buffers.borrow_mut().entry(path.clone()).or_default();
                        *self.current.borrow_mut() = Some(path);
                    }
                    Ok(CommandResult::empty())
                }
                EditorCommand::Keys(_) => Ok(CommandResult::empty()),
                EditorCommand::SetLines { lines, .. } => {
                    let current = self.current.borrow().clone();
                    if let Some(path) = current {
                        self.buffers.borrow_mut().insert(path, lines.clone());
                    }
                    Ok(CommandResult::empty())
                }
            }
        }

        fn read_buffer(&self, path: &Path) -> Result<BufferSnapshot, BridgeError> {
            if *self.fail_reads.borrow() {
                return Err(BridgeError::Session("connection lost".to_string()));
            }
            let lines = self
                .buffers
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| BridgeError::command("read", "no such buffer"))?;
            Ok(BufferSnapshot::new(self.id, path, lines, None))
        }

        fn current_file(&self) -> Result<Option<PathBuf>, BridgeError> {
            Ok(self.current.borrow().clone())
        }
    }

    fn set(lines: &[&str]) -> EditorCommand {
        EditorCommand::replace_all(lines.iter().map(|s| s.to_string()).collect())
    }

    fn tracked(path: &str) -> (StubChannel, ChangeTracker) {
        let channel = StubChannel::new();
        let mut tracker = ChangeTracker::new(channel.id);
        tracker
            .record(&channel, &EditorCommand::ex(format!("edit {}", path)))
            .unwrap();
        tracker.begin_tracking(&channel, Path::new(path)).unwrap();
        (channel, tracker)
    }

    #[test]
    fn test_identical_command_records_once() {
        let (channel, mut tracker) = tracked("a.py");

        let first = tracker.record(&channel, &set(&["hello"])).unwrap();
        let second = tracker.record(&channel, &set(&["hello"])).unwrap();

        let first = first.unwrap();
        assert_eq!(first.seq, 1);
        assert!(first.diff().contains("+hello"));
        assert!(second.is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_no_op_commands_record_nothing() {
        let (channel, mut tracker) = tracked("a.py");
        for cmd in [EditorCommand::escape(), EditorCommand::ex("1"), set(&[])] {
            assert!(tracker.record(&channel, &cmd).unwrap().is_none());
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_untracked_file_records_nothing() {
        let channel = StubChannel::new();
        let mut tracker = ChangeTracker::new(channel.id);
        tracker.record(&channel, &EditorCommand::ex("edit b.py")).unwrap();
        assert!(tracker.record(&channel, &set(&["x"])).unwrap().is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_failed_command_leaves_state_untouched() {
        let (channel, mut tracker) = tracked("a.py");
        let err = tracker.record(&channel, &EditorCommand::ex("fail")).unwrap_err();
        assert!(err.is_command_rejection());
        assert!(tracker.is_empty());
        assert!(tracker.baseline(Path::new("a.py")).unwrap().is_empty());
    }

    #[test]
    fn test_failed_snapshot_leaves_baseline() {
        let (channel, mut tracker) = tracked("a.py");
        *channel.fail_reads.borrow_mut() = true;
        assert!(tracker.record(&channel, &set(&["x"])).is_err());
        assert!(tracker.is_empty());
        assert!(tracker.baseline(Path::new("a.py")).unwrap().is_empty());

        // The next successful read diffs against the old baseline
        *channel.fail_reads.borrow_mut() = false;
        let record = tracker.record(&channel, &set(&["x"])).unwrap().unwrap();
        assert!(record.before.is_empty());
    }

    #[test]
    fn test_records_keep_submission_order() {
        let (channel, mut tracker) = tracked("a.py");
        for text in ["one", "two", "three"] {
            tracker.record(&channel, &set(&[text])).unwrap();
        }
        let seqs: Vec<u64> = tracker.changes(None).map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);

        // Each record starts where the previous one ended
        let records: Vec<_> = tracker.changes(None).collect();
        for pair in records.windows(2) {
            assert!(pair[0].after.same_content(&pair[1].before));
        }
    }

    #[test]
    fn test_changes_iterator_is_restartable_snapshot() {
        let (channel, mut tracker) = tracked("a.py");
        tracker.record(&channel, &set(&["one"])).unwrap();

        let changes = tracker.changes(None);
        tracker.record(&channel, &set(&["two"])).unwrap();

        assert_eq!(changes.clone().count(), 1);
        assert_eq!(changes.restart().count(), 1);
        assert_eq!(tracker.changes(None).count(), 2);
    }

    #[test]
    fn test_changes_filtered_by_file() {
        let (channel, mut tracker) = tracked("a.py");
        tracker.record(&channel, &set(&["a"])).unwrap();
        tracker.record(&channel, &EditorCommand::ex("edit b.py")).unwrap();
        tracker.begin_tracking(&channel, Path::new("b.py")).unwrap();
        tracker.record(&channel, &set(&["b"])).unwrap();

        assert_eq!(tracker.changes(Some(Path::new("a.py"))).count(), 1);
        assert_eq!(tracker.changes(Some(Path::new("b.py"))).count(), 1);
        assert_eq!(tracker.changes(Some(Path::new("c.py"))).count(), 0);
    }

    #[test]
    fn test_foreign_session_is_rejected() {
        let (_, mut tracker) = tracked("a.py");
        let other = StubChannel::new();
        let err = tracker.record(&other, &set(&["x"])).unwrap_err();
        assert!(matches!(err, BridgeError::Session(_)));
    }

    #[test]
    fn test_reset_keeps_baselines() {
        let (channel, mut tracker) = tracked("a.py");
        tracker.record(&channel, &set(&["one"])).unwrap();
        tracker.reset();
        assert!(tracker.is_empty());
        assert!(tracker.record(&channel, &set(&["one"])).unwrap().is_none());
    }
}
