//! Change journal
//!
//! Every CLI invocation opens a fresh session with its own change tracker.
//! The journal carries change records across invocations in
//! `<state_dir>/changes.json`, renumbered into one continuous sequence.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libvimbridge_core::diff::render_changes;
use libvimbridge_core::{BridgeError, ChangeRecord};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

pub const JOURNAL_FILE: &str = "changes.json";
const JOURNAL_VERSION: u32 = 1;

#[derive(Serialize)]
struct JournalOut<'a> {
    version: u32,
    records: &'a [ChangeRecord],
}

#[derive(Deserialize)]
struct JournalIn {
    version: u32,
    #[serde(default)]
    records: Vec<ChangeRecord>,
}

#[derive(Debug)]
pub struct ChangeJournal {
    path: PathBuf,
    records: Vec<ChangeRecord>,
}

impl ChangeJournal {
    /// Load the journal from `state_dir`; empty when none was written yet
    pub fn load(state_dir: &Path) -> Result<Self, BridgeError> {
        let path = state_dir.join(JOURNAL_FILE);
        let records = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let journal: JournalIn = serde_json::from_str(&contents)?;
            if journal.version > JOURNAL_VERSION {
                return Err(BridgeError::Config(format!(
                    "{} has version {}, newer than supported version {}",
                    path.display(),
                    journal.version,
                    JOURNAL_VERSION
                )));
            }
            journal.records
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), records = records.len(), "Loaded change journal");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in order, optionally for one file only
    pub fn records(&self, file: Option<&Path>) -> impl Iterator<Item = &ChangeRecord> + '_ {
        let file = file.map(Path::to_path_buf);
        self.records
            .iter()
            .filter(move |r| file.as_deref().map_or(true, |f| r.path() == f))
    }

    /// Append records, continuing the journal's sequence numbers
    pub fn append<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = Arc<ChangeRecord>>,
    {
        let mut added = 0;
        for record in records {
            let mut record = (*record).clone();
            record.seq = self.records.last().map_or(1, |r| r.seq + 1);
            self.records.push(record);
            added += 1;
        }
        added
    }

    /// Drop all records; returns how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.records.len();
        self.records.clear();
        dropped
    }

    /// Unified diffs of the journaled records
    pub fn render(&self, file: Option<&Path>, context_lines: usize) -> String {
        render_changes(self.records(file).cloned().map(Arc::new), context_lines)
    }

    /// Write the journal atomically
    pub fn save(&self) -> Result<(), BridgeError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| BridgeError::Internal("journal path has no parent".to_string()))?;
        fs::create_dir_all(dir)?;

        let tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(
            &tmp,
            &JournalOut {
                version: JOURNAL_VERSION,
                records: &self.records,
            },
        )?;
        tmp.persist(&self.path).map_err(|e| BridgeError::Io(e.error))?;
        debug!(path = %self.path.display(), records = self.records.len(), "Saved change journal");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libvimbridge_core::diff::{apply_patch, NO_CHANGES};
    use libvimbridge_core::{BufferSnapshot, SessionId};
    use tempfile::TempDir;

    fn record(session: SessionId, path: &str, before: &str, after: &str) -> Arc<ChangeRecord> {
        let snap = |text: &str| {
            Arc::new(BufferSnapshot::new(
                session,
                path,
                text.lines().map(String::from).collect(),
                None,
            ))
        };
        Arc::new(ChangeRecord::new(1, snap(before), snap(after), "ihello<Esc>").unwrap())
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let temp = TempDir::new().unwrap();
        let journal = ChangeJournal::load(temp.path()).unwrap();
        assert!(journal.is_empty());
        assert_eq!(journal.render(None, 3), NO_CHANGES);
    }

    #[test]
    fn test_append_renumbers_and_persists() {
        let temp = TempDir::new().unwrap();
        let first = SessionId::generate();
        let second = SessionId::generate();

        let mut journal = ChangeJournal::load(temp.path()).unwrap();
        journal.append(vec![record(first, "/w/a.py", "", "hello")]);
        journal.save().unwrap();

        let mut journal = ChangeJournal::load(temp.path()).unwrap();
        journal.append(vec![
            record(second, "/w/a.py", "hello", "hello\nworld"),
            record(second, "/w/b.py", "", "x = 1"),
        ]);
        journal.save().unwrap();

        let journal = ChangeJournal::load(temp.path()).unwrap();
        let seqs: Vec<u64> = journal.records(None).map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(journal.records(Some(Path::new("/w/a.py"))).count(), 2);

        let a = journal.records(Some(Path::new("/w/b.py"))).next().unwrap();
        assert_eq!(apply_patch(&a.before.text(), &a.diff()).unwrap(), a.after.text());
    }

    #[test]
    fn test_clear() {
        let temp = TempDir::new().unwrap();
        let mut journal = ChangeJournal::load(temp.path()).unwrap();
        journal.append(vec![record(SessionId::generate(), "/w/a.py", "", "hello")]);
        assert_eq!(journal.clear(), 1);
        journal.save().unwrap();
        assert!(ChangeJournal::load(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_newer_version_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(JOURNAL_FILE), r#"{"version": 99, "records": []}"#).unwrap();
        assert!(ChangeJournal::load(temp.path()).is_err());
    }
}
