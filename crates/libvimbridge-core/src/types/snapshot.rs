use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ids::SessionId;

/// Cursor position: 1-based line, 0-based byte column (editor convention)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub line: usize,
    pub column: usize,
}

impl Cursor {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Immutable capture of one buffer at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSnapshot {
    session_id: SessionId,
    path: PathBuf,
    lines: Vec<String>,
    /// Present only when the buffer was displayed in the current window
    cursor: Option<Cursor>,
    taken_at: DateTime<Utc>,
    #[serde(with = "hex_digest")]
    digest: [u8; 32],
}

impl BufferSnapshot {
    /// Capture a snapshot. A buffer holding a single empty line is empty.
    pub fn new(
        session_id: SessionId,
        path: impl Into<PathBuf>,
        mut lines: Vec<String>,
        cursor: Option<Cursor>,
    ) -> Self {
        if lines.len() == 1 && lines[0].is_empty() {
            lines.clear();
        }
        let digest = content_digest(&lines);
        Self {
            session_id,
            path: path.into(),
            lines,
            cursor,
            taken_at: Utc::now(),
            digest,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Full text with a trailing newline after every line
    pub fn text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// Content equality; cursor and capture time are ignored
    pub fn same_content(&self, other: &BufferSnapshot) -> bool {
        self.digest == other.digest && self.lines == other.lines
    }

    /// Whether both snapshots describe the same buffer of the same session
    pub fn same_origin(&self, other: &BufferSnapshot) -> bool {
        self.session_id == other.session_id && self.path == other.path
    }
}

fn content_digest(lines: &[String]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().into()
}

mod hex_digest {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(digest: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(digest))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("digest must be 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_empty_line_is_empty() {
        let snap = BufferSnapshot::new(SessionId::generate(), "a.py", lines(&[""]), None);
        assert!(snap.is_empty());
        assert_eq!(snap.text(), "");
    }

    #[test]
    fn test_text_has_trailing_newlines() {
        let snap = BufferSnapshot::new(SessionId::generate(), "a.py", lines(&["a", "", "b"]), None);
        assert_eq!(snap.text(), "a\n\nb\n");
    }

    #[test]
    fn test_same_content_ignores_cursor() {
        let session = SessionId::generate();
        let a = BufferSnapshot::new(session, "a.py", lines(&["x"]), Some(Cursor::new(1, 0)));
        let b = BufferSnapshot::new(session, "a.py", lines(&["x"]), None);
        let c = BufferSnapshot::new(session, "a.py", lines(&["y"]), None);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&c));
        assert_eq!(a.digest_hex(), b.digest_hex());
    }

    #[test]
    fn test_same_origin() {
        let session = SessionId::generate();
        let a = BufferSnapshot::new(session, "a.py", vec![], None);
        let b = BufferSnapshot::new(session, "b.py", vec![], None);
        let c = BufferSnapshot::new(SessionId::generate(), "a.py", vec![], None);
        assert!(!a.same_origin(&b));
        assert!(!a.same_origin(&c));
    }

    #[test]
    fn test_serde_roundtrip_keeps_digest() {
        let snap = BufferSnapshot::new(SessionId::generate(), "a.py", lines(&["x"]), None);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains(&snap.digest_hex()));
        let back: BufferSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
