//! Line-based unified diffs between buffer snapshots
//!
//! Diffs are produced with `similar` and are deterministic for identical
//! inputs. `apply_patch` is the inverse: applying the diff of a record to its
//! before text yields its after text.

use std::path::Path;
use std::sync::Arc;

use similar::{ChangeTag, TextDiff};

use crate::error::BridgeError;
use crate::types::ChangeRecord;

/// Lines of context around each hunk
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Text shown when a change log is empty
pub const NO_CHANGES: &str = "No changes recorded.";

/// Unified diff between two texts; empty when they are equal
pub fn unified_diff(path: &Path, before: &str, after: &str, context_lines: usize) -> String {
    if before == after {
        return String::new();
    }
    let name = path.to_string_lossy();
    let name = name.trim_start_matches('/');
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(context_lines)
        .header(&format!("a/{}", name), &format!("b/{}", name))
        .to_string()
}

/// Count (added, removed) lines
pub fn line_stats(before: &str, after: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(before, after);
    diff.iter_all_changes()
        .fold((0, 0), |(added, removed), change| match change.tag() {
            ChangeTag::Insert => (added + 1, removed),
            ChangeTag::Delete => (added, removed + 1),
            ChangeTag::Equal => (added, removed),
        })
}

/// Render a sequence of change records for display, one diff per record
pub fn render_changes<I>(records: I, context_lines: usize) -> String
where
    I: IntoIterator<Item = Arc<ChangeRecord>>,
{
    let diffs: Vec<String> = records
        .into_iter()
        .map(|record| record.diff_with_context(context_lines))
        .filter(|diff| !diff.is_empty())
        .collect();

    if diffs.is_empty() {
        NO_CHANGES.to_string()
    } else {
        diffs
            .iter()
            .map(|d| d.trim_end_matches('\n'))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Apply a unified diff to `before`, returning the patched text
pub fn apply_patch(before: &str, patch: &str) -> Result<String, BridgeError> {
    let source: Vec<&str> = before.split_inclusive('\n').collect();
    let mut output = String::with_capacity(before.len() + patch.len());
    let mut cursor = 0usize;

    let mut lines = patch.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            continue;
        }
        if !line.starts_with("@@") {
            return Err(patch_error(format!("unexpected line outside hunk: {:?}", line)));
        }

        let (old_start, old_len) = parse_hunk_header(line)?;
        let hunk_start = if old_len == 0 { old_start } else { old_start.saturating_sub(1) };
        if hunk_start < cursor || hunk_start > source.len() {
            return Err(patch_error(format!("hunk at line {} is out of order", old_start)));
        }
        for src in &source[cursor..hunk_start] {
            output.push_str(src);
        }
        cursor = hunk_start;

        while let Some(body) = lines.peek() {
            if body.starts_with("@@") || body.starts_with("--- ") {
                break;
            }
            let body = lines.next().unwrap_or_default();
            let no_newline = lines.peek().is_some_and(|next| next.starts_with('\\'));
            if no_newline {
                lines.next();
            }

            let (tag, content) = body.split_at(1.min(body.len()));
            let content = if no_newline {
                content.strip_suffix('\n').unwrap_or(content)
            } else {
                content
            };

            match tag {
                " " | "-" => {
                    let expected = source
                        .get(cursor)
                        .ok_or_else(|| patch_error("hunk runs past end of input".to_string()))?;
                    if *expected != content {
                        return Err(patch_error(format!(
                            "context mismatch at line {}: expected {:?}, found {:?}",
                            cursor + 1,
                            content,
                            expected
                        )));
                    }
                    if tag == " " {
                        output.push_str(content);
                    }
                    cursor += 1;
                }
                "+" => output.push_str(content),
                _ => return Err(patch_error(format!("invalid hunk line: {:?}", body))),
            }
        }
    }

    for src in &source[cursor..] {
        output.push_str(src);
    }
    Ok(output)
}

fn parse_hunk_header(line: &str) -> Result<(usize, usize), BridgeError> {
    // "@@ -old_start[,old_len] +new_start[,new_len] @@"
    let old = line
        .split_whitespace()
        .find(|part| part.starts_with('-'))
        .ok_or_else(|| patch_error(format!("malformed hunk header: {:?}", line)))?;
    let mut parts = old[1..].splitn(2, ',');
    let start = parts
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| patch_error(format!("malformed hunk header: {:?}", line)))?;
    let len = match parts.next() {
        Some(len) => len
            .parse::<usize>()
            .map_err(|_| patch_error(format!("malformed hunk header: {:?}", line)))?,
        None => 1,
    };
    Ok((start, len))
}

fn patch_error(message: String) -> BridgeError {
    BridgeError::InvalidArgs(format!("cannot apply patch: {}", message))
}
