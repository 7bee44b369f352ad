//! Plan execution
//!
//! Runs the steps of a `CommandPlan` through the change tracker. Deferred
//! steps are resolved against the live buffer right before they run, so they
//! see the cursor left by the preceding navigation.

use std::path::Path;
use std::sync::Arc;

use libvimbridge_core::translate::block::{block_extent, leading_whitespace, reindent};
use libvimbridge_core::translate::{CommandPlan, PlanStep};
use libvimbridge_core::{BridgeError, ChangeRecord, ChangeTracker, EditorChannel, EditorCommand};
use tracing::{debug, warn};

/// Execute `plan`, returning the change records it produced in order.
///
/// Stops at the first failing step. Records appended before the failure stay
/// in the tracker; after a rejected command the editor is returned to
/// normal mode.
pub fn run_plan<C: EditorChannel>(
    tracker: &mut ChangeTracker,
    channel: &C,
    plan: &CommandPlan,
) -> Result<Vec<Arc<ChangeRecord>>, BridgeError> {
    let path = plan.location.path.as_path();
    let mut records = Vec::new();

    for step in &plan.steps {
        debug!(step = %step, path = %path.display(), "Plan step");
        let result = step_command(channel, path, step)
            .and_then(|command| tracker.record(channel, &command));
        match result {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => {
                if e.is_command_rejection() {
                    if let Err(escape_err) = channel.send_command(&EditorCommand::escape()) {
                        warn!(error = %escape_err, "Could not return to normal mode");
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(records)
}

fn step_command<C: EditorChannel>(
    channel: &C,
    path: &Path,
    step: &PlanStep,
) -> Result<EditorCommand, BridgeError> {
    match step {
        PlanStep::Command(command) => Ok(command.clone()),
        PlanStep::ReplaceBlock { content } => {
            let (lines, row) = buffer_at_cursor(channel, path)?;
            let extent = block_extent(&lines, row);
            let indent = lines.get(row).map(|l| leading_whitespace(l)).unwrap_or("");
            debug!(start = extent.start, end = extent.end, "Replacing block");
            Ok(EditorCommand::SetLines {
                start: extent.start,
                end: Some(extent.end),
                lines: reindent(content, indent),
            })
        }
        PlanStep::InsertBelow { content } => {
            let (lines, row) = buffer_at_cursor(channel, path)?;
            let at = (row + 1).min(lines.len().max(1));
            Ok(EditorCommand::SetLines {
                start: at,
                end: Some(at),
                lines: content
                    .trim_end_matches('\n')
                    .split('\n')
                    .map(String::from)
                    .collect(),
            })
        }
    }
}

/// Lines of `path` and the 0-based cursor row; `path` must be current
fn buffer_at_cursor<C: EditorChannel>(
    channel: &C,
    path: &Path,
) -> Result<(Vec<String>, usize), BridgeError> {
    let snapshot = channel.read_buffer(path)?;
    let cursor = snapshot.cursor().ok_or_else(|| {
        BridgeError::Session(format!(
            "{} is not in the current window",
            path.display()
        ))
    })?;
    Ok((snapshot.lines().to_vec(), cursor.line.saturating_sub(1)))
}
