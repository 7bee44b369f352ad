//! Change journal commands

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use libvimbridge_core::diff::NO_CHANGES;
use libvimbridge_core::{BridgeError, ChangeRecord};
use serde::Serialize;

use crate::cli::{ChangesFormat, Cli};
use crate::context::BridgeContext;
use crate::output::{output_success, print_human};

#[derive(Serialize)]
struct ChangeEntry {
    seq: u64,
    session_id: String,
    path: PathBuf,
    command: String,
    recorded_at: DateTime<Utc>,
    added: usize,
    removed: usize,
    diff: String,
}

impl ChangeEntry {
    fn new(record: &ChangeRecord, context_lines: usize) -> Self {
        let (added, removed) = record.line_stats();
        Self {
            seq: record.seq,
            session_id: record.session_id.to_string(),
            path: record.path.clone(),
            command: record.command.clone(),
            recorded_at: record.recorded_at,
            added,
            removed,
            diff: record.diff_with_context(context_lines),
        }
    }
}

pub fn run(
    cli: &Cli,
    file: Option<&Path>,
    format: ChangesFormat,
    reset: bool,
) -> Result<(), BridgeError> {
    let ctx = BridgeContext::resolve(cli)?;
    let mut journal = ctx.journal()?;

    if reset {
        let cleared = journal.clear();
        journal.save()?;
        output_success(cli, serde_json::json!({ "cleared": cleared }));
        print_human(cli, &format!("Cleared {} change(s)", cleared));
        return Ok(());
    }

    let file = file.map(|f| ctx.path(f));
    let context_lines = ctx.config.tracking.context_lines;
    let entries: Vec<ChangeEntry> = journal
        .records(file.as_deref())
        .map(|record| ChangeEntry::new(record, context_lines))
        .collect();

    match format {
        ChangesFormat::Diff => {
            let diff = journal.render(file.as_deref(), context_lines);
            output_success(
                cli,
                serde_json::json!({ "count": entries.len(), "diff": diff }),
            );
            print_human(cli, diff.trim_end());
        }
        ChangesFormat::Json => {
            if cli.json {
                output_success(cli, &entries);
            } else if !cli.quiet {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
        }
        ChangesFormat::Table => {
            output_success(cli, &entries);
            if entries.is_empty() {
                print_human(cli, NO_CHANGES);
            } else {
                print_human(cli, &render_table(&ctx, &entries).to_string());
            }
        }
    }
    Ok(())
}

fn render_table(ctx: &BridgeContext, entries: &[ChangeEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "file", "+/-", "command", "session", "recorded"]);
    for entry in entries {
        let path = entry
            .path
            .strip_prefix(&ctx.root)
            .unwrap_or(&entry.path)
            .display()
            .to_string();
        table.add_row(vec![
            entry.seq.to_string(),
            path,
            format!("+{} -{}", entry.added, entry.removed),
            entry.command.clone(),
            entry.session_id.chars().take(8).collect(),
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    table
}
