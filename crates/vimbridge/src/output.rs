//! Terminal output
//!
//! Every command reports through this module: one JSON envelope on stdout
//! (errors on stderr) with `--json`, plain text otherwise. Human text is
//! rendered by pure functions so it can be tested without a terminal.

use libvimbridge_agent::OpOutcome;
use libvimbridge_core::BridgeError;
use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::Cli;

const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: u32,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    details: Value,
}

fn error_body(err: &BridgeError) -> ErrorBody {
    let mut details = json!({ "exit_code": err.exit_code() });
    let suggestions = err.suggestions();
    if !suggestions.is_empty() {
        details["suggestions"] = json!(suggestions);
    }
    ErrorBody {
        code: err.error_code(),
        message: err.to_string(),
        details,
    }
}

fn to_json<T: Serialize>(envelope: &Envelope<'_, T>) -> String {
    serde_json::to_string_pretty(envelope).unwrap_or_else(|e| {
        json!({
            "schema_version": SCHEMA_VERSION,
            "ok": false,
            "error": { "code": "internal_error", "message": e.to_string() },
        })
        .to_string()
    })
}

/// Emit `data` as the JSON envelope. Human output is printed by the caller.
pub fn output_success<T: Serialize>(cli: &Cli, data: T) {
    if cli.json {
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            ok: true,
            data: Some(&data),
            error: None,
        };
        println!("{}", to_json(&envelope));
    }
}

pub fn output_error(cli: &Cli, err: &BridgeError) {
    if cli.json {
        let envelope: Envelope<'_, ()> = Envelope {
            schema_version: SCHEMA_VERSION,
            ok: false,
            data: None,
            error: Some(error_body(err)),
        };
        eprintln!("{}", to_json(&envelope));
    } else {
        eprint!("{}", render_error(err));
    }
}

/// Report the result of an editing operation
pub fn output_outcome(cli: &Cli, outcome: &OpOutcome) {
    output_success(cli, outcome);
    print_human(cli, render_outcome(outcome).trim_end());
}

/// Print human-readable output (ignored in quiet and JSON mode)
pub fn print_human(cli: &Cli, msg: &str) {
    if !cli.json && !cli.quiet {
        println!("{}", msg);
    }
}

/// Message, editor output, then the diff of what changed
pub fn render_outcome(outcome: &OpOutcome) -> String {
    let mut out = outcome.message.clone();
    out.push('\n');
    if outcome.changed() {
        let noun = if outcome.changes == 1 { "change" } else { "changes" };
        out.push_str(&format!("{} {} recorded\n", outcome.changes, noun));
    }
    if let Some(output) = outcome.output.as_deref().filter(|o| !o.is_empty()) {
        out.push_str(output.trim_end());
        out.push('\n');
    }
    if !outcome.diff.is_empty() {
        out.push('\n');
        out.push_str(outcome.diff.trim_end());
        out.push('\n');
    }
    out
}

pub fn render_error(err: &BridgeError) -> String {
    let mut out = format!("error: {}\n", err);
    let suggestions = err.suggestions();
    if !suggestions.is_empty() {
        out.push_str("\nSuggestions:\n");
        for suggestion in suggestions {
            out.push_str(&format!("  - {}\n", suggestion));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_unchanged_outcome() {
        let outcome = OpOutcome::success("Import 'import sys' already present in m.py");
        assert_eq!(render_outcome(&outcome), "Import 'import sys' already present in m.py\n");
    }

    #[test]
    fn test_render_outcome_with_diff_and_output() {
        let outcome = OpOutcome::success("Executed ihello<Esc>")
            .with_diff("--- a/a.py\n+++ b/a.py\n@@ -0,0 +1 @@\n+hello\n".to_string(), 1)
            .with_output(Some("3\n".to_string()));
        let text = render_outcome(&outcome);
        assert!(text.starts_with("Executed ihello<Esc>\n1 change recorded\n3\n\n--- a/a.py"));
        assert!(text.ends_with("+hello\n"));
    }

    #[test]
    fn test_error_details_carry_exit_code() {
        let err = BridgeError::InvalidArgs("empty command".to_string());
        let body = error_body(&err);
        assert_eq!(body.details["exit_code"], err.exit_code());
        assert!(render_error(&err).starts_with("error: "));
    }
}
