use std::fmt;

use serde::{Deserialize, Serialize};

const ESC: char = '\x1b';

/// One unit of the editor's native command language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EditorCommand {
    /// Ex command line, without the leading `:`
    Ex(String),
    /// Raw key sequence executed from normal mode
    Keys(String),
    /// Replace lines `start..end` (0-based, end exclusive, `None` = end of buffer)
    SetLines {
        start: usize,
        end: Option<usize>,
        lines: Vec<String>,
    },
}

impl EditorCommand {
    /// Parse command text: `:cmd` is an Ex command, anything else is keys.
    /// Key notation `<Esc>`, `<CR>`, `<NL>`, `<Tab>` and `<lt>` is expanded.
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix(':') {
            Some(ex) => EditorCommand::Ex(ex.trim_end_matches(['\r', '\n']).to_string()),
            None => EditorCommand::Keys(expand_keys(text)),
        }
    }

    pub fn ex(command: impl Into<String>) -> Self {
        EditorCommand::Ex(command.into())
    }

    pub fn keys(keys: impl Into<String>) -> Self {
        EditorCommand::Keys(keys.into())
    }

    /// Leave any pending mode and return to normal mode
    pub fn escape() -> Self {
        EditorCommand::Keys(ESC.to_string())
    }

    /// Replace the whole buffer
    pub fn replace_all(lines: Vec<String>) -> Self {
        EditorCommand::SetLines {
            start: 0,
            end: None,
            lines,
        }
    }

    /// Whether this command can only move the cursor or switch modes
    pub fn is_escape(&self) -> bool {
        matches!(self, EditorCommand::Keys(k) if k.chars().all(|c| c == ESC))
    }
}

impl fmt::Display for EditorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorCommand::Ex(cmd) => write!(f, ":{}", cmd),
            EditorCommand::Keys(keys) => f.write_str(&describe_keys(keys)),
            EditorCommand::SetLines { start, end, lines } => {
                let end = end.map(|e| e.to_string()).unwrap_or_else(|| "$".to_string());
                write!(f, "set-lines {}..{} ({} line(s))", start, end, lines.len())
            }
        }
    }
}

/// Result of a command acknowledged by the editor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Captured message output, if the command produced any
    pub output: Option<String>,
}

impl CommandResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_output(output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            output: if output.is_empty() { None } else { Some(output) },
        }
    }
}

fn expand_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let name_end = tail.find('>');
        let replacement = name_end.and_then(|end| match tail[1..end].to_ascii_lowercase().as_str() {
            "esc" => Some(ESC),
            "cr" | "enter" | "return" => Some('\r'),
            "nl" => Some('\n'),
            "tab" => Some('\t'),
            "bs" => Some('\x08'),
            "lt" => Some('<'),
            _ => None,
        });
        match (replacement, name_end) {
            (Some(ch), Some(end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn describe_keys(keys: &str) -> String {
    let mut out = String::with_capacity(keys.len());
    for ch in keys.chars() {
        match ch {
            ESC => out.push_str("<Esc>"),
            '\r' => out.push_str("<CR>"),
            '\n' => out.push_str("<NL>"),
            '\t' => out.push_str("<Tab>"),
            '\x08' => out.push_str("<BS>"),
            '<' => out.push_str("<lt>"),
            other => out.push(other),
        }
    }
    out
}
