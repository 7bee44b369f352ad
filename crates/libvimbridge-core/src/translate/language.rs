//! Per-language declaration search patterns
//!
//! Patterns use the editor's very-magic regex syntax (`\v`), where `<` and
//! `>` are word boundaries and `(`, `|`, `+` and `?` need no escaping.

use std::path::Path;

/// Detect programming language from file extension
pub fn detect_language(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => "rust",
        Some("py") | Some("pyi") => "python",
        Some("ts") | Some("tsx") => "typescript",
        Some("js") | Some("jsx") | Some("mjs") => "javascript",
        Some("go") => "go",
        Some("java") => "java",
        Some("c") | Some("h") => "c",
        Some("cpp") | Some("hpp") | Some("cc") | Some("cxx") => "cpp",
        Some("rb") => "ruby",
        Some("ex") | Some("exs") => "elixir",
        _ => "unknown",
    }
}

/// Pattern matching the declaration line of function `name`
pub fn function_pattern(language: &str, name: &str) -> String {
    match language {
        "python" => format!(r"\v^\s*(async\s+)?def\s+{}>", name),
        "rust" => format!(r"\v<fn\s+{}>", name),
        "javascript" | "typescript" => format!(r"\v<function\s+{}>", name),
        "go" => format!(r"\v<func\s+(\(.*\)\s+)?{}>", name),
        "ruby" | "elixir" => format!(r"\v<(def|defp)\s+(self\.)?{}>", name),
        _ => format!(r"\v<(def|function|func|fn)\s+{}>", name),
    }
}

/// Pattern matching the declaration line of class (or type) `name`
pub fn class_pattern(language: &str, name: &str) -> String {
    match language {
        "python" => format!(r"\v^\s*class\s+{}>", name),
        "rust" => format!(r"\v<(struct|enum|trait)\s+{}>", name),
        "go" => format!(r"\v<type\s+{}>", name),
        "ruby" => format!(r"\v<(class|module)\s+{}>", name),
        "elixir" => format!(r"\v<defmodule\s+{}>", name),
        "c" | "cpp" => format!(r"\v<(class|struct)\s+{}>", name),
        "java" => format!(r"\v<(class|interface|enum)\s+{}>", name),
        _ => format!(r"\v<class\s+{}>", name),
    }
}

/// Pattern matching method `name`, searched forward from its class
pub fn method_pattern(language: &str, name: &str) -> String {
    match language {
        "python" => format!(r"\v^\s+(async\s+)?def\s+{}>", name),
        "javascript" | "typescript" => {
            format!(r"\v^\s+(static\s+)?(async\s+)?{}\s*\(", name)
        }
        _ => function_pattern(language, name),
    }
}

/// Line prefixes that mark an import statement
pub fn import_prefixes(language: &str) -> &'static [&'static str] {
    match language {
        "python" => &["import ", "from "],
        "rust" => &["use ", "pub use ", "extern crate "],
        "javascript" | "typescript" => &["import "],
        "go" => &["import "],
        "java" => &["import ", "package "],
        "c" | "cpp" => &["#include "],
        "ruby" => &["require ", "require_relative "],
        "elixir" => &["import ", "alias ", "use ", "require "],
        _ => &["import ", "from ", "use ", "#include "],
    }
}

/// Whether `line` is an import statement. CommonJS `require` bindings
/// count as imports; other declarations do not.
pub fn is_import(language: &str, line: &str) -> bool {
    let line = line.trim_start();
    if import_prefixes(language).iter().any(|p| line.starts_with(p)) {
        return true;
    }
    matches!(language, "javascript" | "typescript")
        && ["const ", "let ", "var "].iter().any(|p| line.starts_with(p))
        && line.contains("require(")
}

const VERY_MAGIC_SPECIAL: &str = r"\/.*+?={}()[]^$|<>@%~&";

/// Escape text for a literal `/` search in very-magic mode
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for ch in text.chars() {
        if VERY_MAGIC_SPECIAL.contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
