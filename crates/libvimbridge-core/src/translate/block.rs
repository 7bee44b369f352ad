//! Indentation-delimited declaration blocks

use std::ops::Range;

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_closer(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('}')
        || trimmed.starts_with(')')
        || trimmed == "end"
        || trimmed.starts_with("end ")
}

/// Range of 0-based line indices making up the block declared on `start`.
///
/// The block runs until the first non-blank line indented no deeper than
/// the declaration. A closing brace or `end` at the declaration's
/// indentation belongs to the block; trailing blank lines do not.
pub fn block_extent(lines: &[String], start: usize) -> Range<usize> {
    let Some(decl) = lines.get(start) else {
        return start..start;
    };
    let base = indent_of(decl);

    // `fn f() { 1 }` on one line
    let opens = decl.matches('{').count();
    if opens > 0 && opens == decl.matches('}').count() {
        return start..start + 1;
    }

    let mut end = start + 1;
    for (idx, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= base {
            if indent_of(line) == base && is_closer(line) {
                end = idx + 1;
            }
            break;
        }
        end = idx + 1;
    }
    start..end
}

/// Split `content` into lines re-indented so its first non-blank line
/// starts at `indent` columns. Relative indentation is preserved.
pub fn reindent(content: &str, indent: &str) -> Vec<String> {
    let lines: Vec<&str> = content.trim_end_matches('\n').split('\n').collect();
    // Counted in characters: indentation may mix multi-byte whitespace
    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| match line.char_indices().nth(common) {
            Some((start, _)) if !line.trim().is_empty() => format!("{}{}", indent, &line[start..]),
            _ => String::new(),
        })
        .collect()
}

/// Leading whitespace of a line
pub fn leading_whitespace(line: &str) -> &str {
    &line[..indent_of(line)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn test_python_function_block() {
        let src = lines("import os\n\ndef f():\n    a = 1\n\n    return a\n\n\ndef g():\n    pass\n");
        assert_eq!(block_extent(&src, 2), 2..6);
        assert_eq!(block_extent(&src, 8), 8..10);
    }

    #[test]
    fn test_method_block_ends_at_sibling() {
        let src = lines("class A:\n    def a(self):\n        return 1\n    def b(self):\n        return 2\n");
        assert_eq!(block_extent(&src, 1), 1..3);
        assert_eq!(block_extent(&src, 0), 0..5);
    }

    #[test]
    fn test_brace_block_includes_closer() {
        let src = lines("fn main() {\n    run();\n}\n\nfn other() {}\n");
        assert_eq!(block_extent(&src, 0), 0..3);
        assert_eq!(block_extent(&src, 4), 4..5);
    }

    #[test]
    fn test_declaration_on_last_line() {
        let src = lines("x = 1\ndef f(): pass");
        assert_eq!(block_extent(&src, 1), 1..2);
        assert_eq!(block_extent(&src, 5), 5..5);
    }

    #[test]
    fn test_reindent() {
        let content = "def b(self):\n    return 3\n";
        assert_eq!(
            reindent(content, "    "),
            vec!["    def b(self):".to_string(), "        return 3".to_string()]
        );
        assert_eq!(reindent("  x\n\n  y", ""), vec!["x", "", "y"]);
    }

    #[test]
    fn test_reindent_mixed_multibyte_indentation() {
        assert_eq!(reindent("\u{3000}x\n  y", ""), vec!["x", " y"]);
        assert_eq!(
            reindent("\u{3000}def f():\n\u{3000}\u{3000}pass", "  "),
            vec!["  def f():", "  \u{3000}pass"]
        );
    }
}
