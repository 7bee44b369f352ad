//! Plans for edits that are not tied to a declaration

use std::path::Path;

use super::language::{detect_language, is_import};
use super::{anchor, search, CommandPlan, Location, PlanStep};
use crate::types::{BufferSnapshot, EditorCommand};

const ESC: char = '\x1b';

/// Plan adding `statement` below the last import of `buffer`, or at the top
/// when there is none. Returns `None` when the statement is already present.
pub fn plan_add_import(
    path: &Path,
    statement: &str,
    buffer: &BufferSnapshot,
    current_file: Option<&Path>,
) -> Option<CommandPlan> {
    let statement = statement.trim();
    if buffer.lines().iter().any(|line| line.trim() == statement) {
        return None;
    }

    let language = detect_language(path);
    let last_import = buffer
        .lines()
        .iter()
        .rposition(|line| is_import(language, line))
        .map(|idx| idx as u32 + 1);

    let mut steps = CommandPlan::open_steps(path, current_file);
    let edit = match last_import {
        Some(line) => {
            steps.push(PlanStep::Command(EditorCommand::ex(line.to_string())));
            format!("o{}{}", statement, ESC)
        }
        None if buffer.is_empty() => {
            steps.push(PlanStep::Command(EditorCommand::ex("1")));
            format!("i{}{}", statement, ESC)
        }
        None => {
            steps.push(PlanStep::Command(EditorCommand::ex("1")));
            format!("O{}{}", statement, ESC)
        }
    };
    steps.push(PlanStep::Command(EditorCommand::keys(edit)));
    steps.push(PlanStep::Command(EditorCommand::escape()));

    Some(CommandPlan {
        location: Location::new(path.to_path_buf(), Some(last_import.unwrap_or(1))),
        steps,
    })
}

/// Plan inserting `content` below the first line matching `pattern`
pub fn plan_insert_after(
    path: &Path,
    pattern: &str,
    content: &str,
    current_file: Option<&Path>,
) -> CommandPlan {
    let mut steps = CommandPlan::open_steps(path, current_file);
    steps.push(PlanStep::Command(anchor(None)));
    steps.push(PlanStep::Command(search(pattern)));
    steps.push(PlanStep::InsertBelow {
        content: content.to_string(),
    });
    steps.push(PlanStep::Command(EditorCommand::escape()));

    CommandPlan {
        location: Location::new(path.to_path_buf(), None).with_pattern(pattern),
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;

    fn buffer(path: &str, text: &str) -> BufferSnapshot {
        BufferSnapshot::new(
            SessionId::generate(),
            path,
            text.lines().map(String::from).collect(),
            None,
        )
    }

    #[test]
    fn test_import_goes_after_last_import() {
        let path = Path::new("a.py");
        let buf = buffer("a.py", "import os\nfrom x import y\n\ndef f():\n    pass\n");
        let plan = plan_add_import(path, "import sys", &buf, Some(path)).unwrap();
        let cmds: Vec<String> = plan.commands().map(|c| c.to_string()).collect();
        assert_eq!(cmds, vec![":2", "oimport sys<Esc>", "<Esc>"]);
    }

    #[test]
    fn test_import_already_present() {
        let path = Path::new("a.py");
        let buf = buffer("a.py", "import os\nimport sys\n");
        assert!(plan_add_import(path, "import sys", &buf, None).is_none());
    }

    #[test]
    fn test_import_without_existing_imports() {
        let path = Path::new("lib.rs");
        let buf = buffer("lib.rs", "fn main() {}\n");
        let plan = plan_add_import(path, "use std::fs;", &buf, None).unwrap();
        let cmds: Vec<String> = plan.commands().map(|c| c.to_string()).collect();
        assert_eq!(cmds, vec![":edit lib.rs", ":1", "Ouse std::fs;<Esc>", "<Esc>"]);

        let empty = buffer("lib.rs", "");
        let plan = plan_add_import(path, "use std::fs;", &empty, Some(path)).unwrap();
        assert_eq!(plan.commands().nth(1), Some(&EditorCommand::keys("iuse std::fs;\x1b")));
    }

    #[test]
    fn test_js_import_ignores_plain_const() {
        let path = Path::new("app.js");
        let buf = buffer(
            "app.js",
            "import a from 'a';\nconst b = require('b');\n\nconst PORT = 8080;\n",
        );
        let plan = plan_add_import(path, "import c from 'c';", &buf, Some(path)).unwrap();
        assert_eq!(plan.commands().next(), Some(&EditorCommand::ex("2")));
    }

    #[test]
    fn test_insert_after_plan() {
        let plan = plan_insert_after(Path::new("a.py"), "import os", "import sys", None);
        assert_eq!(plan.steps.len(), 5);
        assert_eq!(plan.steps[2], PlanStep::Command(EditorCommand::ex("/import os")));
        assert!(matches!(plan.steps[3], PlanStep::InsertBelow { .. }));
    }
}
