//! Translation of edit intents into editor command plans
//!
//! The translator never talks to the editor. It resolves an intent to a
//! location and emits an ordered plan: open the file (skipped when it is
//! already current), navigate to the declaration, apply the edit, and return
//! to normal mode. Block replacement depends on the live buffer, so it stays
//! a deferred step for the executor.

pub mod block;
pub mod edits;
pub mod language;
pub mod resolver;

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;
use crate::types::EditorCommand;

pub use edits::{plan_add_import, plan_insert_after};
pub use resolver::{GraphResolver, PassThroughResolver, Resolver};

/// What an intent refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Function { name: String },
    Class { name: String },
    Method { class: String, name: String },
}

impl Target {
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Function { .. } => "function",
            Target::Class { .. } => "class",
            Target::Method { .. } => "method",
        }
    }

    /// Names must be plain identifiers; they are spliced into search patterns
    pub fn validate(&self) -> Result<(), ResolutionError> {
        let names: Vec<&String> = match self {
            Target::Function { name } | Target::Class { name } => vec![name],
            Target::Method { class, name } => vec![class, name],
        };
        for name in names {
            if !is_identifier(name) {
                return Err(ResolutionError::InvalidName(name.to_string()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Function { name } | Target::Class { name } => f.write_str(name),
            Target::Method { class, name } => write!(f, "{}.{}", class, name),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// A high-level request: locate `target`, optionally within `file`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Intent {
    pub fn function(name: impl Into<String>, file: Option<PathBuf>) -> Self {
        Self {
            target: Target::Function { name: name.into() },
            file,
        }
    }

    pub fn class(name: impl Into<String>, file: Option<PathBuf>) -> Self {
        Self {
            target: Target::Class { name: name.into() },
            file,
        }
    }

    pub fn method(class: impl Into<String>, name: impl Into<String>, file: Option<PathBuf>) -> Self {
        Self {
            target: Target::Method {
                class: class.into(),
                name: name.into(),
            },
            file,
        }
    }
}

/// A concrete place in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: PathBuf,
    /// 1-based line hint from the graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Searches run in order, each continuing from the previous match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

impl Location {
    pub fn new(path: PathBuf, line: Option<u32>) -> Self {
        Self {
            path,
            line,
            patterns: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.path.display(), line),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// What to do once the declaration is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    Navigate,
    /// Replace the whole declaration block with this text
    ReplaceBlock(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    Command(EditorCommand),
    /// Replace the block under the cursor; resolved against the live buffer
    ReplaceBlock { content: String },
    /// Insert lines below the cursor line, verbatim
    InsertBelow { content: String },
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Command(cmd) => write!(f, "{}", cmd),
            PlanStep::ReplaceBlock { content } => {
                write!(f, "replace-block ({} line(s))", content.lines().count())
            }
            PlanStep::InsertBelow { content } => {
                write!(f, "insert-below ({} line(s))", content.lines().count())
            }
        }
    }
}

/// Ordered steps for one intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub location: Location,
    pub steps: Vec<PlanStep>,
}

impl CommandPlan {
    /// Commands that open `path` unless it is already the current file
    pub(crate) fn open_steps(path: &Path, current_file: Option<&Path>) -> Vec<PlanStep> {
        if current_file == Some(path) {
            return Vec::new();
        }
        vec![PlanStep::Command(EditorCommand::ex(format!(
            "edit {}",
            escape_path(path)
        )))]
    }

    pub fn commands(&self) -> impl Iterator<Item = &EditorCommand> {
        self.steps.iter().filter_map(|step| match step {
            PlanStep::Command(cmd) => Some(cmd),
            PlanStep::ReplaceBlock { .. } | PlanStep::InsertBelow { .. } => None,
        })
    }
}

/// Escape a path for use as an Ex command argument
pub fn escape_path(path: &Path) -> String {
    let mut out = String::new();
    for ch in path.to_string_lossy().chars() {
        if matches!(ch, ' ' | '\\' | '%' | '#' | '|' | '"') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Remove `.` and `..` components without touching the filesystem, the way
/// the editor names its buffers. `..` at the root is dropped.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                Some(Component::ParentDir) | Some(Component::CurDir) | None => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Line anchor that makes the next forward search start at `line`
pub(crate) fn anchor(line: Option<u32>) -> EditorCommand {
    match line {
        // Searching forward from the last line wraps to the top
        None | Some(0) | Some(1) => EditorCommand::ex("$"),
        Some(line) => EditorCommand::ex((line - 1).to_string()),
    }
}

/// Escape `/` so a pattern can follow `:/`
pub(crate) fn search(pattern: &str) -> EditorCommand {
    let mut escaped = String::with_capacity(pattern.len());
    let mut prev_backslash = false;
    for ch in pattern.chars() {
        if ch == '/' && !prev_backslash {
            escaped.push('\\');
        }
        prev_backslash = ch == '\\' && !prev_backslash;
        escaped.push(ch);
    }
    EditorCommand::ex(format!("/{}", escaped))
}

/// Resolves intents and emits command plans
pub struct Translator {
    resolver: Box<dyn Resolver>,
}

impl Translator {
    pub fn new(resolver: Box<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Translator without a code graph
    pub fn pass_through() -> Self {
        Self::new(Box::new(PassThroughResolver))
    }

    pub fn resolver_name(&self) -> &'static str {
        self.resolver.name()
    }

    pub fn resolve(&self, intent: &Intent) -> Result<Location, ResolutionError> {
        self.resolver.resolve(intent)
    }

    /// Plan `action` on the declaration `intent` refers to
    pub fn plan(
        &self,
        intent: &Intent,
        action: EditAction,
        current_file: Option<&Path>,
    ) -> Result<CommandPlan, ResolutionError> {
        let location = self.resolve(intent)?;
        Ok(plan_at(location, action, current_file))
    }
}

/// Build the plan for an already resolved location
pub fn plan_at(location: Location, action: EditAction, current_file: Option<&Path>) -> CommandPlan {
    let mut steps = CommandPlan::open_steps(&location.path, current_file);
    steps.push(PlanStep::Command(anchor(location.line)));
    for pattern in &location.patterns {
        steps.push(PlanStep::Command(search(pattern)));
    }
    if let EditAction::ReplaceBlock(content) = action {
        steps.push(PlanStep::ReplaceBlock { content });
    }
    steps.push(PlanStep::Command(EditorCommand::escape()));
    CommandPlan { location, steps }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/root/./a.py")), Path::new("/root/a.py"));
        assert_eq!(normalize_path(Path::new("/root/proj/../proj/a.py")), Path::new("/root/proj/a.py"));
        assert_eq!(normalize_path(Path::new("/../a.py")), Path::new("/a.py"));
        assert_eq!(normalize_path(Path::new("../x/./b.rs")), Path::new("../x/b.rs"));
        assert_eq!(normalize_path(Path::new("a/../../b")), Path::new("../b"));
    }

    #[test]
    fn test_plan_order() {
        let translator = Translator::pass_through();
        let intent = Intent::function("f", Some(PathBuf::from("/w/a.py")));
        let plan = translator
            .plan(&intent, EditAction::ReplaceBlock("def f():\n    return 1".into()), None)
            .unwrap();

        let rendered: Vec<String> = plan.steps.iter().map(|s| s.to_string()).collect();
        assert_eq!(rendered[0], ":edit /w/a.py");
        assert_eq!(rendered[1], ":$");
        assert!(rendered[2].starts_with(r":/\v^\s*(async\s+)?def\s+f>"));
        assert_eq!(rendered[3], "replace-block (2 line(s))");
        assert_eq!(rendered[4], "<Esc>");
    }

    #[test]
    fn test_open_skipped_when_current() {
        let translator = Translator::pass_through();
        let path = PathBuf::from("/w/a.py");
        let intent = Intent::function("f", Some(path.clone()));
        let plan = translator
            .plan(&intent, EditAction::Navigate, Some(&path))
            .unwrap();
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.commands().next(), Some(&EditorCommand::ex("$")));
    }

    #[test]
    fn test_line_anchor() {
        let loc = Location::new(PathBuf::from("a.py"), Some(12)).with_pattern("x");
        let plan = plan_at(loc, EditAction::Navigate, Some(Path::new("a.py")));
        assert_eq!(plan.commands().next(), Some(&EditorCommand::ex("11")));
    }

    #[test]
    fn test_search_escapes_slash() {
        assert_eq!(search("a/b"), EditorCommand::ex(r"/a\/b"));
        assert_eq!(search(r"a\/b"), EditorCommand::ex(r"/a\/b"));
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path(Path::new("my file.py")), r"my\ file.py");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(Target::Function { name: "_ok1".into() }.validate().is_ok());
        assert!(Target::Function { name: "1bad".into() }.validate().is_err());
        assert!(Target::Method { class: "A".into(), name: "x.y".into() }.validate().is_err());
    }
}
