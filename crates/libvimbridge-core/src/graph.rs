//! Code relationship graph
//!
//! An externally generated index of files, functions, classes and typed
//! edges between functions. It is loaded from JSON and only ever read.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BridgeError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeGraph {
    #[serde(default)]
    pub files: Vec<FileNode>,
    #[serde(default)]
    pub functions: Vec<FunctionNode>,
    #[serde(default)]
    pub classes: Vec<ClassNode>,
    /// Edges between entries of `functions`, by index
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub file: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub calls: Vec<String>,
    /// 1-based declaration line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNode {
    pub file: String,
    pub name: String,
    #[serde(default)]
    pub methods: Vec<MethodNode>,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodNode {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub kind: String,
}

impl CodeGraph {
    /// Load and validate a graph file
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("cannot read code graph {}: {}", path.display(), e))
        })?;
        let graph = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            files = graph.files.len(),
            functions = graph.functions.len(),
            classes = graph.classes.len(),
            "Loaded code graph"
        );
        Ok(graph)
    }

    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        let graph: CodeGraph = serde_json::from_str(json)
            .map_err(|e| BridgeError::Config(format!("invalid code graph: {}", e)))?;
        graph.validate()?;
        Ok(graph)
    }

    /// Check that every edge points at an existing function
    pub fn validate(&self) -> Result<(), BridgeError> {
        let n = self.functions.len();
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.source >= n || edge.target >= n {
                return Err(BridgeError::Config(format!(
                    "invalid code graph: edge {} ({} -> {}) is out of range for {} function(s)",
                    i, edge.source, edge.target, n
                )));
            }
        }
        Ok(())
    }

    pub fn functions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FunctionNode> {
        self.functions.iter().filter(move |f| f.name == name)
    }

    pub fn classes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ClassNode> {
        self.classes.iter().filter(move |c| c.name == name)
    }

    pub fn file(&self, name: &str) -> Option<&FileNode> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Functions with an edge of kind `calls` into any function named `name`
    pub fn callers_of(&self, name: &str) -> Vec<&FunctionNode> {
        let mut callers: Vec<&FunctionNode> = self
            .edges
            .iter()
            .filter(|e| e.kind == "calls" && self.functions[e.target].name == name)
            .map(|e| &self.functions[e.source])
            .collect();
        callers.dedup_by(|a, b| a.file == b.file && a.name == b.name);
        callers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPH: &str = r#"{
        "files": [
            {"name": "src/a.py", "language": "python", "summary": "parsers", "imports": ["os"]},
            {"name": "src/b.py", "language": "python", "summary": "", "imports": []}
        ],
        "functions": [
            {"file": "src/a.py", "name": "parse", "parameters": ["text"], "calls": [], "line": 3},
            {"file": "src/b.py", "name": "main", "parameters": [], "calls": ["parse"]}
        ],
        "classes": [
            {"file": "src/b.py", "name": "App", "methods": [{"name": "run", "parameters": ["self"]}], "bases": []}
        ],
        "edges": [{"source": 1, "target": 0, "kind": "calls"}]
    }"#;

    #[test]
    fn test_parse_graph() {
        let graph = CodeGraph::from_json(GRAPH).unwrap();
        assert_eq!(graph.files.len(), 2);
        assert_eq!(graph.functions_named("parse").count(), 1);
        assert_eq!(graph.functions[0].line, Some(3));
        assert_eq!(graph.classes_named("App").next().unwrap().methods[0].name, "run");
        assert_eq!(graph.file("src/a.py").unwrap().imports, vec!["os"]);
        assert_eq!(graph.callers_of("parse")[0].name, "main");
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let graph = CodeGraph::from_json("{}").unwrap();
        assert_eq!(graph, CodeGraph::default());
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let json = r#"{"functions": [], "edges": [{"source": 0, "target": 1, "kind": "calls"}]}"#;
        let err = CodeGraph::from_json(json).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, GRAPH).unwrap();
        assert_eq!(CodeGraph::load(&path).unwrap().functions.len(), 2);
        assert!(CodeGraph::load(&dir.path().join("missing.json")).is_err());
    }
}
