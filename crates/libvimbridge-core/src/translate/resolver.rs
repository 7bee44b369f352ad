use std::path::{Path, PathBuf};

use tracing::debug;

use super::language::{class_pattern, detect_language, function_pattern, method_pattern};
use super::{Intent, Location, Target};
use crate::error::ResolutionError;
use crate::graph::CodeGraph;

/// Turns an edit intent into a concrete location
pub trait Resolver: Send + Sync {
    fn resolve(&self, intent: &Intent) -> Result<Location, ResolutionError>;

    /// Short name for logs and status output
    fn name(&self) -> &'static str;
}

/// Resolves names through a code relationship graph
pub struct GraphResolver {
    graph: CodeGraph,
    /// Directory that relative graph file names are resolved against
    root: PathBuf,
}

impl GraphResolver {
    pub fn new(graph: CodeGraph, root: impl Into<PathBuf>) -> Self {
        Self {
            graph,
            root: root.into(),
        }
    }

    pub fn graph(&self) -> &CodeGraph {
        &self.graph
    }

    fn path_of(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// Whether graph file `file` is the file the caller named
    fn matches_hint(&self, file: &str, hint: &Path) -> bool {
        let candidate = self.path_of(file);
        candidate == hint || Path::new(file) == hint || candidate.ends_with(hint)
    }

    fn pick(
        &self,
        kind: &'static str,
        name: &str,
        hint: Option<&Path>,
        mut candidates: Vec<Location>,
    ) -> Result<Location, ResolutionError> {
        if let Some(hint) = hint {
            candidates.retain(|loc| self.matches_hint(&loc.path.to_string_lossy(), hint));
        }
        match candidates.len() {
            0 => Err(ResolutionError::NotFound {
                kind,
                name: name.to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(ResolutionError::Ambiguous {
                kind,
                name: name.to_string(),
                candidates: candidates
                    .into_iter()
                    .map(|loc| Location::new(self.path_of(&loc.path.to_string_lossy()), loc.line))
                    .collect(),
            }),
        }
    }

    /// Candidate locations keyed by graph file name, before path resolution
    fn candidates(&self, target: &Target) -> Vec<Location> {
        match target {
            Target::Function { name } => self
                .graph
                .functions_named(name)
                .map(|f| {
                    let lang = detect_language(Path::new(&f.file));
                    Location::new(PathBuf::from(&f.file), f.line)
                        .with_pattern(function_pattern(lang, name))
                })
                .collect(),
            Target::Class { name } => self
                .graph
                .classes_named(name)
                .map(|c| {
                    let lang = detect_language(Path::new(&c.file));
                    Location::new(PathBuf::from(&c.file), c.line)
                        .with_pattern(class_pattern(lang, name))
                })
                .collect(),
            Target::Method { class, name } => self
                .graph
                .classes_named(class)
                .filter_map(|c| {
                    let method = c.methods.iter().find(|m| &m.name == name)?;
                    let lang = detect_language(Path::new(&c.file));
                    let loc = match method.line {
                        Some(line) => Location::new(PathBuf::from(&c.file), Some(line))
                            .with_pattern(method_pattern(lang, name)),
                        None => Location::new(PathBuf::from(&c.file), c.line)
                            .with_pattern(class_pattern(lang, class))
                            .with_pattern(method_pattern(lang, name)),
                    };
                    Some(loc)
                })
                .collect(),
        }
    }
}

impl Resolver for GraphResolver {
    fn resolve(&self, intent: &Intent) -> Result<Location, ResolutionError> {
        intent.target.validate()?;
        let candidates = self.candidates(&intent.target);
        let mut location = self.pick(
            intent.target.kind(),
            &intent.target.to_string(),
            intent.file.as_deref(),
            candidates,
        )?;
        location.path = match &intent.file {
            Some(hint) => hint.clone(),
            None => self.path_of(&location.path.to_string_lossy()),
        };
        debug!(target = %intent.target, location = %location, "Resolved through code graph");
        Ok(location)
    }

    fn name(&self) -> &'static str {
        "graph"
    }
}

/// Resolves without a graph: the caller names the file and the declaration
/// is found by a language-specific search pattern
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughResolver;

impl Resolver for PassThroughResolver {
    fn resolve(&self, intent: &Intent) -> Result<Location, ResolutionError> {
        intent.target.validate()?;
        let Some(file) = &intent.file else {
            return Err(ResolutionError::FileRequired {
                kind: intent.target.kind(),
                name: intent.target.to_string(),
            });
        };
        let lang = detect_language(file);
        let location = match &intent.target {
            Target::Function { name } => {
                Location::new(file.clone(), None).with_pattern(function_pattern(lang, name))
            }
            Target::Class { name } => {
                Location::new(file.clone(), None).with_pattern(class_pattern(lang, name))
            }
            Target::Method { class, name } => Location::new(file.clone(), None)
                .with_pattern(class_pattern(lang, class))
                .with_pattern(method_pattern(lang, name)),
        };
        Ok(location)
    }

    fn name(&self) -> &'static str {
        "pass-through"
    }
}
