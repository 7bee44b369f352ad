//! Editor binary lookup

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which editor a binary is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    Neovim,
    /// Legacy Vim: usable for provisioning checks, but has no RPC listen mode
    Vim,
}

impl EditorKind {
    /// Program name looked up on the search path
    pub fn program(&self) -> &'static str {
        match self {
            EditorKind::Neovim => "nvim",
            EditorKind::Vim => "vim",
        }
    }

    /// Distribution package name
    pub fn package(&self) -> &'static str {
        match self {
            EditorKind::Neovim => "neovim",
            EditorKind::Vim => "vim",
        }
    }

    pub fn supports_rpc(&self) -> bool {
        matches!(self, EditorKind::Neovim)
    }

    /// Guess the kind from a binary's file name
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.starts_with("nvim") || name.starts_with("neovim") {
            EditorKind::Neovim
        } else {
            EditorKind::Vim
        }
    }
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.package())
    }
}

/// A located editor executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorBinary {
    pub path: PathBuf,
    pub kind: EditorKind,
}

impl EditorBinary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = EditorKind::from_path(&path);
        Self { path, kind }
    }
}

/// Finds the editor: configured path first, then `nvim`, then `vim`
#[derive(Debug, Clone, Default)]
pub struct BinaryLocator {
    configured: Option<PathBuf>,
    /// Overrides `$PATH`
    search_path: Option<OsString>,
}

impl BinaryLocator {
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self {
            configured,
            search_path: None,
        }
    }

    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn locate(&self) -> Option<EditorBinary> {
        if let Some(path) = &self.configured {
            if is_executable(path) {
                debug!(path = %path.display(), "Using configured editor");
                return Some(EditorBinary::new(path.clone()));
            }
            warn!(path = %path.display(), "Configured editor is not an executable file");
        }

        [EditorKind::Neovim, EditorKind::Vim]
            .into_iter()
            .find_map(|kind| {
                self.find_program(kind.program()).map(|path| {
                    debug!(path = %path.display(), %kind, "Found editor on search path");
                    EditorBinary { path, kind }
                })
            })
    }

    fn find_program(&self, program: &str) -> Option<PathBuf> {
        let search_path = match &self.search_path {
            Some(p) => p.clone(),
            None => env::var_os("PATH")?,
        };
        env::split_paths(&search_path)
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(EditorKind::from_path(Path::new("/usr/bin/nvim")), EditorKind::Neovim);
        assert_eq!(EditorKind::from_path(Path::new("/usr/bin/vim")), EditorKind::Vim);
        assert!(!EditorKind::Vim.supports_rpc());
    }

    #[test]
    fn test_prefers_nvim_over_vim() {
        let dir = TempDir::new().unwrap();
        script(dir.path(), "vim");
        let nvim = script(dir.path(), "nvim");

        let found = BinaryLocator::new(None)
            .with_search_path(dir.path())
            .locate()
            .unwrap();
        assert_eq!(found.path, nvim);
        assert_eq!(found.kind, EditorKind::Neovim);
    }

    #[test]
    fn test_falls_back_to_vim() {
        let dir = TempDir::new().unwrap();
        script(dir.path(), "vim");
        let found = BinaryLocator::new(None)
            .with_search_path(dir.path())
            .locate()
            .unwrap();
        assert_eq!(found.kind, EditorKind::Vim);
    }

    #[test]
    fn test_configured_path_wins() {
        let dir = TempDir::new().unwrap();
        script(dir.path(), "nvim");
        let custom = script(dir.path(), "nvim-nightly");

        let found = BinaryLocator::new(Some(custom.clone()))
            .with_search_path(dir.path())
            .locate()
            .unwrap();
        assert_eq!(found.path, custom);
    }

    #[test]
    fn test_missing_configured_path_searches() {
        let dir = TempDir::new().unwrap();
        let nvim = script(dir.path(), "nvim");
        let found = BinaryLocator::new(Some(dir.path().join("nope")))
            .with_search_path(dir.path())
            .locate()
            .unwrap();
        assert_eq!(found.path, nvim);
    }

    #[test]
    fn test_nothing_found() {
        let dir = TempDir::new().unwrap();
        assert!(BinaryLocator::new(None)
            .with_search_path(dir.path())
            .locate()
            .is_none());
    }
}
