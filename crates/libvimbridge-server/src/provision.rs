//! Editor provisioning through the system package manager

use std::fs;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::binary::EditorKind;

const OS_RELEASE: &str = "/etc/os-release";

/// Installs an editor package
pub trait Installer {
    fn install(&self, kind: EditorKind) -> Result<(), String>;

    /// Human-readable installer name for log lines
    fn name(&self) -> &str;
}

/// Operating system family, from `/etc/os-release`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsFamily {
    Debian,
    Alpine,
    Other(String),
}

impl OsFamily {
    /// Classify by the `ID` and `ID_LIKE` keys
    pub fn from_os_release(content: &str) -> Self {
        let mut ids = Vec::new();
        for line in content.lines() {
            if let Some((key, value)) = line.split_once('=') {
                if key == "ID" || key == "ID_LIKE" {
                    let value = value.trim().trim_matches('"').to_ascii_lowercase();
                    ids.extend(value.split_whitespace().map(String::from));
                }
            }
        }
        if ids.iter().any(|id| id == "debian" || id == "ubuntu") {
            OsFamily::Debian
        } else if ids.iter().any(|id| id == "alpine") {
            OsFamily::Alpine
        } else {
            OsFamily::Other(ids.first().cloned().unwrap_or_else(|| "unknown".to_string()))
        }
    }

    pub fn detect() -> Self {
        match fs::read_to_string(OS_RELEASE) {
            Ok(content) => Self::from_os_release(&content),
            Err(e) => {
                debug!(error = %e, "Cannot read {}", OS_RELEASE);
                OsFamily::Other("unknown".to_string())
            }
        }
    }
}

/// Installs through `apt-get` or `apk`
#[derive(Debug, Clone)]
pub struct SystemInstaller {
    family: OsFamily,
}

impl SystemInstaller {
    pub fn new(family: OsFamily) -> Self {
        Self { family }
    }

    pub fn detect() -> Self {
        Self::new(OsFamily::detect())
    }

    /// Package manager invocations for `kind`, in order
    pub fn commands(&self, kind: EditorKind) -> Result<Vec<Vec<String>>, String> {
        let package = kind.package().to_string();
        match &self.family {
            OsFamily::Debian => Ok(vec![
                vec!["apt-get".into(), "update".into(), "-y".into()],
                vec!["apt-get".into(), "install".into(), "-y".into(), package],
            ]),
            OsFamily::Alpine => Ok(vec![vec![
                "apk".into(),
                "add".into(),
                "--no-cache".into(),
                package,
            ]]),
            OsFamily::Other(id) => Err(format!(
                "unsupported OS '{}' for automatic installation",
                id
            )),
        }
    }
}

impl Installer for SystemInstaller {
    fn install(&self, kind: EditorKind) -> Result<(), String> {
        for argv in self.commands(kind)? {
            let Some((program, args)) = argv.split_first() else {
                continue;
            };
            info!(command = %argv.join(" "), "Running package manager");
            let output = Command::new(program)
                .args(args)
                .env("DEBIAN_FRONTEND", "noninteractive")
                .stdin(Stdio::null())
                .output()
                .map_err(|e| format!("{}: {}", program, e))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!(
                    "`{}` exited with {}: {}",
                    argv.join(" "),
                    output.status,
                    stderr.trim()
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        match self.family {
            OsFamily::Debian => "apt-get",
            OsFamily::Alpine => "apk",
            OsFamily::Other(_) => "none",
        }
    }
}
