//! Server lock file
//!
//! Records the editor server launched by one CLI invocation so later
//! invocations can report on it and stop it. Stored at
//! `<state_dir>/server.lock`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use libvimbridge_core::{BridgeError, Endpoint};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerLock {
    /// Process ID of the editor
    pub pid: u32,
    /// RPC listen address
    pub endpoint: Endpoint,
    /// Editor binary that was launched
    pub binary: PathBuf,
    /// Launch time (Unix timestamp in ms)
    pub started_ts: i64,
}

impl ServerLock {
    pub fn new(pid: u32, endpoint: Endpoint, binary: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            endpoint,
            binary: binary.into(),
            started_ts: Utc::now().timestamp_millis(),
        }
    }

    pub fn lock_path(state_dir: &Path) -> PathBuf {
        state_dir.join("server.lock")
    }

    pub fn read(state_dir: &Path) -> Result<Option<Self>, BridgeError> {
        let path = Self::lock_path(state_dir);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn write(&self, state_dir: &Path) -> Result<(), BridgeError> {
        fs::create_dir_all(state_dir)?;
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(Self::lock_path(state_dir), contents)?;
        Ok(())
    }

    pub fn remove(state_dir: &Path) -> Result<(), BridgeError> {
        let path = Self::lock_path(state_dir);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
