use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::Endpoint;

pub const CONFIG_FILE: &str = "config.toml";

/// Configuration stored in <state_dir>/config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Code relationship graph; relative paths are resolved against the
    /// working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<PathBuf>,
    pub server: ServerConfig,
    pub rpc: RpcConfig,
    pub tracking: TrackingConfig,
    pub provision: ProvisionConfig,
}

/// Editor server launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Explicit editor binary; searched on PATH when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_path: Option<PathBuf>,
    pub extra_args: Vec<String>,
    pub launch_timeout_ms: u64,
    /// Launch the server on first use when nothing is listening
    pub auto_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6666,
            editor_path: None,
            extra_args: vec!["--clean".to_string(), "-n".to_string()],
            launch_timeout_ms: 5000,
            auto_start: true,
        }
    }
}

/// RPC connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Read/write timeout of every call
    pub timeout_ms: u64,
    pub connect_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            connect_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Write the buffer to disk after each successful operation
    pub auto_write: bool,
    pub context_lines: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            auto_write: true,
            context_lines: crate::diff::DEFAULT_CONTEXT_LINES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Install the editor with the system package manager when missing
    pub enabled: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl BridgeConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.server.host.clone(), self.server.port)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.server.host.is_empty() {
            return Err(BridgeError::Config("server.host must not be empty".to_string()));
        }
        if self.server.port == 0 {
            return Err(BridgeError::Config("server.port must not be 0".to_string()));
        }
        if self.rpc.connect_attempts == 0 {
            return Err(BridgeError::Config(
                "rpc.connect_attempts must be at least 1".to_string(),
            ));
        }
        if self.rpc.timeout_ms == 0 {
            return Err(BridgeError::Config("rpc.timeout_ms must not be 0".to_string()));
        }
        Ok(())
    }
}

/// Load config from <state_dir>/config.toml; defaults when the file is absent
pub fn load_config(state_dir: &Path) -> Result<BridgeConfig, BridgeError> {
    load_config_file(&state_dir.join(CONFIG_FILE))
}

/// Load config from an explicit file; defaults when the file is absent
pub fn load_config_file(path: &Path) -> Result<BridgeConfig, BridgeError> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    let config: BridgeConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save config to <state_dir>/config.toml
pub fn save_config(state_dir: &Path, config: &BridgeConfig) -> Result<(), BridgeError> {
    std::fs::create_dir_all(state_dir)?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(state_dir.join(CONFIG_FILE), content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.endpoint().to_string(), "127.0.0.1:6666");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let mut config = BridgeConfig::default();
        config.server.port = 7777;
        config.server.editor_path = Some(PathBuf::from("/opt/nvim/bin/nvim"));
        config.tracking.auto_write = false;
        config.graph = Some(PathBuf::from("graph.json"));

        save_config(dir.path(), &config).unwrap();
        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[server]\nport = 7000\n\n[rpc]\ntimeout_ms = 500\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.rpc.timeout(), Duration::from_millis(500));
        assert_eq!(config.rpc.connect_attempts, 5);
        assert!(config.tracking.auto_write);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[rpc]\nconnect_attempts = 0\n").unwrap();
        assert!(matches!(load_config(dir.path()), Err(BridgeError::Config(_))));

        std::fs::write(dir.path().join(CONFIG_FILE), "[server]\nport = \"x\"\n").unwrap();
        assert!(matches!(load_config(dir.path()), Err(BridgeError::TomlParse(_))));
    }
}
