//! Test doubles for the vimbridge crates
//!
//! `FakeEditor` models the editor behaviour the bridge depends on and
//! `FakeEditorServer` serves it over msgpack-rpc, so sessions, the agent and
//! the CLI can be tested without a Neovim binary.

pub mod editor;
pub mod server;

use std::fs;
use std::path::{Path, PathBuf};

use libvimbridge_core::config::{BridgeConfig, RpcConfig};
use libvimbridge_core::Endpoint;

pub use editor::{vim_regex, FakeBuffer, FakeEditor, Mode, Pos};
pub use server::{FakeEditorServer, Faults};

/// RPC settings with short timeouts so failure tests finish quickly
pub fn fast_rpc_config() -> RpcConfig {
    RpcConfig {
        timeout_ms: 500,
        connect_attempts: 3,
        initial_backoff_ms: 10,
        max_backoff_ms: 50,
    }
}

/// Config pointing at `endpoint` with auto start and provisioning off
pub fn test_config(endpoint: &Endpoint) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.server.host = endpoint.host.clone();
    config.server.port = endpoint.port;
    config.server.auto_start = false;
    config.provision.enabled = false;
    config.rpc = fast_rpc_config();
    config
}

/// Write `content` to `dir/name`, creating parent directories
pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(&path, content).expect("write fixture");
    path
}

/// Start a fake editor server rooted at `dir`
pub fn start_server(dir: &Path) -> FakeEditorServer {
    FakeEditorServer::start(FakeEditor::new(dir)).expect("start fake editor server")
}
