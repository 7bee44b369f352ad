use std::path::{Path, PathBuf};

use libvimbridge_agent::{ChangeJournal, EditorAgent};
use libvimbridge_core::config::{load_config, load_config_file};
use libvimbridge_core::translate::{normalize_path, GraphResolver, Translator};
use libvimbridge_core::{BridgeConfig, BridgeError, CodeGraph, Endpoint};
use libvimbridge_rpc::Session;
use libvimbridge_server::{is_reachable, EditorSupervisor};
use tracing::{debug, info};

use crate::cli::Cli;

const DEFAULT_STATE_DIR: &str = ".vimbridge";

/// Resolved settings for one CLI invocation
pub struct BridgeContext {
    /// Working directory; relative paths and graph file names resolve here
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub config: BridgeConfig,
}

impl BridgeContext {
    pub fn resolve(cli: &Cli) -> Result<Self, BridgeError> {
        let root = std::env::current_dir()?;
        let state_dir = match &cli.state_dir {
            Some(dir) => absolute(&root, dir),
            None => root.join(DEFAULT_STATE_DIR),
        };

        let mut config = match &cli.config {
            Some(path) => {
                let path = absolute(&root, path);
                if !path.exists() {
                    return Err(BridgeError::Config(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                load_config_file(&path)?
            }
            None => load_config(&state_dir)?,
        };

        if let Some(endpoint) = &cli.endpoint {
            let endpoint: Endpoint = endpoint.parse()?;
            config.server.host = endpoint.host;
            config.server.port = endpoint.port;
        }
        if let Some(graph) = &cli.graph {
            config.graph = Some(graph.clone());
        }
        config.validate()?;

        debug!(
            root = %root.display(),
            state_dir = %state_dir.display(),
            endpoint = %config.endpoint(),
            "Resolved context"
        );
        Ok(Self {
            root,
            state_dir,
            config,
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.config.endpoint()
    }

    pub fn path(&self, path: &Path) -> PathBuf {
        absolute(&self.root, path)
    }

    /// Graph-backed translator when a graph is configured
    pub fn translator(&self) -> Result<Translator, BridgeError> {
        match &self.config.graph {
            Some(graph) => {
                let graph = CodeGraph::load(&self.path(graph))?;
                Ok(Translator::new(Box::new(GraphResolver::new(graph, &self.root))))
            }
            None => Ok(Translator::pass_through()),
        }
    }

    pub fn supervisor(&self) -> EditorSupervisor {
        EditorSupervisor::new(&self.config).with_state_dir(&self.state_dir)
    }

    pub fn journal(&self) -> Result<ChangeJournal, BridgeError> {
        ChangeJournal::load(&self.state_dir)
    }

    /// Connect an agent, starting the editor server first when it is not
    /// reachable and auto start is on
    pub fn connect(&self) -> Result<EditorAgent<Session>, BridgeError> {
        let endpoint = self.endpoint();
        if self.config.server.auto_start && !is_reachable(&endpoint) {
            info!(%endpoint, "Editor server not reachable, starting it");
            let mut supervisor = self.supervisor();
            supervisor.ensure_available()?;
            supervisor.start(&endpoint)?;
        }
        EditorAgent::connect(&self.config, self.translator()?, &self.root)
    }
}

fn absolute(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&root.join(path))
    }
}
