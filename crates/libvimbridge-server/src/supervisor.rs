//! Headless editor supervisor
//!
//! Locates (and if needed provisions) the editor, launches it listening on a
//! TCP endpoint, waits until the endpoint accepts connections, and stops it
//! again. A server launched by an earlier process is found through the lock
//! file in the state directory.

use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use libvimbridge_core::config::{BridgeConfig, ProvisionConfig, ServerConfig};
use libvimbridge_core::{BridgeError, Endpoint};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::binary::{BinaryLocator, EditorBinary, EditorKind};
use crate::lock::ServerLock;
use crate::provision::{Installer, SystemInstaller};

const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Snapshot of the supervised server
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub endpoint: Endpoint,
    pub binary: Option<PathBuf>,
    pub started_ts: Option<i64>,
    /// The endpoint accepts TCP connections
    pub reachable: bool,
}

struct RunningEditor {
    child: Child,
    endpoint: Endpoint,
}

pub struct EditorSupervisor {
    server: ServerConfig,
    provision: ProvisionConfig,
    locator: BinaryLocator,
    installer: Box<dyn Installer>,
    state_dir: Option<PathBuf>,
    stop_timeout: Duration,
    available: Option<EditorBinary>,
    running: Option<RunningEditor>,
}

impl EditorSupervisor {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            server: config.server.clone(),
            provision: config.provision.clone(),
            locator: BinaryLocator::new(config.server.editor_path.clone()),
            installer: Box::new(SystemInstaller::detect()),
            state_dir: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            available: None,
            running: None,
        }
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(state_dir.into());
        self
    }

    pub fn with_installer(mut self, installer: Box<dyn Installer>) -> Self {
        self.installer = installer;
        self
    }

    pub fn with_locator(mut self, locator: BinaryLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Locate the editor, installing Neovim and then Vim when neither is
    /// present. The result is cached after the first success.
    pub fn ensure_available(&mut self) -> Result<EditorBinary, BridgeError> {
        if let Some(binary) = &self.available {
            return Ok(binary.clone());
        }
        if let Some(binary) = self.locator.locate() {
            info!(path = %binary.path.display(), kind = %binary.kind, "Editor available");
            self.available = Some(binary.clone());
            return Ok(binary);
        }
        if !self.provision.enabled {
            return Err(BridgeError::Provisioning(
                "neither nvim nor vim was found and provisioning is disabled".to_string(),
            ));
        }

        let mut attempts = Vec::new();
        for kind in [EditorKind::Neovim, EditorKind::Vim] {
            info!(%kind, installer = self.installer.name(), "Installing editor");
            match self.installer.install(kind) {
                Ok(()) => match self.locator.locate() {
                    Some(binary) => {
                        info!(path = %binary.path.display(), kind = %binary.kind, "Editor installed");
                        self.available = Some(binary.clone());
                        return Ok(binary);
                    }
                    None => attempts.push(format!("{}: installed but no binary found", kind)),
                },
                Err(e) => {
                    warn!(%kind, error = %e, "Install failed");
                    attempts.push(format!("{}: {}", kind, e));
                }
            }
        }
        Err(BridgeError::Provisioning(attempts.join("; ")))
    }

    /// Launch the editor listening on `endpoint` and wait until it accepts
    /// connections.
    pub fn start(&mut self, endpoint: &Endpoint) -> Result<u32, BridgeError> {
        if let Some(running) = &mut self.running {
            if running.child.try_wait()?.is_none() {
                return Err(BridgeError::Launch(format!(
                    "an editor is already running on {}",
                    running.endpoint
                )));
            }
            self.running = None;
        }

        check_port_free(endpoint)?;

        let binary = match &self.available {
            Some(binary) => binary.clone(),
            None => self.locator.locate().ok_or_else(|| {
                BridgeError::Launch("editor binary not found (neither nvim nor vim)".to_string())
            })?,
        };
        if !binary.kind.supports_rpc() {
            return Err(BridgeError::Launch(format!(
                "{} is {}, which has no RPC listen mode",
                binary.path.display(),
                binary.kind
            )));
        }

        let mut child = Command::new(&binary.path)
            .arg("--headless")
            .arg("--listen")
            .arg(endpoint.to_string())
            .args(&self.server.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                BridgeError::Launch(format!("failed to spawn {}: {}", binary.path.display(), e))
            })?;
        let pid = child.id();
        debug!(pid, binary = %binary.path.display(), %endpoint, "Spawned editor");

        let timeout = Duration::from_millis(self.server.launch_timeout_ms);
        if let Err(e) = wait_until_ready(&mut child, endpoint, timeout) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        if let Some(state_dir) = &self.state_dir {
            ServerLock::new(pid, endpoint.clone(), &binary.path).write(state_dir)?;
        }
        info!(pid, %endpoint, "Editor server started");
        self.running = Some(RunningEditor {
            child,
            endpoint: endpoint.clone(),
        });
        Ok(pid)
    }

    /// Stop the editor started by this supervisor, or the one recorded in
    /// the lock file. Returns whether anything was stopped.
    pub fn stop(&mut self) -> Result<bool, BridgeError> {
        let mut stopped = false;
        if let Some(mut running) = self.running.take() {
            let pid = running.child.id();
            terminate_child(&mut running.child, self.stop_timeout)?;
            info!(pid, endpoint = %running.endpoint, "Editor server stopped");
            stopped = true;
        } else if let Some(lock) = self.read_lock()? {
            if process_alive(lock.pid) {
                terminate_pid(lock.pid, self.stop_timeout);
                info!(pid = lock.pid, endpoint = %lock.endpoint, "Editor server stopped");
                stopped = true;
            } else {
                debug!(pid = lock.pid, "Removing stale server lock");
            }
        }

        if let Some(state_dir) = &self.state_dir {
            ServerLock::remove(state_dir)?;
        }
        Ok(stopped)
    }

    pub fn status(&mut self, endpoint: &Endpoint) -> Result<ServerStatus, BridgeError> {
        if let Some(running) = &mut self.running {
            if running.child.try_wait()?.is_none() {
                return Ok(ServerStatus {
                    running: true,
                    pid: Some(running.child.id()),
                    endpoint: running.endpoint.clone(),
                    binary: self.available.as_ref().map(|b| b.path.clone()),
                    started_ts: None,
                    reachable: is_reachable(&running.endpoint),
                });
            }
        }

        match self.read_lock()? {
            Some(lock) => Ok(ServerStatus {
                running: process_alive(lock.pid),
                pid: Some(lock.pid),
                reachable: is_reachable(&lock.endpoint),
                endpoint: lock.endpoint,
                binary: Some(lock.binary),
                started_ts: Some(lock.started_ts),
            }),
            None => Ok(ServerStatus {
                running: false,
                pid: None,
                endpoint: endpoint.clone(),
                binary: None,
                started_ts: None,
                reachable: is_reachable(endpoint),
            }),
        }
    }

    fn read_lock(&self) -> Result<Option<ServerLock>, BridgeError> {
        match &self.state_dir {
            Some(dir) => ServerLock::read(dir),
            None => Ok(None),
        }
    }

    pub fn state_dir(&self) -> Option<&Path> {
        self.state_dir.as_deref()
    }
}

/// Whether `endpoint` accepts a TCP connection right now
pub fn is_reachable(endpoint: &Endpoint) -> bool {
    let Ok(addrs) = (endpoint.host.as_str(), endpoint.port).to_socket_addrs() else {
        return false;
    };
    addrs
        .into_iter()
        .any(|addr| TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok())
}

fn check_port_free(endpoint: &Endpoint) -> Result<(), BridgeError> {
    match TcpListener::bind((endpoint.host.as_str(), endpoint.port)) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AddrInUse => Err(BridgeError::Launch(format!(
            "port {} already in use on {}",
            endpoint.port, endpoint.host
        ))),
        Err(e) => Err(BridgeError::Launch(format!("cannot bind {}: {}", endpoint, e))),
    }
}

fn wait_until_ready(child: &mut Child, endpoint: &Endpoint, timeout: Duration) -> Result<(), BridgeError> {
    let start = Instant::now();
    let mut delay = Duration::from_millis(50);

    loop {
        if let Some(status) = child.try_wait()? {
            return Err(BridgeError::Launch(format!(
                "editor exited early with {}",
                status
            )));
        }
        if is_reachable(endpoint) {
            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Editor endpoint ready");
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(BridgeError::Launch(format!(
                "{} not accepting connections after {}ms",
                endpoint,
                timeout.as_millis()
            )));
        }
        thread::sleep(delay);
        delay = (delay * 2).min(Duration::from_millis(500));
    }
}

fn terminate_child(child: &mut Child, timeout: Duration) -> Result<(), BridgeError> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }
    send_sigterm(child.id());

    let start = Instant::now();
    while start.elapsed() < timeout {
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(20));
    }
    warn!(pid = child.id(), "Editor ignored SIGTERM, killing");
    child.kill()?;
    child.wait()?;
    Ok(())
}

fn terminate_pid(pid: u32, timeout: Duration) {
    send_sigterm(pid);
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_alive(pid) {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    warn!(pid, "Editor ignored SIGTERM, killing");
    send_sigkill(pid);
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(unix)]
fn send_sigkill(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {}

#[cfg(not(unix))]
fn send_sigkill(pid: u32) {
    warn!(pid, "Cannot signal processes on this platform");
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}
