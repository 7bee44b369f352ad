//! Editor sessions
//!
//! A session owns one RPC connection. All calls on a session are serialized
//! by the connection mutex, so a buffer read always observes every command
//! submitted before it. Editor rejections leave the session ready; transport
//! errors and timeouts move it to `failed` and drop the connection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use libvimbridge_core::config::RpcConfig;
use libvimbridge_core::translate::normalize_path;
use libvimbridge_core::{
    BridgeError, BufferSnapshot, CommandResult, Cursor, EditorChannel, EditorCommand, Endpoint,
    SessionId, SessionState,
};
use rmpv::Value;
use tracing::{debug, error, info, warn};

use crate::client::RpcClient;
use crate::error::RpcError;
use crate::retry::RetryPolicy;

pub struct Session {
    id: SessionId,
    endpoint: Endpoint,
    state: Mutex<SessionState>,
    conn: Mutex<Option<RpcClient>>,
}

impl Session {
    /// Connect to `endpoint` with retry, then check the editor is responsive
    pub fn connect(endpoint: &Endpoint, config: &RpcConfig) -> Result<Self, BridgeError> {
        let id = SessionId::generate();
        let policy = RetryPolicy::from_config(config);
        debug!(session = %id.short(), %endpoint, attempts = policy.attempts, "Connecting");

        let (client, mode) = policy
            .run(
                |_| {
                    let mut client = RpcClient::connect(endpoint, config.timeout())?;
                    let mode = handshake(&mut client)?;
                    Ok((client, mode))
                },
                RpcError::is_retryable,
            )
            .map_err(|(e, attempts)| BridgeError::Connection {
                endpoint: endpoint.to_string(),
                attempts,
                reason: e.to_string(),
            })?;

        let session = Self {
            id,
            endpoint: endpoint.clone(),
            state: Mutex::new(SessionState::Starting),
            conn: Mutex::new(Some(client)),
        };
        session.set_state(SessionState::Ready);
        info!(session = %id.short(), %endpoint, %mode, "Session ready");
        Ok(session)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionState::Failed)
    }

    fn set_state(&self, next: SessionState) {
        if let Ok(mut state) = self.state.lock() {
            if *state == next {
                return;
            }
            if state.can_transition_to(next) {
                debug!(session = %self.id.short(), from = state.as_str(), to = next.as_str(), "Session state");
                *state = next;
            } else {
                warn!(session = %self.id.short(), from = state.as_str(), to = next.as_str(), "Ignoring illegal session transition");
            }
        }
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Option<RpcClient>>, BridgeError> {
        self.conn
            .lock()
            .map_err(|_| BridgeError::Internal("session connection lock poisoned".to_string()))
    }

    /// Run `f` on the connection as one serialized unit of work
    fn run<T>(
        &self,
        what: &dyn fmt::Display,
        f: impl FnOnce(&mut RpcClient) -> Result<T, RpcError>,
    ) -> Result<T, BridgeError> {
        let mut conn = self.lock_conn()?;
        let state = self.state();
        if !state.accepts_commands() {
            return Err(BridgeError::Session(format!(
                "session {} is {}",
                self.id.short(),
                state
            )));
        }
        let Some(client) = conn.as_mut() else {
            return Err(BridgeError::Session(format!(
                "session {} has no connection",
                self.id.short()
            )));
        };

        self.set_state(SessionState::Busy);
        match f(client) {
            Ok(value) => {
                self.set_state(SessionState::Ready);
                Ok(value)
            }
            Err(RpcError::Remote { message, .. }) => {
                self.set_state(SessionState::Ready);
                debug!(session = %self.id.short(), command = %what, %message, "Editor rejected command");
                Err(BridgeError::command(what, message))
            }
            Err(e) => {
                error!(session = %self.id.short(), command = %what, error = %e, "Session failed");
                self.set_state(SessionState::Failed);
                *conn = None;
                Err(BridgeError::Session(format!(
                    "session {} failed during `{}`: {}",
                    self.id.short(),
                    what,
                    e
                )))
            }
        }
    }

    /// Release the connection. Later calls fail with a session error.
    pub fn close(&self) -> Result<(), BridgeError> {
        let mut conn = self.lock_conn()?;
        if conn.take().is_some() {
            info!(session = %self.id.short(), "Session closed");
        }
        self.set_state(SessionState::Closed);
        Ok(())
    }

    /// Current editor mode, e.g. `n` or `i`
    pub fn mode(&self) -> Result<String, BridgeError> {
        self.run(&"nvim_get_mode", handshake)
    }

    /// Cursor position in the current window
    pub fn cursor(&self) -> Result<Cursor, BridgeError> {
        self.run(&"nvim_win_get_cursor", window_cursor)
    }
}

impl EditorChannel for Session {
    fn session_id(&self) -> &SessionId {
        &self.id
    }

    fn send_command(&self, command: &EditorCommand) -> Result<CommandResult, BridgeError> {
        debug!(session = %self.id.short(), command = %command, "Sending command");
        self.run(command, |client| match command {
            EditorCommand::Ex(cmd) => {
                let opts = Value::Map(vec![(Value::from("output"), Value::from(true))]);
                let result = client.call("nvim_exec2", vec![Value::from(cmd.as_str()), opts])?;
                let output = map_get(&result, "output")
                    .and_then(value_to_string)
                    .unwrap_or_default();
                Ok(CommandResult::with_output(output))
            }
            EditorCommand::Keys(keys) => {
                // Errors raised by typed keys only show up in v:errmsg
                client.call("nvim_set_vvar", vec![Value::from("errmsg"), Value::from("")])?;
                client.call(
                    "nvim_feedkeys",
                    vec![Value::from(keys.as_str()), Value::from("nx"), Value::from(false)],
                )?;
                let errmsg = client.call("nvim_get_vvar", vec![Value::from("errmsg")])?;
                match value_to_string(&errmsg).filter(|m| !m.is_empty()) {
                    Some(message) => Err(RpcError::Remote {
                        method: "nvim_feedkeys".to_string(),
                        message,
                    }),
                    None => Ok(CommandResult::empty()),
                }
            }
            EditorCommand::SetLines { start, end, lines } => {
                let end = end.map(|e| Value::from(e as u64)).unwrap_or(Value::from(-1));
                client.call(
                    "nvim_buf_set_lines",
                    vec![
                        Value::from(0),
                        Value::from(*start as u64),
                        end,
                        Value::from(false),
                        Value::Array(lines.iter().map(|l| Value::from(l.as_str())).collect()),
                    ],
                )?;
                Ok(CommandResult::empty())
            }
        })
    }

    fn read_buffer(&self, path: &Path) -> Result<BufferSnapshot, BridgeError> {
        let what = format!("read {}", path.display());
        let (lines, cursor) = self.run(&what, |client| {
            let buffer = find_buffer(client, path)?;
            let lines = client.call(
                "nvim_buf_get_lines",
                vec![buffer.clone(), Value::from(0), Value::from(-1), Value::from(false)],
            )?;
            let lines = lines
                .as_array()
                .ok_or_else(|| RpcError::Protocol("buffer lines are not an array".to_string()))?
                .iter()
                .map(|l| value_to_string(l).unwrap_or_default())
                .collect::<Vec<_>>();

            let current = client.call("nvim_get_current_buf", vec![])?;
            let cursor = if current == buffer {
                Some(window_cursor(client)?)
            } else {
                None
            };
            Ok((lines, cursor))
        })?;
        Ok(BufferSnapshot::new(self.id, path, lines, cursor))
    }

    fn current_file(&self) -> Result<Option<PathBuf>, BridgeError> {
        self.run(&"current file", |client| {
            let buffer = client.call("nvim_get_current_buf", vec![])?;
            let name = client.call("nvim_buf_get_name", vec![buffer])?;
            Ok(value_to_string(&name)
                .filter(|n| !n.is_empty())
                .map(PathBuf::from))
        })
    }
}

fn handshake(client: &mut RpcClient) -> Result<String, RpcError> {
    let result = client.call("nvim_get_mode", vec![])?;
    let mode = map_get(&result, "mode")
        .and_then(value_to_string)
        .ok_or_else(|| RpcError::Protocol(format!("unexpected nvim_get_mode reply: {}", result)))?;
    if map_get(&result, "blocking").and_then(Value::as_bool) == Some(true) {
        warn!(%mode, "Editor is blocked waiting for input");
    }
    Ok(mode)
}

fn window_cursor(client: &mut RpcClient) -> Result<Cursor, RpcError> {
    let pos = client.call("nvim_win_get_cursor", vec![Value::from(0)])?;
    let parts = pos.as_array().map(Vec::as_slice).unwrap_or_default();
    match parts {
        [row, col] => match (row.as_u64(), col.as_u64()) {
            (Some(row), Some(col)) => Ok(Cursor::new(row as usize, col as usize)),
            _ => Err(RpcError::Protocol(format!("invalid cursor: {}", pos))),
        },
        _ => Err(RpcError::Protocol(format!("invalid cursor: {}", pos))),
    }
}

/// Handle of the buffer named `path`
fn find_buffer(client: &mut RpcClient, path: &Path) -> Result<Value, RpcError> {
    let wanted = normalize_path(path);
    let buffers = client.call("nvim_list_bufs", vec![])?;
    for buffer in buffers.as_array().map(Vec::as_slice).unwrap_or_default() {
        let name = client.call("nvim_buf_get_name", vec![buffer.clone()])?;
        if value_to_string(&name).is_some_and(|name| Path::new(&name) == wanted.as_path()) {
            return Ok(buffer.clone());
        }
    }
    Err(RpcError::Remote {
        method: "nvim_list_bufs".to_string(),
        message: format!("no buffer named {}", wanted.display()),
    })
}

fn map_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .as_map()?
        .iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(
            s.as_str()
                .map(String::from)
                .unwrap_or_else(|| String::from_utf8_lossy(s.as_bytes()).into_owned()),
        ),
        Value::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}
