//! RPC error types

use libvimbridge_core::BridgeError;
use thiserror::Error;

/// Errors that can occur on an RPC connection
#[derive(Error, Debug)]
pub enum RpcError {
    /// TCP connect failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No response within the call timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// The peer closed the connection
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// The peer sent something that is not msgpack-rpc
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The editor rejected the call
    #[error("{method}: {message}")]
    Remote { method: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Whether the connection is unusable after this error
    pub fn is_transport(&self) -> bool {
        !matches!(self, RpcError::Remote { .. })
    }

    /// Whether a fresh connect attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::ConnectionFailed(_) | RpcError::Timeout(_) | RpcError::Disconnected(_)
        )
    }

    pub(crate) fn from_io(err: std::io::Error, timeout_ms: u64) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => RpcError::Timeout(timeout_ms),
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => RpcError::Disconnected(err.to_string()),
            _ => RpcError::Io(err),
        }
    }
}

impl From<RpcError> for BridgeError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Remote { method, message } => BridgeError::Command {
                command: method,
                message,
            },
            other => BridgeError::Session(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_kinds() {
        let err = RpcError::from_io(io::Error::new(io::ErrorKind::WouldBlock, "x"), 50);
        assert!(matches!(err, RpcError::Timeout(50)));
        let err = RpcError::from_io(io::Error::new(io::ErrorKind::UnexpectedEof, "x"), 50);
        assert!(matches!(err, RpcError::Disconnected(_)));
        assert!(err.is_transport());
    }

    #[test]
    fn test_remote_maps_to_command_error() {
        let err: BridgeError = RpcError::Remote {
            method: "nvim_exec2".to_string(),
            message: "E492: Not an editor command: foo".to_string(),
        }
        .into();
        assert!(err.is_command_rejection());
    }
}
