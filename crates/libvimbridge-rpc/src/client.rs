//! Blocking msgpack-rpc client over TCP

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use libvimbridge_core::Endpoint;
use rmpv::Value;
use tracing::{trace, warn};

use crate::codec::{error_message, read_message, write_message, Message};
use crate::error::RpcError;
use crate::retry::RetryPolicy;

/// One TCP connection to an editor RPC endpoint
pub struct RpcClient {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    endpoint: Endpoint,
    next_id: u32,
    timeout_ms: u64,
}

impl RpcClient {
    /// Connect once; every later read and write is bounded by `timeout`
    pub fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Self, RpcError> {
        let timeout_ms = timeout.as_millis() as u64;
        let addrs = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| RpcError::ConnectionFailed(format!("{}: {}", endpoint, e)))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Self::from_stream(stream, endpoint.clone(), timeout),
                Err(e) => last_error = Some(e),
            }
        }
        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no address".to_string());
        trace!(%endpoint, timeout_ms, %reason, "Connect failed");
        Err(RpcError::ConnectionFailed(format!("{}: {}", endpoint, reason)))
    }

    /// Connect with bounded exponential backoff. On failure returns the last
    /// error and the number of attempts made.
    pub fn connect_with_retry(
        endpoint: &Endpoint,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<Self, (RpcError, u32)> {
        policy.run(
            |_| Self::connect(endpoint, timeout),
            RpcError::is_retryable,
        )
    }

    fn from_stream(stream: TcpStream, endpoint: Endpoint, timeout: Duration) -> Result<Self, RpcError> {
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: BufWriter::new(stream),
            endpoint,
            next_id: 0,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Call `method` and wait for its response. Notifications arriving in
    /// between are skipped.
    pub fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        trace!(id, method, "RPC call");
        let request = Message::Request {
            id,
            method: method.to_string(),
            params,
        };
        write_message(&mut self.writer, &request, self.timeout_ms)?;

        loop {
            match read_message(&mut self.reader, self.timeout_ms)? {
                Message::Response { id: got, error, result } if got == id => {
                    if error.is_nil() {
                        return Ok(result);
                    }
                    return Err(RpcError::Remote {
                        method: method.to_string(),
                        message: error_message(&error),
                    });
                }
                Message::Response { id: got, .. } => {
                    return Err(RpcError::Protocol(format!(
                        "response id {} does not match request id {}",
                        got, id
                    )));
                }
                Message::Notification { method: note, .. } => {
                    trace!(notification = %note, "Skipping notification");
                }
                Message::Request { method: req, .. } => {
                    warn!(request = %req, "Ignoring request from editor");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libvimbridge_core::config::RpcConfig;
    use std::net::TcpListener;

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_connect_refused_after_all_attempts() {
        let endpoint = Endpoint::new("127.0.0.1", closed_port());
        let config = RpcConfig {
            connect_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            ..RpcConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        let (err, attempts) =
            RpcClient::connect_with_retry(&endpoint, Duration::from_millis(200), &policy)
                .err()
                .unwrap();
        assert_eq!(attempts, 3);
        assert!(matches!(err, RpcError::ConnectionFailed(_)));
    }
}
