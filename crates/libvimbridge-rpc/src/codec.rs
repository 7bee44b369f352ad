//! msgpack-rpc framing
//!
//! Requests are `[0, msgid, method, params]`, responses
//! `[1, msgid, error, result]` and notifications `[2, method, params]`.

use std::io::{Read, Write};

use rmpv::Value;

use crate::error::RpcError;

const REQUEST: u64 = 0;
const RESPONSE: u64 = 1;
const NOTIFICATION: u64 = 2;

/// One decoded msgpack-rpc message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: u32,
        method: String,
        params: Vec<Value>,
    },
    Response {
        id: u32,
        error: Value,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

impl Message {
    pub fn to_value(&self) -> Value {
        match self {
            Message::Request { id, method, params } => Value::Array(vec![
                Value::from(REQUEST),
                Value::from(*id),
                Value::from(method.as_str()),
                Value::Array(params.clone()),
            ]),
            Message::Response { id, error, result } => Value::Array(vec![
                Value::from(RESPONSE),
                Value::from(*id),
                error.clone(),
                result.clone(),
            ]),
            Message::Notification { method, params } => Value::Array(vec![
                Value::from(NOTIFICATION),
                Value::from(method.as_str()),
                Value::Array(params.clone()),
            ]),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        let Value::Array(items) = value else {
            return Err(RpcError::Protocol(format!("expected array, got {}", value)));
        };
        let mut items = items.into_iter();
        let kind = items.next().and_then(|v| v.as_u64());
        let message = match kind {
            Some(REQUEST) => {
                let id = next_id(&mut items)?;
                let method = next_string(&mut items)?;
                let params = next_array(&mut items)?;
                Message::Request { id, method, params }
            }
            Some(RESPONSE) => {
                let id = next_id(&mut items)?;
                let error = items.next().unwrap_or(Value::Nil);
                let result = items.next().unwrap_or(Value::Nil);
                Message::Response { id, error, result }
            }
            Some(NOTIFICATION) => {
                let method = next_string(&mut items)?;
                let params = next_array(&mut items)?;
                Message::Notification { method, params }
            }
            other => {
                return Err(RpcError::Protocol(format!(
                    "unknown message type {:?}",
                    other
                )))
            }
        };
        Ok(message)
    }
}

fn next_id(items: &mut impl Iterator<Item = Value>) -> Result<u32, RpcError> {
    items
        .next()
        .and_then(|v| v.as_u64())
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| RpcError::Protocol("missing or invalid message id".to_string()))
}

fn next_string(items: &mut impl Iterator<Item = Value>) -> Result<String, RpcError> {
    items
        .next()
        .and_then(|v| v.as_str().map(String::from))
        .ok_or_else(|| RpcError::Protocol("missing method name".to_string()))
}

fn next_array(items: &mut impl Iterator<Item = Value>) -> Result<Vec<Value>, RpcError> {
    match items.next() {
        Some(Value::Array(params)) => Ok(params),
        Some(Value::Nil) | None => Ok(Vec::new()),
        Some(other) => Err(RpcError::Protocol(format!("expected params array, got {}", other))),
    }
}

/// Encode `message` and write it as one frame
pub fn write_message<W: Write>(
    writer: &mut W,
    message: &Message,
    timeout_ms: u64,
) -> Result<(), RpcError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &message.to_value())
        .map_err(|e| RpcError::Protocol(format!("encode failed: {}", e)))?;
    writer
        .write_all(&buf)
        .and_then(|_| writer.flush())
        .map_err(|e| RpcError::from_io(e, timeout_ms))
}

/// Read and decode one message
pub fn read_message<R: Read>(reader: &mut R, timeout_ms: u64) -> Result<Message, RpcError> {
    let value = rmpv::decode::read_value(reader).map_err(|e| match e {
        rmpv::decode::Error::InvalidMarkerRead(io) | rmpv::decode::Error::InvalidDataRead(io) => {
            RpcError::from_io(io, timeout_ms)
        }
        #[allow(unreachable_patterns)]
        other => RpcError::Protocol(other.to_string()),
    })?;
    Message::from_value(value)
}

/// Human-readable text of an error value. Neovim sends `[type, message]`.
pub fn error_message(error: &Value) -> String {
    match error {
        Value::Array(parts) => parts
            .iter()
            .rev()
            .find_map(|p| p.as_str().map(String::from))
            .unwrap_or_else(|| error.to_string()),
        Value::String(s) => s.as_str().map(String::from).unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_request_frame_layout() {
        let msg = Message::Request {
            id: 7,
            method: "nvim_get_mode".to_string(),
            params: vec![],
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &msg, 100).unwrap();

        let value = rmpv::decode::read_value(&mut Cursor::new(&buf)).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items[0].as_u64(), Some(0));
        assert_eq!(items[1].as_u64(), Some(7));
        assert_eq!(items[2].as_str(), Some("nvim_get_mode"));
        assert_eq!(read_message(&mut Cursor::new(&buf), 100).unwrap(), msg);
    }

    #[test]
    fn test_decode_notification_and_response() {
        let mut buf = Vec::new();
        let note = Message::Notification {
            method: "redraw".to_string(),
            params: vec![Value::from(1)],
        };
        let resp = Message::Response {
            id: 1,
            error: Value::Nil,
            result: Value::from("ok"),
        };
        write_message(&mut buf, &note, 100).unwrap();
        write_message(&mut buf, &resp, 100).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_message(&mut cursor, 100).unwrap(), note);
        assert_eq!(read_message(&mut cursor, 100).unwrap(), resp);
        assert!(matches!(
            read_message(&mut cursor, 100),
            Err(RpcError::Disconnected(_))
        ));
    }

    #[test]
    fn test_invalid_frames() {
        assert!(Message::from_value(Value::from(3)).is_err());
        assert!(Message::from_value(Value::Array(vec![Value::from(9)])).is_err());
    }

    #[test]
    fn test_error_message() {
        let err = Value::Array(vec![Value::from(0), Value::from("E486: Pattern not found: x")]);
        assert_eq!(error_message(&err), "E486: Pattern not found: x");
        assert_eq!(error_message(&Value::from("boom")), "boom");
    }
}
