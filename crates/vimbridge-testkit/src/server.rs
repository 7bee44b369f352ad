//! Fake editor RPC server
//!
//! Serves a `FakeEditor` over msgpack-rpc on a loopback port, one thread per
//! connection. Faults can be injected per method to exercise timeout and
//! disconnect handling.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use libvimbridge_core::Endpoint;
use rmpv::Value;
use tracing::debug;

use crate::editor::FakeEditor;

/// Injected misbehaviour, keyed by RPC method name
#[derive(Debug, Default, Clone)]
pub struct Faults {
    /// Never answer calls to this method
    pub hang_on: Option<String>,
    /// Close the connection instead of answering this method
    pub disconnect_on: Option<String>,
    /// Send a notification before every response
    pub notify_before_response: bool,
}

pub struct FakeEditorServer {
    endpoint: Endpoint,
    editor: Arc<Mutex<FakeEditor>>,
    faults: Arc<Mutex<Faults>>,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl FakeEditorServer {
    pub fn start(editor: FakeEditor) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let editor = Arc::new(Mutex::new(editor));
        let faults = Arc::new(Mutex::new(Faults::default()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_thread = {
            let editor = Arc::clone(&editor);
            let faults = Arc::clone(&faults);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    let editor = Arc::clone(&editor);
                    let faults = Arc::clone(&faults);
                    let shutdown = Arc::clone(&shutdown);
                    thread::spawn(move || {
                        if let Err(e) = serve(stream, &editor, &faults, &shutdown) {
                            debug!(error = %e, "Fake editor connection ended");
                        }
                    });
                }
            })
        };

        Ok(Self {
            endpoint: Endpoint::new("127.0.0.1", port),
            editor,
            faults,
            shutdown,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Inspect or modify the editor state
    pub fn editor(&self) -> MutexGuard<'_, FakeEditor> {
        lock(&self.editor)
    }

    pub fn set_faults(&self, faults: Faults) {
        *lock(&self.faults) = faults;
    }
}

impl Drop for FakeEditorServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop
        let _ = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port));
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn serve(
    stream: TcpStream,
    editor: &Mutex<FakeEditor>,
    faults: &Mutex<Faults>,
    shutdown: &AtomicBool,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    loop {
        let value = match rmpv::decode::read_value(&mut reader) {
            Ok(value) => value,
            Err(e) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, e.to_string())),
        };
        if shutdown.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some((id, method, params)) = parse_request(value) else {
            continue;
        };

        let faults = lock(faults).clone();
        if faults.hang_on.as_deref() == Some(method.as_str()) {
            while !shutdown.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(10));
            }
            return Ok(());
        }
        if faults.disconnect_on.as_deref() == Some(method.as_str()) {
            return Ok(());
        }
        if faults.notify_before_response {
            let note = Value::Array(vec![
                Value::from(2),
                Value::from("nvim_buf_changedtick_event"),
                Value::Array(vec![]),
            ]);
            send(&mut writer, &note)?;
        }

        let response = match dispatch(&mut lock(editor), &method, &params) {
            Ok(result) => Value::Array(vec![Value::from(1), Value::from(id), Value::Nil, result]),
            Err(message) => Value::Array(vec![
                Value::from(1),
                Value::from(id),
                Value::Array(vec![Value::from(0), Value::from(message)]),
                Value::Nil,
            ]),
        };
        send(&mut writer, &response)?;
    }
}

fn send(writer: &mut BufWriter<TcpStream>, value: &Value) -> io::Result<()> {
    rmpv::encode::write_value(writer, value)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    writer.flush()
}

fn parse_request(value: Value) -> Option<(u64, String, Vec<Value>)> {
    let Value::Array(items) = value else { return None };
    match items.as_slice() {
        [kind, id, method, Value::Array(params)] if kind.as_u64() == Some(0) => {
            Some((id.as_u64()?, method.as_str()?.to_string(), params.clone()))
        }
        _ => None,
    }
}

/// Buffer handles travel as msgpack EXT type 0, like Neovim's
fn buffer_value(handle: u64) -> Value {
    let mut data = Vec::new();
    let _ = rmpv::encode::write_value(&mut data, &Value::from(handle));
    Value::Ext(0, data)
}

fn buffer_handle(value: Option<&Value>) -> Result<u64, String> {
    match value {
        Some(Value::Ext(_, data)) => rmpv::decode::read_value(&mut data.as_slice())
            .ok()
            .and_then(|v| v.as_u64())
            .ok_or_else(|| "Invalid buffer handle".to_string()),
        Some(v) => v.as_u64().ok_or_else(|| "Invalid buffer handle".to_string()),
        None => Err("Missing buffer argument".to_string()),
    }
}

fn str_arg<'a>(params: &'a [Value], idx: usize) -> Result<&'a str, String> {
    params
        .get(idx)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Expected string argument {}", idx))
}

fn int_arg(params: &[Value], idx: usize) -> Result<i64, String> {
    params
        .get(idx)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("Expected integer argument {}", idx))
}

fn dispatch(editor: &mut FakeEditor, method: &str, params: &[Value]) -> Result<Value, String> {
    match method {
        "nvim_get_mode" => Ok(Value::Map(vec![
            (Value::from("mode"), Value::from(editor.mode().as_str())),
            (Value::from("blocking"), Value::from(false)),
        ])),
        "nvim_exec2" => {
            let output = editor.exec(str_arg(params, 0)?)?;
            Ok(Value::Map(vec![(Value::from("output"), Value::from(output))]))
        }
        "nvim_feedkeys" => {
            editor.feedkeys(str_arg(params, 0)?);
            Ok(Value::Nil)
        }
        "nvim_get_vvar" => Ok(Value::from(editor.vvar(str_arg(params, 0)?)?)),
        "nvim_set_vvar" => {
            let value = params.get(1).and_then(Value::as_str).unwrap_or_default();
            editor.set_vvar(str_arg(params, 0)?, value)?;
            Ok(Value::Nil)
        }
        "nvim_buf_set_lines" => {
            let handle = buffer_handle(params.first())?;
            let lines = params
                .get(4)
                .and_then(Value::as_array)
                .ok_or_else(|| "Expected lines array".to_string())?
                .iter()
                .map(|l| l.as_str().map(String::from).ok_or_else(|| "String expected".to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            editor.set_lines(handle, int_arg(params, 1)?, int_arg(params, 2)?, lines)?;
            Ok(Value::Nil)
        }
        "nvim_buf_get_lines" => {
            let handle = buffer_handle(params.first())?;
            let lines = editor.get_lines(handle, int_arg(params, 1)?, int_arg(params, 2)?)?;
            Ok(Value::Array(lines.into_iter().map(Value::from).collect()))
        }
        "nvim_list_bufs" => Ok(Value::Array(
            editor.buffers().iter().map(|b| buffer_value(b.handle)).collect(),
        )),
        "nvim_buf_get_name" => {
            let idx = editor.buffer_index(buffer_handle(params.first())?)?;
            Ok(Value::from(editor.buffers()[idx].name.as_str()))
        }
        "nvim_get_current_buf" => Ok(buffer_value(editor.current_buffer().handle)),
        "nvim_win_get_cursor" => {
            let pos = editor.cursor();
            Ok(Value::Array(vec![
                Value::from(pos.row as u64 + 1),
                Value::from(pos.col as u64),
            ]))
        }
        other => Err(format!("Invalid method: {}", other)),
    }
}
