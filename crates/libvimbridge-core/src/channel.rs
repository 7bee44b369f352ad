use std::path::{Path, PathBuf};

use crate::error::BridgeError;
use crate::types::{BufferSnapshot, CommandResult, EditorCommand, SessionId};

/// A serialized command channel to one editor session.
///
/// Calls on one channel are applied in submission order, and a buffer read
/// observes every command submitted before it.
pub trait EditorChannel {
    fn session_id(&self) -> &SessionId;

    /// Submit one command and wait for the editor to acknowledge it
    fn send_command(&self, command: &EditorCommand) -> Result<CommandResult, BridgeError>;

    /// Snapshot the buffer whose name is exactly `path`
    fn read_buffer(&self, path: &Path) -> Result<BufferSnapshot, BridgeError>;

    /// Path of the buffer in the current window; `None` for an unnamed buffer
    fn current_file(&self) -> Result<Option<PathBuf>, BridgeError>;
}

impl<T: EditorChannel + ?Sized> EditorChannel for &T {
    fn session_id(&self) -> &SessionId {
        (**self).session_id()
    }

    fn send_command(&self, command: &EditorCommand) -> Result<CommandResult, BridgeError> {
        (**self).send_command(command)
    }

    fn read_buffer(&self, path: &Path) -> Result<BufferSnapshot, BridgeError> {
        (**self).read_buffer(path)
    }

    fn current_file(&self) -> Result<Option<PathBuf>, BridgeError> {
        (**self).current_file()
    }
}
