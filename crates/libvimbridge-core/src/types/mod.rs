pub mod change;
pub mod command;
pub mod ids;
pub mod session;
pub mod snapshot;

pub use change::ChangeRecord;
pub use command::{CommandResult, EditorCommand};
pub use ids::{Endpoint, SessionId};
pub use session::SessionState;
pub use snapshot::{BufferSnapshot, Cursor};
