//! Editing operations for vimbridge
//!
//! `EditorAgent` combines an editor channel, a change tracker and a
//! translator into caller-facing operations (`edit_function`, `add_import`,
//! ...). Each returns an `OpOutcome` carrying the diff of that operation.
//! `ChangeJournal` persists change records between processes.

pub mod agent;
pub mod executor;
pub mod journal;
pub mod outcome;

pub use agent::EditorAgent;
pub use executor::run_plan;
pub use journal::ChangeJournal;
pub use outcome::OpOutcome;
