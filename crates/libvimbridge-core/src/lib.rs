//! Core library for vimbridge
//!
//! This crate provides:
//! - Session, snapshot, and change record types
//! - The `EditorChannel` seam implemented by RPC sessions
//! - Per-session change tracking and unified diffs
//! - Code relationship graph loading
//! - Translation of edit intents into editor command plans
//! - Configuration loading

pub mod channel;
pub mod config;
pub mod diff;
pub mod error;
pub mod graph;
pub mod tracker;
pub mod translate;
pub mod types;

pub use channel::EditorChannel;
pub use config::{load_config, save_config, BridgeConfig};
pub use error::{BridgeError, ResolutionError};
pub use graph::CodeGraph;
pub use tracker::{ChangeTracker, Changes};
pub use types::{
    BufferSnapshot, ChangeRecord, CommandResult, Cursor, EditorCommand, Endpoint, SessionId,
    SessionState,
};
