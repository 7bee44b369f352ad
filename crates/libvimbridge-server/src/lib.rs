//! Editor process supervision for vimbridge
//!
//! This crate provides:
//! - Editor binary lookup (`BinaryLocator`)
//! - Package-manager provisioning behind the `Installer` trait
//! - The server lock file shared between CLI invocations (`ServerLock`)
//! - Launch, status and shutdown of the headless editor (`EditorSupervisor`)

pub mod binary;
pub mod lock;
pub mod provision;
pub mod supervisor;

pub use binary::{BinaryLocator, EditorBinary, EditorKind};
pub use lock::ServerLock;
pub use provision::{Installer, OsFamily, SystemInstaller};
pub use supervisor::{is_reachable, EditorSupervisor, ServerStatus};
