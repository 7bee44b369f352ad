//! msgpack-rpc client for a headless Neovim server
//!
//! This crate provides:
//! - msgpack-rpc framing (`codec`)
//! - A blocking TCP client with bounded call timeouts (`RpcClient`)
//! - Connect retry with exponential backoff (`RetryPolicy`)
//! - Editor sessions implementing `EditorChannel` (`Session`)

pub mod client;
pub mod codec;
pub mod error;
pub mod retry;
pub mod session;

pub use client::RpcClient;
pub use error::RpcError;
pub use retry::RetryPolicy;
pub use session::Session;
