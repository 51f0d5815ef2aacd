//! Network side of the Engine2Learn bridge
//!
//! This crate provides:
//! - Transport abstractions (AsyncReader/AsyncWriter traits) over
//!   8-digit length-prefixed MessagePack frames
//! - TCP framed halves
//! - The bridge server: accept loop, per-connection dispatch, start/stop

pub mod server;
pub mod tcp;
pub mod transport;

pub use server::{BridgeServer, ServerHandle, SharedDispatcher, serve_connection};
pub use transport::{AsyncReader, AsyncWriter, FramedReader, FramedWriter};
