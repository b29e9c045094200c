//! IPC Module
//!
//! Stream plumbing between the agent and its client.
//!
//! ## Architecture
//! - The client writes requests to the agent's input stream
//! - The agent writes responses and pushes to its output stream
//! - Logs go to a separate error stream
//!
//! Every stream is wrapped in a lock-guarded handle so the decode loop, the
//! push path and shutdown can share it safely.

mod stream;

pub use stream::{SharedReader, SharedWriter};
