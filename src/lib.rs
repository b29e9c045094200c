//! # agentipc
//!
//! The agent side of a long-running editor/agent IPC protocol:
//! - Pluggable codecs (json, cbor, msgpack) chosen at startup
//! - Requests decoded and applied strictly in arrival order
//! - Synchronous replies and asynchronous state pushes on one output stream
//! - An idempotent, fixed-order shutdown sequence
//! - Generic key-value stores with lazy per-key initialization
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client                               │
//! └──────────────┬──────────────────────────────▲───────────────┘
//!          input │                              │ output
//! ┌──────────────▼──────────────────────────────┴───────────────┐
//! │                         Agent                                │
//! │          (decode loop / write lock / shutdown)               │
//! └──────────────┬──────────────────────────────▲───────────────┘
//!                │ sync_request                 │ listener
//! ┌──────────────▼──────────────────────────────┴───────────────┐
//! │                         Store                                │
//! │             (reducers, single update lock)                   │
//! └──────────────┬──────────────────────────────────────────────┘
//!                │
//!                ▼
//!         ┌─────────────┐
//!         │  KVStores   │  request-local KVMap → session KVMap
//!         └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod kv;
pub mod ipc;
pub mod protocol;
pub mod store;
pub mod agent;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AgentError, Result};
pub use config::AgentConfig;
pub use agent::Agent;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of agentipc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
