//! Error types for agentipc
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using AgentError
pub type Result<T> = std::result::Result<T, AgentError>;

/// Unified error type for agentipc operations
#[derive(Debug, Error)]
pub enum AgentError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("ipc.decode: {0}")]
    Decode(String),

    #[error("ipc.encode: {0}")]
    Encode(String),

    #[error("Invalid codec '{name}'. Expected {expected}")]
    InvalidCodec { name: String, expected: String },

    // -------------------------------------------------------------------------
    // Action Errors
    // -------------------------------------------------------------------------
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid data for action {action}: {reason}")]
    ActionData { action: String, reason: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
