//! Configuration for agentipc
//!
//! Everything an `Agent` needs, consumed once at construction.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::store::{ActionRegistry, Reducer};

/// Environment variable whose value, when set, is added as a status message
/// to every outgoing state
pub const BUILD_ERROR_ENV: &str = "AGENTIPC_BUILD_ERROR";

/// Default agent display name
pub const DEFAULT_AGENT_NAME: &str = "agentipc";

/// Main configuration for an Agent
pub struct AgentConfig {
    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------
    /// Display name, as used in logs and client properties
    pub agent_name: String,

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------
    /// Codec name: json, cbor or msgpack (empty selects the default)
    pub codec: String,

    /// Stream the client writes requests to (default: process stdin)
    /// Closed when the agent shuts down
    pub stdin: Option<Box<dyn Read + Send>>,

    /// Stream the agent writes responses to (default: process stdout)
    /// Closed when the agent shuts down
    pub stdout: Option<Box<dyn Write + Send>>,

    /// Stream used for logging (default: process stderr)
    /// Left open so logging keeps working during shutdown
    pub stderr: Option<Box<dyn Write + Send>>,

    // -------------------------------------------------------------------------
    // State Machine
    // -------------------------------------------------------------------------
    /// Actions clients may request by name
    pub actions: ActionRegistry,

    /// Reducers appended to the store's main list
    pub reducers: Vec<Arc<dyn Reducer>>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            codec: String::new(),
            stdin: None,
            stdout: None,
            stderr: None,
            actions: ActionRegistry::new(),
            reducers: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Create a new config builder
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("agent_name", &self.agent_name)
            .field("codec", &self.codec)
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("actions", &self.actions)
            .field("reducers", &self.reducers.len())
            .finish()
    }
}

/// Builder for AgentConfig
#[derive(Default)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    /// Set the agent display name
    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.config.agent_name = name.into();
        self
    }

    /// Set the codec name
    pub fn codec(mut self, codec: impl Into<String>) -> Self {
        self.config.codec = codec.into();
        self
    }

    /// Set the input stream
    pub fn stdin(mut self, stdin: impl Read + Send + 'static) -> Self {
        self.config.stdin = Some(Box::new(stdin));
        self
    }

    /// Set the output stream
    pub fn stdout(mut self, stdout: impl Write + Send + 'static) -> Self {
        self.config.stdout = Some(Box::new(stdout));
        self
    }

    /// Set the log stream
    pub fn stderr(mut self, stderr: impl Write + Send + 'static) -> Self {
        self.config.stderr = Some(Box::new(stderr));
        self
    }

    /// Set the action registry
    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.config.actions = actions;
        self
    }

    /// Append a reducer to the store's main list
    pub fn reducer(mut self, reducer: Arc<dyn Reducer>) -> Self {
        self.config.reducers.push(reducer);
        self
    }

    pub fn build(self) -> AgentConfig {
        self.config
    }
}
