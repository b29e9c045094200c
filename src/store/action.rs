//! Action definitions
//!
//! Actions are the unit of change applied by the store. Client requests name
//! them; the `ActionRegistry` turns each name and payload into a value.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::{AgentError, Result};
use crate::protocol::{ActionData, RequestAction};

/// Profile label for reducer passes that have no action
pub const RENDER_LABEL: &str = "Render";

/// A change applied by the store
pub trait Action: Send + Sync + fmt::Debug + 'static {
    /// Human-readable identity, used in profiles and logs
    fn name(&self) -> &str;

    /// Access to the concrete type, for reducers
    fn as_any(&self) -> &dyn Any;
}

/// Dispatched once when the agent starts serving
#[derive(Debug, Clone, Copy, Default)]
pub struct Started;

impl Action for Started {
    fn name(&self) -> &str {
        "Started"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Dispatched once while the agent shuts down
#[derive(Debug, Clone, Copy, Default)]
pub struct Shutdown;

impl Action for Shutdown {
    fn name(&self) -> &str {
        "Shutdown"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds an action from its request payload
pub type ActionCreator = Box<dyn Fn(&ActionData) -> Result<Arc<dyn Action>> + Send + Sync>;

/// Explicit mapping from action name to creator
#[derive(Default)]
pub struct ActionRegistry {
    creators: HashMap<String, ActionCreator>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a creator function under `name`
    pub fn register_fn<F>(&mut self, name: impl Into<String>, creator: F) -> Result<()>
    where
        F: Fn(&ActionData) -> Result<Arc<dyn Action>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.creators.contains_key(&name) {
            return Err(AgentError::Config(format!(
                "action '{}' is already registered",
                name
            )));
        }
        self.creators.insert(name, Box::new(creator));
        Ok(())
    }

    /// Register `T`, decoded from the payload, under `name`
    pub fn register<T>(&mut self, name: impl Into<String>) -> Result<()>
    where
        T: Action + DeserializeOwned,
    {
        let name = name.into();
        let label = name.clone();
        self.register_fn(name, move |data| {
            let action: T = data.decode().map_err(|e| match e {
                AgentError::Decode(reason) => AgentError::ActionData {
                    action: label.clone(),
                    reason,
                },
                other => other,
            })?;
            Ok(Arc::new(action) as Arc<dyn Action>)
        })
    }

    /// Create the action a request names
    pub fn create(&self, ra: &RequestAction) -> Result<Arc<dyn Action>> {
        match self.creators.get(&ra.name) {
            Some(creator) => creator(&ra.data),
            None => Err(AgentError::UnknownAction(ra.name.clone())),
        }
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.creators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("names", &self.names())
            .finish()
    }
}
