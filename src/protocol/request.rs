//! Request definitions
//!
//! Represents batches of actions sent by the client.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{ActionData, Format};
use crate::kv::{KVMap, KVStore, KVStores};
use crate::store::View;

/// Store type backing client properties
pub type PropStore = KVStores<String, serde_json::Value>;

type PropLayer = Arc<dyn KVStore<String, serde_json::Value>>;

/// One named action in a request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestAction {
    /// Name the action was registered under
    pub name: String,

    /// Payload, decoded by the action's creator
    pub data: ActionData,
}

impl RequestAction {
    /// Create an action with the given payload
    pub fn new(name: impl Into<String>, data: impl Into<ActionData>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A decoded client request
///
/// Decoded with `Format::decode_request`, which keeps each payload in the
/// value tree of the codec that carried it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentRequest {
    /// Correlation id echoed in the response
    pub cookie: String,

    /// Actions, applied in order
    pub actions: Vec<RequestAction>,

    /// Client state at the time of the request
    #[serde(rename = "properties")]
    pub props: ClientProps,
}

/// Request as read off the wire, with payloads in the codec's value type `V`
#[derive(Deserialize)]
#[serde(default)]
pub(crate) struct WireRequest<V> {
    cookie: String,
    actions: Vec<WireAction<V>>,
    #[serde(rename = "properties")]
    props: ClientProps,
}

#[derive(Deserialize)]
struct WireAction<V> {
    name: String,
    #[serde(default = "Option::default")]
    data: Option<V>,
}

impl<V> Default for WireRequest<V> {
    fn default() -> Self {
        Self {
            cookie: String::new(),
            actions: Vec::new(),
            props: ClientProps::default(),
        }
    }
}

impl<V: Into<ActionData>> WireRequest<V> {
    /// Wrap the payloads; a missing payload becomes `format`'s null
    pub(crate) fn into_request(self, format: Format) -> AgentRequest {
        let actions = self
            .actions
            .into_iter()
            .map(|a| RequestAction {
                name: a.name,
                data: a.data.map_or_else(|| ActionData::null(format), Into::into),
            })
            .collect();

        AgentRequest {
            cookie: self.cookie,
            actions,
            props: self.props,
        }
    }
}

/// Editor identity reported by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorProps {
    pub name: String,
    pub version: String,
}

/// Properties the client attaches to each request
///
/// The wire fields describe the client; `finalize` adds the agent-side
/// context (agent name and a request-scoped KV layer over the session store).
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientProps {
    pub editor: EditorProps,

    pub env: BTreeMap<String, String>,

    pub view: Option<View>,

    /// Name of the agent that received the request
    #[serde(skip)]
    pub agent_name: String,

    /// Request-local values layered over the session store
    #[serde(skip)]
    pub kvs: PropStore,
}

impl ClientProps {
    /// Properties with no client data, backed only by `session`
    pub fn detached(agent_name: &str, session: Arc<KVMap<String, serde_json::Value>>) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            kvs: PropStore::new().with(Some(session as PropLayer)),
            ..Self::default()
        }
    }

    /// Attach agent-side context to freshly decoded properties
    pub fn finalize(&mut self, agent_name: &str, session: Arc<KVMap<String, serde_json::Value>>) {
        let local: Arc<KVMap<String, serde_json::Value>> = Arc::new(KVMap::new());
        self.agent_name = agent_name.to_string();
        self.kvs = PropStore::new()
            .with(Some(local as PropLayer))
            .with(Some(session as PropLayer));
    }

    /// Look up an environment variable reported by the client
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for ClientProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientProps")
            .field("editor", &self.editor)
            .field("env", &self.env)
            .field("view", &self.view)
            .field("agent_name", &self.agent_name)
            .field("kv_layers", &self.kvs.len())
            .finish()
    }
}
