//! Store Module
//!
//! The state machine that applies client actions and produces snapshots.
//!
//! ## Responsibilities
//! - Turn request actions into `Action` values (`ActionRegistry`)
//! - Run the before/use/after reducer pipeline for every action
//! - Publish each resulting `State` through the listener
//!
//! ## Update Model
//! Every update (a request batch or a dispatched action) runs under one
//! lock, so updates apply strictly in hand-off order. Each update starts
//! from the previous state with the transient fields cleared.

mod action;
mod machine;
mod reducer;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use action::{Action, ActionCreator, ActionRegistry, Shutdown, Started, RENDER_LABEL};
pub use machine::{Listener, Store};
pub use reducer::{reduce_fn, Ctx, EnvStatus, ReduceFn, Reducer, StatusDedup, ViewSync};

/// Editor configuration the client should apply
pub trait EditorConfig: Send + Sync + fmt::Debug {
    /// Project the configuration into its wire form
    fn editor_config(&self) -> serde_json::Value;
}

/// The file the client is currently looking at
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct View {
    pub path: String,
    pub name: String,
    pub lang: String,

    /// Bumped whenever the view is replaced during an update
    #[serde(skip)]
    changed: u64,
}

impl View {
    pub fn new(path: impl Into<String>, name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            lang: lang.into(),
            changed: 0,
        }
    }

    /// True if both views describe the same file
    pub fn same_file(&self, other: &View) -> bool {
        self.path == other.path && self.name == other.name && self.lang == other.lang
    }

    /// True if the view changed during the current update
    pub fn changed(&self) -> bool {
        self.changed != 0
    }
}

/// An action the client is asked to perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientAction {
    pub name: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

/// Timing of one pass through the reducer pipeline
#[derive(Debug, Clone)]
pub struct ReducerProfile {
    pub subject: String,

    /// The action being applied; `None` for the render pass
    pub action: Option<Arc<dyn Action>>,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Snapshot of the application state
#[derive(Debug, Clone, Default)]
pub struct State {
    pub errors: Vec<String>,
    pub status: Vec<String>,
    pub client_actions: Vec<ClientAction>,
    pub profiles: Vec<ReducerProfile>,
    pub view: Option<View>,
    pub config: Option<Arc<dyn EditorConfig>>,
}

impl State {
    /// Record an error for the client
    pub fn add_error(&mut self, e: impl fmt::Display) {
        self.errors.push(e.to_string());
    }

    /// Add a status message
    pub fn add_status(&mut self, s: impl Into<String>) {
        self.status.push(s.into());
    }

    /// Ask the client to perform an action
    pub fn add_client_action(&mut self, name: impl Into<String>, data: serde_json::Value) {
        self.client_actions.push(ClientAction {
            name: name.into(),
            data,
        });
    }

    /// Replace the view and mark it changed
    pub fn set_view(&mut self, mut view: View) {
        view.changed = self.view.as_ref().map_or(0, |v| v.changed) + 1;
        self.view = Some(view);
    }

    /// Starting point for the next update: persistent fields are kept,
    /// transient ones cleared
    pub(crate) fn next(&self) -> State {
        State {
            view: self.view.clone().map(|mut v| {
                v.changed = 0;
                v
            }),
            config: self.config.clone(),
            ..State::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_keeps_view_and_clears_transients() {
        let mut state = State::default();
        state.add_error("boom");
        state.add_status("busy");
        state.add_client_action("open", serde_json::json!({"path": "a.rs"}));
        state.set_view(View::new("/a.rs", "a.rs", "rust"));
        assert!(state.view.as_ref().unwrap().changed());

        let next = state.next();
        assert!(next.errors.is_empty());
        assert!(next.status.is_empty());
        assert!(next.client_actions.is_empty());
        let view = next.view.unwrap();
        assert_eq!(view.name, "a.rs");
        assert!(!view.changed());
    }
}
