//! Store implementation
//!
//! Serializes all updates behind one lock and publishes every new state.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use super::{Action, ActionRegistry, Ctx, ReducerProfile, Reducer, State};
use crate::kv::{KVMap, KVStore};
use crate::protocol::{AgentRequest, AgentResponse, ClientProps};

/// Receives every state the store publishes
pub type Listener = Box<dyn Fn(AgentResponse) + Send + Sync>;

/// Profile subject for reducer pipeline passes
const REDUCE_SUBJECT: &str = "reduce";

/// The application state machine
///
/// ## Concurrency:
/// - `update`: held for a whole update, including the listener call, so
///   states are published in the order updates were handed in
/// - `current`: the last published state, readable at any time
/// - `queued`: actions dispatched before `ready()`
///
/// Reducers run under `update` and must not call back into the store.
pub struct Store {
    update: Mutex<()>,
    current: RwLock<Arc<State>>,
    queued: Mutex<Option<Vec<Arc<dyn Action>>>>,
    session: Arc<KVMap<String, serde_json::Value>>,
    idle_props: ClientProps,
    before: Vec<Arc<dyn Reducer>>,
    uses: Vec<Arc<dyn Reducer>>,
    after: Vec<Arc<dyn Reducer>>,
    listener: Listener,
}

impl Store {
    /// Create a store that publishes states to `listener`
    pub fn new(agent_name: &str, listener: Listener) -> Self {
        let session = Arc::new(KVMap::new());
        Self {
            update: Mutex::new(()),
            current: RwLock::new(Arc::new(State::default())),
            queued: Mutex::new(Some(Vec::new())),
            idle_props: ClientProps::detached(agent_name, Arc::clone(&session)),
            session,
            before: Vec::new(),
            uses: Vec::new(),
            after: Vec::new(),
            listener,
        }
    }

    /// Add reducers that run before all others
    pub fn before(mut self, reducers: impl IntoIterator<Item = Arc<dyn Reducer>>) -> Self {
        self.before.extend(reducers);
        self
    }

    /// Add reducers to the main list
    pub fn use_reducers(mut self, reducers: impl IntoIterator<Item = Arc<dyn Reducer>>) -> Self {
        self.uses.extend(reducers);
        self
    }

    /// Add reducers that run after all others
    pub fn after(mut self, reducers: impl IntoIterator<Item = Arc<dyn Reducer>>) -> Self {
        self.after.extend(reducers);
        self
    }

    /// Apply `action` and push the result
    ///
    /// Before `ready()` the action is queued instead.
    pub fn dispatch(&self, action: Arc<dyn Action>) {
        let _update = self.update.lock();

        if let Some(queue) = self.queued.lock().as_mut() {
            trace!(action = action.name(), "queued until ready");
            queue.push(action);
            return;
        }

        self.apply(action);
    }

    /// Mark the store live and apply queued actions in order
    pub fn ready(&self) {
        let _update = self.update.lock();

        let queued = self.queued.lock().take().unwrap_or_default();
        debug!(queued = queued.len(), "store ready");
        for action in queued {
            self.apply(action);
        }
    }

    /// True once `ready()` has been called
    pub fn is_ready(&self) -> bool {
        self.queued.lock().is_none()
    }

    /// Apply a request's actions and reply with the request's cookie
    ///
    /// Actions that can't be created become state errors; the rest of the
    /// batch still applies.
    pub fn sync_request(&self, rq: &AgentRequest, registry: &ActionRegistry) {
        let _update = self.update.lock();

        let mut errors = Vec::new();
        let mut actions = Vec::with_capacity(rq.actions.len());
        for ra in &rq.actions {
            match registry.create(ra) {
                Ok(action) => actions.push(action),
                Err(e) => {
                    warn!(cookie = %rq.cookie, error = %e, "action rejected");
                    errors.push(e.to_string());
                }
            }
        }

        let state = self.reduce_all(&rq.props, &actions, errors);
        (self.listener)(AgentResponse::reply(rq.cookie.clone(), state));
    }

    /// The last published state
    pub fn state(&self) -> Arc<State> {
        Arc::clone(&self.current.read())
    }

    /// Session-wide property store
    pub fn session(&self) -> Arc<KVMap<String, serde_json::Value>> {
        Arc::clone(&self.session)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Apply one dispatched action and push the result (update lock held)
    fn apply(&self, action: Arc<dyn Action>) {
        let state = self.reduce_all(&self.idle_props, &[action], Vec::new());
        (self.listener)(AgentResponse::push(state));
    }

    /// Run the pipeline for each action, then the render pass, and publish
    /// the result as the current state (update lock held)
    fn reduce_all(
        &self,
        props: &ClientProps,
        actions: &[Arc<dyn Action>],
        errors: Vec<String>,
    ) -> Arc<State> {
        let mut state = self.current.read().next();
        state.errors.extend(errors);

        for action in actions {
            state = self.reduce(state, Some(Arc::clone(action)), props);
        }
        state = self.reduce(state, None, props);

        let state = Arc::new(state);
        *self.current.write() = Arc::clone(&state);
        state
    }

    /// One pass through before → use → after
    fn reduce(&self, state: State, action: Option<Arc<dyn Action>>, props: &ClientProps) -> State {
        let start = Utc::now();
        let mut ctx = Ctx::new(state, action.clone(), props);

        for reducer in self.before.iter().chain(&self.uses).chain(&self.after) {
            trace!(reducer = reducer.label(), "reduce");
            reducer.reduce(&mut ctx);
        }

        let mut state = ctx.state;
        state.profiles.push(ReducerProfile {
            subject: REDUCE_SUBJECT.to_string(),
            action,
            start,
            end: Utc::now(),
        });
        state
    }
}

impl KVStore<String, serde_json::Value> for Store {
    fn put(&self, key: String, value: serde_json::Value) {
        self.session.put(key, value);
    }

    fn get(&self, key: &String) -> Option<serde_json::Value> {
        self.session.get(key)
    }

    fn del(&self, key: &String) {
        self.session.del(key);
    }
}
