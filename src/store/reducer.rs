//! Reducers
//!
//! A reducer inspects the action being applied and edits the working state.

use std::sync::Arc;

use super::{Action, State};
use crate::protocol::{ClientProps, PropStore};

/// Context handed to each reducer
pub struct Ctx<'a> {
    /// Working state, passed from reducer to reducer
    pub state: State,

    /// The action being applied; `None` during the render pass
    pub action: Option<Arc<dyn Action>>,

    /// Properties of the request being applied
    pub props: &'a ClientProps,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(state: State, action: Option<Arc<dyn Action>>, props: &'a ClientProps) -> Self {
        Self {
            state,
            action,
            props,
        }
    }

    /// The current action as `T`, if it is one
    pub fn action_as<T: Action>(&self) -> Option<&T> {
        self.action.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// True during the render pass that ends every update
    pub fn is_render(&self) -> bool {
        self.action.is_none()
    }

    /// Layered KV store: request-local values over the session store
    pub fn kv(&self) -> &PropStore {
        &self.props.kvs
    }
}

/// A step in the reducer pipeline
pub trait Reducer: Send + Sync {
    /// Name used in logs
    fn label(&self) -> &str;

    fn reduce(&self, ctx: &mut Ctx<'_>);
}

/// Reducer backed by a closure
pub struct ReduceFn<F> {
    label: String,
    f: F,
}

impl<F> Reducer for ReduceFn<F>
where
    F: Fn(&mut Ctx<'_>) + Send + Sync,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn reduce(&self, ctx: &mut Ctx<'_>) {
        (self.f)(ctx)
    }
}

/// Wrap a closure as a reducer
pub fn reduce_fn<F>(label: impl Into<String>, f: F) -> Arc<dyn Reducer>
where
    F: Fn(&mut Ctx<'_>) + Send + Sync + 'static,
{
    Arc::new(ReduceFn {
        label: label.into(),
        f,
    })
}

// =============================================================================
// Default Reducers
// =============================================================================

/// Tracks the client's view from request properties
#[derive(Debug, Default)]
pub struct ViewSync;

impl Reducer for ViewSync {
    fn label(&self) -> &str {
        "ViewSync"
    }

    fn reduce(&self, ctx: &mut Ctx<'_>) {
        let Some(view) = &ctx.props.view else {
            return;
        };

        let same = ctx.state.view.as_ref().is_some_and(|v| v.same_file(view));
        if !same {
            ctx.state.set_view(view.clone());
        }
    }
}

/// Drops repeated status messages, keeping the first occurrence
#[derive(Debug, Default)]
pub struct StatusDedup;

impl Reducer for StatusDedup {
    fn label(&self) -> &str {
        "StatusDedup"
    }

    fn reduce(&self, ctx: &mut Ctx<'_>) {
        let mut seen = std::collections::HashSet::new();
        ctx.state.status.retain(|s| seen.insert(s.clone()));
    }
}

/// Adds a fixed status message to every state
#[derive(Debug)]
pub struct EnvStatus {
    message: String,
}

impl EnvStatus {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Reducer for EnvStatus {
    fn label(&self) -> &str {
        "EnvStatus"
    }

    fn reduce(&self, ctx: &mut Ctx<'_>) {
        if ctx.is_render() {
            ctx.state.add_status(self.message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Started, View};

    #[test]
    fn test_view_sync_marks_new_view() {
        let props = ClientProps {
            view: Some(View::new("/a.rs", "a.rs", "rust")),
            ..ClientProps::default()
        };

        let mut ctx = Ctx::new(State::default(), None, &props);
        ViewSync.reduce(&mut ctx);
        assert!(ctx.state.view.as_ref().unwrap().changed());

        // same file again: unchanged
        let mut ctx = Ctx::new(ctx.state.next(), None, &props);
        ViewSync.reduce(&mut ctx);
        assert!(!ctx.state.view.as_ref().unwrap().changed());
    }

    #[test]
    fn test_status_dedup_keeps_order() {
        let props = ClientProps::default();
        let mut ctx = Ctx::new(State::default(), None, &props);
        for s in ["b", "a", "b", "c", "a"] {
            ctx.state.add_status(s);
        }

        StatusDedup.reduce(&mut ctx);
        assert_eq!(ctx.state.status, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_env_status_only_on_render() {
        let props = ClientProps::default();
        let status = EnvStatus::new("build failed");

        let mut ctx = Ctx::new(State::default(), Some(Arc::new(Started)), &props);
        status.reduce(&mut ctx);
        assert!(ctx.state.status.is_empty());
        assert!(ctx.action_as::<Started>().is_some());

        let mut ctx = Ctx::new(ctx.state, None, &props);
        status.reduce(&mut ctx);
        assert_eq!(ctx.state.status, vec!["build failed"]);
    }
}
