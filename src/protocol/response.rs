//! Response definitions
//!
//! Represents state snapshots sent to the client, and their wire shape.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::store::{ClientAction, ReducerProfile, State, View, RENDER_LABEL};

/// A state snapshot addressed to the client
///
/// Replies carry the cookie of the request that produced them; pushes carry
/// an empty cookie.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Cookie of the originating request, empty for pushes
    pub cookie: String,

    /// Explicit error text; empty means "use the state's errors"
    pub error: String,

    /// The snapshot being sent
    pub state: Arc<State>,
}

impl AgentResponse {
    /// Create a reply to the request identified by `cookie`
    pub fn reply(cookie: impl Into<String>, state: Arc<State>) -> Self {
        Self {
            cookie: cookie.into(),
            error: String::new(),
            state,
        }
    }

    /// Create an unsolicited push
    pub fn push(state: Arc<State>) -> Self {
        Self::reply(String::new(), state)
    }

    /// True when the response was not triggered by a request
    pub fn is_push(&self) -> bool {
        self.cookie.is_empty()
    }

    /// Project the response into its wire shape
    pub fn project(&self) -> WireResponse<'_> {
        let st = &*self.state;

        let error = if self.error.is_empty() {
            st.errors.join("\n")
        } else {
            self.error.clone()
        };

        WireResponse {
            cookie: &self.cookie,
            error,
            state: WireState {
                errors: &st.errors,
                status: &st.status,
                view: st.view.as_ref().filter(|v| v.changed()),
                config: st.config.as_ref().map(|ec| ec.editor_config()),
                client_actions: &st.client_actions,
                profiles: st.profiles.iter().map(WireProfile::from).collect(),
            },
        }
    }
}

// =============================================================================
// Wire Shapes
// =============================================================================

/// Wire shape of a response
#[derive(Debug, Serialize)]
pub struct WireResponse<'a> {
    pub cookie: &'a str,
    pub error: String,
    pub state: WireState<'a>,
}

/// Wire shape of a state snapshot
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireState<'a> {
    pub errors: &'a [String],

    pub status: &'a [String],

    /// Present only when the view changed during this update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<&'a View>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,

    pub client_actions: &'a [ClientAction],

    pub profiles: Vec<WireProfile<'a>>,
}

/// Wire shape of a reducer profile entry
#[derive(Debug, Serialize)]
pub struct WireProfile<'a> {
    pub subject: &'a str,
    pub action: &'a str,
    pub start: String,
    pub end: String,
}

impl<'a> From<&'a ReducerProfile> for WireProfile<'a> {
    fn from(p: &'a ReducerProfile) -> Self {
        Self {
            subject: &p.subject,
            action: p.action.as_ref().map_or(RENDER_LABEL, |a| a.name()),
            start: timestamp(&p.start),
            end: timestamp(&p.end),
        }
    }
}

/// RFC 3339 in UTC with up to nanosecond precision; trailing zeros of the
/// fraction are dropped, and the fraction with them when it is zero
fn timestamp(t: &DateTime<Utc>) -> String {
    let full = t.to_rfc3339_opts(SecondsFormat::Nanos, true);

    let trimmed = full
        .strip_suffix('Z')
        .and_then(|s| s.split_once('.'))
        .map(|(secs, frac)| match frac.trim_end_matches('0') {
            "" => format!("{}Z", secs),
            frac => format!("{}.{}Z", secs, frac),
        });

    trimmed.unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Shutdown, View};
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_error_defaults_to_state_errors() {
        let mut state = State::default();
        state.add_error("first");
        state.add_error("second");

        let res = AgentResponse::reply("c1", Arc::new(state));
        let wire = res.project();
        assert_eq!(wire.cookie, "c1");
        assert_eq!(wire.error, "first\nsecond");

        let mut res = res.clone();
        res.error = "explicit".to_string();
        assert_eq!(res.project().error, "explicit");
    }

    #[test]
    fn test_view_only_sent_when_changed() {
        let mut state = State::default();
        state.view = Some(View::new("/tmp/a.rs", "a.rs", "rust"));
        let res = AgentResponse::push(Arc::new(state.clone()));
        assert!(res.project().state.view.is_none());

        state.set_view(View::new("/tmp/b.rs", "b.rs", "rust"));
        let res = AgentResponse::push(Arc::new(state));
        assert_eq!(res.project().state.view.map(|v| v.name.as_str()), Some("b.rs"));
    }

    #[test]
    fn test_profile_labels_and_timestamps() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut state = State::default();
        state.profiles.push(ReducerProfile {
            subject: "reduce".to_string(),
            action: None,
            start,
            end: start,
        });
        state.profiles.push(ReducerProfile {
            subject: "reduce".to_string(),
            action: Some(Arc::new(Shutdown)),
            start,
            end: start,
        });

        let res = AgentResponse::push(Arc::new(state));
        let wire = res.project();
        assert_eq!(wire.state.profiles[0].action, RENDER_LABEL);
        assert_eq!(wire.state.profiles[1].action, "Shutdown");
        assert_eq!(wire.state.profiles[0].start, "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_timestamp_trims_fraction() {
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(timestamp(&whole), "2024-05-01T12:00:00Z");

        let millis = whole.with_nanosecond(120_000_000).unwrap();
        assert_eq!(timestamp(&millis), "2024-05-01T12:00:00.12Z");

        let nanos = whole.with_nanosecond(123_456_789).unwrap();
        assert_eq!(timestamp(&nanos), "2024-05-01T12:00:00.123456789Z");

        let parsed = DateTime::parse_from_rfc3339(&timestamp(&millis)).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), millis);
    }
}
