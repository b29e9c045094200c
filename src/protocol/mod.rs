//! Protocol Module
//!
//! Defines the messages exchanged with the client and how they are encoded.
//!
//! ## Request Shape
//! ```text
//! { cookie: string,
//!   actions: [ { name: string, data: <any> }, ... ],
//!   properties: { editor, env, view } }
//! ```
//!
//! ## Response Shape
//! ```text
//! { cookie: string,
//!   error: string,
//!   state: { errors, status, view?, config?, clientActions, profiles } }
//! ```
//!
//! Pushes use the same shape with an empty cookie.
//!
//! ## Formats
//! - json    (default)
//! - cbor
//! - msgpack

mod codec;
mod request;
mod response;

pub use codec::{ActionData, CodecRegistry, Format, DEFAULT_CODEC};
pub use request::{AgentRequest, ClientProps, EditorProps, PropStore, RequestAction};
pub use response::{AgentResponse, WireProfile, WireResponse, WireState};
