//! Protocol codec
//!
//! Named serialization formats and the registry that resolves them.
//!
//! ## Framing
//! There is no framing beyond what each format's self-describing structure
//! provides: one `encode` writes exactly one message and one `decode`
//! consumes exactly one message.
//!
//! ```text
//! json     2-space indented, one value per message, '\n' terminated
//! cbor     RFC 8949 items, back to back
//! msgpack  MessagePack values (structs as maps), back to back
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use super::request::WireRequest;
use super::AgentRequest;
use crate::error::{AgentError, Result};

/// Name of the format used when none (or an invalid one) is requested
pub const DEFAULT_CODEC: &str = "json";

/// A serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Cbor,
    Msgpack,
}

impl Format {
    /// Registry name of the format
    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Cbor => "cbor",
            Format::Msgpack => "msgpack",
        }
    }

    /// Encode one message to `writer`
    ///
    /// Does not flush; callers own buffering.
    pub fn encode<T, W>(self, writer: &mut W, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
        W: Write,
    {
        match self {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value).map_err(encode_error)?;
                writer.write_all(b"\n")?;
            }
            Format::Cbor => {
                ciborium::ser::into_writer(value, &mut *writer).map_err(encode_error)?;
            }
            Format::Msgpack => {
                rmp_serde::encode::write_named(writer, value).map_err(encode_error)?;
            }
        }
        Ok(())
    }

    /// Decode one message from `reader`
    ///
    /// Returns:
    /// - `Ok(Some(value))` : a complete message was read
    /// - `Ok(None)` : the stream ended cleanly between messages
    /// - `Err(AgentError::Decode)` : malformed or truncated input
    pub fn decode<T, R>(self, reader: &mut R) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        R: BufRead,
    {
        if self == Format::Json {
            skip_whitespace(reader).map_err(decode_error)?;
        }
        if reader.fill_buf().map_err(decode_error)?.is_empty() {
            return Ok(None);
        }

        let value = match self {
            Format::Json => {
                let mut de = serde_json::Deserializer::from_reader(&mut *reader);
                T::deserialize(&mut de).map_err(decode_error)?
            }
            Format::Cbor => ciborium::de::from_reader(&mut *reader).map_err(decode_error)?,
            Format::Msgpack => rmp_serde::decode::from_read(&mut *reader).map_err(decode_error)?,
        };

        Ok(Some(value))
    }

    /// Decode one request from `reader`
    ///
    /// Action payloads are kept in this format's own value tree and only
    /// decoded by the action's creator. End-of-stream handling matches
    /// `decode`.
    pub fn decode_request<R: BufRead>(self, reader: &mut R) -> Result<Option<AgentRequest>> {
        let rq = match self {
            Format::Json => self
                .decode::<WireRequest<serde_json::Value>, _>(reader)?
                .map(|w| w.into_request(self)),
            Format::Cbor => self
                .decode::<WireRequest<ciborium::Value>, _>(reader)?
                .map(|w| w.into_request(self)),
            Format::Msgpack => self
                .decode::<WireRequest<rmpv::Value>, _>(reader)?
                .map(|w| w.into_request(self)),
        };
        Ok(rq)
    }

    /// Encode a single message into a new buffer
    pub fn to_vec<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf, value)?;
        Ok(buf)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn encode_error(e: impl fmt::Display) -> AgentError {
    AgentError::Encode(e.to_string())
}

fn decode_error(e: impl fmt::Display) -> AgentError {
    AgentError::Decode(e.to_string())
}

/// Consume whitespace between JSON messages
fn skip_whitespace<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(());
        }

        let blank = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
        let more = blank == buf.len();
        reader.consume(blank);

        if !more {
            return Ok(());
        }
    }
}

// =============================================================================
// Codec Registry
// =============================================================================

/// Immutable mapping from format name to format
///
/// Built once at startup and handed to whoever needs it.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    formats: BTreeMap<&'static str, Format>,
    default: Format,
}

impl CodecRegistry {
    /// Registry with every supported format, defaulting to `json`
    pub fn standard() -> Self {
        let formats = [Format::Json, Format::Cbor, Format::Msgpack]
            .into_iter()
            .map(|f| (f.name(), f))
            .collect();

        Self {
            formats,
            default: Format::Json,
        }
    }

    /// The format used for empty or invalid names
    pub fn default_format(&self) -> Format {
        self.default
    }

    /// Valid format names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.formats.keys().copied().collect()
    }

    /// Valid format names in the form `a, b or c`
    pub fn names_str(&self) -> String {
        let names = self.names();
        match names.split_last() {
            Some((last, rest)) if !rest.is_empty() => format!("{} or {}", rest.join(", "), last),
            Some((last, _)) => (*last).to_string(),
            None => String::new(),
        }
    }

    /// Look up a format by name; the empty name selects the default
    pub fn lookup(&self, name: &str) -> Result<Format> {
        if name.is_empty() {
            return Ok(self.default);
        }

        self.formats
            .get(name)
            .copied()
            .ok_or_else(|| AgentError::InvalidCodec {
                name: name.to_string(),
                expected: self.names_str(),
            })
    }

    /// Like `lookup`, but always yields a usable format
    ///
    /// An invalid name resolves to the default and the lookup error is
    /// returned alongside it.
    pub fn resolve(&self, name: &str) -> (Format, Option<AgentError>) {
        match self.lookup(name) {
            Ok(format) => (format, None),
            Err(e) => (self.default, Some(e)),
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// =============================================================================
// Raw Payloads
// =============================================================================

/// Undecoded action payload
///
/// Kept as the value tree of the codec that carried it, so anything that
/// codec can express (byte strings, non-string map keys, extension types)
/// survives request decoding. Each action creator decodes it into its own
/// type with `decode`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionData {
    Json(serde_json::Value),
    Cbor(ciborium::Value),
    Msgpack(rmpv::Value),
}

impl ActionData {
    /// Wrap a JSON value tree
    pub fn new(value: serde_json::Value) -> Self {
        ActionData::Json(value)
    }

    /// The payload used when the client sends none
    pub fn null(format: Format) -> Self {
        match format {
            Format::Json => ActionData::Json(serde_json::Value::Null),
            Format::Cbor => ActionData::Cbor(ciborium::Value::Null),
            Format::Msgpack => ActionData::Msgpack(rmpv::Value::Nil),
        }
    }

    /// Format whose value tree holds the payload
    pub fn format(&self) -> Format {
        match self {
            ActionData::Json(_) => Format::Json,
            ActionData::Cbor(_) => Format::Cbor,
            ActionData::Msgpack(_) => Format::Msgpack,
        }
    }

    /// True when the client sent no payload, or an empty map
    pub fn is_empty(&self) -> bool {
        match self {
            ActionData::Json(serde_json::Value::Null) => true,
            ActionData::Json(serde_json::Value::Object(map)) => map.is_empty(),
            ActionData::Cbor(ciborium::Value::Null) => true,
            ActionData::Cbor(ciborium::Value::Map(entries)) => entries.is_empty(),
            ActionData::Msgpack(rmpv::Value::Nil) => true,
            ActionData::Msgpack(rmpv::Value::Map(entries)) => entries.is_empty(),
            _ => false,
        }
    }

    /// Decode the payload into `T` with the codec that carried it
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            ActionData::Json(v) => T::deserialize(v).map_err(decode_error),
            ActionData::Cbor(v) => v.deserialized().map_err(decode_error),
            ActionData::Msgpack(v) => rmpv::ext::from_value(v.clone()).map_err(decode_error),
        }
    }
}

impl Default for ActionData {
    fn default() -> Self {
        ActionData::null(Format::Json)
    }
}

impl Serialize for ActionData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ActionData::Json(v) => v.serialize(serializer),
            ActionData::Cbor(v) => v.serialize(serializer),
            ActionData::Msgpack(v) => v.serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for ActionData {
    fn from(v: serde_json::Value) -> Self {
        ActionData::Json(v)
    }
}

impl From<ciborium::Value> for ActionData {
    fn from(v: ciborium::Value) -> Self {
        ActionData::Cbor(v)
    }
}

impl From<rmpv::Value> for ActionData {
    fn from(v: rmpv::Value) -> Self {
        ActionData::Msgpack(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_skip_whitespace_stops_at_value() {
        let mut reader = Cursor::new(b"  \n\t{}".to_vec());
        skip_whitespace(&mut reader).unwrap();
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_names_str_single_name() {
        let registry = CodecRegistry {
            formats: [("json", Format::Json)].into_iter().collect(),
            default: Format::Json,
        };
        assert_eq!(registry.names_str(), "json");
    }

    #[test]
    fn test_action_data_empty() {
        assert!(ActionData::default().is_empty());
        assert!(ActionData::new(serde_json::json!({})).is_empty());
        assert!(!ActionData::new(serde_json::json!({"a": 1})).is_empty());

        for format in [Format::Json, Format::Cbor, Format::Msgpack] {
            let null = ActionData::null(format);
            assert!(null.is_empty());
            assert_eq!(null.format(), format);
        }
        assert!(ActionData::from(ciborium::Value::Map(Vec::new())).is_empty());
        assert!(!ActionData::from(rmpv::Value::from(1)).is_empty());
    }

    #[test]
    fn test_action_data_decodes_with_its_codec() {
        let cbor = ActionData::from(ciborium::Value::Map(vec![(
            ciborium::Value::Integer(7.into()),
            ciborium::Value::Text("x".to_string()),
        )]));
        let decoded: BTreeMap<u32, String> = cbor.decode().unwrap();
        assert_eq!(decoded.get(&7).map(String::as_str), Some("x"));

        let msgpack = ActionData::from(rmpv::Value::Map(vec![(
            rmpv::Value::from(7),
            rmpv::Value::from("x"),
        )]));
        let decoded: BTreeMap<u32, String> = msgpack.decode().unwrap();
        assert_eq!(decoded.get(&7).map(String::as_str), Some("x"));

        let err = ActionData::new(serde_json::json!("text")).decode::<u32>().unwrap_err();
        assert!(matches!(err, AgentError::Decode(_)));
    }
}
