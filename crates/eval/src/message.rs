//! The record rules operate on.
//!
//! A message is a string-keyed bag of [`Value`]s plus an id, a timestamp,
//! the set of streams it belongs to and a dropped flag. Rules reach other
//! messages (for example ones they created) through [`MessageHandle`]
//! objects, which are only meaningful inside the evaluation context that
//! issued them.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use conduit_core::{HostObject, ObjectRef, Value};
use conduit_storage::DEFAULT_STREAM_ID;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

pub const FIELD_ID: &str = "_id";
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_SOURCE: &str = "source";
pub const FIELD_TIMESTAMP: &str = "timestamp";

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: String,
    timestamp: OffsetDateTime,
    fields: BTreeMap<String, Value>,
    streams: BTreeSet<String>,
    dropped: bool,
}

impl Message {
    /// A new message in the default stream with a fresh id.
    pub fn new(message: &str, source: &str, timestamp: OffsetDateTime) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_MESSAGE.to_string(), Value::from(message));
        fields.insert(FIELD_SOURCE.to_string(), Value::from(source));
        Message {
            id: Uuid::new_v4().to_string(),
            timestamp,
            fields,
            streams: BTreeSet::from([DEFAULT_STREAM_ID.to_string()]),
            dropped: false,
        }
    }

    /// Builder-style field setter, mostly for fixtures.
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_field(name, value.into());
        self
    }

    /// A copy with a fresh id. Streams and fields are kept; the copy is
    /// never dropped.
    pub fn duplicate(&self) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            dropped: false,
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: OffsetDateTime) {
        self.timestamp = timestamp;
    }

    // ── Fields ───────────────────────────────────────────────────────────

    /// Field value, with `_id` and `timestamp` served from the header.
    pub fn field(&self, name: &str) -> Value {
        match name {
            FIELD_ID => Value::from(self.id.as_str()),
            FIELD_TIMESTAMP => self
                .timestamp
                .format(&Rfc3339)
                .map(Value::from)
                .unwrap_or(Value::Null),
            _ => self.fields.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        matches!(name, FIELD_ID | FIELD_TIMESTAMP) || self.fields.contains_key(name)
    }

    /// Set a field. Setting absent removes it; `_id` is immutable and a
    /// `timestamp` must be an RFC 3339 string.
    pub fn set_field(&mut self, name: &str, value: Value) {
        match name {
            FIELD_ID => debug!(message = %self.id, "ignoring write to message id"),
            FIELD_TIMESTAMP => match value.as_str().map(|s| OffsetDateTime::parse(s, &Rfc3339)) {
                Some(Ok(ts)) => self.timestamp = ts,
                _ => debug!(message = %self.id, value = %value, "ignoring invalid timestamp"),
            },
            _ if value.is_null() => {
                self.fields.remove(name);
            }
            _ => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Stored fields, without the `_id` and `timestamp` header fields.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    // ── Streams ──────────────────────────────────────────────────────────

    pub fn streams(&self) -> &BTreeSet<String> {
        &self.streams
    }

    /// Returns whether the stream was newly added.
    pub fn add_stream(&mut self, stream_id: &str) -> bool {
        self.streams.insert(stream_id.to_string())
    }

    pub fn remove_stream(&mut self, stream_id: &str) -> bool {
        self.streams.remove(stream_id)
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    pub fn drop_message(&mut self) {
        self.dropped = true;
    }

    /// JSON rendering of the message, header fields included.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(FIELD_ID.to_string(), serde_json::Value::from(self.id.clone()));
        if let Value::String(ts) = self.field(FIELD_TIMESTAMP) {
            map.insert(FIELD_TIMESTAMP.to_string(), serde_json::Value::from(ts));
        }
        for (name, value) in &self.fields {
            map.insert(name.clone(), value_to_json(value));
        }
        serde_json::Value::Object(map)
    }
}

/// Convert a value to JSON. Host objects render as their debug text.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Long(l) => serde_json::Value::from(*l),
        Value::Double(d) => serde_json::Value::from(*d),
        Value::Bool(b) => serde_json::Value::from(*b),
        Value::String(s) => serde_json::Value::from(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        Value::Object(o) => serde_json::Value::from(format!("{:?}", o)),
    }
}

/// Convert JSON to a value. Integral numbers become longs.
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(l) => Value::Long(l),
            None => n.as_f64().map(Value::Double).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(value_from_json).collect()),
        serde_json::Value::Object(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), value_from_json(v)))
                .collect(),
        ),
    }
}

// ──────────────────────────────────────────────
// Handles
// ──────────────────────────────────────────────

/// Reference to a message of the current evaluation: 0 is the message
/// being processed, `n` the `n`-th message created during this evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle(pub usize);

impl MessageHandle {
    pub const CURRENT: MessageHandle = MessageHandle(0);

    pub fn to_value(self) -> Value {
        Value::Object(ObjectRef::new(self))
    }

    pub fn from_value(value: &Value) -> Option<MessageHandle> {
        match value {
            Value::Object(o) => o.downcast_ref::<MessageHandle>().copied(),
            _ => None,
        }
    }
}

impl HostObject for MessageHandle {
    fn type_name(&self) -> &'static str {
        "Message"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> Message {
        Message::new("hello", "test", datetime!(2025-01-01 00:00:00 UTC))
    }

    #[test]
    fn new_message_is_in_default_stream() {
        let m = sample();
        assert!(m.streams().contains(DEFAULT_STREAM_ID));
        assert_eq!(m.field("message"), Value::from("hello"));
        assert!(!m.is_dropped());
    }

    #[test]
    fn header_fields_are_readable() {
        let m = sample();
        assert_eq!(m.field("_id"), Value::from(m.id()));
        assert_eq!(m.field("timestamp"), Value::from("2025-01-01T00:00:00Z"));
        assert!(m.has_field("timestamp"));
    }

    #[test]
    fn setting_absent_removes_the_field() {
        let mut m = sample().with_field("x", 1i64);
        assert!(m.has_field("x"));
        m.set_field("x", Value::Null);
        assert!(!m.has_field("x"));
    }

    #[test]
    fn id_is_immutable_and_timestamp_parses() {
        let mut m = sample();
        let id = m.id().to_string();
        m.set_field("_id", Value::from("other"));
        assert_eq!(m.id(), id);
        m.set_field("timestamp", Value::from("2025-06-01T12:00:00Z"));
        assert_eq!(m.timestamp(), datetime!(2025-06-01 12:00:00 UTC));
        m.set_field("timestamp", Value::from("yesterday"));
        assert_eq!(m.timestamp(), datetime!(2025-06-01 12:00:00 UTC));
    }

    #[test]
    fn duplicate_gets_a_fresh_id() {
        let m = sample().with_field("x", 1i64);
        let copy = m.duplicate();
        assert_ne!(copy.id(), m.id());
        assert_eq!(copy.fields(), m.fields());
    }

    #[test]
    fn json_conversion_keeps_integers_long() {
        let json = serde_json::json!({"a": 1, "b": 1.5, "c": [true, null]});
        let v = value_from_json(&json);
        let Value::Map(map) = &v else {
            panic!("expected map");
        };
        assert_eq!(map["a"], Value::Long(1));
        assert_eq!(map["b"], Value::Double(1.5));
        assert_eq!(value_to_json(&v), json);
    }

    #[test]
    fn handles_round_trip_through_values() {
        let v = MessageHandle(3).to_value();
        assert_eq!(MessageHandle::from_value(&v), Some(MessageHandle(3)));
        assert_eq!(MessageHandle::from_value(&Value::Long(3)), None);
    }
}
