//! Events driving a machine.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Event type used when a machine is started.
pub const START: &str = "machine.start";

/// Event type of a snapshot taken before the machine started.
pub const INIT: &str = "machine.init";

/// Event type seen by watchers fired from [`Machine::set_context`](crate::effects::Machine::set_context).
pub const SET_CONTEXT: &str = "machine.set_context";

/// An event sent to a machine.
///
/// Serializes as `{ "type": ..., ...fields, "previousEvent"?: ... }`.
///
/// ```rust
/// use headless_machine::core::Event;
/// use serde_json::json;
///
/// let click = Event::new("TRIGGER_CLICK").with("id", "products");
/// assert_eq!(click.kind(), "TRIGGER_CLICK");
/// assert_eq!(click.get("id"), Some(&json!("products")));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    kind: String,
    #[serde(
        rename = "previousEvent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    previous: Option<Box<Event>>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            previous: None,
            fields: Map::new(),
        }
    }

    /// Add a field, replacing any previous value under the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Attach the event that caused this one.
    pub fn with_previous(mut self, previous: Event) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Read a field as a concrete type. Missing or mistyped fields are `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.fields
            .get(key)
            .and_then(|value| T::deserialize(value).ok())
    }

    pub fn previous(&self) -> Option<&Event> {
        self.previous.as_deref()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<&str> for Event {
    fn from(kind: &str) -> Self {
        Event::new(kind)
    }
}

impl From<String> for Event {
    fn from(kind: String) -> Self {
        Event::new(kind)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)
    }
}
