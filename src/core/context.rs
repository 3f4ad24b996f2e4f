//! Context store: the mutable record a machine instance carries.
//!
//! Fields are a flat `key -> serde_json::Value` map. Writes compare by
//! structural equality, so assigning an equal value is a no-op: the revision
//! does not move, no watcher fires and no subscriber is notified.

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Pure function deriving a read-only value from the context.
pub type ComputedFn = Arc<dyn Fn(&Context) -> Value + Send + Sync>;

pub(crate) type ComputedTable = BTreeMap<String, ComputedFn>;

/// Mutable, per-instance machine data.
///
/// # Example
///
/// ```rust
/// use headless_machine::core::Context;
/// use serde_json::json;
///
/// let mut ctx = Context::default();
/// assert!(ctx.set("count", 1));
/// assert!(!ctx.set("count", 1)); // equal value, nothing changes
/// assert_eq!(ctx.get_as::<u32>("count"), Some(1));
/// assert_eq!(ctx.revision(), 1);
/// ```
#[derive(Clone, Default)]
pub struct Context {
    fields: Map<String, Value>,
    computed: Arc<ComputedTable>,
    revision: u64,
}

impl Context {
    /// Create a context from plain fields, without computed values.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            computed: Arc::default(),
            revision: 0,
        }
    }

    pub(crate) fn with_computed(fields: Map<String, Value>, computed: Arc<ComputedTable>) -> Self {
        Self {
            fields,
            computed,
            revision: 0,
        }
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

    /// Write a field. Returns `true` when the stored value changed.
    ///
    /// Computed names are read-only; writing one is refused and logged.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.computed.contains_key(&key) {
            tracing::warn!(field = %key, "refusing to write computed context field");
            return false;
        }
        let value = value.into();
        if self.fields.get(&key) == Some(&value) {
            return false;
        }
        self.fields.insert(key, value);
        self.revision += 1;
        true
    }

    /// Remove a field. Returns `true` when a field was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.fields.remove(key).is_some();
        if removed {
            self.revision += 1;
        }
        removed
    }

    /// Write every field of `overrides`. Returns `true` when anything changed.
    pub fn merge(&mut self, overrides: Map<String, Value>) -> bool {
        overrides
            .into_iter()
            .fold(false, |changed, (key, value)| self.set(key, value) | changed)
    }

    /// Evaluate a computed value. Never cached: every call sees the current fields.
    pub fn compute(&self, name: &str) -> Option<Value> {
        self.computed.get(name).map(|f| f(self))
    }

    /// Read a field, falling back to a computed value of the same name.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match self.fields.get(name) {
            Some(value) => Some(value.clone()),
            None => self.compute(name),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_computed(&self, name: &str) -> bool {
        self.computed.contains_key(name)
    }

    /// Number of writes that actually changed a value.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace every field at once, keeping the computed table. Used for
    /// resets: `ctx.replace_fields(helpers.initial_context().fields().clone())`.
    pub fn replace_fields(&mut self, fields: Map<String, Value>) -> bool {
        if self.fields == fields {
            return false;
        }
        self.fields = fields;
        self.revision += 1;
        true
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("fields", &self.fields)
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("revision", &self.revision)
            .finish()
    }
}

impl Serialize for Context {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        self.fields.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn with_is_vertical() -> Context {
        let mut table = ComputedTable::new();
        let is_vertical: ComputedFn =
            Arc::new(|ctx: &Context| json!(ctx.get("orientation") == Some(&json!("vertical"))));
        table.insert("isVertical".to_string(), is_vertical);
        Context::with_computed(
            fields(json!({ "orientation": "horizontal" })),
            Arc::new(table),
        )
    }

    #[test]
    fn equal_writes_do_not_bump_revision() {
        let mut ctx = Context::new(fields(json!({ "value": ["a", "b"] })));

        assert!(!ctx.set("value", json!(["a", "b"])));
        assert_eq!(ctx.revision(), 0);

        assert!(ctx.set("value", json!(["a"])));
        assert_eq!(ctx.revision(), 1);
    }

    #[test]
    fn computed_values_follow_current_fields() {
        let mut ctx = with_is_vertical();
        assert_eq!(ctx.compute("isVertical"), Some(json!(false)));

        ctx.set("orientation", "vertical");
        assert_eq!(ctx.compute("isVertical"), Some(json!(true)));
        assert_eq!(ctx.lookup("isVertical"), Some(json!(true)));
        assert_eq!(ctx.compute("unknown"), None);
    }

    #[test]
    fn computed_fields_are_read_only() {
        let mut ctx = with_is_vertical();
        assert!(!ctx.set("isVertical", true));
        assert_eq!(ctx.get("isVertical"), None);
        assert_eq!(ctx.revision(), 0);
    }

    #[test]
    fn merge_reports_any_change() {
        let mut ctx = Context::new(fields(json!({ "a": 1, "b": 2 })));

        assert!(!ctx.merge(fields(json!({ "a": 1 }))));
        assert!(ctx.merge(fields(json!({ "a": 1, "b": 3 }))));
        assert_eq!(ctx.get_as::<i64>("b"), Some(3));
    }

    #[test]
    fn remove_and_replace_track_revision() {
        let mut ctx = Context::new(fields(json!({ "a": 1 })));
        assert!(!ctx.remove("missing"));
        assert!(ctx.remove("a"));
        assert!(!ctx.replace_fields(Map::new()));
        assert!(ctx.replace_fields(fields(json!({ "b": true }))));
        assert_eq!(ctx.revision(), 2);
    }

    #[test]
    fn serializes_fields_only() {
        let ctx = with_is_vertical();
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, json!({ "orientation": "horizontal" }));
    }
}
