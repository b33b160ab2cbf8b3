// Event context - the facts a trigger carries into evaluation and templating

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Read-only mapping from named facts (`customer`, `payment`, ...) to nested records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventContext(Map<String, Value>);

impl EventContext {
    pub fn new(facts: Map<String, Value>) -> Self {
        Self(facts)
    }

    /// Build a context from a JSON value; anything other than an object is empty.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(facts) => Self(facts),
            _ => Self::default(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Walk a dot path such as `payment.amount` or `items.0.sku`.
    ///
    /// Returns `None` for a missing key, an out-of-range index, or a malformed
    /// path (empty, or with an empty segment).
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }

        let mut segments = path.split('.');
        let first = segments.next().filter(|segment| !segment.is_empty())?;
        let mut current = self.0.get(first)?;

        for segment in segments {
            if segment.is_empty() {
                return None;
            }
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for EventContext {
    fn from(facts: Map<String, Value>) -> Self {
        Self(facts)
    }
}
