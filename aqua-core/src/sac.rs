//! An ordered, string-keyed bag for assembling JSON responses.

use serde_json::Map as JsonMap;
use serde_json::Value as Json;

/// A JSON bag. Keys keep insertion order; [`merge`](Sac::merge) refuses to
/// overwrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sac {
    pub data: JsonMap<String, Json>,
}

impl Sac {
    pub fn new() -> Sac {
        Sac::default()
    }

    /// Set a key to any serializable value, replacing an existing entry.
    pub fn set(mut self, key: impl Into<String>, value: impl serde::Serialize) -> Sac {
        let json = serde_json::to_value(value).unwrap_or(Json::Null);
        self.data.insert(key.into(), json);
        self
    }

    /// Merge a struct or map into the bag without overwriting.
    ///
    /// # Panics
    ///
    /// Panics if `value` does not serialize to an object, or if any of its
    /// keys already exists. Both are programming errors.
    pub fn merge(mut self, value: impl serde::Serialize) -> Sac {
        let json = serde_json::to_value(value).unwrap_or(Json::Null);
        let Json::Object(entries) = json else {
            panic!("Sac.merge expects a struct or a map");
        };
        for (key, val) in entries {
            if self.data.contains_key(&key) {
                panic!("Sac.merge field already exists: {key}");
            }
            self.data.insert(key, val);
        }
        self
    }
}

impl serde::Serialize for Sac {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}
