//! Argument and state containers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An ordered string-keyed container for navigation arguments and saved state.
///
/// Values are dynamically typed; typed accessors return `None` when the key is
/// missing or holds a value of a different type. Iteration order is the key
/// order, so serialized bundles are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle {
    values: BTreeMap<String, Value>,
}

impl Bundle {
    pub fn new() -> Bundle {
        Bundle::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// Copies all entries from `other` into this bundle, overwriting existing keys.
    pub fn put_all(&mut self, other: &Bundle) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Copies entries from `defaults` for keys this bundle doesn’t have yet.
    pub fn fill_defaults(&mut self, defaults: &Bundle) {
        for (key, value) in &defaults.values {
            self.values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::iter::FromIterator<(String, Value)> for Bundle {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Bundle {
        Bundle {
            values: iter.into_iter().collect(),
        }
    }
}

#[test]
fn test_put_all_overwrites_but_defaults_do_not() {
    let mut args = Bundle::new();
    args.insert("id", 4);

    let mut defaults = Bundle::new();
    defaults.insert("id", 1);
    defaults.insert("tab", "home");

    args.fill_defaults(&defaults);
    assert_eq!(args.get_i64("id"), Some(4));
    assert_eq!(args.get_str("tab"), Some("home"));

    let mut explicit = Bundle::new();
    explicit.insert("tab", "settings");
    args.put_all(&explicit);
    assert_eq!(args.get_str("tab"), Some("settings"));
}

#[test]
fn test_typed_accessors() {
    let mut bundle = Bundle::new();
    bundle.insert("name", "ada");
    bundle.insert("count", 3);
    bundle.insert("ratio", 0.5);
    bundle.insert("on", true);

    assert_eq!(bundle.get_str("name"), Some("ada"));
    assert_eq!(bundle.get_i64("count"), Some(3));
    assert_eq!(bundle.get_f64("ratio"), Some(0.5));
    assert_eq!(bundle.get_bool("on"), Some(true));
    assert_eq!(bundle.get_str("count"), None);
    assert_eq!(bundle.get_i64("missing"), None);
}
