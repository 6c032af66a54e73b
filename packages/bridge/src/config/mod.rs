//! Actor configuration and its three external forms.
//!
//! A [`Configuration`] is the canonical in-memory form: an ordered mapping
//! from option name to JSON value. The codecs convert it to and from
//!
//! - a mapping (`serde_json::Map`), see [`Configuration::from_mapping`],
//! - a JSON document, see [`text`],
//! - a flat option array, see [`args`].
//!
//! Round-trips are a property of the codecs: decoding what a codec encoded
//! yields an equal configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod args;
pub mod text;

/// An ordered set of options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    options: Map<String, Value>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a mapping of option name to value.
    pub fn from_mapping(options: Map<String, Value>) -> Self {
        Self { options }
    }

    /// Get the options as a mapping.
    pub fn to_mapping(&self) -> Map<String, Value> {
        self.options.clone()
    }

    pub fn into_mapping(self) -> Map<String, Value> {
        self.options
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// Set an option, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.options.insert(name.into(), value.into())
    }

    /// Builder-style variant of [`Configuration::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` onto this configuration, option by option.
    pub fn merge(&mut self, other: Configuration) {
        for (name, value) in other.options {
            self.options.insert(name, value);
        }
    }
}

impl FromIterator<(String, Value)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}

/// Whether `value` may be stored in an option whose default is `default`.
pub fn same_kind(default: &Value, value: &Value) -> bool {
    matches!(
        (default, value),
        (Value::Null, _)
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preserves_insertion_order() {
        let config = Configuration::new()
            .with("zeta", 1)
            .with("alpha", "a")
            .with("mid", true);
        let names: Vec<_> = config.names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn mapping_round_trip() {
        let config = Configuration::new().with("expression", "X*2").with("skip", false);
        let back = Configuration::from_mapping(config.to_mapping());
        assert_eq!(back, config);
    }

    #[test]
    fn merge_overrides() {
        let mut base = Configuration::new().with("a", 1).with("b", 2);
        base.merge(Configuration::new().with("b", 3).with("c", 4));
        assert_eq!(base.get("b"), Some(&json!(3)));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn kinds() {
        assert!(same_kind(&json!(1), &json!(2.5)));
        assert!(same_kind(&json!(null), &json!("x")));
        assert!(!same_kind(&json!("x"), &json!(1)));
        assert!(!same_kind(&json!([]), &json!({})));
    }
}
