//! JSON document codec.

use serde_json::Value;

use super::Configuration;
use crate::error::{BridgeError, Result};

/// Encode a configuration as a compact JSON document.
pub fn encode(config: &Configuration) -> String {
    Value::Object(config.to_mapping()).to_string()
}

/// Decode a JSON document. The top level must be an object.
pub fn decode(text: &str) -> Result<Configuration> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(options) => Ok(Configuration::from_mapping(options)),
        other => Err(BridgeError::ConfigurationParse(format!(
            "expected a JSON object, found {}",
            kind_name(&other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
