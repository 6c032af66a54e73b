//! Option-array codec.
//!
//! Options travel as `-name value` pairs. Both directions are typed against
//! a schema, normally the option defaults of the actor class, so
//! `-loop_upper 10` becomes a number where the default is a number and the
//! string `"10"` where the default is a string.
//!
//! String values of string-typed options are passed raw. Everything else is
//! passed as its JSON text, including strings of untyped options (a `null`
//! default or none at all), so `"123"` stays a string on the way back.

use serde_json::Value;

use super::{same_kind, Configuration};
use crate::error::{BridgeError, Result};

/// Encode a configuration as a flat option array typed against `schema`.
pub fn encode(config: &Configuration, schema: &Configuration) -> Vec<String> {
    let mut args = Vec::with_capacity(config.len() * 2);
    for (name, value) in config.iter() {
        args.push(format!("-{}", name));
        args.push(encode_value(value, schema.get(name)));
    }
    args
}

fn encode_value(value: &Value, default: Option<&Value>) -> String {
    match (value, default) {
        (Value::String(s), Some(Value::String(_))) => s.clone(),
        (other, _) => other.to_string(),
    }
}

/// Decode an option array against `schema`.
///
/// Unknown option names, flags without a value, stray tokens and values of
/// the wrong kind are parse errors.
pub fn decode<S: AsRef<str>>(args: &[S], schema: &Configuration) -> Result<Configuration> {
    let mut config = Configuration::new();
    let mut iter = args.iter().map(AsRef::as_ref);

    while let Some(token) = iter.next() {
        let name = match token.strip_prefix('-') {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(BridgeError::ConfigurationParse(format!(
                    "expected an option flag, found '{}'",
                    token
                )))
            }
        };
        let default = schema.get(name).ok_or_else(|| {
            BridgeError::ConfigurationParse(format!("unknown option: -{}", name))
        })?;
        let raw = iter.next().ok_or_else(|| {
            BridgeError::ConfigurationParse(format!("missing value for option -{}", name))
        })?;
        config.set(name, decode_value(name, raw, default)?);
    }

    Ok(config)
}

fn decode_value(name: &str, raw: &str, default: &Value) -> Result<Value> {
    match default {
        Value::String(_) => Ok(Value::String(raw.to_string())),
        Value::Null => Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))),
        _ => {
            let value: Value = serde_json::from_str(raw).map_err(|e| {
                BridgeError::ConfigurationParse(format!("option -{}: {}", name, e))
            })?;
            if same_kind(default, &value) {
                Ok(value)
            } else {
                Err(BridgeError::ConfigurationParse(format!(
                    "option -{}: '{}' does not match the type of its default {}",
                    name, raw, default
                )))
            }
        }
    }
}

/// Quote a single token for display on a command line.
pub fn quote(token: &str) -> String {
    let needs_quotes = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return token.to_string();
    }
    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Render a classname and its option array as one command line.
pub fn commandline<S: AsRef<str>>(classname: &str, args: &[S]) -> String {
    let mut line = classname.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&quote(arg.as_ref()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Configuration {
        Configuration::new()
            .with("name", "ForLoop")
            .with("loop_lower", 1)
            .with("loop_upper", 10)
            .with("skip", false)
            .with("columns", json!([]))
            .with("extra", Value::Null)
    }

    #[test]
    fn encode_pairs() {
        let config = Configuration::new()
            .with("name", "loop")
            .with("loop_upper", 5)
            .with("skip", true);
        assert_eq!(
            encode(&config, &schema()),
            vec!["-name", "loop", "-loop_upper", "5", "-skip", "true"]
        );
    }

    #[test]
    fn decode_typed_against_schema() {
        let config = decode(&["-name", "42", "-loop_upper", "42", "-columns", "[\"a\",\"b\"]"], &schema()).unwrap();
        assert_eq!(config.get("name"), Some(&json!("42")));
        assert_eq!(config.get("loop_upper"), Some(&json!(42)));
        assert_eq!(config.get("columns"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn round_trip() {
        let config = Configuration::new()
            .with("name", "with space")
            .with("loop_lower", -3)
            .with("skip", true)
            .with("columns", json!(["x"]));
        assert_eq!(decode(&encode(&config, &schema()), &schema()).unwrap(), config);
    }

    #[test]
    fn untyped_option_falls_back_to_string() {
        let config = decode(&["-extra", "not json"], &schema()).unwrap();
        assert_eq!(config.get("extra"), Some(&json!("not json")));
    }

    #[test]
    fn untyped_string_keeps_its_kind() {
        let config = Configuration::new().with("extra", "123");
        let encoded = encode(&config, &schema());
        assert_eq!(encoded, vec!["-extra", "\"123\""]);
        assert_eq!(decode(&encoded, &schema()).unwrap(), config);

        let number = Configuration::new().with("extra", 123);
        assert_eq!(decode(&encode(&number, &schema()), &schema()).unwrap(), number);
    }

    #[test]
    fn rejects_unknown_option() {
        let err = decode(&["-bogus", "1"], &schema()).unwrap_err();
        assert!(err.to_string().contains("unknown option: -bogus"));
    }

    #[test]
    fn rejects_missing_value() {
        let err = decode(&["-skip"], &schema()).unwrap_err();
        assert!(err.to_string().contains("missing value"));
    }

    #[test]
    fn rejects_stray_token() {
        assert!(decode(&["skip", "true"], &schema()).is_err());
        assert!(decode(&["-", "true"], &schema()).is_err());
    }

    #[test]
    fn rejects_kind_mismatch() {
        let err = decode(&["-skip", "3"], &schema()).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigurationParse(_)));
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote(""), "\"\"");
        assert_eq!(quote("two words"), "\"two words\"");
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn commandline_rendering() {
        let line = commandline("adams.flow.source.ForLoop", &["-name", "my loop", "-loop_upper", "3"]);
        assert_eq!(line, "adams.flow.source.ForLoop -name \"my loop\" -loop_upper 3");
    }
}
