//! Error types for the ADAMS bridge.

use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::ForeignError;

/// Errors that can occur while driving the foreign runtime.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A wrap operation was handed an absent foreign object.
    #[error("invalid handle: no foreign object supplied ({0})")]
    InvalidHandle(String),

    /// A foreign object does not implement or subclass the required type.
    #[error("object does not implement or subclass {capability}: {classname}")]
    TypeMismatch {
        classname: String,
        capability: String,
    },

    /// The foreign option-aware factory failed to build an object.
    #[error("failed to instantiate {classname}: {message}")]
    Instantiation { classname: String, message: String },

    /// A textual or argument-list configuration could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigurationParse(String),

    /// More than one configuration form was supplied at construction.
    #[error("conflicting configurations supplied: {0}")]
    ConfigurationConflict(String),

    /// The root directory handed to the bootstrap does not exist.
    #[error("ADAMS root dir does not exist: {}", .0.display())]
    RootDirNotFound(PathBuf),

    /// No execution host is running.
    #[error("execution host not started")]
    HostNotStarted,

    /// The execution host that created this handle has been stopped.
    #[error("execution host stopped, handle is no longer valid")]
    HostStopped,

    /// The foreign execution host could not be launched.
    #[error("failed to launch execution host: {0}")]
    Launch(String),

    /// The foreign runtime raised an error.
    #[error("foreign error: {0}")]
    Foreign(#[from] ForeignError),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::ConfigurationParse(e.to_string())
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_display() {
        let e = BridgeError::TypeMismatch {
            classname: "java.lang.String".to_string(),
            capability: "adams.flow.core.Actor".to_string(),
        };
        let s = e.to_string();
        assert!(s.contains("java.lang.String"));
        assert!(s.contains("adams.flow.core.Actor"));
    }

    #[test]
    fn root_dir_display() {
        let e = BridgeError::RootDirNotFound(PathBuf::from("/opt/missing"));
        assert!(e.to_string().contains("/opt/missing"));
    }

    #[test]
    fn json_error_is_parse_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: BridgeError = err.into();
        assert!(matches!(e, BridgeError::ConfigurationParse(_)));
    }

    #[test]
    fn foreign_error_converts() {
        let e: BridgeError = ForeignError::new("NullPointerException").into();
        assert!(e.to_string().contains("NullPointerException"));
    }
}
