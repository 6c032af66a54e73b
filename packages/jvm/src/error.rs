//! Error types for the JVM runtime.

use std::path::PathBuf;

use adams_bridge::ForeignError;
use thiserror::Error;

/// Errors that can occur while talking to the JVM.
#[derive(Debug, Error)]
pub enum JvmError {
    /// A Java exception was thrown; carries its `toString()`.
    #[error("{0}")]
    Java(String),

    /// A JNI call failed.
    #[error("jni error: {0}")]
    Jni(#[from] jni::errors::Error),

    /// The JVM init arguments were rejected.
    #[error("invalid JVM arguments: {0}")]
    InitArgs(#[from] jni::JvmError),

    /// The JVM could not be created.
    #[error("failed to start JVM: {0}")]
    Start(#[from] jni::errors::StartJvmError),

    /// A JVM was already created in this process.
    #[error("a JVM has already been launched in this process")]
    AlreadyLaunched,

    /// The JVM has been destroyed.
    #[error("JVM has been shut down")]
    Stopped,

    /// The reference is not (or no longer) in the reference table.
    #[error("stale reference: ref#{0}")]
    StaleReference(u64),

    /// A Java method returned null where an object was required.
    #[error("{0} returned null")]
    NullResult(&'static str),

    /// The classpath cannot be passed to the JVM.
    #[error("invalid classpath: {0}")]
    Classpath(String),

    /// A file path that is not valid UTF-8 and so has no Java string form.
    #[error("path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// Result type alias for JVM operations.
pub type Result<T> = std::result::Result<T, JvmError>;

impl From<JvmError> for ForeignError {
    fn from(error: JvmError) -> Self {
        ForeignError::new(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_exception_text_is_kept() {
        let error = JvmError::Java("java.lang.ClassNotFoundException: a.B".to_string());
        let foreign: ForeignError = error.into();
        assert_eq!(foreign.message(), "java.lang.ClassNotFoundException: a.B");
    }

    #[test]
    fn stale_reference_names_the_key() {
        assert_eq!(JvmError::StaleReference(7).to_string(), "stale reference: ref#7");
    }
}
