//! The seam between the bridge and the foreign flow runtime.
//!
//! Everything the bridge knows about the foreign engine goes through the
//! traits in this module. A [`Launcher`] brings a runtime up from a
//! [`LaunchConfig`]; the resulting [`ForeignRuntime`] answers type queries,
//! drives actors and reads/writes flows. The runtime owns the foreign
//! objects; the bridge only ever holds [`ForeignHandle`] keys into the
//! runtime's reference table.
//!
//! The JNI runtime in `adams-bridge-jvm` implements the seam against ADAMS.
//! The `memory` module, built for tests and behind the `memory` feature,
//! holds an in-process test double.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

/// An opaque reference to an object living in the foreign runtime.
///
/// A handle is a key into the runtime's reference table. It is deliberately
/// not `Clone`: a second reference to the same object is obtained through
/// [`ObjectRuntime::duplicate`], and every reference is given back exactly
/// once through [`ObjectRuntime::release`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ForeignHandle(u64);

impl ForeignHandle {
    /// Create a handle from a runtime-specific reference key.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the runtime-specific reference key.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// An error raised inside the foreign runtime, carrying its diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ForeignError {
    message: String,
}

impl ForeignError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for calls into the foreign runtime.
pub type ForeignResult<T> = std::result::Result<T, ForeignError>;

/// Topological role of an actor, as classified by the foreign runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActorRole {
    Standalone,
    Source,
    Transformer,
    Sink,
    ActorHandler,
    Control,
    Interactive,
}

impl ActorRole {
    /// All roles, in classification order.
    pub const ALL: [ActorRole; 7] = [
        ActorRole::Standalone,
        ActorRole::Source,
        ActorRole::Transformer,
        ActorRole::Sink,
        ActorRole::ActorHandler,
        ActorRole::Control,
        ActorRole::Interactive,
    ];
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorRole::Standalone => "standalone",
            ActorRole::Source => "source",
            ActorRole::Transformer => "transformer",
            ActorRole::Sink => "sink",
            ActorRole::ActorHandler => "actor handler",
            ActorRole::Control => "control actor",
            ActorRole::Interactive => "interactive",
        };
        f.write_str(name)
    }
}

/// Type queries and object management.
pub trait ObjectRuntime {
    /// Fully-qualified classname of the object.
    fn classname(&self, obj: &ForeignHandle) -> ForeignResult<String>;

    /// Whether the object is an array.
    fn is_array(&self, obj: &ForeignHandle) -> ForeignResult<bool>;

    /// Classname of the array's element type, `None` for non-arrays.
    fn component_classname(&self, obj: &ForeignHandle) -> ForeignResult<Option<String>>;

    /// Whether `classname` is exactly `class_or_intf`.
    fn class_matches(&self, class_or_intf: &str, classname: &str) -> ForeignResult<bool>;

    /// Whether `classname` implements or extends `class_or_intf`.
    fn has_interface(&self, class_or_intf: &str, classname: &str) -> ForeignResult<bool>;

    /// The object's own string representation (`toString`).
    fn describe(&self, obj: &ForeignHandle) -> ForeignResult<String>;

    /// Identity hash of the referenced object.
    fn identity(&self, obj: &ForeignHandle) -> ForeignResult<u64>;

    /// Whether two references point at the same object.
    fn same_object(&self, a: &ForeignHandle, b: &ForeignHandle) -> ForeignResult<bool>;

    /// Create a second reference to the same object.
    fn duplicate(&self, obj: &ForeignHandle) -> ForeignResult<ForeignHandle>;

    /// Give a reference back to the runtime. The handle must not be used
    /// afterwards.
    fn release(&self, obj: &ForeignHandle);

    /// Build an object of `classname`, configured from an option array.
    fn new_instance(&self, classname: &str, options: &[String]) -> ForeignResult<ForeignHandle>;
}

/// The actor protocol.
pub trait ActorRuntime {
    /// Returns `Some(diagnostic)` if set up failed.
    fn set_up(&self, actor: &ForeignHandle) -> ForeignResult<Option<String>>;

    /// Returns `Some(diagnostic)` if execution failed.
    fn execute(&self, actor: &ForeignHandle) -> ForeignResult<Option<String>>;

    fn wrap_up(&self, actor: &ForeignHandle) -> ForeignResult<()>;

    fn clean_up(&self, actor: &ForeignHandle) -> ForeignResult<()>;

    fn stop_execution(&self, actor: &ForeignHandle, msg: Option<&str>) -> ForeignResult<()>;

    fn is_finished(&self, actor: &ForeignHandle) -> ForeignResult<bool>;

    fn is_executed(&self, actor: &ForeignHandle) -> ForeignResult<bool>;

    fn is_stopped(&self, actor: &ForeignHandle) -> ForeignResult<bool>;

    fn is_headless(&self, actor: &ForeignHandle) -> ForeignResult<bool>;

    fn set_headless(&self, actor: &ForeignHandle, headless: bool) -> ForeignResult<()>;

    fn root(&self, actor: &ForeignHandle) -> ForeignResult<Option<ForeignHandle>>;

    fn parent(&self, actor: &ForeignHandle) -> ForeignResult<Option<ForeignHandle>>;

    fn to_commandline(&self, actor: &ForeignHandle) -> ForeignResult<String>;
}

/// Option consumers and producers.
pub trait OptionRuntime {
    /// Configure the object from a JSON document.
    fn consume_json(&self, obj: &ForeignHandle, json: &str) -> ForeignResult<()>;

    /// Serialize the object's configuration as a JSON document.
    fn produce_json(&self, obj: &ForeignHandle) -> ForeignResult<String>;

    /// Configure the object from an option array.
    fn consume_args(&self, obj: &ForeignHandle, args: &[String]) -> ForeignResult<()>;

    /// Serialize the object's configuration as an option array.
    fn produce_args(&self, obj: &ForeignHandle) -> ForeignResult<Vec<String>>;
}

/// Flow reading, writing and actor classification.
pub trait FlowRuntime {
    /// Read a flow file. Reader diagnostics are appended to `errors` and
    /// `warnings`; `None` means the reader failed.
    fn read_flow(
        &self,
        path: &std::path::Path,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> ForeignResult<Option<ForeignHandle>>;

    /// Write an actor to a flow file, returning whether the writer succeeded.
    fn write_flow(&self, path: &std::path::Path, actor: &ForeignHandle) -> ForeignResult<bool>;

    /// Whether the actor has the given role.
    fn classify(&self, actor: &ForeignHandle, role: ActorRole) -> ForeignResult<bool>;
}

/// A running foreign execution host.
pub trait ForeignRuntime: ObjectRuntime + ActorRuntime + OptionRuntime + FlowRuntime + Send + Sync {
    /// A short name for log output.
    fn name(&self) -> &str;

    /// Shut the execution host down. Called at most once.
    fn shutdown(&self);
}

/// Everything needed to launch an execution host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchConfig {
    /// Resource path entries (classpath), in order.
    pub resource_paths: Vec<PathBuf>,

    /// Host-process launch options, e.g. `-Xmx4g`.
    pub options: Vec<String>,

    /// Whether the host runs without any interactive or GUI behavior.
    pub headless: bool,

    /// Whether foreign strings are converted to host strings automatically.
    pub convert_text: bool,
}

/// Launches a foreign execution host.
pub trait Launcher: Send + Sync {
    fn launch(&self, config: &LaunchConfig) -> ForeignResult<Arc<dyn ForeignRuntime>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_handle_raw() {
        let handle = ForeignHandle::from_raw(7);
        assert_eq!(handle.raw(), 7);
        assert_eq!(handle.to_string(), "ref#7");
    }

    #[test]
    fn foreign_error_message() {
        let e = ForeignError::new("ClassNotFoundException: foo.Bar");
        assert_eq!(e.message(), "ClassNotFoundException: foo.Bar");
        assert_eq!(e.to_string(), "ClassNotFoundException: foo.Bar");
    }

    #[test]
    fn roles_are_distinct() {
        let mut roles = ActorRole::ALL.to_vec();
        roles.sort();
        roles.dedup();
        assert_eq!(roles.len(), 7);
        assert_eq!(ActorRole::ActorHandler.to_string(), "actor handler");
    }
}
