//! Actor handles: lifecycle and configuration of a single foreign actor.
//!
//! An [`ActorHandle`] is an [`ObjectHandle`] whose object is known to be an
//! actor; the check happens at construction and fails with
//! [`BridgeError::TypeMismatch`]. The handle drives the actor protocol
//!
//! ```text
//! Uninitialized --set_up--> SetUp --execute--> Executing --> Executed
//!       ^                                                       |
//!       +------------------ WrappedUp <-------wrap_up-----------+
//!
//! clean_up: any state --> CleanedUp
//! ```
//!
//! and imports/exports the actor's configuration as a mapping, a JSON
//! document or an option array.
//!
//! `set_up` and `execute` report failures the way the foreign runtime does,
//! as a diagnostic string; the outer `Result` only carries bridge failures
//! such as a stopped host.

use std::fmt;
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::debug;

use crate::capability::Capability;
use crate::config::{text, Configuration};
use crate::error::{BridgeError, Result};
use crate::host::Session;
use crate::object::ObjectHandle;
use crate::runtime::ForeignHandle;

/// Where the bridge believes the actor is in its protocol.
///
/// This is bookkeeping of the calls made through this handle. The actor's
/// own flags (`is_executed`, `is_stopped`, ...) are always read live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    SetUp,
    Executing,
    Executed,
    WrappedUp,
    CleanedUp,
}

/// A handle onto a foreign actor.
pub struct ActorHandle {
    object: ObjectHandle,
    state: Mutex<LifecycleState>,
}

impl ActorHandle {
    /// Bind to an object that must be an actor.
    pub fn wrap(object: ObjectHandle) -> Result<Self> {
        object.enforce_type(&Capability::Actor)?;
        Ok(Self {
            object,
            state: Mutex::new(LifecycleState::Uninitialized),
        })
    }

    /// Bind to a foreign reference that must be an actor.
    pub fn from_foreign(session: &Session, handle: Option<ForeignHandle>) -> Result<Self> {
        Self::wrap(ObjectHandle::wrap(session, handle)?)
    }

    /// Instantiate an actor with its default configuration.
    pub fn new(session: &Session, classname: &str) -> Result<Self> {
        Self::wrap(ObjectHandle::instantiate::<&str>(session, classname, &[])?)
    }

    /// Start building an actor of `classname`.
    pub fn builder(classname: impl Into<String>) -> ActorBuilder {
        ActorBuilder::new(classname)
    }

    pub fn from_mapping(session: &Session, classname: &str, options: Map<String, Value>) -> Result<Self> {
        Self::builder(classname).mapping(options).build(session)
    }

    pub fn from_text(session: &Session, classname: &str, text: &str) -> Result<Self> {
        Self::builder(classname).text(text).build(session)
    }

    pub fn from_args<S: AsRef<str>>(session: &Session, classname: &str, args: &[S]) -> Result<Self> {
        Self::builder(classname).args(args).build(session)
    }

    pub fn as_object(&self) -> &ObjectHandle {
        &self.object
    }

    /// The protocol state as seen through this handle.
    pub fn lifecycle(&self) -> LifecycleState {
        *self.state()
    }

    fn state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, state: LifecycleState) {
        *self.state() = state;
    }

    /// Run the actor's set up. Returns `Some(diagnostic)` on failure; the
    /// handle stays usable for another attempt.
    pub fn set_up(&self) -> Result<Option<String>> {
        match self.lifecycle() {
            LifecycleState::CleanedUp => {
                return Ok(Some("actor has been cleaned up".to_string()));
            }
            LifecycleState::Executing => {
                return Ok(Some("actor is executing".to_string()));
            }
            LifecycleState::Executed => {
                return Ok(Some(
                    "actor must be wrapped up before it can be set up again".to_string(),
                ));
            }
            _ => {}
        }

        let result = self.runtime()?.set_up(self.foreign())?;
        match &result {
            None => self.transition(LifecycleState::SetUp),
            Some(msg) => debug!(actor = %self.object, error = %msg, "set up failed"),
        }
        Ok(result)
    }

    /// Execute the actor. Returns `Some(diagnostic)` on failure.
    pub fn execute(&self) -> Result<Option<String>> {
        match self.lifecycle() {
            LifecycleState::SetUp | LifecycleState::Executed => {}
            LifecycleState::CleanedUp => {
                return Ok(Some("actor has been cleaned up".to_string()));
            }
            LifecycleState::Executing => {
                return Ok(Some("actor is already executing".to_string()));
            }
            LifecycleState::Uninitialized | LifecycleState::WrappedUp => {
                return Ok(Some("actor has not been set up".to_string()));
            }
        }

        let runtime = self.runtime()?;
        self.transition(LifecycleState::Executing);
        let result = runtime.execute(self.foreign());
        self.transition(LifecycleState::Executed);
        let result = result?;
        if let Some(msg) = &result {
            debug!(actor = %self.object, error = %msg, "execution failed");
        }
        Ok(result)
    }

    /// Release the per-run resources.
    pub fn wrap_up(&self) -> Result<()> {
        if self.lifecycle() == LifecycleState::CleanedUp {
            return Ok(());
        }
        self.runtime()?.wrap_up(self.foreign())?;
        self.transition(LifecycleState::WrappedUp);
        Ok(())
    }

    /// Release the per-instance resources. The actor cannot run again.
    pub fn clean_up(&self) -> Result<()> {
        if self.lifecycle() == LifecycleState::CleanedUp {
            return Ok(());
        }
        self.runtime()?.clean_up(self.foreign())?;
        self.transition(LifecycleState::CleanedUp);
        Ok(())
    }

    /// Ask a running actor to stop. The actor polls for the request.
    pub fn stop_execution(&self, msg: Option<&str>) -> Result<()> {
        Ok(self.runtime()?.stop_execution(self.foreign(), msg)?)
    }

    pub fn is_finished(&self) -> Result<bool> {
        Ok(self.runtime()?.is_finished(self.foreign())?)
    }

    pub fn is_executed(&self) -> Result<bool> {
        Ok(self.runtime()?.is_executed(self.foreign())?)
    }

    pub fn is_stopped(&self) -> Result<bool> {
        Ok(self.runtime()?.is_stopped(self.foreign())?)
    }

    pub fn is_headless(&self) -> Result<bool> {
        Ok(self.runtime()?.is_headless(self.foreign())?)
    }

    pub fn set_headless(&self, headless: bool) -> Result<()> {
        Ok(self.runtime()?.set_headless(self.foreign(), headless)?)
    }

    /// The topmost ancestor, `None` for actors without a parent.
    pub fn root(&self) -> Result<Option<ActorHandle>> {
        let root = self.runtime()?.root(self.foreign())?;
        self.related(root)
    }

    pub fn parent(&self) -> Result<Option<ActorHandle>> {
        let parent = self.runtime()?.parent(self.foreign())?;
        self.related(parent)
    }

    fn related(&self, handle: Option<ForeignHandle>) -> Result<Option<ActorHandle>> {
        match handle {
            Some(handle) => Ok(Some(Self::from_foreign(self.session(), Some(handle))?)),
            None => Ok(None),
        }
    }

    /// Classname and option array as a single command line.
    pub fn to_commandline(&self) -> Result<String> {
        Ok(self.runtime()?.to_commandline(self.foreign())?)
    }

    /// Configure the actor from a mapping of options.
    pub fn apply_mapping(&self, options: Map<String, Value>) -> Result<&Self> {
        self.apply_text(&text::encode(&Configuration::from_mapping(options)))
    }

    pub fn to_mapping(&self) -> Result<Map<String, Value>> {
        Ok(self.configuration()?.into_mapping())
    }

    /// Configure the actor from a JSON document.
    pub fn apply_text(&self, json: &str) -> Result<&Self> {
        let config = text::decode(json)?;
        self.runtime()?
            .consume_json(self.foreign(), &text::encode(&config))?;
        Ok(self)
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(self.runtime()?.produce_json(self.foreign())?)
    }

    /// Configure the actor from an option array.
    pub fn apply_args<S: AsRef<str>>(&self, args: &[S]) -> Result<&Self> {
        let args: Vec<String> = args.iter().map(|s| s.as_ref().to_string()).collect();
        self.runtime()?.consume_args(self.foreign(), &args)?;
        Ok(self)
    }

    pub fn to_args(&self) -> Result<Vec<String>> {
        Ok(self.runtime()?.produce_args(self.foreign())?)
    }

    /// The current configuration, decoded from the actor's JSON form.
    pub fn configuration(&self) -> Result<Configuration> {
        text::decode(&self.to_text()?)
    }

    pub fn apply_configuration(&self, config: &Configuration) -> Result<&Self> {
        self.apply_text(&text::encode(config))
    }
}

impl Deref for ActorHandle {
    type Target = ObjectHandle;

    fn deref(&self) -> &ObjectHandle {
        &self.object
    }
}

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.object, f)
    }
}

impl fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("object", &self.object)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

enum ConfigSource {
    Mapping(Map<String, Value>),
    Text(String),
    Args(Vec<String>),
}

impl ConfigSource {
    fn kind(&self) -> &'static str {
        match self {
            ConfigSource::Mapping(_) => "mapping",
            ConfigSource::Text(_) => "text",
            ConfigSource::Args(_) => "args",
        }
    }
}

/// Builds an actor, optionally configured from exactly one of the three
/// configuration forms.
pub struct ActorBuilder {
    classname: String,
    source: Option<ConfigSource>,
    conflict: Option<String>,
}

impl ActorBuilder {
    pub fn new(classname: impl Into<String>) -> Self {
        Self {
            classname: classname.into(),
            source: None,
            conflict: None,
        }
    }

    pub fn mapping(self, options: Map<String, Value>) -> Self {
        self.source(ConfigSource::Mapping(options))
    }

    pub fn text(self, json: impl Into<String>) -> Self {
        self.source(ConfigSource::Text(json.into()))
    }

    pub fn args<S: AsRef<str>>(self, args: &[S]) -> Self {
        self.source(ConfigSource::Args(
            args.iter().map(|s| s.as_ref().to_string()).collect(),
        ))
    }

    fn source(mut self, source: ConfigSource) -> Self {
        match &self.source {
            Some(existing) => {
                self.conflict = Some(format!(
                    "{} supplied after {}, only one configuration form is allowed",
                    source.kind(),
                    existing.kind()
                ));
            }
            None => self.source = Some(source),
        }
        self
    }

    /// Instantiate the actor and apply the configuration, if any.
    pub fn build(self, session: &Session) -> Result<ActorHandle> {
        if let Some(conflict) = self.conflict {
            return Err(BridgeError::ConfigurationConflict(conflict));
        }
        let actor = ActorHandle::new(session, &self.classname)?;
        match self.source {
            Some(ConfigSource::Mapping(options)) => {
                actor.apply_mapping(options)?;
            }
            Some(ConfigSource::Text(json)) => {
                actor.apply_text(&json)?;
            }
            Some(ConfigSource::Args(args)) => {
                actor.apply_args(&args)?;
            }
            None => {}
        }
        Ok(actor)
    }
}
