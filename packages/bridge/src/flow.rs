//! Reading and writing flow files, and classifying actors by role.

use std::path::Path;

use tracing::debug;

use crate::actor::ActorHandle;
use crate::capability::Capability;
use crate::error::Result;
use crate::host::Session;
use crate::messages::MessageSink;
use crate::runtime::ActorRole;

/// Read a flow file.
///
/// Reader diagnostics go into `errors` and `warnings` when supplied; a
/// failed read is `Ok(None)`, not an error. When the session is headless
/// and the loaded actor is a flow, the flow is switched to headless mode
/// regardless of what the file says.
pub fn read(
    session: &Session,
    path: impl AsRef<Path>,
    errors: Option<&mut MessageSink>,
    warnings: Option<&mut MessageSink>,
) -> Result<Option<ActorHandle>> {
    let path = path.as_ref();
    let mut read_errors = Vec::new();
    let mut read_warnings = Vec::new();
    let handle = session
        .runtime()?
        .read_flow(path, &mut read_errors, &mut read_warnings)?;

    debug!(
        path = %path.display(),
        loaded = handle.is_some(),
        errors = read_errors.len(),
        warnings = read_warnings.len(),
        "Read flow"
    );
    if let Some(errors) = errors {
        errors.add(read_errors);
    }
    if let Some(warnings) = warnings {
        warnings.add(read_warnings);
    }

    let Some(handle) = handle else {
        return Ok(None);
    };
    let actor = ActorHandle::from_foreign(session, Some(handle))?;
    if session.is_headless() && actor.check_type(&Capability::Flow)? {
        actor.set_headless(true)?;
    }
    Ok(Some(actor))
}

/// Write `actor` to a flow file. Returns whether writing succeeded.
pub fn write(path: impl AsRef<Path>, actor: &ActorHandle) -> Result<bool> {
    Ok(actor.runtime()?.write_flow(path.as_ref(), actor.foreign())?)
}

/// Whether `actor` has `role`, as decided by the foreign runtime.
pub fn has_role(actor: &ActorHandle, role: ActorRole) -> Result<bool> {
    Ok(actor.runtime()?.classify(actor.foreign(), role)?)
}

/// Every role `actor` has, in [`ActorRole::ALL`] order.
pub fn roles(actor: &ActorHandle) -> Result<Vec<ActorRole>> {
    let mut roles = Vec::new();
    for role in ActorRole::ALL {
        if has_role(actor, role)? {
            roles.push(role);
        }
    }
    Ok(roles)
}

pub fn is_standalone(actor: &ActorHandle) -> Result<bool> {
    has_role(actor, ActorRole::Standalone)
}

pub fn is_source(actor: &ActorHandle) -> Result<bool> {
    has_role(actor, ActorRole::Source)
}

pub fn is_transformer(actor: &ActorHandle) -> Result<bool> {
    has_role(actor, ActorRole::Transformer)
}

pub fn is_sink(actor: &ActorHandle) -> Result<bool> {
    has_role(actor, ActorRole::Sink)
}

pub fn is_actor_handler(actor: &ActorHandle) -> Result<bool> {
    has_role(actor, ActorRole::ActorHandler)
}

pub fn is_control_actor(actor: &ActorHandle) -> Result<bool> {
    has_role(actor, ActorRole::Control)
}

pub fn is_interactive(actor: &ActorHandle) -> Result<bool> {
    has_role(actor, ActorRole::Interactive)
}
