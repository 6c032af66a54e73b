//! Ownership wrapper around a single foreign object.

use std::fmt;

use crate::capability::{matches_capability, Capability};
use crate::error::{BridgeError, Result};
use crate::host::Session;
use crate::runtime::{ForeignHandle, ForeignRuntime};

/// Type information of a foreign object, the bridge's view of its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Fully-qualified classname.
    pub classname: String,
    /// Whether the object is an array.
    pub is_array: bool,
    /// Classname of the elements, for arrays.
    pub component: Option<String>,
}

/// A handle bound to exactly one foreign object.
///
/// The handle owns one reference into the runtime and gives it back when
/// dropped. The object itself lives as long as the foreign runtime keeps
/// it alive.
pub struct ObjectHandle {
    session: Session,
    handle: ForeignHandle,
}

impl ObjectHandle {
    /// Bind to a foreign object. Fails if no object is supplied.
    pub fn wrap(session: &Session, handle: Option<ForeignHandle>) -> Result<Self> {
        let handle = handle.ok_or_else(|| {
            BridgeError::InvalidHandle("no foreign object supplied".to_string())
        })?;
        session.runtime()?;
        Ok(Self {
            session: session.clone(),
            handle,
        })
    }

    /// Build an object of `classname` through the foreign option-aware
    /// factory.
    pub fn instantiate<S: AsRef<str>>(
        session: &Session,
        classname: &str,
        options: &[S],
    ) -> Result<Self> {
        let options: Vec<String> = options.iter().map(|s| s.as_ref().to_string()).collect();
        let handle = session
            .runtime()?
            .new_instance(classname, &options)
            .map_err(|e| BridgeError::Instantiation {
                classname: classname.to_string(),
                message: e.to_string(),
            })?;
        Self::wrap(session, Some(handle))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The underlying foreign reference.
    pub fn foreign(&self) -> &ForeignHandle {
        &self.handle
    }

    /// The runtime, as long as the host is running.
    pub fn runtime(&self) -> Result<&dyn ForeignRuntime> {
        self.session.runtime()
    }

    /// Fully-qualified foreign classname.
    pub fn classname(&self) -> Result<String> {
        Ok(self.runtime()?.classname(&self.handle)?)
    }

    /// The object's type information.
    pub fn type_descriptor(&self) -> Result<TypeDescriptor> {
        let runtime = self.runtime()?;
        Ok(TypeDescriptor {
            classname: runtime.classname(&self.handle)?,
            is_array: runtime.is_array(&self.handle)?,
            component: runtime.component_classname(&self.handle)?,
        })
    }

    pub fn is_serializable(&self) -> Result<bool> {
        self.check_type(&Capability::Serializable)
    }

    /// Whether the object is, implements or extends `capability`.
    pub fn check_type(&self, capability: &Capability) -> Result<bool> {
        Ok(matches_capability(self.runtime()?, &self.handle, capability))
    }

    /// Fail with [`BridgeError::TypeMismatch`] unless the object satisfies
    /// `capability`.
    pub fn enforce_type(&self, capability: &Capability) -> Result<()> {
        if self.check_type(capability)? {
            return Ok(());
        }
        Err(BridgeError::TypeMismatch {
            classname: self.classname()?,
            capability: capability.foreign_name().to_string(),
        })
    }

    /// Identity hash of the foreign object.
    pub fn identity(&self) -> Result<u64> {
        Ok(self.runtime()?.identity(&self.handle)?)
    }

    /// Whether both handles refer to the same foreign object.
    pub fn same_object(&self, other: &ObjectHandle) -> Result<bool> {
        Ok(self.runtime()?.same_object(&self.handle, &other.handle)?)
    }

    /// A second handle onto the same foreign object.
    pub fn try_clone(&self) -> Result<Self> {
        let handle = self.runtime()?.duplicate(&self.handle)?;
        Ok(Self {
            session: self.session.clone(),
            handle,
        })
    }

    /// The foreign object's string representation.
    pub fn describe(&self) -> Result<String> {
        Ok(self.runtime()?.describe(&self.handle)?)
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        if let Ok(runtime) = self.session.runtime() {
            runtime.release(&self.handle);
        }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe() {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(f, "<{}: {}>", self.handle, e),
        }
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("session", &self.session.id())
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::names;
    use crate::runtime::memory::{Catalog, MemoryRuntime};
    use std::sync::Arc;

    fn session() -> (Arc<MemoryRuntime>, Session) {
        let runtime = Arc::new(MemoryRuntime::new(Catalog::standard()));
        let session = Session::new(runtime.clone(), false);
        (runtime, session)
    }

    #[test]
    fn wrap_absent_object_fails() {
        let (_, session) = session();
        let err = ObjectHandle::wrap(&session, None).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle(_)));
    }

    #[test]
    fn instantiate_and_query() {
        let (_, session) = session();
        let info = ObjectHandle::instantiate::<&str>(&session, names::SYSTEM_INFO, &[]).unwrap();
        assert_eq!(info.classname().unwrap(), names::SYSTEM_INFO);
        assert!(info.is_serializable().unwrap());
        assert_eq!(info.to_string(), "memory runtime");

        let descriptor = info.type_descriptor().unwrap();
        assert!(!descriptor.is_array);
        assert_eq!(descriptor.component, None);
    }

    #[test]
    fn instantiate_unknown_class() {
        let (_, session) = session();
        let err = ObjectHandle::instantiate(&session, "no.such.Class", &["-x"]).unwrap_err();
        match err {
            BridgeError::Instantiation { classname, message } => {
                assert_eq!(classname, "no.such.Class");
                assert!(message.contains("ClassNotFoundException"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn enforce_type_reports_classname_and_capability() {
        let (_, session) = session();
        let info = ObjectHandle::instantiate::<&str>(&session, names::SYSTEM_INFO, &[]).unwrap();
        assert!(info.enforce_type(&Capability::Serializable).is_ok());
        match info.enforce_type(&Capability::Actor).unwrap_err() {
            BridgeError::TypeMismatch {
                classname,
                capability,
            } => {
                assert_eq!(classname, names::SYSTEM_INFO);
                assert_eq!(capability, names::ACTOR);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn clones_share_identity_and_release_on_drop() {
        let (runtime, session) = session();
        let a = ObjectHandle::instantiate::<&str>(&session, names::SYSTEM_INFO, &[]).unwrap();
        let b = a.try_clone().unwrap();
        assert!(a.same_object(&b).unwrap());
        assert_eq!(a.identity().unwrap(), b.identity().unwrap());
        assert_eq!(runtime.reference_count(), 2);

        drop(a);
        assert_eq!(runtime.object_count(), 1);
        drop(b);
        assert_eq!(runtime.object_count(), 0);
    }

    #[test]
    fn array_descriptor() {
        let (runtime, session) = session();
        let array = ObjectHandle::wrap(&session, Some(runtime.new_array(names::FLOW).unwrap())).unwrap();
        let descriptor = array.type_descriptor().unwrap();
        assert!(descriptor.is_array);
        assert_eq!(descriptor.component.as_deref(), Some(names::FLOW));
        assert!(array.check_type(&Capability::Actor).unwrap());
    }
}
