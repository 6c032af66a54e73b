//! Type and capability queries against the foreign runtime.
//!
//! Capabilities are interface or superclass relationships, named by their
//! foreign classname. The handful the bridge itself depends on are tagged
//! in [`Capability`]; anything else travels as [`Capability::Named`].

use std::fmt;

use crate::runtime::{ForeignHandle, ForeignRuntime};

/// Foreign classnames the bridge refers to.
pub mod names {
    pub const OBJECT: &str = "java.lang.Object";
    pub const SERIALIZABLE: &str = "java.io.Serializable";
    pub const OPTION_HANDLER: &str = "adams.core.option.OptionHandler";
    pub const SYSTEM_INFO: &str = "adams.core.SystemInfo";
    pub const ACTOR: &str = "adams.flow.core.Actor";
    pub const ACTOR_HANDLER: &str = "adams.flow.core.ActorHandler";
    pub const CONTROL_ACTOR: &str = "adams.flow.core.ControlActor";
    pub const FLOW: &str = "adams.flow.control.Flow";
}

/// A named interface or superclass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `java.io.Serializable`.
    Serializable,
    /// `adams.core.option.OptionHandler`.
    OptionHandler,
    /// `adams.flow.core.Actor`.
    Actor,
    /// `adams.flow.core.ActorHandler`.
    ActorHandler,
    /// `adams.flow.control.Flow`, the top-level flow container.
    Flow,
    /// Any other class or interface.
    Named(String),
}

impl Capability {
    /// Look up the tag for a foreign classname.
    pub fn resolve(name: &str) -> Self {
        match name {
            names::SERIALIZABLE => Capability::Serializable,
            names::OPTION_HANDLER => Capability::OptionHandler,
            names::ACTOR => Capability::Actor,
            names::ACTOR_HANDLER => Capability::ActorHandler,
            names::FLOW => Capability::Flow,
            other => Capability::Named(other.to_string()),
        }
    }

    /// The foreign classname of this capability.
    pub fn foreign_name(&self) -> &str {
        match self {
            Capability::Serializable => names::SERIALIZABLE,
            Capability::OptionHandler => names::OPTION_HANDLER,
            Capability::Actor => names::ACTOR,
            Capability::ActorHandler => names::ACTOR_HANDLER,
            Capability::Flow => names::FLOW,
            Capability::Named(name) => name,
        }
    }
}

impl From<&str> for Capability {
    fn from(name: &str) -> Self {
        Capability::resolve(name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.foreign_name())
    }
}

/// Foreign-style classname for a host type, `<namespace>.<name>`.
///
/// Used where a host value stands in for a foreign one, e.g. in error
/// messages about objects that were never bound to the foreign runtime.
pub fn host_classname<T: ?Sized>() -> String {
    std::any::type_name::<T>().replace("::", ".")
}

/// Foreign-style classname for a host value.
pub fn host_classname_of<T: ?Sized>(_value: &T) -> String {
    host_classname::<T>()
}

/// Whether the object's class is, implements or extends `capability`.
///
/// Arrays are tested by their element type. A failed match, including a
/// failed foreign query, is `false`.
pub fn matches_capability(
    runtime: &dyn ForeignRuntime,
    obj: &ForeignHandle,
    capability: &Capability,
) -> bool {
    let classname = match element_classname(runtime, obj) {
        Some(classname) => classname,
        None => return false,
    };
    let wanted = capability.foreign_name();
    runtime.class_matches(wanted, &classname).unwrap_or(false)
        || runtime.has_interface(wanted, &classname).unwrap_or(false)
}

fn element_classname(runtime: &dyn ForeignRuntime, obj: &ForeignHandle) -> Option<String> {
    if runtime.is_array(obj).ok()? {
        runtime.component_classname(obj).ok()?
    } else {
        runtime.classname(obj).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::memory::{Catalog, MemoryRuntime};
    use crate::runtime::ObjectRuntime;

    struct Local;

    #[test]
    fn resolve_known_names() {
        assert_eq!(Capability::resolve(names::ACTOR), Capability::Actor);
        assert_eq!(Capability::from(names::FLOW), Capability::Flow);
        assert_eq!(
            Capability::resolve("weka.core.Instance"),
            Capability::Named("weka.core.Instance".to_string())
        );
        assert_eq!(Capability::Serializable.to_string(), names::SERIALIZABLE);
    }

    #[test]
    fn host_classnames() {
        let name = host_classname::<Local>();
        assert!(name.ends_with(".Local"));
        assert!(!name.contains("::"));
        assert_eq!(host_classname_of(&Local), name);
    }

    #[test]
    fn matches_exact_and_inherited() {
        let rt = MemoryRuntime::new(Catalog::standard());
        let flow = rt.new_instance(names::FLOW, &[]).unwrap();
        assert!(matches_capability(&rt, &flow, &Capability::Flow));
        assert!(matches_capability(&rt, &flow, &Capability::Actor));
        assert!(matches_capability(&rt, &flow, &Capability::Serializable));
        assert!(!matches_capability(
            &rt,
            &flow,
            &Capability::Named("weka.core.Instance".into())
        ));
    }

    #[test]
    fn arrays_match_by_element_type() {
        let rt = MemoryRuntime::new(Catalog::standard());
        let actors = rt.new_array(names::FLOW).unwrap();
        assert!(matches_capability(&rt, &actors, &Capability::Actor));
        let infos = rt.new_array(names::SYSTEM_INFO).unwrap();
        assert!(!matches_capability(&rt, &infos, &Capability::Actor));
    }

    #[test]
    fn stale_handle_does_not_match() {
        let rt = MemoryRuntime::new(Catalog::standard());
        let stale = crate::runtime::ForeignHandle::from_raw(999);
        assert!(!matches_capability(&rt, &stale, &Capability::Actor));
    }
}
