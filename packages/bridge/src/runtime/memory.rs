//! In-process flow runtime.
//!
//! [`MemoryRuntime`] is a test double for the foreign-runtime seam. It is
//! compiled for this crate's unit tests and, behind the `memory` feature,
//! for the integration suites. It models only what the bridge observes: a
//! class catalog with supertypes, roles and typed option defaults, a
//! reference table, the lifecycle flags of the actor protocol, and a small
//! JSON file format standing in for flow files. Actors do no work of their
//! own; tests attach an [`ActorBehavior`] to script diagnostics.
//!
//! Flow files are JSON documents of the form
//!
//! ```json
//! {
//!   "class": "adams.flow.control.Flow",
//!   "options": {"name": "example", "headless": false},
//!   "actors": [{"class": "adams.flow.source.ForLoop", "options": {"loop_upper": 3}}]
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{
    ActorRole, ActorRuntime, FlowRuntime, ForeignError, ForeignHandle, ForeignResult,
    ForeignRuntime, LaunchConfig, Launcher, ObjectRuntime, OptionRuntime,
};
use crate::capability::names;
use crate::config::{self, args, text, Configuration};

/// Hooks for the diagnostics an actor class reports from the protocol.
pub trait ActorBehavior: Send + Sync {
    /// Returns `Some(diagnostic)` to fail set up.
    fn set_up(&self, _config: &Configuration) -> Option<String> {
        None
    }

    /// Returns `Some(diagnostic)` to fail execution.
    fn execute(&self, _config: &Configuration) -> Option<String> {
        None
    }
}

#[derive(Clone)]
struct ActorDef {
    roles: Vec<ActorRole>,
    defaults: Configuration,
    behavior: Option<Arc<dyn ActorBehavior>>,
}

/// A class known to the memory runtime.
#[derive(Clone)]
pub struct ClassDef {
    name: String,
    supertypes: Vec<String>,
    interface: bool,
    display: Option<String>,
    actor: Option<ActorDef>,
}

impl ClassDef {
    /// A concrete, non-actor class.
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: vec![names::OBJECT.to_string()],
            interface: false,
            display: None,
            actor: None,
        }
    }

    /// An interface. Interfaces cannot be instantiated.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            interface: true,
            display: None,
            actor: None,
        }
    }

    /// A concrete actor class with the common `name`, `skip` and
    /// `annotations` options.
    pub fn actor(name: impl Into<String>) -> Self {
        let name = name.into();
        let short = name.rsplit('.').next().unwrap_or(&name).to_string();
        let mut def = Self::class(name);
        def.supertypes.push(names::ACTOR.to_string());
        def.actor = Some(ActorDef {
            roles: Vec::new(),
            defaults: Configuration::new()
                .with("name", short)
                .with("annotations", "")
                .with("skip", false),
            behavior: None,
        });
        def
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Text returned by `toString` for plain instances.
    pub fn display(mut self, text: impl Into<String>) -> Self {
        self.display = Some(text.into());
        self
    }

    /// Add a role. Ignored for non-actor classes.
    pub fn role(mut self, role: ActorRole) -> Self {
        if let Some(actor) = self.actor.as_mut() {
            actor.roles.push(role);
        }
        self
    }

    /// Declare an option and its default. Ignored for non-actor classes.
    pub fn option(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        if let Some(actor) = self.actor.as_mut() {
            actor.defaults.set(name, default);
        }
        self
    }

    pub fn behavior(mut self, behavior: Arc<dyn ActorBehavior>) -> Self {
        if let Some(actor) = self.actor.as_mut() {
            actor.behavior = Some(behavior);
        }
        self
    }
}

/// The set of classes a memory runtime knows.
#[derive(Clone, Default)]
pub struct Catalog {
    classes: BTreeMap<String, ClassDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The classes the bridge relies on, plus one actor per role.
    pub fn standard() -> Self {
        Catalog::new()
            .with(ClassDef::class(names::OBJECT))
            .with(ClassDef::interface(names::SERIALIZABLE))
            .with(ClassDef::interface(names::OPTION_HANDLER))
            .with(
                ClassDef::interface(names::ACTOR)
                    .extends(names::OPTION_HANDLER)
                    .extends(names::SERIALIZABLE),
            )
            .with(ClassDef::interface(names::ACTOR_HANDLER).extends(names::ACTOR))
            .with(ClassDef::interface(names::CONTROL_ACTOR).extends(names::ACTOR))
            .with(
                ClassDef::class(names::SYSTEM_INFO)
                    .extends(names::SERIALIZABLE)
                    .display("memory runtime"),
            )
            .with(
                ClassDef::actor(names::FLOW)
                    .extends(names::ACTOR_HANDLER)
                    .extends(names::CONTROL_ACTOR)
                    .role(ActorRole::ActorHandler)
                    .role(ActorRole::Control)
                    .option("headless", false),
            )
            .with(
                ClassDef::actor("adams.flow.standalone.SetVariable")
                    .role(ActorRole::Standalone)
                    .option("var_name", "variable")
                    .option("var_value", "value"),
            )
            .with(
                ClassDef::actor("adams.flow.source.ForLoop")
                    .role(ActorRole::Source)
                    .option("loop_lower", 1)
                    .option("loop_upper", 10)
                    .option("loop_step", 1),
            )
            .with(ClassDef::actor("adams.flow.transformer.PassThrough").role(ActorRole::Transformer))
            .with(
                ClassDef::actor("adams.flow.transformer.MathExpression")
                    .role(ActorRole::Transformer)
                    .option("expression", "X"),
            )
            .with(ClassDef::actor("adams.flow.sink.Null").role(ActorRole::Sink))
            .with(
                ClassDef::actor("adams.flow.sink.Display")
                    .role(ActorRole::Sink)
                    .role(ActorRole::Interactive)
                    .option("width", 800)
                    .option("height", 350)
                    .option("short_title", false),
            )
    }

    pub fn with(mut self, def: ClassDef) -> Self {
        self.classes.insert(def.name.clone(), def);
        self
    }

    /// Whether `classname` implements or extends `target`, transitively.
    pub fn is_subtype(&self, classname: &str, target: &str) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![classname];
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(def) = self.classes.get(current) {
                for supertype in &def.supertypes {
                    if supertype == target {
                        return true;
                    }
                    pending.push(supertype);
                }
            }
        }
        false
    }

    fn get(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    fn actor(&self, name: &str) -> Option<&ActorDef> {
        self.get(name).and_then(|def| def.actor.as_ref())
    }
}

#[derive(Debug)]
struct ActorObject {
    class: String,
    options: Configuration,
    parent: Option<u64>,
    children: Vec<u64>,
    set_up: bool,
    executed: bool,
    finished: bool,
    stopped: bool,
    stop_message: Option<String>,
    cleaned_up: bool,
}

impl ActorObject {
    fn new(class: String, options: Configuration, parent: Option<u64>) -> Self {
        Self {
            class,
            options,
            parent,
            children: Vec::new(),
            set_up: false,
            executed: false,
            finished: false,
            stopped: false,
            stop_message: None,
            cleaned_up: false,
        }
    }

    fn name(&self) -> &str {
        self.options
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&self.class)
    }
}

#[derive(Debug)]
enum Object {
    Plain { class: String },
    Array { component: String },
    Actor(ActorObject),
}

impl Object {
    fn classname(&self) -> String {
        match self {
            Object::Plain { class } => class.clone(),
            Object::Array { component } => format!("[L{};", component),
            Object::Actor(actor) => actor.class.clone(),
        }
    }
}

#[derive(Default)]
struct Heap {
    next_ref: u64,
    next_object: u64,
    refs: HashMap<u64, u64>,
    objects: HashMap<u64, Object>,
}

impl Heap {
    fn insert(&mut self, object: Object) -> u64 {
        self.next_object += 1;
        self.objects.insert(self.next_object, object);
        self.next_object
    }

    fn reference(&mut self, id: u64) -> ForeignHandle {
        self.next_ref += 1;
        self.refs.insert(self.next_ref, id);
        ForeignHandle::from_raw(self.next_ref)
    }

    fn resolve(&self, handle: &ForeignHandle) -> ForeignResult<u64> {
        self.refs
            .get(&handle.raw())
            .copied()
            .ok_or_else(|| ForeignError::new(format!("stale reference: {}", handle)))
    }

    fn object(&self, id: u64) -> ForeignResult<&Object> {
        self.objects
            .get(&id)
            .ok_or_else(|| ForeignError::new(format!("no such object: {}", id)))
    }

    fn actor(&self, id: u64) -> ForeignResult<&ActorObject> {
        match self.object(id)? {
            Object::Actor(actor) => Ok(actor),
            other => Err(not_an_actor(&other.classname())),
        }
    }

    fn actor_mut(&mut self, id: u64) -> ForeignResult<&mut ActorObject> {
        match self.objects.get_mut(&id) {
            Some(Object::Actor(actor)) => Ok(actor),
            Some(other) => Err(not_an_actor(&other.classname())),
            None => Err(ForeignError::new(format!("no such object: {}", id))),
        }
    }

    fn root_of(&self, mut id: u64) -> u64 {
        while let Some(Object::Actor(ActorObject {
            parent: Some(parent),
            ..
        })) = self.objects.get(&id)
        {
            id = *parent;
        }
        id
    }

    fn subtree(&self, id: u64) -> Vec<u64> {
        let mut ids = vec![id];
        let mut i = 0;
        while i < ids.len() {
            if let Some(Object::Actor(actor)) = self.objects.get(&ids[i]) {
                ids.extend(actor.children.iter().copied());
            }
            i += 1;
        }
        ids
    }

    /// Drop the tree rooted at `root` once nothing references any part of it.
    fn collect(&mut self, root: u64) {
        let subtree = self.subtree(root);
        let referenced: HashSet<u64> = self.refs.values().copied().collect();
        if subtree.iter().any(|id| referenced.contains(id)) {
            return;
        }
        for id in subtree {
            self.objects.remove(&id);
        }
    }
}

fn not_an_actor(classname: &str) -> ForeignError {
    ForeignError::new(format!(
        "ClassCastException: {} cannot be cast to {}",
        classname,
        names::ACTOR
    ))
}

#[derive(Debug, Serialize, Deserialize)]
struct FlowDocument {
    class: String,
    #[serde(default)]
    options: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    actors: Vec<FlowDocument>,
}

/// A foreign runtime living entirely in the host process.
pub struct MemoryRuntime {
    catalog: Catalog,
    heap: Mutex<Heap>,
    shut_down: AtomicBool,
}

impl MemoryRuntime {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            heap: Mutex::new(Heap::default()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Create an empty array with the given element type.
    pub fn new_array(&self, component: &str) -> ForeignResult<ForeignHandle> {
        let mut heap = self.heap()?;
        let id = heap.insert(Object::Array {
            component: component.to_string(),
        });
        Ok(heap.reference(id))
    }

    /// New references to the sub-actors of `actor`, in order.
    pub fn children(&self, actor: &ForeignHandle) -> ForeignResult<Vec<ForeignHandle>> {
        let mut heap = self.heap()?;
        let id = heap.resolve(actor)?;
        let children = heap.actor(id)?.children.clone();
        Ok(children.into_iter().map(|child| heap.reference(child)).collect())
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Number of live references.
    pub fn reference_count(&self) -> usize {
        self.lock().refs.len()
    }

    fn lock(&self) -> MutexGuard<'_, Heap> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn heap(&self) -> ForeignResult<MutexGuard<'_, Heap>> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ForeignError::new("memory runtime has been shut down"));
        }
        Ok(self.lock())
    }

    fn defaults(&self, class: &str) -> ForeignResult<&Configuration> {
        self.catalog
            .actor(class)
            .map(|def| &def.defaults)
            .ok_or_else(|| not_an_actor(class))
    }

    fn behavior(&self, class: &str) -> Option<&Arc<dyn ActorBehavior>> {
        self.catalog.actor(class).and_then(|def| def.behavior.as_ref())
    }

    /// Validate `incoming` against the class defaults and merge it in.
    fn apply_options(&self, heap: &mut Heap, id: u64, incoming: Configuration) -> ForeignResult<()> {
        let class = heap.actor(id)?.class.clone();
        let defaults = self.defaults(&class)?;
        for (name, value) in incoming.iter() {
            let default = defaults.get(name).ok_or_else(|| {
                ForeignError::new(format!("{}: unknown option '{}'", class, name))
            })?;
            if !config::same_kind(default, value) {
                return Err(ForeignError::new(format!(
                    "{}: option '{}' expects a value like {}, got {}",
                    class, name, default, value
                )));
            }
        }
        heap.actor_mut(id)?.options.merge(incoming);
        Ok(())
    }

    // The heap lock is never held while a behavior runs.
    fn set_up_tree(&self, id: u64) -> ForeignResult<Option<String>> {
        let (class, options, children) = {
            let heap = self.heap()?;
            let actor = heap.actor(id)?;
            if actor.cleaned_up {
                return Ok(Some(format!("{}: actor has been cleaned up", actor.name())));
            }
            (actor.class.clone(), actor.options.clone(), actor.children.clone())
        };
        if let Some(msg) = self.behavior(&class).and_then(|b| b.set_up(&options)) {
            return Ok(Some(msg));
        }
        for child in children {
            if let Some(msg) = self.set_up_tree(child)? {
                return Ok(Some(msg));
            }
        }
        let mut heap = self.heap()?;
        let actor = heap.actor_mut(id)?;
        actor.set_up = true;
        actor.executed = false;
        actor.finished = false;
        actor.stopped = false;
        actor.stop_message = None;
        Ok(None)
    }

    fn execute_tree(&self, id: u64) -> ForeignResult<Option<String>> {
        let (class, options, children, stopped) = {
            let heap = self.heap()?;
            let actor = heap.actor(id)?;
            if actor.cleaned_up {
                return Ok(Some(format!("{}: actor has been cleaned up", actor.name())));
            }
            if !actor.set_up {
                return Ok(Some(format!("{}: actor has not been set up", actor.name())));
            }
            (
                actor.class.clone(),
                actor.options.clone(),
                actor.children.clone(),
                actor.stopped,
            )
        };
        if !stopped {
            if let Some(msg) = self.behavior(&class).and_then(|b| b.execute(&options)) {
                self.heap()?.actor_mut(id)?.executed = true;
                return Ok(Some(msg));
            }
            for child in children {
                if self.heap()?.actor(id)?.stopped {
                    debug!(id, "execution stopped");
                    break;
                }
                if let Some(msg) = self.execute_tree(child)? {
                    self.heap()?.actor_mut(id)?.executed = true;
                    return Ok(Some(msg));
                }
            }
        }
        let mut heap = self.heap()?;
        let actor = heap.actor_mut(id)?;
        actor.executed = true;
        actor.finished = true;
        Ok(None)
    }

    fn for_tree(
        &self,
        heap: &mut Heap,
        id: u64,
        mut f: impl FnMut(&mut ActorObject),
    ) -> ForeignResult<()> {
        heap.actor(id)?;
        for node in heap.subtree(id) {
            f(heap.actor_mut(node)?);
        }
        Ok(())
    }

    fn build(
        &self,
        heap: &mut Heap,
        doc: FlowDocument,
        parent: Option<u64>,
        created: &mut Vec<u64>,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Option<u64> {
        let Some(def) = self.catalog.actor(&doc.class) else {
            errors.push(format!("Unknown actor class: {}", doc.class));
            return None;
        };

        let mut options = def.defaults.clone();
        for (name, value) in doc.options {
            match def.defaults.get(&name) {
                None => warnings.push(format!(
                    "{}: unknown option '{}' ignored",
                    doc.class, name
                )),
                Some(default) if !config::same_kind(default, &value) => {
                    errors.push(format!(
                        "{}: option '{}' has the wrong type: {}",
                        doc.class, name, value
                    ));
                    return None;
                }
                Some(_) => {
                    options.set(name, value);
                }
            }
        }

        let id = heap.insert(Object::Actor(ActorObject::new(
            doc.class.clone(),
            options,
            parent,
        )));
        created.push(id);

        if !doc.actors.is_empty() && !def.roles.contains(&ActorRole::ActorHandler) {
            warnings.push(format!(
                "{}: not an actor handler, {} sub-actor(s) ignored",
                doc.class,
                doc.actors.len()
            ));
            return Some(id);
        }
        for child in doc.actors {
            let child_id = self.build(heap, child, Some(id), created, errors, warnings)?;
            heap.actor_mut(id).ok()?.children.push(child_id);
        }
        Some(id)
    }

    fn document(&self, heap: &Heap, id: u64) -> ForeignResult<FlowDocument> {
        let actor = heap.actor(id)?;
        let actors = actor
            .children
            .iter()
            .map(|child| self.document(heap, *child))
            .collect::<ForeignResult<Vec<_>>>()?;
        Ok(FlowDocument {
            class: actor.class.clone(),
            options: actor.options.to_mapping(),
            actors,
        })
    }
}

impl ObjectRuntime for MemoryRuntime {
    fn classname(&self, obj: &ForeignHandle) -> ForeignResult<String> {
        let heap = self.heap()?;
        Ok(heap.object(heap.resolve(obj)?)?.classname())
    }

    fn is_array(&self, obj: &ForeignHandle) -> ForeignResult<bool> {
        let heap = self.heap()?;
        Ok(matches!(heap.object(heap.resolve(obj)?)?, Object::Array { .. }))
    }

    fn component_classname(&self, obj: &ForeignHandle) -> ForeignResult<Option<String>> {
        let heap = self.heap()?;
        match heap.object(heap.resolve(obj)?)? {
            Object::Array { component } => Ok(Some(component.clone())),
            _ => Ok(None),
        }
    }

    fn class_matches(&self, class_or_intf: &str, classname: &str) -> ForeignResult<bool> {
        Ok(class_or_intf == classname)
    }

    fn has_interface(&self, class_or_intf: &str, classname: &str) -> ForeignResult<bool> {
        Ok(self.catalog.is_subtype(classname, class_or_intf))
    }

    fn describe(&self, obj: &ForeignHandle) -> ForeignResult<String> {
        let heap = self.heap()?;
        let id = heap.resolve(obj)?;
        Ok(match heap.object(id)? {
            Object::Plain { class } => match self.catalog.get(class).and_then(|d| d.display.clone()) {
                Some(text) => text,
                None => format!("{}@{:x}", class, id),
            },
            Object::Array { component } => format!("[L{};@{:x}", component, id),
            Object::Actor(actor) => args::commandline(
                &actor.class,
                &args::encode(&actor.options, self.defaults(&actor.class)?),
            ),
        })
    }

    fn identity(&self, obj: &ForeignHandle) -> ForeignResult<u64> {
        self.heap()?.resolve(obj)
    }

    fn same_object(&self, a: &ForeignHandle, b: &ForeignHandle) -> ForeignResult<bool> {
        let heap = self.heap()?;
        Ok(heap.resolve(a)? == heap.resolve(b)?)
    }

    fn duplicate(&self, obj: &ForeignHandle) -> ForeignResult<ForeignHandle> {
        let mut heap = self.heap()?;
        let id = heap.resolve(obj)?;
        Ok(heap.reference(id))
    }

    fn release(&self, obj: &ForeignHandle) {
        let mut heap = self.lock();
        if let Some(id) = heap.refs.remove(&obj.raw()) {
            let root = heap.root_of(id);
            heap.collect(root);
        }
    }

    fn new_instance(&self, classname: &str, options: &[String]) -> ForeignResult<ForeignHandle> {
        let def = self
            .catalog
            .get(classname)
            .ok_or_else(|| ForeignError::new(format!("ClassNotFoundException: {}", classname)))?;
        if def.interface {
            return Err(ForeignError::new(format!(
                "InstantiationException: {} is an interface",
                classname
            )));
        }

        let mut heap = self.heap()?;
        let object = match &def.actor {
            Some(actor) => {
                let mut config = actor.defaults.clone();
                let parsed = args::decode(options, &actor.defaults)
                    .map_err(|e| ForeignError::new(format!("{}: {}", classname, e)))?;
                config.merge(parsed);
                Object::Actor(ActorObject::new(classname.to_string(), config, None))
            }
            None if options.is_empty() => Object::Plain {
                class: classname.to_string(),
            },
            None => {
                return Err(ForeignError::new(format!(
                    "{} does not accept options",
                    classname
                )))
            }
        };
        let id = heap.insert(object);
        debug!(classname, id, "instantiated");
        Ok(heap.reference(id))
    }
}

impl ActorRuntime for MemoryRuntime {
    fn set_up(&self, actor: &ForeignHandle) -> ForeignResult<Option<String>> {
        let id = self.heap()?.resolve(actor)?;
        self.set_up_tree(id)
    }

    fn execute(&self, actor: &ForeignHandle) -> ForeignResult<Option<String>> {
        let id = self.heap()?.resolve(actor)?;
        self.execute_tree(id)
    }

    fn wrap_up(&self, actor: &ForeignHandle) -> ForeignResult<()> {
        let mut heap = self.heap()?;
        let id = heap.resolve(actor)?;
        self.for_tree(&mut heap, id, |a| a.set_up = false)
    }

    fn clean_up(&self, actor: &ForeignHandle) -> ForeignResult<()> {
        let mut heap = self.heap()?;
        let id = heap.resolve(actor)?;
        self.for_tree(&mut heap, id, |a| {
            a.set_up = false;
            a.cleaned_up = true;
        })
    }

    fn stop_execution(&self, actor: &ForeignHandle, msg: Option<&str>) -> ForeignResult<()> {
        let mut heap = self.heap()?;
        let id = heap.resolve(actor)?;
        self.for_tree(&mut heap, id, |a| {
            a.stopped = true;
            a.stop_message = msg.map(str::to_string);
        })
    }

    fn is_finished(&self, actor: &ForeignHandle) -> ForeignResult<bool> {
        let heap = self.heap()?;
        Ok(heap.actor(heap.resolve(actor)?)?.finished)
    }

    fn is_executed(&self, actor: &ForeignHandle) -> ForeignResult<bool> {
        let heap = self.heap()?;
        Ok(heap.actor(heap.resolve(actor)?)?.executed)
    }

    fn is_stopped(&self, actor: &ForeignHandle) -> ForeignResult<bool> {
        let heap = self.heap()?;
        Ok(heap.actor(heap.resolve(actor)?)?.stopped)
    }

    fn is_headless(&self, actor: &ForeignHandle) -> ForeignResult<bool> {
        let heap = self.heap()?;
        let id = heap.resolve(actor)?;
        heap.actor(id)?;
        let root = heap.actor(heap.root_of(id))?;
        Ok(root
            .options
            .get("headless")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    fn set_headless(&self, actor: &ForeignHandle, headless: bool) -> ForeignResult<()> {
        let mut heap = self.heap()?;
        let id = heap.resolve(actor)?;
        let class = heap.actor(id)?.class.clone();
        if !self.defaults(&class)?.contains("headless") {
            return Err(ForeignError::new(format!(
                "NoSuchMethodException: {}.setHeadless(boolean)",
                class
            )));
        }
        heap.actor_mut(id)?.options.set("headless", headless);
        Ok(())
    }

    fn root(&self, actor: &ForeignHandle) -> ForeignResult<Option<ForeignHandle>> {
        let mut heap = self.heap()?;
        let id = heap.resolve(actor)?;
        heap.actor(id)?;
        let root = heap.root_of(id);
        if root == id {
            return Ok(None);
        }
        Ok(Some(heap.reference(root)))
    }

    fn parent(&self, actor: &ForeignHandle) -> ForeignResult<Option<ForeignHandle>> {
        let mut heap = self.heap()?;
        let id = heap.resolve(actor)?;
        match heap.actor(id)?.parent {
            Some(parent) => Ok(Some(heap.reference(parent))),
            None => Ok(None),
        }
    }

    fn to_commandline(&self, actor: &ForeignHandle) -> ForeignResult<String> {
        let heap = self.heap()?;
        let actor = heap.actor(heap.resolve(actor)?)?;
        Ok(args::commandline(
            &actor.class,
            &args::encode(&actor.options, self.defaults(&actor.class)?),
        ))
    }
}

impl OptionRuntime for MemoryRuntime {
    fn consume_json(&self, obj: &ForeignHandle, json: &str) -> ForeignResult<()> {
        let incoming = text::decode(json).map_err(|e| ForeignError::new(e.to_string()))?;
        let mut heap = self.heap()?;
        let id = heap.resolve(obj)?;
        self.apply_options(&mut heap, id, incoming)
    }

    fn produce_json(&self, obj: &ForeignHandle) -> ForeignResult<String> {
        let heap = self.heap()?;
        Ok(text::encode(&heap.actor(heap.resolve(obj)?)?.options))
    }

    fn consume_args(&self, obj: &ForeignHandle, options: &[String]) -> ForeignResult<()> {
        let mut heap = self.heap()?;
        let id = heap.resolve(obj)?;
        let class = heap.actor(id)?.class.clone();
        let incoming = args::decode(options, self.defaults(&class)?)
            .map_err(|e| ForeignError::new(format!("{}: {}", class, e)))?;
        self.apply_options(&mut heap, id, incoming)
    }

    fn produce_args(&self, obj: &ForeignHandle) -> ForeignResult<Vec<String>> {
        let heap = self.heap()?;
        let actor = heap.actor(heap.resolve(obj)?)?;
        Ok(args::encode(&actor.options, self.defaults(&actor.class)?))
    }
}

impl FlowRuntime for MemoryRuntime {
    fn read_flow(
        &self,
        path: &Path,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> ForeignResult<Option<ForeignHandle>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                errors.push(format!("Failed to read flow file {}: {}", path.display(), e));
                return Ok(None);
            }
        };
        let doc: FlowDocument = match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                errors.push(format!("Failed to parse flow file {}: {}", path.display(), e));
                return Ok(None);
            }
        };

        let mut heap = self.heap()?;
        let mut created = Vec::new();
        match self.build(&mut heap, doc, None, &mut created, errors, warnings) {
            Some(id) => Ok(Some(heap.reference(id))),
            None => {
                for id in created {
                    heap.objects.remove(&id);
                }
                Ok(None)
            }
        }
    }

    fn write_flow(&self, path: &Path, actor: &ForeignHandle) -> ForeignResult<bool> {
        let doc = {
            let heap = self.heap()?;
            let id = heap.resolve(actor)?;
            self.document(&heap, id)?
        };
        let json = serde_json::to_string_pretty(&doc).map_err(|e| ForeignError::new(e.to_string()))?;
        match std::fs::write(path, json) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to write flow");
                Ok(false)
            }
        }
    }

    fn classify(&self, actor: &ForeignHandle, role: ActorRole) -> ForeignResult<bool> {
        let heap = self.heap()?;
        let class = &heap.actor(heap.resolve(actor)?)?.class;
        Ok(self
            .catalog
            .actor(class)
            .is_some_and(|def| def.roles.contains(&role)))
    }
}

impl ForeignRuntime for MemoryRuntime {
    fn name(&self) -> &str {
        "memory"
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let mut heap = self.lock();
        heap.refs.clear();
        heap.objects.clear();
    }
}

/// Launches [`MemoryRuntime`]s and records what it was asked to do.
pub struct MemoryLauncher {
    catalog: Catalog,
    failure: Option<String>,
    launches: AtomicUsize,
    last: Mutex<Option<(LaunchConfig, Arc<MemoryRuntime>)>>,
}

impl MemoryLauncher {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            failure: None,
            launches: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// A launcher whose runtimes know [`Catalog::standard`].
    pub fn standard() -> Self {
        Self::new(Catalog::standard())
    }

    /// A launcher that always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(Catalog::new())
        }
    }

    /// How many times a runtime has been launched.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// The configuration of the most recent launch.
    pub fn last_config(&self) -> Option<LaunchConfig> {
        self.last_launch().map(|(config, _)| config)
    }

    /// The runtime of the most recent launch.
    pub fn runtime(&self) -> Option<Arc<MemoryRuntime>> {
        self.last_launch().map(|(_, runtime)| runtime)
    }

    fn last_launch(&self) -> Option<(LaunchConfig, Arc<MemoryRuntime>)> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MemoryLauncher {
    fn default() -> Self {
        Self::standard()
    }
}

impl Launcher for MemoryLauncher {
    fn launch(&self, config: &LaunchConfig) -> ForeignResult<Arc<dyn ForeignRuntime>> {
        if let Some(message) = &self.failure {
            return Err(ForeignError::new(message.clone()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        let runtime = Arc::new(MemoryRuntime::new(self.catalog.clone()));
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((config.clone(), runtime.clone()));
        Ok(runtime)
    }
}
