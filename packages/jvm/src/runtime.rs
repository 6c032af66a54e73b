//! The ADAMS runtime inside a JVM, reached over JNI.
//!
//! Every foreign object handed to the bridge is pinned with a JNI global
//! reference and stored in a reference table under a numeric key; the key
//! is what travels in a [`ForeignHandle`]. Each call attaches the current
//! thread, runs inside a fresh local frame and turns a pending Java
//! exception into [`JvmError::Java`] with the exception's `toString()`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use adams_bridge::runtime::{ActorRuntime, FlowRuntime, ForeignResult, ObjectRuntime, OptionRuntime};
use adams_bridge::{ActorRole, ForeignHandle, ForeignRuntime};
use jni::objects::{GlobalRef, JObject, JObjectArray, JString, JValue};
use jni::{JNIEnv, JavaVM};
use tracing::{debug, warn};

use crate::classpath::sig;
use crate::error::{JvmError, Result};

const LOCAL_FRAME_CAPACITY: i32 = 32;

/// A running JVM with the ADAMS classes on its classpath.
pub struct JvmRuntime {
    vm: JavaVM,
    refs: Mutex<HashMap<u64, GlobalRef>>,
    next_ref: AtomicU64,
    stopped: AtomicBool,
}

impl JvmRuntime {
    pub(crate) fn new(vm: JavaVM) -> Self {
        Self {
            vm,
            refs: Mutex::new(HashMap::new()),
            next_ref: AtomicU64::new(1),
            stopped: AtomicBool::new(false),
        }
    }

    /// Number of live entries in the reference table.
    pub fn reference_count(&self) -> usize {
        self.refs().len()
    }

    fn refs(&self) -> MutexGuard<'_, HashMap<u64, GlobalRef>> {
        self.refs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn global(&self, handle: &ForeignHandle) -> Result<GlobalRef> {
        self.refs()
            .get(&handle.raw())
            .cloned()
            .ok_or(JvmError::StaleReference(handle.raw()))
    }

    fn insert(&self, global: GlobalRef) -> ForeignHandle {
        let key = self.next_ref.fetch_add(1, Ordering::SeqCst);
        self.refs().insert(key, global);
        ForeignHandle::from_raw(key)
    }

    fn register(&self, env: &JNIEnv<'_>, obj: &JObject<'_>) -> Result<ForeignHandle> {
        Ok(self.insert(env.new_global_ref(obj)?))
    }

    fn register_nullable(&self, env: &JNIEnv<'_>, obj: &JObject<'_>) -> Result<Option<ForeignHandle>> {
        if obj.is_null() {
            return Ok(None);
        }
        self.register(env, obj).map(Some)
    }

    /// Run `f` on an attached thread inside a local frame.
    fn call<T>(&self, f: impl FnOnce(&mut JNIEnv<'_>) -> Result<T>) -> ForeignResult<T> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(JvmError::Stopped.into());
        }
        let mut env = self
            .vm
            .attach_current_thread_permanently()
            .map_err(JvmError::from)?;
        let result = env.with_local_frame(LOCAL_FRAME_CAPACITY, f);
        result.map_err(|e| {
            let error = match e {
                JvmError::Jni(jni::errors::Error::JavaException) => JvmError::Java(
                    take_exception(&mut env).unwrap_or_else(|| "unknown Java exception".to_string()),
                ),
                other => other,
            };
            error.into()
        })
    }

    fn call_string(&self, actor: &ForeignHandle, method: &str) -> ForeignResult<Option<String>> {
        self.call(|env| {
            let obj = self.global(actor)?;
            let value = env.call_method(obj.as_obj(), method, sig::TO_STRING, &[])?.l()?;
            java_string(env, value)
        })
    }

    fn call_void(&self, actor: &ForeignHandle, method: &str) -> ForeignResult<()> {
        self.call(|env| {
            let obj = self.global(actor)?;
            env.call_method(obj.as_obj(), method, sig::NO_ARGS_V, &[])?;
            Ok(())
        })
    }

    fn call_bool(&self, actor: &ForeignHandle, method: &str) -> ForeignResult<bool> {
        self.call(|env| {
            let obj = self.global(actor)?;
            Ok(env.call_method(obj.as_obj(), method, sig::NO_ARGS_Z, &[])?.z()?)
        })
    }

    fn call_actor(&self, actor: &ForeignHandle, method: &str) -> ForeignResult<Option<ForeignHandle>> {
        self.call(|env| {
            let obj = self.global(actor)?;
            let related = env.call_method(obj.as_obj(), method, sig::GET_ACTOR, &[])?.l()?;
            if !related.is_null() && env.is_same_object(&related, obj.as_obj())? {
                return Ok(None);
            }
            self.register_nullable(env, &related)
        })
    }

    fn locator(&self, method: &str, class_or_intf: &str, classname: &str) -> ForeignResult<bool> {
        self.call(|env| {
            let a = new_string(env, class_or_intf)?;
            let b = new_string(env, classname)?;
            Ok(env
                .call_static_method(
                    sig::CLASS_LOCATOR,
                    method,
                    sig::STRING_STRING_Z,
                    &[JValue::Object(&a), JValue::Object(&b)],
                )?
                .z()?)
        })
    }

    fn consume(
        &self,
        env: &mut JNIEnv<'_>,
        obj: &ForeignHandle,
        consumer_class: &str,
        input: &JObject<'_>,
    ) -> Result<()> {
        let handler = self.global(obj)?;
        let consumer = env.new_object(consumer_class, sig::NO_ARGS_V, &[])?;
        env.call_method(
            &consumer,
            "consume",
            sig::CONSUME,
            &[JValue::Object(handler.as_obj()), JValue::Object(input)],
        )?;
        Ok(())
    }

    fn actor_utils_test(&self, actor: &ForeignHandle, method: &str) -> ForeignResult<bool> {
        self.call(|env| {
            let obj = self.global(actor)?;
            Ok(env
                .call_static_method(sig::ACTOR_UTILS, method, sig::ACTOR_Z, &[JValue::Object(obj.as_obj())])?
                .z()?)
        })
    }
}

/// The `ActorUtils` predicate answering `role`.
fn role_predicate(role: ActorRole) -> &'static str {
    match role {
        ActorRole::Standalone => "isStandalone",
        ActorRole::Source => "isSource",
        ActorRole::Transformer => "isTransformer",
        ActorRole::Sink => "isSink",
        ActorRole::ActorHandler => "isActorHandler",
        ActorRole::Control => "isControlActor",
        ActorRole::Interactive => "isInteractive",
    }
}

/// Flow file paths cross JNI as Java strings, so they must be UTF-8.
fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| JvmError::InvalidPath(path.to_path_buf()))
}

fn new_string<'local>(env: &mut JNIEnv<'local>, value: &str) -> Result<JObject<'local>> {
    Ok(JObject::from(env.new_string(value)?))
}

fn java_string(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> Result<Option<String>> {
    if obj.is_null() {
        return Ok(None);
    }
    let text = JString::from(obj);
    let value: String = env.get_string(&text)?.into();
    Ok(Some(value))
}

fn string_array<'local>(env: &mut JNIEnv<'local>, items: &[String]) -> Result<JObjectArray<'local>> {
    let array = env.new_object_array(items.len() as i32, sig::STRING, JObject::null())?;
    for (i, item) in items.iter().enumerate() {
        let value = new_string(env, item)?;
        env.set_object_array_element(&array, i as i32, value)?;
    }
    Ok(array)
}

fn read_string_array(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> Result<Vec<String>> {
    if obj.is_null() {
        return Ok(Vec::new());
    }
    let array = JObjectArray::from(obj);
    let len = env.get_array_length(&array)?;
    let mut items = Vec::with_capacity(len.max(0) as usize);
    for i in 0..len {
        let item = env.get_object_array_element(&array, i)?;
        items.push(java_string(env, item)?.unwrap_or_default());
    }
    Ok(items)
}

/// The messages of an `adams.core.MessageCollection`.
fn read_messages(env: &mut JNIEnv<'_>, collection: &JObject<'_>) -> Result<Vec<String>> {
    let list = env.call_method(collection, "toList", sig::TO_LIST, &[])?.l()?;
    let size = env.call_method(&list, "size", sig::SIZE, &[])?.i()?;
    let mut messages = Vec::with_capacity(size.max(0) as usize);
    for i in 0..size {
        let item = env.call_method(&list, "get", sig::LIST_GET, &[JValue::Int(i)])?.l()?;
        messages.push(java_string(env, item)?.unwrap_or_default());
    }
    Ok(messages)
}

fn class_of<'local>(env: &mut JNIEnv<'local>, obj: &JObject<'_>) -> Result<JObject<'local>> {
    Ok(env.call_method(obj, "getClass", sig::GET_CLASS, &[])?.l()?)
}

fn class_name(env: &mut JNIEnv<'_>, class: &JObject<'_>) -> Result<String> {
    let name = env.call_method(class, "getName", sig::TO_STRING, &[])?.l()?;
    java_string(env, name)?.ok_or(JvmError::NullResult("Class.getName"))
}

/// Clear the pending exception and describe it.
fn take_exception(env: &mut JNIEnv<'_>) -> Option<String> {
    if !env.exception_check().unwrap_or(false) {
        return None;
    }
    let throwable = JObject::from(env.exception_occurred().ok()?);
    env.exception_clear().ok()?;
    let text = env
        .call_method(&throwable, "toString", sig::TO_STRING, &[])
        .and_then(|value| value.l())
        .ok()?;
    java_string(env, text).ok().flatten()
}

impl ObjectRuntime for JvmRuntime {
    fn classname(&self, obj: &ForeignHandle) -> ForeignResult<String> {
        self.call(|env| {
            let obj = self.global(obj)?;
            let class = class_of(env, obj.as_obj())?;
            class_name(env, &class)
        })
    }

    fn is_array(&self, obj: &ForeignHandle) -> ForeignResult<bool> {
        self.call(|env| {
            let obj = self.global(obj)?;
            let class = class_of(env, obj.as_obj())?;
            Ok(env.call_method(&class, "isArray", sig::NO_ARGS_Z, &[])?.z()?)
        })
    }

    fn component_classname(&self, obj: &ForeignHandle) -> ForeignResult<Option<String>> {
        self.call(|env| {
            let obj = self.global(obj)?;
            let class = class_of(env, obj.as_obj())?;
            let component = env
                .call_method(&class, "getComponentType", sig::GET_CLASS, &[])?
                .l()?;
            if component.is_null() {
                return Ok(None);
            }
            class_name(env, &component).map(Some)
        })
    }

    fn class_matches(&self, class_or_intf: &str, classname: &str) -> ForeignResult<bool> {
        self.locator("matches", class_or_intf, classname)
    }

    fn has_interface(&self, class_or_intf: &str, classname: &str) -> ForeignResult<bool> {
        self.locator("hasInterface", class_or_intf, classname)
    }

    fn describe(&self, obj: &ForeignHandle) -> ForeignResult<String> {
        Ok(self
            .call_string(obj, "toString")?
            .unwrap_or_else(|| "null".to_string()))
    }

    fn identity(&self, obj: &ForeignHandle) -> ForeignResult<u64> {
        self.call(|env| {
            let obj = self.global(obj)?;
            let hash = env
                .call_static_method(
                    sig::SYSTEM,
                    "identityHashCode",
                    sig::IDENTITY_HASH,
                    &[JValue::Object(obj.as_obj())],
                )?
                .i()?;
            Ok(u64::from(hash as u32))
        })
    }

    fn same_object(&self, a: &ForeignHandle, b: &ForeignHandle) -> ForeignResult<bool> {
        self.call(|env| {
            let a = self.global(a)?;
            let b = self.global(b)?;
            Ok(env.is_same_object(a.as_obj(), b.as_obj())?)
        })
    }

    fn duplicate(&self, obj: &ForeignHandle) -> ForeignResult<ForeignHandle> {
        self.call(|_| {
            let global = self.global(obj)?;
            Ok(self.insert(global))
        })
    }

    fn release(&self, obj: &ForeignHandle) {
        self.refs().remove(&obj.raw());
    }

    fn new_instance(&self, classname: &str, options: &[String]) -> ForeignResult<ForeignHandle> {
        self.call(|env| {
            let base = env.find_class(sig::OBJECT)?;
            let name = new_string(env, classname)?;
            let options = string_array(env, options)?;
            let obj = env
                .call_static_method(
                    sig::OPTION_UTILS,
                    "forName",
                    sig::FOR_NAME,
                    &[
                        JValue::Object(&base),
                        JValue::Object(&name),
                        JValue::Object(&options),
                    ],
                )?
                .l()?;
            if obj.is_null() {
                return Err(JvmError::NullResult("OptionUtils.forName"));
            }
            self.register(env, &obj)
        })
    }
}

impl ActorRuntime for JvmRuntime {
    fn set_up(&self, actor: &ForeignHandle) -> ForeignResult<Option<String>> {
        self.call_string(actor, "setUp")
    }

    fn execute(&self, actor: &ForeignHandle) -> ForeignResult<Option<String>> {
        self.call_string(actor, "execute")
    }

    fn wrap_up(&self, actor: &ForeignHandle) -> ForeignResult<()> {
        self.call_void(actor, "wrapUp")
    }

    fn clean_up(&self, actor: &ForeignHandle) -> ForeignResult<()> {
        self.call_void(actor, "cleanUp")
    }

    fn stop_execution(&self, actor: &ForeignHandle, msg: Option<&str>) -> ForeignResult<()> {
        match msg {
            None => self.call_void(actor, "stopExecution"),
            Some(msg) => self.call(|env| {
                let obj = self.global(actor)?;
                let msg = new_string(env, msg)?;
                env.call_method(obj.as_obj(), "stopExecution", sig::STRING_V, &[JValue::Object(&msg)])?;
                Ok(())
            }),
        }
    }

    fn is_finished(&self, actor: &ForeignHandle) -> ForeignResult<bool> {
        self.call_bool(actor, "isFinished")
    }

    fn is_executed(&self, actor: &ForeignHandle) -> ForeignResult<bool> {
        self.call_bool(actor, "isExecuted")
    }

    fn is_stopped(&self, actor: &ForeignHandle) -> ForeignResult<bool> {
        self.call_bool(actor, "isStopped")
    }

    fn is_headless(&self, actor: &ForeignHandle) -> ForeignResult<bool> {
        self.call_bool(actor, "isHeadless")
    }

    fn set_headless(&self, actor: &ForeignHandle, headless: bool) -> ForeignResult<()> {
        self.call(|env| {
            let obj = self.global(actor)?;
            env.call_method(
                obj.as_obj(),
                "setHeadless",
                sig::BOOL_V,
                &[JValue::Bool(u8::from(headless))],
            )?;
            Ok(())
        })
    }

    fn root(&self, actor: &ForeignHandle) -> ForeignResult<Option<ForeignHandle>> {
        self.call_actor(actor, "getRoot")
    }

    fn parent(&self, actor: &ForeignHandle) -> ForeignResult<Option<ForeignHandle>> {
        self.call_actor(actor, "getParent")
    }

    fn to_commandline(&self, actor: &ForeignHandle) -> ForeignResult<String> {
        Ok(self
            .call_string(actor, "toCommandLine")?
            .unwrap_or_default())
    }
}

impl OptionRuntime for JvmRuntime {
    fn consume_json(&self, obj: &ForeignHandle, json: &str) -> ForeignResult<()> {
        self.call(|env| {
            let mode = env
                .get_static_field(sig::JSON_PARSER, "MODE_JSON_SIMPLE", "I")?
                .i()?;
            let parser = env.new_object(sig::JSON_PARSER, sig::INT_CTOR, &[JValue::Int(mode)])?;
            let text = new_string(env, json)?;
            let parsed = env
                .call_method(&parser, "parse", sig::PARSE, &[JValue::Object(&text)])?
                .l()?;
            self.consume(env, obj, sig::JSON_CONSUMER, &parsed)
        })
    }

    fn produce_json(&self, obj: &ForeignHandle) -> ForeignResult<String> {
        self.call(|env| {
            let handler = self.global(obj)?;
            let producer = env.new_object(sig::JSON_PRODUCER, sig::NO_ARGS_V, &[])?;
            let produced = env
                .call_method(&producer, "produce", sig::PRODUCE, &[JValue::Object(handler.as_obj())])?
                .l()?;
            if produced.is_null() {
                return Err(JvmError::NullResult("JsonProducer.produce"));
            }
            let text = env.call_method(&produced, "toString", sig::TO_STRING, &[])?.l()?;
            java_string(env, text)?.ok_or(JvmError::NullResult("JSONObject.toString"))
        })
    }

    fn consume_args(&self, obj: &ForeignHandle, options: &[String]) -> ForeignResult<()> {
        self.call(|env| {
            let array = JObject::from(string_array(env, options)?);
            self.consume(env, obj, sig::ARRAY_CONSUMER, &array)
        })
    }

    fn produce_args(&self, obj: &ForeignHandle) -> ForeignResult<Vec<String>> {
        self.call(|env| {
            let handler = self.global(obj)?;
            let options = env
                .call_static_method(
                    sig::OPTION_UTILS,
                    "getOptions",
                    sig::GET_OPTIONS,
                    &[JValue::Object(handler.as_obj())],
                )?
                .l()?;
            read_string_array(env, options)
        })
    }
}

impl FlowRuntime for JvmRuntime {
    fn read_flow(
        &self,
        path: &Path,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> ForeignResult<Option<ForeignHandle>> {
        self.call(|env| {
            let file = new_string(env, path_arg(path)?)?;
            let read_errors = env.new_object(sig::MESSAGE_COLLECTION, sig::NO_ARGS_V, &[])?;
            let read_warnings = env.new_object(sig::MESSAGE_COLLECTION, sig::NO_ARGS_V, &[])?;
            let actor = env
                .call_static_method(
                    sig::ACTOR_UTILS,
                    "read",
                    sig::READ_FLOW,
                    &[
                        JValue::Object(&file),
                        JValue::Object(&read_errors),
                        JValue::Object(&read_warnings),
                    ],
                )?
                .l()?;
            errors.extend(read_messages(env, &read_errors)?);
            warnings.extend(read_messages(env, &read_warnings)?);
            self.register_nullable(env, &actor)
        })
    }

    fn write_flow(&self, path: &Path, actor: &ForeignHandle) -> ForeignResult<bool> {
        self.call(|env| {
            let obj = self.global(actor)?;
            let file = new_string(env, path_arg(path)?)?;
            Ok(env
                .call_static_method(
                    sig::ACTOR_UTILS,
                    "write",
                    sig::WRITE_FLOW,
                    &[JValue::Object(&file), JValue::Object(obj.as_obj())],
                )?
                .z()?)
        })
    }

    fn classify(&self, actor: &ForeignHandle, role: ActorRole) -> ForeignResult<bool> {
        self.actor_utils_test(actor, role_predicate(role))
    }
}

impl ForeignRuntime for JvmRuntime {
    fn name(&self) -> &str {
        "jvm"
    }

    fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = {
            let mut refs = self.refs();
            let count = refs.len();
            refs.clear();
            count
        };
        debug!(released, "Destroying JVM");
        // SAFETY: the stopped flag keeps every later call away from the VM
        // and the reference table holds no global references any more.
        if let Err(e) = unsafe { self.vm.destroy() } {
            warn!(error = %e, "Failed to destroy JVM");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_role_has_its_own_predicate() {
        let predicates: HashSet<&str> = ActorRole::ALL.iter().map(|r| role_predicate(*r)).collect();
        assert_eq!(predicates.len(), ActorRole::ALL.len());
        assert_eq!(role_predicate(ActorRole::ActorHandler), "isActorHandler");
        assert_eq!(role_predicate(ActorRole::Control), "isControlActor");
        assert_eq!(role_predicate(ActorRole::Interactive), "isInteractive");
    }

    #[test]
    fn utf8_path_is_passed_through() {
        assert_eq!(path_arg(Path::new("/flows/main.flow")).unwrap(), "/flows/main.flow");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_path_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/flows/\xffmain.flow"));
        let err = path_arg(path).unwrap_err();
        assert!(matches!(err, JvmError::InvalidPath(ref p) if p == path));
    }
}
