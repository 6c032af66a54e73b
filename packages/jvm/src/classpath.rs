//! JVM launch arguments and JNI naming.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use adams_bridge::LaunchConfig;
use tracing::{debug, warn};

use crate::error::{JvmError, Result};

/// Expand every `dir/*` entry into the `.jar` files of `dir`, sorted by
/// name. Other entries are kept as they are.
///
/// The `java` launcher expands such wildcards itself; the invocation API
/// does not. A directory that cannot be listed contributes nothing.
pub fn expand_classpath(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut expanded = Vec::with_capacity(paths.len());
    for path in paths {
        if path.file_name() != Some(OsStr::new("*")) {
            expanded.push(path.clone());
            continue;
        }
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut jars: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|jar| jar.is_file() && is_jar(jar))
                .collect(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot list classpath directory");
                Vec::new()
            }
        };
        jars.sort();
        debug!(dir = %dir.display(), jars = jars.len(), "Expanded classpath wildcard");
        expanded.extend(jars);
    }
    expanded
}

fn is_jar(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
}

/// Join resource paths into a `-Djava.class.path` value using the platform
/// separator.
pub fn join_classpath(paths: &[PathBuf]) -> Result<String> {
    let joined = std::env::join_paths(paths).map_err(|e| JvmError::Classpath(e.to_string()))?;
    joined
        .into_string()
        .map_err(|s| JvmError::Classpath(format!("not valid UTF-8: {:?}", s)))
}

/// All JVM options for `config`: the classpath first, with wildcards
/// expanded, then the launch options in order.
pub fn jvm_options(config: &LaunchConfig) -> Result<Vec<String>> {
    let mut options = Vec::with_capacity(config.options.len() + 1);
    let classpath = expand_classpath(&config.resource_paths);
    if !classpath.is_empty() {
        options.push(format!("-Djava.class.path={}", join_classpath(&classpath)?));
    }
    options.extend(config.options.iter().cloned());
    Ok(options)
}

/// Binary class name as JNI expects it: `adams.flow.core.Actor` becomes
/// `adams/flow/core/Actor`.
pub fn jni_class(classname: &str) -> String {
    classname.replace('.', "/")
}

/// Classes and method signatures the runtime calls.
pub(crate) mod sig {
    pub const ACTOR_UTILS: &str = "adams/flow/core/ActorUtils";
    pub const CLASS_LOCATOR: &str = "nz/ac/waikato/cms/locator/ClassLocator";
    pub const OPTION_UTILS: &str = "adams/core/option/OptionUtils";
    pub const JSON_CONSUMER: &str = "adams/core/option/JsonConsumer";
    pub const JSON_PRODUCER: &str = "adams/core/option/JsonProducer";
    pub const ARRAY_CONSUMER: &str = "adams/core/option/ArrayConsumer";
    pub const JSON_PARSER: &str = "net/minidev/json/parser/JSONParser";
    pub const MESSAGE_COLLECTION: &str = "adams/core/MessageCollection";
    pub const SYSTEM: &str = "java/lang/System";
    pub const STRING: &str = "java/lang/String";
    pub const OBJECT: &str = "java/lang/Object";

    pub const TO_STRING: &str = "()Ljava/lang/String;";
    pub const GET_CLASS: &str = "()Ljava/lang/Class;";
    pub const IDENTITY_HASH: &str = "(Ljava/lang/Object;)I";
    pub const STRING_STRING_Z: &str = "(Ljava/lang/String;Ljava/lang/String;)Z";
    pub const FOR_NAME: &str =
        "(Ljava/lang/Class;Ljava/lang/String;[Ljava/lang/String;)Ljava/lang/Object;";
    pub const GET_OPTIONS: &str = "(Ladams/core/option/OptionHandler;)[Ljava/lang/String;";
    pub const CONSUME: &str =
        "(Ladams/core/option/OptionHandler;Ljava/lang/Object;)Ladams/core/option/OptionHandler;";
    pub const PRODUCE: &str = "(Ladams/core/option/OptionHandler;)Ljava/lang/Object;";
    pub const PARSE: &str = "(Ljava/lang/String;)Ljava/lang/Object;";
    pub const READ_FLOW: &str = "(Ljava/lang/String;Ladams/core/MessageCollection;Ladams/core/MessageCollection;)Ladams/flow/core/Actor;";
    pub const WRITE_FLOW: &str = "(Ljava/lang/String;Ladams/flow/core/Actor;)Z";
    pub const ACTOR_Z: &str = "(Ladams/flow/core/Actor;)Z";
    pub const TO_LIST: &str = "()Ljava/util/List;";
    pub const LIST_GET: &str = "(I)Ljava/lang/Object;";
    pub const SIZE: &str = "()I";
    pub const NO_ARGS_V: &str = "()V";
    pub const INT_CTOR: &str = "(I)V";
    pub const NO_ARGS_Z: &str = "()Z";
    pub const STRING_V: &str = "(Ljava/lang/String;)V";
    pub const BOOL_V: &str = "(Z)V";
    pub const GET_ACTOR: &str = "()Ladams/flow/core/Actor;";
}
