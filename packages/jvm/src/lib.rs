//! # ADAMS Bridge: JVM runtime
//!
//! Runs the ADAMS flow runtime inside a JVM created over JNI and exposes it
//! to `adams-bridge` through the runtime traits.
//!
//! [`JvmLauncher`] creates the JVM from the bridge's `LaunchConfig`: the
//! resource paths become `-Djava.class.path`, the launch options (`-Xmx`,
//! headless mode) are passed through unchanged. The resulting
//! [`JvmRuntime`] forwards every bridge call to the ADAMS classes
//! (`ActorUtils`, `OptionUtils`, the JSON and array option consumers,
//! `ClassLocator`).
//!
//! Only one JVM can exist per process, and none after it was destroyed, so
//! the launcher refuses a second launch.
//!
//! ```ignore
//! use std::sync::Arc;
//! use adams_bridge::{ExecutionHost, StartOptions};
//! use adams_bridge_jvm::JvmLauncher;
//!
//! let host = ExecutionHost::new(Arc::new(JvmLauncher::new()));
//! host.start(&StartOptions::new("/opt/adams").max_heap("4g").headless(true))?;
//! let session = host.session()?;
//! let flow = adams_bridge::flow::read(&session, "/opt/flows/hello.flow", None, None)?;
//! ```

mod classpath;
mod error;
mod launcher;
mod runtime;

pub use classpath::{expand_classpath, jni_class, join_classpath, jvm_options};
pub use error::{JvmError, Result};
pub use launcher::{is_launched, JvmLauncher};
pub use runtime::JvmRuntime;
