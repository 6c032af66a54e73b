//! Launching the JVM.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use adams_bridge::runtime::ForeignResult;
use adams_bridge::{ForeignRuntime, LaunchConfig, Launcher};
use jni::{InitArgsBuilder, JNIVersion, JavaVM};
use tracing::debug;

use crate::classpath::jvm_options;
use crate::error::{JvmError, Result};
use crate::runtime::JvmRuntime;

/// JNI allows a single VM per process, and none after it was destroyed.
static LAUNCHED: AtomicBool = AtomicBool::new(false);

/// Whether a JVM has been launched in this process.
pub fn is_launched() -> bool {
    LAUNCHED.load(Ordering::SeqCst)
}

/// Run `launch` as the single VM launch of this process. The claim is
/// given back when `launch` fails, so a later attempt can still succeed.
fn claim_launch<T>(launch: impl FnOnce() -> Result<T>) -> Result<T> {
    if LAUNCHED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(JvmError::AlreadyLaunched);
    }
    match launch() {
        Ok(launched) => Ok(launched),
        Err(e) => {
            LAUNCHED.store(false, Ordering::SeqCst);
            Err(e)
        }
    }
}

/// Launches the JVM that hosts the ADAMS runtime.
#[derive(Debug, Clone, Copy)]
pub struct JvmLauncher {
    version: JNIVersion,
}

impl JvmLauncher {
    pub fn new() -> Self {
        Self {
            version: JNIVersion::V8,
        }
    }

    /// Request a specific JNI version.
    pub fn with_version(version: JNIVersion) -> Self {
        Self { version }
    }

    /// Create the VM for `config`.
    pub fn launch_vm(&self, config: &LaunchConfig) -> Result<JvmRuntime> {
        let options = jvm_options(config)?;
        debug!(?options, headless = config.headless, "Launching JVM");
        if !config.convert_text {
            debug!("Strings are always copied across JNI, ignoring convert_text=false");
        }

        let mut builder = InitArgsBuilder::new()
            .version(self.version)
            .ignore_unrecognized(false);
        for option in &options {
            builder = builder.option(option.as_str());
        }
        let args = builder.build()?;

        let vm = claim_launch(|| Ok(JavaVM::new(args)?))?;
        Ok(JvmRuntime::new(vm))
    }
}

impl Default for JvmLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for JvmLauncher {
    fn launch(&self, config: &LaunchConfig) -> ForeignResult<Arc<dyn ForeignRuntime>> {
        Ok(Arc::new(self.launch_vm(config)?))
    }
}
