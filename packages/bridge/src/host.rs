//! Execution host bootstrap.
//!
//! The [`ExecutionHost`] owns the one foreign execution host of the process.
//! `start` assembles the resource paths and launch options from
//! [`StartOptions`] and launches the host through a [`Launcher`]; `stop`
//! shuts it down. Both are idempotent: starting a running host and stopping
//! a stopped one log and return.
//!
//! A running host is represented by a [`Session`]. Every handle created
//! through the bridge holds the session it was created in and checks its
//! liveness on each call, so handles outliving `stop` fail with
//! [`BridgeError::HostStopped`] instead of reaching into a dead runtime.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn, Level};
use uuid::Uuid;

use crate::capability::names;
use crate::error::{BridgeError, Result};
use crate::platform::Platform;
use crate::runtime::{ForeignRuntime, LaunchConfig, Launcher};

/// Environment variable listing additional resource paths.
pub const ENV_RESOURCE_PATH: &str = "CLASSPATH";

/// Launch option switching the host to headless mode.
pub const HEADLESS_OPTION: &str = "-Djava.awt.headless=true";

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct SessionInner {
    id: SessionId,
    runtime: Arc<dyn ForeignRuntime>,
    headless: bool,
    alive: AtomicBool,
}

/// A running execution host, shared by every handle created in it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Wrap an already running runtime.
    pub fn new(runtime: Arc<dyn ForeignRuntime>, headless: bool) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: SessionId::new(),
                runtime,
                headless,
                alive: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Whether the host was started in headless mode.
    pub fn is_headless(&self) -> bool {
        self.inner.headless
    }

    /// Whether the host is still running.
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// The runtime, as long as the host is running.
    pub fn runtime(&self) -> Result<&dyn ForeignRuntime> {
        if self.is_alive() {
            Ok(self.inner.runtime.as_ref())
        } else {
            Err(BridgeError::HostStopped)
        }
    }

    fn invalidate(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.invalidate();
        self.inner.runtime.shutdown();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("runtime", &self.inner.runtime.name())
            .field("headless", &self.inner.headless)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Options for [`ExecutionHost::start`].
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// The ADAMS root directory, above `lib`.
    pub root_dir: PathBuf,
    /// Whether to append the entries of [`ENV_RESOURCE_PATH`].
    pub system_resources: bool,
    /// Maximum heap size, e.g. `512m` or `4g`.
    pub max_heap: Option<String>,
    /// Whether to run without interactive or GUI behavior.
    pub headless: bool,
    /// Whether foreign strings are converted automatically.
    pub convert_text: bool,
    /// Whether to log the foreign system info after launching.
    pub system_info: bool,
    /// Level for the bootstrap's own messages.
    pub log_level: LevelFilter,
}

impl StartOptions {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            system_resources: false,
            max_heap: None,
            headless: false,
            convert_text: true,
            system_info: false,
            log_level: LevelFilter::DEBUG,
        }
    }

    pub fn system_resources(mut self, enabled: bool) -> Self {
        self.system_resources = enabled;
        self
    }

    pub fn max_heap(mut self, size: impl Into<String>) -> Self {
        self.max_heap = Some(size.into());
        self
    }

    pub fn headless(mut self, enabled: bool) -> Self {
        self.headless = enabled;
        self
    }

    pub fn convert_text(mut self, enabled: bool) -> Self {
        self.convert_text = enabled;
        self
    }

    pub fn system_info(mut self, enabled: bool) -> Self {
        self.system_info = enabled;
        self
    }

    pub fn log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    fn logs(&self, level: Level) -> bool {
        level <= self.log_level
    }
}

/// Library resource paths under `root_dir`: `lib/*`, then the platform's
/// native sub-directory if the platform is known.
pub fn lib_paths(root_dir: &Path, platform: Platform) -> Result<Vec<PathBuf>> {
    if !root_dir.exists() {
        return Err(BridgeError::RootDirNotFound(root_dir.to_path_buf()));
    }
    let lib = root_dir.join("lib");
    let mut paths = vec![lib.join("*")];
    if let Some(subdir) = platform.lib_subdir() {
        paths.push(lib.join(subdir).join("*"));
    }
    Ok(paths)
}

/// Split the value of [`ENV_RESOURCE_PATH`] with the platform separator.
/// An unset variable contributes nothing.
pub fn system_resource_paths(value: Option<&OsStr>) -> Vec<PathBuf> {
    match value {
        Some(value) => std::env::split_paths(value).collect(),
        None => {
            warn!(
                "Cannot add system resource paths, environment variable {} not set",
                ENV_RESOURCE_PATH
            );
            Vec::new()
        }
    }
}

/// Host-process launch options for `options`.
pub fn launch_options(options: &StartOptions) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(size) = &options.max_heap {
        args.push(format!("-Xmx{}", size));
    }
    if options.headless {
        args.push(HEADLESS_OPTION.to_string());
    }
    args
}

/// Assemble the full launch configuration, reading [`ENV_RESOURCE_PATH`]
/// when system resources are requested.
pub fn launch_config(options: &StartOptions) -> Result<LaunchConfig> {
    let mut resource_paths = lib_paths(&options.root_dir, Platform::current())?;
    if options.system_resources {
        if options.logs(Level::DEBUG) {
            debug!("Adding system resource paths");
        }
        let value = std::env::var_os(ENV_RESOURCE_PATH);
        resource_paths.extend(system_resource_paths(value.as_deref()));
    }

    Ok(LaunchConfig {
        resource_paths,
        options: launch_options(options),
        headless: options.headless,
        convert_text: options.convert_text,
    })
}

/// Whether the host has ever been started since the last stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    NeverStarted,
    Running { headless: bool },
}

/// The process's foreign execution host.
///
/// Start and stop are serialized internally; the host can be shared
/// between threads by reference.
pub struct ExecutionHost {
    launcher: Arc<dyn Launcher>,
    session: Mutex<Option<Session>>,
}

impl ExecutionHost {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self {
            launcher,
            session: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Launch the execution host. A no-op if it is already running.
    pub fn start(&self, options: &StartOptions) -> Result<()> {
        let mut state = self.state();
        if state.is_some() {
            if options.logs(Level::INFO) {
                info!("Execution host already running, call stop() first");
            }
            return Ok(());
        }

        let config = launch_config(options)?;
        if options.logs(Level::DEBUG) {
            debug!(resource_paths = ?config.resource_paths, "Resource paths");
            match &options.max_heap {
                Some(size) => debug!("MaxHeapSize={}", size),
                None => debug!("MaxHeapSize=default"),
            }
        }

        let runtime = self
            .launcher
            .launch(&config)
            .map_err(|e| BridgeError::Launch(e.to_string()))?;
        let session = Session::new(runtime, options.headless);
        if options.logs(Level::INFO) {
            info!(session = %session.id(), runtime = session.inner.runtime.name(), headless = options.headless, "Execution host started");
        }

        if options.system_info {
            log_system_info(&session);
        }

        *state = Some(session);
        Ok(())
    }

    /// Shut the execution host down. A no-op if it is not running.
    ///
    /// Every handle created while the host was running becomes invalid.
    pub fn stop(&self) {
        match self.state().take() {
            Some(session) => {
                session.shutdown();
                info!(session = %session.id(), "Execution host stopped");
            }
            None => debug!("Execution host not running, nothing to stop"),
        }
    }

    pub fn status(&self) -> HostStatus {
        match self.state().as_ref() {
            Some(session) => HostStatus::Running {
                headless: session.is_headless(),
            },
            None => HostStatus::NeverStarted,
        }
    }

    pub fn is_started(&self) -> bool {
        self.state().is_some()
    }

    /// Whether the running host is headless; `false` when not running.
    pub fn is_headless(&self) -> bool {
        matches!(self.status(), HostStatus::Running { headless: true })
    }

    /// The current session.
    pub fn session(&self) -> Result<Session> {
        self.state().as_ref().cloned().ok_or(BridgeError::HostNotStarted)
    }
}

impl fmt::Debug for ExecutionHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionHost")
            .field("session", &*self.state())
            .finish()
    }
}

fn log_system_info(session: &Session) {
    let runtime = session.inner.runtime.as_ref();
    match runtime.new_instance(names::SYSTEM_INFO, &[]) {
        Ok(handle) => {
            match runtime.describe(&handle) {
                Ok(text) => info!("{}", text),
                Err(e) => warn!(error = %e, "Failed to describe system info"),
            }
            runtime.release(&handle);
        }
        Err(e) => warn!(error = %e, "Failed to obtain system info"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::memory::MemoryLauncher;

    #[test]
    fn lib_paths_include_platform_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = lib_paths(dir.path(), Platform::Linux).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.path().join("lib").join("*"),
                dir.path().join("lib").join("linux64").join("*"),
            ]
        );
        let paths = lib_paths(dir.path(), Platform::Other).unwrap();
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn missing_root_dir() {
        let err = lib_paths(Path::new("/no/such/adams/root"), Platform::Linux).unwrap_err();
        assert!(matches!(err, BridgeError::RootDirNotFound(_)));
    }

    #[test]
    fn system_paths_split() {
        let joined = std::env::join_paths(["/a/b.jar", "/c/d.jar"]).unwrap();
        assert_eq!(
            system_resource_paths(Some(joined.as_os_str())),
            vec![PathBuf::from("/a/b.jar"), PathBuf::from("/c/d.jar")]
        );
        assert!(system_resource_paths(None).is_empty());
    }

    #[test]
    fn options_only_when_requested() {
        let options = StartOptions::new("/opt/adams");
        assert!(launch_options(&options).is_empty());

        let options = options.max_heap("4g").headless(true);
        assert_eq!(
            launch_options(&options),
            vec!["-Xmx4g".to_string(), HEADLESS_OPTION.to_string()]
        );
    }

    #[test]
    fn stop_before_start_is_noop() {
        let host = ExecutionHost::new(Arc::new(MemoryLauncher::standard()));
        host.stop();
        assert_eq!(host.status(), HostStatus::NeverStarted);
        assert!(matches!(host.session(), Err(BridgeError::HostNotStarted)));
    }

    #[test]
    fn start_twice_launches_once() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(MemoryLauncher::standard());
        let host = ExecutionHost::new(launcher.clone());
        let options = StartOptions::new(dir.path()).headless(true);

        host.start(&options).unwrap();
        host.start(&options).unwrap();
        assert!(host.is_started());
        assert!(host.is_headless());
        assert_eq!(launcher.launches(), 1);
    }

    #[test]
    fn stop_invalidates_session() {
        let dir = tempfile::tempdir().unwrap();
        let host = ExecutionHost::new(Arc::new(MemoryLauncher::standard()));
        host.start(&StartOptions::new(dir.path())).unwrap();
        let session = host.session().unwrap();
        assert!(session.runtime().is_ok());

        host.stop();
        assert!(!session.is_alive());
        assert!(matches!(session.runtime(), Err(BridgeError::HostStopped)));
        assert_eq!(host.status(), HostStatus::NeverStarted);
    }

    #[test]
    fn launch_failure_leaves_host_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let host = ExecutionHost::new(Arc::new(MemoryLauncher::failing("no JVM found")));
        let err = host.start(&StartOptions::new(dir.path())).unwrap_err();
        assert!(matches!(err, BridgeError::Launch(msg) if msg.contains("no JVM found")));
        assert!(!host.is_started());
    }
}
