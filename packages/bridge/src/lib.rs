//! # ADAMS Bridge
//!
//! Typed, lifecycle-managed handles onto the ADAMS flow runtime.
//!
//! ADAMS runs flow programs built from composable units called **actors**.
//! This crate drives that runtime from Rust: it starts the execution host
//! once, wraps foreign actors in handles, moves their configuration in and
//! out, and runs them through their lifecycle.
//!
//! ## Core Concepts
//!
//! ### The Execution Host
//!
//! [`ExecutionHost`] launches the foreign runtime from [`StartOptions`]
//! (ADAMS root directory, heap size, headless mode) and stops it again.
//! Both calls are idempotent. A running host is a [`Session`]; handles keep
//! the session they were created in and fail with
//! [`BridgeError::HostStopped`] once the host is gone.
//!
//! ### Handles
//!
//! An [`ObjectHandle`] owns one reference to a foreign object and answers
//! type queries through the capability oracle in [`capability`]. An
//! [`ActorHandle`] is an object handle known to be an actor. It drives the
//! set up, execute, wrap up, clean up protocol and exchanges configuration
//! in three forms: a mapping, a JSON document, or an option array.
//!
//! ### Flows
//!
//! [`flow::read`] and [`flow::write`] load and save flow files through the
//! foreign reader and writer. Reader diagnostics go into a
//! [`MessageSink`] rather than an error.
//!
//! ### The Runtime Seam
//!
//! The foreign engine is reached only through the traits in [`runtime`].
//! The `adams-bridge-jvm` crate implements them on top of a JVM. The
//! `memory` feature adds `runtime::memory`, a test double that scripts the
//! same traits in-process.
//!
//! ## Example
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//! use adams_bridge::{ActorHandle, ExecutionHost, Launcher, StartOptions};
//!
//! fn count_to_three(launcher: Arc<dyn Launcher>, root: &Path) -> adams_bridge::Result<()> {
//!     let host = ExecutionHost::new(launcher);
//!     host.start(&StartOptions::new(root).headless(true))?;
//!     let session = host.session()?;
//!
//!     let actor = ActorHandle::from_args(
//!         &session,
//!         "adams.flow.source.ForLoop",
//!         &["-loop_upper", "3"],
//!     )?;
//!     assert_eq!(actor.set_up()?, None);
//!     assert_eq!(actor.execute()?, None);
//!     actor.wrap_up()?;
//!     actor.clean_up()?;
//!
//!     host.stop();
//!     assert!(actor.is_finished().is_err());
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod capability;
pub mod config;
mod error;
pub mod flow;
pub mod host;
pub mod logging;
pub mod messages;
pub mod object;
pub mod platform;
pub mod project;
pub mod runtime;

pub use actor::{ActorBuilder, ActorHandle, LifecycleState};
pub use capability::Capability;
pub use config::Configuration;
pub use error::{BridgeError, Result};
pub use host::{ExecutionHost, HostStatus, Session, SessionId, StartOptions};
pub use messages::MessageSink;
pub use object::{ObjectHandle, TypeDescriptor};
pub use runtime::{ActorRole, ForeignError, ForeignHandle, ForeignRuntime, LaunchConfig, Launcher};
