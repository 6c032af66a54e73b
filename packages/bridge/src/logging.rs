//! Logging setup for programs embedding the bridge.
//!
//! The bridge itself only emits `tracing` events. Binaries and tests that
//! want to see them call [`init_logging`] once at startup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the filter directives.
pub const ENV_LOGLEVEL: &str = "ADAMS_BRIDGE_LOGLEVEL";

/// Install a fmt subscriber filtered by the directives in `env_var`,
/// falling back to `info`. Returns `false` if a global subscriber was
/// already installed, in which case nothing changes.
pub fn init_logging(env_var: &str) -> bool {
    let filter = EnvFilter::try_from_env(env_var).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_noop() {
        init_logging(ENV_LOGLEVEL);
        assert!(!init_logging(ENV_LOGLEVEL));
    }
}
