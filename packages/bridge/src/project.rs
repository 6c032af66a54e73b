//! Per-user project directory.

use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};
use crate::platform::Platform;

/// Name of the project, used for the data directory.
pub const PROJECT_NAME: &str = "adams-bridge";

pub fn project_name() -> &'static str {
    PROJECT_NAME
}

/// The project directory for the current user: `~/.local/share/<name>` on
/// Linux and macOS, `~/<name>` elsewhere.
pub fn project_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "cannot determine home directory",
        ))
    })?;
    Ok(project_dir_in(&home, Platform::current()))
}

/// The project directory below `home` on `platform`.
pub fn project_dir_in(home: &Path, platform: Platform) -> PathBuf {
    match platform {
        Platform::Linux | Platform::MacOs => home.join(".local").join("share").join(PROJECT_NAME),
        Platform::Windows | Platform::Other => home.join(PROJECT_NAME),
    }
}

/// Create the project directory if necessary.
pub fn init_project_dir() -> Result<PathBuf> {
    let dir = project_dir()?;
    init_dir(&dir)?;
    Ok(dir)
}

/// Create `dir` and its parents. Fails if `dir` exists but is not a
/// directory.
pub fn init_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    if !dir.is_dir() {
        return Err(BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("not a directory: {}", dir.display()),
        )));
    }
    Ok(())
}
