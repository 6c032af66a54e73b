//! Host platform detection.

/// The operating system the bridge runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS name as reported by `std::env::consts::OS`.
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Other,
        }
    }

    /// Sub-directory of `<root>/lib` holding native libraries.
    pub fn lib_subdir(&self) -> Option<&'static str> {
        match self {
            Platform::Linux => Some("linux64"),
            Platform::Windows => Some("windows64"),
            Platform::MacOs => Some("macosx64"),
            Platform::Other => None,
        }
    }
}

pub fn is_linux() -> bool {
    Platform::current() == Platform::Linux
}

pub fn is_windows() -> bool {
    Platform::current() == Platform::Windows
}

pub fn is_mac() -> bool {
    Platform::current() == Platform::MacOs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdirs() {
        assert_eq!(Platform::from_os("linux").lib_subdir(), Some("linux64"));
        assert_eq!(Platform::from_os("windows").lib_subdir(), Some("windows64"));
        assert_eq!(Platform::from_os("macos").lib_subdir(), Some("macosx64"));
        assert_eq!(Platform::from_os("freebsd").lib_subdir(), None);
    }

    #[test]
    fn exactly_one_known_platform_at_most() {
        let count = [is_linux(), is_windows(), is_mac()]
            .iter()
            .filter(|b| **b)
            .count();
        assert!(count <= 1);
    }
}
