// Host platform classification

use std::fmt;

/// Closed set of host classes the launcher knows how to drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPlatform {
    LinuxLike,
    WindowsLike,
    Unsupported(String),
}

impl HostPlatform {
    /// Classify the platform this binary was built for
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Classify an OS name as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => HostPlatform::LinuxLike,
            "windows" => HostPlatform::WindowsLike,
            other => HostPlatform::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPlatform::LinuxLike => write!(f, "linux-like"),
            HostPlatform::WindowsLike => write!(f, "windows-like"),
            HostPlatform::Unsupported(os) => write!(f, "unsupported ({})", os),
        }
    }
}
