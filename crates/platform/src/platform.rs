//! Platform and architecture detection

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PlatformError;
use crate::shell::login_shell;

/// Operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Darwin,
    Windows,
    FreeBsd,
    NetBsd,
    OpenBsd,
    Other(&'static str),
}

impl Os {
    /// Detect the current operating system
    pub fn current() -> Self {
        Self::from_raw(std::env::consts::OS)
    }

    /// Map a host-reported OS name (as in `std::env::consts::OS`)
    pub fn from_raw(raw: &'static str) -> Self {
        match raw {
            "linux" => Os::Linux,
            "macos" => Os::Darwin,
            "windows" => Os::Windows,
            "freebsd" => Os::FreeBsd,
            "netbsd" => Os::NetBsd,
            "openbsd" => Os::OpenBsd,
            other => Os::Other(other),
        }
    }

    /// Returns the OS name as used in target strings
    pub const fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Windows => "windows",
            Os::FreeBsd => "freebsd",
            Os::NetBsd => "netbsd",
            Os::OpenBsd => "openbsd",
            Os::Other(raw) => *raw,
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    X86,
    Aarch64,
    /// 32-bit ARM with its ISA revision (5, 6 or 7)
    Arm(u8),
    Riscv64,
    Other(&'static str),
}

impl Arch {
    /// Detect the current architecture
    pub fn current() -> Self {
        Self::from_raw(std::env::consts::ARCH)
    }

    /// Map a host-reported architecture name (as in `std::env::consts::ARCH`)
    pub fn from_raw(raw: &'static str) -> Self {
        match raw {
            "x86_64" => Arch::X86_64,
            "x86" => Arch::X86,
            "aarch64" => Arch::Aarch64,
            "arm" => Arch::Arm(arm_version()),
            "riscv64" => Arch::Riscv64,
            other => Arch::Other(other),
        }
    }

    /// Returns the GNU/LLVM spelling of the architecture for `os`.
    ///
    /// 64-bit ARM is spelled `arm64` on darwin, where that is the native name.
    pub fn target_name(&self, os: Os) -> String {
        match self {
            Arch::X86_64 => "x86_64".to_string(),
            Arch::X86 => "i686".to_string(),
            Arch::Aarch64 if os == Os::Darwin => "arm64".to_string(),
            Arch::Aarch64 => "aarch64".to_string(),
            Arch::Arm(version) => format!("armv{}", version),
            Arch::Riscv64 => "riscv64".to_string(),
            Arch::Other(raw) => raw.to_string(),
        }
    }
}

/// ISA revision of the 32-bit ARM target this binary was built for
fn arm_version() -> u8 {
    if cfg!(target_feature = "v7") {
        7
    } else if cfg!(target_feature = "v6") {
        6
    } else {
        5
    }
}

/// Target identifier using GNU/LLVM spellings (e.g., "x86_64-linux", "arm64-darwin")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub arch: String,
    pub os: String,
}

impl Target {
    /// Create a target identifier from a detected arch and OS
    pub fn new(arch: Arch, os: Os) -> Self {
        Self {
            arch: arch.target_name(os),
            os: os.as_str().to_string(),
        }
    }

    /// Detect the current target
    pub fn current() -> Self {
        Self::new(Arch::current(), Os::current())
    }

    /// Returns the target triple string (e.g., "aarch64-linux")
    pub fn triple(&self) -> String {
        format!("{}-{}", self.arch, self.os)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch, self.os)
    }
}

/// Platform identifier using the spellings reported by the host toolchain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RawPlatform {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl RawPlatform {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// Complete host information including user details
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub target: Target,
    pub platform: RawPlatform,
    pub hostname: String,
    pub username: String,
    pub shell: String,
}

impl HostInfo {
    /// Gather current host information.
    ///
    /// This performs hostname, user and shell lookups and is comparatively
    /// expensive; callers are expected to cache the result.
    pub fn current() -> Self {
        Self {
            target: Target::current(),
            platform: RawPlatform::current(),
            hostname: hostname().unwrap_or_else(|_| "unknown".to_string()),
            username: whoami::username(),
            shell: login_shell(),
        }
    }
}

/// Look up the host name
pub fn hostname() -> Result<String, PlatformError> {
    whoami::fallible::hostname().map_err(|e| PlatformError::Hostname(e.to_string()))
}
