//! Host detection for menv
//!
//! This crate provides the host facts that the evaluator exposes to
//! manifest expressions:
//! - OS and architecture detection, in both target (GNU/LLVM) and raw spellings
//! - Hostname, user and login shell lookup
//! - Path expansion (`~`, `$VAR` and base-relative paths)

mod error;
mod paths;
mod platform;
mod shell;

pub use error::PlatformError;
pub use paths::{expand_path, normalize_path};
pub use platform::{Arch, HostInfo, Os, RawPlatform, Target};
pub use shell::login_shell;
