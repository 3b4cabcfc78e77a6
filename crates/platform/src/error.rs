//! Error types for menv-platform

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Failed to determine home directory")]
    NoHomeDirectory,

    #[error("Failed to get hostname: {0}")]
    Hostname(String),

    #[error("environment variable `{0}` is not set")]
    UnsetVariable(String),

    #[error("unterminated `${{` in `{0}`")]
    BadReference(String),
}
