//! Platform error types

use thiserror::Error;

/// Errors surfaced by platform trait implementations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlatformError {
    /// Storage operation before a successful mount.
    #[error("storage is not mounted")]
    NotMounted,

    /// Path does not exist.
    #[error("no such file or directory")]
    NotFound,

    /// Path exceeds the fixed path capacity.
    #[error("path too long")]
    PathTooLong,

    /// Caller-provided buffer cannot hold the result.
    #[error("buffer too small")]
    BufferTooSmall,

    /// Device or driver failed to come up.
    #[error("initialization failed")]
    InitializationFailed,

    /// Configuration rejected by the device.
    #[error("invalid configuration")]
    InvalidConfig,

    /// Transient resource exhaustion.
    #[error("resource unavailable")]
    ResourceUnavailable,
}

pub type Result<T> = core::result::Result<T, PlatformError>;
