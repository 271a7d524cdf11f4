//! Error taxonomy
//!
//! - Fatal: [`SourceError`], the session cannot start
//! - Transient: [`FrameUnavailable`], retried on the next cycle
//! - Collaborator: [`StoreError`], surfaced as a throttled notice
//!
//! Strategy failures never appear here; they are normalized to "no result".

use std::path::PathBuf;

/// Result alias for fallible crate operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Fatal frame-source failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// No capture device (or no frames) available
    #[error("no capture device available: {0}")]
    NoDevice(String),

    /// The platform refused access to the device
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Device or platform cannot provide a usable stream
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Transient reasons a frame could not be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameUnavailable {
    /// The stream has not reported nonzero dimensions yet
    #[error("stream not ready")]
    NotReady,

    /// The source is paused or stopped
    #[error("stream stopped")]
    Stopped,
}

/// Persistence collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Product id is not known to the store
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// Code id/value is not present
    #[error("code not found: {0}")]
    UnknownCode(String),

    /// Store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Configuration loading/validation failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for [`crate::config::ScanConfig`]
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Values parsed but are inconsistent
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error for sessions and tooling
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Frame source could not start
    #[error("frame source: {0}")]
    Source(#[from] SourceError),

    /// Configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persistence collaborator problem
    #[error("code store: {0}")]
    Store(#[from] StoreError),

    /// Image could not be loaded or encoded
    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    /// The session has already terminated
    #[error("session closed")]
    Closed,
}
