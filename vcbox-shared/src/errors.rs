//! Error types for vcbox.
//!
//! Every provisioning failure aborts the run, so a single flat enum is
//! enough. "No guest address yet" is not an error and never appears here;
//! the address resolver reports it as `Ok(None)`.

use thiserror::Error;

/// Result alias used across the vcbox crates.
pub type VcboxResult<T> = Result<T, VcboxError>;

#[derive(Debug, Error)]
pub enum VcboxError {
    /// A named inventory object (datacenter, compute resource, pool,
    /// folder, network, template or cloned machine) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Static IP and netmask were not supplied together.
    #[error("invalid network spec: {0}")]
    InvalidNetworkSpec(String),

    /// Guest OS family outside of `linux` / `windows`.
    #[error("unsupported prep type: {0}")]
    UnsupportedPrepType(String),

    /// The platform reported a failed reconfigure or clone task.
    #[error("clone failed: {0}")]
    CloneFailed(String),

    /// Object creation raced with another writer.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Provider options cannot be turned into a provisioning request.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport or API failure talking to the management platform.
    #[error("platform error: {0}")]
    Platform(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl VcboxError {
    /// Whether this error is the "already exists" side of an idempotent create.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, VcboxError::AlreadyExists(_))
    }

    /// Whether this error names a missing inventory object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VcboxError::NotFound(_))
    }
}

impl From<serde_json::Error> for VcboxError {
    fn from(err: serde_json::Error) -> Self {
        VcboxError::Internal(format!("json: {}", err))
    }
}

impl From<std::io::Error> for VcboxError {
    fn from(err: std::io::Error) -> Self {
        VcboxError::Internal(format!("io: {}", err))
    }
}
