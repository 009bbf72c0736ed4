//! Error kinds surfaced by the interceptor and its collaborators.
//!
//! None of these ever reach a request caller: a failed memory read fails open,
//! a failed reclamation is logged, and a bad configuration stops startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GciError {
    /// Process memory accounting could not be read or parsed.
    #[error("process memory accounting unavailable: {0}")]
    MemoryUnavailable(String),

    /// The host reclamation call errored (or the capability is missing).
    #[error("reclamation failed: {0}")]
    ReclamationFailed(String),

    /// Window bounds, threshold or history size out of range at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl GciError {
    pub(crate) fn memory(msg: impl Into<String>) -> Self {
        Self::MemoryUnavailable(msg.into())
    }
    pub(crate) fn reclamation(msg: impl Into<String>) -> Self {
        Self::ReclamationFailed(msg.into())
    }
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

pub type GciResult<T> = std::result::Result<T, GciError>;
