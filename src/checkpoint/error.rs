//! Checkpoint error types.

use thiserror::Error;

/// Errors raised while saving or restoring a router checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("could not serialize checkpoint: {0}")]
    SerializationFailed(String),

    #[error("could not deserialize checkpoint: {0}")]
    DeserializationFailed(String),

    #[error("checkpoint format {found} is not supported (expected {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid checkpoint: {0}")]
    ValidationFailed(String),

    /// The checkpointed location names a state this router doesn't have
    #[error("checkpointed state '{0}' is not registered")]
    UnknownState(String),
}
