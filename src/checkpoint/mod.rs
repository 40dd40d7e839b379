//! Checkpoint and restore for routers.
//!
//! A checkpoint captures where the router is and how it got there, so an
//! application can come back to the same location after a restart. Hooks,
//! resolvables and listeners are code and are not part of it.

use crate::core::{Location, NavigationHistory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable snapshot of a router's position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouterCheckpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: String,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    /// Committed location at checkpoint time
    pub location: Location,

    /// Navigation history at checkpoint time
    pub history: NavigationHistory,
}

/// Binary framing: a version header followed by the JSON body.
///
/// Param values are free-form JSON, which bincode cannot decode directly.
#[derive(Serialize, Deserialize)]
struct BinaryEnvelope {
    version: u32,
    body: Vec<u8>,
}

impl RouterCheckpoint {
    /// Capture a location and its history.
    pub fn new(location: Location, history: NavigationHistory) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            location,
            history,
        }
    }

    /// Reject checkpoints this version cannot restore.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        if Uuid::parse_str(&self.id).is_err() {
            return Err(CheckpointError::ValidationFailed(format!(
                "checkpoint id '{}' is not a uuid",
                self.id
            )));
        }
        Ok(())
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    /// Parse a checkpoint written by [`Self::to_json`].
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Serialize with bincode.
    pub fn to_binary(&self) -> Result<Vec<u8>, CheckpointError> {
        let body =
            serde_json::to_vec(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))?;
        bincode::serialize(&BinaryEnvelope {
            version: self.version,
            body,
        })
        .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    /// Parse a checkpoint written by [`Self::to_binary`].
    pub fn from_binary(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let envelope: BinaryEnvelope = bincode::deserialize(bytes)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        if envelope.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: envelope.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        let checkpoint: Self = serde_json::from_slice(&envelope.body)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NavigationRecord;
    use crate::params;

    fn checkpoint() -> RouterCheckpoint {
        let history = NavigationHistory::new().record(NavigationRecord {
            transition: 3,
            from: Location::default(),
            to: Location::new("users.detail", params! { "id" => 7, "tags" => ["a", "b"] }),
            url: Some("/users/7".into()),
            timestamp: Utc::now(),
            redirects: 1,
        });
        RouterCheckpoint::new(
            Location::new("users.detail", params! { "id" => 7, "tags" => ["a", "b"] }),
            history,
        )
    }

    #[test]
    fn json_preserves_location_and_history() {
        let original = checkpoint();
        let restored = RouterCheckpoint::from_json(&original.to_json().unwrap()).unwrap();

        assert_eq!(restored.id, original.id);
        assert_eq!(restored.location, original.location);
        assert_eq!(restored.history.len(), 1);
        assert_eq!(restored.history.records()[0].redirects, 1);
    }

    #[test]
    fn binary_preserves_param_values() {
        let original = checkpoint();
        let restored = RouterCheckpoint::from_binary(&original.to_binary().unwrap()).unwrap();
        assert_eq!(restored.location.params, original.location.params);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut original = checkpoint();
        original.version = 99;
        let json = serde_json::to_string(&original).unwrap();

        assert!(matches!(
            RouterCheckpoint::from_json(&json),
            Err(CheckpointError::UnsupportedVersion { found: 99, .. })
        ));
        assert!(matches!(
            RouterCheckpoint::from_binary(&original.to_binary().unwrap()),
            Err(CheckpointError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn garbage_fails_to_deserialize() {
        assert!(matches!(
            RouterCheckpoint::from_json("not json"),
            Err(CheckpointError::DeserializationFailed(_))
        ));
        assert!(RouterCheckpoint::from_binary(&[1, 2, 3]).is_err());
    }
}
