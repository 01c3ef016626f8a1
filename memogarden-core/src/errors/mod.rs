//! Error types for the storage kernel.
//!
//! One aggregated enum, `MemoGardenError`, with per-layer sub-enums
//! lifted in via `From`. Every distinguishable failure mode of the
//! kernel contract has its own variant.

mod storage_error;

pub use storage_error::StorageError;

use crate::models::consistency::{BrokenChain, OrphanedDelta};

/// Result alias used throughout the workspace.
pub type GardenResult<T> = Result<T, MemoGardenError>;

#[derive(Debug, thiserror::Error)]
pub enum MemoGardenError {
    /// An entity, fact, frame, or artifact is absent.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    /// Malformed input: empty summary, out-of-range LRU size, unknown
    /// relation kind, invalid owner type, unparsable delta op.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Artifact optimistic lock refused the write.
    #[error(
        "artifact '{artifact_uuid}' modified since last read: \
         expected hash {expected_hash}, current hash {actual_hash}"
    )]
    Conflict {
        artifact_uuid: String,
        expected_hash: String,
        actual_hash: String,
    },

    /// Entity hash mismatch on a guarded update.
    #[error(
        "entity '{entity_uuid}' hash mismatch: \
         expected {expected_hash}, current {actual_hash}"
    )]
    OptimisticLock {
        entity_uuid: String,
        expected_hash: String,
        actual_hash: String,
    },

    /// Cross-database commit anomaly or startup audit finding.
    #[error("cross-database inconsistency (soil_committed={soil_committed})")]
    Consistency {
        soil_committed: bool,
        core_error: Option<String>,
        orphans: Vec<OrphanedDelta>,
        broken_chains: Vec<BrokenChain>,
    },

    /// Reserved for the surface layer; the kernel treats caller identity
    /// as an opaque string.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Reserved for the surface layer.
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// Serialization or I/O failure below the kernel.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A deferred behaviour was invoked. Strict contract: raised, never
    /// converted to a partial answer.
    #[error("not implemented: {feature}")]
    NotImplemented { feature: String },
}

impl MemoGardenError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }
}
