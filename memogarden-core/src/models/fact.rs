//! Immutable Facts, the records of the audit layer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ids, time};

/// How much of the original observation a Fact retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    Full,
    Summary,
    Stub,
    Tombstone,
}

impl Fidelity {
    pub fn as_str(self) -> &'static str {
        match self {
            Fidelity::Full => "full",
            Fidelity::Summary => "summary",
            Fidelity::Stub => "stub",
            Fidelity::Tombstone => "tombstone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Fidelity::Full),
            "summary" => Some(Fidelity::Summary),
            "stub" => Some(Fidelity::Stub),
            "tombstone" => Some(Fidelity::Tombstone),
            _ => None,
        }
    }
}

/// An immutable record in Soil.
///
/// Created once, never mutated except to record a supersession link to a
/// newer Fact. `fact_type` is an open set; the bundled type schemas cover
/// `Note`, `Message`, `Email`, `ToolCall`, `EntityDelta`, `SystemEvent`,
/// and `ArtifactDelta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Bare UUID; the `soil_` tag is attached at the kernel boundary.
    pub uuid: String,
    /// Discriminator, e.g. `Email` or `EntityDelta`.
    pub fact_type: String,
    /// When the fact entered the system (ISO 8601 UTC).
    pub realized_at: String,
    /// External timestamp of the observed event.
    pub canonical_at: String,
    /// SHA-256 of the canonicalised `data`; computed on insert if absent.
    pub integrity_hash: Option<String>,
    pub fidelity: Fidelity,
    pub superseded_by: Option<String>,
    pub superseded_at: Option<String>,
    /// Typed JSON payload.
    pub data: serde_json::Value,
    pub metadata: Option<serde_json::Value>,
}

impl Fact {
    /// A full-fidelity fact stamped with the current time.
    pub fn new(fact_type: impl Into<String>, data: serde_json::Value) -> Self {
        let now = time::now_iso();
        Self {
            uuid: ids::generate(),
            fact_type: fact_type.into(),
            realized_at: now.clone(),
            canonical_at: now,
            integrity_hash: None,
            fidelity: Fidelity::Full,
            superseded_by: None,
            superseded_at: None,
            data,
            metadata: None,
        }
    }

    /// SHA-256 over the canonical JSON rendering of `data` (sorted keys,
    /// compact separators; serde_json's default map ordering).
    pub fn compute_integrity_hash(&self) -> String {
        let canonical = serde_json::to_string(&self.data).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_hash_ignores_key_order() {
        let a = Fact::new("Note", serde_json::json!({"b": 2, "a": 1}));
        let b = Fact::new("Note", serde_json::json!({"a": 1, "b": 2}));
        assert_eq!(a.compute_integrity_hash(), b.compute_integrity_hash());
    }

    #[test]
    fn new_fact_defaults() {
        let fact = Fact::new("Message", serde_json::json!({"content": "hi"}));
        assert_eq!(fact.fidelity, Fidelity::Full);
        assert!(fact.superseded_by.is_none());
        assert!(fact.integrity_hash.is_none());
        assert_eq!(fact.realized_at, fact.canonical_at);
    }

    #[test]
    fn fidelity_round_trips_through_strings() {
        for f in [
            Fidelity::Full,
            Fidelity::Summary,
            Fidelity::Stub,
            Fidelity::Tombstone,
        ] {
            assert_eq!(Fidelity::parse(f.as_str()), Some(f));
        }
        assert_eq!(Fidelity::parse("partial"), None);
    }
}
