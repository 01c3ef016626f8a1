//! System status and the startup audit's findings.

use serde::{Deserialize, Serialize};

/// Health of the two-database system.
///
/// The system proceeds in every state; the status is reported, not
/// enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    /// No issues detected.
    Normal,
    /// Orphaned deltas: Soil committed, the registry did not.
    Inconsistent,
    /// External maintenance gate.
    ReadOnly,
    /// Hash-chain corruption detected.
    SafeMode,
}

/// An `EntityDelta` fact whose entity has no row in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanedDelta {
    pub uuid: String,
    pub realized_at: String,
    pub entity_id: String,
}

/// An entity whose `previous_hash` resolves to no row's `hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokenChain {
    pub uuid: String,
    pub previous_hash: String,
    pub issue: String,
}
