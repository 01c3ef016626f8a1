//! # memogarden-coordinator
//!
//! Coordination across the two databases. The Fact store is the audit
//! source of truth, so cross-database commits land there first: an
//! uncommitted Soil beside a committed registry would be an
//! unreconstructable revision, while the reverse (Soil committed, the
//! registry not) is detectable and repairable. Lock acquisition order
//! is fixed the same way (Soil before the registry), which rules out
//! two-way deadlocks between coordinated callers.
//!
//! The startup audit enumerates the reachable anomaly (orphaned
//! `EntityDelta` facts) and hash-chain corruption, reports counts, and
//! never refuses to start.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use memogarden_core::config::{EnvSource, Layer, RuntimeContext};
use memogarden_core::errors::{GardenResult, MemoGardenError};
use memogarden_core::hash_chain::compute_content_hash;
use memogarden_core::models::{
    BrokenChain, EndpointType, Fact, OrphanedDelta, SystemStatus,
};
use memogarden_core::ids;
use memogarden_registry::delta::{apply_delta_ops, parse_delta_ops};
use memogarden_registry::{Registry, RegistrySession};
use memogarden_soil::{Soil, SoilSession};

/// Result of a committed artifact delta.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaCommit {
    /// `core_`-tagged artifact UUID.
    pub artifact_uuid: String,
    pub previous_hash: String,
    pub new_hash: String,
    pub new_content: String,
    /// `soil_`-tagged UUID of the `ArtifactDelta` fact.
    pub delta_uuid: String,
    pub line_count: usize,
}

/// Coordinates transactions that span the Fact store and the registry.
pub struct TransactionCoordinator {
    soil_db_path: PathBuf,
    core_db_path: PathBuf,
    read_only: AtomicBool,
    fail_core_commit: AtomicBool,
}

impl TransactionCoordinator {
    pub fn new(soil_db_path: impl Into<PathBuf>, core_db_path: impl Into<PathBuf>) -> Self {
        Self {
            soil_db_path: soil_db_path.into(),
            core_db_path: core_db_path.into(),
            read_only: AtomicBool::new(false),
            fail_core_commit: AtomicBool::new(false),
        }
    }

    /// Resolve database paths from the runtime context.
    pub fn from_runtime(ctx: &RuntimeContext, env: &dyn EnvSource) -> Self {
        Self::new(ctx.db_path(Layer::Soil, env), ctx.db_path(Layer::Core, env))
    }

    pub fn soil_db_path(&self) -> &Path {
        &self.soil_db_path
    }

    pub fn core_db_path(&self) -> &Path {
        &self.core_db_path
    }

    /// External maintenance gate. While set, `system_status` reports
    /// `ReadOnly`.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Fault-injection hook: make the next coordinated commit fail on
    /// the registry side after Soil has committed.
    #[doc(hidden)]
    pub fn induce_core_commit_failure(&self) {
        self.fail_core_commit.store(true, Ordering::SeqCst);
    }

    // =====================================================================
    // Consistency audit
    // =====================================================================

    /// Startup consistency check. Reports, never refuses: broken hash
    /// chains yield `SafeMode`, orphaned deltas `Inconsistent`,
    /// otherwise `Normal`.
    pub fn check_consistency(&self) -> GardenResult<SystemStatus> {
        let orphans = self.find_orphaned_deltas()?;
        let broken_chains = self.find_broken_hash_chains()?;

        if !orphans.is_empty() {
            tracing::warn!(count = orphans.len(), "orphaned entity deltas detected");
        }
        if !broken_chains.is_empty() {
            tracing::warn!(count = broken_chains.len(), "broken hash chains detected");
            return Ok(SystemStatus::SafeMode);
        }
        if !orphans.is_empty() {
            return Ok(SystemStatus::Inconsistent);
        }
        Ok(SystemStatus::Normal)
    }

    /// The consistency result, behind the maintenance gate.
    pub fn system_status(&self) -> GardenResult<SystemStatus> {
        if self.read_only.load(Ordering::SeqCst) {
            return Ok(SystemStatus::ReadOnly);
        }
        self.check_consistency()
    }

    /// `EntityDelta` facts whose entity has no row in the registry:
    /// Soil committed, the registry did not.
    pub fn find_orphaned_deltas(&self) -> GardenResult<Vec<OrphanedDelta>> {
        let mut soil = Soil::open(&self.soil_db_path)?;
        let mut registry = Registry::open(&self.core_db_path)?;
        let soil_session = soil.session()?;
        let core_session = registry.session()?;
        let entities = core_session.entities();

        let mut orphans = Vec::new();
        for fact in soil_session.list_active_facts_of_type("EntityDelta")? {
            let Some(entity_id) = fact.data.get("entity_id").and_then(|v| v.as_str()) else {
                continue;
            };
            if !entities.exists(entity_id)? {
                orphans.push(OrphanedDelta {
                    uuid: fact.uuid,
                    realized_at: fact.realized_at,
                    entity_id: entity_id.to_string(),
                });
            }
        }
        Ok(orphans)
    }

    /// Registry rows whose stored hash disagrees with the recomputed
    /// chain head.
    pub fn find_broken_hash_chains(&self) -> GardenResult<Vec<BrokenChain>> {
        let mut registry = Registry::open(&self.core_db_path)?;
        let session = registry.session()?;
        session.entities().find_broken_chain_links()
    }

    // =====================================================================
    // Cross-database transactions
    // =====================================================================

    /// Run a closure against both databases inside one coordinated
    /// transaction.
    ///
    /// Entry takes EXCLUSIVE locks, Soil first. A closure error rolls
    /// both back. On success Soil commits first; if the registry then
    /// fails, the anomaly is logged and surfaced as a `Consistency`
    /// error carrying `soil_committed = true`; `check_consistency`
    /// finds the stranded deltas on the next startup.
    pub fn cross_database_transaction<T, F>(&self, f: F) -> GardenResult<T>
    where
        F: FnOnce(&SoilSession<'_>, &RegistrySession<'_>) -> GardenResult<T>,
    {
        let mut soil = Soil::open(&self.soil_db_path)?;
        let mut registry = Registry::open(&self.core_db_path)?;

        // Fixed lock order: Soil, then the registry.
        let soil_session = soil.exclusive_session()?;
        let core_session = registry.exclusive_session()?;

        match f(&soil_session, &core_session) {
            Ok(value) => {
                // Soil first: it is the source of truth.
                soil_session.commit()?;

                if self.fail_core_commit.swap(false, Ordering::SeqCst) {
                    drop(core_session);
                    tracing::error!(
                        "soil committed but registry commit failed; system is now inconsistent"
                    );
                    return Err(MemoGardenError::Consistency {
                        soil_committed: true,
                        core_error: Some("induced registry commit failure".to_string()),
                        orphans: Vec::new(),
                        broken_chains: Vec::new(),
                    });
                }

                match core_session.commit() {
                    Ok(()) => Ok(value),
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "soil committed but registry commit failed; system is now inconsistent"
                        );
                        Err(MemoGardenError::Consistency {
                            soil_committed: true,
                            core_error: Some(e.to_string()),
                            orphans: Vec::new(),
                            broken_chains: Vec::new(),
                        })
                    }
                }
            }
            Err(e) => {
                // Roll both back; dropping a session without commit
                // rolls back, and rolling back an uncommitted side is
                // always safe.
                drop(core_session);
                drop(soil_session);
                Err(e)
            }
        }
    }

    // =====================================================================
    // Cross-database operations
    // =====================================================================

    /// Guarded entity update with an audit trail: writes an
    /// `EntityDelta` fact to Soil and the new payload to the registry
    /// inside one coordinated transaction. Returns the new chain head.
    pub fn update_entity(
        &self,
        entity_id: &str,
        new_data: serde_json::Value,
        based_on_hash: &str,
    ) -> GardenResult<String> {
        let entity_id = ids::strip_prefix(entity_id).to_string();
        self.cross_database_transaction(|soil_session, core_session| {
            let entities = core_session.entities();
            let current = entities.get(&entity_id)?;
            if current.hash != based_on_hash {
                return Err(MemoGardenError::OptimisticLock {
                    entity_uuid: entity_id.clone(),
                    expected_hash: based_on_hash.to_string(),
                    actual_hash: current.hash,
                });
            }

            let new_hash = entities.update_data(&entity_id, new_data.clone())?;

            let delta = Fact::new(
                "EntityDelta",
                serde_json::json!({
                    "entity_id": ids::tag_core(&entity_id),
                    "based_on_hash": based_on_hash,
                    "result_hash": new_hash,
                    "changes": new_data,
                }),
            );
            soil_session.create_fact(&delta)?;

            Ok(new_hash)
        })
    }

    /// Commit an artifact delta: strict optimistic lock on the content
    /// hash, the `ArtifactDelta` fact in Soil and the rewritten content
    /// in the registry land in one coordinated transaction, and an
    /// optional `triggers` engagement relation points from the source
    /// message to the delta.
    pub fn commit_delta(
        &self,
        artifact_uuid: &str,
        ops_string: &str,
        references: &[String],
        based_on_hash: &str,
        source_message: Option<&str>,
    ) -> GardenResult<DeltaCommit> {
        self.cross_database_transaction(|soil_session, core_session| {
            let artifacts = core_session.artifacts();
            let (entity, data) = artifacts.load(artifact_uuid)?;

            let current_hash = compute_content_hash(&data.content);
            if current_hash != based_on_hash {
                return Err(MemoGardenError::Conflict {
                    artifact_uuid: entity.uuid.clone(),
                    expected_hash: based_on_hash.to_string(),
                    actual_hash: current_hash,
                });
            }

            let ops = parse_delta_ops(ops_string)?;
            let new_content = apply_delta_ops(&data.content, &ops)?;
            let new_hash = compute_content_hash(&new_content);

            let delta = Fact::new(
                "ArtifactDelta",
                serde_json::json!({
                    "artifact_uuid": ids::tag_core(&entity.uuid),
                    "ops": ops_string,
                    "references": references,
                    "based_on_hash": based_on_hash,
                    "result_hash": new_hash,
                }),
            );
            let delta_uuid = soil_session.create_fact(&delta)?;

            artifacts.record_commit(&entity.uuid, &delta_uuid, &new_content)?;

            if let Some(source_message) = source_message {
                core_session.engagement().create(
                    "triggers",
                    source_message,
                    EndpointType::Item,
                    &delta_uuid,
                    EndpointType::Item,
                    None,
                    None,
                    None,
                )?;
            }

            Ok(DeltaCommit {
                artifact_uuid: ids::tag_core(&entity.uuid),
                previous_hash: current_hash,
                new_hash,
                line_count: new_content.split('\n').count(),
                new_content,
                delta_uuid: ids::tag_soil(&delta_uuid),
            })
        })
    }
}
