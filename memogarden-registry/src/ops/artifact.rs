//! Artifact queries over the entity table.
//!
//! Commit identity is the 8-hex content hash of `data.content`, distinct
//! from the entity's metadata chain hash. The cross-database commit
//! protocol lives in the coordinator; everything here reads one
//! database.

use rusqlite::Connection;

use memogarden_core::errors::{GardenResult, MemoGardenError};
use memogarden_core::hash_chain::compute_content_hash;
use memogarden_core::ids;
use memogarden_core::models::{ArtifactData, EntityRecord};

use super::entity::EntityOps;
use crate::delta::{diff_lines, DiffLine};
use crate::to_storage_err;

/// Artifact content at a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactState {
    /// `core_`-tagged artifact UUID.
    pub artifact_uuid: String,
    pub hash: String,
    pub content: String,
    pub line_count: usize,
    pub at_commit: String,
    /// Reserved for deferred-behaviour markers.
    pub note: Option<String>,
}

/// Line-aligned difference between two commits.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactDiff {
    pub artifact_uuid: String,
    pub commit_a: String,
    pub commit_b: String,
    pub changes: Vec<DiffLine>,
}

/// Artifact operations, borrowed from a session.
pub struct ArtifactOps<'s> {
    conn: &'s Connection,
}

impl<'s> ArtifactOps<'s> {
    pub(crate) fn new(conn: &'s Connection) -> Self {
        Self { conn }
    }

    fn entities(&self) -> EntityOps<'s> {
        EntityOps::new(self.conn)
    }

    /// Load an artifact entity and its payload, rejecting other types.
    pub fn load(&self, artifact_uuid: &str) -> GardenResult<(EntityRecord, ArtifactData)> {
        let entity = self.entities().get(artifact_uuid)?;
        if entity.entity_type != "Artifact" {
            return Err(MemoGardenError::validation(format!(
                "entity '{}' is not an Artifact",
                entity.uuid
            )));
        }
        let data: ArtifactData = entity.payload()?;
        Ok((entity, data))
    }

    /// The artifact's current commit hash (8-hex content hash).
    pub fn current_hash(&self, artifact_uuid: &str) -> GardenResult<String> {
        let (_, data) = self.load(artifact_uuid)?;
        Ok(compute_content_hash(&data.content))
    }

    /// Artifact state at a commit. The current commit is served from
    /// the row; reconstruction of older commits by delta replay is a
    /// declared future extension and signals `NotImplemented`.
    pub fn get_at_commit(
        &self,
        artifact_uuid: &str,
        commit_hash: &str,
    ) -> GardenResult<ArtifactState> {
        let (entity, data) = self.load(artifact_uuid)?;
        let current_hash = compute_content_hash(&data.content);

        if current_hash != commit_hash {
            return Err(MemoGardenError::not_implemented(
                "historical artifact reconstruction from the delta chain",
            ));
        }

        Ok(ArtifactState {
            artifact_uuid: ids::tag_core(&entity.uuid),
            hash: current_hash,
            line_count: data.content.split('\n').count(),
            content: data.content,
            at_commit: commit_hash.to_string(),
            note: None,
        })
    }

    /// Line-aligned diff between two commits.
    pub fn diff_commits(
        &self,
        artifact_uuid: &str,
        commit_a: &str,
        commit_b: &str,
    ) -> GardenResult<ArtifactDiff> {
        let state_a = self.get_at_commit(artifact_uuid, commit_a)?;
        let state_b = self.get_at_commit(artifact_uuid, commit_b)?;

        Ok(ArtifactDiff {
            artifact_uuid: state_a.artifact_uuid.clone(),
            commit_a: commit_a.to_string(),
            commit_b: commit_b.to_string(),
            changes: diff_lines(&state_a.content, &state_b.content),
        })
    }

    /// The most recent delta fact UUIDs for an artifact, newest first.
    pub fn list_deltas(&self, artifact_uuid: &str, limit: usize) -> GardenResult<Vec<String>> {
        let (_, data) = self.load(artifact_uuid)?;
        Ok(data.deltas.iter().rev().take(limit).cloned().collect())
    }

    /// Append a delta fact UUID and write the new content, advancing
    /// the entity chain. Used by the coordinator's commit protocol once
    /// the delta fact is staged in Soil.
    pub fn record_commit(
        &self,
        artifact_uuid: &str,
        delta_uuid: &str,
        new_content: &str,
    ) -> GardenResult<()> {
        let (entity, mut data) = self.load(artifact_uuid)?;
        data.deltas.push(ids::strip_prefix(delta_uuid).to_string());
        data.content = new_content.to_string();
        let payload = serde_json::to_value(&data).map_err(|e| to_storage_err(e.to_string()))?;
        self.entities().update_data(&entity.uuid, payload)?;
        Ok(())
    }
}
