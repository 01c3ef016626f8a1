//! The engagement index: user relations with decaying time horizons.
//!
//! A relation is alive while `time_horizon >= current_day()`. Each
//! access extends the horizon by the elapsed days scaled by the safety
//! coefficient, so regularly touched relations outlive neglected ones.
//! Expired rows stay in place for the fossilization sweep, which
//! consumes only `time_horizon < current_day()` rows.

use rusqlite::{params, Connection, OptionalExtension};

use memogarden_core::constants::{DEFAULT_HORIZON_DAYS, SAFETY_COEFFICIENT};
use memogarden_core::errors::{GardenResult, MemoGardenError};
use memogarden_core::models::{EndpointType, Evidence, UserRelation};
use memogarden_core::{ids, time};

use crate::to_storage_err;

/// Relation kinds the engagement index accepts.
const ENGAGEMENT_KINDS: &[&str] = &["explicit_link", "triggers"];

/// Engagement-index operations, borrowed from a session.
pub struct EngagementOps<'s> {
    conn: &'s Connection,
}

impl<'s> EngagementOps<'s> {
    pub(crate) fn new(conn: &'s Connection) -> Self {
        Self { conn }
    }

    /// Create a relation with an initial horizon of
    /// `initial_horizon_days` (default 7) from today. Returns the bare
    /// UUID.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        kind: &str,
        source: &str,
        source_type: EndpointType,
        target: &str,
        target_type: EndpointType,
        initial_horizon_days: Option<i64>,
        evidence: Option<Evidence>,
        metadata: Option<serde_json::Value>,
    ) -> GardenResult<String> {
        if !ENGAGEMENT_KINDS.contains(&kind) {
            return Err(MemoGardenError::validation(format!(
                "unknown engagement kind '{kind}'; expected one of {ENGAGEMENT_KINDS:?}"
            )));
        }

        let uuid = ids::generate();
        let source = ids::strip_prefix(source);
        let target = ids::strip_prefix(target);
        let today = time::current_day();
        let horizon = today + initial_horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS);
        let evidence_json = evidence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| to_storage_err(e.to_string()))?;
        let metadata_json = metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| to_storage_err(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO user_relation (
                    uuid, kind, source, source_type, target, target_type,
                    time_horizon, last_access_at, created_at, evidence, metadata
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    uuid,
                    kind,
                    source,
                    source_type.as_str(),
                    target,
                    target_type.as_str(),
                    horizon,
                    today,
                    today,
                    evidence_json,
                    metadata_json,
                ],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;

        Ok(uuid)
    }

    /// Fetch a relation by UUID (tagged or bare).
    pub fn get(&self, id: &str) -> GardenResult<UserRelation> {
        let id = ids::strip_prefix(id);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT uuid, kind, source, source_type, target, target_type,
                        time_horizon, last_access_at, created_at, evidence, metadata
                 FROM user_relation WHERE uuid = ?1",
            )
            .map_err(|e| to_storage_err(e.to_string()))?;

        let row = stmt
            .query_row(params![id], row_to_relation)
            .optional()
            .map_err(|e| to_storage_err(e.to_string()))?;

        match row {
            Some(relation) => relation,
            None => Err(MemoGardenError::not_found("UserRelation", id)),
        }
    }

    /// Record an access: extend the horizon by the elapsed days times
    /// the safety coefficient and stamp `last_access_at`. Returns the
    /// new horizon.
    pub fn update_time_horizon(&self, id: &str) -> GardenResult<i64> {
        let relation = self.get(id)?;
        let today = time::current_day();

        let elapsed = today - relation.last_access_at;
        let extension = (elapsed as f64 * SAFETY_COEFFICIENT).floor() as i64;
        let new_horizon = relation.time_horizon + extension;

        self.conn
            .execute(
                "UPDATE user_relation SET time_horizon = ?1, last_access_at = ?2 WHERE uuid = ?3",
                params![new_horizon, today, relation.uuid],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;

        Ok(new_horizon)
    }

    /// Inbound relations for a target, horizon descending.
    pub fn list_inbound(&self, target: &str, alive_only: bool) -> GardenResult<Vec<UserRelation>> {
        self.list_edges("target", target, alive_only)
    }

    /// Outbound relations from a source, horizon descending.
    pub fn list_outbound(&self, source: &str, alive_only: bool) -> GardenResult<Vec<UserRelation>> {
        self.list_edges("source", source, alive_only)
    }

    fn list_edges(
        &self,
        column: &str,
        uuid: &str,
        alive_only: bool,
    ) -> GardenResult<Vec<UserRelation>> {
        let uuid = ids::strip_prefix(uuid);
        let sql = if alive_only {
            format!(
                "SELECT uuid, kind, source, source_type, target, target_type,
                        time_horizon, last_access_at, created_at, evidence, metadata
                 FROM user_relation
                 WHERE {column} = ?1 AND time_horizon >= ?2
                 ORDER BY time_horizon DESC"
            )
        } else {
            format!(
                "SELECT uuid, kind, source, source_type, target, target_type,
                        time_horizon, last_access_at, created_at, evidence, metadata
                 FROM user_relation
                 WHERE {column} = ?1
                 ORDER BY time_horizon DESC"
            )
        };

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| to_storage_err(e.to_string()))?;

        let mut relations = Vec::new();
        if alive_only {
            let rows = stmt
                .query_map(params![uuid, time::current_day()], row_to_relation)
                .map_err(|e| to_storage_err(e.to_string()))?;
            for row in rows {
                relations.push(row.map_err(|e| to_storage_err(e.to_string()))??);
            }
        } else {
            let rows = stmt
                .query_map(params![uuid], row_to_relation)
                .map_err(|e| to_storage_err(e.to_string()))?;
            for row in rows {
                relations.push(row.map_err(|e| to_storage_err(e.to_string()))??);
            }
        }
        Ok(relations)
    }

    /// Push the horizon into the past so the fossilization sweep picks
    /// the relation up.
    pub fn expire(&self, id: &str) -> GardenResult<()> {
        let id = ids::strip_prefix(id);
        let yesterday = time::current_day() - 1;
        let rows = self
            .conn
            .execute(
                "UPDATE user_relation SET time_horizon = ?1 WHERE uuid = ?2",
                params![yesterday, id],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        if rows == 0 {
            return Err(MemoGardenError::not_found("UserRelation", id));
        }
        Ok(())
    }

    /// An object's significance: the max inbound horizon, or `None`
    /// when no user relation points at it (orphaned).
    pub fn fact_time_horizon(&self, target: &str) -> GardenResult<Option<i64>> {
        let target = ids::strip_prefix(target);
        let max: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(time_horizon) FROM user_relation WHERE target = ?1",
                params![target],
                |row| row.get(0),
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(max)
    }

    /// Whether the relation's horizon has not yet passed.
    pub fn is_alive(&self, id: &str) -> GardenResult<bool> {
        Ok(self.get(id)?.is_alive_on(time::current_day()))
    }
}

fn row_to_relation(
    row: &rusqlite::Row<'_>,
) -> Result<GardenResult<UserRelation>, rusqlite::Error> {
    let source_type_str: String = row.get(3)?;
    let target_type_str: String = row.get(5)?;
    let evidence_json: Option<String> = row.get(9)?;
    let metadata_json: Option<String> = row.get(10)?;

    let Some(source_type) = EndpointType::parse(&source_type_str) else {
        return Ok(Err(to_storage_err(format!(
            "unknown endpoint type '{source_type_str}'"
        ))));
    };
    let Some(target_type) = EndpointType::parse(&target_type_str) else {
        return Ok(Err(to_storage_err(format!(
            "unknown endpoint type '{target_type_str}'"
        ))));
    };
    let evidence: Option<Evidence> =
        match evidence_json.as_deref().map(serde_json::from_str).transpose() {
            Ok(value) => value,
            Err(e) => return Ok(Err(to_storage_err(format!("parse evidence: {e}")))),
        };
    let metadata = match metadata_json.as_deref().map(serde_json::from_str).transpose() {
        Ok(value) => value,
        Err(e) => return Ok(Err(to_storage_err(format!("parse metadata: {e}")))),
    };

    Ok(Ok(UserRelation {
        uuid: row.get(0)?,
        kind: row.get(1)?,
        source: row.get(2)?,
        source_type,
        target: row.get(4)?,
        target_type,
        time_horizon: row.get(6)?,
        last_access_at: row.get(7)?,
        created_at: row.get(8)?,
        evidence,
        metadata,
    }))
}
