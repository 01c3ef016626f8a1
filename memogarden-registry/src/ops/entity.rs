//! Entity registry operations with hash-based change tracking.
//!
//! Entity IDs are always auto-generated: callers never supply one, which
//! keeps UUID format and collision handling inside the storage layer.
//! Every mutation advances the metadata hash chain and bumps `version`.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use memogarden_core::constants::UUID_COLLISION_RETRIES;
use memogarden_core::errors::{GardenResult, MemoGardenError};
use memogarden_core::hash_chain::{self, EntityState};
use memogarden_core::models::{BrokenChain, EntityRecord};
use memogarden_core::{ids, time};

use crate::to_storage_err;

/// How much of an entity `search` scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCoverage {
    /// Type labels only.
    Names,
    /// Serialized payloads only.
    Content,
    /// Both.
    Full,
}

/// Entity registry operations, borrowed from a session.
pub struct EntityOps<'s> {
    conn: &'s Connection,
}

impl<'s> EntityOps<'s> {
    pub(crate) fn new(conn: &'s Connection) -> Self {
        Self { conn }
    }

    /// Create an entity with an auto-generated UUID and initial hash.
    /// Returns the bare UUID.
    pub fn create(
        &self,
        entity_type: &str,
        group_id: Option<&str>,
        derived_from: Option<&str>,
        data: Option<serde_json::Value>,
    ) -> GardenResult<String> {
        let data_json = match &data {
            Some(value) => {
                serde_json::to_string(value).map_err(|e| to_storage_err(e.to_string()))?
            }
            None => "{}".to_string(),
        };

        for attempt in 0..UUID_COLLISION_RETRIES {
            let uuid = ids::generate();
            let now = time::now_iso();
            let initial_hash = hash_chain::compute_entity_hash(
                &EntityState {
                    entity_type,
                    created_at: &now,
                    updated_at: &now,
                    group_id,
                    derived_from,
                    superseded_by: None,
                    superseded_at: None,
                },
                None,
            );

            let inserted = self.conn.execute(
                "INSERT INTO entity (
                    uuid, type, hash, previous_hash, version, group_id,
                    derived_from, created_at, updated_at, data
                ) VALUES (?1, ?2, ?3, NULL, 1, ?4, ?5, ?6, ?7, ?8)",
                params![
                    uuid,
                    entity_type,
                    initial_hash,
                    group_id,
                    derived_from,
                    now,
                    now,
                    data_json,
                ],
            );

            match inserted {
                Ok(_) => return Ok(uuid),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation
                        && attempt + 1 < UUID_COLLISION_RETRIES =>
                {
                    // UUID collision: retry with a fresh one.
                    continue;
                }
                Err(e) => return Err(to_storage_err(e.to_string())),
            }
        }

        Err(to_storage_err(format!(
            "failed to mint a unique UUID after {UUID_COLLISION_RETRIES} attempts"
        )))
    }

    /// Fetch an entity by UUID (tagged or bare).
    pub fn get(&self, id: &str) -> GardenResult<EntityRecord> {
        let id = ids::strip_prefix(id);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT uuid, type, hash, previous_hash, version, group_id,
                        derived_from, created_at, updated_at, superseded_by,
                        superseded_at, data
                 FROM entity WHERE uuid = ?1",
            )
            .map_err(|e| to_storage_err(e.to_string()))?;

        let row = stmt
            .query_row(params![id], row_to_entity)
            .optional()
            .map_err(|e| to_storage_err(e.to_string()))?;

        match row {
            Some(record) => record,
            None => Err(MemoGardenError::not_found("Entity", id)),
        }
    }

    /// Fetch an entity expected to be of a given type; the label names
    /// the resource in the not-found error.
    pub fn get_as(&self, id: &str, type_label: &str) -> GardenResult<EntityRecord> {
        self.get(id).map_err(|e| match e {
            MemoGardenError::NotFound { id, .. } => MemoGardenError::NotFound {
                kind: type_label.to_string(),
                id,
            },
            other => other,
        })
    }

    /// Whether an entity row exists.
    pub fn exists(&self, id: &str) -> GardenResult<bool> {
        let id = ids::strip_prefix(id);
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM entity WHERE uuid = ?1", params![id], |r| {
                r.get(0)
            })
            .optional()
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Rewrite the payload, then advance the hash chain. Returns the new
    /// hash.
    pub fn update_data(&self, id: &str, new_data: serde_json::Value) -> GardenResult<String> {
        let id = ids::strip_prefix(id).to_string();
        let data_json =
            serde_json::to_string(&new_data).map_err(|e| to_storage_err(e.to_string()))?;

        let rows = self
            .conn
            .execute(
                "UPDATE entity SET data = ?1 WHERE uuid = ?2",
                params![data_json, id],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        if rows == 0 {
            return Err(MemoGardenError::not_found("Entity", id));
        }

        self.update_hash(&id)
    }

    /// Rewrite the payload only when the caller's hash still matches.
    pub fn update_data_guarded(
        &self,
        id: &str,
        new_data: serde_json::Value,
        based_on_hash: &str,
    ) -> GardenResult<String> {
        let current = self.current_hash(id)?;
        if current != based_on_hash {
            return Err(MemoGardenError::OptimisticLock {
                entity_uuid: ids::strip_prefix(id).to_string(),
                expected_hash: based_on_hash.to_string(),
                actual_hash: current,
            });
        }
        self.update_data(id, new_data)
    }

    /// Advance the hash chain after a payload change: the new hash binds
    /// `previous_hash` to the hash being replaced, `version` increments,
    /// `updated_at` is stamped. Returns the new hash.
    pub fn update_hash(&self, id: &str) -> GardenResult<String> {
        let id = ids::strip_prefix(id).to_string();
        let current = self.get(&id)?;
        let now = time::now_iso();

        let new_hash = hash_chain::compute_next_hash(
            &EntityState {
                entity_type: &current.entity_type,
                created_at: &current.created_at,
                updated_at: &now,
                group_id: current.group_id.as_deref(),
                derived_from: current.derived_from.as_deref(),
                superseded_by: current.superseded_by.as_deref(),
                superseded_at: current.superseded_at.as_deref(),
            },
            &current.hash,
        );

        self.conn
            .execute(
                "UPDATE entity
                 SET hash = ?1, previous_hash = ?2, version = version + 1, updated_at = ?3
                 WHERE uuid = ?4",
                params![new_hash, current.hash, now, id],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;

        Ok(new_hash)
    }

    /// Mark `old` as superseded by `new`. A supersession is a mutation:
    /// the chain rolls forward and `version` increments.
    pub fn supersede(&self, old: &str, new: &str) -> GardenResult<()> {
        let old = ids::strip_prefix(old).to_string();
        let new = ids::strip_prefix(new).to_string();
        let current = self.get(&old)?;
        let now = time::now_iso();

        let new_hash = hash_chain::compute_next_hash(
            &EntityState {
                entity_type: &current.entity_type,
                created_at: &current.created_at,
                updated_at: &now,
                group_id: current.group_id.as_deref(),
                derived_from: current.derived_from.as_deref(),
                superseded_by: Some(&new),
                superseded_at: Some(&now),
            },
            &current.hash,
        );

        self.conn
            .execute(
                "UPDATE entity
                 SET superseded_by = ?1, superseded_at = ?2, updated_at = ?2,
                     hash = ?3, previous_hash = ?4, version = version + 1
                 WHERE uuid = ?5",
                params![new, now, new_hash, current.hash, old],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(())
    }

    /// The entity's current chain head.
    pub fn current_hash(&self, id: &str) -> GardenResult<String> {
        let id = ids::strip_prefix(id);
        let hash: Option<String> = self
            .conn
            .query_row(
                "SELECT hash FROM entity WHERE uuid = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| to_storage_err(e.to_string()))?;
        hash.ok_or_else(|| MemoGardenError::not_found("Entity", id))
    }

    /// Whether the caller's expected hash no longer matches.
    pub fn check_conflict(&self, id: &str, expected_hash: &str) -> GardenResult<bool> {
        Ok(self.current_hash(id)? != expected_hash)
    }

    /// Paginated listing, newest first by `created_at`. Returns the page
    /// and the total row count under the same filter.
    pub fn query_with_filters(
        &self,
        entity_type: Option<&str>,
        include_superseded: bool,
        limit: usize,
        offset: usize,
    ) -> GardenResult<(Vec<EntityRecord>, usize)> {
        let mut where_clause = String::from("1=1");
        let mut filter_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(entity_type) = entity_type {
            where_clause.push_str(" AND type = ?");
            filter_params.push(Box::new(entity_type.to_string()));
        }
        if !include_superseded {
            where_clause.push_str(" AND superseded_by IS NULL");
        }

        let count_sql = format!("SELECT COUNT(*) FROM entity WHERE {where_clause}");
        let count_refs: Vec<&dyn rusqlite::ToSql> =
            filter_params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = self
            .conn
            .query_row(&count_sql, &count_refs[..], |row| row.get(0))
            .map_err(|e| to_storage_err(e.to_string()))?;

        let page_sql = format!(
            "SELECT uuid, type, hash, previous_hash, version, group_id,
                    derived_from, created_at, updated_at, superseded_by,
                    superseded_at, data
             FROM entity WHERE {where_clause}
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?"
        );
        let mut page_params = filter_params;
        page_params.push(Box::new(limit as i64));
        page_params.push(Box::new(offset as i64));
        let page_refs: Vec<&dyn rusqlite::ToSql> =
            page_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self
            .conn
            .prepare(&page_sql)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let rows = stmt
            .query_map(&page_refs[..], row_to_entity)
            .map_err(|e| to_storage_err(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| to_storage_err(e.to_string()))??);
        }
        Ok((records, total as usize))
    }

    /// Audit the hash chain: recompute every row's head from its stored
    /// chain fields and report rows whose stored `hash` disagrees, plus
    /// rows claiming a predecessor at version 1.
    pub fn find_broken_chain_links(&self) -> GardenResult<Vec<BrokenChain>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT uuid, type, hash, previous_hash, version, group_id,
                        derived_from, created_at, updated_at, superseded_by,
                        superseded_at, data
                 FROM entity",
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        let rows = stmt
            .query_map([], row_to_entity)
            .map_err(|e| to_storage_err(e.to_string()))?;

        let mut broken = Vec::new();
        for row in rows {
            let entity = row.map_err(|e| to_storage_err(e.to_string()))??;

            if entity.version == 1 && entity.previous_hash.is_some() {
                broken.push(BrokenChain {
                    uuid: entity.uuid,
                    previous_hash: entity.previous_hash.unwrap_or_default(),
                    issue: "initial version claims a predecessor".to_string(),
                });
                continue;
            }

            let expected = hash_chain::compute_entity_hash(
                &EntityState {
                    entity_type: &entity.entity_type,
                    created_at: &entity.created_at,
                    updated_at: &entity.updated_at,
                    group_id: entity.group_id.as_deref(),
                    derived_from: entity.derived_from.as_deref(),
                    superseded_by: entity.superseded_by.as_deref(),
                    superseded_at: entity.superseded_at.as_deref(),
                },
                entity.previous_hash.as_deref(),
            );
            if expected != entity.hash {
                broken.push(BrokenChain {
                    uuid: entity.uuid,
                    previous_hash: entity.previous_hash.unwrap_or_default(),
                    issue: "stored hash does not match the recomputed chain head".to_string(),
                });
            }
        }
        Ok(broken)
    }

    /// Case-insensitive substring search over active rows, newest
    /// activity first.
    pub fn search(
        &self,
        query: &str,
        coverage: SearchCoverage,
        limit: usize,
    ) -> GardenResult<Vec<EntityRecord>> {
        let needle = format!("%{}%", query.to_lowercase());
        let clause = match coverage {
            SearchCoverage::Names => "LOWER(type) LIKE ?1",
            SearchCoverage::Content => "LOWER(data) LIKE ?1",
            SearchCoverage::Full => "(LOWER(type) LIKE ?1 OR LOWER(data) LIKE ?1)",
        };
        let sql = format!(
            "SELECT uuid, type, hash, previous_hash, version, group_id,
                    derived_from, created_at, updated_at, superseded_by,
                    superseded_at, data
             FROM entity
             WHERE superseded_by IS NULL AND {clause}
             ORDER BY updated_at DESC, rowid DESC
             LIMIT ?2"
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let rows = stmt
            .query_map(params![needle, limit as i64], row_to_entity)
            .map_err(|e| to_storage_err(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| to_storage_err(e.to_string()))??);
        }
        Ok(records)
    }
}

/// Parse a row from the entity table.
pub(crate) fn row_to_entity(
    row: &rusqlite::Row<'_>,
) -> Result<GardenResult<EntityRecord>, rusqlite::Error> {
    let data_json: String = row.get(11)?;
    let data = match serde_json::from_str(&data_json) {
        Ok(value) => value,
        Err(e) => return Ok(Err(to_storage_err(format!("parse entity data: {e}")))),
    };

    Ok(Ok(EntityRecord {
        uuid: row.get(0)?,
        entity_type: row.get(1)?,
        hash: row.get(2)?,
        previous_hash: row.get(3)?,
        version: row.get(4)?,
        group_id: row.get(5)?,
        derived_from: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        superseded_by: row.get(9)?,
        superseded_at: row.get(10)?,
        data,
    }))
}
