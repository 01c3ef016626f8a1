//! Insert, lookup, list, count, and supersession for facts.

use rusqlite::{params, Connection, OptionalExtension};

use memogarden_core::errors::{GardenResult, MemoGardenError};
use memogarden_core::ids;
use memogarden_core::models::{Fact, Fidelity};

use crate::to_storage_err;

/// Insert a fact, computing its integrity hash when absent. Returns the
/// stored bare UUID.
pub fn insert_fact(conn: &Connection, fact: &Fact) -> GardenResult<String> {
    let uuid = ids::strip_prefix(&fact.uuid).to_string();
    let integrity_hash = match &fact.integrity_hash {
        Some(hash) => hash.clone(),
        None => fact.compute_integrity_hash(),
    };
    let data_json =
        serde_json::to_string(&fact.data).map_err(|e| to_storage_err(e.to_string()))?;
    let metadata_json = fact
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| to_storage_err(e.to_string()))?;

    conn.execute(
        "INSERT INTO fact (
            uuid, _type, realized_at, canonical_at, integrity_hash,
            fidelity, superseded_by, superseded_at, data, metadata
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            uuid,
            fact.fact_type,
            fact.realized_at,
            fact.canonical_at,
            integrity_hash,
            fact.fidelity.as_str(),
            fact.superseded_by.as_deref().map(ids::strip_prefix),
            fact.superseded_at,
            data_json,
            metadata_json,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    Ok(uuid)
}

/// Fetch a fact by UUID, with or without the `soil_` tag.
pub fn get_fact(conn: &Connection, uuid: &str) -> GardenResult<Option<Fact>> {
    let uuid = ids::strip_prefix(uuid);
    let mut stmt = conn
        .prepare(
            "SELECT uuid, _type, realized_at, canonical_at, integrity_hash,
                    fidelity, superseded_by, superseded_at, data, metadata
             FROM fact WHERE uuid = ?1",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let row = stmt
        .query_row(params![uuid], row_to_fact)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    row.transpose()
}

/// Record a supersession link. Idempotent only when re-setting equal
/// values; a diverging re-supersession is refused.
pub fn mark_superseded(
    conn: &Connection,
    original: &str,
    replacement: &str,
    at: &str,
) -> GardenResult<()> {
    let original = ids::strip_prefix(original).to_string();
    let replacement = ids::strip_prefix(replacement).to_string();

    let existing: Option<(Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT superseded_by, superseded_at FROM fact WHERE uuid = ?1",
            params![original],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    let Some((current_by, current_at)) = existing else {
        return Err(MemoGardenError::not_found("Fact", original));
    };

    if let Some(current_by) = current_by {
        if current_by == replacement && current_at.as_deref() == Some(at) {
            return Ok(());
        }
        return Err(MemoGardenError::validation(format!(
            "fact '{original}' is already superseded by '{current_by}'"
        )));
    }

    conn.execute(
        "UPDATE fact SET superseded_by = ?1, superseded_at = ?2 WHERE uuid = ?3",
        params![replacement, at, original],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Indexed lookup of an Email fact by RFC Message-ID. The first
/// realized fact wins when duplicates exist.
pub fn find_fact_by_rfc_message_id(
    conn: &Connection,
    message_id: &str,
) -> GardenResult<Option<Fact>> {
    let mut stmt = conn
        .prepare(
            "SELECT uuid, _type, realized_at, canonical_at, integrity_hash,
                    fidelity, superseded_by, superseded_at, data, metadata
             FROM fact
             WHERE _type = 'Email'
               AND json_extract(data, '$.rfc_message_id') = ?1
             ORDER BY realized_at ASC, rowid ASC
             LIMIT 1",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let row = stmt
        .query_row(params![message_id], row_to_fact)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    row.transpose()
}

/// List facts newest first, optionally filtered by type.
pub fn list_facts(
    conn: &Connection,
    fact_type: Option<&str>,
    limit: usize,
) -> GardenResult<Vec<Fact>> {
    let limit = limit as i64;
    let (sql, params): (&str, Vec<&dyn rusqlite::ToSql>) = match &fact_type {
        Some(t) => (
            "SELECT uuid, _type, realized_at, canonical_at, integrity_hash,
                    fidelity, superseded_by, superseded_at, data, metadata
             FROM fact WHERE _type = ?1
             ORDER BY realized_at DESC LIMIT ?2",
            vec![t as &dyn rusqlite::ToSql, &limit],
        ),
        None => (
            "SELECT uuid, _type, realized_at, canonical_at, integrity_hash,
                    fidelity, superseded_by, superseded_at, data, metadata
             FROM fact ORDER BY realized_at DESC LIMIT ?1",
            vec![&limit as &dyn rusqlite::ToSql],
        ),
    };

    let mut stmt = conn.prepare(sql).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(&params[..], row_to_fact)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut facts = Vec::new();
    for row in rows {
        facts.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(facts)
}

/// Count facts, optionally filtered by type.
pub fn count_facts(conn: &Connection, fact_type: Option<&str>) -> GardenResult<usize> {
    let count: i64 = match fact_type {
        Some(t) => conn
            .query_row("SELECT COUNT(*) FROM fact WHERE _type = ?1", params![t], |r| {
                r.get(0)
            })
            .map_err(|e| to_storage_err(e.to_string()))?,
        None => conn
            .query_row("SELECT COUNT(*) FROM fact", [], |r| r.get(0))
            .map_err(|e| to_storage_err(e.to_string()))?,
    };
    Ok(count as usize)
}

/// List facts of a type with no supersession link, oldest first. Used by
/// the startup audit to enumerate live `EntityDelta` facts.
pub fn list_active_facts_of_type(
    conn: &Connection,
    fact_type: &str,
) -> GardenResult<Vec<Fact>> {
    let mut stmt = conn
        .prepare(
            "SELECT uuid, _type, realized_at, canonical_at, integrity_hash,
                    fidelity, superseded_by, superseded_at, data, metadata
             FROM fact
             WHERE _type = ?1 AND superseded_by IS NULL
             ORDER BY realized_at ASC",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![fact_type], row_to_fact)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut facts = Vec::new();
    for row in rows {
        facts.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(facts)
}

/// Parse a row from the fact table.
fn row_to_fact(row: &rusqlite::Row<'_>) -> Result<GardenResult<Fact>, rusqlite::Error> {
    let fidelity_str: String = row.get(5)?;
    let data_json: String = row.get(8)?;
    let metadata_json: Option<String> = row.get(9)?;

    let fidelity = match Fidelity::parse(&fidelity_str) {
        Some(f) => f,
        None => {
            return Ok(Err(to_storage_err(format!(
                "unknown fidelity '{fidelity_str}'"
            ))))
        }
    };
    let data = match serde_json::from_str(&data_json) {
        Ok(v) => v,
        Err(e) => return Ok(Err(to_storage_err(format!("parse fact data: {e}")))),
    };
    let metadata = match metadata_json.as_deref().map(serde_json::from_str).transpose() {
        Ok(v) => v,
        Err(e) => return Ok(Err(to_storage_err(format!("parse fact metadata: {e}")))),
    };

    Ok(Ok(Fact {
        uuid: row.get(0)?,
        fact_type: row.get(1)?,
        realized_at: row.get(2)?,
        canonical_at: row.get(3)?,
        integrity_hash: Some(row.get(4)?),
        fidelity,
        superseded_by: row.get(6)?,
        superseded_at: row.get(7)?,
        data,
        metadata,
    }))
}
