//! Structural relations: idempotent insert and filtered lookup.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use memogarden_core::errors::GardenResult;
use memogarden_core::ids;
use memogarden_core::models::{EndpointType, RelationKind, SystemRelation};

use crate::to_storage_err;

/// Insert a relation. A `(kind, source, target)` collision returns the
/// existing relation's UUID without raising.
pub fn insert_relation(conn: &Connection, relation: &SystemRelation) -> GardenResult<String> {
    let uuid = ids::strip_prefix(&relation.uuid).to_string();
    let source = ids::strip_prefix(&relation.source).to_string();
    let target = ids::strip_prefix(&relation.target).to_string();
    let evidence_json = relation
        .evidence
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| to_storage_err(e.to_string()))?;
    let metadata_json = relation
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| to_storage_err(e.to_string()))?;

    let inserted = conn.execute(
        "INSERT INTO system_relation (
            uuid, kind, source, source_type, target, target_type,
            created_at, evidence, metadata
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            uuid,
            relation.kind.as_str(),
            source,
            relation.source_type.as_str(),
            target,
            relation.target_type.as_str(),
            relation.created_at,
            evidence_json,
            metadata_json,
        ],
    );

    match inserted {
        Ok(_) => Ok(uuid),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT uuid FROM system_relation
                     WHERE kind = ?1 AND source = ?2 AND target = ?3",
                    params![relation.kind.as_str(), source, target],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| to_storage_err(err.to_string()))?;
            Ok(existing.unwrap_or(uuid))
        }
        Err(e) => Err(to_storage_err(e.to_string())),
    }
}

/// Fetch relations filtered by source and/or kind, newest first.
pub fn get_relations(
    conn: &Connection,
    source: Option<&str>,
    kind: Option<RelationKind>,
) -> GardenResult<Vec<SystemRelation>> {
    let mut sql = String::from(
        "SELECT uuid, kind, source, source_type, target, target_type,
                created_at, evidence, metadata
         FROM system_relation WHERE 1=1",
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    let source = source.map(|s| ids::strip_prefix(s).to_string());
    if let Some(source) = source {
        sql.push_str(" AND source = ?");
        params.push(Box::new(source));
    }
    if let Some(kind) = kind {
        sql.push_str(" AND kind = ?");
        params.push(Box::new(kind.as_str().to_string()));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql).map_err(|e| to_storage_err(e.to_string()))?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(&param_refs[..], row_to_relation)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut relations = Vec::new();
    for row in rows {
        relations.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(relations)
}

/// Count relations, optionally filtered by kind.
pub fn count_relations(conn: &Connection, kind: Option<RelationKind>) -> GardenResult<usize> {
    let count: i64 = match kind {
        Some(kind) => conn
            .query_row(
                "SELECT COUNT(*) FROM system_relation WHERE kind = ?1",
                params![kind.as_str()],
                |r| r.get(0),
            )
            .map_err(|e| to_storage_err(e.to_string()))?,
        None => conn
            .query_row("SELECT COUNT(*) FROM system_relation", [], |r| r.get(0))
            .map_err(|e| to_storage_err(e.to_string()))?,
    };
    Ok(count as usize)
}

fn row_to_relation(
    row: &rusqlite::Row<'_>,
) -> Result<GardenResult<SystemRelation>, rusqlite::Error> {
    let kind_str: String = row.get(1)?;
    let source_type_str: String = row.get(3)?;
    let target_type_str: String = row.get(5)?;
    let evidence_json: Option<String> = row.get(7)?;
    let metadata_json: Option<String> = row.get(8)?;

    let Some(kind) = RelationKind::parse(&kind_str) else {
        return Ok(Err(to_storage_err(format!(
            "unknown relation kind '{kind_str}'"
        ))));
    };
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
    let evidence = match evidence_json.as_deref().map(serde_json::from_str).transpose() {
        Ok(v) => v,
        Err(e) => return Ok(Err(to_storage_err(format!("parse evidence: {e}")))),
    };
    let metadata = match metadata_json.as_deref().map(serde_json::from_str).transpose() {
        Ok(v) => v,
        Err(e) => return Ok(Err(to_storage_err(format!("parse metadata: {e}")))),
    };

    Ok(Ok(SystemRelation {
        uuid: row.get(0)?,
        kind,
        source: row.get(2)?,
        source_type,
        target: row.get(4)?,
        target_type,
        created_at: row.get(6)?,
        evidence,
        metadata,
    }))
}
