//! Schema bootstrap and the point-migration runner for the registry
//! database.

use rusqlite::Connection;

use memogarden_core::config::runtime::Layer;
use memogarden_core::constants::SCHEMA_VERSION;
use memogarden_core::errors::{GardenResult, StorageError};
use memogarden_core::schemas::get_sql_schema;

use crate::to_storage_err;

/// A point migration between two adjacent schema versions. Bundled
/// scripts follow the `migrate_<from>_to_<to>.sql` naming.
struct Migration {
    from: &'static str,
    to: &'static str,
    sql: &'static str,
}

/// Declared migration chain, applied in order. The current schema is the
/// first shipped version, so the chain is empty.
const MIGRATIONS: &[Migration] = &[];

/// Ensure the database carries the current schema. Fresh databases run
/// the bundled schema; older ones walk the migration chain; newer ones
/// are readable as-is.
pub fn ensure_schema(conn: &Connection) -> GardenResult<()> {
    if !has_schema_metadata(conn)? {
        conn.execute_batch(get_sql_schema(Layer::Core))
            .map_err(|e| to_storage_err(format!("registry schema bootstrap: {e}")))?;
        tracing::info!(version = SCHEMA_VERSION, "initialized registry schema");
        return Ok(());
    }

    let version = schema_version(conn)?.ok_or_else(|| StorageError::Migration {
        from: "unknown".to_string(),
        reason: "_schema_metadata has no version row".to_string(),
    })?;

    if version.as_str() < SCHEMA_VERSION {
        run_migrations(conn, &version)
    } else {
        if version.as_str() > SCHEMA_VERSION {
            tracing::info!(
                on_disk = %version,
                current = SCHEMA_VERSION,
                "registry database is newer than this build; proceeding read-compatible"
            );
        }
        Ok(())
    }
}

/// Read the stored schema version, if any.
pub fn schema_version(conn: &Connection) -> GardenResult<Option<String>> {
    let mut stmt = conn
        .prepare("SELECT value FROM _schema_metadata WHERE key = 'version'")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut rows = stmt.query([]).map_err(|e| to_storage_err(e.to_string()))?;
    match rows.next().map_err(|e| to_storage_err(e.to_string()))? {
        Some(row) => Ok(Some(
            row.get::<_, String>(0)
                .map_err(|e| to_storage_err(e.to_string()))?,
        )),
        None => Ok(None),
    }
}

fn has_schema_metadata(conn: &Connection) -> GardenResult<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_schema_metadata'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(count > 0)
}

fn run_migrations(conn: &Connection, from: &str) -> GardenResult<()> {
    let mut current = from.to_string();
    while current != SCHEMA_VERSION {
        let Some(step) = MIGRATIONS.iter().find(|m| m.from == current) else {
            return Err(StorageError::Migration {
                from: current,
                reason: format!("no declared migration path to {SCHEMA_VERSION}"),
            }
            .into());
        };
        conn.execute_batch(step.sql)
            .map_err(|e| to_storage_err(format!("migrate {} to {}: {e}", step.from, step.to)))?;
        conn.execute(
            "INSERT OR REPLACE INTO _schema_metadata (key, value) VALUES ('version', ?1)",
            [step.to],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        tracing::info!(from = step.from, to = step.to, "applied registry migration");
        current = step.to.to_string();
    }
    Ok(())
}
