//! PRAGMA configuration applied to every registry connection.

use rusqlite::Connection;

use memogarden_core::errors::GardenResult;

use crate::to_storage_err;

/// Apply the safety and concurrency pragmas to a connection.
pub fn apply_pragmas(conn: &Connection) -> GardenResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
