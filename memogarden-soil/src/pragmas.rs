//! PRAGMA configuration applied to every Soil connection.
//!
//! WAL mode so readers never block the writer, NORMAL sync, 5s
//! busy_timeout, foreign_keys ON.

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

/// Verify that WAL mode is active on a connection. In-memory databases
/// report `memory` and are exempt.
pub fn verify_wal_mode(conn: &Connection) -> GardenResult<bool> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(mode.eq_ignore_ascii_case("wal") || mode.eq_ignore_ascii_case("memory"))
}
