/// Storage-layer errors for SQLite operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("migration failed from version {from}: {reason}")]
    Migration { from: String, reason: String },

    #[error("I/O error: {message}")]
    Io { message: String },
}
