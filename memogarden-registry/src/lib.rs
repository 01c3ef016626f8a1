//! # memogarden-registry
//!
//! The entity registry (the working-state layer): typed, versioned
//! entities with an auditable metadata hash chain, plus the operation
//! groups that live on top of the entity table: the engagement index,
//! context frames and the view stream, artifact queries, and
//! conversation folds.
//!
//! All operations live on [`RegistrySession`], a scoped acquisition over
//! an explicit transaction. The session exposes one accessor per
//! operation group; each group borrows the session's transaction, so
//! nothing can run outside the scope.

pub mod delta;
pub mod ops;
pub mod pragmas;
pub mod schema;

use std::path::Path;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use memogarden_core::errors::{GardenResult, MemoGardenError, StorageError};

pub use ops::artifact::{ArtifactDiff, ArtifactOps, ArtifactState};
pub use ops::context::ContextOps;
pub use ops::conversation::{ConversationOps, FoldResult};
pub use ops::engagement::EngagementOps;
pub use ops::entity::{EntityOps, SearchCoverage};
pub use ops::recurrence::RecurrenceOps;
pub use ops::transaction::{TransactionFilters, TransactionOps, TransactionPatch};

pub(crate) fn to_storage_err(message: impl Into<String>) -> MemoGardenError {
    StorageError::Sqlite {
        message: message.into(),
    }
    .into()
}

/// An open registry database. Sessions are minted from this handle.
pub struct Registry {
    conn: Connection,
}

impl Registry {
    /// Open (and bootstrap if needed) the registry database at a path.
    pub fn open(path: &Path) -> GardenResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoGardenError::Storage(StorageError::Io {
                    message: format!("create {}: {e}", parent.display()),
                })
            })?;
        }
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        Self::initialize(conn)
    }

    /// Open an in-memory registry database (for testing).
    pub fn open_in_memory() -> GardenResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> GardenResult<Self> {
        pragmas::apply_pragmas(&conn)?;
        schema::ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Begin a session with a deferred transaction.
    pub fn session(&mut self) -> GardenResult<RegistrySession<'_>> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(RegistrySession { tx })
    }

    /// Begin a session holding the database's EXCLUSIVE lock. The
    /// cross-database coordinator acquires this after Soil's.
    pub fn exclusive_session(&mut self) -> GardenResult<RegistrySession<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Exclusive)
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(RegistrySession { tx })
    }

    /// The stored schema version.
    pub fn schema_version(&self) -> GardenResult<Option<String>> {
        schema::schema_version(&self.conn)
    }
}

/// A scoped transaction over the registry database.
pub struct RegistrySession<'conn> {
    tx: Transaction<'conn>,
}

impl RegistrySession<'_> {
    /// Commit everything written in this session.
    pub fn commit(self) -> GardenResult<()> {
        self.tx
            .commit()
            .map_err(|e| to_storage_err(format!("registry commit: {e}")))
    }

    /// Entity registry operations.
    pub fn entities(&self) -> EntityOps<'_> {
        EntityOps::new(&self.tx)
    }

    /// Engagement-index operations (user relations, time horizons).
    pub fn engagement(&self) -> EngagementOps<'_> {
        EngagementOps::new(&self.tx)
    }

    /// Context frame and view-stream operations.
    pub fn context(&self) -> ContextOps<'_> {
        ContextOps::new(&self.tx)
    }

    /// Artifact queries over the entity table.
    pub fn artifacts(&self) -> ArtifactOps<'_> {
        ArtifactOps::new(&self.tx)
    }

    /// Conversation-log operations.
    pub fn conversations(&self) -> ConversationOps<'_> {
        ConversationOps::new(&self.tx)
    }

    /// Ledger-transaction operations.
    pub fn transactions(&self) -> TransactionOps<'_> {
        TransactionOps::new(&self.tx)
    }

    /// Recurrence operations.
    pub fn recurrences(&self) -> RecurrenceOps<'_> {
        RecurrenceOps::new(&self.tx)
    }
}
