//! # memogarden-soil
//!
//! The Fact store: durable, append-only storage of facts and structural
//! relations. Facts are created once and never rewritten; the only
//! permitted mutation is recording a supersession link to a newer fact.
//!
//! All operations live on [`SoilSession`], a scoped acquisition over an
//! explicit transaction. There is no way to write outside a session,
//! and a session that is dropped without [`SoilSession::commit`] rolls
//! back.

pub mod pragmas;
pub mod queries;
pub mod schema;

use std::path::Path;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use memogarden_core::errors::{GardenResult, MemoGardenError, StorageError};
use memogarden_core::models::{Evidence, Fact, RelationKind, SystemRelation};
use memogarden_core::time;

pub(crate) fn to_storage_err(message: impl Into<String>) -> MemoGardenError {
    StorageError::Sqlite {
        message: message.into(),
    }
    .into()
}

/// An open Soil database. Sessions are minted from this handle.
pub struct Soil {
    conn: Connection,
}

impl Soil {
    /// Open (and bootstrap if needed) the Soil database at a path.
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

    /// Open an in-memory Soil database (for testing).
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
    pub fn session(&mut self) -> GardenResult<SoilSession<'_>> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(SoilSession { tx })
    }

    /// Begin a session holding the database's EXCLUSIVE lock. Used by
    /// the cross-database coordinator, which acquires Soil before the
    /// registry.
    pub fn exclusive_session(&mut self) -> GardenResult<SoilSession<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Exclusive)
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(SoilSession { tx })
    }

    /// The stored schema version.
    pub fn schema_version(&self) -> GardenResult<Option<String>> {
        schema::schema_version(&self.conn)
    }
}

/// A scoped transaction over the Soil database.
pub struct SoilSession<'conn> {
    tx: Transaction<'conn>,
}

impl SoilSession<'_> {
    /// Commit everything written in this session.
    pub fn commit(self) -> GardenResult<()> {
        self.tx
            .commit()
            .map_err(|e| to_storage_err(format!("soil commit: {e}")))
    }

    /// Insert a fact; computes the integrity hash from `data` when
    /// absent. Returns the stored bare UUID.
    pub fn create_fact(&self, fact: &Fact) -> GardenResult<String> {
        queries::fact_ops::insert_fact(&self.tx, fact)
    }

    /// Fetch a fact by UUID (tagged or bare).
    pub fn get_fact(&self, uuid: &str) -> GardenResult<Option<Fact>> {
        queries::fact_ops::get_fact(&self.tx, uuid)
    }

    /// Record that `original` was superseded by `replacement` at `at`.
    pub fn mark_superseded(
        &self,
        original: &str,
        replacement: &str,
        at: &str,
    ) -> GardenResult<()> {
        queries::fact_ops::mark_superseded(&self.tx, original, replacement, at)
    }

    /// Indexed Email lookup by RFC Message-ID.
    pub fn find_fact_by_rfc_message_id(&self, message_id: &str) -> GardenResult<Option<Fact>> {
        queries::fact_ops::find_fact_by_rfc_message_id(&self.tx, message_id)
    }

    /// List facts newest first, optionally filtered by type.
    pub fn list_facts(&self, fact_type: Option<&str>, limit: usize) -> GardenResult<Vec<Fact>> {
        queries::fact_ops::list_facts(&self.tx, fact_type, limit)
    }

    /// Facts of one type with no supersession link, oldest first.
    pub fn list_active_facts_of_type(&self, fact_type: &str) -> GardenResult<Vec<Fact>> {
        queries::fact_ops::list_active_facts_of_type(&self.tx, fact_type)
    }

    /// Insert a relation; a `(kind, source, target)` collision returns
    /// the existing relation's UUID.
    pub fn create_relation(&self, relation: &SystemRelation) -> GardenResult<String> {
        queries::relation_ops::insert_relation(&self.tx, relation)
    }

    /// Create a `replies_to` relation for threading. Returns `None`
    /// when the parent fact is absent.
    pub fn create_replies_to(
        &self,
        reply: &str,
        parent: &str,
        evidence: Option<Evidence>,
    ) -> GardenResult<Option<String>> {
        if self.get_fact(parent)?.is_none() {
            return Ok(None);
        }
        let mut relation = SystemRelation::new(
            RelationKind::RepliesTo,
            reply,
            memogarden_core::models::EndpointType::Item,
            parent,
            memogarden_core::models::EndpointType::Item,
        );
        relation.evidence = evidence;
        self.create_relation(&relation).map(Some)
    }

    /// Fetch relations filtered by source and/or kind.
    pub fn get_relations(
        &self,
        source: Option<&str>,
        kind: Option<RelationKind>,
    ) -> GardenResult<Vec<SystemRelation>> {
        queries::relation_ops::get_relations(&self.tx, source, kind)
    }

    pub fn count_facts(&self, fact_type: Option<&str>) -> GardenResult<usize> {
        queries::fact_ops::count_facts(&self.tx, fact_type)
    }

    pub fn count_relations(&self, kind: Option<RelationKind>) -> GardenResult<usize> {
        queries::relation_ops::count_relations(&self.tx, kind)
    }

    /// Convenience: supersede `original` with `replacement` as of now.
    pub fn supersede_fact(&self, original: &str, replacement: &str) -> GardenResult<()> {
        self.mark_superseded(original, replacement, &time::now_iso())
    }
}
