//! Ledger transactions as typed entities.
//!
//! A transaction is an entity of type `Transaction`; its ledger fields
//! live in the JSON payload and are filtered with `json_extract`. Every
//! mutation goes through the entity chain.

use rusqlite::Connection;

use memogarden_core::errors::GardenResult;
use memogarden_core::models::{EntityRecord, TransactionData};

use super::entity::{row_to_entity, EntityOps};
use crate::to_storage_err;

/// Filters for listing transactions. `None` fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilters {
    /// Inclusive ISO date lower bound.
    pub start_date: Option<String>,
    /// Inclusive ISO date upper bound.
    pub end_date: Option<String>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub include_superseded: bool,
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub amount: Option<f64>,
    pub transaction_date: Option<String>,
    pub description: Option<String>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

/// Transaction operations, borrowed from a session.
pub struct TransactionOps<'s> {
    conn: &'s Connection,
}

impl<'s> TransactionOps<'s> {
    pub(crate) fn new(conn: &'s Connection) -> Self {
        Self { conn }
    }

    fn entities(&self) -> EntityOps<'s> {
        EntityOps::new(self.conn)
    }

    /// Create a transaction entity. Returns the bare UUID.
    pub fn create(&self, data: &TransactionData) -> GardenResult<String> {
        let payload = serde_json::to_value(data).map_err(|e| to_storage_err(e.to_string()))?;
        self.entities().create("Transaction", None, None, Some(payload))
    }

    /// Fetch a transaction and its ledger fields.
    pub fn get(&self, id: &str) -> GardenResult<(EntityRecord, TransactionData)> {
        let entity = self.entities().get_as(id, "Transaction")?;
        let data: TransactionData = entity.payload()?;
        Ok((entity, data))
    }

    /// List transactions, most recent ledger date first.
    pub fn list(
        &self,
        filters: &TransactionFilters,
        limit: usize,
        offset: usize,
    ) -> GardenResult<Vec<(EntityRecord, TransactionData)>> {
        let mut where_clause = String::from("type = 'Transaction'");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(start_date) = &filters.start_date {
            where_clause.push_str(" AND json_extract(data, '$.transaction_date') >= ?");
            params.push(Box::new(start_date.clone()));
        }
        if let Some(end_date) = &filters.end_date {
            where_clause.push_str(" AND json_extract(data, '$.transaction_date') <= ?");
            params.push(Box::new(end_date.clone()));
        }
        if let Some(account) = &filters.account {
            where_clause.push_str(" AND json_extract(data, '$.account') = ?");
            params.push(Box::new(account.clone()));
        }
        if let Some(category) = &filters.category {
            where_clause.push_str(" AND json_extract(data, '$.category') = ?");
            params.push(Box::new(category.clone()));
        }
        if !filters.include_superseded {
            where_clause.push_str(" AND superseded_by IS NULL");
        }

        let sql = format!(
            "SELECT uuid, type, hash, previous_hash, version, group_id,
                    derived_from, created_at, updated_at, superseded_by,
                    superseded_at, data
             FROM entity WHERE {where_clause}
             ORDER BY json_extract(data, '$.transaction_date') DESC, created_at DESC
             LIMIT ? OFFSET ?"
        );
        params.push(Box::new(limit as i64));
        params.push(Box::new(offset as i64));
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let rows = stmt
            .query_map(&param_refs[..], row_to_entity)
            .map_err(|e| to_storage_err(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            let entity = row.map_err(|e| to_storage_err(e.to_string()))??;
            let data: TransactionData = entity.payload()?;
            results.push((entity, data));
        }
        Ok(results)
    }

    /// Apply a partial update and advance the chain. Returns the new
    /// chain head.
    pub fn update(&self, id: &str, patch: &TransactionPatch) -> GardenResult<String> {
        let (entity, mut data) = self.get(id)?;

        if let Some(amount) = patch.amount {
            data.amount = amount;
        }
        if let Some(transaction_date) = &patch.transaction_date {
            data.transaction_date = transaction_date.clone();
        }
        if let Some(description) = &patch.description {
            data.description = description.clone();
        }
        if let Some(account) = &patch.account {
            data.account = account.clone();
        }
        if let Some(category) = &patch.category {
            data.category = Some(category.clone());
        }
        if let Some(notes) = &patch.notes {
            data.notes = Some(notes.clone());
        }

        let payload = serde_json::to_value(&data).map_err(|e| to_storage_err(e.to_string()))?;
        self.entities().update_data(&entity.uuid, payload)
    }

    /// Distinct account labels across active transactions.
    pub fn accounts(&self) -> GardenResult<Vec<String>> {
        self.distinct_field("account")
    }

    /// Distinct category labels across active transactions.
    pub fn categories(&self) -> GardenResult<Vec<String>> {
        self.distinct_field("category")
    }

    fn distinct_field(&self, field: &str) -> GardenResult<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT json_extract(data, '$.{field}') AS value
             FROM entity
             WHERE type = 'Transaction' AND superseded_by IS NULL
               AND json_extract(data, '$.{field}') IS NOT NULL
             ORDER BY value"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| to_storage_err(e.to_string()))?;

        let mut values = Vec::new();
        for row in rows {
            values.push(row.map_err(|e| to_storage_err(e.to_string()))?);
        }
        Ok(values)
    }
}
