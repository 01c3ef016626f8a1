//! Recurrence entities: rule storage and occurrence projection.

use chrono::NaiveDate;
use rusqlite::Connection;

use memogarden_core::errors::{GardenResult, MemoGardenError};
use memogarden_core::models::{EntityRecord, RecurrenceData};
use memogarden_core::recurrence::generate_occurrences;

use super::entity::{row_to_entity, EntityOps};
use crate::to_storage_err;

/// Recurrence operations, borrowed from a session.
pub struct RecurrenceOps<'s> {
    conn: &'s Connection,
}

impl<'s> RecurrenceOps<'s> {
    pub(crate) fn new(conn: &'s Connection) -> Self {
        Self { conn }
    }

    fn entities(&self) -> EntityOps<'s> {
        EntityOps::new(self.conn)
    }

    /// Create a recurrence entity, validating its rule up front.
    /// Returns the bare UUID.
    pub fn create(&self, data: &RecurrenceData) -> GardenResult<String> {
        memogarden_core::recurrence::parse_rrule(&data.rrule)?;
        let payload = serde_json::to_value(data).map_err(|e| to_storage_err(e.to_string()))?;
        self.entities().create("Recurrence", None, None, Some(payload))
    }

    /// Fetch a recurrence and its rule.
    pub fn get(&self, id: &str) -> GardenResult<(EntityRecord, RecurrenceData)> {
        let entity = self.entities().get_as(id, "Recurrence")?;
        let data: RecurrenceData = entity.payload()?;
        Ok((entity, data))
    }

    /// List recurrences whose window intersects the given bounds,
    /// newest first.
    pub fn list(
        &self,
        valid_from: Option<&str>,
        valid_until: Option<&str>,
        include_superseded: bool,
        limit: usize,
        offset: usize,
    ) -> GardenResult<Vec<(EntityRecord, RecurrenceData)>> {
        let mut where_clause = String::from("type = 'Recurrence'");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(valid_from) = valid_from {
            where_clause.push_str(" AND json_extract(data, '$.valid_from') >= ?");
            params.push(Box::new(valid_from.to_string()));
        }
        if let Some(valid_until) = valid_until {
            where_clause.push_str(" AND json_extract(data, '$.valid_until') <= ?");
            params.push(Box::new(valid_until.to_string()));
        }
        if !include_superseded {
            where_clause.push_str(" AND superseded_by IS NULL");
        }

        let sql = format!(
            "SELECT uuid, type, hash, previous_hash, version, group_id,
                    derived_from, created_at, updated_at, superseded_by,
                    superseded_at, data
             FROM entity WHERE {where_clause}
             ORDER BY created_at DESC, rowid DESC
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
            let data: RecurrenceData = entity.payload()?;
            results.push((entity, data));
        }
        Ok(results)
    }

    /// Project a recurrence onto a date window: every occurrence of its
    /// rule inside `[window_start, window_end]`, clipped to the
    /// recurrence's own validity window.
    pub fn occurrences_between(
        &self,
        id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> GardenResult<Vec<NaiveDate>> {
        let (_, data) = self.get(id)?;

        let anchor = parse_date(&data.valid_from)?;
        let effective_start = window_start.max(anchor);
        let mut effective_end = window_end;
        if let Some(valid_until) = &data.valid_until {
            effective_end = effective_end.min(parse_date(valid_until)?);
        }
        if effective_start > effective_end {
            return Ok(Vec::new());
        }

        generate_occurrences(&data.rrule, anchor, effective_start, effective_end)
    }
}

fn parse_date(value: &str) -> GardenResult<NaiveDate> {
    let date_part = &value[..value.len().min(10)];
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
        MemoGardenError::validation(format!("invalid recurrence date '{value}'"))
    })
}
