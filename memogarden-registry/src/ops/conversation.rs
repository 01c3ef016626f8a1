//! Conversation logs and the fold verb.
//!
//! Folding attaches a summary checkpoint and collapses the log. It does
//! not seal anything: collapsed logs keep accepting items.

use rusqlite::Connection;

use memogarden_core::errors::{GardenResult, MemoGardenError};
use memogarden_core::models::{
    ConversationLogData, ConversationSummary, EntityRecord, SummaryAuthor,
};
use memogarden_core::{ids, time};

use super::entity::EntityOps;
use crate::to_storage_err;

/// Result of folding a conversation log.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldResult {
    pub log_uuid: String,
    pub summary: ConversationSummary,
    pub collapsed: bool,
}

/// Conversation operations, borrowed from a session.
pub struct ConversationOps<'s> {
    conn: &'s Connection,
}

impl<'s> ConversationOps<'s> {
    pub(crate) fn new(conn: &'s Connection) -> Self {
        Self { conn }
    }

    fn entities(&self) -> EntityOps<'s> {
        EntityOps::new(self.conn)
    }

    /// Load a conversation log and its payload, rejecting other types.
    pub fn get(&self, log_uuid: &str) -> GardenResult<(EntityRecord, ConversationLogData)> {
        let entity = self.entities().get(log_uuid)?;
        if entity.entity_type != "ConversationLog" {
            return Err(MemoGardenError::validation(format!(
                "entity '{}' is not a ConversationLog",
                entity.uuid
            )));
        }
        let data: ConversationLogData = entity.payload()?;
        Ok((entity, data))
    }

    /// Fold the log: attach a summary and mark it collapsed. The log
    /// remains appendable afterwards.
    pub fn fold(
        &self,
        log_uuid: &str,
        summary_content: &str,
        author: SummaryAuthor,
        fragment_ids: Option<Vec<String>>,
    ) -> GardenResult<FoldResult> {
        if summary_content.trim().is_empty() {
            return Err(MemoGardenError::validation(
                "summary content cannot be empty",
            ));
        }

        let (entity, mut data) = self.get(log_uuid)?;
        let summary = ConversationSummary {
            timestamp: time::now_iso(),
            author,
            content: summary_content.to_string(),
            fragment_ids,
        };
        data.summary = Some(summary.clone());
        data.collapsed = true;

        let payload = serde_json::to_value(&data).map_err(|e| to_storage_err(e.to_string()))?;
        self.entities().update_data(&entity.uuid, payload)?;

        Ok(FoldResult {
            log_uuid: entity.uuid,
            summary,
            collapsed: true,
        })
    }

    /// Append a fact UUID to the log's items. Works on collapsed logs
    /// too; a fold is a checkpoint, not a seal.
    pub fn append_item(&self, log_uuid: &str, fact_uuid: &str) -> GardenResult<()> {
        let (entity, mut data) = self.get(log_uuid)?;
        data.items.push(ids::strip_prefix(fact_uuid).to_string());
        let payload = serde_json::to_value(&data).map_err(|e| to_storage_err(e.to_string()))?;
        self.entities().update_data(&entity.uuid, payload)?;
        Ok(())
    }
}
