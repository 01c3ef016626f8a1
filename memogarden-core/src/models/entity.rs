//! Mutable registry entities and their typed payloads.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::{GardenResult, MemoGardenError};
use crate::models::context::ViewData;

/// A row of the entity registry.
///
/// `hash` is the current head of the entity's metadata chain;
/// `previous_hash` steps back to the state this one replaced. `version`
/// increments strictly on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Bare UUID; the `core_` tag is attached at the kernel boundary.
    pub uuid: String,
    pub entity_type: String,
    pub hash: String,
    pub previous_hash: Option<String>,
    pub version: i64,
    pub group_id: Option<String>,
    pub derived_from: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub superseded_by: Option<String>,
    pub superseded_at: Option<String>,
    /// Typed JSON payload, discriminated by `entity_type`.
    pub data: serde_json::Value,
}

impl EntityRecord {
    /// Deserialize the payload into a concrete type.
    pub fn payload<T: DeserializeOwned>(&self) -> GardenResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            MemoGardenError::validation(format!(
                "malformed {} payload for entity '{}': {e}",
                self.entity_type, self.uuid
            ))
        })
    }

    /// Parse the payload into the tagged variant for its type, falling
    /// back to a transparent container for unknown types.
    pub fn typed_payload(&self) -> GardenResult<TypedPayload> {
        TypedPayload::parse(&self.entity_type, &self.data)
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }
}

/// Ledger entry payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    pub amount: f64,
    pub currency: String,
    /// ISO 8601 date.
    pub transaction_date: String,
    pub description: String,
    pub account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Recurring-obligation payload: a rule plus the transaction template
/// it stamps out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceData {
    /// iCal RRULE string, e.g. `FREQ=MONTHLY;INTERVAL=1`.
    pub rrule: String,
    /// Transaction template instantiated per occurrence.
    pub template: serde_json::Value,
    /// ISO 8601 start of the recurrence window.
    pub valid_from: String,
    /// Optional end of the window; absent means forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
}

/// Line-addressed document payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactData {
    /// Full line-addressable text.
    #[serde(default)]
    pub content: String,
    /// ArtifactDelta fact UUIDs, oldest first.
    #[serde(default)]
    pub deltas: Vec<String>,
}

/// Who authored a fold summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryAuthor {
    Operator,
    Agent,
    System,
}

/// The named checkpoint a fold attaches to a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub timestamp: String,
    pub author: SummaryAuthor,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_ids: Option<Vec<String>>,
}

/// Conversation log payload. Folding collapses the log without sealing
/// it: `items` stays appendable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationLogData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ConversationSummary>,
}

/// Scope payload: a shared working area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeData {
    pub label: String,
    #[serde(default)]
    pub active_participants: Vec<String>,
    #[serde(default)]
    pub artifact_uuids: Vec<String>,
}

/// Payload parsed per known entity type, with a transparent fallback.
#[derive(Debug, Clone)]
pub enum TypedPayload {
    Transaction(TransactionData),
    Recurrence(RecurrenceData),
    Artifact(ArtifactData),
    ConversationLog(ConversationLogData),
    Scope(ScopeData),
    View(ViewData),
    Unknown(serde_json::Value),
}

impl TypedPayload {
    pub fn parse(entity_type: &str, data: &serde_json::Value) -> GardenResult<Self> {
        let malformed = |e: serde_json::Error| {
            MemoGardenError::validation(format!("malformed {entity_type} payload: {e}"))
        };
        Ok(match entity_type {
            "Transaction" => {
                TypedPayload::Transaction(serde_json::from_value(data.clone()).map_err(malformed)?)
            }
            "Recurrence" => {
                TypedPayload::Recurrence(serde_json::from_value(data.clone()).map_err(malformed)?)
            }
            "Artifact" => {
                TypedPayload::Artifact(serde_json::from_value(data.clone()).map_err(malformed)?)
            }
            "ConversationLog" => TypedPayload::ConversationLog(
                serde_json::from_value(data.clone()).map_err(malformed)?,
            ),
            "Scope" => {
                TypedPayload::Scope(serde_json::from_value(data.clone()).map_err(malformed)?)
            }
            "View" => TypedPayload::View(serde_json::from_value(data.clone()).map_err(malformed)?),
            _ => TypedPayload::Unknown(data.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_payload_defaults_to_empty() {
        let data: ArtifactData = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(data.content, "");
        assert!(data.deltas.is_empty());
    }

    #[test]
    fn typed_payload_falls_back_for_unknown_types() {
        let value = serde_json::json!({"anything": true});
        let parsed = TypedPayload::parse("Gadget", &value).unwrap();
        assert!(matches!(parsed, TypedPayload::Unknown(v) if v == value));
    }

    #[test]
    fn typed_payload_rejects_malformed_known_types() {
        let err = TypedPayload::parse("Transaction", &serde_json::json!({"amount": "x"}));
        assert!(matches!(
            err,
            Err(MemoGardenError::Validation { .. })
        ));
    }

    #[test]
    fn conversation_log_collapsed_defaults_false() {
        let data: ConversationLogData =
            serde_json::from_value(serde_json::json!({"items": []})).unwrap();
        assert!(!data.collapsed);
        assert!(data.summary.is_none());
    }
}
