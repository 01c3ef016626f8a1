//! Context frames (LRU-N working memory) and the view stream.

use serde::{Deserialize, Serialize};

/// Who owns a context frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Operator,
    Agent,
    Scope,
}

impl OwnerType {
    pub fn as_str(self) -> &'static str {
        match self {
            OwnerType::Operator => "operator",
            OwnerType::Agent => "agent",
            OwnerType::Scope => "scope",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "operator" => Some(OwnerType::Operator),
            "agent" => Some(OwnerType::Agent),
            "scope" => Some(OwnerType::Scope),
            _ => None,
        }
    }
}

/// One operation recorded inside a View.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewAction {
    /// Operation type, e.g. `update_entity`.
    #[serde(rename = "type")]
    pub action_type: String,
    /// UUID of the target entity or fact.
    pub target: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
    /// Entity UUIDs visited during the action.
    #[serde(default)]
    pub visited: Vec<String>,
}

impl ViewAction {
    pub fn new(
        action_type: impl Into<String>,
        target: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            target: target.into(),
            timestamp: timestamp.into(),
            visited: Vec::new(),
        }
    }
}

/// Persisted payload of a `View` entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewData {
    pub actor: String,
    pub actions: Vec<ViewAction>,
    pub started_at: String,
    pub ended_at: Option<String>,
    /// Previous View UUID; forms the per-frame linked list.
    pub prev: Option<String>,
    pub context_frame_uuid: String,
}

/// A View together with its entity UUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub uuid: String,
    #[serde(flatten)]
    pub data: ViewData,
}

impl View {
    /// Whether the view is still open for coalescence.
    pub fn is_open(&self) -> bool {
        self.data.ended_at.is_none()
    }

    /// Timestamp of the most recent recorded action.
    pub fn last_action_timestamp(&self) -> Option<&str> {
        self.data.actions.last().map(|a| a.timestamp.as_str())
    }
}

/// Per-owner working memory: the LRU-N container list plus the view
/// timeline. A subordinate frame holds a weak back-reference to its
/// parent (lookup only, no lifetime control).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFrame {
    pub uuid: String,
    pub owner: String,
    pub owner_type: OwnerType,
    /// Visited UUIDs, most recent first, bounded by N.
    pub containers: Vec<String>,
    /// View UUIDs in append order.
    pub view_timeline: Vec<String>,
    /// Scopes the owner is currently inside (operator frames only).
    pub active_scopes: Vec<String>,
    /// The focused scope; always an element of `active_scopes`.
    pub primary_scope: Option<String>,
    pub created_at: String,
    pub parent_frame_uuid: Option<String>,
}

impl ContextFrame {
    /// A subordinate frame was forked from a parent and inherited its
    /// containers at that instant.
    pub fn is_subordinate(&self) -> bool {
        self.parent_frame_uuid.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_action_serializes_type_field() {
        let action = ViewAction::new("create_entity", "abc", "2026-01-30T10:00:00Z");
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "create_entity");
        assert_eq!(json["visited"], serde_json::json!([]));
    }

    #[test]
    fn view_openness_follows_ended_at() {
        let view = View {
            uuid: "v1".to_string(),
            data: ViewData {
                actor: "op".to_string(),
                actions: vec![ViewAction::new("read", "x", "2026-01-30T10:00:00Z")],
                started_at: "2026-01-30T10:00:00Z".to_string(),
                ended_at: None,
                prev: None,
                context_frame_uuid: "f1".to_string(),
            },
        };
        assert!(view.is_open());
        assert_eq!(view.last_action_timestamp(), Some("2026-01-30T10:00:00Z"));
    }

    #[test]
    fn owner_type_round_trips() {
        for owner in [OwnerType::Operator, OwnerType::Agent, OwnerType::Scope] {
            assert_eq!(OwnerType::parse(owner.as_str()), Some(owner));
        }
        assert_eq!(OwnerType::parse("daemon"), None);
    }
}
