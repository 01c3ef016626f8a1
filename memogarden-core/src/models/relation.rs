//! Structural relations (Soil) and engagement relations (registry).

use serde::{Deserialize, Serialize};

use crate::{ids, time};

/// Structural relation kinds. At most one relation may exist per
/// `(kind, source, target)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Triggers,
    Cites,
    DerivesFrom,
    Contains,
    RepliesTo,
    Continues,
    Supersedes,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Triggers => "triggers",
            RelationKind::Cites => "cites",
            RelationKind::DerivesFrom => "derives_from",
            RelationKind::Contains => "contains",
            RelationKind::RepliesTo => "replies_to",
            RelationKind::Continues => "continues",
            RelationKind::Supersedes => "supersedes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "triggers" => Some(RelationKind::Triggers),
            "cites" => Some(RelationKind::Cites),
            "derives_from" => Some(RelationKind::DerivesFrom),
            "contains" => Some(RelationKind::Contains),
            "replies_to" => Some(RelationKind::RepliesTo),
            "continues" => Some(RelationKind::Continues),
            "supersedes" => Some(RelationKind::Supersedes),
            _ => None,
        }
    }
}

/// What a relation endpoint refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    Item,
    Entity,
    Artifact,
    Fragment,
}

impl EndpointType {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointType::Item => "item",
            EndpointType::Entity => "entity",
            EndpointType::Artifact => "artifact",
            EndpointType::Fragment => "fragment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "item" => Some(EndpointType::Item),
            "entity" => Some(EndpointType::Entity),
            "artifact" => Some(EndpointType::Artifact),
            "fragment" => Some(EndpointType::Fragment),
            _ => None,
        }
    }
}

/// Where a relation's claim came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    SoilStated,
    UserStated,
    AgentInferred,
    SystemInferred,
}

/// Provenance attached to a relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: EvidenceSource,
    /// 0.0–1.0, meaningful for inferred sources only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// UUIDs of supporting facts or entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basis: Option<Vec<String>>,
    /// Free-form method label for inferred relations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl Evidence {
    pub fn stated(source: EvidenceSource) -> Self {
        Self {
            source,
            confidence: None,
            basis: None,
            method: None,
        }
    }
}

/// Immutable structural fact linking two objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemRelation {
    pub uuid: String,
    pub kind: RelationKind,
    pub source: String,
    pub source_type: EndpointType,
    pub target: String,
    pub target_type: EndpointType,
    /// Days since epoch.
    pub created_at: i64,
    pub evidence: Option<Evidence>,
    pub metadata: Option<serde_json::Value>,
}

impl SystemRelation {
    pub fn new(
        kind: RelationKind,
        source: impl Into<String>,
        source_type: EndpointType,
        target: impl Into<String>,
        target_type: EndpointType,
    ) -> Self {
        Self {
            uuid: ids::generate(),
            kind,
            source: source.into(),
            source_type,
            target: target.into(),
            target_type,
            created_at: time::current_day(),
            evidence: None,
            metadata: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

/// Engagement signal with a decaying time horizon.
///
/// Alive while `time_horizon >= current_day()`. Access extends the
/// horizon by the elapsed days scaled by the safety coefficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRelation {
    pub uuid: String,
    /// `explicit_link` or `triggers`.
    pub kind: String,
    pub source: String,
    pub source_type: EndpointType,
    pub target: String,
    pub target_type: EndpointType,
    /// Day-since-epoch after which the relation expires.
    pub time_horizon: i64,
    /// Day-since-epoch of the most recent access.
    pub last_access_at: i64,
    pub created_at: i64,
    pub evidence: Option<Evidence>,
    pub metadata: Option<serde_json::Value>,
}

impl UserRelation {
    /// Whether the relation is alive as of `today`.
    pub fn is_alive_on(&self, today: i64) -> bool {
        self.time_horizon >= today
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_kind_round_trips() {
        for kind in [
            RelationKind::Triggers,
            RelationKind::Cites,
            RelationKind::DerivesFrom,
            RelationKind::Contains,
            RelationKind::RepliesTo,
            RelationKind::Continues,
            RelationKind::Supersedes,
        ] {
            assert_eq!(RelationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RelationKind::parse("links_to"), None);
    }

    #[test]
    fn evidence_serializes_without_absent_fields() {
        let json =
            serde_json::to_value(Evidence::stated(EvidenceSource::UserStated)).unwrap();
        assert_eq!(json, serde_json::json!({"source": "user_stated"}));
    }

    #[test]
    fn aliveness_is_an_integer_comparison() {
        let mut rel = UserRelation {
            uuid: ids::generate(),
            kind: "explicit_link".to_string(),
            source: "a".to_string(),
            source_type: EndpointType::Item,
            target: "b".to_string(),
            target_type: EndpointType::Entity,
            time_horizon: 100,
            last_access_at: 93,
            created_at: 93,
            evidence: None,
            metadata: None,
        };
        assert!(rel.is_alive_on(100));
        assert!(!rel.is_alive_on(101));
        rel.time_horizon = 101;
        assert!(rel.is_alive_on(101));
    }
}
