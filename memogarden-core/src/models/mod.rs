//! Data model of the kernel: immutable Facts and structural relations
//! (Soil), mutable hash-chained entities and engagement relations (the
//! registry), context frames and views, and the consistency reports.

pub mod consistency;
pub mod context;
pub mod entity;
pub mod fact;
pub mod relation;

pub use consistency::{BrokenChain, OrphanedDelta, SystemStatus};
pub use context::{ContextFrame, OwnerType, View, ViewAction, ViewData};
pub use entity::{
    ArtifactData, ConversationLogData, ConversationSummary, EntityRecord, RecurrenceData,
    ScopeData, SummaryAuthor, TransactionData, TypedPayload,
};
pub use fact::{Fact, Fidelity};
pub use relation::{
    EndpointType, Evidence, EvidenceSource, RelationKind, SystemRelation, UserRelation,
};
