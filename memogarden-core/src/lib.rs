//! # memogarden-core
//!
//! Foundation crate for the MemoGarden storage kernel.
//! Defines the shared models, errors, identifier and hash utilities,
//! configuration resolution, and bundled schema resources.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod hash_chain;
pub mod ids;
pub mod models;
pub mod recurrence;
pub mod schemas;
pub mod time;

// Re-export the most commonly used types at the crate root.
pub use config::{RuntimeContext, Settings, Verb};
pub use errors::{GardenResult, MemoGardenError, StorageError};
pub use models::{ContextFrame, EntityRecord, Fact, SystemRelation, SystemStatus, UserRelation};
