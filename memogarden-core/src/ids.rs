//! UUID minting and the `core_`/`soil_` lexical tags.
//!
//! Storage always holds the bare 36-character UUID; the tags are attached
//! at the kernel boundary and tolerated on every input.

use uuid::Uuid;

/// Tag carried by Entity-registry identifiers on the API surface.
pub const CORE_UUID_PREFIX: &str = "core_";

/// Tag carried by Fact-store identifiers on the API surface.
pub const SOIL_UUID_PREFIX: &str = "soil_";

/// Mint a new bare v4 UUID.
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// Strip a `core_` or `soil_` tag if present.
pub fn strip_prefix(id: &str) -> &str {
    id.strip_prefix(CORE_UUID_PREFIX)
        .or_else(|| id.strip_prefix(SOIL_UUID_PREFIX))
        .unwrap_or(id)
}

/// Attach the `core_` tag, replacing any tag already present.
pub fn tag_core(id: &str) -> String {
    format!("{CORE_UUID_PREFIX}{}", strip_prefix(id))
}

/// Attach the `soil_` tag, replacing any tag already present.
pub fn tag_soil(id: &str) -> String {
    format!("{SOIL_UUID_PREFIX}{}", strip_prefix(id))
}
