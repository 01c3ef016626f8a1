//! Entity hash-chain step functions and content hashing.
//!
//! The chain covers entity *metadata* lineage, not the payload: each step
//! hashes the row's chain fields together with the hash it replaces, so a
//! reader can walk `previous_hash` links back through every mutation.
//! Payload integrity is witnessed separately by `EntityDelta` facts in Soil.

use sha2::{Digest, Sha256};

/// Separator between canonicalised fields. Cannot occur in any of the
/// field values (timestamps, UUIDs, hex digests).
const FIELD_SEPARATOR: u8 = 0x1f;

/// The chain-relevant fields of an entity row, borrowed from storage.
#[derive(Debug, Clone, Copy)]
pub struct EntityState<'a> {
    pub entity_type: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
    pub group_id: Option<&'a str>,
    pub derived_from: Option<&'a str>,
    pub superseded_by: Option<&'a str>,
    pub superseded_at: Option<&'a str>,
}

/// SHA-256 over the canonically-ordered chain fields.
///
/// `previous_hash` is `None` only for the initial state of an entity.
pub fn compute_entity_hash(state: &EntityState<'_>, previous_hash: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    let fields = [
        Some(state.entity_type),
        Some(state.created_at),
        Some(state.updated_at),
        state.group_id,
        state.derived_from,
        state.superseded_by,
        state.superseded_at,
        previous_hash,
    ];
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update([FIELD_SEPARATOR]);
        }
        hasher.update(field.unwrap_or("").as_bytes());
    }
    hex_digest(&hasher.finalize())
}

/// Advance the chain: the new hash binds `previous_hash` to the hash
/// being replaced.
pub fn compute_next_hash(state: &EntityState<'_>, current_hash: &str) -> String {
    compute_entity_hash(state, Some(current_hash))
}

/// First 8 hex characters of SHA-256; the commit identity of artifact
/// content.
pub fn compute_content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex_digest(&digest)[..8].to_string()
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> EntityState<'static> {
        EntityState {
            entity_type: "Transaction",
            created_at: "2026-01-30T10:00:00.000000Z",
            updated_at: "2026-01-30T10:00:00.000000Z",
            group_id: None,
            derived_from: None,
            superseded_by: None,
            superseded_at: None,
        }
    }

    #[test]
    fn initial_hash_is_deterministic_64_hex() {
        let a = compute_entity_hash(&state(), None);
        let b = compute_entity_hash(&state(), None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn previous_hash_changes_the_digest() {
        let initial = compute_entity_hash(&state(), None);
        let next = compute_next_hash(&state(), &initial);
        assert_ne!(initial, next);
    }

    #[test]
    fn none_and_empty_group_id_hash_identically() {
        // Canonicalisation renders absent fields as empty.
        let mut with_empty = state();
        with_empty.group_id = Some("");
        assert_eq!(
            compute_entity_hash(&state(), None),
            compute_entity_hash(&with_empty, None)
        );
    }

    #[test]
    fn content_hash_is_8_hex_prefix() {
        let h = compute_content_hash("a\nb\nc");
        assert_eq!(h.len(), 8);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, compute_content_hash("a\nb\nc"));
        assert_ne!(h, compute_content_hash("a\nb"));
    }
}
