//! # memogarden-fragment
//!
//! Fragment identifiers and semantic reference parsing.
//!
//! Fragments are content-derived 3-character base-36 anchors into
//! message text (`^abc`). References are the lexical forms by which
//! messages point at fragments, artifact lines, and stored objects.
//! Parsing is pure; resolving references against stored data is a
//! declared future extension and signals `NotImplemented`.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use memogarden_core::errors::{GardenResult, MemoGardenError};

const BASE36_DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// The lexical form a reference was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `^abc`
    Fragment,
    /// `label:15`
    ArtifactLine,
    /// `label:15@abc123`
    ArtifactLineAtCommit,
    /// `@soil_…` or `@core_…`, pointing at a Fact or an Entity.
    Object,
    /// `[text](soil_…)`
    Log,
}

/// One parsed reference with its character span and canonical target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    /// `(start, end)` character offsets into the input.
    pub span: (usize, usize),
    /// Canonical textual form; object and log targets strip the
    /// `@`/bracket syntax down to the tagged UUID.
    pub target: String,
}

/// Derive the fragment ID for a span of text: `^` plus exactly three
/// lowercase base-36 characters.
///
/// The first two bytes of SHA-256, read big-endian, are rendered in
/// base 36, truncated to the leading three characters, and left-padded
/// with zeros.
pub fn generate_fragment_id(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let value = u32::from(digest[0]) << 8 | u32::from(digest[1]);

    let mut rendered = Vec::new();
    let mut n = value;
    if n == 0 {
        rendered.push(b'0');
    }
    while n > 0 {
        rendered.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    rendered.reverse();
    rendered.truncate(3);
    while rendered.len() < 3 {
        rendered.insert(0, b'0');
    }

    let id: String = rendered.iter().map(|&b| b as char).collect();
    format!("^{id}")
}

static FRAGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^[0-9a-z]{3}").unwrap());
static ARTIFACT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][\w_]*:\d+(@[0-9a-f]{4,})?").unwrap());
static OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@((?:soil|core)_[\w-]+)").unwrap());
static LOG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]\(((?:soil|core)_[\w-]+)\)").unwrap());

/// Parse every reference out of message text.
///
/// All four forms are lexed simultaneously; the result is ordered by
/// input position and contains no overlapping spans. When two candidate
/// matches start at the same offset, the earlier-listed form wins.
pub fn parse_references(content: &str) -> Vec<Reference> {
    // (start, priority) candidates from every lexer.
    let mut candidates: Vec<Reference> = Vec::new();

    for m in FRAGMENT_RE.find_iter(content) {
        candidates.push(Reference {
            kind: ReferenceKind::Fragment,
            span: (m.start(), m.end()),
            target: m.as_str().to_string(),
        });
    }
    for caps in ARTIFACT_LINE_RE.captures_iter(content) {
        let m = caps.get(0).expect("whole match");
        let kind = if caps.get(1).is_some() {
            ReferenceKind::ArtifactLineAtCommit
        } else {
            ReferenceKind::ArtifactLine
        };
        candidates.push(Reference {
            kind,
            span: (m.start(), m.end()),
            target: m.as_str().to_string(),
        });
    }
    for caps in OBJECT_RE.captures_iter(content) {
        let m = caps.get(0).expect("whole match");
        let target = caps.get(1).expect("uuid group");
        candidates.push(Reference {
            kind: ReferenceKind::Object,
            span: (m.start(), m.end()),
            target: target.as_str().to_string(),
        });
    }
    for caps in LOG_RE.captures_iter(content) {
        let m = caps.get(0).expect("whole match");
        let target = caps.get(1).expect("uuid group");
        candidates.push(Reference {
            kind: ReferenceKind::Log,
            span: (m.start(), m.end()),
            target: target.as_str().to_string(),
        });
    }

    candidates.sort_by_key(|r| (r.span.0, form_priority(r.kind)));

    let mut accepted: Vec<Reference> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps = accepted
            .iter()
            .any(|kept| candidate.span.0 < kept.span.1 && kept.span.0 < candidate.span.1);
        if !overlaps {
            accepted.push(candidate);
        }
    }
    accepted
}

fn form_priority(kind: ReferenceKind) -> u8 {
    match kind {
        ReferenceKind::Fragment => 0,
        ReferenceKind::ArtifactLine | ReferenceKind::ArtifactLineAtCommit => 1,
        ReferenceKind::Object => 2,
        ReferenceKind::Log => 3,
    }
}

/// Resolve a fragment ID against a scope's conversation threads.
///
/// Future extension; always signals `NotImplemented`.
pub fn resolve_fragment(
    _scope_uuid: &str,
    _fragment_id: &str,
    _conversation_log_uuid: Option<&str>,
) -> GardenResult<Reference> {
    Err(MemoGardenError::not_implemented(
        "fragment resolution against stored conversation threads",
    ))
}

/// Resolve an artifact line reference to its content.
///
/// Future extension; always signals `NotImplemented`.
pub fn resolve_artifact_line(
    _artifact_uuid: &str,
    _line_number: usize,
    _commit_hash: Option<&str>,
) -> GardenResult<String> {
    Err(MemoGardenError::not_implemented(
        "artifact line resolution against stored commits",
    ))
}
