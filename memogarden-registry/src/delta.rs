//! The artifact delta-operation language.
//!
//! One op per line:
//!
//! ```text
//! +15:^abc      insert fragment abc before line 15
//! -23           remove line 23
//! ~18:^b2e→^c3d replace line 18, fragment b2e with c3d
//! >12@30        move line 12 to position 30
//! ```
//!
//! Application order: removes and moves first in descending line order
//! (so later line numbers stay valid as earlier ones disappear), then
//! adds and replaces in ascending order.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use memogarden_core::errors::{GardenResult, MemoGardenError};

static ADD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+(\d+):(\^[a-z0-9]{3})$").unwrap());
static REMOVE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-(\d+)$").unwrap());
static REPLACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^~(\d+):(\^[a-z0-9]{3})→(\^[a-z0-9]{3})$").unwrap());
static MOVE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^>(\d+)@(\d+)$").unwrap());

/// One atomic change to artifact content. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    Add { line: usize, fragment: String },
    Remove { line: usize },
    Replace { line: usize, old: String, new: String },
    Move { line: usize, target: usize },
}

impl fmt::Display for DeltaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaOp::Add { line, fragment } => write!(f, "+{line}:{fragment}"),
            DeltaOp::Remove { line } => write!(f, "-{line}"),
            DeltaOp::Replace { line, old, new } => write!(f, "~{line}:{old}→{new}"),
            DeltaOp::Move { line, target } => write!(f, ">{line}@{target}"),
        }
    }
}

/// Parse an ops string, one op per line. Empty lines are skipped; any
/// other non-matching line fails naming its 1-based position.
pub fn parse_delta_ops(ops_string: &str) -> GardenResult<Vec<DeltaOp>> {
    let mut ops = Vec::new();

    for (position, raw_line) in ops_string.trim().lines().enumerate() {
        let line_str = raw_line.trim();
        if line_str.is_empty() {
            continue;
        }

        let op = if let Some(caps) = ADD_RE.captures(line_str) {
            DeltaOp::Add {
                line: parse_line_number(&caps[1], position)?,
                fragment: caps[2].to_string(),
            }
        } else if let Some(caps) = REMOVE_RE.captures(line_str) {
            DeltaOp::Remove {
                line: parse_line_number(&caps[1], position)?,
            }
        } else if let Some(caps) = REPLACE_RE.captures(line_str) {
            DeltaOp::Replace {
                line: parse_line_number(&caps[1], position)?,
                old: caps[2].to_string(),
                new: caps[3].to_string(),
            }
        } else if let Some(caps) = MOVE_RE.captures(line_str) {
            DeltaOp::Move {
                line: parse_line_number(&caps[1], position)?,
                target: parse_line_number(&caps[2], position)?,
            }
        } else {
            return Err(MemoGardenError::validation(format!(
                "invalid delta operation at line {}: {line_str}",
                position + 1
            )));
        };
        ops.push(op);
    }

    Ok(ops)
}

fn parse_line_number(digits: &str, position: usize) -> GardenResult<usize> {
    digits.parse().map_err(|_| {
        MemoGardenError::validation(format!(
            "line number out of range at line {}: {digits}",
            position + 1
        ))
    })
}

/// Reprint ops in the wire format; parsing the result yields the same
/// structural list.
pub fn print_delta_ops(ops: &[DeltaOp]) -> String {
    ops.iter()
        .map(DeltaOp::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply ops to content: removes and moves first, descending, then adds
/// and replaces, ascending. Out-of-range line references fail.
pub fn apply_delta_ops(content: &str, ops: &[DeltaOp]) -> GardenResult<String> {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

    let mut destructive: Vec<&DeltaOp> = ops
        .iter()
        .filter(|op| matches!(op, DeltaOp::Remove { .. } | DeltaOp::Move { .. }))
        .collect();
    destructive.sort_by(|a, b| op_line(b).cmp(&op_line(a)));

    for op in destructive {
        let line = op_line(op);
        if line < 1 || line > lines.len() {
            return Err(MemoGardenError::validation(format!(
                "invalid line number {line} for content with {} lines",
                lines.len()
            )));
        }
        match op {
            DeltaOp::Remove { .. } => {
                lines.remove(line - 1);
            }
            DeltaOp::Move { target, .. } => {
                if *target < 1 || *target > lines.len() {
                    return Err(MemoGardenError::validation(format!(
                        "invalid target line number {target}"
                    )));
                }
                let moved = lines.remove(line - 1);
                lines.insert(target - 1, moved);
            }
            _ => unreachable!("filtered to removes and moves"),
        }
    }

    let mut additive: Vec<&DeltaOp> = ops
        .iter()
        .filter(|op| matches!(op, DeltaOp::Add { .. } | DeltaOp::Replace { .. }))
        .collect();
    additive.sort_by_key(|op| op_line(op));

    for op in additive {
        match op {
            DeltaOp::Add { line, fragment } => {
                if *line < 1 || *line > lines.len() + 1 {
                    return Err(MemoGardenError::validation(format!(
                        "invalid line number {line} for insert"
                    )));
                }
                lines.insert(line - 1, format!("[{fragment}]"));
            }
            DeltaOp::Replace { line, new, .. } => {
                if *line < 1 || *line > lines.len() {
                    return Err(MemoGardenError::validation(format!(
                        "invalid line number {line} for replace"
                    )));
                }
                lines[line - 1] = format!("[{new}]");
            }
            _ => unreachable!("filtered to adds and replaces"),
        }
    }

    Ok(lines.join("\n"))
}

fn op_line(op: &DeltaOp) -> usize {
    match op {
        DeltaOp::Add { line, .. }
        | DeltaOp::Remove { line }
        | DeltaOp::Replace { line, .. }
        | DeltaOp::Move { line, .. } => *line,
    }
}

/// Kind of change a diff line represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// One line of a line-aligned diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffLine {
    pub line: usize,
    pub old: Option<String>,
    pub new: Option<String>,
    #[serde(rename = "type")]
    pub change: ChangeType,
}

/// Line-aligned difference between two content versions.
pub fn diff_lines(old_content: &str, new_content: &str) -> Vec<DiffLine> {
    let old_lines: Vec<&str> = old_content.split('\n').collect();
    let new_lines: Vec<&str> = new_content.split('\n').collect();
    let max_lines = old_lines.len().max(new_lines.len());

    (0..max_lines)
        .map(|i| {
            let old = old_lines.get(i).map(|s| s.to_string());
            let new = new_lines.get(i).map(|s| s.to_string());
            let change = match (&old, &new) {
                (Some(a), Some(b)) if a == b => ChangeType::Unchanged,
                (None, Some(_)) => ChangeType::Added,
                (Some(_), None) => ChangeType::Removed,
                _ => ChangeType::Modified,
            };
            DiffLine {
                line: i + 1,
                old,
                new,
                change,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_four_forms() {
        let ops = parse_delta_ops("+15:^abc\n-23\n~18:^b2e→^c3d\n>12@30").unwrap();
        assert_eq!(
            ops,
            vec![
                DeltaOp::Add {
                    line: 15,
                    fragment: "^abc".to_string()
                },
                DeltaOp::Remove { line: 23 },
                DeltaOp::Replace {
                    line: 18,
                    old: "^b2e".to_string(),
                    new: "^c3d".to_string()
                },
                DeltaOp::Move {
                    line: 12,
                    target: 30
                },
            ]
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        let ops = parse_delta_ops("+1:^abc\n\n  \n-2").unwrap();
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn parse_error_names_the_position() {
        let err = parse_delta_ops("+1:^abc\n+2:^toolong").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 2"), "got: {msg}");
    }

    #[test]
    fn print_parse_round_trip() {
        let ops = parse_delta_ops("+2:^xyz\n-3\n~1:^aaa→^bbb\n>4@1").unwrap();
        let reparsed = parse_delta_ops(&print_delta_ops(&ops)).unwrap();
        assert_eq!(ops, reparsed);
    }

    #[test]
    fn apply_add_and_remove() {
        let ops = parse_delta_ops("+2:^xyz\n-3").unwrap();
        let result = apply_delta_ops("a\nb\nc", &ops).unwrap();
        assert_eq!(result, "a\n[^xyz]\nb");
    }

    #[test]
    fn apply_replace() {
        let ops = parse_delta_ops("~2:^old→^new").unwrap();
        let result = apply_delta_ops("a\nb\nc", &ops).unwrap();
        assert_eq!(result, "a\n[^new]\nc");
    }

    #[test]
    fn apply_move() {
        let ops = parse_delta_ops(">1@3").unwrap();
        let result = apply_delta_ops("a\nb\nc", &ops).unwrap();
        assert_eq!(result, "b\nc\na");
    }

    #[test]
    fn apply_add_at_end_is_allowed() {
        let ops = parse_delta_ops("+4:^end").unwrap();
        let result = apply_delta_ops("a\nb\nc", &ops).unwrap();
        assert_eq!(result, "a\nb\nc\n[^end]");
    }

    #[test]
    fn multiple_removes_apply_descending() {
        let ops = parse_delta_ops("-1\n-3").unwrap();
        let result = apply_delta_ops("a\nb\nc\nd", &ops).unwrap();
        assert_eq!(result, "b\nd");
    }

    #[test]
    fn out_of_range_lines_fail() {
        let ops = parse_delta_ops("-9").unwrap();
        let err = apply_delta_ops("a\nb", &ops).unwrap_err();
        assert!(matches!(err, MemoGardenError::Validation { .. }));

        let ops = parse_delta_ops("+9:^abc").unwrap();
        assert!(apply_delta_ops("a\nb", &ops).is_err());
    }

    #[test]
    fn diff_is_line_aligned() {
        let diff = diff_lines("a\nb\nc", "a\nx\nc\nd");
        assert_eq!(diff.len(), 4);
        assert_eq!(diff[0].change, ChangeType::Unchanged);
        assert_eq!(diff[1].change, ChangeType::Modified);
        assert_eq!(diff[2].change, ChangeType::Unchanged);
        assert_eq!(diff[3].change, ChangeType::Added);
        assert_eq!(diff[3].old, None);
    }

    #[test]
    fn diff_of_identical_content_is_all_unchanged() {
        let diff = diff_lines("a\nb", "a\nb");
        assert!(diff.iter().all(|d| d.change == ChangeType::Unchanged));
    }
}
