//! Line diffing for regenerated files.
//!
//! This module provides:
//! - [`DiffLine`] records in the two-character marker form (`"+ "`, `"- "`,
//!   `"  "`, `"? "`)
//! - LCS-based line alignment ([`line_diff`]) with intraline hint lines for
//!   near-identical replacements
//! - Noise filtering down to the effective change set (`filter` submodule)

pub mod filter;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum similarity for a replaced line pair to get hint lines.
const HINT_RATIO: f64 = 0.75;

/// Character alignment is skipped (no hints) above this many DP cells.
const MAX_HINT_CELLS: usize = 250_000;

/// Line alignment above this many DP cells reports the whole differing
/// middle as one removed block followed by one added block.
const MAX_ALIGN_CELLS: usize = 4_000_000;

/// Where a diff line comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOrigin {
    /// Only in the new (regenerated) text.
    Added,
    /// Only in the old (snapshot) text.
    Removed,
    /// Present in both.
    Context,
    /// Column markers for the preceding line; never real content.
    Hint,
}

impl DiffOrigin {
    /// Two-character prefix used in the textual form.
    pub fn marker(self) -> &'static str {
        match self {
            DiffOrigin::Added => "+ ",
            DiffOrigin::Removed => "- ",
            DiffOrigin::Context => "  ",
            DiffOrigin::Hint => "? ",
        }
    }

    fn from_marker_char(c: u8) -> Option<Self> {
        match c {
            b'+' => Some(DiffOrigin::Added),
            b'-' => Some(DiffOrigin::Removed),
            b' ' => Some(DiffOrigin::Context),
            b'?' => Some(DiffOrigin::Hint),
            _ => None,
        }
    }
}

/// One line of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiffLine {
    pub origin: DiffOrigin,
    /// Line text without the marker and without a trailing newline.
    pub content: String,
}

impl DiffLine {
    pub fn new(origin: DiffOrigin, content: impl Into<String>) -> Self {
        Self {
            origin,
            content: content.into(),
        }
    }

    /// Parse the textual form. Returns `None` when the line does not start
    /// with a known marker followed by a space (or end of line).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let bytes = line.as_bytes();
        let origin = DiffOrigin::from_marker_char(*bytes.first()?)?;
        match bytes.get(1) {
            None => Some(Self::new(origin, "")),
            Some(b' ') => Some(Self::new(origin, &line[2..])),
            Some(_) => None,
        }
    }

    /// Whether the line describes a difference rather than shared context.
    pub fn is_change(&self) -> bool {
        matches!(self.origin, DiffOrigin::Added | DiffOrigin::Removed)
    }
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin.marker(), self.content)
    }
}

/// Diff `old` against `new` line by line.
///
/// Shared lines are emitted as context. Inside each changed block removed
/// and added lines are paired up in order; a pair that is at least 75%
/// similar is followed by hint lines marking the differing columns.
/// Unpaired removals come before unpaired additions.
pub fn line_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    let mut out = Vec::new();
    let mut removed: Vec<&str> = Vec::new();
    let mut added: Vec<&str> = Vec::new();

    for op in align(&a, &b, MAX_ALIGN_CELLS) {
        match op {
            Op::Equal(line) => {
                flush_block(&mut out, &mut removed, &mut added);
                out.push(DiffLine::new(DiffOrigin::Context, line));
            }
            Op::Delete(line) => removed.push(line),
            Op::Insert(line) => added.push(line),
        }
    }
    flush_block(&mut out, &mut removed, &mut added);
    out
}

enum Op<'a> {
    Equal(&'a str),
    Delete(&'a str),
    Insert(&'a str),
}

/// LCS alignment of two line sequences, with common prefix and suffix
/// trimmed before the quadratic table is built. When the table would exceed
/// `max_cells` the trimmed middle is not aligned.
fn align<'a>(a: &[&'a str], b: &[&'a str], max_cells: usize) -> Vec<Op<'a>> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];
    let m = mid_a.len();
    let n = mid_b.len();

    let mut ops: Vec<Op<'a>> = a[..prefix].iter().map(|l| Op::Equal(*l)).collect();
    if (m + 1).saturating_mul(n + 1) > max_cells {
        tracing::debug!(old_lines = m, new_lines = n, "diff block too large to align");
        ops.extend(mid_a.iter().map(|l| Op::Delete(*l)));
        ops.extend(mid_b.iter().map(|l| Op::Insert(*l)));
        ops.extend(a[a.len() - suffix..].iter().map(|l| Op::Equal(*l)));
        return ops;
    }

    // dp[i][j] = LCS length of mid_a[i..] and mid_b[j..]
    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            dp[i][j] = if mid_a[i] == mid_b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < m && j < n {
        if mid_a[i] == mid_b[j] {
            ops.push(Op::Equal(mid_a[i]));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            ops.push(Op::Delete(mid_a[i]));
            i += 1;
        } else {
            ops.push(Op::Insert(mid_b[j]));
            j += 1;
        }
    }
    ops.extend(mid_a[i..].iter().map(|l| Op::Delete(*l)));
    ops.extend(mid_b[j..].iter().map(|l| Op::Insert(*l)));
    ops.extend(a[a.len() - suffix..].iter().map(|l| Op::Equal(*l)));
    ops
}

fn flush_block(out: &mut Vec<DiffLine>, removed: &mut Vec<&str>, added: &mut Vec<&str>) {
    let paired = removed.len().min(added.len());
    for k in 0..paired {
        let (old, new) = (removed[k], added[k]);
        out.push(DiffLine::new(DiffOrigin::Removed, old));
        match intraline_hints(old, new) {
            Some((old_hint, new_hint)) => {
                if let Some(h) = old_hint {
                    out.push(DiffLine::new(DiffOrigin::Hint, h));
                }
                out.push(DiffLine::new(DiffOrigin::Added, new));
                if let Some(h) = new_hint {
                    out.push(DiffLine::new(DiffOrigin::Hint, h));
                }
            }
            None => out.push(DiffLine::new(DiffOrigin::Added, new)),
        }
    }
    out.extend(
        removed[paired..]
            .iter()
            .map(|l| DiffLine::new(DiffOrigin::Removed, *l)),
    );
    out.extend(
        added[paired..]
            .iter()
            .map(|l| DiffLine::new(DiffOrigin::Added, *l)),
    );
    removed.clear();
    added.clear();
}

type HintPair = (Option<String>, Option<String>);

/// Column markers for a similar line pair, or `None` when the lines are not
/// similar enough to be treated as an edit of one another.
fn intraline_hints(old: &str, new: &str) -> Option<HintPair> {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();
    if a.is_empty() || b.is_empty() || a.len() * b.len() > MAX_HINT_CELLS {
        return None;
    }

    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let common = dp[0][0];
    let ratio = 2.0 * common as f64 / (a.len() + b.len()) as f64;
    if ratio < HINT_RATIO {
        return None;
    }

    let mut old_marks = vec![' '; a.len()];
    let mut new_marks = vec![' '; b.len()];
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            old_marks[i] = '-';
            i += 1;
        } else {
            new_marks[j] = '+';
            j += 1;
        }
    }
    old_marks[i..].iter_mut().for_each(|c| *c = '-');
    new_marks[j..].iter_mut().for_each(|c| *c = '+');

    Some((render_marks(&old_marks), render_marks(&new_marks)))
}

fn render_marks(marks: &[char]) -> Option<String> {
    let s: String = marks.iter().collect();
    let trimmed = s.trim_end();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
