//! Unified diff engine.
//!
//! Proposed rewrites of a script arrive (or are computed) as unified diffs and
//! are accepted hunk by hunk, so an author can take a variable-reference fix and
//! reject a reformatting hunk from the same patch.
//!
//! ```text
//! diff text ── parse_unified_diff (parse.rs) ──▶ Vec<Hunk>
//! old, new  ── diff_hunks        (compute.rs) ──▶ Vec<Hunk>
//!                                                   │  + selection mask
//!                                                   ▼
//!                                   apply_hunks (apply.rs) ──▶ Applied { text, applied_count }
//! ```
//!
//! ## Invariants
//!
//! - Every hunk carries absolute old-file offsets; selecting or deselecting
//!   one never changes how another is applied.
//! - Hunks are applied in ascending `old_start` order.
//! - Parsing never fails: malformed input yields fewer (or no) hunks.

#[path = "diff/apply.rs"]
mod apply;
#[path = "diff/compute.rs"]
mod compute;
#[path = "diff/parse.rs"]
mod parse;

pub use apply::{Applied, apply_hunks};
pub use compute::{diff_hunks, unified_diff};
pub use parse::parse_unified_diff;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of context lines around computed changes.
pub const DEFAULT_CONTEXT: usize = 3;

/// One contiguous change region of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// 1-based first old line (for `old_lines == 0`: the line before the insertion).
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    /// Lines including their `+`, `-`, space or `\` prefix.
    pub lines: Vec<String>,
}

impl Hunk {
    /// `@@ -old_start,old_lines +new_start,new_lines @@`
    pub fn header(&self) -> String {
        format!("@@ -{},{} +{},{} @@", self.old_start, self.old_lines, self.new_start, self.new_lines)
    }

    pub fn added(&self) -> usize {
        self.lines.iter().filter(|l| LineKind::of(l) == Some(LineKind::Added)).count()
    }

    pub fn removed(&self) -> usize {
        self.lines.iter().filter(|l| LineKind::of(l) == Some(LineKind::Removed)).count()
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Classification of a hunk line by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    Added,
    Removed,
    Context,
    NoNewline,
}

impl LineKind {
    pub(crate) fn of(line: &str) -> Option<LineKind> {
        match line.as_bytes().first() {
            Some(b'+') => Some(LineKind::Added),
            Some(b'-') => Some(LineKind::Removed),
            Some(b' ') => Some(LineKind::Context),
            Some(b'\\') => Some(LineKind::NoNewline),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_parser() {
        let hunk = Hunk {
            old_start: 4,
            old_lines: 2,
            new_start: 4,
            new_lines: 1,
            lines: vec!["-a".into(), "-b".into(), "+c".into()],
        };
        assert_eq!(hunk.to_string(), "@@ -4,2 +4,1 @@\n-a\n-b\n+c\n");
        assert_eq!(parse_unified_diff(&hunk.to_string()), vec![hunk.clone()]);
        assert_eq!((hunk.added(), hunk.removed()), (1, 2));
    }
}
