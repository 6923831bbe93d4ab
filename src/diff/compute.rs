//! Line diff computation.
//!
//! Produces the hunks that turn one script into another, so a proposed rewrite
//! can be reviewed and accepted hunk by hunk. The line alignment is a plain
//! longest-common-subsequence table; scripts are small enough that the
//! quadratic table is not a concern.

use super::Hunk;

const NO_NEWLINE: &str = "\\ No newline at end of file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal(usize),
    Remove(usize),
    Add(usize),
}

/// A line body, flagged when it is the last line and has no terminator.
type Line<'a> = (&'a str, bool);

fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines: Vec<Line<'_>> = text.lines().map(|line| (line, false)).collect();
    if !text.ends_with('\n') {
        if let Some(last) = lines.last_mut() {
            last.1 = true;
        }
    }
    lines
}

fn line_ops(old: &[Line<'_>], new: &[Line<'_>]) -> Vec<Op> {
    let n = old.len();
    let m = new.len();

    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] { lcs[i + 1][j + 1] + 1 } else { lcs[i + 1][j].max(lcs[i][j + 1]) };
        }
    }

    let mut i = 0;
    let mut j = 0;
    let mut ops = Vec::with_capacity(n + m);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(Op::Equal(i));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(Op::Remove(i));
            i += 1;
        } else {
            ops.push(Op::Add(j));
            j += 1;
        }
    }
    ops.extend((i..n).map(Op::Remove));
    ops.extend((j..m).map(Op::Add));
    ops
}

/// Hunks turning `old` into `new`, each with up to `context` lines of
/// surrounding context. Changes closer than `2 * context` lines share a hunk.
///
/// A last line without a terminator differs from the same line with one, and
/// is followed by a `\ No newline at end of file` marker.
pub fn diff_hunks(old: &str, new: &str, context: usize) -> Vec<Hunk> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let ops = line_ops(&old_lines, &new_lines);

    // Spans of op indices to emit, after widening each change by `context`.
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for (idx, op) in ops.iter().enumerate() {
        if matches!(op, Op::Equal(_)) {
            continue;
        }
        let start = idx.saturating_sub(context);
        let end = (idx + 1 + context).min(ops.len());
        match spans.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => spans.push((start, end)),
        }
    }

    // Old/new lines consumed before each op index.
    let mut old_before = Vec::with_capacity(ops.len() + 1);
    let mut new_before = Vec::with_capacity(ops.len() + 1);
    let (mut o, mut n) = (0usize, 0usize);
    for op in &ops {
        old_before.push(o);
        new_before.push(n);
        match op {
            Op::Equal(_) => {
                o += 1;
                n += 1;
            }
            Op::Remove(_) => o += 1,
            Op::Add(_) => n += 1,
        }
    }

    spans
        .into_iter()
        .map(|(start, end)| {
            let mut lines = Vec::with_capacity(end - start);
            let (mut old_count, mut new_count) = (0usize, 0usize);
            for op in &ops[start..end] {
                let (prefix, (body, unterminated)) = match *op {
                    Op::Equal(i) => {
                        old_count += 1;
                        new_count += 1;
                        (' ', old_lines[i])
                    }
                    Op::Remove(i) => {
                        old_count += 1;
                        ('-', old_lines[i])
                    }
                    Op::Add(j) => {
                        new_count += 1;
                        ('+', new_lines[j])
                    }
                };
                lines.push(format!("{prefix}{body}"));
                if unterminated {
                    lines.push(NO_NEWLINE.to_string());
                }
            }
            // An empty side points at the line before it (0 at file start).
            let old_start = if old_count == 0 { old_before[start] } else { old_before[start] + 1 };
            let new_start = if new_count == 0 { new_before[start] } else { new_before[start] + 1 };
            Hunk { old_start, old_lines: old_count, new_start, new_lines: new_count, lines }
        })
        .collect()
}

/// Render the diff from `old` to `new` as unified-diff text.
pub fn unified_diff(old: &str, new: &str, context: usize) -> String {
    let hunks = diff_hunks(old, new, context);
    if hunks.is_empty() {
        return String::new();
    }
    let mut out = String::from("--- original\n+++ proposed\n");
    for hunk in &hunks {
        out.push_str(&hunk.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{apply_hunks, parse_unified_diff};
    use proptest::prelude::*;

    #[test]
    fn identical_texts_have_no_hunks() {
        assert!(diff_hunks("a\nb\n", "a\nb\n", 3).is_empty());
        assert_eq!(unified_diff("a\n", "a\n", 3), "");
    }

    #[test]
    fn distant_changes_get_separate_hunks() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n";
        let new = "1\nTWO\n3\n4\n5\n6\n7\n8\nNINE\n10\n";
        let hunks = diff_hunks(old, new, 1);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].header(), "@@ -1,3 +1,3 @@");
        assert_eq!(hunks[1].header(), "@@ -8,3 +8,3 @@");
    }

    #[test]
    fn rendered_diff_parses_back() {
        let old = "fn main(ctx) {\n    ctx.age > 18\n}\n";
        let new = "fn main(ctx) {\n    ctx.age >= 18\n}\n";
        let text = unified_diff(old, new, 3);
        assert_eq!(parse_unified_diff(&text), diff_hunks(old, new, 3));
    }

    #[test]
    fn final_newline_change_is_a_hunk() {
        let hunks = diff_hunks("a\nb", "a\nb\n", 3);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines, vec![" a", "-b", "\\ No newline at end of file", "+b"]);
        assert_eq!(apply_hunks("a\nb", &hunks, &[true]).text, "a\nb\n");

        let dropped = diff_hunks("a\n", "a", 3);
        assert_eq!(dropped[0].lines, vec!["-a", "+a", "\\ No newline at end of file"]);
        assert_eq!(apply_hunks("a\n", &dropped, &[true]).text, "a");
    }

    fn text_from(lines: &[String]) -> String {
        lines.iter().map(|l| format!("{l}\n")).collect()
    }

    proptest! {
        #[test]
        fn applying_all_hunks_reaches_target(
            old in proptest::collection::vec("[abc]{0,2}", 0..12),
            new in proptest::collection::vec("[abc]{0,2}", 0..12),
            context in 0usize..4,
        ) {
            let old = text_from(&old);
            let new = text_from(&new);
            let hunks = diff_hunks(&old, &new, context);
            let applied = apply_hunks(&old, &hunks, &vec![true; hunks.len()]);
            prop_assert_eq!(applied.applied_count, hunks.len());
            prop_assert!(diff_hunks(&applied.text, &new, context).is_empty());
            prop_assert_eq!(applied.text.lines().collect::<Vec<_>>(), new.lines().collect::<Vec<_>>());
        }

        #[test]
        fn deselecting_everything_is_identity(
            old in proptest::collection::vec("[abc]{0,2}", 0..12),
            new in proptest::collection::vec("[abc]{0,2}", 0..12),
        ) {
            let old = text_from(&old);
            let new = text_from(&new);
            let hunks = diff_hunks(&old, &new, 2);
            let applied = apply_hunks(&old, &hunks, &vec![false; hunks.len()]);
            prop_assert_eq!(applied.applied_count, 0);
            prop_assert_eq!(applied.text, old);
        }
    }
}
