//! Selective hunk application.

use super::{Hunk, LineKind};

/// Result of [`apply_hunks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub text: String,
    /// Number of hunks whose changes were replayed.
    pub applied_count: usize,
}

/// Apply the selected subset of `hunks` to `original`.
///
/// A cursor walks the original's lines. For each hunk, in ascending
/// `old_start` order:
///
/// ```text
/// copy original[cursor .. old_start-1]          (verbatim)
/// selected?   ──yes──▶ replay hunk lines:
///                        '+'  emit patch text     cursor stays
///                        ' '  emit original line  cursor += 1
///                        '-'  emit nothing        cursor += 1
///             ──no───▶ copy old_lines original lines, cursor += old_lines
/// ```
///
/// A deselected hunk consumes exactly the lines it would have replaced, so
/// later hunks stay aligned with their absolute offsets. Lines left after the
/// last hunk are copied verbatim. `selected` entries missing for a hunk count
/// as selected.
///
/// A hunk with `old_lines == 0` is a pure insertion *after* line `old_start`
/// (standard unified-diff convention), so it copies through `old_start` lines.
///
/// Copied lines keep their own terminators, so CRLF input stays CRLF. Added
/// lines take the original's line ending.
///
/// The result keeps the original's trailing-newline state unless a selected
/// hunk carries a `\ No newline at end of file` marker saying otherwise.
pub fn apply_hunks(original: &str, hunks: &[Hunk], selected: &[bool]) -> Applied {
    let source: Vec<(&str, &str)> = original.split_inclusive('\n').map(split_ending).collect();
    let eol = if original.contains("\r\n") { "\r\n" } else { "\n" };
    let mut trailing_newline = original.ends_with('\n');

    let mut order: Vec<usize> = (0..hunks.len()).collect();
    order.sort_by_key(|&idx| hunks[idx].old_start);

    let mut out: Vec<(&str, &str)> = Vec::with_capacity(source.len());
    let mut cursor = 0usize;
    let mut applied_count = 0usize;

    for idx in order {
        let hunk = &hunks[idx];
        let target = if hunk.old_lines == 0 { hunk.old_start } else { hunk.old_start.saturating_sub(1) };
        let target = target.min(source.len());
        if cursor < target {
            out.extend_from_slice(&source[cursor..target]);
            cursor = target;
        }

        if !selected.get(idx).copied().unwrap_or(true) {
            // The cursor may already sit past the end when an earlier hunk overran it.
            let start = cursor.min(source.len());
            let end = (cursor + hunk.old_lines).min(source.len());
            out.extend_from_slice(&source[start..end]);
            cursor += hunk.old_lines;
            continue;
        }

        let mut previous: Option<LineKind> = None;
        for line in &hunk.lines {
            let Some(kind) = LineKind::of(line) else { continue };
            match kind {
                LineKind::Added => out.push((&line[1..], eol)),
                LineKind::Context => {
                    out.push(source.get(cursor).copied().unwrap_or((&line[1..], eol)));
                    cursor += 1;
                }
                LineKind::Removed => cursor += 1,
                LineKind::NoNewline => match previous {
                    Some(LineKind::Added) | Some(LineKind::Context) => trailing_newline = false,
                    Some(LineKind::Removed) => trailing_newline = true,
                    _ => {}
                },
            }
            previous = Some(kind);
        }
        applied_count += 1;
    }

    if cursor < source.len() {
        out.extend_from_slice(&source[cursor..]);
    }

    let mut text = String::with_capacity(original.len());
    let last = out.len().saturating_sub(1);
    for (idx, (body, ending)) in out.iter().enumerate() {
        text.push_str(body);
        if idx < last || trailing_newline {
            text.push_str(if ending.is_empty() { eol } else { ending });
        }
    }

    Applied { text, applied_count }
}

/// Split one `split_inclusive` piece into its body and terminator.
fn split_ending(piece: &str) -> (&str, &str) {
    let body = piece.strip_suffix('\n').map_or(piece, |rest| rest.strip_suffix('\r').unwrap_or(rest));
    (body, &piece[body.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parse_unified_diff;

    const ORIGINAL: &str = "\
fn main(ctx) {
    let age = ctx[\"age\"];
    let country = ctx[\"country\"];
    let ok = age > 18;
    // unused
    ok && country == \"SE\"
}
";

    const TWO_HUNKS: &str = "\
@@ -2,2 +2,2 @@
-    let age = ctx[\"age\"];
+    let age = getVar(ctx, \"age\");
     let country = ctx[\"country\"];
@@ -4,3 +4,2 @@
-    let ok = age > 18;
-    // unused
+    let ok = age >= 18;
     ok && country == \"SE\"
";

    #[test]
    fn all_selected_applies_every_hunk() {
        let hunks = parse_unified_diff(TWO_HUNKS);
        let applied = apply_hunks(ORIGINAL, &hunks, &[true, true]);
        assert_eq!(applied.applied_count, 2);
        assert_eq!(
            applied.text,
            "\
fn main(ctx) {
    let age = getVar(ctx, \"age\");
    let country = ctx[\"country\"];
    let ok = age >= 18;
    ok && country == \"SE\"
}
"
        );
    }

    #[test]
    fn first_selected_second_deselected_keeps_order() {
        let hunks = parse_unified_diff(TWO_HUNKS);
        let applied = apply_hunks(ORIGINAL, &hunks, &[true, false]);
        assert_eq!(applied.applied_count, 1);
        assert_eq!(
            applied.text,
            "\
fn main(ctx) {
    let age = getVar(ctx, \"age\");
    let country = ctx[\"country\"];
    let ok = age > 18;
    // unused
    ok && country == \"SE\"
}
"
        );
    }

    #[test]
    fn first_deselected_still_consumes_its_old_lines() {
        let hunks = parse_unified_diff(TWO_HUNKS);
        let applied = apply_hunks(ORIGINAL, &hunks, &[false, true]);
        assert_eq!(applied.applied_count, 1);
        assert_eq!(
            applied.text,
            "\
fn main(ctx) {
    let age = ctx[\"age\"];
    let country = ctx[\"country\"];
    let ok = age >= 18;
    ok && country == \"SE\"
}
"
        );
    }

    #[test]
    fn overrunning_hunk_does_not_break_later_deselected_ones() {
        let hunks = parse_unified_diff("@@ -1,3 +1,1 @@\n-a\n-b\n-c\n+x\n@@ -5,1 +3,1 @@\n-e\n+f\n");
        let applied = apply_hunks("a\n", &hunks, &[true, false]);
        assert_eq!(applied.applied_count, 1);
        assert_eq!(applied.text, "x\n");

        assert_eq!(apply_hunks("a\n", &hunks, &[false, false]).text, "a\n");
    }

    #[test]
    fn crlf_lines_are_preserved() {
        let original = "a\r\nb\r\nc\r\n";
        let hunks = parse_unified_diff("@@ -2,1 +2,2 @@\n-b\n+B\n+b2\n");
        assert_eq!(apply_hunks(original, &hunks, &[false]).text, original);
        assert_eq!(apply_hunks(original, &hunks, &[true]).text, "a\r\nB\r\nb2\r\nc\r\n");
    }

    #[test]
    fn missing_final_newline_is_kept_when_lines_follow_it() {
        let hunks = parse_unified_diff("@@ -1,0 +2 @@\n+b\n");
        assert_eq!(apply_hunks("a", &hunks, &[true]).text, "a\nb");
    }

    #[test]
    fn nothing_selected_is_identity() {
        let hunks = parse_unified_diff(TWO_HUNKS);
        let applied = apply_hunks(ORIGINAL, &hunks, &[false, false]);
        assert_eq!(applied.applied_count, 0);
        assert_eq!(applied.text, ORIGINAL);
    }

    #[test]
    fn missing_mask_entries_count_as_selected() {
        let hunks = parse_unified_diff(TWO_HUNKS);
        assert_eq!(apply_hunks(ORIGINAL, &hunks, &[]).applied_count, 2);
    }

    #[test]
    fn insertion_hunks_follow_unified_convention() {
        let at_top = parse_unified_diff("@@ -0,0 +1 @@\n+first\n");
        assert_eq!(apply_hunks("a\nb\n", &at_top, &[true]).text, "first\na\nb\n");

        let after_first = parse_unified_diff("@@ -1,0 +2 @@\n+middle\n");
        assert_eq!(apply_hunks("a\nb\n", &after_first, &[true]).text, "a\nmiddle\nb\n");
    }

    #[test]
    fn no_newline_marker_drops_trailing_newline() {
        let hunks = parse_unified_diff("@@ -1 +1 @@\n-a\n+b\n\\ No newline at end of file\n");
        assert_eq!(apply_hunks("a\n", &hunks, &[true]).text, "b");
    }
}
