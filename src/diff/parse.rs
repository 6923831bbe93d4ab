//! Unified diff parsing.

use super::{Hunk, LineKind};

/// Parse every hunk of a unified diff.
///
/// ```text
/// --- a/script          (skipped: before the first header)
/// +++ b/script
/// @@ -3,2 +3,3 @@       header: old_start, old_lines, new_start, new_lines
///  context              ┐
/// -removed              │ hunk lines, kept with their prefix
/// +added                ┘
/// ```
///
/// Lines with any other prefix are ignored. Header-less or malformed input
/// yields no hunks. An empty line inside a hunk that still expects old lines is
/// read as an empty context line (generators often strip the lone space), and a
/// `---`/`+++` pair after a hunk whose counts are satisfied starts a new file
/// section rather than extending the hunk.
pub fn parse_unified_diff(text: &str) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;
    let mut old_seen = 0usize;
    let mut new_seen = 0usize;

    for line in text.lines() {
        if let Some(caps) = regex!(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").captures(line) {
            hunks.extend(current.take());
            old_seen = 0;
            new_seen = 0;

            let number = |idx: usize| caps.get(idx).map_or(Some(1), |m| m.as_str().parse::<usize>().ok());
            current = match (number(1), number(2), number(3), number(4)) {
                (Some(old_start), Some(old_lines), Some(new_start), Some(new_lines)) => {
                    Some(Hunk { old_start, old_lines, new_start, new_lines, lines: Vec::new() })
                }
                _ => None,
            };
            continue;
        }

        let Some(hunk) = current.as_mut() else { continue };

        let complete = old_seen >= hunk.old_lines && new_seen >= hunk.new_lines;
        if complete && (line.starts_with("--- ") || line.starts_with("+++ ")) {
            hunks.extend(current.take());
            continue;
        }

        match LineKind::of(line) {
            Some(kind) => {
                match kind {
                    LineKind::Context => {
                        old_seen += 1;
                        new_seen += 1;
                    }
                    LineKind::Removed => old_seen += 1,
                    LineKind::Added => new_seen += 1,
                    LineKind::NoNewline => {}
                }
                hunk.lines.push(line.to_string());
            }
            None if line.is_empty() && old_seen < hunk.old_lines => {
                old_seen += 1;
                new_seen += 1;
                hunk.lines.push(" ".to_string());
            }
            None => {}
        }
    }

    hunks.extend(current);
    hunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_lines() {
        let diff = "\
--- a/rule
+++ b/rule
@@ -1,3 +1,3 @@
 fn main(ctx) {
-    ctx[\"age\"] > 18
+    ctx[\"age\"] >= 18
 }
@@ -10 +10,2 @@ fn helper
 x
+y
";
        let hunks = parse_unified_diff(diff);
        assert_eq!(hunks.len(), 2);
        assert_eq!((hunks[0].old_start, hunks[0].old_lines, hunks[0].new_start, hunks[0].new_lines), (1, 3, 1, 3));
        assert_eq!(hunks[0].lines.len(), 4);
        assert_eq!((hunks[1].old_start, hunks[1].old_lines, hunks[1].new_start, hunks[1].new_lines), (10, 1, 10, 2));
        assert_eq!(hunks[1].lines, vec![" x", "+y"]);
    }

    #[test]
    fn headerless_or_garbage_input_yields_nothing() {
        assert!(parse_unified_diff("").is_empty());
        assert!(parse_unified_diff("+just an addition\n-and a removal").is_empty());
        assert!(parse_unified_diff("@@ -x,1 +1,1 @@\n+a").is_empty());
    }

    #[test]
    fn no_newline_marker_belongs_to_hunk() {
        let hunks = parse_unified_diff("@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b\n");
        assert_eq!(hunks[0].lines, vec!["-a", "\\ No newline at end of file", "+b"]);
    }

    #[test]
    fn empty_line_inside_hunk_is_blank_context() {
        let hunks = parse_unified_diff("@@ -1,3 +1,3 @@\n a\n\n-b\n+c\n");
        assert_eq!(hunks[0].lines, vec![" a", " ", "-b", "+c"]);
    }

    #[test]
    fn second_file_section_does_not_extend_previous_hunk() {
        let diff = "@@ -1 +1 @@\n-a\n+b\n--- a/other\n+++ b/other\n@@ -2 +2 @@\n-c\n+d\n";
        let hunks = parse_unified_diff(diff);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].lines, vec!["-a", "+b"]);
        assert_eq!(hunks[1].lines, vec!["-c", "+d"]);
    }
}
