use condwright::diff::Hunk;
use condwright::resolve::Resolution;
use condwright::sandbox::{AssertionReport, BatchReport, CaseOutcome, RowOutcome};
use condwright::{DuplicateGroup, ScriptError};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
        if self.enabled { format!("{}{}{}", color, s.as_ref(), ansi::RESET) } else { s.as_ref().to_string() }
    }

    fn bold(&self, s: impl AsRef<str>) -> String {
        if self.enabled { format!("{}{}{}", ansi::BOLD, s.as_ref(), ansi::RESET) } else { s.as_ref().to_string() }
    }

    fn dim(&self, s: impl AsRef<str>) -> String {
        if self.enabled { format!("{}{}{}", ansi::DIM, s.as_ref(), ansi::RESET) } else { s.as_ref().to_string() }
    }

    fn section(&self, title: &str) -> String {
        self.paint(format!("━━━ {title} ━━━"), ansi::GRAY)
    }
}

pub fn print_variables(name: &str, resolution: &Resolution, keys: &[String], palette: &Palette) {
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Variables: {name}"), ansi::CYAN)));

    println!("\n{}", palette.section("Used variables"));
    if resolution.variables.is_empty() {
        println!("{}", palette.dim("  No variable references found"));
        println!("\n{}", palette.dim(format!("  Tip: Set {}=1 to see which strategies ran", condwright::DEBUG_ENV)));
    }
    for (idx, var) in resolution.variables.iter().enumerate() {
        println!("  {} {}", palette.paint(format!("[{idx}]"), ansi::GRAY), palette.paint(var, ansi::GREEN));
    }

    let strategies: Vec<&str> = resolution.strategies.iter_names().map(|(name, _)| name).collect();
    let source = if resolution.authoritative { "declared inputs list" } else { "fallback strategies" };
    println!(
        "\n  {} {}  {} {}",
        palette.dim("source:"),
        palette.paint(source, ansi::BLUE),
        palette.dim("│ strategies:"),
        palette.paint(if strategies.is_empty() { "none".to_string() } else { strategies.join(", ") }, ansi::CYAN),
    );

    println!("\n{}", palette.section("Context keys"));
    if keys.is_empty() {
        println!("{}", palette.dim("  No direct context reads"));
    } else {
        println!("  {}", keys.iter().map(|k| palette.paint(k, ansi::YELLOW)).collect::<Vec<_>>().join(", "));
    }
    println!();
}

pub fn print_groups(total: usize, groups: &[DuplicateGroup], palette: &Palette) {
    println!("\n{}", palette.section("Duplicate tails"));
    if groups.is_empty() {
        println!("{}", palette.dim(format!("  No collisions among {total} variables")));
        println!();
        return;
    }
    for group in groups {
        println!(
            "  {} {}",
            palette.bold(palette.paint(&group.tail, ansi::YELLOW)),
            palette.dim(format!("(\"{}\")", group.spoken_tail()))
        );
        for option in &group.options {
            println!("    {} {}", palette.dim("•"), palette.paint(option, ansi::CYAN));
        }
    }
    println!();
}

/// Hunk-by-hunk summary on stderr, so the patched text on stdout stays clean.
pub fn print_patch_summary(hunks: &[Hunk], selected: &[bool], applied: usize, palette: &Palette) {
    for (idx, hunk) in hunks.iter().enumerate() {
        let mark = if selected.get(idx).copied().unwrap_or(true) {
            palette.paint("✓ applied", ansi::GREEN)
        } else {
            palette.dim("✗ skipped")
        };
        eprintln!(
            "  {} {} {} {}",
            palette.paint(format!("[{idx}]"), ansi::GRAY),
            palette.paint(hunk.header(), ansi::BLUE),
            palette.dim(format!("+{} -{}", hunk.added(), hunk.removed())),
            mark
        );
    }
    eprintln!("  {}", palette.bold(format!("{applied} of {} hunks applied", hunks.len())));
}

pub fn print_diff(text: &str, palette: &Palette) {
    if text.is_empty() {
        eprintln!("{}", palette.dim("  No differences"));
        return;
    }
    for line in text.lines() {
        let painted = if line.starts_with("---") || line.starts_with("+++") {
            palette.bold(line)
        } else if line.starts_with("@@") {
            palette.paint(line, ansi::CYAN)
        } else if line.starts_with('+') {
            palette.paint(line, ansi::GREEN)
        } else if line.starts_with('-') {
            palette.paint(line, ansi::RED)
        } else {
            line.to_string()
        };
        println!("{painted}");
    }
}

fn fmt_error(error: &ScriptError, palette: &Palette) -> String {
    let at = match (error.line, error.column) {
        (Some(line), Some(col)) => format!(" at {line}:{col}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    };
    format!("{}{}", palette.paint(&error.message, ansi::RED), palette.dim(at))
}

fn print_totals(pass: usize, fail: usize, elapsed: std::time::Duration, palette: &Palette) {
    println!("\n{}", palette.section("Summary"));
    println!(
        "  Pass: {}  │  Fail: {}  │  Elapsed: {}",
        palette.paint(pass.to_string(), ansi::GREEN),
        if fail > 0 { palette.paint(fail.to_string(), ansi::RED) } else { palette.dim("0") },
        palette.dim(format!("{elapsed:?}")),
    );
    println!();
}

pub fn print_batch(report: &BatchReport, palette: &Palette) {
    println!(
        "\n{}",
        palette.bold(palette.paint(format!("⚙  Test batch ({} rows)", report.rows.len()), ansi::CYAN))
    );
    println!("  {}", palette.dim(format!("started {}", report.started_at.to_rfc3339())));

    if let Some(error) = &report.compile_error {
        println!("\n{}", palette.section("Compile error"));
        println!("  {}", fmt_error(error, palette));
    }

    println!("\n{}", palette.section("Rows"));
    for (idx, row) in report.rows.iter().enumerate() {
        let expected = if row.expected.as_bool() { "true" } else { "false" };
        let verdict = match &row.outcome {
            RowOutcome::Pass { value } => palette.paint(format!("✓ {value}"), ansi::GREEN),
            RowOutcome::Fail { value } => palette.paint(format!("✗ got {value}, expected {expected}"), ansi::YELLOW),
            RowOutcome::Error { error } if report.compile_error.is_some() => {
                palette.dim(format!("✗ not run ({})", error.message.lines().next().unwrap_or_default()))
            }
            RowOutcome::Error { error } => format!("{} {}", palette.paint("✗ error:", ansi::RED), fmt_error(error, palette)),
        };
        println!("  {} {} {}", palette.paint(format!("[{idx}]"), ansi::GRAY), palette.dim(&row.id), verdict);
    }

    print_totals(report.pass, report.fail, report.elapsed, palette);
}

pub fn print_assertions(report: &AssertionReport, palette: &Palette) {
    println!(
        "\n{}",
        palette.bold(palette.paint(format!("⚙  Assertion batch ({} cases)", report.cases.len()), ansi::CYAN))
    );

    if let Some(error) = &report.compile_error {
        println!("\n{}", palette.section("Compile error"));
        println!("  {}", fmt_error(error, palette));
    }

    println!("\n{}", palette.section("Cases"));
    for case in &report.cases {
        let actual = case.actual.as_ref().map(|v| v.to_string()).unwrap_or_default();
        match &case.outcome {
            CaseOutcome::Pass => {
                println!("  {} {} {}", palette.paint("✓", ansi::GREEN), palette.paint(&case.id, ansi::BLUE), palette.dim(actual));
            }
            CaseOutcome::Fail { failures } => {
                println!("  {} {} {}", palette.paint("✗", ansi::YELLOW), palette.paint(&case.id, ansi::BLUE), palette.dim(actual));
                for failure in failures {
                    println!("      {}", palette.paint(failure, ansi::YELLOW));
                }
            }
            CaseOutcome::Error { error } => {
                println!("  {} {} {}", palette.paint("✗", ansi::RED), palette.paint(&case.id, ansi::BLUE), fmt_error(error, palette));
            }
        }
    }

    print_totals(report.pass, report.fail, report.elapsed, palette);
}
