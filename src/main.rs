mod debug_report;

use condwright::resolve;
use condwright::{
    AssertionCase, MemoryDirectory, Options, TestRow, apply_hunks, extract_keys, find_duplicate_groups,
    parse_unified_diff, run_assertion_batch_with, run_test_batch_with, to_display_form, to_storage_form,
};
use serde_json::Value;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    init_tracing(config.options.debug);

    match run(&config) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "condwright=debug" } else { "condwright=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

enum Command {
    Vars { script: PathBuf },
    Dupes { variables: PathBuf },
    Encode { script: PathBuf, directory: PathBuf },
    Decode { script: PathBuf, directory: PathBuf },
    Patch { original: PathBuf, diff: PathBuf, skip: Vec<usize> },
    Diff { old: PathBuf, new: PathBuf },
    Test { script: PathBuf, cases: PathBuf },
}

struct CliConfig {
    command: Command,
    options: Options,
    color: bool,
}

fn run(config: &CliConfig) -> Result<i32, String> {
    let palette = debug_report::Palette::new(config.color);

    match &config.command {
        Command::Vars { script } => {
            let source = read_input(script)?;
            let resolution = resolve::resolve_variables(&source, config.options.debug);
            let keys = extract_keys(&source);
            debug_report::print_variables(&display_name(script), &resolution, &keys, &palette);
        }
        Command::Dupes { variables } => {
            let variables = read_variables(variables)?;
            let groups = find_duplicate_groups(&variables);
            debug_report::print_groups(variables.len(), &groups, &palette);
        }
        Command::Encode { script, directory } => {
            let directory = load_directory(directory)?;
            print!("{}", to_storage_form(&read_input(script)?, &directory));
        }
        Command::Decode { script, directory } => {
            let directory = load_directory(directory)?;
            print!("{}", to_display_form(&read_input(script)?, &directory));
        }
        Command::Patch { original, diff, skip } => {
            let original = read_input(original)?;
            let hunks = parse_unified_diff(&read_input(diff)?);
            let selected: Vec<bool> = (0..hunks.len()).map(|idx| !skip.contains(&idx)).collect();
            let applied = apply_hunks(&original, &hunks, &selected);
            print!("{}", applied.text);
            debug_report::print_patch_summary(&hunks, &selected, applied.applied_count, &palette);
        }
        Command::Diff { old, new } => {
            let text = condwright::diff::unified_diff(&read_input(old)?, &read_input(new)?, config.options.diff_context);
            debug_report::print_diff(&text, &palette);
        }
        Command::Test { script, cases } => {
            let script = read_input(script)?;
            let cases = read_input(cases)?;
            let cases: Vec<Value> =
                serde_json::from_str(&cases).map_err(|err| format!("error: invalid test cases: {err}"))?;

            if !cases.is_empty() && cases.iter().all(|c| c.get("assertions").is_some()) {
                let cases: Vec<AssertionCase> = serde_json::from_value(Value::Array(cases))
                    .map_err(|err| format!("error: invalid assertion cases: {err}"))?;
                let report = run_assertion_batch_with(&script, &cases, &config.options);
                debug_report::print_assertions(&report, &palette);
                return Ok(if report.fail == 0 { 0 } else { 1 });
            }

            let rows: Vec<TestRow> = serde_json::from_value(Value::Array(cases))
                .map_err(|err| format!("error: invalid test rows: {err}"))?;
            let report = run_test_batch_with(&script, &rows, &config.options);
            debug_report::print_batch(&report, &palette);
            return Ok(if report.fail == 0 { 0 } else { 1 });
        }
    }

    Ok(0)
}

fn display_name(path: &Path) -> String {
    if path == Path::new("-") { "<stdin>".to_string() } else { path.display().to_string() }
}

/// Read a file, or stdin for `-`.
fn read_input(path: &Path) -> Result<String, String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).map_err(|err| format!("error: failed to read {}: {err}", path.display()))
}

/// A JSON array of strings, or one variable path per line.
fn read_variables(path: &Path) -> Result<Vec<String>, String> {
    let text = read_input(path)?;
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(&text).map_err(|err| format!("error: invalid variable list: {err}"));
    }
    Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}

fn load_directory(path: &Path) -> Result<MemoryDirectory, String> {
    MemoryDirectory::load(path).map_err(|err| format!("error: {err}"))
}

fn parse_skip(value: &str) -> Result<Vec<usize>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| format!("error: invalid hunk index '{s}' in --skip")))
        .collect()
}

fn parse_args() -> Result<CliConfig, String> {
    let mut positionals: Vec<String> = Vec::new();
    let mut directory: Option<PathBuf> = None;
    let mut cases: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut skip: Vec<usize> = Vec::new();
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, String> {
            inline.clone().or_else(|| args.next()).ok_or_else(|| format!("error: {name} expects a value"))
        };

        match flag.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("condwright {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--directory" => directory = Some(PathBuf::from(value("--directory")?)),
            "--cases" => cases = Some(PathBuf::from(value("--cases")?)),
            "--config" => config_path = Some(PathBuf::from(value("--config")?)),
            "--skip" => skip.extend(parse_skip(&value("--skip")?)?),
            "-" => positionals.push(arg),
            _ if flag.starts_with('-') => return Err(format!("error: unknown option '{arg}'")),
            _ => positionals.push(arg),
        }
    }

    let mut positionals = positionals.into_iter();
    let Some(name) = positionals.next() else {
        return Err(format!("error: no command given\n\n{}", help_text()));
    };
    let mut operand = |what: &str| -> Result<PathBuf, String> {
        positionals.next().map(PathBuf::from).ok_or_else(|| format!("error: {name} expects {what}"))
    };
    let require = |flag: Option<PathBuf>, what: &str| flag.ok_or_else(|| format!("error: {what} is required"));

    let command = match name.as_str() {
        "vars" => Command::Vars { script: operand("<script>")? },
        "dupes" => Command::Dupes { variables: operand("<vars-file>")? },
        "encode" => Command::Encode { script: operand("<script>")?, directory: require(directory, "--directory")? },
        "decode" => Command::Decode { script: operand("<script>")?, directory: require(directory, "--directory")? },
        "patch" => Command::Patch { original: operand("<original>")?, diff: operand("<diff>")?, skip },
        "diff" => Command::Diff { old: operand("<old>")?, new: operand("<new>")? },
        "test" => Command::Test { script: operand("<script>")?, cases: require(cases, "--cases")? },
        other => return Err(format!("error: unknown command '{other}'\n\n{}", help_text())),
    };
    if let Some(extra) = positionals.next() {
        return Err(format!("error: unexpected argument '{extra}'"));
    }

    let options = match &config_path {
        Some(path) => Options::load(path),
        None => Ok(Options::default()),
    }
    .and_then(Options::with_env)
    .map_err(|err| format!("error: {err}"))?;

    Ok(CliConfig { command, options, color })
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "condwright {version}

Author and verify predicate scripts.

Usage:
  condwright [OPTIONS] vars <script>
  condwright [OPTIONS] dupes <vars-file>
  condwright [OPTIONS] encode <script> --directory <json>
  condwright [OPTIONS] decode <script> --directory <json>
  condwright [OPTIONS] patch <original> <diff> [--skip i,j]
  condwright [OPTIONS] diff <old> <new>
  condwright [OPTIONS] test <script> --cases <json>

Any file argument may be '-' to read stdin.

Options:
  --directory <json>    Name directory: an object mapping labels to stable IDs.
  --cases <json>        Test rows ({{\"label\": \"true\", \"vars\": {{...}}}}) or
                        assertion cases ({{\"vars\": {{...}}, \"assertions\": [...]}}).
  --skip <i,j>          Zero-based hunk indexes to leave unapplied.
  --config <json>       Options file (debug, limits, diff_context).
  --color               Force ANSI color output.
  --no-color            Disable ANSI color output.
  -h, --help            Show this help message.
  -V, --version         Print version information.

Environment:
  {debug}         Verbose diagnostics on stderr.
  {ops}   Operation budget per test case.
  {timeout}  Wall-clock budget per test case.

Exit codes:
  0  Success.
  1  Failing test cases or internal error.
  2  Invalid arguments or configuration.
",
        version = env!("CARGO_PKG_VERSION"),
        debug = condwright::DEBUG_ENV,
        ops = condwright::MAX_OPERATIONS_ENV,
        timeout = condwright::CASE_TIMEOUT_ENV,
    )
}
