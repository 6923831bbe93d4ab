use crate::codec::{self, NameDirectory};
use crate::diff::{self, Applied, Hunk};
use crate::duplicates::{self, DuplicateGroup};
use crate::error::ConfigError;
use crate::resolve;
use crate::sandbox::{self, AssertionCase, AssertionReport, BatchReport, SandboxLimits, TestRow};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment switch for verbose `tracing` diagnostics.
pub const DEBUG_ENV: &str = "CONDWRIGHT_DEBUG";
pub const MAX_OPERATIONS_ENV: &str = "CONDWRIGHT_MAX_OPERATIONS";
pub const CASE_TIMEOUT_ENV: &str = "CONDWRIGHT_CASE_TIMEOUT_MS";

/// Options shared by every component.
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use condwright::Options;
///
/// let options = Options::from_json(r#"{ "debug": true, "limits": { "case_timeout_ms": 250 } }"#).unwrap();
/// assert!(options.debug);
/// assert_eq!(options.limits.case_timeout_ms, 250);
/// assert_eq!(options.limits.max_operations, 500_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Emit verbose `tracing` events from the resolver, codec, sandbox and session.
    pub debug: bool,
    /// Per-case execution budget for test batches.
    pub limits: SandboxLimits,
    /// Context lines around computed diff hunks.
    pub diff_context: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options { debug: false, limits: SandboxLimits::default(), diff_context: diff::DEFAULT_CONTEXT }
    }
}

fn env_number<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{name} must be a non-negative integer, got {raw:?}"))),
        None => Ok(None),
    }
}

impl Options {
    /// Defaults overlaid with `CONDWRIGHT_DEBUG`, `CONDWRIGHT_MAX_OPERATIONS`
    /// and `CONDWRIGHT_CASE_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Options::default().with_env()
    }

    /// `self` overlaid with whatever the environment sets.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if var(DEBUG_ENV).is_some() {
            self.debug = true;
        }
        if let Some(ops) = env_number(MAX_OPERATIONS_ENV, var(MAX_OPERATIONS_ENV))? {
            self.limits.max_operations = ops;
        }
        if let Some(ms) = env_number(CASE_TIMEOUT_ENV, var(CASE_TIMEOUT_ENV))? {
            self.limits.case_timeout_ms = ms;
        }
        self.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.limits.case_timeout_ms == 0 {
            return Err(ConfigError::Invalid("limits.case_timeout_ms must be positive".into()));
        }
        Ok(self)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let options: Options = serde_json::from_str(text)?;
        options.validated()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Options::from_json(&text)
    }
}

/// Variable names a script references, in first-appearance order.
///
/// ```
/// let vars = condwright::extract_used_variables(r#"fn main(ctx) { getVar(ctx, "Applicant.Age") >= 18 }"#);
/// assert_eq!(vars, vec!["Applicant.Age"]);
/// ```
pub fn extract_used_variables(script: &str) -> Vec<String> {
    resolve::extract_used_variables(script)
}

/// Context keys read through `ctx`/`vars` subscripts and member access.
pub fn extract_keys(script: &str) -> Vec<String> {
    resolve::extract_keys(script)
}

pub fn surface_variables(used: &[String]) -> Vec<String> {
    resolve::surface_variables(used)
}

pub fn find_duplicate_groups(variables: &[String]) -> Vec<DuplicateGroup> {
    duplicates::find_duplicate_groups(variables)
}

/// Replace display labels with stable IDs.
pub fn to_storage_form(script: &str, directory: &dyn NameDirectory) -> String {
    codec::to_storage_form(script, directory)
}

/// Replace stable IDs with display labels; unknown IDs pass through.
pub fn to_display_form(script: &str, directory: &dyn NameDirectory) -> String {
    codec::to_display_form(script, directory)
}

pub fn parse_unified_diff(text: &str) -> Vec<Hunk> {
    diff::parse_unified_diff(text)
}

pub fn apply_hunks(original: &str, hunks: &[Hunk], selected: &[bool]) -> Applied {
    diff::apply_hunks(original, hunks, selected)
}

/// Unified diff from `old` to `new` with the default context.
pub fn unified_diff(old: &str, new: &str) -> String {
    diff::unified_diff(old, new, diff::DEFAULT_CONTEXT)
}

/// Run `rows` against `script` with default [`Options`].
pub fn run_test_batch(script: &str, rows: &[TestRow]) -> BatchReport {
    run_test_batch_with(script, rows, &Options::default())
}

pub fn run_test_batch_with(script: &str, rows: &[TestRow], options: &Options) -> BatchReport {
    sandbox::run_test_batch(script, rows, options)
}

pub fn run_assertion_batch(script: &str, cases: &[AssertionCase]) -> AssertionReport {
    run_assertion_batch_with(script, cases, &Options::default())
}

pub fn run_assertion_batch_with(script: &str, cases: &[AssertionCase], options: &Options) -> AssertionReport {
    sandbox::run_assertion_batch(script, cases, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MemoryDirectory;
    use serde_json::json;

    #[test]
    fn options_from_json_fill_defaults() {
        let options = Options::from_json(r#"{ "diff_context": 1 }"#).unwrap();
        assert_eq!(options.diff_context, 1);
        assert_eq!(options.limits, SandboxLimits::default());
        assert!(!options.debug);
    }

    #[test]
    fn options_reject_zero_timeout_and_bad_json() {
        assert!(matches!(
            Options::from_json(r#"{ "limits": { "case_timeout_ms": 0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(Options::from_json("{"), Err(ConfigError::Json(_))));
        assert!(matches!(Options::load(Path::new("/nonexistent/condwright.json")), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn environment_overrides_are_validated() {
        fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
            move |name| pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
        }

        let options = Options::default()
            .with_vars(vars(&[(DEBUG_ENV, "1"), (MAX_OPERATIONS_ENV, "42"), (CASE_TIMEOUT_ENV, " 250 ")]))
            .unwrap();
        assert!(options.debug);
        assert_eq!((options.limits.max_operations, options.limits.case_timeout_ms), (42, 250));

        assert!(matches!(Options::default().with_vars(vars(&[(CASE_TIMEOUT_ENV, "0")])), Err(ConfigError::Invalid(_))));
        assert!(matches!(Options::default().with_vars(vars(&[(MAX_OPERATIONS_ENV, "-1")])), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn label_round_trip_through_public_api() {
        let directory = MemoryDirectory::from_pairs([("Agent asks name.DateOfBirth", "e6f2a9c4-1b7d-4e0a-9c55-3f1d2b8caaaf")]);
        let script = r#"fn main(ctx) { ctx["Agent asks name.DateOfBirth"] != () }"#;
        let stored = to_storage_form(script, &directory);
        assert_eq!(stored, r#"fn main(ctx) { ctx["e6f2a9c4-1b7d-4e0a-9c55-3f1d2b8caaaf"] != () }"#);
        assert_eq!(to_display_form(&stored, &directory), script);
    }

    #[test]
    fn diff_then_apply_reaches_target() {
        let old = "fn main(ctx) {\n    ctx.age > 18\n}\n";
        let new = "fn main(ctx) {\n    ctx.age >= 18\n}\n";
        let hunks = parse_unified_diff(&unified_diff(old, new));
        assert_eq!(apply_hunks(old, &hunks, &[true]).text, new);
    }

    #[test]
    fn batch_with_default_options() {
        let rows = [TestRow::new(true, json!({"age": 20}).as_object().cloned().unwrap())];
        let report = run_test_batch("fn main(ctx) { return ctx.age >= 18; }", &rows);
        assert_eq!((report.pass, report.fail), (1, 0));
    }
}
