//! Sandboxed predicate test runner.
//!
//! A predicate script is certified against labeled test rows. The host never
//! evaluates the script itself: every batch is compiled and run on a dedicated
//! worker thread with its own interpreter, and the finished report comes back
//! as a single message.
//!
//! ```text
//! host                                    worker thread (one per batch)
//! ────                                    ─────────────────────────────
//! run_test_batch(script, rows) ──spawn──▶ Compiling
//!                                           ├─ parse error / no entry point / top-level failure
//!                                           │     └─▶ CompileError: every row errors
//!                                           └─▶ Ready
//!                                                 for row in rows:
//!                                                   Evaluating ─▶ Pass | Fail | RuntimeError
//! BatchReport ◀──────── channel ───────────────── report
//! ```
//!
//! ## Script contract
//!
//! - An entry point `main(ctx)` or `evaluate(ctx)` (one parameter) is required.
//! - Top-level statements run once at compile time; a `defaults` object map
//!   declared there supplies values for keys a row does not set.
//! - `getVar(ctx, "key")` reads a key, yielding `()` when it is missing.
//! - The entry's return value is coerced to a boolean and compared with the
//!   row's label.
//!
//! ## Isolation and budget
//!
//! - Each case gets a fresh scope and its own copy of the context map.
//! - [`SandboxLimits`] bounds operations, wall-clock time, call depth and value
//!   sizes per case; exceeding a bound is that row's error.
//! - Runtime errors and panics stay row-local. A worker that dies without
//!   reporting turns every row into an error instead of taking the host down.
//! - [`RunSupervisor`] gives last-run-wins semantics across batches.

#[path = "sandbox/assertions.rs"]
mod assertions;
#[path = "sandbox/engine.rs"]
mod engine;
#[path = "sandbox/report.rs"]
mod report;
#[path = "sandbox/value.rs"]
mod value;
#[path = "sandbox/worker.rs"]
mod worker;


pub use assertions::Assertion;
pub use report::{AssertionReport, BatchReport, CaseOutcome, CaseResult, RowOutcome, RowResult};
pub use worker::{Pending, RunSupervisor, SandboxWorker};

use crate::api::Options;
use crate::error::{SandboxError, ScriptError};
use chrono::Utc;
use engine::CompiledPredicate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

// --- Inputs ------------------------------------------------------------------

/// Expected outcome of a row, serialized as the strings `"true"` / `"false"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expectation {
    #[serde(rename = "true")]
    True,
    #[serde(rename = "false")]
    False,
}

impl Expectation {
    pub fn as_bool(self) -> bool {
        matches!(self, Expectation::True)
    }
}

impl From<bool> for Expectation {
    fn from(value: bool) -> Self {
        if value { Expectation::True } else { Expectation::False }
    }
}

/// One labeled test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRow {
    #[serde(default = "fresh_id")]
    pub id: String,
    pub label: Expectation,
    #[serde(default)]
    pub vars: Map<String, Value>,
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl TestRow {
    /// A row with a freshly minted id.
    pub fn new(label: impl Into<Expectation>, vars: Map<String, Value>) -> Self {
        TestRow { id: fresh_id(), label: label.into(), vars }
    }
}

/// A case checked with structured assertions instead of a boolean label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionCase {
    #[serde(default = "fresh_id")]
    pub id: String,
    #[serde(default)]
    pub vars: Map<String, Value>,
    pub assertions: Vec<Assertion>,
}

/// Per-case execution budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    pub max_operations: u64,
    pub case_timeout_ms: u64,
    pub max_call_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        SandboxLimits {
            max_operations: 500_000,
            case_timeout_ms: 1_000,
            max_call_depth: 48,
            max_string_size: 64 * 1024,
            max_array_size: 10_000,
            max_map_size: 10_000,
        }
    }
}

impl SandboxLimits {
    pub fn case_timeout(&self) -> Duration {
        Duration::from_millis(self.case_timeout_ms)
    }
}

// --- Execution (worker side) -------------------------------------------------

fn panic_error(payload: Box<dyn std::any::Any + Send>) -> ScriptError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    ScriptError::new(format!("evaluation panicked: {detail}"))
}

/// Evaluate one case, keeping panics local to it.
fn evaluate_case(predicate: &CompiledPredicate, vars: &Map<String, Value>) -> Result<rhai::Dynamic, ScriptError> {
    panic::catch_unwind(AssertUnwindSafe(|| predicate.evaluate(vars))).unwrap_or_else(|payload| Err(panic_error(payload)))
}

pub(crate) fn execute_batch(script: &str, rows: &[TestRow], options: &Options) -> BatchReport {
    let started_at = Utc::now();
    let start = Instant::now();

    let (results, compile_error): (Vec<RowResult>, _) = match CompiledPredicate::compile(script, &options.limits) {
        Err(err) => {
            debug_event!(options.debug, target: "condwright::sandbox", error = %err, "compile failed");
            (rows.iter().map(|row| RowResult::error(row, err.clone())).collect(), Some(err))
        }
        Ok(predicate) => {
            debug_event!(options.debug, target: "condwright::sandbox", entry = predicate.entry(), rows = rows.len(), "ready");
            let results = rows
                .iter()
                .map(|row| match evaluate_case(&predicate, &row.vars) {
                    Ok(returned) => RowResult::judged(row, value::truthy(&returned)),
                    Err(err) => RowResult::error(row, err),
                })
                .collect();
            (results, None)
        }
    };

    let report = BatchReport::from_rows(results, compile_error, started_at, start.elapsed());
    debug_event!(
        options.debug,
        target: "condwright::sandbox",
        pass = report.pass,
        fail = report.fail,
        elapsed_ms = report.elapsed_ms() as u64,
        "batch finished"
    );
    report
}

pub(crate) fn execute_assertions(script: &str, cases: &[AssertionCase], options: &Options) -> AssertionReport {
    let started_at = Utc::now();
    let start = Instant::now();

    let (results, compile_error): (Vec<CaseResult>, _) = match CompiledPredicate::compile(script, &options.limits) {
        Err(err) => {
            let results = cases
                .iter()
                .map(|case| CaseResult { id: case.id.clone(), actual: None, outcome: CaseOutcome::Error { error: err.clone() } })
                .collect();
            (results, Some(err))
        }
        Ok(predicate) => {
            let results = cases
                .iter()
                .map(|case| match evaluate_case(&predicate, &case.vars) {
                    Ok(returned) => {
                        let actual = value::dynamic_to_json(returned);
                        let failures: Vec<String> = case.assertions.iter().filter_map(|a| a.check(&actual).err()).collect();
                        let outcome = if failures.is_empty() { CaseOutcome::Pass } else { CaseOutcome::Fail { failures } };
                        CaseResult { id: case.id.clone(), actual: Some(actual), outcome }
                    }
                    Err(error) => CaseResult { id: case.id.clone(), actual: None, outcome: CaseOutcome::Error { error } },
                })
                .collect();
            (results, None)
        }
    };

    AssertionReport::from_cases(results, compile_error, started_at, start.elapsed())
}

// --- Dispatch (host side) ----------------------------------------------------

/// A report in which every row carries the worker failure.
fn lost_batch(rows: &[TestRow], err: &SandboxError) -> BatchReport {
    let error = ScriptError::new(err.to_string());
    let results = rows.iter().map(|row| RowResult::error(row, error.clone())).collect();
    BatchReport::from_rows(results, None, Utc::now(), Duration::ZERO)
}

fn lost_assertions(cases: &[AssertionCase], err: &SandboxError) -> AssertionReport {
    let error = ScriptError::new(err.to_string());
    let results = cases
        .iter()
        .map(|case| CaseResult { id: case.id.clone(), actual: None, outcome: CaseOutcome::Error { error: error.clone() } })
        .collect();
    AssertionReport::from_cases(results, None, Utc::now(), Duration::ZERO)
}

/// Start a predicate batch on `supervisor` without waiting for it.
pub fn submit_test_batch(
    supervisor: &RunSupervisor,
    script: &str,
    rows: &[TestRow],
    options: &Options,
) -> Result<Pending<BatchReport>, SandboxError> {
    let (script, rows, options) = (script.to_string(), rows.to_vec(), options.clone());
    supervisor.submit(move || execute_batch(&script, &rows, &options))
}

/// Compile `script` and evaluate every row on a worker thread.
///
/// Never fails: compile errors, runtime errors and a lost worker are all
/// reported per row.
pub fn run_test_batch(script: &str, rows: &[TestRow], options: &Options) -> BatchReport {
    let (job_script, job_rows, job_options) = (script.to_string(), rows.to_vec(), options.clone());
    let outcome = SandboxWorker
        .dispatch(move || execute_batch(&job_script, &job_rows, &job_options))
        .and_then(Pending::wait);
    match outcome {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(target: "condwright::sandbox", error = %err, "sandbox worker failed");
            lost_batch(rows, &err)
        }
    }
}

/// Like [`run_test_batch`], checking each case's raw value with its assertions.
pub fn run_assertion_batch(script: &str, cases: &[AssertionCase], options: &Options) -> AssertionReport {
    let (job_script, job_cases, job_options) = (script.to_string(), cases.to_vec(), options.clone());
    let outcome = SandboxWorker
        .dispatch(move || execute_assertions(&job_script, &job_cases, &job_options))
        .and_then(Pending::wait);
    match outcome {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(target: "condwright::sandbox", error = %err, "sandbox worker failed");
            lost_assertions(cases, &err)
        }
    }
}
