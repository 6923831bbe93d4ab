//! Batch reports.
//!
//! A report is built once, on the worker thread, after every case of the batch
//! has run. Tallies are derived from the per-case results so that
//! `pass + fail == cases` always holds.

use super::{Expectation, TestRow};
use crate::error::ScriptError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

// --- Predicate rows ----------------------------------------------------------

/// Terminal state of one predicate row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    /// The coerced value matched the label.
    Pass { value: bool },
    /// The coerced value contradicted the label.
    Fail { value: bool },
    /// Compilation or evaluation failed; counts as a failure.
    Error { error: ScriptError },
}

impl RowOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, RowOutcome::Pass { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowResult {
    pub id: String,
    pub expected: Expectation,
    pub outcome: RowOutcome,
}

impl RowResult {
    pub(crate) fn judged(row: &TestRow, value: bool) -> Self {
        let outcome = if value == row.label.as_bool() { RowOutcome::Pass { value } } else { RowOutcome::Fail { value } };
        RowResult { id: row.id.clone(), expected: row.label, outcome }
    }

    pub(crate) fn error(row: &TestRow, error: ScriptError) -> Self {
        RowResult { id: row.id.clone(), expected: row.label, outcome: RowOutcome::Error { error } }
    }
}

/// Outcome of [`run_test_batch`](super::run_test_batch).
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub pass: usize,
    pub fail: usize,
    /// Wall-clock time from dispatch to the last row.
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    /// Set when the script never reached the `Ready` state.
    pub compile_error: Option<ScriptError>,
    pub rows: Vec<RowResult>,
}

impl BatchReport {
    pub(crate) fn from_rows(
        rows: Vec<RowResult>,
        compile_error: Option<ScriptError>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        let pass = rows.iter().filter(|r| r.outcome.passed()).count();
        let fail = rows.len() - pass;
        BatchReport { pass, fail, elapsed, started_at, compile_error, rows }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }

    pub fn all_passed(&self) -> bool {
        self.fail == 0 && self.compile_error.is_none()
    }
}

// --- Assertion cases ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseOutcome {
    Pass,
    /// One reason per failed assertion.
    Fail { failures: Vec<String> },
    Error { error: ScriptError },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub id: String,
    /// The entry point's return value, when evaluation succeeded.
    pub actual: Option<Value>,
    pub outcome: CaseOutcome,
}

/// Outcome of [`run_assertion_batch`](super::run_assertion_batch).
#[derive(Debug, Clone, Serialize)]
pub struct AssertionReport {
    pub pass: usize,
    pub fail: usize,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub compile_error: Option<ScriptError>,
    pub cases: Vec<CaseResult>,
}

impl AssertionReport {
    pub(crate) fn from_cases(
        cases: Vec<CaseResult>,
        compile_error: Option<ScriptError>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        let pass = cases.iter().filter(|c| c.outcome == CaseOutcome::Pass).count();
        let fail = cases.len() - pass;
        AssertionReport { pass, fail, elapsed, started_at, compile_error, cases }
    }
}
