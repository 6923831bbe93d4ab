//! Condition authoring and verification engine.
//!
//! Predicate scripts decide whether a rule fires for a set of named variables.
//! This crate covers the text side of authoring them and the runtime side of
//! certifying them:
//!
//! - [`resolve`]: which variables a script uses, via a prioritized stack of
//!   extraction strategies gated by a cheap signal pre-scan.
//! - [`codec`]: display labels <-> stable IDs inside variable references.
//! - [`duplicates`]: variable paths that read the same, and the author's
//!   choice between them.
//! - [`diff`]: unified diffs parsed, computed and applied hunk by hunk.
//! - [`sandbox`]: labeled test rows run against a script on an isolated worker
//!   with a bounded execution budget.
//! - [`session`]: per-author state tying the above together around external
//!   generator and suggester collaborators.
//!
//! The free functions re-exported at the crate root are the flat entry points;
//! the modules expose the finer-grained types.

extern crate self as condwright;

#[macro_use]
mod macros;
mod api;
pub mod codec;
pub mod diff;
pub mod duplicates;
pub mod error;
pub mod resolve;
pub mod sandbox;
pub mod session;

pub use api::{
    CASE_TIMEOUT_ENV, DEBUG_ENV, MAX_OPERATIONS_ENV, Options, apply_hunks, extract_keys, extract_used_variables,
    find_duplicate_groups, parse_unified_diff, run_assertion_batch, run_assertion_batch_with, run_test_batch,
    run_test_batch_with, surface_variables, to_display_form, to_storage_form, unified_diff,
};
pub use codec::{IdentifierCodec, MemoryDirectory, NameDirectory};
pub use diff::{Applied, Hunk};
pub use duplicates::{DuplicateGroup, PreferenceMap};
pub use error::{ConfigError, DisambiguationError, GenerationError, SandboxError, ScriptError, SessionError};
pub use sandbox::{
    Assertion, AssertionCase, AssertionReport, BatchReport, Expectation, RowOutcome, RowResult, RunSupervisor,
    SandboxLimits, TestRow,
};
pub use session::{AuthoringSession, GenerationRequest, Generated, ScriptGenerator, Suggestion, TestCaseSuggester};
