//! Authoring sessions.
//!
//! An [`AuthoringSession`] holds everything one author is working on: the rule
//! description, the current script (display form), the duplicate-variable
//! choices made so far, a pending rewrite proposal and the run supervisor for
//! test batches. Nothing here is global; two sessions never share state.
//!
//! ```text
//! description ─┐
//! universe ────┼─ pending_choices ─▶ choose ─▶ generate(generator)
//!              │                                 ├─ Question(text)       returned as-is
//!              │                                 ├─ Script (empty doc)   replaces the script
//!              │                                 └─ Script (otherwise)   pending Proposal { hunks }
//!              │                                                             │
//!              │                                        accept(mask) ◀───────┘
//! rows ────────┴─ run_tests ─▶ RunSupervisor ─▶ BatchReport (latest run only)
//! ```
//!
//! The generator and test-case suggester are collaborators behind traits; the
//! session never retries them and never touches the script when they fail.

use crate::api::Options;
use crate::codec::{self, NameDirectory};
use crate::diff::{self, Hunk};
use crate::duplicates::{self, DuplicateGroup, PreferenceMap};
use crate::error::{DisambiguationError, GenerationError, SandboxError, SessionError};
use crate::resolve;
use crate::sandbox::{self, BatchReport, Pending, RunSupervisor, TestRow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Collaborators -----------------------------------------------------------

/// What the script generator is asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub description: String,
    /// Variable paths the generated script may reference.
    pub allow_list: Vec<String>,
    /// The script being revised, if any.
    pub existing_script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    Script(String),
    /// The generator needs more information before it can write a script.
    Question(String),
}

/// Turns a natural-language rule description into a predicate script.
pub trait ScriptGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Generated, GenerationError>;
}

/// Suggested example inputs for a description. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub when_true: Option<Map<String, Value>>,
    pub when_false: Option<Map<String, Value>>,
    #[serde(default)]
    pub hints: Vec<String>,
}

pub trait TestCaseSuggester {
    fn suggest(&self, description: &str, allow_list: &[String]) -> Result<Suggestion, GenerationError>;
}

// --- Session -----------------------------------------------------------------

/// A generated rewrite awaiting hunk-by-hunk acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub script: String,
    pub hunks: Vec<Hunk>,
}

/// Result of [`AuthoringSession::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// The script was empty, so the generated script replaced it.
    Replaced,
    /// A proposal with this many hunks is pending.
    Proposed(usize),
    /// The generated script equals the current one.
    Unchanged,
    Question(String),
}

/// Rows built from a [`Suggestion`] plus its hints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestedCases {
    pub rows: Vec<TestRow>,
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthoringSession {
    description: String,
    script: String,
    preferences: PreferenceMap,
    pending: Option<Proposal>,
    supervisor: RunSupervisor,
    options: Options,
}

impl AuthoringSession {
    pub fn new(options: Options) -> Self {
        AuthoringSession { options, ..Self::default() }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Replace the script by hand. Any pending proposal no longer applies.
    pub fn set_script(&mut self, script: impl Into<String>) {
        self.script = script.into();
        self.pending = None;
    }

    pub fn preferences(&self) -> &PreferenceMap {
        &self.preferences
    }

    pub fn pending(&self) -> Option<&Proposal> {
        self.pending.as_ref()
    }

    pub fn used_variables(&self) -> Vec<String> {
        resolve::resolve_variables(&self.script, self.options.debug).variables
    }

    /// Relevant duplicate groups of `universe` still lacking a choice.
    pub fn pending_choices(&self, universe: &[String]) -> Vec<DuplicateGroup> {
        let groups = duplicates::find_duplicate_groups(universe);
        duplicates::unresolved_groups(&groups, &self.description, &self.preferences)
    }

    /// Pin the group with `tail` in `universe` to `path`.
    pub fn choose(&mut self, universe: &[String], tail: &str, path: &str) -> Result<(), SessionError> {
        let groups = duplicates::find_duplicate_groups(universe);
        let group = groups.iter().find(|g| g.tail == tail).ok_or_else(|| DisambiguationError::UnknownTail(tail.to_string()))?;
        self.preferences.choose(group, path)?;
        debug_event!(self.options.debug, target: "condwright::session", tail, path, "duplicate resolved");
        Ok(())
    }

    fn allow_list(&self, universe: &[String]) -> Vec<String> {
        let groups = duplicates::find_duplicate_groups(universe);
        duplicates::apply_preferences(universe, &groups, &self.preferences)
    }

    /// Ask `generator` for a script. Refused while relevant duplicates are
    /// unresolved; a generator failure leaves the script untouched.
    pub fn generate(
        &mut self,
        generator: &dyn ScriptGenerator,
        universe: &[String],
    ) -> Result<GenerateOutcome, SessionError> {
        let unresolved = self.pending_choices(universe);
        if !unresolved.is_empty() {
            return Err(SessionError::UnresolvedCollisions(unresolved));
        }

        let existing = self.script.trim();
        let request = GenerationRequest {
            description: self.description.clone(),
            allow_list: self.allow_list(universe),
            existing_script: (!existing.is_empty()).then(|| self.script.clone()),
        };

        let generated = generator.generate(&request).inspect_err(|err| {
            tracing::warn!(target: "condwright::session", category = err.category(), "generation failed: {err}");
        })?;

        let outcome = match generated {
            Generated::Question(question) => GenerateOutcome::Question(question),
            Generated::Script(script) if request.existing_script.is_none() => {
                self.script = script;
                self.pending = None;
                GenerateOutcome::Replaced
            }
            Generated::Script(script) => {
                let hunks = diff::diff_hunks(&self.script, &script, self.options.diff_context);
                if hunks.is_empty() {
                    self.pending = None;
                    GenerateOutcome::Unchanged
                } else {
                    let count = hunks.len();
                    self.pending = Some(Proposal { script, hunks });
                    GenerateOutcome::Proposed(count)
                }
            }
        };
        debug_event!(self.options.debug, target: "condwright::session", outcome = ?outcome, "generation finished");
        Ok(outcome)
    }

    /// Apply the selected hunks of the pending proposal. Returns how many were applied.
    pub fn accept(&mut self, selected: &[bool]) -> Result<usize, SessionError> {
        let proposal = self.pending.take().ok_or(SessionError::NoPendingProposal)?;
        let applied = diff::apply_hunks(&self.script, &proposal.hunks, selected);
        debug_event!(
            self.options.debug,
            target: "condwright::session",
            applied = applied.applied_count,
            offered = proposal.hunks.len(),
            "proposal accepted"
        );
        self.script = applied.text;
        Ok(applied.applied_count)
    }

    /// Drop the pending proposal without applying anything.
    pub fn discard(&mut self) -> Option<Proposal> {
        self.pending.take()
    }

    /// Up to one positive and one negative example row, plus hints.
    pub fn suggest_cases(
        &self,
        suggester: &dyn TestCaseSuggester,
        universe: &[String],
    ) -> Result<SuggestedCases, SessionError> {
        let suggestion = suggester.suggest(&self.description, &self.allow_list(universe))?;
        let mut rows = Vec::new();
        if let Some(vars) = suggestion.when_true {
            rows.push(TestRow::new(true, vars));
        }
        if let Some(vars) = suggestion.when_false {
            rows.push(TestRow::new(false, vars));
        }
        Ok(SuggestedCases { rows, hints: suggestion.hints })
    }

    /// The script in storage form.
    pub fn persisted(&self, directory: &dyn NameDirectory) -> String {
        codec::IdentifierCodec::new(directory).with_debug(self.options.debug).to_storage_form(&self.script)
    }

    /// Load a stored script, converting it to display form.
    pub fn load(&mut self, persisted: &str, directory: &dyn NameDirectory) {
        let script = codec::IdentifierCodec::new(directory).with_debug(self.options.debug).to_display_form(persisted);
        self.set_script(script);
    }

    /// Start a test batch for the current script. Starting another batch
    /// supersedes this one.
    pub fn start_tests(&self, rows: &[TestRow]) -> Result<Pending<BatchReport>, SandboxError> {
        sandbox::submit_test_batch(&self.supervisor, &self.script, rows, &self.options)
    }

    /// The report of `pending`, or `None` when a newer batch superseded it.
    pub fn finish_tests(&self, pending: Pending<BatchReport>) -> Result<Option<BatchReport>, SandboxError> {
        let report = self.supervisor.collect(pending)?;
        if report.is_none() {
            debug_event!(self.options.debug, target: "condwright::session", "superseded test batch dropped");
        }
        Ok(report)
    }

    pub fn run_tests(&self, rows: &[TestRow]) -> Result<Option<BatchReport>, SandboxError> {
        self.finish_tests(self.start_tests(rows)?)
    }

    /// Forget duplicate choices and any pending proposal.
    pub fn reset(&mut self) {
        self.preferences.clear();
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MemoryDirectory;
    use serde_json::json;
    use std::cell::RefCell;

    struct Scripted {
        reply: Result<Generated, GenerationError>,
        seen: RefCell<Vec<GenerationRequest>>,
    }

    impl Scripted {
        fn new(reply: Result<Generated, GenerationError>) -> Self {
            Scripted { reply, seen: RefCell::new(Vec::new()) }
        }
    }

    impl ScriptGenerator for Scripted {
        fn generate(&self, request: &GenerationRequest) -> Result<Generated, GenerationError> {
            self.seen.borrow_mut().push(request.clone());
            self.reply.clone()
        }
    }

    struct Canned(Suggestion);

    impl TestCaseSuggester for Canned {
        fn suggest(&self, _description: &str, _allow_list: &[String]) -> Result<Suggestion, GenerationError> {
            Ok(self.0.clone())
        }
    }

    fn universe() -> Vec<String> {
        ["Intake.Applicant.Age", "Renewal.Applicant.Age", "Intake.Country"].iter().map(|s| s.to_string()).collect()
    }

    const OLD: &str = "fn main(ctx) {\n    let age = ctx[\"age\"];\n    age > 18\n}\n";
    const NEW: &str = "fn main(ctx) {\n    let age = getVar(ctx, \"age\");\n    age >= 18\n}\n";

    #[test]
    fn generation_is_refused_until_mentioned_duplicates_are_chosen() {
        let mut session = AuthoringSession::default();
        session.set_description("Applicant age must be over 18");
        let generator = Scripted::new(Ok(Generated::Script(NEW.into())));

        match session.generate(&generator, &universe()) {
            Err(SessionError::UnresolvedCollisions(groups)) => assert_eq!(groups[0].tail, "Applicant.Age"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(generator.seen.borrow().is_empty());

        session.choose(&universe(), "Applicant.Age", "Renewal.Applicant.Age").unwrap();
        assert!(session.pending_choices(&universe()).is_empty());
        assert_eq!(session.generate(&generator, &universe()).unwrap(), GenerateOutcome::Replaced);
        assert_eq!(session.script(), NEW);

        let request = generator.seen.borrow()[0].clone();
        assert_eq!(request.allow_list, vec!["Renewal.Applicant.Age", "Intake.Country"]);
        assert_eq!(request.existing_script, None);
    }

    #[test]
    fn unmentioned_duplicates_do_not_block() {
        let mut session = AuthoringSession::default();
        session.set_description("Country must be Sweden");
        let generator = Scripted::new(Ok(Generated::Script(NEW.into())));
        assert!(session.generate(&generator, &universe()).is_ok());
    }

    #[test]
    fn choosing_unknown_tail_or_option_fails() {
        let mut session = AuthoringSession::default();
        assert!(matches!(
            session.choose(&universe(), "Country", "Intake.Country"),
            Err(SessionError::Disambiguation(DisambiguationError::UnknownTail(_)))
        ));
        assert!(matches!(
            session.choose(&universe(), "Applicant.Age", "Other.Applicant.Age"),
            Err(SessionError::Disambiguation(DisambiguationError::UnknownOption { .. }))
        ));
    }

    #[test]
    fn revision_becomes_a_pending_proposal() {
        let mut session = AuthoringSession::default();
        session.set_script(OLD);
        let generator = Scripted::new(Ok(Generated::Script(NEW.into())));

        let GenerateOutcome::Proposed(count) = session.generate(&generator, &universe()).unwrap() else {
            panic!("expected a proposal")
        };
        assert!(count >= 1);
        assert_eq!(session.script(), OLD);
        assert_eq!(generator.seen.borrow()[0].existing_script.as_deref(), Some(OLD));

        assert_eq!(session.accept(&vec![true; count]).unwrap(), count);
        assert_eq!(session.script(), NEW);
        assert!(matches!(session.accept(&[true]), Err(SessionError::NoPendingProposal)));
    }

    #[test]
    fn rejecting_every_hunk_keeps_the_script() {
        let mut session = AuthoringSession::new(Options { diff_context: 0, ..Options::default() });
        session.set_script(OLD);
        let generator = Scripted::new(Ok(Generated::Script(NEW.into())));
        let GenerateOutcome::Proposed(count) = session.generate(&generator, &universe()).unwrap() else {
            panic!("expected a proposal")
        };
        assert_eq!(session.accept(&vec![false; count]).unwrap(), 0);
        assert_eq!(session.script(), OLD);
    }

    #[test]
    fn identical_generation_is_unchanged() {
        let mut session = AuthoringSession::default();
        session.set_script(OLD);
        let generator = Scripted::new(Ok(Generated::Script(OLD.into())));
        assert_eq!(session.generate(&generator, &universe()).unwrap(), GenerateOutcome::Unchanged);
        assert!(session.pending().is_none());
    }

    #[test]
    fn final_newline_change_is_proposed() {
        let mut session = AuthoringSession::default();
        session.set_script(OLD);
        let trimmed = OLD.trim_end_matches('\n');
        let generator = Scripted::new(Ok(Generated::Script(trimmed.into())));
        assert_eq!(session.generate(&generator, &universe()).unwrap(), GenerateOutcome::Proposed(1));
        assert_eq!(session.accept(&[true]).unwrap(), 1);
        assert_eq!(session.script(), trimmed);
    }

    #[test]
    fn questions_and_errors_leave_the_script_alone() {
        let mut session = AuthoringSession::default();
        session.set_script(OLD);

        let asking = Scripted::new(Ok(Generated::Question("Which age field?".into())));
        assert_eq!(
            session.generate(&asking, &universe()).unwrap(),
            GenerateOutcome::Question("Which age field?".into())
        );

        let offline = Scripted::new(Err(GenerationError::NetworkUnreachable("connection refused".into())));
        match session.generate(&offline, &universe()) {
            Err(SessionError::Generation(err)) => assert_eq!(err.category(), "network-unreachable"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.script(), OLD);
        assert!(session.pending().is_none());
    }

    #[test]
    fn suggestions_become_labeled_rows() {
        let session = AuthoringSession::default();
        let suggester = Canned(Suggestion {
            when_true: json!({"age": 30}).as_object().cloned(),
            when_false: None,
            hints: vec!["also try 18 exactly".into()],
        });
        let cases = session.suggest_cases(&suggester, &universe()).unwrap();
        assert_eq!(cases.rows.len(), 1);
        assert!(cases.rows[0].label.as_bool());
        assert_eq!(cases.hints, vec!["also try 18 exactly"]);
    }

    #[test]
    fn persisted_form_round_trips() {
        let directory = MemoryDirectory::from_pairs([("Applicant.Age", "5c9e0d52-6a43-4c39-9d2b-0c3f3f1f8a11")]);
        let mut session = AuthoringSession::default();
        session.set_script("fn main(ctx) { ctx[\"Applicant.Age\"] >= 18 }");

        let stored = session.persisted(&directory);
        assert!(stored.contains("5c9e0d52-6a43-4c39-9d2b-0c3f3f1f8a11"));

        let mut restored = AuthoringSession::default();
        restored.load(&stored, &directory);
        assert_eq!(restored.script(), session.script());
        assert_eq!(restored.used_variables(), vec!["Applicant.Age"]);
    }

    #[test]
    fn newer_test_run_wins() {
        let mut session = AuthoringSession::default();
        session.set_script("fn main(ctx) { ctx.age >= 18 }");
        let rows = [TestRow::new(true, json!({"age": 20}).as_object().cloned().unwrap())];

        let stale = session.start_tests(&rows).unwrap();
        let report = session.run_tests(&rows).unwrap().unwrap();
        assert_eq!(report.pass, 1);
        assert!(session.finish_tests(stale).unwrap().is_none());
    }

    #[test]
    fn reset_clears_choices_and_proposal() {
        let mut session = AuthoringSession::default();
        session.set_script(OLD);
        session.choose(&universe(), "Applicant.Age", "Intake.Applicant.Age").unwrap();
        session.generate(&Scripted::new(Ok(Generated::Script(NEW.into()))), &universe()).unwrap();

        session.reset();
        assert!(session.preferences().is_empty());
        assert!(session.pending().is_none());
        assert_eq!(session.script(), OLD);
    }
}
