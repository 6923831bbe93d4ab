//! Interpreter setup, compilation and per-case evaluation.
//!
//! Everything here lives on the sandbox worker thread: the engine holds
//! non-`Send` callbacks and is never handed back to the caller.

use super::SandboxLimits;
use super::value::json_object_to_map;
use crate::error::ScriptError;
use rhai::{AST, CallFnOptions, Dynamic, Engine, EvalAltResult, ImmutableString, Map, Position, Scope};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Entry points, in order of preference. Each must take exactly one parameter.
pub(crate) const ENTRY_POINTS: [&str; 2] = ["main", "evaluate"];

const MAX_EXPR_DEPTH: usize = 64;
const MAX_FN_EXPR_DEPTH: usize = 32;

/// A compiled predicate ready to evaluate test cases.
pub(crate) struct CompiledPredicate {
    engine: Engine,
    ast: AST,
    entry: String,
    defaults: Map,
    deadline: Rc<Cell<Option<Instant>>>,
    limits: SandboxLimits,
}

fn build_engine(limits: &SandboxLimits, deadline: Rc<Cell<Option<Instant>>>) -> Engine {
    let mut engine = Engine::new();
    engine
        .set_max_operations(limits.max_operations)
        .set_max_call_levels(limits.max_call_depth)
        .set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FN_EXPR_DEPTH)
        .set_max_string_size(limits.max_string_size)
        .set_max_array_size(limits.max_array_size)
        .set_max_map_size(limits.max_map_size);
    engine.disable_symbol("eval");

    engine.on_progress(move |_ops| match deadline.get() {
        Some(at) if Instant::now() >= at => Some(Dynamic::from("deadline")),
        _ => None,
    });
    engine.on_print(|text| tracing::debug!(target: "condwright::sandbox", "print: {text}"));
    engine.on_debug(|text, _source, pos| {
        tracing::debug!(target: "condwright::sandbox", line = ?pos.line(), "debug: {text}");
    });

    // `getVar(ctx, key)`: a missing key reads as `()`.
    engine.register_fn("getVar", |ctx: Map, key: ImmutableString| -> Dynamic {
        ctx.get(key.as_str()).cloned().unwrap_or(Dynamic::UNIT)
    });

    engine
}

fn position_of(pos: Position) -> (Option<usize>, Option<usize>) {
    (pos.line(), pos.position())
}

/// Innermost error of a chain of nested function-call failures.
fn root_cause(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => root_cause(inner),
        other => other,
    }
}

fn script_error(err: &EvalAltResult, limits: &SandboxLimits) -> ScriptError {
    let err = root_cause(err);
    let (line, column) = position_of(err.position());
    match err {
        EvalAltResult::ErrorTooManyOperations(_) => {
            ScriptError::at(format!("execution budget of {} operations exceeded", limits.max_operations), line, column)
        }
        EvalAltResult::ErrorTerminated(..) => {
            ScriptError::at(format!("evaluation timed out after {} ms", limits.case_timeout_ms), line, column)
        }
        other => ScriptError::at(other.to_string(), line, column),
    }
}

impl CompiledPredicate {
    /// Parse `script`, locate its entry point and run its top-level statements
    /// once to collect the optional `defaults` map.
    pub(crate) fn compile(script: &str, limits: &SandboxLimits) -> Result<Self, ScriptError> {
        let deadline = Rc::new(Cell::new(None));
        let engine = build_engine(limits, Rc::clone(&deadline));

        let ast = engine.compile(script).map_err(|err| {
            let (line, column) = position_of(err.1);
            ScriptError::at(err.to_string(), line, column)
        })?;

        let entry = ENTRY_POINTS
            .iter()
            .find(|name| ast.iter_functions().any(|f| f.name == **name && f.params.len() == 1))
            .map(|name| name.to_string())
            .ok_or_else(|| ScriptError::new("script must define `main(ctx)` or `evaluate(ctx)`"))?;

        let mut scope = Scope::new();
        deadline.set(Some(Instant::now() + limits.case_timeout()));
        let top_level = engine.run_ast_with_scope(&mut scope, &ast);
        deadline.set(None);
        top_level.map_err(|err| script_error(&err, limits))?;

        let defaults = match scope.get_value::<Dynamic>("defaults") {
            None => Map::new(),
            Some(value) if value.is::<Map>() => value.cast::<Map>(),
            Some(value) => {
                return Err(ScriptError::new(format!("`defaults` must be an object map, found {}", value.type_name())));
            }
        };

        Ok(CompiledPredicate { engine, ast, entry, defaults, deadline, limits: limits.clone() })
    }

    pub(crate) fn entry(&self) -> &str {
        &self.entry
    }

    /// Call the entry point with `defaults` merged under `vars`.
    pub(crate) fn evaluate(&self, vars: &serde_json::Map<String, serde_json::Value>) -> Result<Dynamic, ScriptError> {
        let mut ctx = self.defaults.clone();
        ctx.extend(json_object_to_map(vars));

        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        self.deadline.set(Some(Instant::now() + self.limits.case_timeout()));
        let result = self.engine.call_fn_with_options::<Dynamic>(options, &mut Scope::new(), &self.ast, &self.entry, (ctx,));
        self.deadline.set(None);

        result.map_err(|err| script_error(&err, &self.limits))
    }
}

