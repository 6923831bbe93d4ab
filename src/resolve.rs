//! Variable reference resolution.
//!
//! Given script text (which may be a half-written draft that does not compile),
//! work out which variable keys it reads. Resolution is layered:
//!
//! ```text
//! script ── ScriptSignals::scan (signals.rs)
//!               │
//!               ├─ authoritative: `inputs` list (strategies.rs) ──▶ exact list
//!               │
//!               └─ fallback union (strategies.rs)
//!                    getVar / ctx["k"] / const k = "…"; ctx[k] / vars["k"]
//!                               │
//!                               ▼
//!                     offset-ordered, deduplicated keys
//! ```
//!
//! ## Responsibilities by module
//!
//! - `signals.rs`: cheap pre-scan producing `ScriptSignals`, used to skip
//!   strategies that cannot match.
//! - `strategies.rs`: the individual pattern scans and the `StrategySet`
//!   reported by [`resolve_variables`].
//! - `lexer.rs`: comment/string-aware tokenizer behind [`extract_keys`].
//!
//! Nothing in this module returns an error. Malformed scripts degrade to a
//! partial or empty result.
//!
//! ## Debugging
//!
//! With `Options::debug` set, each strategy reports its hit count on the
//! `condwright::resolve` tracing target.

#[path = "resolve/lexer.rs"]
mod lexer;
#[path = "resolve/signals.rs"]
mod signals;
#[path = "resolve/strategies.rs"]
mod strategies;

use lexer::Lexeme;
use std::collections::HashSet;
use strategies::{FALLBACK_STRATEGIES, Hit, ScanInput, scan_inputs_list};

pub use signals::ScriptSignals;
pub use strategies::StrategySet;

/// Detailed outcome of [`resolve_variables`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Deduplicated variable keys, in order of first appearance.
    pub variables: Vec<String>,
    /// Strategies that contributed at least one key.
    pub strategies: StrategySet,
    /// True when the declared `inputs` list was used.
    pub authoritative: bool,
    /// Signals found by the pre-scan.
    pub signals: ScriptSignals,
}

/// Resolve the variable keys `script` reads and report how they were found.
pub fn resolve_variables(script: &str, debug: bool) -> Resolution {
    let signals = ScriptSignals::scan(script);
    let input = ScanInput::with_signals(script, signals);

    if signals.contains(ScriptSignals::HAS_INPUTS) {
        let hits = scan_inputs_list(&input);
        if !hits.is_empty() {
            crate::debug_event!(debug, target: "condwright::resolve", count = hits.len(), "authoritative inputs list");
            return Resolution {
                variables: dedup_keys(hits),
                strategies: StrategySet::INPUTS_LIST,
                authoritative: true,
                signals,
            };
        }
    }

    let mut strategies = StrategySet::empty();
    let mut hits: Vec<Hit> = Vec::new();
    for strategy in FALLBACK_STRATEGIES {
        if !signals.contains(strategy.requires) {
            crate::debug_event!(debug, target: "condwright::resolve", strategy = strategy.name, "skipped by signals");
            continue;
        }
        let found = (strategy.scan)(&input);
        crate::debug_event!(debug, target: "condwright::resolve", strategy = strategy.name, hits = found.len(), "scanned");
        if !found.is_empty() {
            strategies |= strategy.set;
            hits.extend(found);
        }
    }

    // Stable sort keeps strategy order for hits that share an offset.
    hits.sort_by_key(|h| h.offset);

    Resolution { variables: dedup_keys(hits), strategies, authoritative: false, signals }
}

/// Deduplicated, order-stable list of variable keys `script` reads.
pub fn extract_used_variables(script: &str) -> Vec<String> {
    resolve_variables(script, false).variables
}

/// Lightweight key extraction for the test panel.
///
/// Comments are ignored and string literals are opaque, so `"ctx.a"` inside a
/// message never counts. Collects `vars`/`ctx` subscript reads with a literal
/// key and dot (or `?.`) access reads.
pub fn extract_keys(script: &str) -> Vec<String> {
    let lexemes = lexer::lex(script);
    let mut keys = Vec::new();

    for (idx, lexeme) in lexemes.iter().enumerate() {
        let Lexeme::Ident(name) = lexeme else { continue };
        if name != "vars" && name != "ctx" {
            continue;
        }
        // `other.ctx` is a member, not the context.
        if idx > 0 && lexemes[idx - 1] == Lexeme::Punct('.') {
            continue;
        }

        let mut rest = lexemes[idx + 1..].iter();
        let key = match (rest.next(), rest.next(), rest.next()) {
            (Some(Lexeme::Punct('[')), Some(Lexeme::Str(key)), Some(Lexeme::Punct(']'))) => Some(key.clone()),
            (Some(Lexeme::Punct('.')), Some(Lexeme::Ident(key)), _) => Some(key.clone()),
            (Some(Lexeme::Punct('?')), Some(Lexeme::Punct('.')), Some(Lexeme::Ident(key))) => Some(key.clone()),
            _ => None,
        };

        if let Some(key) = key {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    keys
}

/// Reduce a used-variable list to what the test panel shows.
///
/// Keys are deduplicated case-insensitively (first occurrence wins). When more
/// than one key survives, only the first is kept: the panel works with a
/// single-input model.
pub fn surface_variables(used: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique: Vec<String> = Vec::new();
    for key in used {
        if seen.insert(key.to_lowercase()) {
            unique.push(key.clone());
        }
    }
    unique.truncate(1);
    unique
}

fn dedup_keys(hits: Vec<Hit>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    hits.into_iter().filter(|h| seen.insert(h.key.clone())).map(|h| h.key).collect()
}
