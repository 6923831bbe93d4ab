//! Extraction strategies and their metadata.
//!
//! Each strategy is a plain function over a [`ScanInput`] that returns the
//! variable keys it found, tagged with the byte offset where each reference
//! starts. Strategies are grouped in two tiers:
//!
//! - the **authoritative** tier: a declared `inputs` list. When it yields at
//!   least one key, nothing else runs.
//! - the **fallback** tier: independent textual scans whose hits are unioned
//!   and ordered by offset.
//!
//! ```text
//! script ── ScriptSignals::scan ──┬─ inputs list ──(non-empty)──▶ done
//!                                 │
//!                                 └─ fallback strategies (gated by signals)
//!                                      getVar(ctx, "k")
//!                                      ctx["k"]
//!                                      const k = "..."; ctx[k]
//!                                      vars["k"]
//!                                         │
//!                                         ▼
//!                                 sort by offset, dedup
//! ```
//!
//! ## Invariants
//!
//! - A strategy never panics and never errors: a pattern that does not match
//!   contributes an empty vector.
//! - String literal bodies are returned verbatim (no unescaping). The codec
//!   relies on the same convention when rewriting literals in place.

use super::signals::ScriptSignals;
use regex::Captures;

bitflags::bitflags! {
    /// Set of strategies that contributed to a resolution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StrategySet: u8 {
        const INPUTS_LIST       = 1 << 0;
        const GET_VAR           = 1 << 1;
        const SUBSCRIPT         = 1 << 2;
        const CONST_PROPAGATION = 1 << 3;
        const LEGACY_VARS       = 1 << 4;
    }
}

/// Identifiers always treated as the evaluation context, in addition to the
/// parameter names of declared entry points.
const DEFAULT_CONTEXT_IDENTS: &[&str] = &["ctx", "context"];

/// A variable reference found by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hit {
    /// Byte offset of the reference in the script.
    pub offset: usize,
    pub key: String,
}

/// Shared input handed to every strategy.
#[derive(Debug)]
pub(crate) struct ScanInput<'a> {
    pub script: &'a str,
    /// Identifiers that name the evaluation context (`ctx`, entry-point params).
    pub context_idents: Vec<String>,
}

impl<'a> ScanInput<'a> {
    pub fn new(script: &'a str) -> Self {
        Self::with_signals(script, ScriptSignals::scan(script))
    }

    /// Entry-point parameters are only looked up when the scan saw an entry point.
    pub fn with_signals(script: &'a str, signals: ScriptSignals) -> Self {
        let mut context_idents: Vec<String> = DEFAULT_CONTEXT_IDENTS.iter().map(|s| s.to_string()).collect();
        if !signals.contains(ScriptSignals::HAS_ENTRY_POINT) {
            return ScanInput { script, context_idents };
        }
        for caps in regex!(r"\b(?:main|evaluate)\s*\(\s*([A-Za-z_][A-Za-z0-9_]*)").captures_iter(script) {
            let name = caps[1].to_string();
            if !context_idents.contains(&name) {
                context_idents.push(name);
            }
        }
        ScanInput { script, context_idents }
    }

    fn is_context(&self, ident: &str) -> bool {
        self.context_idents.iter().any(|c| c == ident)
    }
}

/// A fallback strategy: name, the set bit it reports, the signals it needs.
pub(crate) struct Strategy {
    pub name: &'static str,
    pub set: StrategySet,
    pub requires: ScriptSignals,
    pub scan: fn(&ScanInput<'_>) -> Vec<Hit>,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name).field("requires", &self.requires).finish()
    }
}

/// Fallback strategies in evaluation order.
pub(crate) static FALLBACK_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "get_var_call",
        set: StrategySet::GET_VAR,
        requires: ScriptSignals::HAS_GET_VAR,
        scan: scan_get_var_calls,
    },
    Strategy {
        name: "context_subscript",
        set: StrategySet::SUBSCRIPT,
        requires: ScriptSignals::HAS_SUBSCRIPT,
        scan: scan_context_subscripts,
    },
    Strategy {
        name: "const_propagation",
        set: StrategySet::CONST_PROPAGATION,
        requires: ScriptSignals::HAS_SUBSCRIPT.union(ScriptSignals::HAS_BINDINGS),
        scan: scan_const_propagation,
    },
    Strategy {
        name: "legacy_vars_subscript",
        set: StrategySet::LEGACY_VARS,
        requires: ScriptSignals::HAS_SUBSCRIPT.union(ScriptSignals::HAS_LEGACY_VARS),
        scan: scan_legacy_vars,
    },
];

/// Return the body of the quoted literal captured by a `"…"|'…'|`…`` triple
/// of groups starting at `first`.
pub(crate) fn literal_body<'t>(caps: &Captures<'t>, first: usize) -> Option<&'t str> {
    (first..first + 3).find_map(|i| caps.get(i)).map(|m| m.as_str())
}

// --- Authoritative tier -------------------------------------------------------

/// Keys of the first declared `inputs` list holding at least one string literal.
///
/// Accepts `inputs: [...]`, `inputs = [...]` and quoted-key forms such as
/// `"inputs": [...]`.
pub(crate) fn scan_inputs_list(input: &ScanInput<'_>) -> Vec<Hit> {
    for list in regex!(r#"\binputs["']?\s*[:=]\s*\[([^\]]*)\]"#).captures_iter(input.script) {
        let Some(body) = list.get(1) else { continue };
        let hits: Vec<Hit> = regex!(r#""([^"\\\r\n]*)"|'([^'\\\r\n]*)'|`([^`\\]*)`"#)
            .captures_iter(body.as_str())
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(Hit { offset: body.start() + whole.start(), key: literal_body(&caps, 1)?.to_string() })
            })
            .collect();
        if !hits.is_empty() {
            return hits;
        }
    }
    Vec::new()
}

// --- Fallback tier ------------------------------------------------------------

fn scan_get_var_calls(input: &ScanInput<'_>) -> Vec<Hit> {
    regex!(r#"\bgetVar\s*\(\s*[A-Za-z_$][A-Za-z0-9_$]*\s*,\s*(?:"([^"\\\r\n]*)"|'([^'\\\r\n]*)'|`([^`\\]*)`)\s*\)"#)
        .captures_iter(input.script)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Hit { offset: whole.start(), key: literal_body(&caps, 1)?.to_string() })
        })
        .collect()
}

fn scan_context_subscripts(input: &ScanInput<'_>) -> Vec<Hit> {
    regex!(r#"\b([A-Za-z_][A-Za-z0-9_]*)\s*\[\s*(?:"([^"\\\r\n]*)"|'([^'\\\r\n]*)'|`([^`\\]*)`)\s*\]"#)
        .captures_iter(input.script)
        .filter(|caps| input.is_context(&caps[1]))
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Hit { offset: whole.start(), key: literal_body(&caps, 2)?.to_string() })
        })
        .collect()
}

/// One-step constant propagation: `const k = "key"; ctx[k]` resolves to `key`.
///
/// The nearest binding that precedes the use wins. Uses with no preceding
/// binding are ignored.
fn scan_const_propagation(input: &ScanInput<'_>) -> Vec<Hit> {
    let bindings: Vec<(usize, String, String)> = regex!(
        r#"\b(?:const|let|var)\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?:"([^"\\\r\n]*)"|'([^'\\\r\n]*)'|`([^`\\]*)`)"#
    )
    .captures_iter(input.script)
    .filter_map(|caps| {
        let whole = caps.get(0)?;
        Some((whole.start(), caps[1].to_string(), literal_body(&caps, 2)?.to_string()))
    })
    .collect();

    if bindings.is_empty() {
        return Vec::new();
    }

    regex!(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\[\s*([A-Za-z_][A-Za-z0-9_]*)\s*\]")
        .captures_iter(input.script)
        .filter(|caps| input.is_context(&caps[1]))
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = &caps[2];
            let (_, _, value) = bindings.iter().rev().find(|(offset, bound, _)| *offset < whole.start() && bound == name)?;
            Some(Hit { offset: whole.start(), key: value.clone() })
        })
        .collect()
}

fn scan_legacy_vars(input: &ScanInput<'_>) -> Vec<Hit> {
    regex!(r#"\bvars\s*\[\s*(?:"([^"\\\r\n]*)"|'([^'\\\r\n]*)'|`([^`\\]*)`)\s*\]"#)
        .captures_iter(input.script)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Hit { offset: whole.start(), key: literal_body(&caps, 1)?.to_string() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(hits: Vec<Hit>) -> Vec<String> {
        hits.into_iter().map(|h| h.key).collect()
    }

    #[test]
    fn context_idents_include_entry_point_params() {
        let input = ScanInput::new("fn evaluate(row) { row[\"a\"] }");
        assert!(input.is_context("row"));
        assert!(input.is_context("ctx"));
        assert!(!input.is_context("other"));
    }

    #[test]
    fn entry_point_params_need_the_entry_point_signal() {
        let script = "fn evaluate(row) { row[\"a\"] }";
        let gated = ScanInput::with_signals(script, ScriptSignals::HAS_SUBSCRIPT);
        assert!(!gated.is_context("row"));
        assert!(gated.is_context("ctx"));
    }

    #[test]
    fn inputs_list_accepts_all_quote_styles() {
        let input = ScanInput::new("const inputs = [\"a\", 'b', `c`];");
        assert_eq!(keys(scan_inputs_list(&input)), vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_inputs_list_is_skipped() {
        let input = ScanInput::new("let x = #{ inputs: [] }; const inputs = [\"late\"];");
        assert_eq!(keys(scan_inputs_list(&input)), vec!["late"]);
    }

    #[test]
    fn subscript_on_unrelated_identifier_is_ignored() {
        let input = ScanInput::new(r#"fn main(ctx) { let list = table["x"]; ctx["y"] }"#);
        assert_eq!(keys(scan_context_subscripts(&input)), vec!["y"]);
    }

    #[test]
    fn const_propagation_uses_nearest_preceding_binding() {
        let script = r#"
            const k = "first";
            let a = ctx[k];
            const k = "second";
            let b = ctx[k];
        "#;
        let input = ScanInput::new(script);
        assert_eq!(keys(scan_const_propagation(&input)), vec!["first", "second"]);
    }

    #[test]
    fn const_propagation_ignores_unbound_names() {
        let input = ScanInput::new("fn main(ctx) { ctx[key] }");
        assert!(scan_const_propagation(&input).is_empty());
    }

    #[test]
    fn get_var_accepts_any_context_name() {
        let input = ScanInput::new("getVar(state, 'Form.Email') || getVar( ctx , \"Form.Phone\" )");
        assert_eq!(keys(scan_get_var_calls(&input)), vec!["Form.Email", "Form.Phone"]);
    }
}
