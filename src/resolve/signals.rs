//! Script signal scanning (input pre-classification).
//!
//! Before any strategy runs, the raw script is scanned once for coarse signals
//! that decide which extraction strategies are worth attempting. A script that
//! never mentions `getVar` cannot produce accessor-call hits, a script without
//! a `[` cannot produce subscript hits, and so on.
//!
//! ## Design notes
//!
//! - This is a *heuristic* scan. False positives are fine because each
//!   strategy still has to match its full pattern; false negatives are not,
//!   so every check is a plain substring test.
//! - Comments and strings are not stripped here. A mention of `inputs` inside
//!   a comment only enables the authoritative strategy, which then has to find
//!   a real bracketed list.

bitflags::bitflags! {
    /// Coarse signals detected in a script.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScriptSignals: u32 {
        const HAS_INPUTS       = 1 << 0;
        const HAS_GET_VAR      = 1 << 1;
        const HAS_SUBSCRIPT    = 1 << 2;
        const HAS_BINDINGS     = 1 << 3;
        const HAS_LEGACY_VARS  = 1 << 4;
        const HAS_ENTRY_POINT  = 1 << 5;
    }
}

impl ScriptSignals {
    /// Scan `script` for coarse signals.
    pub fn scan(script: &str) -> Self {
        let mut signals = ScriptSignals::empty();

        if script.contains("inputs") {
            signals |= ScriptSignals::HAS_INPUTS;
        }
        if script.contains("getVar") {
            signals |= ScriptSignals::HAS_GET_VAR;
        }
        if script.contains('[') {
            signals |= ScriptSignals::HAS_SUBSCRIPT;
        }
        if script.contains("const") || script.contains("let") || script.contains("var ") {
            signals |= ScriptSignals::HAS_BINDINGS;
        }
        if script.contains("vars") {
            signals |= ScriptSignals::HAS_LEGACY_VARS;
        }
        if script.contains("main") || script.contains("evaluate") {
            signals |= ScriptSignals::HAS_ENTRY_POINT;
        }

        signals
    }
}
