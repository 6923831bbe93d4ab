//! Identifier codec: display form (labels) <-> storage form (stable IDs).
//!
//! Scripts reference variables by human-readable label while authored and by
//! opaque stable ID when persisted. The codec rewrites the string literal of two
//! syntactic shapes and nothing else:
//!
//! ```text
//! subscript      ident[ "<literal>" ]
//! accessor call  ident( ident, "<literal>" )
//! ```
//!
//! Quote style, whitespace and call shape are preserved; only the literal body
//! changes. A label without an ID (or an ID without a label) is left exactly as
//! it was, so constants and stale IDs are never dropped:
//!
//! ```text
//! to_storage_form: label ──directory.stable_id──▶ id     (miss: unchanged)
//! to_display_form: uuid? ──directory.label──────▶ label  (miss/not uuid: unchanged)
//! ```
//!
//! Misses are reported on the `condwright::codec` tracing target when
//! diagnostics are enabled; they are not part of the return value.

#[path = "codec/directory.rs"]
mod directory;

pub use directory::{MemoryDirectory, NameDirectory};

use regex::{Captures, Regex};

/// Direction of a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToStorage,
    ToDisplay,
}

/// Codec bound to a directory for one project context.
pub struct IdentifierCodec<'d> {
    directory: &'d dyn NameDirectory,
    debug: bool,
}

impl std::fmt::Debug for IdentifierCodec<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierCodec").field("directory", &"<dyn NameDirectory>").field("debug", &self.debug).finish()
    }
}

impl<'d> IdentifierCodec<'d> {
    pub fn new(directory: &'d dyn NameDirectory) -> Self {
        IdentifierCodec { directory, debug: false }
    }

    /// Enable miss diagnostics on the `condwright::codec` target.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Replace variable labels with their stable IDs.
    pub fn to_storage_form(&self, script: &str) -> String {
        self.rewrite(script, Direction::ToStorage)
    }

    /// Replace stable IDs with their labels.
    pub fn to_display_form(&self, script: &str) -> String {
        self.rewrite(script, Direction::ToDisplay)
    }

    fn rewrite(&self, script: &str, direction: Direction) -> String {
        let subscripts = rewrite_shape(subscript_shape(), script, |literal| self.translate(literal, direction));
        rewrite_shape(accessor_shape(), &subscripts, |literal| self.translate(literal, direction))
    }

    fn translate(&self, literal: &str, direction: Direction) -> Option<String> {
        match direction {
            Direction::ToStorage => {
                let id = self.directory.stable_id(literal);
                if id.is_none() {
                    crate::debug_event!(self.debug, target: "condwright::codec", label = literal, "no stable id, left as-is");
                }
                id
            }
            Direction::ToDisplay => {
                if !is_uuid_shaped(literal) {
                    return None;
                }
                let label = self.directory.label(literal);
                if label.is_none() {
                    crate::debug_event!(self.debug, target: "condwright::codec", id = literal, "unknown id, left as-is");
                }
                label
            }
        }
    }
}

/// `ident[ <literal> ]`
fn subscript_shape() -> &'static Regex {
    regex!(
        r#"(?P<head>[A-Za-z_$][A-Za-z0-9_$]*\s*\[\s*)(?:"(?P<dq>[^"\\\r\n]*)"|'(?P<sq>[^'\\\r\n]*)'|`(?P<bq>[^`\\]*)`)(?P<tail>\s*\])"#
    )
}

/// `ident( ident, <literal> )`
fn accessor_shape() -> &'static Regex {
    regex!(
        r#"(?P<head>[A-Za-z_$][A-Za-z0-9_$]*\s*\(\s*[A-Za-z_$][A-Za-z0-9_$]*\s*,\s*)(?:"(?P<dq>[^"\\\r\n]*)"|'(?P<sq>[^'\\\r\n]*)'|`(?P<bq>[^`\\]*)`)(?P<tail>\s*\))"#
    )
}

/// Rewrite the literal of every match of `shape`; `translate` returning `None`
/// keeps the match byte-for-byte.
fn rewrite_shape(shape: &Regex, script: &str, translate: impl Fn(&str) -> Option<String>) -> String {
    shape
        .replace_all(script, |caps: &Captures<'_>| {
            let (quote, body) = if let Some(m) = caps.name("dq") {
                ('"', m.as_str())
            } else if let Some(m) = caps.name("sq") {
                ('\'', m.as_str())
            } else if let Some(m) = caps.name("bq") {
                ('`', m.as_str())
            } else {
                return caps[0].to_string();
            };

            match translate(body) {
                Some(replacement) => format!("{}{quote}{replacement}{quote}{}", &caps["head"], &caps["tail"]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// True for the canonical 8-4-4-4-12 hex UUID shape.
pub fn is_uuid_shaped(value: &str) -> bool {
    regex!(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").is_match(value)
}

/// Replace variable labels in `script` with stable IDs from `directory`.
pub fn to_storage_form(script: &str, directory: &dyn NameDirectory) -> String {
    IdentifierCodec::new(directory).to_storage_form(script)
}

/// Replace stable IDs in `script` with labels from `directory`.
pub fn to_display_form(script: &str, directory: &dyn NameDirectory) -> String {
    IdentifierCodec::new(directory).to_display_form(script)
}
