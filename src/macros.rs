#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Emit a `tracing::debug!` event only when the diagnostics switch is on.
///
/// The switch is `Options::debug` (or a component's copy of it), so tracing can be
/// silenced per call site without touching the global subscriber.
#[macro_export]
macro_rules! debug_event {
    ($enabled:expr, target: $target:literal, $($arg:tt)+) => {
        if $enabled {
            tracing::debug!(target: $target, $($arg)+);
        }
    };
}
