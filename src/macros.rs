/// Compile a literal pattern once and hand out a `&'static Regex`.
///
/// Only for patterns that are fixed at build time; user-authored rule
/// patterns go through `Condition::parse` so their errors become diagnostics.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).expect("built-in pattern must compile"));
        &*RE
    }};
}

/// Build the fixed keyword table for the built-in actions.
///
/// Each entry maps one or more keywords onto a parser function
/// `fn(&str, &LoadEnv) -> Result<Action, String>`.
#[macro_export]
macro_rules! action_table {
    ( $( [$($kw:literal),+ $(,)?] => $parse:path ),* $(,)? ) => {
        &[ $( $( ($kw, $parse as $crate::action::ParseFn) ),+ ),* ]
    };
}
