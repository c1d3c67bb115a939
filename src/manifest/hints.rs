//! Fix-it hints attached to YAML parse diagnostics.
//!
//! Each entry pairs a lower-case fragment of a parser message with advice.
//! The first matching fragment wins.

pub(crate) const YAML_HINTS: [(&str, &str); 6] = [
    (
        "did not find expected '-'",
        "Start list items with '-' and ensure proper indentation.",
    ),
    (
        "expected ':'",
        "Ensure each key is followed by ':' separating key and value.",
    ),
    (
        "mapping values are not allowed",
        "Check for a stray ':' or add quotes around values where needed.",
    ),
    (
        "found character that cannot start any token",
        "Quote values that start with '{{', '%' or '@'; template expressions must be strings.",
    ),
    (
        "unknown escape character",
        "Use valid YAML escape sequences or quote the string with single quotes.",
    ),
    (
        "duplicate",
        "Each key may appear once per mapping; merge the repeated entries.",
    ),
];
