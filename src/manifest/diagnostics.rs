//! Errors raised while reading a `Paperfile`, with source spans and hints.
use super::hints::YAML_HINTS;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_saphyr::{Error as YamlError, Location};
use thiserror::Error;

/// Error raised when a manifest cannot be parsed or has the wrong shape.
///
/// ```rust
/// use papermake::manifest::ManifestError;
///
/// let err = ManifestError::VarsNotMapping { manifest: "Paperfile".into() };
/// assert_eq!(err.to_string(), "vars in Paperfile must be a mapping with string keys");
/// ```
#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    /// The file is not valid YAML.
    #[error("YAML parse error in {manifest} at line {line}, column {column}: {detail}")]
    #[diagnostic(code(papermake::manifest::yaml))]
    Yaml {
        /// Display name of the manifest.
        manifest: String,
        /// One-based line of the failure.
        line: u64,
        /// One-based column of the failure.
        column: u64,
        /// Parser message.
        detail: String,
        /// Manifest text for the rendered snippet.
        #[source_code]
        src: NamedSource<String>,
        /// Offending location, when the parser reported one.
        #[label("parse error here")]
        span: Option<SourceSpan>,
        /// Suggested fix.
        #[help]
        hint: Option<String>,
        /// Underlying parser error.
        #[source]
        source: YamlError,
    },

    /// The top-level `vars` key holds something other than a mapping.
    #[error("vars in {manifest} must be a mapping with string keys")]
    #[diagnostic(
        code(papermake::manifest::vars),
        help("Write vars as `name: value` pairs.")
    )]
    VarsNotMapping {
        /// Display name of the manifest.
        manifest: String,
    },

    /// The YAML parsed but does not describe a manifest.
    #[error("manifest structure error in {manifest}: {source}")]
    #[diagnostic(code(papermake::manifest::structure))]
    Structure {
        /// Display name of the manifest.
        manifest: String,
        /// Deserialisation failure naming the bad field.
        #[source]
        source: serde_json::Error,
    },
}

impl ManifestError {
    /// Build a [`ManifestError::Yaml`] for `err` raised while parsing `text`.
    #[must_use]
    pub fn yaml(err: YamlError, text: &str, manifest: &str) -> Self {
        let location = err.location();
        let detail = err.to_string();
        let hint = hint_for(&detail, text, location);
        let (line, column) = location.map_or((1, 1), |loc| (loc.line(), loc.column()));
        Self::Yaml {
            manifest: manifest.to_owned(),
            line,
            column,
            detail,
            src: NamedSource::new(manifest, text.to_owned()),
            span: location.map(|loc| span_at(text, loc)),
            hint,
            source: err,
        }
    }

    /// Build a [`ManifestError::Structure`] for a schema mismatch.
    #[must_use]
    pub fn structure(err: serde_json::Error, manifest: &str) -> Self {
        Self::Structure {
            manifest: manifest.to_owned(),
            source: err,
        }
    }
}

/// Start offset and content of the line `loc` refers to.
fn line_of(text: &str, loc: Location) -> Option<(usize, &str)> {
    let index = usize::try_from(loc.line().saturating_sub(1)).ok()?;
    let mut start = 0;
    for (idx, segment) in text.split_inclusive('\n').enumerate() {
        if idx == index {
            return Some((start, segment.trim_end_matches(['\r', '\n'])));
        }
        start += segment.len();
    }
    None
}

/// Byte range covering the character at `loc`, or the line end when the
/// column runs past it.
fn span_at(text: &str, loc: Location) -> SourceSpan {
    let Some((line_start, line)) = line_of(text, loc) else {
        return SourceSpan::new(text.len().into(), 0);
    };
    let column = usize::try_from(loc.column().saturating_sub(1)).unwrap_or(usize::MAX);
    match line.char_indices().nth(column) {
        Some((offset, ch)) => SourceSpan::new((line_start + offset).into(), ch.len_utf8()),
        None => SourceSpan::new((line_start + line.len()).into(), 0),
    }
}

fn hint_for(detail: &str, text: &str, loc: Option<Location>) -> Option<String> {
    let tab_indented = loc
        .and_then(|l| line_of(text, l))
        .is_some_and(|(_, line)| {
            line.chars()
                .take_while(|c| c.is_whitespace())
                .any(|c| c == '\t')
        });
    if tab_indented {
        return Some("Indent with spaces; YAML rejects tabs.".into());
    }
    let lower = detail.to_lowercase();
    YAML_HINTS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, hint)| (*hint).to_owned())
}
