//! Error types for the runner module.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised before the evaluator starts.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The manifest file does not exist at the expected path.
    #[error("No `{manifest_name}` found in {directory}")]
    #[diagnostic(
        code(papermake::runner::manifest_not_found),
        help("Create a Paperfile, or point at one with -f/--file or -C/--directory.")
    )]
    ManifestNotFound {
        /// Name of the expected manifest file (e.g., "Paperfile").
        manifest_name: String,
        /// Directory description (e.g., "the current directory").
        directory: String,
        /// The path that was attempted.
        path: PathBuf,
    },

    /// A path given on the command line is not valid UTF-8.
    #[error("Path {} is not valid UTF-8", path.display())]
    #[diagnostic(code(papermake::runner::non_utf8_path))]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },
}
