//! Test utilities shared by the papermake integration tests.
//!
//! The helpers build throwaway paper repositories: a temporary root with a
//! `Paperfile`, source files at controlled modification times and small
//! executable stubs standing in for LaTeX and plotting tools.

pub mod exec;
pub mod manifest;
pub mod workspace;

pub use exec::{make_executable, write_script};
pub use manifest::manifest_yaml;
pub use workspace::PaperWorkspace;

use assert_cmd::Command;

/// A `papermake` command running against `workspace` with logging quietened.
///
/// # Panics
///
/// Panics if the binary cannot be located.
#[must_use]
pub fn papermake_in(workspace: &PaperWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("papermake").expect("papermake binary");
    cmd.arg("-C")
        .arg(workspace.root().as_std_path())
        .env_remove("PAPERMAKE_FILE")
        .env_remove("PAPERMAKE_VERBOSE");
    cmd
}
