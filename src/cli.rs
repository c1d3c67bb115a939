//! Command line interface definition using clap.
//!
//! `papermake` follows `make`: targets are positional and every mode is a
//! flag, so `papermake clean all` reads the way it would with a Makefile.

use clap::Parser;
use std::path::PathBuf;

use crate::manifest::DEFAULT_MANIFEST;

/// Rebuild a paper's figures, PDF and submission archives from a YAML
/// Paperfile, running only what is out of date.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the Paperfile to use.
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = DEFAULT_MANIFEST,
        env = "PAPERMAKE_FILE"
    )]
    pub file: PathBuf,

    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Print the commands that would run without running them.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Keep building unrelated targets after a command fails.
    #[arg(short, long)]
    pub keep_going: bool,

    /// Enable verbose logging output.
    #[arg(short, long, env = "PAPERMAKE_VERBOSE")]
    pub verbose: bool,

    /// Print the dependency graph in DOT format and exit.
    #[arg(long, conflicts_with = "list")]
    pub graph: bool,

    /// Print every declared target and exit.
    #[arg(long)]
    pub list: bool,

    /// Targets to bring up to date; the manifest defaults when omitted.
    #[arg(value_name = "TARGETS")]
    pub targets: Vec<String>,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_MANIFEST),
            directory: None,
            dry_run: false,
            keep_going: false,
            verbose: false,
            graph: false,
            list: false,
            targets: Vec::new(),
        }
    }
}

impl Cli {
    /// Parse the provided arguments.
    ///
    /// # Panics
    ///
    /// Panics if argument parsing fails.
    #[must_use]
    pub fn parse_from_or_panic<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args).unwrap_or_else(|e| panic!("CLI parsing failed: {e}"))
    }
}
