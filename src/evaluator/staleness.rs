//! Modification-time comparisons deciding whether an edge must run.

use std::fmt;
use std::io;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};

use super::EvalError;

/// Read the modification time of `path`, or `None` when it does not exist.
pub(super) fn modified_time(path: &Utf8Path) -> Result<Option<SystemTime>, EvalError> {
    match path.metadata().and_then(|meta| meta.modified()) {
        Ok(mtime) => Ok(Some(mtime)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(EvalError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Facts gathered while bringing an edge's prerequisites up to date.
#[derive(Debug, Default)]
pub(super) struct InputSummary {
    rebuilt: Option<Utf8PathBuf>,
    newest: Option<(Utf8PathBuf, SystemTime)>,
}

impl InputSummary {
    /// A rule-backed prerequisite ran this pass or is phony.
    pub(super) fn record_rebuilt(&mut self, input: &Utf8Path) {
        self.rebuilt.get_or_insert_with(|| input.to_path_buf());
    }

    /// A prerequisite exists on disk with `mtime`.
    pub(super) fn record_mtime(&mut self, input: &Utf8Path, mtime: SystemTime) {
        if self.newest.as_ref().is_none_or(|(_, seen)| mtime > *seen) {
            self.newest = Some((input.to_path_buf(), mtime));
        }
    }
}

/// State of an edge's outputs on disk.
#[derive(Debug)]
pub(super) enum OutputTimes {
    /// At least one output is absent.
    Missing(Utf8PathBuf),
    /// Every output exists; holds the oldest mtime (`None` for no outputs).
    Oldest(Option<SystemTime>),
}

/// Why an edge is (or is not) stale.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Staleness {
    Fresh,
    Phony,
    MissingOutput(Utf8PathBuf),
    PrerequisiteRebuilt(Utf8PathBuf),
    NewerPrerequisite(Utf8PathBuf),
}

impl Staleness {
    /// Apply the make rules, most decisive reason first.
    pub(super) fn decide(phony: bool, inputs: InputSummary, outputs: OutputTimes) -> Self {
        if phony {
            return Self::Phony;
        }
        if let OutputTimes::Missing(path) = outputs {
            return Self::MissingOutput(path);
        }
        if let Some(input) = inputs.rebuilt {
            return Self::PrerequisiteRebuilt(input);
        }
        match (inputs.newest, outputs) {
            (Some((input, newest)), OutputTimes::Oldest(Some(oldest))) if newest > oldest => {
                Self::NewerPrerequisite(input)
            }
            _ => Self::Fresh,
        }
    }

    pub(super) fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => f.write_str("up to date"),
            Self::Phony => f.write_str("phony"),
            Self::MissingOutput(path) => write!(f, "output '{path}' is missing"),
            Self::PrerequisiteRebuilt(path) => write!(f, "prerequisite '{path}' was remade"),
            Self::NewerPrerequisite(path) => write!(f, "prerequisite '{path}' is newer"),
        }
    }
}
