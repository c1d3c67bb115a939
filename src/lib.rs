//! Papermake core library.
//!
//! Papermake rebuilds the artefacts of a scientific paper (figures, the
//! typeset PDF, bibliography and submission archives) from a YAML
//! `Paperfile`, re-running only the commands whose outputs are stale. The
//! pipeline is manifest → [`graph::BuildGraph`] → [`evaluator::Evaluator`].

pub mod ast;
pub mod cli;
pub mod evaluator;
pub mod graph;
pub mod manifest;
pub mod runner;
