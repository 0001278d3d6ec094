use crate::{orchestrator::Algorithm, phase::PhaseKind};
use cube_core::CubeError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Cached table `{name}` does not match the expected shape: {reason}")]
    LoadMismatch { name: String, reason: String },
    #[error("Table `{0}` was not built into this repository")]
    Missing(String),
    #[error("Pattern database `{table}` cannot serve as a heuristic for the {phase} phase")]
    Incompatible { table: String, phase: PhaseKind },
    #[error("A table generation worker panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a bounded search gave up.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    #[error("Time limit exceeded after {0:.3?}")]
    Timeout(Duration),
    #[error("No solution within the maximum depth of {0}")]
    Exhausted(u8),
}

#[derive(Error, Debug)]
pub enum SolveError {
    #[error(transparent)]
    InvalidCube(#[from] CubeError),
    #[error("{algorithm} failed in the {phase} phase: {source}")]
    PhaseFailed {
        algorithm: Algorithm,
        phase: PhaseKind,
        #[source]
        source: SearchError,
    },
    #[error(transparent)]
    Tables(#[from] TableError),
    #[error("{algorithm} produced `{moves}`, which does not solve the cube")]
    VerificationFailed { algorithm: Algorithm, moves: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
