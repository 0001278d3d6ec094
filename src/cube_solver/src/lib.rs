#![warn(clippy::pedantic)]
#![allow(clippy::similar_names, clippy::too_many_lines, clippy::module_name_repetitions)]

pub mod canonical_fsm;
pub mod config;
pub mod error;
pub mod move_table;
pub mod orchestrator;
pub mod persistence;
pub mod phase;
pub mod pruning;
pub mod search;
pub mod tables;

pub use config::{Config, SolveConfig, TableConfig};
pub use error::{SearchError, SolveError, TableError};
pub use orchestrator::{Algorithm, FourPhase, Optimal, Solution, TwoPhase, solve};
pub use pruning::PatternDbKind;
pub use tables::TableRepository;

#[macro_export]
macro_rules! start {
    ($msg:expr) => {
        concat!("⏳ ", $msg)
    };
}

#[macro_export]
macro_rules! working {
    ($msg:expr) => {
        concat!("🛠  ", $msg)
    };
}

#[macro_export]
macro_rules! success {
    ($msg:expr) => {
        concat!("✅ ", $msg)
    };
}
