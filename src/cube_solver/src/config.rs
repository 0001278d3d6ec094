//! Solver and table settings. Everything has a default, and any subset can
//! be overridden from a TOML file:
//!
//! ```toml
//! [solve]
//! fallback = false
//! two_phase_target_length = 22
//! optimal_pattern_dbs = ["corners", "twist_slice", "flip_slice"]
//!
//! [solve.optimal]
//! max_depth = 18
//! timeout_ms = 60000
//!
//! [tables]
//! cache_dir = "/var/cache/cubesearch"
//! threads = 4
//! ```

use crate::{error::ConfigError, phase::PhaseKind, pruning::PatternDbKind};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

const DEFAULT_PHASE_TIMEOUT_MS: u64 = 10_000;

/// Limits on one bounded search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseLimits {
    pub max_depth: u8,
    /// No deadline when absent.
    pub timeout_ms: Option<u64>,
}

impl PhaseLimits {
    #[must_use]
    pub const fn for_phase(kind: PhaseKind) -> Self {
        Self {
            max_depth: kind.default_max_depth(),
            timeout_ms: Some(DEFAULT_PHASE_TIMEOUT_MS),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for PhaseLimits {
    fn default() -> Self {
        Self {
            max_depth: PhaseKind::Optimal.default_max_depth(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    /// Also reports every phase of every solve.
    Verbose,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveConfig {
    pub four_phase: [PhaseLimits; 4],
    pub two_phase: [PhaseLimits; 2],
    /// Keep enumerating phase-one solutions until the total is at most this
    /// long. The first solution found is returned when absent.
    pub two_phase_target_length: Option<u8>,
    pub optimal: PhaseLimits,
    pub optimal_pattern_dbs: Vec<PatternDbKind>,
    /// Retry a failed four-phase solve with the two-phase algorithm.
    pub fallback: bool,
    /// How many times a timed out phase is retried with double the time.
    pub timeout_retries: u32,
    pub verbosity: Verbosity,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            four_phase: [
                PhaseLimits::for_phase(PhaseKind::OrientEdges),
                PhaseLimits::for_phase(PhaseKind::OrientCorners),
                PhaseLimits::for_phase(PhaseKind::ReduceToHalfTurns),
                PhaseLimits::for_phase(PhaseKind::SolveHalfTurns),
            ],
            two_phase: [
                PhaseLimits::for_phase(PhaseKind::ReduceToDomino),
                PhaseLimits::for_phase(PhaseKind::SolveDomino),
            ],
            two_phase_target_length: None,
            optimal: PhaseLimits {
                max_depth: PhaseKind::Optimal.default_max_depth(),
                timeout_ms: None,
            },
            optimal_pattern_dbs: PhaseKind::Optimal.default_heuristics().to_vec(),
            fallback: true,
            timeout_retries: 1,
            verbosity: Verbosity::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Defaults to `cubesearch` under the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    pub use_cache: bool,
    /// Threads for pattern database construction. All available cores when
    /// absent.
    pub threads: Option<usize>,
}

impl TableConfig {
    /// Builds every table in memory and never touches the disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            cache_dir: None,
            use_cache: false,
            threads: None,
        }
    }

    /// Where tables are cached, if anywhere.
    #[must_use]
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        if !self.use_cache {
            return None;
        }
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("cubesearch")))
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            use_cache: true,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub solve: SolveConfig,
    pub tables: TableConfig,
}

impl Config {
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// # Errors
    ///
    /// Fails when `text` is not a valid configuration.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}
