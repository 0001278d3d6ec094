//! The solving algorithms, each a chain of phase searches, and the `solve`
//! entry point that runs and checks them.

mod four_phase;
mod optimal;
mod two_phase;

pub use four_phase::FourPhase;
pub use optimal::{Estimate, Optimal};
pub use two_phase::TwoPhase;

use crate::{
    config::{PhaseLimits, SolveConfig, Verbosity},
    error::{SearchError, SolveError},
    phase::{Phase, PhaseKind},
    pruning::PatternDbKind,
    search::{IdaSearch, SearchLimits},
    start, success,
    tables::TableRepository,
};
use cube_core::{
    CubeError, CubieState, Move,
    moves::{format_sequence, simplify},
};
use enum_dispatch::enum_dispatch;
use log::{debug, error, info, warn};
use std::{fmt, str::FromStr, time::{Duration, Instant}};

#[enum_dispatch]
pub trait Orchestrator {
    /// The phases `run` may search, each with the databases it reads.
    fn required_phases(&self, config: &SolveConfig) -> Vec<(PhaseKind, Vec<PatternDbKind>)>;

    /// Solves a valid, unsolved state. The moves of the returned solution
    /// are the phases' moves concatenated, before simplification.
    ///
    /// # Errors
    ///
    /// Fails when a phase search fails or a table is missing.
    fn run(
        &self,
        state: &CubieState,
        tables: &TableRepository,
        config: &SolveConfig,
    ) -> Result<Solution, SolveError>;
}

#[enum_dispatch(Orchestrator)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    FourPhase,
    TwoPhase,
    Optimal,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::FourPhase(FourPhase),
        Algorithm::TwoPhase(TwoPhase),
        Algorithm::Optimal(Optimal),
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::FourPhase(_) => "four-phase",
            Algorithm::TwoPhase(_) => "two-phase",
            Algorithm::Optimal(_) => "optimal",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == s)
            .ok_or_else(|| format!("unknown algorithm `{s}`"))
    }
}

/// What one phase contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: PhaseKind,
    pub moves: Vec<Move>,
    pub nodes: u64,
    pub elapsed: Duration,
    /// Searches run, more than one after a timeout was retried.
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub moves: Vec<Move>,
    pub phases: Vec<PhaseReport>,
    /// The algorithm that found the moves, which differs from the one asked
    /// for after a fallback.
    pub algorithm: Algorithm,
}

impl Solution {
    fn from_phases(algorithm: Algorithm, phases: Vec<PhaseReport>) -> Self {
        Self {
            moves: phases.iter().flat_map(|report| report.moves.iter().copied()).collect(),
            phases,
            algorithm,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[must_use]
    pub fn nodes(&self) -> u64 {
        self.phases.iter().map(|report| report.nodes).sum()
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_sequence(&self.moves))
    }
}

/// Solves `state` with `algorithm`. The result is simplified and checked
/// by replaying it on `state`.
///
/// # Errors
///
/// Fails with [`SolveError::InvalidCube`] for an unreachable state, with
/// [`SolveError::PhaseFailed`] when a search runs out of depth or time, and
/// with [`SolveError::Tables`] when `tables` lacks something the algorithm
/// reads.
pub fn solve(
    state: &CubieState,
    algorithm: Algorithm,
    tables: &TableRepository,
    config: &SolveConfig,
) -> Result<Solution, SolveError> {
    state.verify().map_err(CubeError::from)?;
    if state.is_solved() {
        return Ok(Solution {
            moves: vec![],
            phases: vec![],
            algorithm,
        });
    }

    debug!(start!("Solving with {}..."), algorithm);
    let start = Instant::now();
    let mut solution = algorithm.run(state, tables, config)?;
    solution.moves = simplify(&solution.moves);
    if !state.apply_sequence(&solution.moves).is_solved() {
        return Err(SolveError::VerificationFailed {
            algorithm: solution.algorithm,
            moves: format_sequence(&solution.moves),
        });
    }

    let elapsed = start.elapsed().as_secs_f64();
    match config.verbosity {
        Verbosity::Quiet => debug!(
            success!("{} found {} moves in {:.3}s"),
            solution.algorithm,
            solution.len(),
            elapsed
        ),
        Verbosity::Normal | Verbosity::Verbose => info!(
            success!("{} found {} moves in {:.3}s"),
            solution.algorithm,
            solution.len(),
            elapsed
        ),
    }
    if config.verbosity == Verbosity::Verbose {
        for report in &solution.phases {
            info!(
                "  {}: {} ({} nodes, {:.3}s)",
                report.phase,
                format_sequence(&report.moves),
                report.nodes,
                report.elapsed.as_secs_f64()
            );
        }
    }
    Ok(solution)
}

/// The timeout for the next attempt after one timed out. A zero timeout
/// still grows.
fn retry_timeout(timeout: Option<Duration>) -> Option<Duration> {
    timeout.map(|timeout| (timeout * 2).max(Duration::from_millis(1)))
}

/// Searches one phase from `state`, doubling the timeout after each
/// timeout until `retries` runs out.
fn run_phase(
    algorithm: Algorithm,
    phase: &Phase,
    state: &CubieState,
    limits: PhaseLimits,
    retries: u32,
) -> Result<PhaseReport, SolveError> {
    let root = phase.node(state);
    let mut timeout = limits.timeout();
    let mut attempt = 0;
    loop {
        let mut search = IdaSearch::new(phase, SearchLimits::new(limits.max_depth, timeout));
        match search.solve(root) {
            Ok(moves) => {
                let stats = search.stats();
                debug!(
                    "{} phase: {} moves, {} nodes, bound {}",
                    phase.kind(),
                    moves.len(),
                    stats.nodes,
                    stats.final_bound
                );
                return Ok(PhaseReport {
                    phase: phase.kind(),
                    moves,
                    nodes: stats.nodes,
                    elapsed: stats.elapsed,
                    attempts: attempt + 1,
                });
            }
            Err(SearchError::Timeout(elapsed)) if attempt < retries => {
                attempt += 1;
                timeout = retry_timeout(timeout);
                warn!(
                    "{} phase timed out after {:.3}s; retrying with {:?}",
                    phase.kind(),
                    elapsed.as_secs_f64(),
                    timeout
                );
            }
            Err(source) => {
                if let SearchError::Exhausted(max_depth) = source {
                    error!(
                        "{algorithm} found no {} solution within {max_depth} moves from {}",
                        phase.kind(),
                        phase.describe(&root)
                    );
                }
                return Err(SolveError::PhaseFailed {
                    algorithm,
                    phase: phase.kind(),
                    source,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_names_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.to_string().parse(), Ok(algorithm));
        }
        assert!("korf".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_solved_state_needs_no_tables() {
        let tables = TableRepository::default();
        for algorithm in Algorithm::ALL {
            let solution =
                solve(&CubieState::SOLVED, algorithm, &tables, &SolveConfig::default()).unwrap();
            assert!(solution.is_empty());
            assert_eq!(solution.to_string(), "");
        }
    }

    #[test]
    fn test_invalid_state_is_rejected() {
        let mut state = CubieState::SOLVED;
        state.co[0] = 1;
        assert!(matches!(
            solve(
                &state,
                Algorithm::Optimal(Optimal),
                &TableRepository::default(),
                &SolveConfig::default()
            ),
            Err(SolveError::InvalidCube(_))
        ));
    }

    #[test]
    fn test_missing_tables_are_an_error() {
        let state = CubieState::from_moves(&[Move::R]);
        assert!(matches!(
            solve(
                &state,
                Algorithm::TwoPhase(TwoPhase),
                &TableRepository::default(),
                &SolveConfig::default()
            ),
            Err(SolveError::Tables(_))
        ));
    }

    #[test]
    fn test_solution_display() {
        let solution = Solution::from_phases(
            Algorithm::TwoPhase(TwoPhase),
            vec![
                PhaseReport {
                    phase: PhaseKind::ReduceToDomino,
                    moves: vec![Move::R, Move::U_PRIME],
                    nodes: 3,
                    elapsed: Duration::ZERO,
                    attempts: 1,
                },
                PhaseReport {
                    phase: PhaseKind::SolveDomino,
                    moves: vec![Move::D2],
                    nodes: 4,
                    elapsed: Duration::ZERO,
                    attempts: 1,
                },
            ],
        );
        assert_eq!(solution.to_string(), "R U' D2");
        assert_eq!(solution.len(), 3);
        assert_eq!(solution.nodes(), 7);
    }
}
