use super::{Algorithm, Orchestrator, Solution, run_phase};
use crate::{
    config::SolveConfig,
    error::SolveError,
    phase::{Phase, PhaseKind},
    pruning::PatternDbKind,
    search::SearchSpace,
    tables::TableRepository,
};
use cube_core::{CubeError, CubieState};

/// Korf's single search over all moves. Every heuristic is an exact
/// distance in some projection of the cube, so the first solution found is
/// a shortest one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Optimal;

/// A lower bound on a state's distance to solved, and what each database
/// contributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Estimate {
    pub lower_bound: u8,
    pub breakdown: Vec<(PatternDbKind, u8)>,
}

impl Optimal {
    /// # Errors
    ///
    /// Fails for an unreachable state or when a configured database is
    /// missing from `tables`.
    pub fn estimate(
        state: &CubieState,
        tables: &TableRepository,
        config: &SolveConfig,
    ) -> Result<Estimate, SolveError> {
        state.verify().map_err(CubeError::from)?;
        let phase = Phase::with_heuristics(PhaseKind::Optimal, tables, &config.optimal_pattern_dbs)?;
        let node = phase.node(state);
        Ok(Estimate {
            lower_bound: phase.heuristic(&node),
            breakdown: phase.estimates(&node),
        })
    }
}

impl Orchestrator for Optimal {
    fn required_phases(&self, config: &SolveConfig) -> Vec<(PhaseKind, Vec<PatternDbKind>)> {
        vec![(PhaseKind::Optimal, config.optimal_pattern_dbs.clone())]
    }

    fn run(
        &self,
        state: &CubieState,
        tables: &TableRepository,
        config: &SolveConfig,
    ) -> Result<Solution, SolveError> {
        let algorithm = Algorithm::Optimal(Optimal);
        let phase = Phase::with_heuristics(PhaseKind::Optimal, tables, &config.optimal_pattern_dbs)?;
        let report = run_phase(algorithm, &phase, state, config.optimal, config.timeout_retries)?;
        Ok(Solution::from_phases(algorithm, vec![report]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SearchError, TableError};
    use cube_core::{moves::parse_sequence, scramble::random_state};
    use std::{
        sync::LazyLock,
        time::{Duration, Instant},
    };

    const LIGHT_DBS: [PatternDbKind; 3] = [
        PatternDbKind::TwistSlice,
        PatternDbKind::FlipSlice,
        PatternDbKind::CornerPermutation,
    ];

    fn light_config() -> SolveConfig {
        SolveConfig {
            optimal_pattern_dbs: LIGHT_DBS.to_vec(),
            ..SolveConfig::default()
        }
    }

    static TABLES: LazyLock<TableRepository> = LazyLock::new(|| {
        TableRepository::builder()
            .with_algorithm(Algorithm::Optimal(Optimal), &light_config())
            .build()
            .unwrap()
    });

    #[test_log::test]
    fn test_short_scrambles_are_solved_optimally() {
        for (scramble, optimum) in [("R", 1), ("R U", 2), ("F2 D' L", 3), ("R U R' U'", 4)] {
            let state = CubieState::from_moves(&parse_sequence(scramble).unwrap());
            let solution = Optimal.run(&state, &TABLES, &light_config()).unwrap();
            assert_eq!(solution.len(), optimum, "{scramble}");
            assert!(state.apply_sequence(&solution.moves).is_solved());
        }
    }

    #[test]
    fn test_estimate_breakdown() {
        let state = CubieState::from_moves(&parse_sequence("R U R' U'").unwrap());
        let estimate = Optimal::estimate(&state, &TABLES, &light_config()).unwrap();
        assert_eq!(
            estimate.breakdown.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            LIGHT_DBS
        );
        let max = estimate.breakdown.iter().map(|(_, h)| *h).max().unwrap();
        assert_eq!(estimate.lower_bound, max);
        assert!((1..=4).contains(&estimate.lower_bound));
    }

    #[test]
    fn test_estimate_needs_configured_tables() {
        let state = CubieState::from_moves(&parse_sequence("R").unwrap());
        assert!(matches!(
            Optimal::estimate(&state, &TABLES, &SolveConfig::default()),
            Err(SolveError::Tables(TableError::Missing(_)))
        ));
    }

    #[test_log::test]
    fn test_timeouts_double_until_retries_run_out() {
        let mut config = light_config();
        config.optimal.timeout_ms = Some(20);
        config.timeout_retries = 2;
        // A random state is far too deep for these databases to finish.
        let state = random_state(&mut fastrand::Rng::with_seed(21));

        let start = Instant::now();
        let result =
            crate::orchestrator::solve(&state, Algorithm::Optimal(Optimal), &TABLES, &config);
        let Err(SolveError::PhaseFailed {
            algorithm,
            phase,
            source: SearchError::Timeout(last),
        }) = result
        else {
            panic!("expected a timeout, got {result:?}");
        };
        assert_eq!(algorithm, Algorithm::Optimal(Optimal));
        assert_eq!(phase, PhaseKind::Optimal);
        // The last attempt ran with 20ms doubled twice.
        assert!(last >= Duration::from_millis(75), "{last:?}");
        assert!(start.elapsed() >= Duration::from_millis(130));
    }

    #[test_log::test]
    fn test_retry_after_timeout_can_succeed() {
        let mut config = light_config();
        config.optimal.timeout_ms = Some(0);
        config.timeout_retries = 20;
        let state = CubieState::from_moves(&parse_sequence("R U R' U'").unwrap());
        let solution = Optimal.run(&state, &TABLES, &config).unwrap();
        assert_eq!(solution.len(), 4);
        assert!(solution.phases[0].attempts > 1);

        config.timeout_retries = 0;
        assert!(matches!(
            Optimal.run(&state, &TABLES, &config),
            Err(SolveError::PhaseFailed {
                phase: PhaseKind::Optimal,
                source: SearchError::Timeout(_),
                ..
            })
        ));
    }
}
