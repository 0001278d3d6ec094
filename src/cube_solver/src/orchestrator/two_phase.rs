use super::{Algorithm, Orchestrator, PhaseReport, Solution, retry_timeout, run_phase};
use crate::{
    config::SolveConfig,
    error::{SearchError, SolveError},
    phase::{Phase, PhaseKind},
    pruning::PatternDbKind,
    search::{IdaSearch, SearchLimits},
    tables::TableRepository,
};
use cube_core::{CubieState, Move};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

const PHASES: [PhaseKind; 2] = [PhaseKind::ReduceToDomino, PhaseKind::SolveDomino];

/// Kociemba's algorithm: reach the domino group `<U, D, L2, R2, F2, B2>`
/// with any move, then solve inside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TwoPhase;

/// The shortest combination found so far while enumerating.
struct Best {
    first: Vec<Move>,
    second: Vec<Move>,
}

impl Best {
    fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }
}

impl TwoPhase {
    /// Takes phase-one solutions in order of length and completes each with
    /// a phase-two search bounded by the best total so far, until a total of
    /// at most `target` turns up or phase one runs out of depth or time.
    fn run_with_target(
        state: &CubieState,
        first: &Phase,
        second: &Phase,
        config: &SolveConfig,
        target: u8,
    ) -> Result<Solution, SolveError> {
        let algorithm = Algorithm::TwoPhase(TwoPhase);
        let [first_limits, second_limits] = config.two_phase;
        let mut first_timeout = first_limits.timeout();
        let mut second_timeout = second_limits.timeout();
        let mut attempt = 0;
        loop {
            let mut best: Option<Best> = None;
            let mut second_failure = None;
            let mut second_nodes = 0;
            let mut second_elapsed = Duration::ZERO;

            let limits = SearchLimits::new(first_limits.max_depth, first_timeout);
            let deadline = limits.deadline;
            let mut search = IdaSearch::new(first, limits);
            let result = search.solve_with(first.node(state), |path, _| {
                let best_len = best.as_ref().map_or(usize::MAX, Best::len);
                // Later phase-one solutions are no shorter than this one.
                if path.len() >= best_len {
                    return true;
                }
                let budget = u8::try_from(best_len - 1 - path.len())
                    .unwrap_or(u8::MAX)
                    .min(second_limits.max_depth);
                // A completion never outlives the enumeration's deadline.
                let left =
                    deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
                let timeout = match (second_timeout, left) {
                    (Some(timeout), Some(left)) => Some(timeout.min(left)),
                    (timeout, left) => timeout.or(left),
                };

                let middle = state.apply_sequence(path);
                let mut completion = IdaSearch::new(second, SearchLimits::new(budget, timeout));
                let completed = completion.solve(second.node(&middle));
                second_nodes += completion.stats().nodes;
                second_elapsed += completion.stats().elapsed;
                match completed {
                    Ok(moves) => {
                        let found = Best {
                            first: path.to_vec(),
                            second: moves,
                        };
                        debug!(
                            "Phase one of {} moves completes to {} moves",
                            found.first.len(),
                            found.len()
                        );
                        let done = found.len() <= usize::from(target);
                        best = Some(found);
                        done
                    }
                    Err(SearchError::Exhausted(_)) => false,
                    Err(err @ SearchError::Timeout(_)) => {
                        second_failure = Some(err);
                        true
                    }
                }
            });
            let first_stats = search.stats();

            if let Some(best) = best {
                if let Err(err) = result {
                    info!(
                        "Stopped enumerating at {} moves ({err}); keeping the best found",
                        best.len()
                    );
                }
                return Ok(Solution::from_phases(
                    algorithm,
                    vec![
                        PhaseReport {
                            phase: first.kind(),
                            moves: best.first,
                            nodes: first_stats.nodes,
                            elapsed: first_stats.elapsed,
                            attempts: attempt + 1,
                        },
                        PhaseReport {
                            phase: second.kind(),
                            moves: best.second,
                            nodes: second_nodes,
                            elapsed: second_elapsed,
                            attempts: attempt + 1,
                        },
                    ],
                ));
            }

            let (phase, source) = match (second_failure, result) {
                (Some(err), _) => (second.kind(), err),
                (None, Err(err)) => (first.kind(), err),
                (None, Ok(_)) => (first.kind(), SearchError::Exhausted(first_limits.max_depth)),
            };
            if matches!(source, SearchError::Timeout(_)) && attempt < config.timeout_retries {
                attempt += 1;
                first_timeout = retry_timeout(first_timeout);
                second_timeout = retry_timeout(second_timeout);
                warn!("Two-phase found nothing in time; retrying with {first_timeout:?}");
                continue;
            }
            return Err(SolveError::PhaseFailed {
                algorithm,
                phase,
                source,
            });
        }
    }
}

impl Orchestrator for TwoPhase {
    fn required_phases(&self, _: &SolveConfig) -> Vec<(PhaseKind, Vec<PatternDbKind>)> {
        PHASES
            .iter()
            .map(|kind| (*kind, kind.default_heuristics().to_vec()))
            .collect()
    }

    fn run(
        &self,
        state: &CubieState,
        tables: &TableRepository,
        config: &SolveConfig,
    ) -> Result<Solution, SolveError> {
        let first = Phase::new(PhaseKind::ReduceToDomino, tables)?;
        let second = Phase::new(PhaseKind::SolveDomino, tables)?;
        if let Some(target) = config.two_phase_target_length {
            return Self::run_with_target(state, &first, &second, config, target);
        }

        let algorithm = Algorithm::TwoPhase(TwoPhase);
        let start = Instant::now();
        let [first_limits, second_limits] = config.two_phase;
        let reduce = run_phase(algorithm, &first, state, first_limits, config.timeout_retries)?;
        let middle = state.apply_sequence(&reduce.moves);
        let finish = run_phase(algorithm, &second, &middle, second_limits, config.timeout_retries)?;
        debug!("Two-phase took {:.3}s", start.elapsed().as_secs_f64());
        Ok(Solution::from_phases(algorithm, vec![reduce, finish]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::{moves::parse_sequence, scramble::random_moves};
    use std::sync::LazyLock;

    static TABLES: LazyLock<TableRepository> = LazyLock::new(|| {
        TableRepository::builder()
            .with_algorithm(Algorithm::TwoPhase(TwoPhase), &SolveConfig::default())
            .build()
            .unwrap()
    });

    #[test_log::test]
    fn test_first_phase_reaches_domino() {
        let mut rng = fastrand::Rng::with_seed(11);
        let config = SolveConfig::default();
        for _ in 0..5 {
            let state = CubieState::from_moves(&random_moves(&mut rng, 25));
            let solution = TwoPhase.run(&state, &TABLES, &config).unwrap();
            let [first, second] = &solution.phases[..] else {
                panic!("expected two phases");
            };
            let middle = state.apply_sequence(&first.moves);
            assert!(PhaseKind::ReduceToDomino.coords().iter().all(|c| c.encode(&middle) == 0));
            assert!(second.moves.iter().all(|&m| PhaseKind::SolveDomino.moves().contains(m)));
            assert!(middle.apply_sequence(&second.moves).is_solved());
        }
    }

    #[test_log::test]
    fn test_target_length_shortens_solutions() {
        let mut rng = fastrand::Rng::with_seed(12);
        let scramble = random_moves(&mut rng, 25);
        let state = CubieState::from_moves(&scramble);

        let mut config = SolveConfig::default();
        let first = TwoPhase.run(&state, &TABLES, &config).unwrap();

        config.two_phase_target_length = Some(21);
        config.two_phase[0].timeout_ms = Some(3000);
        config.timeout_retries = 0;
        let targeted = TwoPhase.run(&state, &TABLES, &config).unwrap();
        assert!(targeted.len() <= first.len());
        assert!(state.apply_sequence(&targeted.moves).is_solved());
    }

    #[test_log::test]
    fn test_unreachable_target_returns_best() {
        // Nothing is shorter than four moves, so every phase-one solution
        // is tried and the best is kept.
        let state = CubieState::from_moves(&parse_sequence("R U R' U'").unwrap());
        let mut config = SolveConfig::default();
        config.two_phase_target_length = Some(1);
        config.two_phase[0].max_depth = 6;
        let solution = TwoPhase.run(&state, &TABLES, &config).unwrap();
        assert!(state.apply_sequence(&solution.moves).is_solved());
        assert!(solution.len() <= 19);
    }

    #[test_log::test]
    fn test_target_mode_retries_when_nothing_was_found() {
        let state = CubieState::from_moves(&random_moves(&mut fastrand::Rng::with_seed(13), 25));
        let mut config = SolveConfig::default();
        config.two_phase_target_length = Some(22);
        config.two_phase[0].timeout_ms = Some(0);
        config.timeout_retries = 20;
        let solution = TwoPhase.run(&state, &TABLES, &config).unwrap();
        assert!(state.apply_sequence(&solution.moves).is_solved());
        assert!(solution.phases.iter().all(|report| report.attempts > 1));

        config.timeout_retries = 0;
        assert!(matches!(
            TwoPhase.run(&state, &TABLES, &config),
            Err(SolveError::PhaseFailed {
                phase: PhaseKind::ReduceToDomino,
                source: SearchError::Timeout(_),
                ..
            })
        ));
    }

    #[test_log::test]
    fn test_completions_share_the_enumeration_deadline() {
        let state = CubieState::from_moves(&random_moves(&mut fastrand::Rng::with_seed(14), 25));
        let mut config = SolveConfig::default();
        // Never reached, so enumeration only ends at the deadline.
        config.two_phase_target_length = Some(1);
        config.two_phase[0].max_depth = 20;
        config.two_phase[0].timeout_ms = Some(300);
        config.two_phase[1].timeout_ms = Some(60_000);
        config.timeout_retries = 0;

        let start = Instant::now();
        let solution = TwoPhase.run(&state, &TABLES, &config).unwrap();
        assert!(start.elapsed() < Duration::from_millis(300 + 2000));
        assert!(state.apply_sequence(&solution.moves).is_solved());
    }
}
