use super::{Algorithm, Orchestrator, Solution, TwoPhase, run_phase};
use crate::{
    config::SolveConfig,
    error::SolveError,
    phase::{Phase, PhaseKind},
    pruning::PatternDbKind,
    tables::TableRepository,
};
use cube_core::CubieState;
use log::warn;

const PHASES: [PhaseKind; 4] = [
    PhaseKind::OrientEdges,
    PhaseKind::OrientCorners,
    PhaseKind::ReduceToHalfTurns,
    PhaseKind::SolveHalfTurns,
];

/// Thistlethwaite's descent through `G0 > G1 > G2 > G3 > {solved}`, each
/// step searched under the moves of the current group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FourPhase;

impl FourPhase {
    fn run_phases(
        state: &CubieState,
        tables: &TableRepository,
        config: &SolveConfig,
    ) -> Result<Solution, SolveError> {
        let algorithm = Algorithm::FourPhase(FourPhase);
        let mut current = *state;
        let mut reports = Vec::with_capacity(PHASES.len());
        for (kind, limits) in PHASES.into_iter().zip(config.four_phase) {
            let phase = Phase::new(kind, tables)?;
            let report = run_phase(algorithm, &phase, &current, limits, config.timeout_retries)?;
            current = current.apply_sequence(&report.moves);
            reports.push(report);
        }
        Ok(Solution::from_phases(algorithm, reports))
    }
}

impl Orchestrator for FourPhase {
    fn required_phases(&self, config: &SolveConfig) -> Vec<(PhaseKind, Vec<PatternDbKind>)> {
        let mut phases = PHASES
            .iter()
            .map(|kind| (*kind, kind.default_heuristics().to_vec()))
            .collect::<Vec<_>>();
        if config.fallback {
            phases.extend(TwoPhase.required_phases(config));
        }
        phases
    }

    fn run(
        &self,
        state: &CubieState,
        tables: &TableRepository,
        config: &SolveConfig,
    ) -> Result<Solution, SolveError> {
        match Self::run_phases(state, tables, config) {
            Err(SolveError::PhaseFailed { phase, source, .. }) if config.fallback => {
                warn!("Four-phase failed in the {phase} phase ({source}); falling back to two-phase");
                TwoPhase.run(state, tables, config)
            }
            result => result,
        }
    }
}
