//! The search phases the orchestrators chain together. Each phase searches
//! a few coordinates under a restricted move set until all of them are zero.

use crate::{
    canonical_fsm::CanonicalFsm,
    error::TableError,
    move_table::MoveTable,
    pruning::{PatternDatabase, PatternDbKind},
    search::SearchSpace,
    tables::TableRepository,
};
use cube_core::{Coord, CubieState, Move, MoveSet};
use itertools::Itertools;
use std::fmt;

/// The most coordinates any phase tracks.
pub const MAX_COORDS: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// `G0 -> G1`: orient the edges.
    OrientEdges,
    /// `G1 -> G2`: orient the corners and bring the E-slice edges home.
    OrientCorners,
    /// `G2 -> G3`: reach the half-turn group.
    ReduceToHalfTurns,
    /// `G3 -> solved` with half turns only.
    SolveHalfTurns,
    /// Reach the domino group with any move.
    ReduceToDomino,
    /// Solve from the domino group with domino moves.
    SolveDomino,
    /// Solve outright with any move.
    Optimal,
}

impl PhaseKind {
    #[must_use]
    pub const fn coords(self) -> &'static [Coord] {
        use Coord as C;
        match self {
            PhaseKind::OrientEdges => &[C::EdgeFlip],
            PhaseKind::OrientCorners => &[C::CornerTwist, C::SliceCombination],
            PhaseKind::ReduceToHalfTurns => &[C::TetradCoset, C::MiddleStanding],
            PhaseKind::SolveHalfTurns => &[C::CornerPermutation, C::HalfTurnEdges],
            PhaseKind::ReduceToDomino => &[C::CornerTwist, C::EdgeFlip, C::SliceCombination],
            PhaseKind::SolveDomino => &[
                C::CornerPermutation,
                C::UdEdgePermutation,
                C::SlicePermutation,
            ],
            PhaseKind::Optimal => &[
                C::CornerPermutation,
                C::CornerTwist,
                C::EdgeFlip,
                C::SliceSorted,
                C::UEdges,
                C::DEdges,
                C::SliceCombination,
            ],
        }
    }

    #[must_use]
    pub const fn moves(self) -> MoveSet {
        match self {
            PhaseKind::OrientEdges | PhaseKind::ReduceToDomino | PhaseKind::Optimal => {
                MoveSet::ALL
            }
            PhaseKind::OrientCorners => MoveSet::G1,
            PhaseKind::ReduceToHalfTurns | PhaseKind::SolveDomino => MoveSet::G2,
            PhaseKind::SolveHalfTurns => MoveSet::G3,
        }
    }

    /// The pattern databases the phase uses unless told otherwise.
    #[must_use]
    pub const fn default_heuristics(self) -> &'static [PatternDbKind] {
        use PatternDbKind as P;
        match self {
            PhaseKind::OrientEdges => &[P::EdgeFlip],
            PhaseKind::OrientCorners => &[P::G1TwistSlice],
            PhaseKind::ReduceToHalfTurns => &[P::G2CosetMiddle],
            PhaseKind::SolveHalfTurns => &[P::G3Corners, P::G3Edges],
            PhaseKind::ReduceToDomino => &[P::TwistSlice, P::FlipSlice],
            PhaseKind::SolveDomino => &[P::DominoCorners, P::DominoEdges, P::DominoSlice],
            PhaseKind::Optimal => &[
                P::Corners,
                P::UEdgesFlip,
                P::DEdgesFlip,
                P::SliceEdgesFlip,
                P::TwistSlice,
                P::FlipSlice,
            ],
        }
    }

    #[must_use]
    pub const fn default_max_depth(self) -> u8 {
        match self {
            PhaseKind::OrientEdges => 7,
            PhaseKind::OrientCorners => 10,
            PhaseKind::ReduceToHalfTurns => 13,
            PhaseKind::SolveHalfTurns => 15,
            PhaseKind::ReduceToDomino => 12,
            PhaseKind::SolveDomino => 18,
            PhaseKind::Optimal => 20,
        }
    }

    /// Whether `db` estimates distances for this phase without ever
    /// overestimating: it must read only this phase's coordinates, and its
    /// distances must be measured with at least this phase's moves.
    #[must_use]
    pub fn admits(self, db: PatternDbKind) -> bool {
        let spec = db.spec();
        spec.coords().all(|coord| self.coords().contains(&coord))
            && self.moves().is_subset_of(spec.moves)
    }
}

const _: () = {
    let kinds = [
        PhaseKind::OrientEdges,
        PhaseKind::OrientCorners,
        PhaseKind::ReduceToHalfTurns,
        PhaseKind::SolveHalfTurns,
        PhaseKind::ReduceToDomino,
        PhaseKind::SolveDomino,
        PhaseKind::Optimal,
    ];
    let mut i = 0;
    while i < kinds.len() {
        let coords = kinds[i].coords();
        assert!(coords.len() <= MAX_COORDS);
        let mut j = 0;
        while j < coords.len() {
            assert!(kinds[i].moves().is_subset_of(coords[j].natural_moves()));
            j += 1;
        }
        i += 1;
    }
};

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhaseKind::OrientEdges => "edge orientation",
            PhaseKind::OrientCorners => "corner orientation",
            PhaseKind::ReduceToHalfTurns => "half-turn reduction",
            PhaseKind::SolveHalfTurns => "half-turn solve",
            PhaseKind::ReduceToDomino => "domino reduction",
            PhaseKind::SolveDomino => "domino solve",
            PhaseKind::Optimal => "optimal",
        })
    }
}

/// A phase's coordinates, in the order of [`PhaseKind::coords`]. Unused
/// slots stay zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PhaseNode([u32; MAX_COORDS]);

#[derive(Debug)]
struct Heuristic<'a> {
    db: &'a PatternDatabase,
    primary: usize,
    secondary: Option<usize>,
}

impl Heuristic<'_> {
    #[inline]
    fn estimate(&self, node: &PhaseNode) -> u8 {
        match self.secondary {
            Some(secondary) => self.db.lookup_pair(node.0[self.primary], node.0[secondary]),
            None => self.db.lookup(node.0[self.primary]),
        }
    }
}

/// A phase bound to the tables it reads.
#[derive(Debug)]
pub struct Phase<'a> {
    kind: PhaseKind,
    moves: Vec<Move>,
    move_tables: Vec<&'a MoveTable>,
    heuristics: Vec<Heuristic<'a>>,
    fsm: CanonicalFsm,
}

impl<'a> Phase<'a> {
    /// Binds the phase to its default pattern databases.
    ///
    /// # Errors
    ///
    /// See [`Phase::with_heuristics`].
    pub fn new(kind: PhaseKind, tables: &'a TableRepository) -> Result<Self, TableError> {
        Self::with_heuristics(kind, tables, kind.default_heuristics())
    }

    /// # Errors
    ///
    /// Fails with [`TableError::Incompatible`] when a database cannot bound
    /// this phase, and with [`TableError::Missing`] when `tables` lacks a
    /// table the phase needs.
    pub fn with_heuristics(
        kind: PhaseKind,
        tables: &'a TableRepository,
        heuristics: &[PatternDbKind],
    ) -> Result<Self, TableError> {
        if let Some(&db_kind) = heuristics.iter().find(|&&db_kind| !kind.admits(db_kind)) {
            return Err(TableError::Incompatible {
                table: db_kind.name().to_owned(),
                phase: kind,
            });
        }

        let coords = kind.coords();
        let move_tables = coords
            .iter()
            .map(|&coord| tables.move_table(coord))
            .collect::<Result<Vec<_>, _>>()?;
        // Admission guarantees every database coordinate has a slot.
        let slot = |coord: Coord| coords.iter().position(|&c| c == coord).unwrap_or(0);

        let heuristics = heuristics
            .iter()
            .map(|&db_kind| {
                let spec = db_kind.spec();
                Ok(Heuristic {
                    db: tables.pattern_db(db_kind)?,
                    primary: slot(spec.primary),
                    secondary: spec.secondary.map(slot),
                })
            })
            .collect::<Result<Vec<_>, TableError>>()?;

        Ok(Self {
            kind,
            moves: kind.moves().iter().collect(),
            move_tables,
            heuristics,
            fsm: CanonicalFsm::faces(),
        })
    }

    #[must_use]
    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    #[must_use]
    pub fn node(&self, state: &CubieState) -> PhaseNode {
        let mut node = PhaseNode::default();
        for (value, coord) in node.0.iter_mut().zip(self.kind.coords()) {
            *value = coord.encode(state);
        }
        node
    }

    /// Each database's estimate for `node`, in the order they were given.
    #[must_use]
    pub fn estimates(&self, node: &PhaseNode) -> Vec<(PatternDbKind, u8)> {
        self.heuristics
            .iter()
            .map(|heuristic| (heuristic.db.kind(), heuristic.estimate(node)))
            .collect()
    }

    /// The node as `name=value` pairs, for logs.
    #[must_use]
    pub fn describe(&self, node: &PhaseNode) -> String {
        self.kind
            .coords()
            .iter()
            .zip(node.0)
            .map(|(coord, value)| format!("{}={value}", coord.name()))
            .join(" ")
    }
}

impl SearchSpace for Phase<'_> {
    type Node = PhaseNode;

    fn moves(&self) -> &[Move] {
        &self.moves
    }

    #[inline]
    fn apply(&self, node: &PhaseNode, move_: Move) -> PhaseNode {
        let mut next = PhaseNode::default();
        for ((next, &value), table) in next.0.iter_mut().zip(&node.0).zip(&self.move_tables) {
            *next = table.apply(value, move_);
        }
        next
    }

    #[inline]
    fn heuristic(&self, node: &PhaseNode) -> u8 {
        self.heuristics
            .iter()
            .map(|heuristic| heuristic.estimate(node))
            .max()
            .unwrap_or(0)
    }

    #[inline]
    fn is_goal(&self, node: &PhaseNode) -> bool {
        node.0.iter().all(|&value| value == 0)
    }

    fn canonical_fsm(&self) -> &CanonicalFsm {
        &self.fsm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_heuristics_are_admitted() {
        for kind in [
            PhaseKind::OrientEdges,
            PhaseKind::OrientCorners,
            PhaseKind::ReduceToHalfTurns,
            PhaseKind::SolveHalfTurns,
            PhaseKind::ReduceToDomino,
            PhaseKind::SolveDomino,
            PhaseKind::Optimal,
        ] {
            for &db in kind.default_heuristics() {
                assert!(kind.admits(db), "{db} for {kind}");
            }
        }
    }

    #[test]
    fn test_admission_rules() {
        // Distances measured under fewer moves may overestimate.
        assert!(!PhaseKind::ReduceToDomino.admits(PatternDbKind::G1TwistSlice));
        // Distances measured under more moves never do.
        assert!(PhaseKind::OrientCorners.admits(PatternDbKind::TwistSlice));
        // The phase does not track edge flip.
        assert!(!PhaseKind::OrientCorners.admits(PatternDbKind::FlipSlice));
        assert!(PhaseKind::Optimal.admits(PatternDbKind::TwistFlip));
        assert!(PhaseKind::Optimal.admits(PatternDbKind::CornerPermutation));
        assert!(!PhaseKind::Optimal.admits(PatternDbKind::DominoEdges));
    }

    #[test]
    fn test_incompatible_heuristic_is_rejected() {
        let tables = TableRepository::builder()
            .with_pattern_db(PatternDbKind::FlipSlice)
            .build()
            .unwrap();
        assert!(matches!(
            Phase::with_heuristics(
                PhaseKind::OrientCorners,
                &tables,
                &[PatternDbKind::FlipSlice]
            ),
            Err(TableError::Incompatible { .. })
        ));
    }

    #[test]
    fn test_missing_table_is_reported() {
        let tables = TableRepository::builder()
            .with_pattern_db(PatternDbKind::EdgeFlip)
            .build()
            .unwrap();
        assert!(matches!(
            Phase::new(PhaseKind::OrientCorners, &tables),
            Err(TableError::Missing(_))
        ));
    }

    #[test]
    fn test_phase_tracks_cubie_moves() {
        let tables = TableRepository::builder()
            .with_pattern_db(PatternDbKind::EdgeFlip)
            .build()
            .unwrap();
        let phase = Phase::new(PhaseKind::OrientEdges, &tables).unwrap();
        let mut state = CubieState::SOLVED;
        let mut node = phase.node(&state);
        assert!(phase.is_goal(&node));
        for move_ in [Move::F, Move::R, Move::B_PRIME] {
            state = state.apply(move_);
            node = phase.apply(&node, move_);
            assert_eq!(node, phase.node(&state));
        }
        assert!(!phase.is_goal(&node));
        assert!((1..=3).contains(&phase.heuristic(&node)));
        assert_eq!(phase.describe(&phase.node(&CubieState::SOLVED)), "edge_flip=0");
    }
}
