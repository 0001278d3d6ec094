//! Reproducible scrambles for tests and benchmarks. Pass a seeded
//! [`fastrand::Rng`] to get the same scrambles on every run.

use crate::{
    cubie::{CORNERS, CubieState, EDGES},
    moves::{Move, MoveSet},
};

/// A random move sequence of `length` moves where no face is turned twice in
/// a row.
#[must_use]
pub fn random_moves(rng: &mut fastrand::Rng, length: usize) -> Vec<Move> {
    random_moves_in(rng, MoveSet::ALL, length)
}

/// Like [`random_moves`], restricted to `moves`.
#[must_use]
pub fn random_moves_in(rng: &mut fastrand::Rng, moves: MoveSet, length: usize) -> Vec<Move> {
    let moves = moves.iter().collect::<Vec<_>>();
    let mut sequence: Vec<Move> = Vec::with_capacity(length);
    for _ in 0..length {
        let last_face = sequence.last().map(|last| last.face());
        let candidates = moves
            .iter()
            .copied()
            .filter(|move_| Some(move_.face()) != last_face)
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            break;
        }
        sequence.push(candidates[rng.usize(..candidates.len())]);
    }
    sequence
}

/// A uniformly random reachable cube state.
#[must_use]
pub fn random_state(rng: &mut fastrand::Rng) -> CubieState {
    let mut state = CubieState::SOLVED;
    rng.shuffle(&mut state.cp);
    rng.shuffle(&mut state.ep);
    if state.corner_parity() != state.edge_parity() {
        state.ep.swap(EDGES - 2, EDGES - 1);
    }

    let mut twist = 0;
    for co in &mut state.co[..CORNERS - 1] {
        *co = rng.u8(..3);
        twist += *co;
    }
    state.co[CORNERS - 1] = (3 - twist % 3) % 3;

    let mut flip = 0;
    for eo in &mut state.eo[..EDGES - 1] {
        *eo = rng.u8(..2);
        flip += *eo;
    }
    state.eo[EDGES - 1] = flip % 2;

    state
}
