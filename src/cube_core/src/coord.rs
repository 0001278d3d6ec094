//! Coordinates: dense integer encodings of one structural feature of a
//! [`CubieState`]. Every coordinate encodes the solved cube as zero.
//!
//! Encoding is used on every search root, decoding only while building move
//! tables, where any representative state carrying the feature will do.

use crate::{
    BINOMIAL, FACT,
    cubie::{CORNERS, CubieState, EDGES},
    moves::MoveSet,
};
use std::sync::LazyLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Coord {
    /// Twist of the first seven corners; the eighth follows from the rest.
    CornerTwist,
    /// Flip of the first eleven edges.
    EdgeFlip,
    /// Which four slots hold the E-slice edges, ignoring their order.
    SliceCombination,
    /// Slots and order of the E-slice edges.
    SliceSorted,
    /// Slots and order of the U-layer edges.
    UEdges,
    /// Slots and order of the D-layer edges.
    DEdges,
    CornerPermutation,
    /// Right coset of the corner permutation modulo the 96 corner
    /// permutations reachable with half turns.
    TetradCoset,
    /// Which of the eight U/D edge slots hold the M-slice edges. Only
    /// meaningful while the E-slice edges stay in the E slice.
    MiddleStanding,
    /// Permutation of the eight U/D edges. Only meaningful in the domino
    /// group.
    UdEdgePermutation,
    /// Permutation of the E-slice edges inside the E slice.
    SlicePermutation,
    /// Order of the edges within each of the M, S and E slices. Only
    /// meaningful in the half-turn group.
    HalfTurnEdges,
}

/// Four edges tracked as a partial permutation. `order` lists every edge
/// slot, with the home slots of `pieces` first so the solved cube ranks 0.
struct EdgeGroup {
    pieces: [u8; 4],
    order: [usize; EDGES],
}

const SLICE_GROUP: EdgeGroup = EdgeGroup {
    pieces: [8, 9, 10, 11],
    order: [8, 9, 10, 11, 0, 1, 2, 3, 4, 5, 6, 7],
};

const U_GROUP: EdgeGroup = EdgeGroup {
    pieces: [0, 1, 2, 3],
    order: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
};

const D_GROUP: EdgeGroup = EdgeGroup {
    pieces: [4, 5, 6, 7],
    order: [4, 5, 6, 7, 0, 1, 2, 3, 8, 9, 10, 11],
};

// UF, UB, DF, DB
const M_SLOTS: [usize; 4] = [1, 3, 5, 7];
// UR, UL, DR, DL
const S_SLOTS: [usize; 4] = [0, 2, 4, 6];
// FR, FL, BL, BR
const E_SLOTS: [usize; 4] = [8, 9, 10, 11];
const MIDDLE_ORDER: [usize; 8] = [1, 3, 5, 7, 0, 2, 4, 6];

impl Coord {
    pub const ALL: [Coord; 12] = [
        Coord::CornerTwist,
        Coord::EdgeFlip,
        Coord::SliceCombination,
        Coord::SliceSorted,
        Coord::UEdges,
        Coord::DEdges,
        Coord::CornerPermutation,
        Coord::TetradCoset,
        Coord::MiddleStanding,
        Coord::UdEdgePermutation,
        Coord::SlicePermutation,
        Coord::HalfTurnEdges,
    ];

    #[must_use]
    pub const fn size(self) -> u32 {
        match self {
            Coord::CornerTwist => 2187,
            Coord::EdgeFlip => 2048,
            Coord::SliceCombination => 495,
            Coord::SliceSorted | Coord::UEdges | Coord::DEdges => 11880,
            Coord::CornerPermutation | Coord::UdEdgePermutation => 40320,
            Coord::TetradCoset => 420,
            Coord::MiddleStanding => 70,
            Coord::SlicePermutation => 24,
            Coord::HalfTurnEdges => 13824,
        }
    }

    /// The largest move set under which the coordinate of a moved state is a
    /// function of the coordinate alone.
    #[must_use]
    pub const fn natural_moves(self) -> MoveSet {
        match self {
            Coord::MiddleStanding | Coord::UdEdgePermutation | Coord::SlicePermutation => {
                MoveSet::G2
            }
            Coord::HalfTurnEdges => MoveSet::G3,
            _ => MoveSet::ALL,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Coord::CornerTwist => "corner_twist",
            Coord::EdgeFlip => "edge_flip",
            Coord::SliceCombination => "slice_combination",
            Coord::SliceSorted => "slice_sorted",
            Coord::UEdges => "u_edges",
            Coord::DEdges => "d_edges",
            Coord::CornerPermutation => "corner_permutation",
            Coord::TetradCoset => "tetrad_coset",
            Coord::MiddleStanding => "middle_standing",
            Coord::UdEdgePermutation => "ud_edge_permutation",
            Coord::SlicePermutation => "slice_permutation",
            Coord::HalfTurnEdges => "half_turn_edges",
        }
    }

    #[must_use]
    pub fn encode(self, state: &CubieState) -> u32 {
        match self {
            Coord::CornerTwist => encode_orientation(&state.co, 3),
            Coord::EdgeFlip => encode_orientation(&state.eo, 2),
            Coord::SliceCombination => {
                rank_subset(&SLICE_GROUP.order, |slot| state.ep[slot] >= 8)
            }
            Coord::SliceSorted => encode_edge_group(state, &SLICE_GROUP),
            Coord::UEdges => encode_edge_group(state, &U_GROUP),
            Coord::DEdges => encode_edge_group(state, &D_GROUP),
            Coord::CornerPermutation => rank_permutation(&state.cp),
            Coord::TetradCoset => {
                u32::from(CORNER_COSETS.class_of[rank_permutation(&state.cp) as usize])
            }
            Coord::MiddleStanding => {
                rank_subset(&MIDDLE_ORDER, |slot| M_SLOTS.contains(&usize::from(state.ep[slot])))
            }
            Coord::UdEdgePermutation => rank_permutation(&state.ep[..8]),
            Coord::SlicePermutation => rank_permutation(&state.ep[8..]),
            Coord::HalfTurnEdges => [M_SLOTS, S_SLOTS, E_SLOTS].iter().fold(0, |acc, slots| {
                acc * 24 + rank_permutation(&slots.map(|slot| state.ep[slot]))
            }),
        }
    }

    /// A representative state whose coordinate is `value`. Every feature the
    /// coordinate does not describe is left solved.
    #[must_use]
    pub fn decode(self, value: u32) -> CubieState {
        debug_assert!(value < self.size());
        let mut state = CubieState::SOLVED;
        match self {
            Coord::CornerTwist => state.co = decode_orientation(value, 3),
            Coord::EdgeFlip => state.eo = decode_orientation(value, 2),
            Coord::SliceCombination => {
                let occupied = unrank_subset(&SLICE_GROUP.order, 4, value);
                place_edges(&mut state, occupied, &SLICE_GROUP.pieces, &[0, 1, 2, 3, 4, 5, 6, 7]);
            }
            Coord::SliceSorted => decode_edge_group(&mut state, &SLICE_GROUP, value),
            Coord::UEdges => decode_edge_group(&mut state, &U_GROUP, value),
            Coord::DEdges => decode_edge_group(&mut state, &D_GROUP, value),
            Coord::CornerPermutation => state.cp = unrank_permutation(value),
            Coord::TetradCoset => {
                state.cp = unrank_permutation(u32::from(
                    CORNER_COSETS.representatives[value as usize],
                ));
            }
            Coord::MiddleStanding => {
                let occupied = unrank_subset(&MIDDLE_ORDER, 4, value);
                let mut m = M_SLOTS.iter();
                let mut s = S_SLOTS.iter();
                for slot in 0..8 {
                    let piece = if occupied & (1 << slot) != 0 { m.next() } else { s.next() };
                    if let Some(&piece) = piece {
                        state.ep[slot] = piece as u8;
                    }
                }
            }
            Coord::UdEdgePermutation => {
                let perm: [u8; 8] = unrank_permutation(value);
                state.ep[..8].copy_from_slice(&perm);
            }
            Coord::SlicePermutation => {
                let perm: [u8; 4] = unrank_permutation(value);
                for (slot, piece) in state.ep[8..].iter_mut().zip(perm) {
                    *slot = piece + 8;
                }
            }
            Coord::HalfTurnEdges => {
                let ranks = [value / 576, value / 24 % 24, value % 24];
                for (slots, rank) in [M_SLOTS, S_SLOTS, E_SLOTS].into_iter().zip(ranks) {
                    let perm: [u8; 4] = unrank_permutation(rank);
                    for (&slot, index) in slots.iter().zip(perm) {
                        state.ep[slot] = slots[usize::from(index)] as u8;
                    }
                }
            }
        }
        state
    }
}

/// Base-`modulus` digits of all but the last orientation, which is implied by
/// the orientation sum.
fn encode_orientation(orientation: &[u8], modulus: u8) -> u32 {
    orientation[..orientation.len() - 1]
        .iter()
        .fold(0, |acc, &o| acc * u32::from(modulus) + u32::from(o))
}

fn decode_orientation<const N: usize>(mut value: u32, modulus: u8) -> [u8; N] {
    let mut orientation = [0; N];
    let mut sum = 0;
    for o in orientation[..N - 1].iter_mut().rev() {
        *o = (value % u32::from(modulus)) as u8;
        value /= u32::from(modulus);
        sum += *o;
    }
    orientation[N - 1] = (modulus - sum % modulus) % modulus;
    orientation
}

/// Lexicographic rank of the relative order of `perm`'s distinct values.
pub(crate) fn rank_permutation(perm: &[u8]) -> u32 {
    let n = perm.len();
    let mut rank = 0;
    for (i, &a) in perm.iter().enumerate() {
        let smaller_after = perm[i + 1..].iter().filter(|&&b| b < a).count() as u32;
        rank += smaller_after * FACT[n - 1 - i];
    }
    rank
}

pub(crate) fn unrank_permutation<const N: usize>(mut rank: u32) -> [u8; N] {
    let mut remaining: [u8; N] = std::array::from_fn(|i| i as u8);
    let mut len = N;
    let mut perm = [0; N];
    for (i, out) in perm.iter_mut().enumerate() {
        let place = FACT[N - 1 - i];
        let digit = (rank / place) as usize;
        rank %= place;
        *out = remaining[digit];
        remaining.copy_within(digit + 1..len, digit);
        len -= 1;
    }
    perm
}

/// Combinatorial-number-system rank of the slots in `order` for which
/// `is_member` holds.
fn rank_subset(order: &[usize], is_member: impl Fn(usize) -> bool) -> u32 {
    let mut rank = 0;
    let mut found = 0;
    for (i, &slot) in order.iter().enumerate() {
        if is_member(slot) {
            found += 1;
            rank += BINOMIAL[i][found];
        }
    }
    rank
}

/// Bitmask of the `k` slots ranked `rank` by [`rank_subset`].
fn unrank_subset(order: &[usize], mut k: usize, mut rank: u32) -> u16 {
    let mut occupied = 0;
    for i in (0..order.len()).rev() {
        if k == 0 {
            break;
        }
        let c = BINOMIAL[i][k];
        if rank >= c {
            occupied |= 1 << order[i];
            rank -= c;
            k -= 1;
        }
    }
    occupied
}

fn place_edges(state: &mut CubieState, occupied: u16, members: &[u8], others: &[u8]) {
    let mut members = members.iter();
    let mut others = others.iter();
    for (slot, piece) in state.ep.iter_mut().enumerate() {
        let next = if occupied & (1 << slot) != 0 {
            members.next()
        } else {
            others.next()
        };
        if let Some(&next) = next {
            *piece = next;
        }
    }
}

fn encode_edge_group(state: &CubieState, group: &EdgeGroup) -> u32 {
    let is_member = |slot: usize| group.pieces.contains(&state.ep[slot]);
    let combination = rank_subset(&group.order, is_member);
    let mut members = [0; 4];
    for (member, &piece) in members
        .iter_mut()
        .zip(state.ep.iter().filter(|&&piece| group.pieces.contains(&piece)))
    {
        *member = piece;
    }
    combination * 24 + rank_permutation(&members)
}

fn decode_edge_group(state: &mut CubieState, group: &EdgeGroup, value: u32) {
    let occupied = unrank_subset(&group.order, 4, value / 24);
    let perm: [u8; 4] = unrank_permutation(value % 24);
    let members = perm.map(|i| group.pieces[usize::from(i)]);
    let mut others = [0; 8];
    for (other, piece) in others
        .iter_mut()
        .zip((0..EDGES as u8).filter(|piece| !group.pieces.contains(piece)))
    {
        *other = piece;
    }
    place_edges(state, occupied, &members, &others);
}

struct CornerCosets {
    class_of: Vec<u16>,
    representatives: Vec<u16>,
}

static CORNER_COSETS: LazyLock<CornerCosets> = LazyLock::new(CornerCosets::generate);

fn compose(a: &[u8; CORNERS], b: &[u8; CORNERS]) -> [u8; CORNERS] {
    b.map(|i| a[usize::from(i)])
}

impl CornerCosets {
    fn generate() -> Self {
        let generators = MoveSet::G3.iter().map(|move_| move_.cubie().cp).collect::<Vec<_>>();
        let permutations = Coord::CornerPermutation.size() as usize;

        let mut seen = vec![false; permutations];
        seen[0] = true;
        let mut half_turn_group = vec![CubieState::SOLVED.cp];
        let mut i = 0;
        while i < half_turn_group.len() {
            let element = half_turn_group[i];
            for generator in &generators {
                let next = compose(&element, generator);
                let rank = rank_permutation(&next) as usize;
                if !seen[rank] {
                    seen[rank] = true;
                    half_turn_group.push(next);
                }
            }
            i += 1;
        }
        debug_assert_eq!(half_turn_group.len(), 96);

        let mut class_of = vec![u16::MAX; permutations];
        let mut representatives = Vec::with_capacity(420);
        for rank in 0..permutations {
            if class_of[rank] != u16::MAX {
                continue;
            }
            let representative: [u8; CORNERS] = unrank_permutation(rank as u32);
            let class = representatives.len() as u16;
            for element in &half_turn_group {
                class_of[rank_permutation(&compose(element, &representative)) as usize] = class;
            }
            representatives.push(rank as u16);
        }
        debug_assert_eq!(representatives.len(), 420);

        Self {
            class_of,
            representatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        moves::{Move, parse_sequence},
        scramble::random_state,
    };

    fn random_state_in(rng: &mut fastrand::Rng, moves: MoveSet) -> CubieState {
        let moves = moves.iter().collect::<Vec<_>>();
        (0..40).fold(CubieState::SOLVED, |state, _| {
            state.apply(moves[rng.usize(..moves.len())])
        })
    }

    #[test]
    fn test_solved_encodes_to_zero() {
        for coord in Coord::ALL {
            assert_eq!(coord.encode(&CubieState::SOLVED), 0, "{coord:?}");
        }
    }

    #[test]
    fn test_decode_then_encode_round_trips() {
        for coord in Coord::ALL {
            for value in 0..coord.size() {
                assert_eq!(coord.encode(&coord.decode(value)), value, "{coord:?}");
            }
        }
    }

    #[test]
    fn test_encode_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(99);
        for _ in 0..500 {
            let state = random_state(&mut rng);
            for coord in Coord::ALL {
                assert!(coord.encode(&state) < coord.size(), "{coord:?}");
            }
        }
    }

    #[test]
    fn test_decode_preserves_feature() {
        let mut rng = fastrand::Rng::with_seed(1);
        for coord in Coord::ALL {
            for _ in 0..200 {
                let state = random_state_in(&mut rng, coord.natural_moves());
                let value = coord.encode(&state);
                assert_eq!(coord.encode(&coord.decode(value)), value, "{coord:?}");
            }
        }
    }

    #[test]
    fn test_moves_act_on_coordinates() {
        // The coordinate of a moved state must not depend on which
        // representative was moved.
        let mut rng = fastrand::Rng::with_seed(2);
        for coord in Coord::ALL {
            for _ in 0..100 {
                let state = random_state_in(&mut rng, coord.natural_moves());
                let representative = coord.decode(coord.encode(&state));
                for move_ in coord.natural_moves().iter() {
                    assert_eq!(
                        coord.encode(&state.apply(move_)),
                        coord.encode(&representative.apply(move_)),
                        "{coord:?} {move_}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_known_values() {
        let state = CubieState::from_moves(&[Move::U]);
        assert_eq!(Coord::CornerTwist.encode(&state), 0);
        assert_eq!(Coord::SliceCombination.encode(&state), 0);
        assert_ne!(Coord::UEdges.encode(&state), 0);

        let state = CubieState::from_moves(&[Move::F]);
        assert_ne!(Coord::EdgeFlip.encode(&state), 0);
        assert_ne!(Coord::SliceCombination.encode(&state), 0);

        let state = CubieState::from_moves(&[Move::R]);
        assert_eq!(Coord::EdgeFlip.encode(&state), 0);
        assert_ne!(Coord::CornerTwist.encode(&state), 0);
    }

    #[test]
    fn test_half_turn_group_is_goal_of_coset_coordinates() {
        let mut rng = fastrand::Rng::with_seed(4);
        for _ in 0..200 {
            let state = random_state_in(&mut rng, MoveSet::G3);
            assert_eq!(Coord::TetradCoset.encode(&state), 0);
            assert_eq!(Coord::MiddleStanding.encode(&state), 0);
        }
        // A quarter turn is an odd corner permutation, so it cannot lie in
        // the half-turn group.
        let state = CubieState::from_moves(&[Move::R]);
        assert_ne!(Coord::TetradCoset.encode(&state), 0);
        let state = CubieState::from_moves(&parse_sequence("R U R' U'").unwrap());
        assert_ne!(Coord::MiddleStanding.encode(&state), 0);
    }

    #[test]
    fn test_coset_is_invariant_under_half_turns_on_the_left() {
        let mut rng = fastrand::Rng::with_seed(6);
        for _ in 0..200 {
            let state = random_state(&mut rng);
            let half_turns = random_state_in(&mut rng, MoveSet::G3);
            assert_eq!(
                Coord::TetradCoset.encode(&half_turns.multiply(&state)),
                Coord::TetradCoset.encode(&state)
            );
        }
    }

    #[test]
    fn test_permutation_rank() {
        assert_eq!(rank_permutation(&[0, 1, 2, 3]), 0);
        assert_eq!(rank_permutation(&[3, 2, 1, 0]), 23);
        assert_eq!(rank_permutation(&[8, 9, 11, 10]), 1);
        for rank in 0..24 {
            assert_eq!(rank_permutation(&unrank_permutation::<4>(rank)), rank);
        }
    }
}
