//! The cubie model. A state records, for every corner and edge slot, which
//! piece currently occupies it and how that piece is oriented relative to the
//! slot.
//!
//! Corner slots: URF, UFL, ULB, UBR, DFR, DLF, DBL, DRB.
//! Edge slots: UR, UF, UL, UB, DR, DF, DL, DB, FR, FL, BL, BR.

use crate::{InvalidCubeState, moves::Move};
use std::fmt;

pub const CORNERS: usize = 8;
pub const EDGES: usize = 12;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CubieState {
    /// Corner piece occupying each corner slot.
    pub cp: [u8; CORNERS],
    /// Clockwise twist (0..3) of the corner in each slot.
    pub co: [u8; CORNERS],
    /// Edge piece occupying each edge slot.
    pub ep: [u8; EDGES],
    /// Flip (0..2) of the edge in each slot.
    pub eo: [u8; EDGES],
}

impl Default for CubieState {
    fn default() -> Self {
        Self::SOLVED
    }
}

impl fmt::Debug for CubieState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CubieState")
            .field("cp", &self.cp)
            .field("co", &self.co)
            .field("ep", &self.ep)
            .field("eo", &self.eo)
            .finish()
    }
}

impl CubieState {
    pub const SOLVED: Self = Self {
        cp: [0, 1, 2, 3, 4, 5, 6, 7],
        co: [0; CORNERS],
        ep: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        eo: [0; EDGES],
    };

    /// Group multiplication: the state reached by performing `self` and then
    /// `other`.
    #[must_use]
    pub const fn multiply(&self, other: &Self) -> Self {
        let mut result = Self::SOLVED;
        let mut i = 0;
        while i < CORNERS {
            let from = other.cp[i] as usize;
            result.cp[i] = self.cp[from];
            result.co[i] = (self.co[from] + other.co[i]) % 3;
            i += 1;
        }
        let mut i = 0;
        while i < EDGES {
            let from = other.ep[i] as usize;
            result.ep[i] = self.ep[from];
            result.eo[i] = (self.eo[from] + other.eo[i]) % 2;
            i += 1;
        }
        result
    }

    #[must_use]
    pub const fn inverse(&self) -> Self {
        let mut result = Self::SOLVED;
        let mut i = 0;
        while i < CORNERS {
            let to = self.cp[i] as usize;
            result.cp[to] = i as u8;
            result.co[to] = (3 - self.co[i] % 3) % 3;
            i += 1;
        }
        let mut i = 0;
        while i < EDGES {
            let to = self.ep[i] as usize;
            result.ep[to] = i as u8;
            result.eo[to] = (2 - self.eo[i] % 2) % 2;
            i += 1;
        }
        result
    }

    #[must_use]
    pub fn apply(&self, move_: Move) -> Self {
        self.multiply(move_.cubie())
    }

    #[must_use]
    pub fn apply_sequence(&self, moves: &[Move]) -> Self {
        moves.iter().fold(*self, |state, &move_| state.apply(move_))
    }

    #[must_use]
    pub fn from_moves(moves: &[Move]) -> Self {
        Self::SOLVED.apply_sequence(moves)
    }

    #[must_use]
    pub fn is_solved(&self) -> bool {
        *self == Self::SOLVED
    }

    /// Parity of the corner permutation, `true` when odd.
    #[must_use]
    pub fn corner_parity(&self) -> bool {
        odd_permutation(&self.cp)
    }

    /// Parity of the edge permutation, `true` when odd.
    #[must_use]
    pub fn edge_parity(&self) -> bool {
        odd_permutation(&self.ep)
    }

    /// Checks every invariant a physically reachable cube satisfies.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn verify(&self) -> Result<(), InvalidCubeState> {
        let mut seen = [false; CORNERS];
        for &piece in &self.cp {
            match seen.get_mut(usize::from(piece)) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(InvalidCubeState::CornerPermutation(piece)),
            }
        }
        let mut seen = [false; EDGES];
        for &piece in &self.ep {
            match seen.get_mut(usize::from(piece)) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(InvalidCubeState::EdgePermutation(piece)),
            }
        }
        if let Some(&twist) = self.co.iter().find(|&&twist| twist >= 3) {
            return Err(InvalidCubeState::Orientation(twist));
        }
        if let Some(&flip) = self.eo.iter().find(|&&flip| flip >= 2) {
            return Err(InvalidCubeState::Orientation(flip));
        }
        if self.co.iter().map(|&twist| u32::from(twist)).sum::<u32>() % 3 != 0 {
            return Err(InvalidCubeState::CornerTwist);
        }
        if self.eo.iter().map(|&flip| u32::from(flip)).sum::<u32>() % 2 != 0 {
            return Err(InvalidCubeState::EdgeFlip);
        }
        if self.corner_parity() != self.edge_parity() {
            return Err(InvalidCubeState::Parity);
        }
        Ok(())
    }
}

fn odd_permutation(perm: &[u8]) -> bool {
    let mut inversions = 0;
    for (i, &a) in perm.iter().enumerate() {
        inversions += perm[i + 1..].iter().filter(|&&b| b < a).count();
    }
    inversions % 2 == 1
}
