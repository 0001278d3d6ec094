#![warn(clippy::pedantic)]
#![allow(clippy::similar_names, clippy::module_name_repetitions)]

//! Cubie-level model of the 3x3x3 cube: the permutation/orientation algebra,
//! the 18 face turns, and the coordinate codecs used by the table-driven
//! searches in `cube_solver`.

pub mod coord;
pub mod cubie;
pub mod facelet;
pub mod moves;
pub mod scramble;

pub use coord::Coord;
pub use cubie::CubieState;
pub use moves::{Face, Move, MoveSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CubeError {
    #[error("Expected 54 facelets but found {0}")]
    FaceletCount(usize),
    #[error("Unrecognized facelet `{0}`")]
    UnknownFacelet(char),
    #[error("Unrecognized move `{0}`")]
    UnknownMove(String),
    #[error("Invalid cube state: {0}")]
    InvalidCubeState(#[from] InvalidCubeState),
}

/// The ways a facelet array or cubie state can fail to describe a physical
/// cube.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidCubeState {
    #[error("the center facelets are not in U R F D L B order")]
    CenterMismatch,
    #[error("no corner piece matches the facelets at corner slot {0}")]
    NoMatchingCorner(usize),
    #[error("no edge piece matches the facelets at edge slot {0}")]
    NoMatchingEdge(usize),
    #[error("corner piece {0} is missing or appears more than once")]
    CornerPermutation(u8),
    #[error("edge piece {0} is missing or appears more than once")]
    EdgePermutation(u8),
    #[error("orientation value {0} is out of range")]
    Orientation(u8),
    #[error("the total corner twist is not a multiple of three")]
    CornerTwist,
    #[error("the total edge flip is odd")]
    EdgeFlip,
    #[error("the corner and edge permutations have different parity")]
    Parity,
}

pub(crate) const FACT: [u32; 13] = {
    let mut arr = [0; 13];
    arr[0] = 1;
    let mut i = 1;
    while i < arr.len() {
        arr[i] = arr[i - 1] * i as u32;
        i += 1;
    }
    arr
};

// Pascal's triangle up to 12 choose 12. Entries with k > n are zero, which the
// subset codecs rely on.
pub(crate) const BINOMIAL: [[u32; 13]; 13] = {
    let mut arr = [[0; 13]; 13];
    let mut n = 0;
    while n < 13 {
        arr[n][0] = 1;
        let mut k = 1;
        while k <= n {
            arr[n][k] = arr[n - 1][k - 1] + arr[n - 1][k];
            k += 1;
        }
        n += 1;
    }
    arr
};
