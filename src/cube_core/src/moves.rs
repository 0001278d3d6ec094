//! Face turns in Singmaster notation, and the move sets that define the
//! nested subgroups the phased solvers reduce through.

use crate::{CubeError, cubie::CubieState};
use itertools::Itertools;
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Face {
    U,
    R,
    F,
    D,
    L,
    B,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::U, Face::R, Face::F, Face::D, Face::L, Face::B];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        Self::ALL[(self as usize + 3) % 6]
    }

    /// Opposite faces share an axis; turns on the same axis commute.
    #[must_use]
    pub const fn axis(self) -> usize {
        self as usize % 3
    }

    #[must_use]
    pub const fn to_char(self) -> char {
        match self {
            Face::U => 'U',
            Face::R => 'R',
            Face::F => 'F',
            Face::D => 'D',
            Face::L => 'L',
            Face::B => 'B',
        }
    }

    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'U' => Some(Face::U),
            'R' => Some(Face::R),
            'F' => Some(Face::F),
            'D' => Some(Face::D),
            'L' => Some(Face::L),
            'B' => Some(Face::B),
            _ => None,
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// One of the 18 face turns, stored as `face * 3 + quarter_turns - 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Move(u8);

const fn quarter_turn(face: Face) -> CubieState {
    match face {
        Face::U => CubieState {
            cp: [3, 0, 1, 2, 4, 5, 6, 7],
            co: [0; 8],
            ep: [3, 0, 1, 2, 4, 5, 6, 7, 8, 9, 10, 11],
            eo: [0; 12],
        },
        Face::R => CubieState {
            cp: [4, 1, 2, 0, 7, 5, 6, 3],
            co: [2, 0, 0, 1, 1, 0, 0, 2],
            ep: [8, 1, 2, 3, 11, 5, 6, 7, 4, 9, 10, 0],
            eo: [0; 12],
        },
        Face::F => CubieState {
            cp: [1, 5, 2, 3, 0, 4, 6, 7],
            co: [1, 2, 0, 0, 2, 1, 0, 0],
            ep: [0, 9, 2, 3, 4, 8, 6, 7, 1, 5, 10, 11],
            eo: [0, 1, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0],
        },
        Face::D => CubieState {
            cp: [0, 1, 2, 3, 5, 6, 7, 4],
            co: [0; 8],
            ep: [0, 1, 2, 3, 5, 6, 7, 4, 8, 9, 10, 11],
            eo: [0; 12],
        },
        Face::L => CubieState {
            cp: [0, 2, 6, 3, 4, 1, 5, 7],
            co: [0, 1, 2, 0, 0, 2, 1, 0],
            ep: [0, 1, 10, 3, 4, 5, 9, 7, 8, 2, 6, 11],
            eo: [0; 12],
        },
        Face::B => CubieState {
            cp: [0, 1, 3, 7, 4, 5, 2, 6],
            co: [0, 0, 1, 2, 0, 0, 2, 1],
            ep: [0, 1, 2, 11, 4, 5, 6, 10, 8, 9, 3, 7],
            eo: [0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 1],
        },
    }
}

static MOVE_CUBIES: [CubieState; 18] = {
    let mut arr = [CubieState::SOLVED; 18];
    let mut face = 0;
    while face < 6 {
        let quarter = quarter_turn(Face::ALL[face]);
        arr[face * 3] = quarter;
        arr[face * 3 + 1] = quarter.multiply(&quarter);
        arr[face * 3 + 2] = arr[face * 3 + 1].multiply(&quarter);
        face += 1;
    }
    arr
};

impl Move {
    pub const U: Move = Move::new(Face::U, 1);
    pub const U2: Move = Move::new(Face::U, 2);
    pub const U_PRIME: Move = Move::new(Face::U, 3);
    pub const R: Move = Move::new(Face::R, 1);
    pub const R2: Move = Move::new(Face::R, 2);
    pub const R_PRIME: Move = Move::new(Face::R, 3);
    pub const F: Move = Move::new(Face::F, 1);
    pub const F2: Move = Move::new(Face::F, 2);
    pub const F_PRIME: Move = Move::new(Face::F, 3);
    pub const D: Move = Move::new(Face::D, 1);
    pub const D2: Move = Move::new(Face::D, 2);
    pub const D_PRIME: Move = Move::new(Face::D, 3);
    pub const L: Move = Move::new(Face::L, 1);
    pub const L2: Move = Move::new(Face::L, 2);
    pub const L_PRIME: Move = Move::new(Face::L, 3);
    pub const B: Move = Move::new(Face::B, 1);
    pub const B2: Move = Move::new(Face::B, 2);
    pub const B_PRIME: Move = Move::new(Face::B, 3);

    pub const ALL: [Move; 18] = {
        let mut arr = [Move(0); 18];
        let mut i = 0;
        while i < 18 {
            arr[i] = Move(i as u8);
            i += 1;
        }
        arr
    };

    /// # Panics
    ///
    /// Panics when `quarter_turns` is not 1, 2 or 3.
    #[must_use]
    pub const fn new(face: Face, quarter_turns: u8) -> Self {
        assert!(quarter_turns >= 1 && quarter_turns <= 3);
        Move(face as u8 * 3 + quarter_turns - 1)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn face(self) -> Face {
        Face::ALL[self.0 as usize / 3]
    }

    /// Clockwise quarter turns, 1 to 3.
    #[must_use]
    pub const fn quarter_turns(self) -> u8 {
        self.0 % 3 + 1
    }

    #[must_use]
    pub const fn inverse(self) -> Self {
        Move::new(self.face(), 4 - self.quarter_turns())
    }

    #[must_use]
    pub fn cubie(self) -> &'static CubieState {
        &MOVE_CUBIES[self.index()]
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quarter_turns() {
            1 => write!(f, "{}", self.face()),
            2 => write!(f, "{}2", self.face()),
            _ => write!(f, "{}'", self.face()),
        }
    }
}

impl FromStr for Move {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let face = chars
            .next()
            .and_then(Face::from_char)
            .ok_or_else(|| CubeError::UnknownMove(s.to_owned()))?;
        let quarter_turns = match chars.as_str() {
            "" | "1" => 1,
            "2" | "2'" => 2,
            "'" | "3" => 3,
            _ => return Err(CubeError::UnknownMove(s.to_owned())),
        };
        Ok(Move::new(face, quarter_turns))
    }
}

/// Parses a whitespace separated move sequence such as `R U R' U'`.
///
/// # Errors
///
/// Fails on the first token that is not a face turn.
pub fn parse_sequence(text: &str) -> Result<Vec<Move>, CubeError> {
    text.split_whitespace().map(str::parse).collect()
}

#[must_use]
pub fn format_sequence(moves: &[Move]) -> String {
    moves.iter().join(" ")
}

#[must_use]
pub fn invert_sequence(moves: &[Move]) -> Vec<Move> {
    moves.iter().rev().map(|move_| move_.inverse()).collect()
}

/// Merges adjacent turns of the same face, looking through a turn of the
/// opposite face since those commute, and drops turns that cancel.
#[must_use]
pub fn simplify(moves: &[Move]) -> Vec<Move> {
    let mut out: Vec<Move> = Vec::with_capacity(moves.len());
    for &move_ in moves {
        let len = out.len();
        let target = if len >= 1 && out[len - 1].face() == move_.face() {
            Some(len - 1)
        } else if len >= 2
            && out[len - 1].face() == move_.face().opposite()
            && out[len - 2].face() == move_.face()
        {
            Some(len - 2)
        } else {
            None
        };
        match target {
            Some(i) => {
                let turns = (out[i].quarter_turns() + move_.quarter_turns()) % 4;
                if turns == 0 {
                    out.remove(i);
                } else {
                    out[i] = Move::new(move_.face(), turns);
                }
            }
            None => out.push(move_),
        }
    }
    out
}

/// A set of moves, one bit per [`Move::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MoveSet(u32);

const fn face_bits(face: Face, quarter: bool) -> u32 {
    let base = face as u32 * 3;
    if quarter {
        0b111 << base
    } else {
        0b010 << base
    }
}

impl MoveSet {
    /// Every face turn.
    pub const ALL: MoveSet = MoveSet((1 << 18) - 1);
    /// `<U, D, L, R, F2, B2>`, which preserves edge orientation.
    pub const G1: MoveSet = MoveSet(
        face_bits(Face::U, true)
            | face_bits(Face::D, true)
            | face_bits(Face::L, true)
            | face_bits(Face::R, true)
            | face_bits(Face::F, false)
            | face_bits(Face::B, false),
    );
    /// `<U, D, L2, R2, F2, B2>`, the domino group.
    pub const G2: MoveSet = MoveSet(
        face_bits(Face::U, true)
            | face_bits(Face::D, true)
            | face_bits(Face::L, false)
            | face_bits(Face::R, false)
            | face_bits(Face::F, false)
            | face_bits(Face::B, false),
    );
    /// Half turns only.
    pub const G3: MoveSet = MoveSet(
        face_bits(Face::U, false)
            | face_bits(Face::D, false)
            | face_bits(Face::L, false)
            | face_bits(Face::R, false)
            | face_bits(Face::F, false)
            | face_bits(Face::B, false),
    );

    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL.0 == 0 {
            Some(MoveSet(bits))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, move_: Move) -> bool {
        (self.0 >> move_.0) & 1 == 1
    }

    #[must_use]
    pub const fn is_subset_of(self, other: MoveSet) -> bool {
        self.0 & !other.0 == 0
    }

    #[must_use]
    pub const fn is_strict_subset_of(self, other: MoveSet) -> bool {
        self.is_subset_of(other) && self.0 != other.0
    }

    /// Every move's inverse is also in the set.
    #[must_use]
    pub fn is_closed_under_inverse(self) -> bool {
        self.iter().all(|move_| self.contains(move_.inverse()))
    }

    pub fn iter(self) -> impl Iterator<Item = Move> + Clone {
        Move::ALL.into_iter().filter(move |&move_| self.contains(move_))
    }
}

const _: () = {
    assert!(MoveSet::G1.is_strict_subset_of(MoveSet::ALL));
    assert!(MoveSet::G2.is_strict_subset_of(MoveSet::G1));
    assert!(MoveSet::G3.is_strict_subset_of(MoveSet::G2));
    assert!(MoveSet::G1.len() == 14);
    assert!(MoveSet::G2.len() == 10);
    assert!(MoveSet::G3.len() == 6);
};
