//! Coordinate transition tables: `table[value][move]` is the coordinate of
//! the state reached by applying `move` to any state with coordinate `value`.

use crate::{error::TableError, start, success};
use cube_core::{Coord, Move, MoveSet};
use log::info;
use std::time::Instant;

const NO_COLUMN: u8 = u8::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTable {
    coord: Coord,
    moves: MoveSet,
    columns: [u8; 18],
    data: Vec<u32>,
}

fn columns_of(moves: MoveSet) -> [u8; 18] {
    let mut columns = [NO_COLUMN; 18];
    for (column, move_) in moves.iter().enumerate() {
        columns[move_.index()] = column as u8;
    }
    columns
}

impl MoveTable {
    /// Builds the table over the coordinate's natural move set.
    #[must_use]
    pub fn generate(coord: Coord) -> Self {
        let moves = coord.natural_moves();
        info!(
            start!("Generating move table `{}` ({} x {})..."),
            coord.name(),
            coord.size(),
            moves.len()
        );
        let start = Instant::now();

        let mut data = Vec::with_capacity(coord.size() as usize * moves.len());
        for value in 0..coord.size() {
            let representative = coord.decode(value);
            data.extend(moves.iter().map(|move_| coord.encode(&representative.apply(move_))));
        }

        info!(
            success!("Generated move table `{}` in {:.3}s"),
            coord.name(),
            start.elapsed().as_secs_f64()
        );
        Self {
            coord,
            moves,
            columns: columns_of(moves),
            data,
        }
    }

    /// Rebuilds a table from a persisted payload.
    ///
    /// # Errors
    ///
    /// Fails when the payload is not exactly `size x |moves|` in-range
    /// coordinates.
    pub fn from_raw(coord: Coord, moves: MoveSet, data: Vec<u32>) -> Result<Self, TableError> {
        let mismatch = |reason: String| TableError::LoadMismatch {
            name: Self::name_of(coord),
            reason,
        };
        if moves != coord.natural_moves() {
            return Err(mismatch(format!("unexpected move set {:#x}", moves.bits())));
        }
        let expected = coord.size() as usize * moves.len();
        if data.len() != expected {
            return Err(mismatch(format!(
                "expected {expected} entries, found {}",
                data.len()
            )));
        }
        if let Some(bad) = data.iter().find(|&&value| value >= coord.size()) {
            return Err(mismatch(format!("coordinate {bad} is out of range")));
        }
        Ok(Self {
            coord,
            moves,
            columns: columns_of(moves),
            data,
        })
    }

    pub(crate) fn name_of(coord: Coord) -> String {
        format!("move_{}", coord.name())
    }

    #[must_use]
    pub fn name(&self) -> String {
        Self::name_of(self.coord)
    }

    #[must_use]
    pub fn coord(&self) -> Coord {
        self.coord
    }

    #[must_use]
    pub fn moves(&self) -> MoveSet {
        self.moves
    }

    #[must_use]
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn apply(&self, value: u32, move_: Move) -> u32 {
        let column = self.columns[move_.index()];
        debug_assert_ne!(column, NO_COLUMN, "{move_} is not in the table's move set");
        self.data[value as usize * self.moves.len() + usize::from(column)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::{CubieState, scramble::random_moves_in};

    #[test_log::test]
    fn test_tables_track_cubie_simulation() {
        let mut rng = fastrand::Rng::with_seed(8);
        for coord in Coord::ALL {
            let table = MoveTable::generate(coord);
            assert_eq!(table.data().len(), coord.size() as usize * coord.natural_moves().len());
            for _ in 0..20 {
                let moves = random_moves_in(&mut rng, coord.natural_moves(), 30);
                let mut state = CubieState::SOLVED;
                let mut value = 0;
                for move_ in moves {
                    state = state.apply(move_);
                    value = table.apply(value, move_);
                    assert_eq!(value, coord.encode(&state), "{coord:?}");
                }
            }
        }
    }

    #[test]
    fn test_from_raw_validates() {
        let table = MoveTable::generate(Coord::SlicePermutation);
        let moves = table.moves();
        let mut data = table.data().to_vec();
        assert_eq!(
            MoveTable::from_raw(Coord::SlicePermutation, moves, data.clone()).unwrap(),
            table
        );

        data[3] = 24;
        assert!(matches!(
            MoveTable::from_raw(Coord::SlicePermutation, moves, data.clone()),
            Err(TableError::LoadMismatch { .. })
        ));
        data.pop();
        assert!(matches!(
            MoveTable::from_raw(Coord::SlicePermutation, moves, data),
            Err(TableError::LoadMismatch { .. })
        ));
        assert!(matches!(
            MoveTable::from_raw(Coord::SlicePermutation, MoveSet::ALL, vec![]),
            Err(TableError::LoadMismatch { .. })
        ));
    }
}
