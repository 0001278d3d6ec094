//! Pattern databases: exact distances to the solved coordinate, found by
//! breadth-first search over one coordinate space or the product of two, and
//! packed two entries per byte.

use crate::{error::TableError, move_table::MoveTable, start, success, working};
use cube_core::{Coord, Move, MoveSet};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::Range,
    sync::atomic::{AtomicU8, Ordering},
    time::Instant,
};

/// Entries never exceed this; the nibble value 15 doubles as "unvisited"
/// while a database is being built.
pub const MAX_CAP: u8 = 15;
const UNVISITED: u8 = 0xF;
const DEPTHS: usize = MAX_CAP as usize + 1;
/// Spaces smaller than this are always searched on the calling thread.
const PARALLEL_THRESHOLD: u32 = 1 << 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternDbKind {
    EdgeFlip,
    G1TwistSlice,
    G2CosetMiddle,
    G3Corners,
    G3Edges,
    TwistSlice,
    FlipSlice,
    DominoCorners,
    DominoEdges,
    DominoSlice,
    Corners,
    UEdgesFlip,
    DEdgesFlip,
    SliceEdgesFlip,
    TwistFlip,
    CornerPermutation,
    UEdges,
    DEdges,
    SliceEdges,
}

impl PatternDbKind {
    pub const ALL: [PatternDbKind; 19] = [
        PatternDbKind::EdgeFlip,
        PatternDbKind::G1TwistSlice,
        PatternDbKind::G2CosetMiddle,
        PatternDbKind::G3Corners,
        PatternDbKind::G3Edges,
        PatternDbKind::TwistSlice,
        PatternDbKind::FlipSlice,
        PatternDbKind::DominoCorners,
        PatternDbKind::DominoEdges,
        PatternDbKind::DominoSlice,
        PatternDbKind::Corners,
        PatternDbKind::UEdgesFlip,
        PatternDbKind::DEdgesFlip,
        PatternDbKind::SliceEdgesFlip,
        PatternDbKind::TwistFlip,
        PatternDbKind::CornerPermutation,
        PatternDbKind::UEdges,
        PatternDbKind::DEdges,
        PatternDbKind::SliceEdges,
    ];

    #[must_use]
    pub const fn spec(self) -> PatternDbSpec {
        use Coord as C;
        let (primary, secondary, moves) = match self {
            PatternDbKind::EdgeFlip => (C::EdgeFlip, None, MoveSet::ALL),
            PatternDbKind::G1TwistSlice => (C::CornerTwist, Some(C::SliceCombination), MoveSet::G1),
            PatternDbKind::G2CosetMiddle => (C::TetradCoset, Some(C::MiddleStanding), MoveSet::G2),
            PatternDbKind::G3Corners => (C::CornerPermutation, None, MoveSet::G3),
            PatternDbKind::G3Edges => (C::HalfTurnEdges, None, MoveSet::G3),
            PatternDbKind::TwistSlice => (C::CornerTwist, Some(C::SliceCombination), MoveSet::ALL),
            PatternDbKind::FlipSlice => (C::EdgeFlip, Some(C::SliceCombination), MoveSet::ALL),
            PatternDbKind::DominoCorners => (C::CornerPermutation, None, MoveSet::G2),
            PatternDbKind::DominoEdges => (C::UdEdgePermutation, None, MoveSet::G2),
            PatternDbKind::DominoSlice => (C::SlicePermutation, None, MoveSet::G2),
            PatternDbKind::Corners => (C::CornerPermutation, Some(C::CornerTwist), MoveSet::ALL),
            PatternDbKind::UEdgesFlip => (C::UEdges, Some(C::EdgeFlip), MoveSet::ALL),
            PatternDbKind::DEdgesFlip => (C::DEdges, Some(C::EdgeFlip), MoveSet::ALL),
            PatternDbKind::SliceEdgesFlip => (C::SliceSorted, Some(C::EdgeFlip), MoveSet::ALL),
            PatternDbKind::TwistFlip => (C::CornerTwist, Some(C::EdgeFlip), MoveSet::ALL),
            PatternDbKind::CornerPermutation => (C::CornerPermutation, None, MoveSet::ALL),
            PatternDbKind::UEdges => (C::UEdges, None, MoveSet::ALL),
            PatternDbKind::DEdges => (C::DEdges, None, MoveSet::ALL),
            PatternDbKind::SliceEdges => (C::SliceSorted, None, MoveSet::ALL),
        };
        PatternDbSpec {
            kind: self,
            primary,
            secondary,
            moves,
            cap: MAX_CAP,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PatternDbKind::EdgeFlip => "edge_flip",
            PatternDbKind::G1TwistSlice => "g1_twist_slice",
            PatternDbKind::G2CosetMiddle => "g2_coset_middle",
            PatternDbKind::G3Corners => "g3_corners",
            PatternDbKind::G3Edges => "g3_edges",
            PatternDbKind::TwistSlice => "twist_slice",
            PatternDbKind::FlipSlice => "flip_slice",
            PatternDbKind::DominoCorners => "domino_corners",
            PatternDbKind::DominoEdges => "domino_edges",
            PatternDbKind::DominoSlice => "domino_slice",
            PatternDbKind::Corners => "corners",
            PatternDbKind::UEdgesFlip => "u_edges_flip",
            PatternDbKind::DEdgesFlip => "d_edges_flip",
            PatternDbKind::SliceEdgesFlip => "slice_edges_flip",
            PatternDbKind::TwistFlip => "twist_flip",
            PatternDbKind::CornerPermutation => "corner_permutation",
            PatternDbKind::UEdges => "u_edges",
            PatternDbKind::DEdges => "d_edges",
            PatternDbKind::SliceEdges => "slice_edges",
        }
    }
}

impl fmt::Display for PatternDbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a pattern database indexes and how far its search goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatternDbSpec {
    pub kind: PatternDbKind,
    pub primary: Coord,
    pub secondary: Option<Coord>,
    pub moves: MoveSet,
    pub cap: u8,
}

impl PatternDbSpec {
    /// # Panics
    ///
    /// Panics if `cap` is zero or above [`MAX_CAP`].
    #[must_use]
    pub fn with_cap(mut self, cap: u8) -> Self {
        assert!((1..=MAX_CAP).contains(&cap), "cap {cap} is out of range");
        self.cap = cap;
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    #[must_use]
    pub fn secondary_size(&self) -> u32 {
        self.secondary.map_or(1, Coord::size)
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.primary.size() * self.secondary_size()
    }

    #[must_use]
    pub fn coords(&self) -> impl Iterator<Item = Coord> {
        std::iter::once(self.primary).chain(self.secondary)
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        (self.size() as usize).div_ceil(2)
    }
}

/// Four-bit entries shared between build workers. A byte holds entry `2k`
/// in its low nibble and `2k + 1` in its high nibble.
struct NibbleArray {
    bytes: Vec<AtomicU8>,
}

impl NibbleArray {
    fn new(len: u32) -> Self {
        Self {
            bytes: (0..(len as usize).div_ceil(2))
                .map(|_| AtomicU8::new(0xFF))
                .collect(),
        }
    }

    #[inline]
    fn shift(index: u32) -> u32 {
        (index & 1) * 4
    }

    #[inline]
    fn get(&self, index: u32) -> u8 {
        (self.bytes[index as usize / 2].load(Ordering::Relaxed) >> Self::shift(index)) & 0xF
    }

    /// Stores `value` if the entry is still unvisited. Returns whether this
    /// call was the one to store it.
    fn set_if_unvisited(&self, index: u32, value: u8) -> bool {
        let shift = Self::shift(index);
        let byte = &self.bytes[index as usize / 2];
        let mut current = byte.load(Ordering::Relaxed);
        loop {
            if (current >> shift) & 0xF != UNVISITED {
                return false;
            }
            let next = (current & !(0xF << shift)) | (value << shift);
            match byte.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_iter().map(AtomicU8::into_inner).collect()
    }
}

/// The graph the breadth-first search walks.
struct Space<'a> {
    primary: &'a MoveTable,
    secondary: Option<&'a MoveTable>,
    secondary_size: u32,
    moves: Vec<Move>,
}

impl Space<'_> {
    #[inline]
    fn neighbors(&self, index: u32) -> impl Iterator<Item = u32> + '_ {
        let a = index / self.secondary_size;
        let b = index % self.secondary_size;
        self.moves.iter().map(move |&move_| {
            let a = self.primary.apply(a, move_);
            let b = self.secondary.map_or(0, |table| table.apply(b, move_));
            a * self.secondary_size + b
        })
    }

    /// Labels the unvisited neighbors of every depth `depth` entry.
    fn expand_forward(&self, entries: &NibbleArray, range: Range<u32>, depth: u8) -> u64 {
        let mut labelled = 0;
        for index in range {
            if entries.get(index) != depth {
                continue;
            }
            for neighbor in self.neighbors(index) {
                if entries.set_if_unvisited(neighbor, depth + 1) {
                    labelled += 1;
                }
            }
        }
        labelled
    }

    /// Labels every unvisited entry that has a depth `depth` neighbor. This
    /// relies on the move set being closed under inverse.
    fn expand_backward(&self, entries: &NibbleArray, range: Range<u32>, depth: u8) -> u64 {
        let mut labelled = 0;
        for index in range {
            if entries.get(index) != UNVISITED {
                continue;
            }
            if self
                .neighbors(index)
                .any(|neighbor| entries.get(neighbor) == depth)
                && entries.set_if_unvisited(index, depth + 1)
            {
                labelled += 1;
            }
        }
        labelled
    }
}

fn chunks(size: u32, threads: usize) -> impl Iterator<Item = Range<u32>> {
    let threads = threads.max(1) as u32;
    let chunk = size.div_ceil(threads).max(1);
    (0..threads)
        .map(move |i| (i * chunk).min(size)..((i + 1) * chunk).min(size))
        .filter(|range| !range.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDatabase {
    spec: PatternDbSpec,
    data: Vec<u8>,
    populations: [u64; DEPTHS],
}

impl PatternDatabase {
    /// Runs the breadth-first search from the solved coordinate. With more
    /// than one thread, each layer is split across scoped workers that share
    /// one atomic entry array; the result is identical either way.
    ///
    /// # Errors
    ///
    /// Fails with [`TableError::Missing`] when a move table does not cover
    /// the database's coordinates and moves, or with
    /// [`TableError::WorkerPanicked`] if a worker thread panics.
    pub fn generate(
        spec: PatternDbSpec,
        primary: &MoveTable,
        secondary: Option<&MoveTable>,
        threads: usize,
    ) -> Result<Self, TableError> {
        let covers = |table: &MoveTable, coord: Coord| {
            table.coord() == coord && spec.moves.is_subset_of(table.moves())
        };
        if !covers(primary, spec.primary) {
            return Err(TableError::Missing(MoveTable::name_of(spec.primary)));
        }
        match (spec.secondary, secondary) {
            (None, None) => {}
            (Some(coord), Some(table)) if covers(table, coord) => {}
            (Some(coord), _) => return Err(TableError::Missing(MoveTable::name_of(coord))),
            (None, Some(table)) => return Err(TableError::Missing(table.name())),
        }
        debug_assert!(spec.moves.is_closed_under_inverse());

        let size = spec.size();
        let threads = if size < PARALLEL_THRESHOLD { 1 } else { threads.max(1) };
        info!(
            start!("Generating pattern database `{}` ({} entries, {} thread(s))..."),
            spec.name(),
            size,
            threads
        );
        let start = Instant::now();

        let space = Space {
            primary,
            secondary,
            secondary_size: spec.secondary_size(),
            moves: spec.moves.iter().collect(),
        };
        let entries = NibbleArray::new(size);
        entries.set_if_unvisited(0, 0);
        let mut populations = [0; DEPTHS];
        populations[0] = 1;
        let mut visited = 1;

        let mut depth = 0;
        while depth + 1 < spec.cap && populations[usize::from(depth)] > 0 {
            let backward = visited * 2 > u64::from(size);
            let expand = |range: Range<u32>| {
                if backward {
                    space.expand_backward(&entries, range, depth)
                } else {
                    space.expand_forward(&entries, range, depth)
                }
            };
            let labelled = if threads == 1 {
                expand(0..size)
            } else {
                let expand = &expand;
                crossbeam::scope(|scope| {
                    let handles = chunks(size, threads)
                        .map(|range| scope.spawn(move |_| expand(range)))
                        .collect::<Vec<_>>();
                    handles
                        .into_iter()
                        .map(|handle| handle.join().map_err(|_| TableError::WorkerPanicked))
                        .sum::<Result<u64, _>>()
                })
                .map_err(|_| TableError::WorkerPanicked)??
            };
            depth += 1;
            populations[usize::from(depth)] = labelled;
            visited += labelled;
            debug!(
                working!("Depth {} has {} entries ({}){}"),
                depth,
                labelled,
                spec.name(),
                if backward { " [backward]" } else { "" }
            );
        }

        // Entries left over after the search reached the cap are at least
        // `cap` away. Entries left over after it ran dry are unreachable and
        // never looked up, so the same value is harmless.
        let reached_cap = depth + 1 == spec.cap && populations[usize::from(depth)] > 0;
        if reached_cap {
            populations[usize::from(spec.cap)] = u64::from(size) - visited;
        }
        let mut data = entries.into_bytes();
        if spec.cap != UNVISITED {
            for byte in &mut data {
                let low = match *byte & 0xF {
                    UNVISITED => spec.cap,
                    low => low,
                };
                let high = match *byte >> 4 {
                    UNVISITED => spec.cap,
                    high => high,
                };
                *byte = low | (high << 4);
            }
        }

        let db = Self {
            spec,
            data,
            populations,
        };
        info!(
            success!("Generated pattern database `{}` in {:.3}s (max depth {})"),
            spec.name(),
            start.elapsed().as_secs_f64(),
            db.max_depth()
        );
        Ok(db)
    }

    /// Rebuilds a database from a persisted payload.
    ///
    /// # Errors
    ///
    /// Fails when the payload length or an entry does not fit `spec`.
    pub fn from_raw(
        spec: PatternDbSpec,
        data: Vec<u8>,
        populations: [u64; DEPTHS],
    ) -> Result<Self, TableError> {
        let mismatch = |reason: String| TableError::LoadMismatch {
            name: spec.name().to_owned(),
            reason,
        };
        if data.len() != spec.byte_len() {
            return Err(mismatch(format!(
                "expected {} bytes, found {}",
                spec.byte_len(),
                data.len()
            )));
        }
        if data
            .iter()
            .any(|&byte| byte & 0xF > spec.cap || byte >> 4 > spec.cap)
        {
            return Err(mismatch(format!("an entry exceeds the cap of {}", spec.cap)));
        }
        if populations[usize::from(spec.cap) + 1..].iter().any(|&n| n != 0) {
            return Err(mismatch("populations exceed the cap".to_owned()));
        }
        Ok(Self {
            spec,
            data,
            populations,
        })
    }

    #[must_use]
    pub fn spec(&self) -> &PatternDbSpec {
        &self.spec
    }

    #[must_use]
    pub fn kind(&self) -> PatternDbKind {
        self.spec.kind
    }

    /// A lower bound on the number of moves from `index` to solved. The
    /// value equals the true distance, except that the cap stands for "cap
    /// or more".
    #[inline]
    #[must_use]
    pub fn lookup(&self, index: u32) -> u8 {
        (self.data[index as usize / 2] >> ((index & 1) * 4)) & 0xF
    }

    #[inline]
    #[must_use]
    pub fn lookup_pair(&self, primary: u32, secondary: u32) -> u8 {
        self.lookup(primary * self.spec.secondary_size() + secondary)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Entries found at each depth. Entries at the cap are counted only when
    /// the search was cut short by it.
    #[must_use]
    pub fn populations(&self) -> &[u64; DEPTHS] {
        &self.populations
    }

    /// The deepest populated depth.
    #[must_use]
    pub fn max_depth(&self) -> u8 {
        self.populations
            .iter()
            .rposition(|&n| n > 0)
            .map_or(0, |depth| depth as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::CubieState;
    use std::collections::VecDeque;

    fn generate(spec: PatternDbSpec, threads: usize) -> PatternDatabase {
        let primary = MoveTable::generate(spec.primary);
        let secondary = spec.secondary.map(MoveTable::generate);
        PatternDatabase::generate(spec, &primary, secondary.as_ref(), threads).unwrap()
    }

    #[test]
    fn test_nibble_array() {
        let entries = NibbleArray::new(5);
        assert_eq!(entries.bytes.len(), 3);
        assert!(entries.set_if_unvisited(3, 7));
        assert!(!entries.set_if_unvisited(3, 2));
        assert!(entries.set_if_unvisited(2, 1));
        assert_eq!(entries.get(2), 1);
        assert_eq!(entries.get(3), 7);
        assert_eq!(entries.get(4), UNVISITED);
        assert_eq!(entries.into_bytes(), vec![0xFF, 0x71, 0xFF]);
    }

    #[test]
    fn test_chunks_cover_range() {
        for (size, threads) in [(10, 3), (7, 8), (1 << 20, 6), (5, 1)] {
            let ranges = chunks(size, threads).collect::<Vec<_>>();
            assert_eq!(ranges.first().map(|r| r.start), Some(0));
            assert_eq!(ranges.last().map(|r| r.end), Some(size));
            assert!(ranges.windows(2).all(|w| w[0].end == w[1].start));
        }
    }

    #[test_log::test]
    fn test_edge_flip_matches_plain_bfs() {
        let spec = PatternDbKind::EdgeFlip.spec();
        let db = generate(spec, 1);
        assert_eq!(db.max_depth(), 7);
        assert_eq!(db.populations().iter().sum::<u64>(), 2048);

        let table = MoveTable::generate(Coord::EdgeFlip);
        let mut distance = vec![u8::MAX; 2048];
        distance[0] = 0;
        let mut queue = VecDeque::from([0]);
        while let Some(value) = queue.pop_front() {
            for move_ in MoveSet::ALL.iter() {
                let next = table.apply(value, move_);
                if distance[next as usize] == u8::MAX {
                    distance[next as usize] = distance[value as usize] + 1;
                    queue.push_back(next);
                }
            }
        }
        for (value, &d) in distance.iter().enumerate() {
            assert_eq!(db.lookup(value as u32), d);
        }
    }

    #[test_log::test]
    fn test_parallel_build_is_identical() {
        let spec = PatternDbKind::TwistSlice.spec();
        let sequential = generate(spec, 1);
        let parallel = generate(spec, 4);
        assert_eq!(sequential.as_bytes(), parallel.as_bytes());
        assert_eq!(sequential.populations(), parallel.populations());
    }

    #[test_log::test]
    fn test_cap_is_a_lower_bound() {
        let full = generate(PatternDbKind::TwistSlice.spec(), 1);
        let capped = generate(PatternDbKind::TwistSlice.spec().with_cap(5), 1);
        assert_eq!(capped.max_depth(), 5);
        assert_eq!(
            capped.populations().iter().sum::<u64>(),
            u64::from(PatternDbKind::TwistSlice.spec().size())
        );
        for index in 0..PatternDbKind::TwistSlice.spec().size() {
            assert_eq!(capped.lookup(index), full.lookup(index).min(5));
        }
    }

    #[test_log::test]
    fn test_lookup_pair_agrees_with_moves() {
        let spec = PatternDbKind::FlipSlice.spec();
        let db = generate(spec, 2);
        assert_eq!(db.lookup_pair(0, 0), 0);
        let state = CubieState::from_moves(&[Move::F]);
        let h = db.lookup_pair(
            Coord::EdgeFlip.encode(&state),
            Coord::SliceCombination.encode(&state),
        );
        assert_eq!(h, 1);
    }

    #[test]
    fn test_unreachable_entries_take_the_cap() {
        // Only the 96 half-turn corner permutations are reachable.
        let db = generate(PatternDbKind::G3Corners.spec(), 1);
        assert_eq!(db.populations().iter().sum::<u64>(), 96);
        let odd = Coord::CornerPermutation.encode(&CubieState::from_moves(&[Move::R]));
        assert_eq!(db.lookup(odd), MAX_CAP);
    }

    #[test]
    fn test_generate_rejects_wrong_move_table() {
        let spec = PatternDbKind::FlipSlice.spec();
        let flip = MoveTable::generate(Coord::EdgeFlip);
        assert!(matches!(
            PatternDatabase::generate(spec, &flip, None, 1),
            Err(TableError::Missing(_))
        ));
        let slice = MoveTable::generate(Coord::SlicePermutation);
        assert!(matches!(
            PatternDatabase::generate(spec, &flip, Some(&slice), 1),
            Err(TableError::Missing(_))
        ));
    }

    #[test]
    fn test_from_raw_validates() {
        let spec = PatternDbKind::DominoSlice.spec();
        let db = generate(spec, 1);
        let rebuilt =
            PatternDatabase::from_raw(spec, db.as_bytes().to_vec(), *db.populations()).unwrap();
        assert_eq!(rebuilt, db);
        assert!(matches!(
            PatternDatabase::from_raw(spec, vec![0; 3], *db.populations()),
            Err(TableError::LoadMismatch { .. })
        ));
        let capped = spec.with_cap(2);
        assert!(matches!(
            PatternDatabase::from_raw(capped, db.as_bytes().to_vec(), *db.populations()),
            Err(TableError::LoadMismatch { .. })
        ));
    }
}
