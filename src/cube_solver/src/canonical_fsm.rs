//! Canonical sequence finite state machine, derived primarily from Lucas
//! Garron's implementation in twsearch:
//! https://github.com/cubing/twsearch/blob/main/src/rs/_internal/canonical_fsm/canonical_fsm.rs
//!
//! Move classes are the six faces. Turning a face twice in a row is never
//! canonical, and turns of opposite faces commute, so only one of the two
//! orders (U before D, R before L, F before B) is allowed.

use cube_core::Face;
use fxhash::FxHashMap;

const MAX_NUM_MOVE_CLASSES: usize = u32::BITS as usize;

// Bit N is indexed by a move class index of N.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
struct MoveClassMask(u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CanonicalFsmState(usize);

const ILLEGAL: CanonicalFsmState = CanonicalFsmState(usize::MAX);

#[derive(Debug, Clone)]
pub struct CanonicalFsm {
    next_state_lookup: Vec<Vec<CanonicalFsmState>>,
}

impl CanonicalFsm {
    /// The machine for the cube's six face classes.
    #[must_use]
    pub fn faces() -> Self {
        Self::new(Face::ALL.len(), |a, b| {
            Face::ALL[a].axis() == Face::ALL[b].axis()
        })
    }

    /// Builds the machine for `num_move_classes` classes, where
    /// `commutes(a, b)` tells whether turns of classes `a` and `b` commute.
    ///
    /// # Panics
    ///
    /// Panics if there are more move classes than bits in a mask.
    #[must_use]
    pub fn new(num_move_classes: usize, commutes: impl Fn(usize, usize) -> bool) -> Self {
        assert!(num_move_classes <= MAX_NUM_MOVE_CLASSES);

        let all = if num_move_classes == MAX_NUM_MOVE_CLASSES {
            u32::MAX
        } else {
            (1 << num_move_classes) - 1
        };
        let mut commutes_with = vec![MoveClassMask(all); num_move_classes];
        for i in 0..num_move_classes {
            for j in 0..num_move_classes {
                if !commutes(i, j) {
                    commutes_with[i].0 &= !(1 << j);
                    commutes_with[j].0 &= !(1 << i);
                }
            }
        }

        let mut next_state_lookup = vec![];
        let mut mask_to_state = FxHashMap::default();
        mask_to_state.insert(MoveClassMask(0), CanonicalFsmState(0));
        // Indexed by state ordinal: the move classes seen so far that have not
        // been followed by a move they do not commute with.
        let mut state_to_mask = vec![MoveClassMask(0)];

        let mut queue_index = 0;
        while queue_index < state_to_mask.len() {
            let mut next_state = vec![ILLEGAL; num_move_classes];
            let dequeue_mask = state_to_mask[queue_index];
            queue_index += 1;

            for (move_class, next) in next_state.iter_mut().enumerate() {
                // A class already in the mask may not be repeated, and a class
                // may not follow a greater class it commutes with.
                let skip = (dequeue_mask.0 & commutes_with[move_class].0) >> (move_class + 1) != 0
                    || (dequeue_mask.0 >> move_class) & 1 != 0;
                if skip {
                    continue;
                }

                let mut next_bits = (dequeue_mask.0 & commutes_with[move_class].0) | (1 << move_class);

                // Of a pair of set classes with identical commutation, only
                // the higher one matters.
                for i in 0..num_move_classes {
                    if (next_bits >> i) & 1 != 0 {
                        for j in (i + 1)..num_move_classes {
                            if (next_bits >> j) & 1 != 0 && commutes_with[i] == commutes_with[j] {
                                next_bits &= !(1 << i);
                            }
                        }
                    }
                }

                let next_mask = MoveClassMask(next_bits);
                *next = *mask_to_state.entry(next_mask).or_insert_with(|| {
                    state_to_mask.push(next_mask);
                    CanonicalFsmState(state_to_mask.len() - 1)
                });
            }
            next_state_lookup.push(next_state);
        }

        Self { next_state_lookup }
    }

    #[must_use]
    pub fn next_state(
        &self,
        current: CanonicalFsmState,
        move_class: usize,
    ) -> Option<CanonicalFsmState> {
        match self.next_state_lookup[current.0][move_class] {
            ILLEGAL => None,
            state => Some(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl CanonicalFsm {
        /// Follows `classes` from the initial state, or `None` if the
        /// sequence is not canonical.
        fn walk(&self, classes: impl IntoIterator<Item = usize>) -> Option<CanonicalFsmState> {
            classes
                .into_iter()
                .try_fold(CanonicalFsmState::default(), |state, class| {
                    self.next_state(state, class)
                })
        }
    }

    #[test]
    fn test_canonical_fsm_initially_all_legal() {
        let canonical_fsm = CanonicalFsm::faces();
        for face in Face::ALL {
            assert!(
                canonical_fsm
                    .next_state(CanonicalFsmState::default(), face.index())
                    .is_some()
            );
        }
    }

    #[test]
    fn test_canonical_fsm_prevents_self() {
        let canonical_fsm = CanonicalFsm::faces();
        for face in Face::ALL {
            assert!(canonical_fsm.walk([face.index(), face.index()]).is_none());
        }
    }

    #[test]
    fn test_canonical_fsm_orders_opposite_faces() {
        let canonical_fsm = CanonicalFsm::faces();
        for face_1 in Face::ALL {
            for face_2 in Face::ALL {
                if face_1.axis() != face_2.axis() {
                    assert!(canonical_fsm.walk([face_1.index(), face_2.index()]).is_some());
                    continue;
                }
                let allows_1_after_2 = canonical_fsm.walk([face_2.index(), face_1.index()]).is_some();
                let allows_2_after_1 = canonical_fsm.walk([face_1.index(), face_2.index()]).is_some();
                if face_1 == face_2 {
                    assert!(!allows_2_after_1 && !allows_1_after_2);
                } else {
                    // Exactly one order of a commuting pair is canonical.
                    assert!(allows_1_after_2 ^ allows_2_after_1);
                }
            }
        }
        assert!(canonical_fsm.walk([Face::U.index(), Face::D.index()]).is_some());
        assert!(canonical_fsm.walk([Face::D.index(), Face::U.index()]).is_none());
    }

    #[test]
    fn test_canonical_fsm_remembers_through_commuting_moves() {
        let canonical_fsm = CanonicalFsm::faces();
        // U D U is U2 D.
        assert!(
            canonical_fsm
                .walk([Face::U.index(), Face::D.index(), Face::U.index()])
                .is_none()
        );
        // U R U is canonical.
        assert!(
            canonical_fsm
                .walk([Face::U.index(), Face::R.index(), Face::U.index()])
                .is_some()
        );
    }

    #[test]
    fn test_canonical_sequence_counts() {
        // Canonical sequences of face turns number 18, 243, 3240 at depths 1
        // to 3.
        let canonical_fsm = CanonicalFsm::faces();
        let mut frontier = vec![CanonicalFsmState::default()];
        let mut counts = vec![];
        for _ in 0..3 {
            let mut next = vec![];
            for &state in &frontier {
                for face in Face::ALL {
                    if let Some(state) = canonical_fsm.next_state(state, face.index()) {
                        // Three turn amounts per face.
                        next.extend([state; 3]);
                    }
                }
            }
            counts.push(next.len());
            frontier = next;
        }
        assert_eq!(counts, vec![18, 243, 3240]);
    }
}
