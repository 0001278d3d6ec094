//! Iterative deepening A* over any [`SearchSpace`].
//!
//! The depth-first part of each iteration runs on an explicit frame stack
//! instead of recursion: `frames[i]` is the parent of `frames[i + 1]`, and
//! the moves taken along the stack spell out the current path.

use crate::{canonical_fsm::{CanonicalFsm, CanonicalFsmState}, error::SearchError, working};
use cube_core::Move;
use log::debug;
use std::{
    fmt,
    time::{Duration, Instant},
};

/// How often, in generated nodes, the deadline is checked.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

pub trait SearchSpace {
    type Node: Copy + fmt::Debug;

    /// The moves to try at every node, in order.
    fn moves(&self) -> &[Move];

    fn apply(&self, node: &Self::Node, move_: Move) -> Self::Node;

    /// An admissible estimate of the remaining distance.
    fn heuristic(&self, node: &Self::Node) -> u8;

    fn is_goal(&self, node: &Self::Node) -> bool;

    fn canonical_fsm(&self) -> &CanonicalFsm;
}

/// The result of one bounded iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Solution(Vec<Move>),
    /// No accepted goal within the bound; this is the smallest `f` that
    /// exceeded it.
    ContinueWithBound(u8),
    /// Nothing was pruned by the bound, or the next bound does not fit in a
    /// `u8`, so no larger bound can help.
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_depth: u8,
    pub deadline: Option<Instant>,
}

impl SearchLimits {
    #[must_use]
    pub fn new(max_depth: u8, timeout: Option<Duration>) -> Self {
        Self {
            max_depth,
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub iterations: u32,
    pub final_bound: u8,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Frame<N> {
    node: N,
    g: u8,
    fsm: CanonicalFsmState,
    next_move: usize,
    move_taken: Option<Move>,
}

enum Visit {
    Prune,
    Goal,
    Expand,
}

pub struct IdaSearch<'a, S: SearchSpace> {
    space: &'a S,
    limits: SearchLimits,
    stats: SearchStats,
    frames: Vec<Frame<S::Node>>,
    start: Instant,
}

impl<'a, S: SearchSpace> IdaSearch<'a, S> {
    #[must_use]
    pub fn new(space: &'a S, limits: SearchLimits) -> Self {
        Self {
            space,
            limits,
            stats: SearchStats::default(),
            frames: Vec::with_capacity(usize::from(limits.max_depth) + 1),
            start: Instant::now(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    fn check_deadline(&self) -> Result<(), SearchError> {
        match self.limits.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(SearchError::Timeout(self.start.elapsed()))
            }
            _ => Ok(()),
        }
    }

    fn visit(&self, node: &S::Node, g: u8, bound: u8, next_bound: &mut Option<u16>) -> Visit {
        let goal = self.space.is_goal(node);
        // A node that is not the goal is at least one move away.
        let h = if goal { 0 } else { self.space.heuristic(node).max(1) };
        // Wide enough that an expanded node always has `g < u8::MAX`.
        let f = u16::from(g) + u16::from(h);
        if f > u16::from(bound) {
            *next_bound = Some(next_bound.map_or(f, |next| next.min(f)));
            Visit::Prune
        } else if goal {
            // Goals are leaves. One closer than the bound was already
            // offered in an earlier iteration.
            if g == bound { Visit::Goal } else { Visit::Prune }
        } else {
            Visit::Expand
        }
    }

    /// One depth-first pass that only offers goals exactly `bound` moves
    /// from `root` to `accept`. A goal `accept` rejects is skipped and the
    /// pass continues.
    ///
    /// # Errors
    ///
    /// Fails with [`SearchError::Timeout`] once the deadline passes.
    pub fn search_bound<F>(
        &mut self,
        root: S::Node,
        bound: u8,
        accept: &mut F,
    ) -> Result<SearchOutcome, SearchError>
    where
        F: FnMut(&[Move], &S::Node) -> bool,
    {
        self.stats.iterations += 1;
        self.stats.final_bound = bound;
        self.frames.clear();
        let mut next_bound = None;
        let mut path = Vec::with_capacity(usize::from(bound));

        match self.visit(&root, 0, bound, &mut next_bound) {
            Visit::Goal if accept(&[], &root) => return Ok(SearchOutcome::Solution(vec![])),
            Visit::Goal | Visit::Prune => {}
            Visit::Expand => self.frames.push(Frame {
                node: root,
                g: 0,
                fsm: CanonicalFsmState::default(),
                next_move: 0,
                move_taken: None,
            }),
        }

        while let Some(top) = self.frames.last_mut() {
            let Some(&move_) = self.space.moves().get(top.next_move) else {
                self.frames.pop();
                continue;
            };
            top.next_move += 1;
            let Some(fsm) = self
                .space
                .canonical_fsm()
                .next_state(top.fsm, move_.face().index())
            else {
                continue;
            };
            let g = top.g + 1;
            let child = self.space.apply(&top.node, move_);

            self.stats.nodes += 1;
            if self.stats.nodes % DEADLINE_CHECK_INTERVAL == 0 {
                self.check_deadline()?;
            }

            match self.visit(&child, g, bound, &mut next_bound) {
                Visit::Prune => {}
                Visit::Goal => {
                    path.clear();
                    path.extend(self.frames.iter().filter_map(|frame| frame.move_taken));
                    path.push(move_);
                    if accept(&path, &child) {
                        return Ok(SearchOutcome::Solution(path));
                    }
                }
                Visit::Expand => self.frames.push(Frame {
                    node: child,
                    g,
                    fsm,
                    next_move: 0,
                    move_taken: Some(move_),
                }),
            }
        }

        // A bound past `u8::MAX` is past any maximum depth.
        Ok(next_bound
            .and_then(|next| u8::try_from(next).ok())
            .map_or(SearchOutcome::Exhausted, SearchOutcome::ContinueWithBound))
    }

    /// Finds the shortest path to a goal.
    ///
    /// # Errors
    ///
    /// See [`IdaSearch::solve_with`].
    pub fn solve(&mut self, root: S::Node) -> Result<Vec<Move>, SearchError> {
        self.solve_with(root, |_, _| true)
    }

    /// Deepens the bound from the root's estimate until `accept` takes a
    /// goal. Goals are offered in order of increasing length.
    ///
    /// # Errors
    ///
    /// Fails with [`SearchError::Exhausted`] when the bound would pass the
    /// maximum depth, and with [`SearchError::Timeout`] when the deadline
    /// passes first.
    pub fn solve_with<F>(&mut self, root: S::Node, mut accept: F) -> Result<Vec<Move>, SearchError>
    where
        F: FnMut(&[Move], &S::Node) -> bool,
    {
        self.start = Instant::now();
        self.stats = SearchStats::default();

        let mut bound = if self.space.is_goal(&root) {
            0
        } else {
            self.space.heuristic(&root).max(1)
        };
        let result = loop {
            if bound > self.limits.max_depth {
                break Err(SearchError::Exhausted(self.limits.max_depth));
            }
            if let Err(err) = self.check_deadline() {
                break Err(err);
            }

            debug!(working!("Searching depth limit {}..."), bound);
            let iteration_start = Instant::now();
            let nodes_before = self.stats.nodes;
            let outcome = self.search_bound(root, bound, &mut accept);
            debug!(
                working!("Traversed {} nodes in {:.3}s"),
                self.stats.nodes - nodes_before,
                iteration_start.elapsed().as_secs_f64()
            );

            match outcome {
                Ok(SearchOutcome::Solution(path)) => break Ok(path),
                Ok(SearchOutcome::ContinueWithBound(next)) => bound = next,
                Ok(SearchOutcome::Exhausted) => {
                    break Err(SearchError::Exhausted(self.limits.max_depth));
                }
                Err(err) => break Err(err),
            }
        };
        self.stats.elapsed = self.start.elapsed();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::{CubieState, moves::parse_sequence};

    /// Whole cube states with no heuristic, only usable a few moves deep.
    struct Blind {
        moves: Vec<Move>,
        fsm: CanonicalFsm,
    }

    impl Blind {
        fn new() -> Self {
            Self {
                moves: Move::ALL.to_vec(),
                fsm: CanonicalFsm::faces(),
            }
        }
    }

    impl SearchSpace for Blind {
        type Node = CubieState;

        fn moves(&self) -> &[Move] {
            &self.moves
        }

        fn apply(&self, node: &CubieState, move_: Move) -> CubieState {
            node.apply(move_)
        }

        fn heuristic(&self, _: &CubieState) -> u8 {
            0
        }

        fn is_goal(&self, node: &CubieState) -> bool {
            node.is_solved()
        }

        fn canonical_fsm(&self) -> &CanonicalFsm {
            &self.fsm
        }
    }

    fn scrambled(moves: &str) -> CubieState {
        CubieState::from_moves(&parse_sequence(moves).unwrap())
    }

    #[test_log::test]
    fn test_finds_shortest_path() {
        let space = Blind::new();
        let mut search = IdaSearch::new(&space, SearchLimits::new(4, None));
        let root = scrambled("R U F'");
        let path = search.solve(root).unwrap();
        assert_eq!(path, parse_sequence("F U' R'").unwrap());
        assert!(root.apply_sequence(&path).is_solved());
        let stats = search.stats();
        assert_eq!(stats.final_bound, 3);
        assert_eq!(stats.iterations, 3);
    }

    #[test]
    fn test_solved_root_needs_no_moves() {
        let space = Blind::new();
        let mut search = IdaSearch::new(&space, SearchLimits::new(0, None));
        assert_eq!(search.solve(CubieState::SOLVED), Ok(vec![]));
    }

    #[test]
    fn test_generates_only_canonical_sequences() {
        let space = Blind::new();
        let mut search = IdaSearch::new(&space, SearchLimits::new(3, None));
        let outcome = search
            .search_bound(scrambled("R U F L"), 3, &mut |_, _| true)
            .unwrap();
        assert_eq!(outcome, SearchOutcome::ContinueWithBound(4));
        assert_eq!(search.stats().nodes, 18 + 243 + 3240);
    }

    #[test]
    fn test_exhausts_at_max_depth() {
        let space = Blind::new();
        let mut search = IdaSearch::new(&space, SearchLimits::new(2, None));
        assert_eq!(
            search.solve(scrambled("R U F")),
            Err(SearchError::Exhausted(2))
        );
    }

    #[test]
    fn test_rejected_goals_are_skipped() {
        let space = Blind::new();
        let mut search = IdaSearch::new(&space, SearchLimits::new(3, None));
        let mut offered = vec![];
        let result = search.solve_with(scrambled("R U"), |path, node| {
            assert!(node.is_solved());
            offered.push(path.to_vec());
            false
        });
        assert_eq!(result, Err(SearchError::Exhausted(3)));
        // Each goal is offered once, at the iteration matching its length.
        assert_eq!(offered, vec![parse_sequence("U' R'").unwrap()]);
    }

    /// An endless corridor of alternating `U` and `R` turns with no goal.
    struct Corridor {
        moves: [Move; 2],
        fsm: CanonicalFsm,
    }

    impl SearchSpace for Corridor {
        type Node = u16;

        fn moves(&self) -> &[Move] {
            &self.moves
        }

        fn apply(&self, node: &u16, _: Move) -> u16 {
            node + 1
        }

        fn heuristic(&self, _: &u16) -> u8 {
            1
        }

        fn is_goal(&self, _: &u16) -> bool {
            false
        }

        fn canonical_fsm(&self) -> &CanonicalFsm {
            &self.fsm
        }
    }

    #[test]
    fn test_largest_bound_stops_at_the_last_depth() {
        let space = Corridor {
            moves: [Move::U, Move::R],
            fsm: CanonicalFsm::faces(),
        };
        let mut search = IdaSearch::new(&space, SearchLimits::new(u8::MAX, None));
        let outcome = search
            .search_bound(0, u8::MAX, &mut |_, _| false)
            .unwrap();
        assert_eq!(outcome, SearchOutcome::Exhausted);
        // Two branches from the root, then one per level down to depth 255.
        assert_eq!(search.stats().nodes, 2 * 255);

        let mut search = IdaSearch::new(&space, SearchLimits::new(u8::MAX, None));
        assert_eq!(search.solve(250), Err(SearchError::Exhausted(u8::MAX)));
    }

    #[test]
    fn test_passed_deadline_times_out() {
        let space = Blind::new();
        let limits = SearchLimits {
            max_depth: 20,
            deadline: Some(Instant::now()),
        };
        let mut search = IdaSearch::new(&space, limits);
        assert!(matches!(
            search.solve(scrambled("R U F D L B")),
            Err(SearchError::Timeout(_))
        ));
    }
}
