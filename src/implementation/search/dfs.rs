// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides the implementation of the sequential depth first
//! engines, for both state shapes. Both engines expand nodes in pre-order of
//! the natural branch order truncated to `filter_width`, honor a depth bound,
//! and may additionally be confined by a backtrack bound (one backtrack being
//! counted for every strict decrease of the popped depth, i.e. for every
//! completed subtree).

use crate::{Branching, Frontier, Lifo, Mutable, SearchControl, SearchError, Visit};

use super::check_positive;

/// Runs a depth first search over branching states, from the initial state of
/// the given control. Every produced node is offered to the control; at most
/// the first `filter_width` children of each node are considered. Nodes at
/// `depth_limit` are visited but not expanded, and the traversal halts after
/// `backtrack_limit` completed subtrees (pass `usize::MAX` for either to
/// leave it unbounded).
pub fn depth_first<S: Branching>(
    control: &mut SearchControl<S>,
    filter_width: usize,
    depth_limit: usize,
    backtrack_limit: usize,
) -> Result<(), SearchError> {
    check_positive(filter_width, "filter_width")?;
    check_positive(depth_limit, "depth_limit")?;
    check_positive(backtrack_limit, "backtrack_limit")?;

    let root = control.initial().clone();
    if control.visit_node(&root) == Visit::Discard {
        return Ok(());
    }
    let mut frontier = Lifo::new();
    frontier.push((0, root));
    depth_first_loop(control, &mut frontier, filter_width, depth_limit, backtrack_limit);
    Ok(())
}

/// The re-entrant core of the branching depth first search: it consumes the
/// given frontier until it runs dry or the control commands a stop, leaving
/// the frontier in a state from which a later call can resume (this is what
/// the parallel engine relies on to preserve frontier continuity across its
/// work slices).
pub(crate) fn depth_first_loop<S, F>(
    control: &mut SearchControl<S>,
    frontier: &mut F,
    filter_width: usize,
    depth_limit: usize,
    backtrack_limit: usize,
) where
    S: Branching,
    F: Frontier<(usize, S)>,
{
    let mut last_depth = None;
    let mut backtracks = 0;

    while !control.should_stop() && backtracks < backtrack_limit {
        let Some((depth, state)) = frontier.pop() else {
            break;
        };
        if matches!(last_depth, Some(last) if depth < last) {
            backtracks += 1;
        }
        last_depth = Some(depth);

        // reversing the retained prefix is what preserves the natural branch
        // order under the lifo traversal; the batch of children is always
        // processed whole, so that an interrupted search never drops a
        // produced node (and a resumed frontier never misses one)
        let mut children: Vec<S> = state.branches().take(filter_width).collect();
        children.reverse();
        for child in children {
            if control.visit_node(&child) == Visit::Continue && depth + 1 < depth_limit {
                frontier.push((depth + 1, child));
            }
        }
    }
}

/// Runs a depth first search over a mutable state, in place. The caller's
/// state must be the root of the search (the same state the control was
/// created from); it is moved down and up the tree with `apply`/`undo_last`
/// and is guaranteed to be fully rewound to the root when this function
/// returns, whatever the reason for returning.
///
/// The frontier holds choices rather than states, so the memory footprint is
/// proportional to depth times branching factor -- no state is ever copied,
/// except when an improving node is promoted to incumbent.
pub fn depth_first_mutable<S: Mutable>(
    control: &mut SearchControl<S>,
    state: &mut S,
    filter_width: usize,
    depth_limit: usize,
    backtrack_limit: usize,
) -> Result<(), SearchError> {
    check_positive(filter_width, "filter_width")?;
    check_positive(depth_limit, "depth_limit")?;
    check_positive(backtrack_limit, "backtrack_limit")?;

    if control.visit_node(state) == Visit::Discard {
        return Ok(());
    }
    let mut frontier = Lifo::new();
    let mut state_depth = 0;
    seed_choices(state, state_depth, &mut frontier, filter_width);
    depth_first_mutable_loop(
        control,
        state,
        &mut state_depth,
        &mut frontier,
        filter_width,
        depth_limit,
        backtrack_limit,
    );
    while state_depth > 0 {
        state.undo_last();
        state_depth -= 1;
    }
    Ok(())
}

/// Pushes the first `filter_width` choices of the given state onto the
/// frontier, in reverse order, each paired with the depth of that state.
pub(crate) fn seed_choices<S: Mutable>(
    state: &S,
    state_depth: usize,
    frontier: &mut Lifo<(usize, S::Choice)>,
    filter_width: usize,
) {
    let mut choices: Vec<S::Choice> = state.choices().take(filter_width).collect();
    choices.reverse();
    for choice in choices {
        frontier.push((state_depth, choice));
    }
}

/// The re-entrant core of the mutable depth first search. The single physical
/// state and its depth are kept in lockstep with the frontier: before a
/// popped choice is applied, the state is lazily synchronized back to the
/// depth of that choice's parent through bounded `undo_last` calls.
///
/// Invariant: whenever this function returns, `state` is the node reached by
/// applying, from the root, the path of choices that led to the last applied
/// one, and `*state_depth` is the length of that path (number of `apply`
/// calls minus number of `undo_last` calls).
pub(crate) fn depth_first_mutable_loop<S: Mutable>(
    control: &mut SearchControl<S>,
    state: &mut S,
    state_depth: &mut usize,
    frontier: &mut Lifo<(usize, S::Choice)>,
    filter_width: usize,
    depth_limit: usize,
    backtrack_limit: usize,
) {
    let mut last_depth = None;
    let mut backtracks = 0;

    while !control.should_stop() && backtracks < backtrack_limit {
        let Some((depth, choice)) = frontier.pop() else {
            break;
        };
        if matches!(last_depth, Some(last) if depth < last) {
            backtracks += 1;
        }
        last_depth = Some(depth);

        while depth < *state_depth {
            state.undo_last();
            *state_depth -= 1;
        }
        state.apply(choice);
        *state_depth += 1;

        if control.visit_node(state) == Visit::Discard {
            continue;
        }
        if *state_depth >= depth_limit {
            continue;
        }
        seed_choices(state, *state_depth, frontier, filter_width);
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################


#[cfg(test)]
mod test_depth_first_queens {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::search::dfs::depth_first;
    use crate::*;

    /// The n-queens puzzle: one queen per row, conflicts are pruned while
    /// generating the placements of the next row. Every complete placement
    /// is counted when it is produced.
    #[derive(Clone)]
    struct Queens {
        n: usize,
        rows: Vec<usize>,
        solutions: Arc<AtomicUsize>,
    }
    impl Queens {
        fn root(n: usize) -> Self {
            Queens { n, rows: vec![], solutions: Arc::default() }
        }
        fn attacked(&self, col: usize) -> bool {
            self.rows.iter().enumerate().any(|(row, &c)| {
                c == col || self.rows.len() - row == col.abs_diff(c)
            })
        }
    }
    impl State for Queens {
        type Quality = Maximize<usize>;
        fn quality(&self) -> Option<Self::Quality> {
            (self.rows.len() == self.n).then(|| Maximize(self.rows.len()))
        }
        fn is_terminal(&self) -> bool {
            self.rows.len() == self.n
        }
    }
    impl Branching for Queens {
        fn branches(&self) -> Box<dyn Iterator<Item = Self> + '_> {
            if self.is_terminal() {
                return Box::new(std::iter::empty());
            }
            let mut children = vec![];
            for col in 0..self.n {
                if !self.attacked(col) {
                    let mut child = self.clone();
                    child.rows.push(col);
                    if child.is_terminal() {
                        self.solutions.fetch_add(1, Ordering::Relaxed);
                    }
                    children.push(child);
                }
            }
            Box::new(children.into_iter())
        }
    }

    #[test]
    fn eight_queens_has_92_solutions_in_a_2057_node_tree() {
        let root = Queens::root(8);
        let solutions = Arc::clone(&root.solutions);
        let mut control = SearchControl::new(root);
        depth_first(&mut control, usize::MAX, usize::MAX, usize::MAX).unwrap();
        assert_eq!(92, solutions.load(Ordering::Relaxed));
        assert_eq!(2057, control.visited_nodes());
    }
}
