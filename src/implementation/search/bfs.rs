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

//! This module provides the implementation of the sequential breadth first
//! engines, for both state shapes. Nodes are visited in layer order; within a
//! layer, in the order of their insertion into the next-depth queue. On top
//! of the usual width and depth bounds, a breadth first search takes a
//! `nodes_reached` early-stop threshold: the expansion halts as soon as a
//! whole layer of at least that many nodes was accumulated. This is the
//! primitive the parallel engines use to grow their seed frontiers.

use crate::{BiLevelQueue, Branching, Fifo, Mutable, SearchControl, SearchError, Visit};

use super::check_positive;

/// Runs a breadth first search over branching states, from the initial state
/// of the given control. Returns the depth the expansion stopped at together
/// with a single level view of the unexpanded residue (the nodes of the
/// current layer followed by those accumulated for the next one, each paired
/// with its depth).
pub fn breadth_first<S: Branching>(
    control: &mut SearchControl<S>,
    filter_width: usize,
    depth_limit: usize,
    nodes_reached: usize,
) -> Result<(usize, Fifo<(usize, S)>), SearchError> {
    check_positive(filter_width, "filter_width")?;
    check_positive(depth_limit, "depth_limit")?;
    check_positive(nodes_reached, "nodes_reached")?;

    let root = control.initial().clone();
    let mut queue = BiLevelQueue::new();
    let mut depth = 0;
    if control.visit_node(&root) == Visit::Continue {
        queue.push_next((0, root));
        queue.swap_queues();
    }
    breadth_first_loop(control, &mut queue, &mut depth, filter_width, depth_limit, nodes_reached);
    Ok((depth, queue.into_single_level()))
}

/// The re-entrant core of the branching breadth first search. Draining the
/// current layer and swapping the queues only happens atomically with the
/// depth increment, which is what preserves the layered-order invariant; an
/// early stop in the middle of a layer leaves the queue (and the depth)
/// exactly where a later call can resume.
pub(crate) fn breadth_first_loop<S: Branching>(
    control: &mut SearchControl<S>,
    queue: &mut BiLevelQueue<(usize, S)>,
    depth: &mut usize,
    filter_width: usize,
    depth_limit: usize,
    nodes_reached: usize,
) {
    while queue.current_len() > 0
        && *depth < depth_limit
        && queue.current_len() < nodes_reached
        && !control.should_stop()
    {
        while !control.should_stop() {
            let Some((d, state)) = queue.pop_current() else {
                break;
            };
            for child in state.branches().take(filter_width) {
                if control.visit_node(&child) == Visit::Continue {
                    queue.push_next((d + 1, child));
                }
            }
        }
        if queue.current_len() == 0 {
            *depth += 1;
            queue.swap_queues();
        }
    }
}

/// Runs a breadth first search over mutable states. Because a queue of
/// mutable states cannot share one physical state, the popped state is
/// cloned before each `apply`: the memory cost is the same as with branching
/// states, proportional to the frontier size.
pub fn breadth_first_mutable<S: Mutable>(
    control: &mut SearchControl<S>,
    filter_width: usize,
    depth_limit: usize,
    nodes_reached: usize,
) -> Result<(usize, Fifo<(usize, S)>), SearchError> {
    check_positive(filter_width, "filter_width")?;
    check_positive(depth_limit, "depth_limit")?;
    check_positive(nodes_reached, "nodes_reached")?;

    let root = control.initial().clone();
    let mut queue = BiLevelQueue::new();
    let mut depth = 0;
    if control.visit_node(&root) == Visit::Continue {
        queue.push_next((0, root));
        queue.swap_queues();
    }
    breadth_first_mutable_loop(control, &mut queue, &mut depth, filter_width, depth_limit, nodes_reached);
    Ok((depth, queue.into_single_level()))
}

/// The re-entrant core of the mutable breadth first search; see
/// `breadth_first_loop`.
pub(crate) fn breadth_first_mutable_loop<S: Mutable>(
    control: &mut SearchControl<S>,
    queue: &mut BiLevelQueue<(usize, S)>,
    depth: &mut usize,
    filter_width: usize,
    depth_limit: usize,
    nodes_reached: usize,
) {
    while queue.current_len() > 0
        && *depth < depth_limit
        && queue.current_len() < nodes_reached
        && !control.should_stop()
    {
        while !control.should_stop() {
            let Some((d, state)) = queue.pop_current() else {
                break;
            };
            let choices: Vec<S::Choice> = state.choices().take(filter_width).collect();
            for choice in choices {
                let mut child = state.clone();
                child.apply(choice);
                if control.visit_node(&child) == Visit::Continue {
                    queue.push_next((d + 1, child));
                }
            }
        }
        if queue.current_len() == 0 {
            *depth += 1;
            queue.swap_queues();
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################


#[cfg(test)]
mod test_breadth_first_mutable {
    use crate::search::bfs::breadth_first_mutable;
    use crate::search::dfs::depth_first_mutable;
    use crate::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Knapsack {
        weight: Vec<usize>,
        profit: Vec<usize>,
        capacity: usize,
        packed: usize,
        decisions: Vec<bool>,
    }
    impl Knapsack {
        fn new(weight: Vec<usize>, profit: Vec<usize>, capacity: usize) -> Self {
            Knapsack { weight, profit, capacity, packed: 0, decisions: vec![] }
        }
    }
    impl State for Knapsack {
        type Quality = Maximize<usize>;
        fn quality(&self) -> Option<Self::Quality> {
            (self.decisions.len() == self.weight.len()).then(|| Maximize(self.packed))
        }
        fn is_terminal(&self) -> bool {
            self.decisions.len() == self.weight.len()
        }
    }
    impl Mutable for Knapsack {
        type Choice = bool;
        fn choices(&self) -> Box<dyn Iterator<Item = bool> + '_> {
            if self.is_terminal() {
                return Box::new(std::iter::empty());
            }
            let fits = self.weight[self.decisions.len()] <= self.capacity;
            Box::new(fits.then_some(true).into_iter().chain(std::iter::once(false)))
        }
        fn apply(&mut self, choice: bool) {
            let item = self.decisions.len();
            if choice {
                self.capacity -= self.weight[item];
                self.packed += self.profit[item];
            }
            self.decisions.push(choice);
        }
        fn undo_last(&mut self) {
            let choice = self.decisions.pop().unwrap();
            let item = self.decisions.len();
            if choice {
                self.capacity += self.weight[item];
                self.packed -= self.profit[item];
            }
        }
    }

    #[test]
    fn it_finds_the_same_optimum_as_the_depth_first_search() {
        let state = Knapsack::new(vec![2, 3, 4, 5, 6], vec![3, 4, 5, 6, 7], 10);

        let mut bfs_control = SearchControl::new(state.clone());
        let (_, residue) = breadth_first_mutable(
            &mut bfs_control,
            usize::MAX,
            usize::MAX,
            usize::MAX,
        )
        .unwrap();
        assert!(residue.is_empty());

        let mut in_place = state.clone();
        let mut dfs_control = SearchControl::new(state);
        depth_first_mutable(
            &mut dfs_control,
            &mut in_place,
            usize::MAX,
            usize::MAX,
            usize::MAX,
        )
        .unwrap();

        assert_eq!(Some(&Maximize(13)), bfs_control.best_quality());
        assert_eq!(bfs_control.best_quality(), dfs_control.best_quality());
        assert_eq!(bfs_control.visited_nodes(), dfs_control.visited_nodes());
    }
    #[test]
    fn the_threshold_hands_back_a_layer_of_clones() {
        let state = Knapsack::new(vec![1, 1, 1], vec![1, 2, 3], 3);
        let mut control = SearchControl::new(state);
        let (depth, residue) =
            breadth_first_mutable(&mut control, usize::MAX, usize::MAX, 4).unwrap();
        assert_eq!(2, depth);
        assert_eq!(4, residue.len());
        assert!(residue.iter().all(|(_, s)| s.decisions.len() == 2));
    }
}
