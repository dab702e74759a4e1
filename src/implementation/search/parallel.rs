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

//! This module provides the implementation of the parallel search engines.
//! All four of them follow the same hybrid scheme: a short sequential breadth
//! first expansion grows a seed frontier of at least `workers` nodes, the
//! seeds are then fanned out across a bounded pool of worker threads, and
//! each worker repeatedly runs short slices of the matching sequential engine
//! against the global budget.
//!
//! The only object shared across the workers is the global control (behind
//! its single mutex). Everything else -- the frontiers, the slice-local
//! controls -- is worker private: a worker keeps the frontier of its seed
//! alive across slices and only rebuilds the *control*, so that slicing
//! never revisits a node. A slice lasts at most one second, which bounds the
//! interval at which the remaining global budget and the global incumbent
//! are re-read.

use std::any::Any;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::{
    BiLevelQueue, Branching, Fifo, Frontier, Lifo, Mutable, SearchControl, SearchError,
    SharedControl, State,
};

use super::bfs::{breadth_first, breadth_first_loop, breadth_first_mutable, breadth_first_mutable_loop};
use super::check_positive;
use super::dfs::{depth_first_loop, depth_first_mutable_loop, seed_choices};

/// The upper bound on the runtime of one worker slice: after at most this
/// long, a worker goes back to the global control to renegotiate its budget
/// and refresh its pruning bound.
const SLICE_RUNTIME: Duration = Duration::from_secs(1);

/// The state which is shared among the running workers: the global control
/// behind its mutex, the queue of seeds remaining to be claimed, and the slot
/// recording the first fault raised by user code (if any).
struct Shared<'a, S: State> {
    control: &'a SharedControl<S>,
    seeds: Mutex<Fifo<(usize, S)>>,
    fault: Mutex<Option<Box<dyn Any + Send>>>,
}

/// The workload a worker can get from the shared state.
enum WorkLoad<S> {
    /// There is no seed left to be claimed: you can safely terminate.
    Complete,
    /// The work must stop: a limit was hit, the search was cancelled, or a
    /// sibling worker faulted.
    Aborted,
    /// The seed to process, together with its depth in the global tree.
    WorkItem { depth: usize, state: S },
}

impl<'a, S: State> Shared<'a, S> {
    fn new(control: &'a SharedControl<S>, seeds: Fifo<(usize, S)>) -> Self {
        Shared { control, seeds: Mutex::new(seeds), fault: Mutex::new(None) }
    }

    /// Claims the next seed, unless the search must wind down.
    fn next_seed(&self) -> WorkLoad<S> {
        if self.fault.lock().is_some() || self.control.should_stop() {
            return WorkLoad::Aborted;
        }
        match self.seeds.lock().pop() {
            Some((depth, state)) => WorkLoad::WorkItem { depth, state },
            None => WorkLoad::Complete,
        }
    }

    /// Builds the control for the next slice of work on the given seed:
    /// a short runtime slice, the global cancellation token, the remaining
    /// global node budget, and the quality of the global incumbent as the
    /// pruning bound. Returns `None` when the global control already
    /// commands a stop, in which case no further slice must run.
    fn slice_control(&self, seed: &S) -> Option<SearchControl<S>> {
        let global = self.control.lock();
        if global.should_stop() {
            return None;
        }
        let slice_end = Instant::now() + SLICE_RUNTIME;
        let deadline = global.deadline().map_or(slice_end, |d| d.min(slice_end));
        let mut local = SearchControl::new(seed.clone())
            .with_node_limit(global.remaining_budget())
            .with_deadline(deadline);
        if let Some(token) = global.cancellation() {
            local = local.with_cancellation(token.clone());
        }
        if let Some(quality) = global.best_quality() {
            local = local.with_quality_bound(quality.clone());
        }
        Some(local)
    }

    /// Hands the outcome of a finished slice back to the global control.
    fn merge_slice(&self, local: SearchControl<S>) {
        log::trace!("merging a slice of {} nodes", local.visited_nodes());
        self.control.merge(local);
    }
}

/// Spawns `threads` scoped workers, each repeatedly claiming a seed and
/// processing it with `process_seed`. A panic escaping user code in one
/// worker marks the global control stopped (so that the siblings wind down
/// at their next check) and is re-raised by the caller once every worker
/// has joined; only the first fault is kept.
fn fan_out<S, W>(shared: &Shared<'_, S>, threads: usize, process_seed: W)
where
    S: State + Send,
    S::Quality: Send,
    W: Fn(usize, S) + Sync,
{
    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                let worker = || loop {
                    match shared.next_seed() {
                        WorkLoad::Complete | WorkLoad::Aborted => break,
                        WorkLoad::WorkItem { depth, state } => process_seed(depth, state),
                    }
                };
                if let Err(payload) = catch_unwind(AssertUnwindSafe(worker)) {
                    shared.control.mark_stopped();
                    let mut fault = shared.fault.lock();
                    if fault.is_none() {
                        *fault = Some(payload);
                    }
                }
            });
        }
    });
}

/// Re-raises the first worker fault, if one was recorded.
fn resurface_fault(fault: Mutex<Option<Box<dyn Any + Send>>>) {
    if let Some(payload) = fault.into_inner() {
        resume_unwind(payload);
    }
}

/// Runs a parallel depth first search over branching states, using up to
/// `workers` threads. The seed frontier is grown with a sequential breadth
/// first expansion; the search returns directly when seeding already hit a
/// limit, exhausted the tree, or reached the depth bound. The control is
/// taken by value (it spends the fan-out phase inside a [`SharedControl`])
/// and handed back with the merged outcome of all workers.
pub fn parallel_depth_first<S>(
    control: SearchControl<S>,
    filter_width: usize,
    depth_limit: usize,
    workers: usize,
) -> Result<SearchControl<S>, SearchError>
where
    S: Branching + Send,
    S::Quality: Send,
{
    check_positive(workers, "workers")?;
    let mut control = control;
    let (seed_depth, seeds) = breadth_first(&mut control, filter_width, depth_limit, workers)?;
    if seeds.is_empty() || seed_depth >= depth_limit || control.should_stop() {
        return Ok(control);
    }
    log::debug!("fanning out {} seeds at depth {}", seeds.len(), seed_depth);

    let threads = workers.min(seeds.len());
    let shared_control = SharedControl::new(control);
    let shared = Shared::new(&shared_control, seeds);
    fan_out(&shared, threads, |depth, seed: S| {
        let mut frontier = Lifo::new();
        frontier.push((depth, seed.clone()));
        while !frontier.is_empty() {
            let Some(mut local) = shared.slice_control(&seed) else {
                return;
            };
            depth_first_loop(&mut local, &mut frontier, filter_width, depth_limit, usize::MAX);
            local.finish();
            shared.merge_slice(local);
        }
    });
    resurface_fault(shared.fault);
    Ok(shared_control.into_inner())
}

/// Runs a parallel depth first search over mutable states. Each worker owns
/// one physical state per seed (a clone handed over by the seeding phase)
/// and drives it exactly like the sequential in-place engine, so the
/// per-worker memory stays proportional to depth times branching factor.
pub fn parallel_depth_first_mutable<S>(
    control: SearchControl<S>,
    filter_width: usize,
    depth_limit: usize,
    workers: usize,
) -> Result<SearchControl<S>, SearchError>
where
    S: Mutable + Send,
    S::Quality: Send,
{
    check_positive(workers, "workers")?;
    let mut control = control;
    let (seed_depth, seeds) =
        breadth_first_mutable(&mut control, filter_width, depth_limit, workers)?;
    if seeds.is_empty() || seed_depth >= depth_limit || control.should_stop() {
        return Ok(control);
    }
    log::debug!("fanning out {} seeds at depth {}", seeds.len(), seed_depth);

    let threads = workers.min(seeds.len());
    let shared_control = SharedControl::new(control);
    let shared = Shared::new(&shared_control, seeds);
    fan_out(&shared, threads, |depth, seed: S| {
        let mut state = seed.clone();
        let mut state_depth = depth;
        let mut frontier = Lifo::new();
        if state_depth < depth_limit {
            seed_choices(&state, state_depth, &mut frontier, filter_width);
        }
        while !frontier.is_empty() {
            let Some(mut local) = shared.slice_control(&seed) else {
                return;
            };
            depth_first_mutable_loop(
                &mut local,
                &mut state,
                &mut state_depth,
                &mut frontier,
                filter_width,
                depth_limit,
                usize::MAX,
            );
            local.finish();
            shared.merge_slice(local);
        }
    });
    resurface_fault(shared.fault);
    Ok(shared_control.into_inner())
}

/// Runs a parallel breadth first search over branching states. On top of the
/// merged control, the caller gets back the concatenation of the workers'
/// residual queues (with their summed retrieved count), i.e. the same single
/// level view a sequential breadth first search would return.
pub fn parallel_breadth_first<S>(
    control: SearchControl<S>,
    filter_width: usize,
    depth_limit: usize,
    nodes_reached: usize,
    workers: usize,
) -> Result<(SearchControl<S>, Fifo<(usize, S)>), SearchError>
where
    S: Branching + Send,
    S::Quality: Send,
{
    check_positive(workers, "workers")?;
    check_positive(nodes_reached, "nodes_reached")?;
    let mut control = control;
    let seed_target = workers.min(nodes_reached);
    let (seed_depth, seeds) =
        breadth_first(&mut control, filter_width, depth_limit, seed_target)?;
    if seeds.is_empty()
        || seed_depth >= depth_limit
        || seeds.len() >= nodes_reached
        || control.should_stop()
    {
        return Ok((control, seeds));
    }
    log::debug!("fanning out {} seeds at depth {}", seeds.len(), seed_depth);

    let threads = workers.min(seeds.len());
    let shared_control = SharedControl::new(control);
    let shared = Shared::new(&shared_control, seeds);
    let output = Mutex::new(Fifo::new());
    fan_out(&shared, threads, |depth, seed: S| {
        let mut queue = BiLevelQueue::new();
        queue.push_next((depth, seed.clone()));
        queue.swap_queues();
        let mut depth = depth;
        loop {
            if queue.len() == 0
                || depth >= depth_limit
                || queue.current_len() >= nodes_reached
            {
                break;
            }
            let Some(mut local) = shared.slice_control(&seed) else {
                break;
            };
            breadth_first_loop(&mut local, &mut queue, &mut depth, filter_width, depth_limit, nodes_reached);
            local.finish();
            shared.merge_slice(local);
        }
        if queue.len() > 0 {
            output.lock().append(queue.into_single_level());
        }
    });
    resurface_fault(shared.fault);
    Ok((shared_control.into_inner(), output.into_inner()))
}

/// Runs a parallel breadth first search over mutable states; see
/// [`parallel_breadth_first`].
pub fn parallel_breadth_first_mutable<S>(
    control: SearchControl<S>,
    filter_width: usize,
    depth_limit: usize,
    nodes_reached: usize,
    workers: usize,
) -> Result<(SearchControl<S>, Fifo<(usize, S)>), SearchError>
where
    S: Mutable + Send,
    S::Quality: Send,
{
    check_positive(workers, "workers")?;
    check_positive(nodes_reached, "nodes_reached")?;
    let mut control = control;
    let seed_target = workers.min(nodes_reached);
    let (seed_depth, seeds) =
        breadth_first_mutable(&mut control, filter_width, depth_limit, seed_target)?;
    if seeds.is_empty()
        || seed_depth >= depth_limit
        || seeds.len() >= nodes_reached
        || control.should_stop()
    {
        return Ok((control, seeds));
    }
    log::debug!("fanning out {} seeds at depth {}", seeds.len(), seed_depth);

    let threads = workers.min(seeds.len());
    let shared_control = SharedControl::new(control);
    let shared = Shared::new(&shared_control, seeds);
    let output = Mutex::new(Fifo::new());
    fan_out(&shared, threads, |depth, seed: S| {
        let mut queue = BiLevelQueue::new();
        queue.push_next((depth, seed.clone()));
        queue.swap_queues();
        let mut depth = depth;
        loop {
            if queue.len() == 0
                || depth >= depth_limit
                || queue.current_len() >= nodes_reached
            {
                break;
            }
            let Some(mut local) = shared.slice_control(&seed) else {
                break;
            };
            breadth_first_mutable_loop(&mut local, &mut queue, &mut depth, filter_width, depth_limit, nodes_reached);
            local.finish();
            shared.merge_slice(local);
        }
        if queue.len() > 0 {
            output.lock().append(queue.into_single_level());
        }
    });
    resurface_fault(shared.fault);
    Ok((shared_control.into_inner(), output.into_inner()))
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

/// Unlike the rest of the library, the parallel engines are not unit tested
/// step by step (interleavings make that pointless). Instead, their outcomes
/// are compared against those of the sequential engines on instances with a
/// known optimum.

#[cfg(test)]
mod test_parallel {
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::Arc;

    use crate::search::bfs::breadth_first;
    use crate::search::dfs::{depth_first, depth_first_mutable};
    use crate::search::parallel::{
        parallel_breadth_first, parallel_breadth_first_mutable, parallel_depth_first,
        parallel_depth_first_mutable,
    };
    use crate::*;

    /// The 0/1 knapsack as a branching state: the instance data is shared
    /// behind an `Arc` so that cloning a node stays cheap.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Knapsack {
        items: Arc<Vec<(usize, usize)>>, // (weight, profit)
        capacity: usize,
        packed: usize,
        depth: usize,
    }
    impl Knapsack {
        fn new(items: Vec<(usize, usize)>, capacity: usize) -> Self {
            Knapsack { items: Arc::new(items), capacity, packed: 0, depth: 0 }
        }
    }
    impl State for Knapsack {
        type Quality = Maximize<usize>;
        fn quality(&self) -> Option<Self::Quality> {
            (self.depth == self.items.len()).then(|| Maximize(self.packed))
        }
        fn is_terminal(&self) -> bool {
            self.depth == self.items.len()
        }
    }
    impl Branching for Knapsack {
        fn branches(&self) -> Box<dyn Iterator<Item = Self> + '_> {
            if self.is_terminal() {
                return Box::new(std::iter::empty());
            }
            let (weight, profit) = self.items[self.depth];
            let mut children = vec![];
            if weight <= self.capacity {
                let mut take = self.clone();
                take.capacity -= weight;
                take.packed += profit;
                take.depth += 1;
                children.push(take);
            }
            let mut leave = self.clone();
            leave.depth += 1;
            children.push(leave);
            Box::new(children.into_iter())
        }
    }

    /// The same knapsack, as a mutable state.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct KnapsackMut {
        items: Arc<Vec<(usize, usize)>>,
        capacity: usize,
        packed: usize,
        decisions: Vec<bool>,
    }
    impl KnapsackMut {
        fn new(items: Vec<(usize, usize)>, capacity: usize) -> Self {
            KnapsackMut { items: Arc::new(items), capacity, packed: 0, decisions: vec![] }
        }
    }
    impl State for KnapsackMut {
        type Quality = Maximize<usize>;
        fn quality(&self) -> Option<Self::Quality> {
            (self.decisions.len() == self.items.len()).then(|| Maximize(self.packed))
        }
        fn is_terminal(&self) -> bool {
            self.decisions.len() == self.items.len()
        }
    }
    impl Mutable for KnapsackMut {
        type Choice = bool;
        fn choices(&self) -> Box<dyn Iterator<Item = bool> + '_> {
            if self.is_terminal() {
                return Box::new(std::iter::empty());
            }
            let fits = self.items[self.decisions.len()].0 <= self.capacity;
            Box::new(fits.then_some(true).into_iter().chain(std::iter::once(false)))
        }
        fn apply(&mut self, choice: bool) {
            let (weight, profit) = self.items[self.decisions.len()];
            if choice {
                self.capacity -= weight;
                self.packed += profit;
            }
            self.decisions.push(choice);
        }
        fn undo_last(&mut self) {
            let choice = self.decisions.pop().unwrap();
            let (weight, profit) = self.items[self.decisions.len()];
            if choice {
                self.capacity += weight;
                self.packed -= profit;
            }
        }
    }

    fn ten_items() -> Vec<(usize, usize)> {
        vec![
            (10, 60),
            (45, 210),
            (20, 12),
            (4, 5),
            (20, 100),
            (30, 120),
            (50, 110),
            (5, 14),
            (12, 20),
            (7, 9),
        ]
    }

    #[test]
    fn it_agrees_with_the_sequential_search_on_an_exhausted_tree() {
        let root = Knapsack::new(ten_items(), 50);

        let mut sequential = SearchControl::new(root.clone());
        depth_first(&mut sequential, usize::MAX, usize::MAX, usize::MAX).unwrap();

        let parallel =
            parallel_depth_first(SearchControl::new(root), usize::MAX, usize::MAX, 4)
                .unwrap();

        assert_eq!(sequential.best_quality(), parallel.best_quality());
        assert_eq!(sequential.visited_nodes(), parallel.visited_nodes());
    }
    #[test]
    fn the_mutable_variant_agrees_with_the_sequential_search_too() {
        let root = KnapsackMut::new(ten_items(), 50);

        let mut in_place = root.clone();
        let mut sequential = SearchControl::new(root.clone());
        depth_first_mutable(
            &mut sequential,
            &mut in_place,
            usize::MAX,
            usize::MAX,
            usize::MAX,
        )
        .unwrap();

        let parallel = parallel_depth_first_mutable(
            SearchControl::new(root),
            usize::MAX,
            usize::MAX,
            4,
        )
        .unwrap();

        assert_eq!(sequential.best_quality(), parallel.best_quality());
        assert_eq!(sequential.visited_nodes(), parallel.visited_nodes());
    }
    #[test]
    fn the_node_budget_is_honored_and_the_incumbent_matches_the_sequential_one() {
        // 5 items: the whole tree is smaller than the budget, so both the
        // sequential and the parallel searches exhaust it
        let items = vec![(2, 3), (3, 4), (4, 5), (5, 6), (6, 7)];
        let root = KnapsackMut::new(items, 10);

        let mut in_place = root.clone();
        let mut sequential = SearchControl::new(root.clone()).with_node_limit(100);
        depth_first_mutable(
            &mut sequential,
            &mut in_place,
            usize::MAX,
            usize::MAX,
            usize::MAX,
        )
        .unwrap();

        let parallel = parallel_depth_first_mutable(
            SearchControl::new(root).with_node_limit(100),
            usize::MAX,
            usize::MAX,
            4,
        )
        .unwrap();

        assert!(parallel.visited_nodes() <= 100);
        assert_eq!(Some(&Maximize(13)), parallel.best_quality());
        assert_eq!(sequential.best_quality(), parallel.best_quality());
    }
    #[test]
    fn the_breadth_first_variant_agrees_with_the_sequential_search() {
        let root = Knapsack::new(ten_items(), 50);

        let mut sequential = SearchControl::new(root.clone());
        let (_, residue) =
            breadth_first(&mut sequential, usize::MAX, usize::MAX, usize::MAX).unwrap();
        assert!(residue.is_empty());

        let (parallel, residue) = parallel_breadth_first(
            SearchControl::new(root),
            usize::MAX,
            usize::MAX,
            usize::MAX,
            4,
        )
        .unwrap();

        assert!(residue.is_empty());
        assert_eq!(sequential.best_quality(), parallel.best_quality());
        assert_eq!(sequential.visited_nodes(), parallel.visited_nodes());
    }
    #[test]
    fn a_low_nodes_reached_threshold_short_circuits_the_fan_out() {
        let root = Knapsack::new(ten_items(), 50);
        let (control, residue) = parallel_breadth_first(
            SearchControl::new(root),
            usize::MAX,
            usize::MAX,
            2,
            4,
        )
        .unwrap();
        // the seeding alone met the threshold: 1 root + 2 children visited
        assert_eq!(3, control.visited_nodes());
        assert_eq!(2, residue.len());
    }
    #[test]
    fn the_mutable_breadth_first_variant_agrees_with_the_sequential_search() {
        let root = KnapsackMut::new(ten_items(), 50);

        let mut in_place = root.clone();
        let mut sequential = SearchControl::new(root.clone());
        depth_first_mutable(
            &mut sequential,
            &mut in_place,
            usize::MAX,
            usize::MAX,
            usize::MAX,
        )
        .unwrap();

        let (parallel, residue) = parallel_breadth_first_mutable(
            SearchControl::new(root),
            usize::MAX,
            usize::MAX,
            usize::MAX,
            4,
        )
        .unwrap();

        assert!(residue.is_empty());
        assert_eq!(sequential.best_quality(), parallel.best_quality());
        assert_eq!(sequential.visited_nodes(), parallel.visited_nodes());
    }
    #[test]
    fn a_zero_workers_count_is_rejected() {
        let root = Knapsack::new(ten_items(), 50);
        assert!(matches!(
            parallel_depth_first(SearchControl::new(root), usize::MAX, usize::MAX, 0),
            Err(SearchError::InvalidArgument("workers"))
        ));
    }

    /// A tree which panics when a node of depth 2 is expanded; the seeding
    /// phase only ever expands shallower nodes, so the fault is guaranteed
    /// to be raised inside a worker thread.
    #[derive(Clone)]
    struct Faulty {
        depth: usize,
    }
    impl State for Faulty {
        type Quality = Maximize<usize>;
        fn quality(&self) -> Option<Self::Quality> {
            None
        }
        fn is_terminal(&self) -> bool {
            self.depth == 4
        }
    }
    impl Branching for Faulty {
        fn branches(&self) -> Box<dyn Iterator<Item = Self> + '_> {
            assert!(self.depth != 2, "user code fault");
            let depth = self.depth + 1;
            Box::new((0..2).map(move |_| Faulty { depth }))
        }
    }

    #[test]
    fn a_worker_fault_is_resurfaced_after_all_workers_joined() {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            parallel_depth_first(
                SearchControl::new(Faulty { depth: 0 }),
                usize::MAX,
                usize::MAX,
                2,
            )
        }));
        assert!(outcome.is_err());
    }
}
