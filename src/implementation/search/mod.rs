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

//! This module provides the search engines themselves (in the `dfs`, `bfs`
//! and `parallel` submodules, whose functions operate on an explicit
//! [`SearchControl`]) along with the thin driver api most users will
//! actually interact with: one function per strategy, taking a starting
//! state and a [`SearchOptions`] bag, and returning the best state found
//! along with its quality.

pub mod bfs;
pub mod dfs;
pub mod parallel;

use std::time::Duration;

use crate::{
    Branching, CancellationToken, ImprovementCallback, Mutable, SearchControl, SearchError,
    State,
};

/// Rejects a zero where a positive parameter is expected, naming the
/// offending parameter.
pub(crate) fn check_positive(value: usize, parameter: &'static str) -> Result<(), SearchError> {
    if value == 0 {
        Err(SearchError::InvalidArgument(parameter))
    } else {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// --- OPTIONS ----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The options bag understood by the driver functions. All bounds default to
/// "unbounded" and the worker count defaults to the number of hardware
/// threads; a search configured with any finite bound is *confined*: it is
/// not guaranteed to visit the whole tree.
pub struct SearchOptions<S: State> {
    /// The maximum number of children considered per node (truncation of the
    /// natural branch order). Must be positive.
    pub filter_width: usize,
    /// The maximum depth expanded. Nodes at this depth are still visited,
    /// but not expanded. Must be positive.
    pub depth_limit: usize,
    /// The maximum number of completed subtrees before a depth first search
    /// halts. Must be positive. Ignored by the other strategies.
    pub backtrack_limit: usize,
    /// The early-stop threshold of a breadth first search: the expansion
    /// halts once a whole layer of at least this many nodes was accumulated.
    /// Must be positive. Ignored by the other strategies.
    pub nodes_reached: usize,
    /// The wall clock budget of the whole search.
    pub runtime: Option<Duration>,
    /// The maximum number of nodes the search may visit.
    pub node_limit: Option<usize>,
    /// The number of worker threads of the parallel strategies: either a
    /// positive count, or `-1` for the number of hardware threads.
    pub workers: isize,
    cancellation: Option<CancellationToken>,
    callbacks: Vec<ImprovementCallback<S>>,
}

impl<S: State> Default for SearchOptions<S> {
    fn default() -> Self {
        SearchOptions {
            filter_width: usize::MAX,
            depth_limit: usize::MAX,
            backtrack_limit: usize::MAX,
            nodes_reached: usize::MAX,
            runtime: None,
            node_limit: None,
            workers: -1,
            cancellation: None,
            callbacks: vec![],
        }
    }
}

impl<S: State> SearchOptions<S> {
    /// Creates the default, fully unbounded options.
    pub fn new() -> Self {
        Self::default()
    }
    /// Sets the maximum number of children considered per node.
    pub fn with_filter_width(mut self, filter_width: usize) -> Self {
        self.filter_width = filter_width;
        self
    }
    /// Sets the maximum expanded depth.
    pub fn with_depth_limit(mut self, depth_limit: usize) -> Self {
        self.depth_limit = depth_limit;
        self
    }
    /// Sets the backtrack bound of the depth first strategies.
    pub fn with_backtrack_limit(mut self, backtrack_limit: usize) -> Self {
        self.backtrack_limit = backtrack_limit;
        self
    }
    /// Sets the layer-size threshold of the breadth first strategies.
    pub fn with_nodes_reached(mut self, nodes_reached: usize) -> Self {
        self.nodes_reached = nodes_reached;
        self
    }
    /// Sets the wall clock budget of the search.
    pub fn with_runtime(mut self, runtime: Duration) -> Self {
        self.runtime = Some(runtime);
        self
    }
    /// Sets the visited-nodes budget of the search.
    pub fn with_node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = Some(node_limit);
        self
    }
    /// Sets the worker count of the parallel strategies (`-1` means one
    /// worker per hardware thread).
    pub fn with_workers(mut self, workers: isize) -> Self {
        self.workers = workers;
        self
    }
    /// Attaches a cooperative cancellation token to the search.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
    /// Registers a callback notified whenever the incumbent strictly
    /// improves, with the new best state and its quality.
    pub fn with_improvement_callback(
        mut self,
        callback: impl FnMut(&S, &S::Quality) + Send + 'static,
    ) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Builds the control of one top-level search, consuming the registered
    /// callbacks.
    fn build_control(&mut self, root: S) -> SearchControl<S> {
        let mut control = SearchControl::new(root);
        if let Some(runtime) = self.runtime {
            control = control.with_runtime_limit(runtime);
        }
        if let Some(node_limit) = self.node_limit {
            control = control.with_node_limit(node_limit);
        }
        if let Some(token) = self.cancellation.clone() {
            control = control.with_cancellation(token);
        }
        for callback in self.callbacks.drain(..) {
            control.push_callback(callback);
        }
        control
    }

    /// Resolves the configured worker count, defaulting to the number of
    /// hardware threads.
    fn resolved_workers(&self) -> Result<usize, SearchError> {
        match self.workers {
            -1 => Ok(num_cpus::get().max(1)),
            n if n > 0 => Ok(n as usize),
            _ => Err(SearchError::InvalidArgument("workers")),
        }
    }
}

// ----------------------------------------------------------------------------
// --- DRIVERS ----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Searches the tree rooted in `root` depth first and returns the best state
/// found with its quality, or `None` when no valued state was reached.
pub fn depth_first<S: Branching>(
    root: S,
    mut options: SearchOptions<S>,
) -> Result<Option<(S, S::Quality)>, SearchError> {
    let mut control = options.build_control(root);
    dfs::depth_first(
        &mut control,
        options.filter_width,
        options.depth_limit,
        options.backtrack_limit,
    )?;
    control.finish();
    Ok(control.into_incumbent())
}

/// Searches the tree rooted in the caller's state depth first, driving the
/// state in place. The state is fully rewound to the root upon return.
pub fn depth_first_mutable<S: Mutable>(
    state: &mut S,
    mut options: SearchOptions<S>,
) -> Result<Option<(S, S::Quality)>, SearchError> {
    let mut control = options.build_control(state.clone());
    dfs::depth_first_mutable(
        &mut control,
        state,
        options.filter_width,
        options.depth_limit,
        options.backtrack_limit,
    )?;
    control.finish();
    Ok(control.into_incumbent())
}

/// Searches the tree rooted in `root` breadth first.
pub fn breadth_first<S: Branching>(
    root: S,
    mut options: SearchOptions<S>,
) -> Result<Option<(S, S::Quality)>, SearchError> {
    let mut control = options.build_control(root);
    bfs::breadth_first(
        &mut control,
        options.filter_width,
        options.depth_limit,
        options.nodes_reached,
    )?;
    control.finish();
    Ok(control.into_incumbent())
}

/// Searches the tree rooted in `root` breadth first, cloning the mutable
/// state before each applied choice.
pub fn breadth_first_mutable<S: Mutable>(
    root: S,
    mut options: SearchOptions<S>,
) -> Result<Option<(S, S::Quality)>, SearchError> {
    let mut control = options.build_control(root);
    bfs::breadth_first_mutable(
        &mut control,
        options.filter_width,
        options.depth_limit,
        options.nodes_reached,
    )?;
    control.finish();
    Ok(control.into_incumbent())
}

/// Searches the tree rooted in `root` depth first, in parallel across the
/// configured number of workers.
pub fn parallel_depth_first<S>(
    root: S,
    mut options: SearchOptions<S>,
) -> Result<Option<(S, S::Quality)>, SearchError>
where
    S: Branching + Send,
    S::Quality: Send,
{
    let workers = options.resolved_workers()?;
    let control = options.build_control(root);
    let mut control = parallel::parallel_depth_first(
        control,
        options.filter_width,
        options.depth_limit,
        workers,
    )?;
    control.finish();
    Ok(control.into_incumbent())
}

/// Searches the tree rooted in `root` depth first, in parallel, each worker
/// driving its own physical copy of the mutable state.
pub fn parallel_depth_first_mutable<S>(
    root: S,
    mut options: SearchOptions<S>,
) -> Result<Option<(S, S::Quality)>, SearchError>
where
    S: Mutable + Send,
    S::Quality: Send,
{
    let workers = options.resolved_workers()?;
    let control = options.build_control(root);
    let mut control = parallel::parallel_depth_first_mutable(
        control,
        options.filter_width,
        options.depth_limit,
        workers,
    )?;
    control.finish();
    Ok(control.into_incumbent())
}

/// Searches the tree rooted in `root` breadth first, in parallel across the
/// configured number of workers.
pub fn parallel_breadth_first<S>(
    root: S,
    mut options: SearchOptions<S>,
) -> Result<Option<(S, S::Quality)>, SearchError>
where
    S: Branching + Send,
    S::Quality: Send,
{
    let workers = options.resolved_workers()?;
    let control = options.build_control(root);
    let (mut control, _) = parallel::parallel_breadth_first(
        control,
        options.filter_width,
        options.depth_limit,
        options.nodes_reached,
        workers,
    )?;
    control.finish();
    Ok(control.into_incumbent())
}

/// Searches the tree rooted in `root` breadth first, in parallel, cloning
/// the mutable state before each applied choice.
pub fn parallel_breadth_first_mutable<S>(
    root: S,
    mut options: SearchOptions<S>,
) -> Result<Option<(S, S::Quality)>, SearchError>
where
    S: Mutable + Send,
    S::Quality: Send,
{
    let workers = options.resolved_workers()?;
    let control = options.build_control(root);
    let (mut control, _) = parallel::parallel_breadth_first_mutable(
        control,
        options.filter_width,
        options.depth_limit,
        options.nodes_reached,
        workers,
    )?;
    control.finish();
    Ok(control.into_incumbent())
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_driver {
    use std::sync::{Arc, Mutex as StdMutex};

    use crate::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Countdown {
        left: usize,
        score: usize,
        history: Vec<usize>,
    }
    impl Countdown {
        fn new(left: usize) -> Self {
            Countdown { left, score: 0, history: vec![] }
        }
    }
    impl State for Countdown {
        type Quality = Maximize<usize>;
        fn quality(&self) -> Option<Self::Quality> {
            (self.left == 0).then(|| Maximize(self.score))
        }
        fn is_terminal(&self) -> bool {
            self.left == 0
        }
    }
    impl Branching for Countdown {
        fn branches(&self) -> Box<dyn Iterator<Item = Self> + '_> {
            if self.is_terminal() {
                return Box::new(std::iter::empty());
            }
            let left = self.left - 1;
            let score = self.score;
            Box::new((0..2).map(move |i| Countdown {
                left,
                score: score + i,
                history: vec![],
            }))
        }
    }
    impl Mutable for Countdown {
        type Choice = usize;
        fn choices(&self) -> Box<dyn Iterator<Item = usize> + '_> {
            if self.is_terminal() {
                return Box::new(std::iter::empty());
            }
            Box::new(0..2)
        }
        fn apply(&mut self, choice: usize) {
            self.left -= 1;
            self.score += choice;
            self.history.push(choice);
        }
        fn undo_last(&mut self) {
            let choice = self.history.pop().unwrap();
            self.left += 1;
            self.score -= choice;
        }
    }

    #[test]
    fn every_strategy_finds_the_optimum_of_a_small_tree() {
        let root = Countdown::new(4);
        let best = |outcome: Result<Option<(Countdown, Maximize<usize>)>, SearchError>| {
            outcome.unwrap().map(|(_, quality)| quality)
        };

        assert_eq!(
            Some(Maximize(4)),
            best(depth_first(root.clone(), SearchOptions::default()))
        );
        assert_eq!(
            Some(Maximize(4)),
            best(breadth_first(root.clone(), SearchOptions::default()))
        );
        assert_eq!(
            Some(Maximize(4)),
            best(parallel_depth_first(root.clone(), SearchOptions::default()))
        );
        assert_eq!(
            Some(Maximize(4)),
            best(parallel_breadth_first(root, SearchOptions::default()))
        );
    }
    #[test]
    fn a_search_without_valued_nodes_returns_none() {
        // confining the depth keeps the search away from the only valued
        // (terminal) layer
        let root = Countdown::new(5);
        let found = depth_first(root, SearchOptions::default().with_depth_limit(2)).unwrap();
        assert_eq!(None, found);
    }
    #[test]
    fn the_options_validation_names_the_offending_parameter() {
        let err = |outcome: Result<Option<(Countdown, Maximize<usize>)>, SearchError>| {
            outcome.unwrap_err()
        };
        assert_eq!(
            SearchError::InvalidArgument("filter_width"),
            err(depth_first(
                Countdown::new(2),
                SearchOptions::default().with_filter_width(0)
            ))
        );
        assert_eq!(
            SearchError::InvalidArgument("depth_limit"),
            err(breadth_first(
                Countdown::new(2),
                SearchOptions::default().with_depth_limit(0)
            ))
        );
        assert_eq!(
            SearchError::InvalidArgument("nodes_reached"),
            err(breadth_first(
                Countdown::new(2),
                SearchOptions::default().with_nodes_reached(0)
            ))
        );
        assert_eq!(
            SearchError::InvalidArgument("workers"),
            err(parallel_depth_first(
                Countdown::new(2),
                SearchOptions::default().with_workers(0)
            ))
        );
        assert_eq!(
            SearchError::InvalidArgument("workers"),
            err(parallel_breadth_first(
                Countdown::new(2),
                SearchOptions::default().with_workers(-3)
            ))
        );
    }
    #[test]
    fn the_default_worker_count_is_accepted() {
        let root = Countdown::new(3);
        let found = parallel_depth_first(root, SearchOptions::default()).unwrap();
        assert_eq!(Some(Maximize(3)), found.map(|(_, q)| q));
    }
    #[test]
    fn improvement_callbacks_observe_a_monotone_sequence_of_qualities() {
        let improvements: Arc<StdMutex<Vec<usize>>> = Arc::default();
        let trace = Arc::clone(&improvements);
        let root = Countdown::new(4);
        depth_first(
            root,
            SearchOptions::default()
                .with_improvement_callback(move |_, q: &Maximize<usize>| {
                    trace.lock().unwrap().push(q.0)
                }),
        )
        .unwrap();

        let improvements = improvements.lock().unwrap();
        assert!(!improvements.is_empty());
        assert!(improvements.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Some(&4), improvements.last());
    }
    #[test]
    fn a_pre_cancelled_search_stops_right_away() {
        let token = CancellationToken::new();
        token.cancel();
        let root = Countdown::new(10);
        let found = depth_first(
            root,
            SearchOptions::default().with_cancellation(token),
        )
        .unwrap();
        assert_eq!(None, found);
    }
    #[test]
    fn the_mutable_drivers_agree_with_the_branching_ones() {
        let root = Countdown::new(4);
        let branching = depth_first(root.clone(), SearchOptions::default())
            .unwrap()
            .map(|(_, q)| q);
        let mut in_place = root.clone();
        let mutable = depth_first_mutable(&mut in_place, SearchOptions::default())
            .unwrap()
            .map(|(_, q)| q);
        let parallel = parallel_depth_first_mutable(root.clone(), SearchOptions::default())
            .unwrap()
            .map(|(_, q)| q);
        let parallel_bfs =
            parallel_breadth_first_mutable(root.clone(), SearchOptions::default())
                .unwrap()
                .map(|(_, q)| q);
        let bfs = breadth_first_mutable(root, SearchOptions::default())
            .unwrap()
            .map(|(_, q)| q);

        assert_eq!(Some(Maximize(4)), branching);
        assert_eq!(branching, mutable);
        assert_eq!(branching, bfs);
        assert_eq!(branching, parallel);
        assert_eq!(branching, parallel_bfs);
    }
}
