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

//! This module provides the implementation of the runtime object shared by
//! all the search strategies: the `SearchControl`. Every engine offers each
//! node it produces to the control, which maintains the incumbent, counts the
//! visited nodes, prunes against the quality bound, and decides when the
//! resource limits command the search to wind down. The `SharedControl`
//! wrapper makes one control usable from several worker threads by
//! serializing every call behind a single mutex.

use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

use crate::{CancellationToken, Quality, State, Visit};

/// The signature of the callbacks that are notified whenever the incumbent
/// strictly improves. The callback receives the new best state along with its
/// quality.
pub type ImprovementCallback<S> = Box<dyn FnMut(&S, &<S as State>::Quality) + Send>;

// ----------------------------------------------------------------------------
// --- SEARCH CONTROL ---------------------------------------------------------
// ----------------------------------------------------------------------------
/// The shared runtime state of one top-level search: the incumbent (best
/// state found so far and its quality), the visited node counter, the
/// resource limits (wall clock deadline, node budget, cancellation), and the
/// ordered list of improvement callbacks.
///
/// A control is created fresh for each top-level search and configured
/// through the fluent `with_*` builders. Once the search runs, the control is
/// only ever mutated through `visit_node` and `merge`, and it is sealed with
/// `finish` which records the wall clock end of the search.
pub struct SearchControl<S: State> {
    /// A read-only snapshot of the state the search starts from.
    initial: S,
    /// The best valued state encountered so far, if any.
    best_state: Option<S>,
    /// The quality of the incumbent. This value may exist without an
    /// accompanying state when it was seeded through `with_upper_bound` /
    /// `with_lower_bound`: it then acts as a pure pruning bound.
    best_quality: Option<S::Quality>,
    /// The number of nodes offered to `visit_node` so far.
    visited_nodes: usize,
    /// The node budget. The search stops once `visited_nodes` reaches it.
    node_limit: usize,
    /// The wall clock deadline, if any.
    deadline: Option<Instant>,
    /// The cooperative cancellation flag, if any.
    cancellation: Option<CancellationToken>,
    /// The external stop signal. Raised by `mark_stopped`, typically when a
    /// parallel worker faulted and the siblings must wind down.
    stopped: bool,
    /// The improvement callbacks, invoked in registration order.
    callbacks: Vec<ImprovementCallback<S>>,
    /// When the search started (set at construction).
    started_at: Instant,
    /// When `finish` was called, if it was.
    finished_at: Option<Instant>,
}

impl<S: State> SearchControl<S> {
    /// Creates a control for a search starting at the given state, with no
    /// limit of any kind.
    pub fn new(initial: S) -> Self {
        SearchControl {
            initial,
            best_state: None,
            best_quality: None,
            visited_nodes: 0,
            node_limit: usize::MAX,
            deadline: None,
            cancellation: None,
            stopped: false,
            callbacks: vec![],
            started_at: Instant::now(),
            finished_at: None,
        }
    }

    /// Limits the number of nodes the search may visit.
    pub fn with_node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = node_limit;
        self
    }
    /// Limits the wall clock time of the search, counted from now.
    pub fn with_runtime_limit(mut self, runtime: Duration) -> Self {
        self.deadline = Some(Instant::now() + runtime);
        self
    }
    /// Limits the wall clock time of the search with an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
    /// Attaches a cooperative cancellation token to the search.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
    /// Registers a callback invoked whenever the incumbent strictly improves.
    /// Callbacks run synchronously inside `visit_node` (or inside `merge`
    /// when the improvement comes from a parallel worker), in registration
    /// order.
    pub fn with_improvement_callback(
        mut self,
        callback: impl FnMut(&S, &S::Quality) + Send + 'static,
    ) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }
    /// Seeds the quality bound with a known feasible value for a
    /// *minimization* problem: any node whose optimistic estimate cannot
    /// strictly improve on it gets discarded, and only strictly better
    /// states may become the incumbent.
    pub fn with_upper_bound(self, bound: S::Quality) -> Self {
        self.with_quality_bound(bound)
    }
    /// Seeds the quality bound with a known feasible value for a
    /// *maximization* problem. See `with_upper_bound`.
    pub fn with_lower_bound(self, bound: S::Quality) -> Self {
        self.with_quality_bound(bound)
    }
    /// Direction-neutral form of `with_upper_bound` / `with_lower_bound`.
    /// The parallel engines use it to seed a worker-local control with the
    /// quality of the global incumbent.
    pub fn with_quality_bound(mut self, bound: S::Quality) -> Self {
        self.best_quality = Some(bound);
        self
    }

    pub(crate) fn push_callback(&mut self, callback: ImprovementCallback<S>) {
        self.callbacks.push(callback);
    }

    /// Offers a node to the control. The node is counted, promoted to
    /// incumbent when its quality strictly improves on the best known one
    /// (notifying the improvement callbacks), and checked against the
    /// quality bound. The returned verdict tells the engine whether the
    /// subtree below the node is still worth developing.
    pub fn visit_node(&mut self, state: &S) -> Visit {
        self.visited_nodes += 1;

        if let Some(quality) = state.quality() {
            let improved = match self.best_quality.as_ref() {
                Some(best) => quality.is_better(best),
                None => true,
            };
            if improved {
                log::debug!("incumbent improved after {} nodes", self.visited_nodes);
                self.best_state = Some(state.clone());
                self.best_quality = Some(quality.clone());
                self.notify_improvement(state, &quality);
            }
        }

        if let (Some(bound), Some(best)) = (state.bound(), self.best_quality.as_ref()) {
            if !bound.is_better(best) {
                return Visit::Discard;
            }
        }
        Visit::Continue
    }

    /// Returns true iff the search must wind down: cancellation requested,
    /// node budget exhausted, deadline passed, or externally stopped.
    pub fn should_stop(&self) -> bool {
        self.stopped
            || self.visited_nodes >= self.node_limit
            || self.cancellation.as_ref().map_or(false, |t| t.is_cancelled())
            || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Raises the external stop signal: every subsequent `should_stop` call
    /// returns true.
    pub fn mark_stopped(&mut self) {
        self.stopped = true;
    }

    /// Absorbs the outcome of a finished (typically worker-local) control:
    /// its visited count is added to ours, and its incumbent is adopted iff
    /// it strictly improves on ours -- in which case the improvement
    /// callbacks fire, exactly as if the improving state had been visited
    /// here.
    pub fn merge(&mut self, other: SearchControl<S>) {
        self.visited_nodes += other.visited_nodes;

        if let (Some(state), Some(quality)) = (other.best_state, other.best_quality) {
            let improved = match self.best_quality.as_ref() {
                Some(best) => quality.is_better(best),
                None => true,
            };
            if improved {
                self.notify_improvement(&state, &quality);
                self.best_state = Some(state);
                self.best_quality = Some(quality);
            }
        }
    }

    /// Records the wall clock end of the search. `elapsed` is frozen from
    /// this point on.
    pub fn finish(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    /// The state this search started from.
    pub fn initial(&self) -> &S {
        &self.initial
    }
    /// The best valued state encountered so far.
    pub fn best_state(&self) -> Option<&S> {
        self.best_state.as_ref()
    }
    /// The quality of the incumbent (or the seeded bound when no valued
    /// state was encountered yet).
    pub fn best_quality(&self) -> Option<&S::Quality> {
        self.best_quality.as_ref()
    }
    /// The number of nodes offered to `visit_node` so far.
    pub fn visited_nodes(&self) -> usize {
        self.visited_nodes
    }
    /// The number of nodes that may still be visited before the node budget
    /// runs out.
    pub fn remaining_budget(&self) -> usize {
        self.node_limit.saturating_sub(self.visited_nodes)
    }
    /// The wall clock deadline, if one was configured.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
    /// The cancellation token, if one was attached.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }
    /// True iff `finish` was called.
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
    /// The wall clock time spent searching; keeps growing until `finish` is
    /// called and is frozen afterwards.
    pub fn elapsed(&self) -> Duration {
        self.finished_at.unwrap_or_else(Instant::now) - self.started_at
    }
    /// Consumes the control and yields the incumbent, if a valued state was
    /// found.
    pub fn into_incumbent(self) -> Option<(S, S::Quality)> {
        match (self.best_state, self.best_quality) {
            (Some(state), Some(quality)) => Some((state, quality)),
            _ => None,
        }
    }

    fn notify_improvement(&mut self, state: &S, quality: &S::Quality) {
        // the callbacks are temporarily moved out so that they can borrow
        // the state while the control is being updated
        let mut callbacks = std::mem::take(&mut self.callbacks);
        for callback in callbacks.iter_mut() {
            callback(state, quality);
        }
        self.callbacks = callbacks;
    }
}

// ----------------------------------------------------------------------------
// --- SHARED CONTROL ---------------------------------------------------------
// ----------------------------------------------------------------------------
/// The thread safe wrapper around a `SearchControl`: every public call
/// acquires one single mutex, so `visit_node` (and the callbacks it may
/// trigger) is fully serialized. This is the only object the parallel
/// engines share across their workers; one coarse lock suffices because the
/// contention is bounded by the worker count and the slicing keeps the
/// critical sections rare.
pub struct SharedControl<S: State> {
    inner: Mutex<SearchControl<S>>,
}

impl<S: State> SharedControl<S> {
    /// Wraps the given control.
    pub fn new(control: SearchControl<S>) -> Self {
        SharedControl { inner: Mutex::new(control) }
    }
    /// Serialized equivalent of `SearchControl::visit_node`.
    pub fn visit_node(&self, state: &S) -> Visit {
        self.inner.lock().visit_node(state)
    }
    /// Serialized equivalent of `SearchControl::should_stop`.
    pub fn should_stop(&self) -> bool {
        self.inner.lock().should_stop()
    }
    /// Serialized equivalent of `SearchControl::merge`.
    pub fn merge(&self, other: SearchControl<S>) {
        self.inner.lock().merge(other)
    }
    /// Serialized equivalent of `SearchControl::mark_stopped`.
    pub fn mark_stopped(&self) {
        self.inner.lock().mark_stopped()
    }
    /// Serialized equivalent of `SearchControl::finish`.
    pub fn finish(&self) {
        self.inner.lock().finish()
    }
    /// A snapshot of the incumbent quality, consistent with the last
    /// `visit_node` performed under the lock.
    pub fn best_quality(&self) -> Option<S::Quality> {
        self.inner.lock().best_quality().cloned()
    }
    /// A snapshot of the visited node counter.
    pub fn visited_nodes(&self) -> usize {
        self.inner.lock().visited_nodes()
    }
    /// Grants exclusive access to the wrapped control, e.g. to read several
    /// of its attributes as one consistent snapshot.
    pub fn lock(&self) -> MutexGuard<'_, SearchControl<S>> {
        self.inner.lock()
    }
    /// Unwraps the inner control once no worker references the wrapper
    /// anymore.
    pub fn into_inner(self) -> SearchControl<S> {
        self.inner.into_inner()
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
