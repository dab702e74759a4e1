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

//! This module defines the most basic data types that are used throughout all
//! the code of our library (both at the abstraction and implementation levels).
//! These are also the types your client library is likely to work with.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

// ----------------------------------------------------------------------------
// --- QUALITY ----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The quality of a state is the measure which is being optimized: every search
/// strategy in this library tries to find the state whose quality *dominates*
/// that of every other state in the tree. Because the notion of dominance
/// depends on the direction of the optimization, it is captured by this trait
/// rather than by `Ord`: a minimization problem considers a smaller value
/// better, a maximization problem a greater one.
pub trait Quality: Clone {
    /// Returns true iff `self` strictly dominates `other` with respect to the
    /// optimization direction.
    fn is_better(&self, other: &Self) -> bool;
    /// Returns true iff `self` dominates or equals `other`.
    fn is_better_or_equal(&self, other: &Self) -> bool;
}

/// A quality to be minimized: a strictly smaller wrapped value is better.
/// The wrapped scalar may be any partially ordered type, typically an integer
/// or a real.
///
/// # Example
/// ```
/// # use treesearch::*;
/// assert!( Minimize(1).is_better(&Minimize(2)));
/// assert!(!Minimize(2).is_better(&Minimize(2)));
/// assert!( Minimize(2).is_better_or_equal(&Minimize(2)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Minimize<N>(pub N);

impl<N: PartialOrd + Clone> Quality for Minimize<N> {
    fn is_better(&self, other: &Self) -> bool {
        self.0 < other.0
    }
    fn is_better_or_equal(&self, other: &Self) -> bool {
        self.0 <= other.0
    }
}

/// A quality to be maximized: a strictly greater wrapped value is better.
///
/// # Example
/// ```
/// # use treesearch::*;
/// assert!( Maximize(2).is_better(&Maximize(1)));
/// assert!(!Maximize(2).is_better(&Maximize(2)));
/// assert!( Maximize(2).is_better_or_equal(&Maximize(2)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Maximize<N>(pub N);

impl<N: PartialOrd + Clone> Quality for Maximize<N> {
    fn is_better(&self, other: &Self) -> bool {
        self.0 > other.0
    }
    fn is_better_or_equal(&self, other: &Self) -> bool {
        self.0 >= other.0
    }
}

// ----------------------------------------------------------------------------
// --- VISIT ------------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The verdict returned by `SearchControl::visit_node` for every node that is
/// offered to it. It tells the calling engine whether the subtree below the
/// visited node is still worth developing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Visit {
    /// The node may be expanded further.
    Continue,
    /// The node was pruned: its optimistic bound cannot improve the incumbent,
    /// so the subtree below it must not be developed.
    Discard,
}

// ----------------------------------------------------------------------------
// --- ERRORS -----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The errors that can be reported at the boundary of the public api. Faults
/// raised by user code (a panicking `branches`, `apply`, callback, ...) are
/// *not* turned into a variant of this type: they propagate as panics, per the
/// usual rust convention.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
pub enum SearchError {
    /// One of the configuration parameters was given a value outside of its
    /// admissible range (e.g. a zero `filter_width`). The payload names the
    /// offending parameter. This is always detected before any work is done.
    #[error("invalid value for the {0} parameter")]
    InvalidArgument(&'static str),
}

// ----------------------------------------------------------------------------
// --- CANCELLATION -----------------------------------------------------------
// ----------------------------------------------------------------------------
/// A cheap, cloneable handle that lets an external party (a signal handler,
/// a ui thread, ...) request the cooperative termination of an ongoing search.
/// All clones of a token share the same underlying flag.
///
/// # Example
/// ```
/// # use treesearch::*;
/// let token = CancellationToken::new();
/// let shared = token.clone();
/// assert!(!shared.is_cancelled());
/// token.cancel();
/// assert!(shared.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a fresh token in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }
    /// Requests the termination of every search holding a clone of this token.
    /// Cancellation is cooperative: an in-flight node visit completes normally.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
    /// Returns true iff `cancel` was called on this token or one of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################


#[cfg(test)]
mod test_cancellation {
    use crate::*;

    #[test]
    fn a_fresh_token_is_not_cancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }
    #[test]
    fn all_clones_observe_a_cancellation() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }
}
