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

//! This module defines the two shapes of user-supplied problem states which
//! the search engines know how to traverse. Both shapes describe the very same
//! thing -- a finite search tree whose valued nodes carry a quality -- but
//! they trade differently between convenience and efficiency:
//!
//! * a [`Branching`] state produces its children as fresh values and is never
//!   mutated itself. It is the easiest shape to implement;
//! * a [`Mutable`] state produces *choice* tokens which are applied to (and
//!   later undone from) a single physical state. It supports backtracking
//!   without any copy, which makes a depth first search over it run in memory
//!   proportional to the depth of the tree rather than to its frontier.

use crate::Quality;

/// The capabilities shared by both state shapes: a state knows whether it is
/// a leaf of the search tree, it may carry the quality of the solution it
/// stands for, and it may offer an optimistic estimate of the best quality
/// reachable in the subtree below it.
pub trait State: Clone {
    /// The measure being optimized (see [`crate::Minimize`] and
    /// [`crate::Maximize`]).
    type Quality: Quality;

    /// The quality of the solution this state represents, or `None` when the
    /// state is not a valued node (e.g. a partial assignment which cannot be
    /// scored yet).
    fn quality(&self) -> Option<Self::Quality>;
    /// An optimistic estimate of the best quality attainable in the subtree
    /// rooted in this state: a lower bound when minimizing, an upper bound
    /// when maximizing. The search prunes any node whose estimate cannot
    /// strictly improve on the incumbent. Returning `None` (the default)
    /// keeps the node unconditionally explorable.
    fn bound(&self) -> Option<Self::Quality> {
        None
    }
    /// Returns true iff this state is a leaf of the search tree. A terminal
    /// state must produce an empty sequence of branches/choices.
    fn is_terminal(&self) -> bool;
}

/// The immutable state shape: a node of the search tree which produces its
/// children as owned values.
///
/// # Contract
/// `branches` must be deterministic -- the same state must always yield the
/// same children, in the same order -- and the produced sequence must be
/// finite. The order is significant: the engines consider only the first
/// `filter_width` children of a node and preserve the natural order in their
/// traversal.
pub trait Branching: State {
    /// The children of this node, lazily produced in their natural order.
    /// Implementations are encouraged to be lazy: only a prefix of the
    /// sequence may ever be realized.
    fn branches(&self) -> Box<dyn Iterator<Item = Self> + '_>;
}

/// The mutable state shape: a single physical state which is moved down the
/// tree by applying choice tokens and moved back up by undoing them.
///
/// # Contract
/// `choices` obeys the same determinism, finiteness and ordering requirements
/// as [`Branching::branches`]. Moreover, `apply` followed by `undo_last` must
/// restore the state to something observationally identical to what it was
/// before the `apply`: same choices in the same order, same quality, same
/// bound, same terminal flag. [`crate::validate_mutable`] offers a randomized
/// screen for implementations of this contract.
pub trait Mutable: State {
    /// The decision token which moves the state to one of its children.
    type Choice;

    /// The choices applicable at the current node, lazily produced in their
    /// natural order. A terminal state yields an empty sequence.
    fn choices(&self) -> Box<dyn Iterator<Item = Self::Choice> + '_>;
    /// Mutates the state into the child induced by the given choice.
    fn apply(&mut self, choice: Self::Choice);
    /// Reverts the most recent `apply`.
    fn undo_last(&mut self);
}
