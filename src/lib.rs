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

//! # TREESEARCH
//! Treesearch is a truly generic framework to develop tree-search based
//! combinatorial optimization solvers in Rust. Its goal is to let you
//! describe your problem as a search tree -- either with immutable states
//! that branch into child states, or with a single mutable state that
//! applies and undoes choice tokens -- and then pick among a family of
//! reusable search strategies: depth first, breadth first, and hybrid
//! sequential/parallel variants of both. All strategies share the same
//! runtime object (the [`SearchControl`]) which maintains the incumbent,
//! counts the visited nodes, prunes against optimistic bounds, and enforces
//! the configured limits (wall clock, node budget, cancellation).
//!
//! ## Side benefit
//! As a side benefit from using `treesearch`, you will be able to exploit
//! all of your hardware to explore your search tree in parallel.
//!
//! ## Quick Example
//! The following presents a minimalistic use of treesearch. It solves a tiny
//! instance of the binary knapsack problem with a plain depth first search.
//! This example is shown for illustration purpose because it is pretty
//! simple and chances are high anybody is already comfortable with the
//! problem definition.
//!
//! #### Describe the problem as a search tree
//! The state of a node comprises the set of items that may still be decided
//! upon, the remaining capacity of the sack, and the profit packed so far.
//! Branching on a node decides the next item: either it goes into the sack
//! (when it fits) or it stays out. A node whose every item was decided is a
//! terminal node, valued with the packed profit.
//! ```
//! use std::sync::Arc;
//! use treesearch::*;
//!
//! #[derive(Clone)]
//! struct Knapsack {
//!     /// the (weight, profit) of each item; shared so that cloning a node
//!     /// stays cheap
//!     items: Arc<Vec<(usize, usize)>>,
//!     /// the remaining capacity of the sack
//!     capacity: usize,
//!     /// the profit packed so far
//!     packed: usize,
//!     /// the number of items that were already decided upon
//!     depth: usize,
//! }
//!
//! impl State for Knapsack {
//!     type Quality = Maximize<usize>;
//!
//!     fn quality(&self) -> Option<Self::Quality> {
//!         (self.depth == self.items.len()).then(|| Maximize(self.packed))
//!     }
//!     fn is_terminal(&self) -> bool {
//!         self.depth == self.items.len()
//!     }
//! }
//!
//! impl Branching for Knapsack {
//!     fn branches(&self) -> Box<dyn Iterator<Item = Self> + '_> {
//!         if self.is_terminal() {
//!             return Box::new(std::iter::empty());
//!         }
//!         let (weight, profit) = self.items[self.depth];
//!         let mut children = vec![];
//!         if weight <= self.capacity {
//!             let mut take = self.clone();
//!             take.capacity -= weight;
//!             take.packed += profit;
//!             take.depth += 1;
//!             children.push(take);
//!         }
//!         let mut leave = self.clone();
//!         leave.depth += 1;
//!         children.push(leave);
//!         Box::new(children.into_iter())
//!     }
//! }
//!
//! //  describe the instance, then maximize the packed profit
//! let root = Knapsack {
//!     items: Arc::new(vec![(10, 60), (20, 100), (30, 120)]),
//!     capacity: 50,
//!     packed: 0,
//!     depth: 0,
//! };
//! let best = depth_first(root, SearchOptions::default()).unwrap();
//! assert_eq!(Some(Maximize(220)), best.map(|(_, quality)| quality));
//! ```
//!
//! #### Going further
//! * Implement [`Mutable`] instead of [`Branching`] when copying your state
//!   is expensive: the depth first engine will then drive one single
//!   physical state with `apply`/`undo_last` and hold choices, not states,
//!   on its frontier.
//! * Use `parallel_depth_first` (or `parallel_breadth_first`) to fan the
//!   exploration out across all hardware threads -- no change to the state
//!   implementation is required beyond being `Send`.
//! * Confine a search with [`SearchOptions::with_filter_width`],
//!   [`SearchOptions::with_depth_limit`], a node budget, a runtime budget,
//!   or a [`CancellationToken`]; have your state return an optimistic
//!   [`State::bound`] to let the control prune hopeless subtrees.
//! * Screen a hand written [`Mutable`] implementation with
//!   [`validate_mutable`] before chasing bugs in a search gone wrong.

mod abstraction;
mod common;
mod implementation;

pub use abstraction::*;
pub use common::*;
pub use implementation::*;
