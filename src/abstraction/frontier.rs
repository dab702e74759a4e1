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

//! This module defines the `Frontier` trait.

/// This trait abstracts away the implementation details of the containers
/// holding the set of nodes that remain to be expanded by a search engine.
/// The order in which a frontier hands nodes back is what distinguishes a
/// depth first traversal (lifo) from a breadth first one (fifo); hence each
/// implementation documents its own ordering and the engines pick the one
/// matching the traversal they promise.
pub trait Frontier<E> {
    /// This is how you store a node onto the frontier.
    fn push(&mut self, e: E);
    /// This method yields the next node to expand, if any.
    fn pop(&mut self) -> Option<E>;
    /// This method clears the frontier: it removes all stored nodes.
    fn clear(&mut self);
    /// Yields the number of nodes currently stored.
    fn len(&self) -> usize;
    /// Returns true iff the frontier is empty (len == 0)
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
