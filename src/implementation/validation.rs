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

//! This module provides a randomized self-consistency check for user state
//! implementations. Writing a correct `apply`/`undo_last` pair is the error
//! prone part of the [`crate::Mutable`] contract, so before debugging a
//! search gone wrong it usually pays to screen the state itself: the
//! validator walks the state and a clone of it down a pseudo random path,
//! checking at every step that the two produce the same choices in the same
//! order, then rewinds the path and checks that every undone level looks
//! exactly like it did on the way down.
//!
//! The walk is driven by a fixed-seed generator, so a verdict is perfectly
//! reproducible. And it is a probabilistic screen: a passing state is not
//! proven correct.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Branching, Mutable};

/// The generator seed is part of the contract: reproducibility of the
/// verdicts depends on it.
const SEED: u64 = 13;
/// The maximum number of random apply steps performed by one validation.
const MAX_STEPS: usize = 1000;

// ----------------------------------------------------------------------------
// --- VALIDATION VERDICT -----------------------------------------------------
// ----------------------------------------------------------------------------
/// The verdict of a validation run: a compact set of flags, since a single
/// run may reveal several independent problems. So far, it maintains the
/// following:
/// - Ok          the walk ran and revealed no inconsistency;
/// - Inconclusive no move was possible from the root, nothing was checked;
/// - Cloning     the state and its clone diverged on the way down;
/// - Undo        a rewound level did not match what was seen on the way down;
/// - Comparer    the comparer distinguished a choice from itself;
/// - Sequence    both sides produced the same choices but in different
///   orders, which points at a non deterministic `choices`/`branches`
///   rather than at an actual divergence.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Validation(u8);

impl Validation {
    /// The position of the ok flag.
    pub const OK: u8 = 1;
    /// The position of the inconclusive flag.
    pub const INCONCLUSIVE: u8 = 2;
    /// The position of the cloning-problem flag.
    pub const CLONING_PROBLEM: u8 = 4;
    /// The position of the undo-problem flag.
    pub const UNDO_PROBLEM: u8 = 8;
    /// The position of the comparer-problem flag.
    pub const COMPARER_PROBLEM: u8 = 16;
    /// The position of the sequence-problem flag.
    pub const SEQUENCE_PROBLEM: u8 = 32;

    fn new() -> Self {
        Validation(0)
    }
    /// Returns true iff the given flag is on.
    #[inline]
    pub fn test(self, flag: u8) -> bool {
        self.0 & flag != 0
    }
    /// Returns true iff the walk completed without revealing any problem.
    #[inline]
    pub fn is_ok(self) -> bool {
        self.test(Self::OK)
    }
    #[inline]
    fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }
    /// Turns a clean (problem free) verdict into Ok; an empty walk stays
    /// inconclusive.
    fn seal(mut self) -> Self {
        if self.0 == 0 {
            self.set(Self::OK);
        }
        self
    }
}

// ----------------------------------------------------------------------------
// --- VALIDATORS -------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Screens a mutable state implementation: `clone`, `choices`, `apply` and
/// `undo_last` are exercised along a pseudo random path of up to 1000 steps
/// (fixed seed). The caller supplies the equality used to compare two
/// choices, since choices need not be `Eq`.
pub fn validate_mutable<S, F>(state: &S, same_choice: F) -> Validation
where
    S: Mutable,
    S::Choice: Clone,
    F: Fn(&S::Choice, &S::Choice) -> bool,
{
    let mut verdict = Validation::new();
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut original = state.clone();
    let mut mirror = original.clone();
    let mut trail: Vec<Vec<S::Choice>> = vec![];

    for step in 0..MAX_STEPS {
        if original.is_terminal() != mirror.is_terminal() {
            verdict.set(Validation::CLONING_PROBLEM);
            break;
        }
        let ours: Vec<S::Choice> = original.choices().collect();
        let theirs: Vec<S::Choice> = mirror.choices().collect();

        if ours.iter().any(|c| !same_choice(c, c)) {
            verdict.set(Validation::COMPARER_PROBLEM);
            break;
        }
        if !sequences_equal(&ours, &theirs, &same_choice) {
            if multisets_equal(&ours, &theirs, &same_choice) {
                verdict.set(Validation::SEQUENCE_PROBLEM);
            } else {
                verdict.set(Validation::CLONING_PROBLEM);
            }
            break;
        }
        if original.is_terminal() || ours.is_empty() {
            if step == 0 {
                verdict.set(Validation::INCONCLUSIVE);
            }
            break;
        }

        let pick = rng.gen_range(0..ours.len());
        let our_choice = ours[pick].clone();
        let their_choice = theirs[pick].clone();
        trail.push(ours);
        original.apply(our_choice);
        mirror.apply(their_choice);
    }

    while let Some(expected) = trail.pop() {
        original.undo_last();
        mirror.undo_last();
        let ours: Vec<S::Choice> = original.choices().collect();
        let theirs: Vec<S::Choice> = mirror.choices().collect();
        if !sequences_equal(&ours, &expected, &same_choice)
            || !sequences_equal(&theirs, &expected, &same_choice)
        {
            verdict.set(Validation::UNDO_PROBLEM);
            break;
        }
    }
    verdict.seal()
}

/// Screens a branching state implementation: `clone` and `branches` are
/// exercised along a pseudo random descent of up to 1000 steps (fixed seed,
/// the same as for the mutable screen). There is nothing to rewind, so only
/// the determinism and cloning checks apply. The caller supplies the
/// equality used to compare two produced branches.
pub fn validate_branching<S, F>(state: &S, same_state: F) -> Validation
where
    S: Branching,
    F: Fn(&S, &S) -> bool,
{
    let mut verdict = Validation::new();
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut original = state.clone();
    let mut mirror = state.clone();

    for step in 0..MAX_STEPS {
        if original.is_terminal() != mirror.is_terminal() {
            verdict.set(Validation::CLONING_PROBLEM);
            break;
        }
        let ours: Vec<S> = original.branches().collect();
        let theirs: Vec<S> = mirror.branches().collect();

        if ours.iter().any(|s| !same_state(s, s)) {
            verdict.set(Validation::COMPARER_PROBLEM);
            break;
        }
        if !sequences_equal(&ours, &theirs, &same_state) {
            if multisets_equal(&ours, &theirs, &same_state) {
                verdict.set(Validation::SEQUENCE_PROBLEM);
            } else {
                verdict.set(Validation::CLONING_PROBLEM);
            }
            break;
        }
        if original.is_terminal() || ours.is_empty() {
            if step == 0 {
                verdict.set(Validation::INCONCLUSIVE);
            }
            break;
        }

        let pick = rng.gen_range(0..ours.len());
        original = ours.into_iter().nth(pick).unwrap();
        mirror = theirs.into_iter().nth(pick).unwrap();
    }
    verdict.seal()
}

fn sequences_equal<T>(ours: &[T], theirs: &[T], same: &impl Fn(&T, &T) -> bool) -> bool {
    ours.len() == theirs.len() && ours.iter().zip(theirs.iter()).all(|(a, b)| same(a, b))
}

/// Order insensitive comparison: every element of one side must be matched
/// by a distinct element of the other.
fn multisets_equal<T>(ours: &[T], theirs: &[T], same: &impl Fn(&T, &T) -> bool) -> bool {
    if ours.len() != theirs.len() {
        return false;
    }
    let mut matched = vec![false; theirs.len()];
    'outer: for a in ours {
        for (i, b) in theirs.iter().enumerate() {
            if !matched[i] && same(a, b) {
                matched[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
