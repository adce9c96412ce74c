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

//! This module defines the basic abstraction every client must implement in
//! order to plug a concrete domain into the heuristic-search algorithms of
//! this crate: [`Mdp`]. A domain provides states, actions, a transition
//! model and a cost function; this crate supplies the search.
//!
//! The most important abstraction a client provides is [`Mdp`]. Everything
//! else in this crate (the state registry, the Bellman primitives, the
//! solvers) is written generically over it.

use std::hash::Hash;

/// A (next-state, probability) pair returned by [`Mdp::transition`]. The
/// probabilities of all successors of a given `(state, action)` pair must
/// sum to one (within a small tolerance) whenever the action is
/// [`Mdp::applicable`] in that state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Successor<S> {
    /// The state reached by taking the outcome.
    pub state: S,
    /// The probability of this particular outcome, in `(0, 1]`.
    pub probability: f64,
}

impl<S> Successor<S> {
    pub fn new(state: S, probability: f64) -> Self {
        Successor { state, probability }
    }
}

/// This trait defines the contract of a stochastic shortest-path problem:
/// a Markov Decision Process with (at least one) absorbing goal state and
/// non-negative action costs. Any implementation of this trait effectively
/// defines the dynamic-programming model of the problem being solved.
///
/// # Laziness
/// Successors may be computed lazily: nothing in this trait requires the
/// full state space to be enumerable up front. A helper, [`generate_all`],
/// performs a breadth-first materialization of the reachable set when a
/// solver genuinely needs it (plain Value Iteration does; the trial-based
/// and sampling solvers never do).
pub trait Mdp {
    /// The state representation of this problem. Hash/equality on this type
    /// define state identity for the registry: two states that compare
    /// equal are the same state, and are interned as a single canonical
    /// object.
    type State: Clone + Eq + Hash;
    /// The action representation of this problem. Like `State`, hash and
    /// equality must be stable for the lifetime of the problem.
    type Action: Clone + Eq + Hash;

    /// Returns the state in which a fresh episode starts.
    fn initial_state(&self) -> Self::State;

    /// Returns the full action list of this problem, enumerated once in a
    /// stable order. Not every action needs to be applicable in every
    /// state; see [`Mdp::applicable`].
    fn actions(&self) -> &[Self::Action];

    /// Returns true iff `action` can be taken from `state`.
    fn applicable(&self, state: &Self::State, action: &Self::Action) -> bool;

    /// Returns the distribution over next states reached by taking `action`
    /// from `state`. Only called when `applicable(state, action)` holds.
    /// The probabilities of the returned successors must sum to one within
    /// [`PROBABILITY_EPSILON`].
    fn transition(&self, state: &Self::State, action: &Self::Action) -> Vec<Successor<Self::State>>;

    /// Returns the immediate cost of taking `action` from `state`. Must be
    /// non-negative; `cost(goal, _) == 0.0`. A cost greater than or equal to
    /// [`Mdp::dead_end_cost`] signals an unreachable-goal outcome.
    fn cost(&self, state: &Self::State, action: &Self::Action) -> f64;

    /// Returns true iff `state` is a goal state.
    fn goal(&self, state: &Self::State) -> bool;

    /// Returns a heuristic lower-bound estimate of the optimal cost-to-go
    /// from `state`. Solvers that rely on admissibility (LAO*, LRTDP, HDP,
    /// ...) assume `heuristic(s) <= V*(s)`; this is not checked at runtime
    /// (see the crate's error-handling design), it is the caller's
    /// responsibility. Defaults to zero, which is trivially admissible.
    fn heuristic(&self, _state: &Self::State) -> f64 {
        0.0
    }

    /// The cost used to signal that a state is a dead end (no path to any
    /// goal). Finite, but large relative to any real solution cost.
    /// Problem-scoped rather than a global constant, per this crate's
    /// configuration design.
    fn dead_end_cost(&self) -> f64 {
        1.0e7
    }

    /// A hint that the transition function of this problem returns the same
    /// distribution for a given `(state, action)` pair every time it is
    /// called, and that caching it is worthwhile. Solvers are free to
    /// ignore this hint.
    fn flat_transition(&self) -> bool {
        false
    }
}

/// Tolerance used when checking that a transition distribution sums to one.
pub const PROBABILITY_EPSILON: f64 = 1.0e-9;

/// Returns true iff the given successor distribution sums to one within
/// [`PROBABILITY_EPSILON`]. Intended for use in tests and debug assertions,
/// not on the hot path (see this crate's error-handling design: contract
/// violations are not checked at runtime by default).
pub fn distribution_is_normalized<S>(successors: &[Successor<S>]) -> bool {
    let total: f64 = successors.iter().map(|s| s.probability).sum();
    (total - 1.0).abs() <= PROBABILITY_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_distribution_is_detected() {
        let succs = vec![Successor::new('a', 0.5), Successor::new('b', 0.5)];
        assert!(distribution_is_normalized(&succs));
    }

    #[test]
    fn non_normalized_distribution_is_rejected() {
        let succs = vec![Successor::new('a', 0.5), Successor::new('b', 0.2)];
        assert!(!distribution_is_normalized(&succs));
    }

    #[test]
    fn default_heuristic_is_zero() {
        struct Dummy;
        impl Mdp for Dummy {
            type State = u8;
            type Action = u8;
            fn initial_state(&self) -> u8 { 0 }
            fn actions(&self) -> &[u8] { &[] }
            fn applicable(&self, _: &u8, _: &u8) -> bool { false }
            fn transition(&self, _: &u8, _: &u8) -> Vec<Successor<u8>> { vec![] }
            fn cost(&self, _: &u8, _: &u8) -> f64 { 0.0 }
            fn goal(&self, s: &u8) -> bool { *s == 0 }
        }
        assert_eq!(0.0, Dummy.heuristic(&0));
        assert_eq!(1.0e7, Dummy.dead_end_cost());
        assert!(!Dummy.flat_transition());
    }
}
