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

//! A residual-problem view over a base [`Mdp`]: a different initial state,
//! and a restricted set of states treated as "in scope" — anything outside
//! it is treated as an absorbing boundary whose value is the base
//! problem's heuristic. This is the short-sighted sub-MDP SSiPP solves at
//! every step, and the shrinking wrapped state set `EpicSolver.cpp`
//! iterates over in the original implementation this crate is modeled on.

use std::sync::Arc;

use crate::mdp::{Mdp, Successor};

/// Returns `true` iff `state` is still inside the wrapped sub-problem's
/// scope. States outside scope are treated as goals whose cost-to-go is
/// the base problem's heuristic, so the wrapped problem never needs to
/// look past its own boundary.
pub trait Scope<S> {
    fn in_scope(&self, state: &S) -> bool;
}

/// A [`Scope`] backed by a plain membership set, the common case (SSiPP's
/// "states reachable within `horizon` steps").
pub struct StateSetScope<S: Eq + std::hash::Hash> {
    members: std::collections::HashSet<S>,
}

impl<S: Eq + std::hash::Hash> StateSetScope<S> {
    pub fn new(members: std::collections::HashSet<S>) -> Self {
        StateSetScope { members }
    }
}

impl<S: Eq + std::hash::Hash> Scope<S> for StateSetScope<S> {
    fn in_scope(&self, state: &S) -> bool {
        self.members.contains(state)
    }
}

/// Wraps `base` with a new initial state and a [`Scope`] bounding which
/// states are still expanded. `base` is shared rather than cloned — a
/// single allocation backing a residual-problem view — since the wrapped
/// problem never mutates it.
pub struct WrapperProblem<M: Mdp, S: Scope<M::State>> {
    base: Arc<M>,
    initial: M::State,
    scope: S,
}

impl<M: Mdp, S: Scope<M::State>> WrapperProblem<M, S> {
    pub fn new(base: Arc<M>, initial: M::State, scope: S) -> Self {
        WrapperProblem { base, initial, scope }
    }
}

impl<M: Mdp, S: Scope<M::State>> Mdp for WrapperProblem<M, S> {
    type State = M::State;
    type Action = M::Action;

    fn initial_state(&self) -> Self::State {
        self.initial.clone()
    }

    fn actions(&self) -> &[Self::Action] {
        self.base.actions()
    }

    fn applicable(&self, state: &Self::State, action: &Self::Action) -> bool {
        if !self.scope.in_scope(state) {
            return false;
        }
        self.base.applicable(state, action)
    }

    fn transition(&self, state: &Self::State, action: &Self::Action) -> Vec<Successor<Self::State>> {
        self.base.transition(state, action)
    }

    fn cost(&self, state: &Self::State, action: &Self::Action) -> f64 {
        self.base.cost(state, action)
    }

    fn goal(&self, state: &Self::State) -> bool {
        self.base.goal(state) || !self.scope.in_scope(state)
    }

    fn heuristic(&self, state: &Self::State) -> f64 {
        self.base.heuristic(state)
    }

    fn dead_end_cost(&self) -> f64 {
        self.base.dead_end_cost()
    }

    fn flat_transition(&self) -> bool {
        self.base.flat_transition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Chain;
    impl Mdp for Chain {
        type State = u32;
        type Action = ();
        fn initial_state(&self) -> u32 { 0 }
        fn actions(&self) -> &[()] { &[()] }
        fn applicable(&self, s: &u32, _: &()) -> bool { *s < 5 }
        fn transition(&self, s: &u32, _: &()) -> Vec<Successor<u32>> {
            vec![Successor::new(s + 1, 1.0)]
        }
        fn cost(&self, _: &u32, _: &()) -> f64 { 1.0 }
        fn goal(&self, s: &u32) -> bool { *s == 5 }
    }

    #[test]
    fn states_outside_scope_are_treated_as_goals() {
        let base = Arc::new(Chain);
        let scope = StateSetScope::new([0u32, 1, 2].into_iter().collect());
        let wrapped = WrapperProblem::new(base, 0, scope);
        assert!(!wrapped.goal(&1));
        assert!(wrapped.goal(&3));
    }

    #[test]
    fn the_initial_state_can_differ_from_the_base_problems() {
        let base = Arc::new(Chain);
        let scope = StateSetScope::new([1u32, 2, 3].into_iter().collect());
        let wrapped = WrapperProblem::new(base, 1, scope);
        assert_eq!(1, wrapped.initial_state());
    }
}
