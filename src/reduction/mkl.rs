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

//! The "at most k exceptions" determinization reduction: a policy is
//! allowed to encounter a non-primary ("exceptional") transition outcome
//! at most `k` times over the course of a trajectory. Once the budget is
//! exhausted, the reduced model collapses every remaining transition back
//! onto its primary outcome, absorbing the excluded probability mass so
//! the distribution stays normalized. [`ReducedModel`] is the `Mdp` over
//! the product state `(base_state, exceptions_used)` that a search
//! algorithm can solve directly.

use crate::mdp::{Mdp, Successor};
use crate::reduction::Reduction;

/// A reduction that designates the highest-probability outcome of every
/// `(state, action)` pair as primary, ties broken by enumeration order.
/// This is the usual choice ("most likely outcome is the non-exceptional
/// one") and the one `MklReduction::by_probability` builds.
pub struct MostLikelyIsPrimary;

impl<S, A> Reduction<S, A> for MostLikelyIsPrimary {
    fn is_primary(&self, _state: &S, _action: &A, _outcome_index: usize) -> bool {
        // `ReducedModel` resolves the actual "most likely" index itself,
        // since doing so requires inspecting the full distribution, which
        // a `(state, action, outcome_index)` triple alone does not give
        // this trait. This marker type exists so `MklReduction` always has
        // an explicit, named default rather than a bare closure.
        false
    }
}

/// A determinization reduction bounding the number of exceptional
/// outcomes a trajectory may pass through to `k`. `inner` decides which
/// outcome index is primary at each `(state, action)`.
pub struct MklReduction<R> {
    inner: R,
    k: u32,
}

impl<R> MklReduction<R> {
    pub fn new(inner: R, k: u32) -> Self {
        MklReduction { inner, k }
    }

    pub fn budget(&self) -> u32 {
        self.k
    }
}

impl MklReduction<MostLikelyIsPrimary> {
    /// The common case: primary outcome is whichever has the highest
    /// probability at each `(state, action)` pair.
    pub fn by_probability(k: u32) -> Self {
        MklReduction::new(MostLikelyIsPrimary, k)
    }
}

/// The `Mdp` obtained by applying an [`MklReduction`] to a base problem
/// `M`. States are `(M::State, exceptions_used)`: the reduction's budget
/// is part of the reduced state, so a solver over `ReducedModel` makes
/// decisions that account for how much exception budget remains.
pub struct ReducedModel<'a, M: Mdp, R> {
    base: &'a M,
    reduction: MklReduction<R>,
}

impl<'a, M: Mdp, R: Reduction<M::State, M::Action>> ReducedModel<'a, M, R> {
    pub fn new(base: &'a M, reduction: MklReduction<R>) -> Self {
        ReducedModel { base, reduction }
    }

    /// The primary outcome index of `(state, action)`: whichever index the
    /// reduction explicitly marks, or (when none is marked, the common
    /// case for [`MostLikelyIsPrimary`]) the highest-probability outcome,
    /// ties broken towards the first occurrence.
    fn primary_index(&self, state: &M::State, action: &M::Action, successors: &[Successor<M::State>]) -> usize {
        for (idx, _) in successors.iter().enumerate() {
            if self.reduction.inner.is_primary(state, action, idx) {
                return idx;
            }
        }
        let mut best = 0;
        for (idx, succ) in successors.iter().enumerate() {
            if succ.probability > successors[best].probability {
                best = idx;
            }
        }
        best
    }
}

impl<'a, M: Mdp, R: Reduction<M::State, M::Action>> Mdp for ReducedModel<'a, M, R> {
    type State = (M::State, u32);
    type Action = M::Action;

    fn initial_state(&self) -> Self::State {
        (self.base.initial_state(), 0)
    }

    fn actions(&self) -> &[Self::Action] {
        self.base.actions()
    }

    fn applicable(&self, state: &Self::State, action: &Self::Action) -> bool {
        self.base.applicable(&state.0, action)
    }

    fn transition(&self, state: &Self::State, action: &Self::Action) -> Vec<Successor<Self::State>> {
        let (base_state, exceptions_used) = state;
        let base_successors = self.base.transition(base_state, action);
        if base_successors.len() <= 1 {
            return base_successors
                .into_iter()
                .map(|s| Successor::new((s.state, *exceptions_used), s.probability))
                .collect();
        }

        let primary = self.primary_index(base_state, action, &base_successors);

        if *exceptions_used >= self.reduction.budget() {
            // Budget exhausted: collapse to the primary outcome alone,
            // absorbing every other outcome's probability mass into it.
            let primary_state = base_successors[primary].state.clone();
            return vec![Successor::new((primary_state, *exceptions_used), 1.0)];
        }

        base_successors
            .into_iter()
            .enumerate()
            .map(|(idx, succ)| {
                let used = if idx == primary { *exceptions_used } else { exceptions_used + 1 };
                Successor::new((succ.state, used), succ.probability)
            })
            .collect()
    }

    fn cost(&self, state: &Self::State, action: &Self::Action) -> f64 {
        self.base.cost(&state.0, action)
    }

    fn goal(&self, state: &Self::State) -> bool {
        self.base.goal(&state.0)
    }

    fn heuristic(&self, state: &Self::State) -> f64 {
        self.base.heuristic(&state.0)
    }

    fn dead_end_cost(&self) -> f64 {
        self.base.dead_end_cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Branch;
    impl Mdp for Branch {
        type State = u8;
        type Action = ();
        fn initial_state(&self) -> u8 { 0 }
        fn actions(&self) -> &[()] { &[()] }
        fn applicable(&self, s: &u8, _: &()) -> bool { *s == 0 }
        fn transition(&self, _: &u8, _: &()) -> Vec<Successor<u8>> {
            vec![Successor::new(1, 0.1), Successor::new(2, 0.9)]
        }
        fn cost(&self, _: &u8, _: &()) -> f64 { 1.0 }
        fn goal(&self, s: &u8) -> bool { *s != 0 }
    }

    #[test]
    fn exceptions_increment_the_budget_counter_until_exhausted() {
        let base = Branch;
        let reduced = ReducedModel::new(&base, MklReduction::by_probability(1));
        let successors = reduced.transition(&(0u8, 0), &());
        assert_eq!(2, successors.len());
        let exceptional = successors.iter().find(|s| s.state.0 == 1).unwrap();
        assert_eq!(1, exceptional.state.1);
        let primary = successors.iter().find(|s| s.state.0 == 2).unwrap();
        assert_eq!(0, primary.state.1);
    }

    #[test]
    fn an_exhausted_budget_collapses_to_the_primary_outcome() {
        let base = Branch;
        let reduced = ReducedModel::new(&base, MklReduction::by_probability(0));
        let successors = reduced.transition(&(0u8, 0), &());
        assert_eq!(1, successors.len());
        assert_eq!(2, successors[0].state.0);
        assert_eq!(1.0, successors[0].probability);
    }
}
