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

//! Bounded Real-Time Dynamic Programming. Maintains the usual lower bound
//! in `NodeData::value`, plus a parallel upper bound kept only here (no
//! other solver in this crate needs one, so it is not promoted into
//! `NodeData`). Trials sample outcomes weighted by `p(s') * (U(s') -
//! L(s'))`, biasing rollouts towards states with the largest remaining
//! uncertainty. Converges once the initial state's bound gap is below
//! `epsilon`.

use rand::Rng;

use crate::bellman::bellman_update;
use crate::mdp::Mdp;
use crate::registry::{ActionId, StateHandle, StateRegistry};
use crate::rng::SeededRng;
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

pub struct Brtdp<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    upper: std::collections::HashMap<StateHandle, f64, fxhash::FxBuildHasher>,
    initial_upper: f64,
    epsilon: f64,
    max_trial_depth: usize,
    max_trials: usize,
    rng: SeededRng,
    cutoff: &'a C,
}

impl<'a, M: Mdp, C: Cutoff> Brtdp<'a, M, C> {
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        initial_upper: f64,
        epsilon: f64,
        max_trial_depth: usize,
        max_trials: usize,
        seed: u64,
        cutoff: &'a C,
    ) -> Self {
        Brtdp {
            problem,
            registry,
            upper: std::collections::HashMap::default(),
            initial_upper,
            epsilon,
            max_trial_depth,
            max_trials,
            rng: SeededRng::from_seed(seed),
            cutoff,
        }
    }

    fn upper_of(&mut self, handle: StateHandle) -> f64 {
        let initial_upper = self.initial_upper;
        *self.upper.entry(handle).or_insert(initial_upper)
    }

    /// Updates both bounds of `state`: the lower bound via the usual
    /// Bellman backup, the upper bound by minimizing the same Q-value
    /// computation but substituting the upper bound of each successor.
    fn update_bounds(&mut self, state: StateHandle) {
        bellman_update(self.problem, self.registry, state);

        let s = self.registry.state(state).clone();
        if self.problem.goal(&s) {
            self.upper.insert(state, 0.0);
            return;
        }

        let mut best_upper = f64::INFINITY;
        for action in self.problem.actions() {
            if !self.problem.applicable(&s, action) {
                continue;
            }
            let successors = self.problem.transition(&s, action);
            let mut expected = 0.0;
            for succ in &successors {
                let h = self.problem.heuristic(&succ.state);
                let handle = self.registry.intern(succ.state.clone(), h);
                expected += succ.probability * self.upper_of(handle);
            }
            let q_upper = self.problem.cost(&s, action) + expected;
            best_upper = best_upper.min(q_upper);
        }
        if best_upper.is_finite() {
            self.upper.insert(state, best_upper);
        }
    }

    fn gap(&mut self, state: StateHandle) -> f64 {
        let u = self.upper_of(state);
        (u - self.registry.node(state).value).max(0.0)
    }

    fn sample_successor<R: Rng + ?Sized>(
        &mut self,
        state: StateHandle,
        action: &M::Action,
        rng: &mut R,
    ) -> StateHandle {
        let s = self.registry.state(state).clone();
        let successors = self.problem.transition(&s, action);
        let weights: Vec<f64> = successors
            .iter()
            .map(|succ| {
                let h = self.problem.heuristic(&succ.state);
                let handle = self.registry.intern(succ.state.clone(), h);
                succ.probability * self.gap(handle)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        if total <= 0.0 {
            // Every successor bound has converged: fall back to plain
            // probability-weighted sampling.
            return crate::bellman::random_successor(self.problem, self.registry, state, action, rng);
        }

        let mut roll = rng.random::<f64>() * total;
        for (succ, w) in successors.iter().zip(weights.iter()) {
            if roll < *w {
                let h = self.problem.heuristic(&succ.state);
                return self.registry.intern(succ.state.clone(), h);
            }
            roll -= w;
        }
        let last = successors.last().unwrap();
        let h = self.problem.heuristic(&last.state);
        self.registry.intern(last.state.clone(), h)
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for Brtdp<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let initial = self.problem.initial_state();
        let h0 = self.problem.heuristic(&initial);
        let root = self.registry.intern(initial, h0);
        self.upper.insert(root, self.initial_upper);

        let mut trials = 0;
        let mut reason = None;
        let mut touched = 0usize;

        loop {
            if self.gap(root) < self.epsilon {
                break;
            }
            if self.cutoff.must_stop() {
                reason = Some(Reason::CutoffOccurred);
                break;
            }
            if trials >= self.max_trials {
                reason = Some(Reason::IterationCapReached);
                break;
            }

            let mut current = root;
            let mut path = vec![current];
            for _ in 0..self.max_trial_depth {
                self.update_bounds(current);
                let s = self.registry.state(current).clone();
                if self.problem.goal(&s) || self.gap(current) < self.epsilon {
                    break;
                }
                let action_id = match self.registry.node(current).best_action {
                    Some(a) => a,
                    None => break,
                };
                let action = self.problem.actions()[action_id.index()].clone();
                let mut rng = std::mem::replace(&mut self.rng, SeededRng::from_seed(0));
                current = self.sample_successor(current, &action, rng.inner_mut());
                self.rng = rng;
                path.push(current);
            }
            touched += path.len();

            for &state in path.iter().rev() {
                self.update_bounds(state);
            }
            trials += 1;
        }

        SolveOutcome {
            converged: reason.is_none(),
            reason,
            value: self.registry.node(root).value,
            states_touched: touched,
        }
    }

    fn recommended_action(&self) -> Option<ActionId> {
        let initial = self.problem.initial_state();
        self.registry.get(&initial).and_then(|h| self.registry.node(h).best_action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::Successor;
    use crate::solver::NoCutoff;

    struct Chain;
    impl Mdp for Chain {
        type State = u32;
        type Action = ();
        fn initial_state(&self) -> u32 { 0 }
        fn actions(&self) -> &[()] { &[()] }
        fn applicable(&self, s: &u32, _: &()) -> bool { *s < 3 }
        fn transition(&self, s: &u32, _: &()) -> Vec<Successor<u32>> {
            vec![Successor::new(s + 1, 1.0)]
        }
        fn cost(&self, _: &u32, _: &()) -> f64 { 1.0 }
        fn goal(&self, s: &u32) -> bool { *s == 3 }
    }

    #[test]
    fn converges_on_a_chain() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Brtdp::new(&problem, &mut reg, 1.0e6, 1e-3, 50, 2000, 3, &cutoff);
        let outcome = solver.solve();
        assert!(outcome.converged);
        assert!((outcome.value - 3.0).abs() < 1e-1);
    }
}
