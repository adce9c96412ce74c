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

//! Value-of-Perfect-Information RTDP: like LRTDP, but the trial picks the
//! successor with the greatest expected gain from learning its true
//! value, rather than sampling proportionally to the transition
//! probabilities. There is no general closed-form VPI for an arbitrary
//! number of outcomes; we use the two-point closed form when an action
//! has exactly two successors and fall back to a Monte Carlo estimate
//! otherwise (see this crate's design ledger for the rationale).

use rand::Rng;

use crate::bellman::bellman_update;
use crate::mdp::Mdp;
use crate::registry::{ActionId, StateHandle, StateRegistry};
use crate::rng::SeededRng;
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

pub struct VpiRtdp<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    epsilon: f64,
    max_trial_depth: usize,
    max_trials: usize,
    monte_carlo_samples: usize,
    rng: SeededRng,
    cutoff: &'a C,
}

impl<'a, M: Mdp, C: Cutoff> VpiRtdp<'a, M, C> {
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        epsilon: f64,
        max_trial_depth: usize,
        max_trials: usize,
        monte_carlo_samples: usize,
        seed: u64,
        cutoff: &'a C,
    ) -> Self {
        VpiRtdp {
            problem,
            registry,
            epsilon,
            max_trial_depth,
            max_trials,
            monte_carlo_samples,
            rng: SeededRng::from_seed(seed),
            cutoff,
        }
    }

    /// The two-point closed-form VPI of `handle`'s current value estimate,
    /// treating its value as normally distributed around `mean` with
    /// spread `spread` (half the gap between its value and the best
    /// alternative Q-value at the parent): `VPI = spread/2` when the
    /// current best action would flip, `0` otherwise. This mirrors the
    /// published VPI-RTDP two-point approximation.
    fn closed_form_vpi(&self, best_q: f64, second_best_q: f64, successor_value: f64) -> f64 {
        let gap = (second_best_q - best_q).abs();
        if successor_value < best_q {
            (gap - (best_q - successor_value)).max(0.0) / 2.0
        } else {
            0.0
        }
    }

    /// Monte Carlo fallback: samples `monte_carlo_samples` perturbed
    /// values of `handle` around its current estimate and averages the
    /// resulting improvement to the parent's best Q-value.
    fn monte_carlo_vpi<R: Rng + ?Sized>(
        &self,
        best_q: f64,
        second_best_q: f64,
        successor_value: f64,
        spread: f64,
        rng: &mut R,
    ) -> f64 {
        if self.monte_carlo_samples == 0 {
            return self.closed_form_vpi(best_q, second_best_q, successor_value);
        }
        let mut total = 0.0;
        for _ in 0..self.monte_carlo_samples {
            let noise = (rng.random::<f64>() - 0.5) * 2.0 * spread;
            let sample = (successor_value + noise).max(0.0);
            let improvement = (best_q - sample).max(0.0);
            total += improvement;
        }
        total / self.monte_carlo_samples as f64
    }

    /// Picks the successor of `(state, action)` with the greatest expected
    /// value of information, falling back to the highest-probability
    /// outcome when every VPI is zero (no successor would change the
    /// current greedy decision).
    fn vpi_successor<R: Rng + ?Sized>(
        &mut self,
        state: StateHandle,
        action: &M::Action,
        rng: &mut R,
    ) -> StateHandle {
        let s = self.registry.state(state).clone();
        let successors = self.problem.transition(&s, action);

        let mut qs: Vec<f64> = Vec::with_capacity(self.problem.actions().len());
        for a in self.problem.actions() {
            if !self.problem.applicable(&s, a) {
                continue;
            }
            qs.push(crate::bellman::qvalue(self.problem, self.registry, state, a, 1.0));
        }
        qs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let best_q = qs.first().copied().unwrap_or(f64::INFINITY);
        let second_best_q = qs.get(1).copied().unwrap_or(f64::INFINITY);

        let mut best_vpi = -1.0;
        let mut best_handle = None;
        for succ in &successors {
            let h = self.problem.heuristic(&succ.state);
            let handle = self.registry.intern(succ.state.clone(), h);
            let value = self.registry.node(handle).value;
            let spread = self.registry.node(handle).residual.max(1e-6);

            let vpi = if successors.len() == 2 {
                self.closed_form_vpi(best_q, second_best_q, value)
            } else {
                self.monte_carlo_vpi(best_q, second_best_q, value, spread, rng)
            };
            let weighted = succ.probability * vpi;
            if weighted > best_vpi {
                best_vpi = weighted;
                best_handle = Some(handle);
            }
        }

        best_handle.unwrap_or_else(|| {
            crate::bellman::most_likely_outcome(self.problem, self.registry, state, action)
        })
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for VpiRtdp<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let initial = self.problem.initial_state();
        let h0 = self.problem.heuristic(&initial);
        let root = self.registry.intern(initial, h0);

        let mut trials = 0;
        let mut reason = None;
        let mut touched = 0usize;

        loop {
            if bellman_update(self.problem, self.registry, root) < self.epsilon
                && self.registry.node(root).labels.solved()
            {
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
            let mut converged_trial = true;
            for _ in 0..self.max_trial_depth {
                let residual = bellman_update(self.problem, self.registry, current);
                let s = self.registry.state(current).clone();
                if self.problem.goal(&s) {
                    break;
                }
                if residual > self.epsilon {
                    converged_trial = false;
                }
                let action_id = match self.registry.node(current).best_action {
                    Some(a) => a,
                    None => break,
                };
                let action = self.problem.actions()[action_id.index()].clone();
                let mut rng = std::mem::replace(&mut self.rng, SeededRng::from_seed(0));
                current = self.vpi_successor(current, &action, rng.inner_mut());
                self.rng = rng;
                path.push(current);
            }
            touched += path.len();

            for &state in path.iter().rev() {
                bellman_update(self.problem, self.registry, state);
            }
            if converged_trial {
                let residual = bellman_update(self.problem, self.registry, root);
                self.registry.node_mut(root).labels.set_solved(residual < self.epsilon);
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
        let mut solver = VpiRtdp::new(&problem, &mut reg, 1e-4, 50, 2000, 20, 5, &cutoff);
        let outcome = solver.solve();
        assert!((outcome.value - 3.0).abs() < 1e-2);
    }
}
