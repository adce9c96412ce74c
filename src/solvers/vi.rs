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

//! Plain Value Iteration: repeated synchronous Bellman sweeps over a fixed
//! state set until the maximum residual drops below `epsilon` or an
//! iteration cap is reached. The simplest of this crate's solvers, and the
//! one every other solver's correctness is checked against (test property
//! 6 in this crate's testable properties).

use crate::bellman::{bellman_update, generate_all};
use crate::mdp::Mdp;
use crate::registry::{ActionId, StateHandle, StateRegistry};
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

/// Value Iteration over a state set that is either supplied up front or
/// materialized with [`generate_all`]. Because it sweeps synchronously
/// over the whole set on every iteration, it is only usable when the
/// domain can enumerate its reachable states (see this crate's failure
/// semantics: "algorithms that are intrinsically synchronous report an
/// error" when the domain is lazy-only; here that is modeled by requiring
/// the caller to supply the state set explicitly rather than silently
/// calling `generate_all` on a domain that refuses to enumerate).
pub struct ValueIteration<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    states: Vec<StateHandle>,
    epsilon: f64,
    max_iterations: usize,
    cutoff: &'a C,
    /// The per-iteration state values, recorded for the metareasoning
    /// simulator, which needs the whole history of VI snapshots, not just
    /// the converged result.
    pub history: Vec<Vec<(StateHandle, f64)>>,
}

impl<'a, M: Mdp, C: Cutoff> ValueIteration<'a, M, C> {
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        states: Vec<StateHandle>,
        epsilon: f64,
        max_iterations: usize,
        cutoff: &'a C,
    ) -> Self {
        ValueIteration {
            problem,
            registry,
            states,
            epsilon,
            max_iterations,
            cutoff,
            history: Vec::new(),
        }
    }

    /// Builds a solver whose state set is the full set of states reachable
    /// from the problem's initial state.
    pub fn over_reachable_states(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        epsilon: f64,
        max_iterations: usize,
        cutoff: &'a C,
    ) -> Self {
        let states = generate_all(problem, registry);
        Self::new(problem, registry, states, epsilon, max_iterations, cutoff)
    }

    pub fn initial_handle(&mut self) -> StateHandle {
        let s = self.problem.initial_state();
        let h = self.problem.heuristic(&s);
        self.registry.intern(s, h)
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for ValueIteration<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let mut iterations = 0;
        let mut reason = None;

        loop {
            if self.cutoff.must_stop() {
                reason = Some(Reason::CutoffOccurred);
                break;
            }
            if iterations >= self.max_iterations {
                reason = Some(Reason::IterationCapReached);
                break;
            }

            let mut max_residual: f64 = 0.0;
            for &state in &self.states {
                let r = bellman_update(self.problem, self.registry, state);
                max_residual = max_residual.max(r);
            }
            self.history.push(
                self.states
                    .iter()
                    .map(|&s| (s, self.registry.node(s).value))
                    .collect(),
            );
            iterations += 1;

            if max_residual < self.epsilon {
                break;
            }
        }

        let initial = self.problem.initial_state();
        let handle = self
            .registry
            .get(&initial)
            .unwrap_or_else(|| self.registry.intern(initial, 0.0));

        SolveOutcome {
            converged: reason.is_none(),
            reason,
            value: self.registry.node(handle).value,
            states_touched: self.states.len(),
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

    /// A 3-state chain: 0 -> 1 -> 2 (goal), cost 1 per step.
    struct Chain;
    impl Mdp for Chain {
        type State = u32;
        type Action = ();
        fn initial_state(&self) -> u32 { 0 }
        fn actions(&self) -> &[()] { &[()] }
        fn applicable(&self, s: &u32, _: &()) -> bool { *s < 2 }
        fn transition(&self, s: &u32, _: &()) -> Vec<Successor<u32>> {
            vec![Successor::new(s + 1, 1.0)]
        }
        fn cost(&self, _: &u32, _: &()) -> f64 { 1.0 }
        fn goal(&self, s: &u32) -> bool { *s == 2 }
    }

    #[test]
    fn converges_to_the_correct_cost_to_go() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut vi = ValueIteration::over_reachable_states(&problem, &mut reg, 1e-9, 1000, &cutoff);
        let outcome = vi.solve();
        assert!(outcome.converged);
        assert!((outcome.value - 2.0).abs() < 1e-6);
    }

    #[test]
    fn iteration_cap_prevents_convergence() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut vi = ValueIteration::over_reachable_states(&problem, &mut reg, 1e-12, 1, &cutoff);
        let outcome = vi.solve();
        assert!(!outcome.converged);
        assert_eq!(Some(Reason::IterationCapReached), outcome.reason);
    }
}
