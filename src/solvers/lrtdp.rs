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

//! Labeled Real-Time Dynamic Programming: repeated greedy trials from the
//! initial state, each followed by a `check_solved` pass that labels
//! states `SOLVED` once their residual (and that of every greedy
//! successor) drops below `epsilon`. Converges once the initial state is
//! labeled `SOLVED`.

use crate::bellman::bellman_update;
use crate::mdp::Mdp;
use crate::registry::{ActionId, StateHandle, StateRegistry};
use crate::rng::SeededRng;
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

use super::trial::{run_trial, ProbabilityWeighted};

pub struct Lrtdp<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    epsilon: f64,
    max_trial_depth: usize,
    max_trials: usize,
    rng: SeededRng,
    cutoff: &'a C,
}

impl<'a, M: Mdp, C: Cutoff> Lrtdp<'a, M, C> {
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        epsilon: f64,
        max_trial_depth: usize,
        max_trials: usize,
        seed: u64,
        cutoff: &'a C,
    ) -> Self {
        Lrtdp {
            problem,
            registry,
            epsilon,
            max_trial_depth,
            max_trials,
            rng: SeededRng::from_seed(seed),
            cutoff,
        }
    }

    /// Explicit-stack DFS over unsolved greedy successors of `root`,
    /// labeling the whole sub-tree `SOLVED` if every residual found along
    /// the way is below `epsilon`. No recursion, per this crate's
    /// redesign notes. `visited` tracks states pushed during this call so
    /// the DFS never revisits a state twice in the same pass.
    fn check_solved(&mut self, root: StateHandle) -> bool {
        let mut open: Vec<StateHandle> = vec![root];
        let mut visited: std::collections::HashSet<StateHandle> = std::collections::HashSet::new();
        let mut closed: Vec<StateHandle> = Vec::new();
        let mut rv = true;
        visited.insert(root);

        while let Some(handle) = open.pop() {
            if self.registry.node(handle).labels.solved() {
                continue;
            }
            let s = self.registry.state(handle).clone();
            if self.problem.goal(&s) {
                self.registry.node_mut(handle).labels.set_solved(true);
                continue;
            }

            let residual = bellman_update(self.problem, self.registry, handle);
            if residual > self.epsilon {
                rv = false;
                continue;
            }
            closed.push(handle);

            let best_action = self.registry.node(handle).best_action;
            if let Some(action_id) = best_action {
                let action = self.problem.actions()[action_id.index()].clone();
                for succ in self.problem.transition(&s, &action) {
                    let h = self.problem.heuristic(&succ.state);
                    let next = self.registry.intern(succ.state, h);
                    if !self.registry.node(next).labels.solved() && visited.insert(next) {
                        open.push(next);
                    }
                }
            }
        }

        if rv {
            for &handle in &closed {
                self.registry.node_mut(handle).labels.set_solved(true);
            }
        } else {
            // Re-run one more update on every visited state before giving
            // up, so the next trial starts from fresh residuals. Reverse
            // insertion order mirrors the LIFO unwind of the recursive
            // original.
            while let Some(handle) = closed.pop() {
                bellman_update(self.problem, self.registry, handle);
            }
        }
        rv
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for Lrtdp<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let initial = self.problem.initial_state();
        let h0 = self.problem.heuristic(&initial);
        let root = self.registry.intern(initial, h0);

        let mut trials = 0;
        let mut reason = None;
        let mut touched = 0usize;

        while !self.registry.node(root).labels.solved() {
            if self.cutoff.must_stop() {
                reason = Some(Reason::CutoffOccurred);
                break;
            }
            if trials >= self.max_trials {
                reason = Some(Reason::IterationCapReached);
                break;
            }

            let trial = run_trial(
                self.problem,
                self.registry,
                root,
                self.max_trial_depth,
                &ProbabilityWeighted,
                self.rng.inner_mut(),
            );
            touched += trial.path.len();

            // check_solved from the trial's tail back to its root, as in
            // the original labeled-RTDP pseudocode.
            for &state in trial.path.iter().rev() {
                if !self.check_solved(state) {
                    break;
                }
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
    fn converges_on_a_chain_and_labels_the_root_solved() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Lrtdp::new(&problem, &mut reg, 1e-6, 50, 1000, 1, &cutoff);
        let outcome = solver.solve();
        assert!(outcome.converged);
        assert!((outcome.value - 3.0).abs() < 1e-3);
    }
}
