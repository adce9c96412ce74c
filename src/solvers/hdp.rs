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

//! Heuristic Dynamic Programming: a trial-based solver whose `check_solved`
//! equivalent is a Tarjan-style strongly-connected-component search over
//! the current greedy subgraph, implemented with an explicit stack (no
//! recursion, per this crate's redesign notes). An entire SCC collapses to
//! `SOLVED` in one step once every residual inside it drops below
//! `epsilon`. `i_plausibility`, when set, bounds how deep the DFS may
//! follow a trajectory whose cumulative probability has dropped below the
//! given threshold.

use crate::bellman::bellman_update;
use crate::mdp::Mdp;
use crate::registry::{ActionId, StateHandle, StateRegistry};
use crate::rng::SeededRng;
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

use super::trial::{run_trial, ProbabilityWeighted};

pub struct Hdp<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    epsilon: f64,
    max_trial_depth: usize,
    max_trials: usize,
    /// Bounds DFS depth by trajectory probability: a successor reached
    /// with cumulative probability below this threshold is treated as a
    /// leaf rather than expanded further.
    i_plausibility: Option<f64>,
    rng: SeededRng,
    cutoff: &'a C,
}

/// One explicit-stack DFS frame for the Tarjan pass: the state being
/// visited, its cumulative trajectory probability, and the index of the
/// next successor still to push.
struct Frame {
    state: StateHandle,
    trajectory_probability: f64,
    next_successor: usize,
    successors: Vec<(StateHandle, f64)>,
}

impl<'a, M: Mdp, C: Cutoff> Hdp<'a, M, C> {
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        epsilon: f64,
        max_trial_depth: usize,
        max_trials: usize,
        i_plausibility: Option<f64>,
        seed: u64,
        cutoff: &'a C,
    ) -> Self {
        Hdp {
            problem,
            registry,
            epsilon,
            max_trial_depth,
            max_trials,
            i_plausibility,
            rng: SeededRng::from_seed(seed),
            cutoff,
        }
    }

    fn greedy_successors(&mut self, state: StateHandle) -> Vec<(StateHandle, f64)> {
        let s = self.registry.state(state).clone();
        let action_id = match self.registry.node(state).best_action {
            Some(a) => a,
            None => return Vec::new(),
        };
        let action = self.problem.actions()[action_id.index()].clone();
        self.problem
            .transition(&s, &action)
            .into_iter()
            .map(|succ| {
                let h = self.problem.heuristic(&succ.state);
                (self.registry.intern(succ.state, h), succ.probability)
            })
            .collect()
    }

    /// Tarjan's algorithm over the greedy subgraph rooted at `root`,
    /// implemented with an explicit call stack. Returns `true` iff every
    /// state visited converged (residual below epsilon), in which case
    /// every state in every fully-popped SCC has already been labeled
    /// `SOLVED`.
    fn find_and_close_sccs(&mut self, root: StateHandle) -> bool {
        let mut index_of: std::collections::HashMap<StateHandle, usize> = std::collections::HashMap::new();
        let mut low_link: std::collections::HashMap<StateHandle, usize> = std::collections::HashMap::new();
        let mut on_stack: std::collections::HashSet<StateHandle> = std::collections::HashSet::new();
        let mut tarjan_stack: Vec<StateHandle> = Vec::new();
        let mut next_index = 0usize;
        let mut all_converged = true;

        let mut call_stack: Vec<Frame> = Vec::new();

        bellman_update(self.problem, self.registry, root);
        let residual = self.registry.node(root).residual;
        if residual > self.epsilon {
            all_converged = false;
        }
        index_of.insert(root, next_index);
        low_link.insert(root, next_index);
        next_index += 1;
        tarjan_stack.push(root);
        on_stack.insert(root);
        call_stack.push(Frame {
            state: root,
            trajectory_probability: 1.0,
            next_successor: 0,
            successors: self.greedy_successors(root),
        });

        while let Some(frame) = call_stack.last_mut() {
            let state = frame.state;
            let s = self.registry.state(state).clone();

            if self.problem.goal(&s) || self.registry.node(state).labels.solved() {
                call_stack.pop();
                continue;
            }

            if frame.next_successor < frame.successors.len() {
                let (next, prob) = frame.successors[frame.next_successor];
                frame.next_successor += 1;
                let trajectory_probability = frame.trajectory_probability * prob;

                if let Some(threshold) = self.i_plausibility {
                    if trajectory_probability < threshold {
                        continue;
                    }
                }

                if !index_of.contains_key(&next) {
                    bellman_update(self.problem, self.registry, next);
                    if self.registry.node(next).residual > self.epsilon {
                        all_converged = false;
                    }
                    index_of.insert(next, next_index);
                    low_link.insert(next, next_index);
                    next_index += 1;
                    tarjan_stack.push(next);
                    on_stack.insert(next);
                    let successors = self.greedy_successors(next);
                    call_stack.push(Frame {
                        state: next,
                        trajectory_probability,
                        next_successor: 0,
                        successors,
                    });
                } else if on_stack.contains(&next) {
                    let next_idx = index_of[&next];
                    let cur_low = low_link[&state];
                    low_link.insert(state, cur_low.min(next_idx));
                }
                continue;
            }

            // All successors of `state` processed: propagate low-link to
            // the parent frame, and pop an SCC if `state` is its root.
            let state_low = low_link[&state];
            call_stack.pop();
            if let Some(parent) = call_stack.last() {
                let parent_state = parent.state;
                let parent_low = low_link[&parent_state];
                low_link.insert(parent_state, parent_low.min(state_low));
            }

            if state_low == index_of[&state] {
                let mut scc = Vec::new();
                loop {
                    let member = tarjan_stack.pop().expect("scc root must be on the stack");
                    on_stack.remove(&member);
                    scc.push(member);
                    if member == state {
                        break;
                    }
                }
                if all_converged {
                    for &member in &scc {
                        self.registry.node_mut(member).labels.set_solved(true);
                    }
                }
            }
        }

        all_converged
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for Hdp<'a, M, C> {
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

            self.find_and_close_sccs(root);
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
    fn converges_and_labels_the_chain_solved() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Hdp::new(&problem, &mut reg, 1e-6, 50, 1000, None, 11, &cutoff);
        let outcome = solver.solve();
        assert!(outcome.converged);
        assert!((outcome.value - 3.0).abs() < 1e-3);
    }
}
