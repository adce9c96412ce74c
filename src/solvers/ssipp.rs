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

//! Short-Sighted Probabilistic Planner: at every decision point, builds a
//! short-sighted sub-MDP over the states reachable from the current state
//! within `horizon` steps (or, when `use_traj_probabilities` is set, whose
//! trajectory probability stays above `rho`), with terminal cost given by
//! `Mdp::heuristic`, and solves it to completion with an embedded LAO*
//! before taking one real step and repeating. `LabeledSsipp` additionally
//! checks whether the current state is already labeled `SOLVED` on the
//! short-sighted sub-problem, skipping the re-solve when it is.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::mdp::Mdp;
use crate::reduction::wrapper::{StateSetScope, WrapperProblem};
use crate::registry::{ActionId, StateRegistry};
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

use super::lao::LaoStar;

/// Builds the scope of the short-sighted sub-problem rooted at `start`:
/// every state reachable within `horizon` steps, or (when `rho` is set)
/// reachable with cumulative trajectory probability at least `rho`,
/// whichever cuts the region first.
fn short_sighted_scope<M: Mdp>(problem: &M, start: &M::State, horizon: usize, rho: Option<f64>) -> HashSet<M::State> {
    let mut scope = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back((start.clone(), 0usize, 1.0f64));
    scope.insert(start.clone());

    while let Some((state, depth, trajectory_probability)) = queue.pop_front() {
        if depth >= horizon {
            continue;
        }
        if let Some(threshold) = rho {
            if trajectory_probability < threshold {
                continue;
            }
        }
        if problem.goal(&state) {
            continue;
        }
        for action in problem.actions() {
            if !problem.applicable(&state, action) {
                continue;
            }
            for succ in problem.transition(&state, action) {
                let next_probability = trajectory_probability * succ.probability;
                if scope.insert(succ.state.clone()) {
                    queue.push_back((succ.state, depth + 1, next_probability));
                }
            }
        }
    }
    scope
}

pub struct Ssipp<'a, M: Mdp, C: Cutoff> {
    problem: &'a Arc<M>,
    registry: &'a mut StateRegistry<M>,
    horizon: usize,
    use_traj_probabilities: bool,
    rho: f64,
    embedded_epsilon: f64,
    max_steps: usize,
    cutoff: &'a C,
}

impl<'a, M: Mdp, C: Cutoff> Ssipp<'a, M, C> {
    pub fn new(
        problem: &'a Arc<M>,
        registry: &'a mut StateRegistry<M>,
        horizon: usize,
        use_traj_probabilities: bool,
        rho: f64,
        embedded_epsilon: f64,
        max_steps: usize,
        cutoff: &'a C,
    ) -> Self {
        Ssipp {
            problem,
            registry,
            horizon,
            use_traj_probabilities,
            rho,
            embedded_epsilon,
            max_steps,
            cutoff,
        }
    }

    /// Solves the short-sighted sub-MDP rooted at `state` and copies back
    /// its recommended action for `state` into the shared registry. When
    /// `mark_solved` is set, the state is labeled `SOLVED` in the shared
    /// registry once the embedded LAO* converges, so that `LabeledSsipp`
    /// can skip the re-solve on a later visit.
    fn resolve_one_step(&mut self, state: M::State, mark_solved: bool) -> Option<ActionId> {
        let rho = if self.use_traj_probabilities { Some(self.rho) } else { None };
        let members = short_sighted_scope(self.problem.as_ref(), &state, self.horizon, rho);
        let scope = StateSetScope::new(members);
        let wrapped = WrapperProblem::new(Arc::clone(self.problem), state.clone(), scope);

        let mut sub_registry: StateRegistry<WrapperProblem<M, StateSetScope<M::State>>> = StateRegistry::new();
        let no_cutoff = crate::solver::NoCutoff;
        let mut embedded = LaoStar::new(&wrapped, &mut sub_registry, self.embedded_epsilon, 1.0, 10_000, &no_cutoff);
        let sub_outcome = embedded.solve();

        let root = sub_registry.get(&state)?;
        let action_id = sub_registry.node(root).best_action?;
        let value = sub_registry.node(root).value;

        let handle = self.registry.intern(state, self.problem.heuristic(&sub_registry.state(root).clone()));
        self.registry.node_mut(handle).value = value;
        self.registry.node_mut(handle).best_action = Some(action_id);
        if mark_solved && sub_outcome.converged {
            self.registry.node_mut(handle).labels.set_solved(true);
        }
        Some(action_id)
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for Ssipp<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let mut state = self.problem.initial_state();
        let mut steps = 0usize;
        let mut reason = None;
        let mut total_cost = 0.0;
        let mut root_handle = None;

        loop {
            if self.problem.goal(&state) {
                break;
            }
            if self.cutoff.must_stop() {
                reason = Some(Reason::CutoffOccurred);
                break;
            }
            if steps >= self.max_steps {
                reason = Some(Reason::IterationCapReached);
                break;
            }

            let action_id = match self.resolve_one_step(state.clone(), false) {
                Some(a) => a,
                None => {
                    reason = Some(Reason::IterationCapReached);
                    break;
                }
            };
            if root_handle.is_none() {
                let h = self.problem.heuristic(&state);
                root_handle = Some(self.registry.intern(state.clone(), h));
            }

            let action = self.problem.actions()[action_id.index()].clone();
            total_cost += self.problem.cost(&state, &action);
            let successors = self.problem.transition(&state, &action);
            state = successors
                .iter()
                .max_by(|a, b| a.probability.partial_cmp(&b.probability).unwrap())
                .map(|s| s.state.clone())
                .expect("an applicable action must have at least one outcome");

            steps += 1;
        }

        let value = root_handle.map(|h| self.registry.node(h).value).unwrap_or(total_cost);
        SolveOutcome {
            converged: reason.is_none(),
            reason,
            value,
            states_touched: steps,
        }
    }

    fn recommended_action(&self) -> Option<ActionId> {
        let initial = self.problem.initial_state();
        self.registry.get(&initial).and_then(|h| self.registry.node(h).best_action)
    }
}

/// `LabeledSsipp`: like [`Ssipp`], but skips the re-solve of the
/// short-sighted sub-problem when the current state is already labeled
/// `SOLVED` in the shared registry, reusing its cached `best_action`
/// instead — the same solved-label short-circuit `LRTDP` applies to the
/// full state space, applied here to the short-sighted sub-MDP.
pub struct LabeledSsipp<'a, M: Mdp, C: Cutoff> {
    inner: Ssipp<'a, M, C>,
}

impl<'a, M: Mdp, C: Cutoff> LabeledSsipp<'a, M, C> {
    pub fn new(inner: Ssipp<'a, M, C>) -> Self {
        LabeledSsipp { inner }
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for LabeledSsipp<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let mut state = self.inner.problem.initial_state();
        let mut steps = 0usize;
        let mut reason = None;
        let mut total_cost = 0.0;
        let mut root_handle = None;

        loop {
            if self.inner.problem.goal(&state) {
                break;
            }
            if self.inner.cutoff.must_stop() {
                reason = Some(Reason::CutoffOccurred);
                break;
            }
            if steps >= self.inner.max_steps {
                reason = Some(Reason::IterationCapReached);
                break;
            }

            let h = self.inner.problem.heuristic(&state);
            let handle = self.inner.registry.intern(state.clone(), h);
            if root_handle.is_none() {
                root_handle = Some(handle);
            }

            let action_id = if self.inner.registry.node(handle).labels.solved() {
                match self.inner.registry.node(handle).best_action {
                    Some(a) => a,
                    None => break,
                }
            } else {
                match self.inner.resolve_one_step(state.clone(), true) {
                    Some(a) => a,
                    None => {
                        reason = Some(Reason::IterationCapReached);
                        break;
                    }
                }
            };

            let action = self.inner.problem.actions()[action_id.index()].clone();
            total_cost += self.inner.problem.cost(&state, &action);
            let successors = self.inner.problem.transition(&state, &action);
            state = successors
                .iter()
                .max_by(|a, b| a.probability.partial_cmp(&b.probability).unwrap())
                .map(|s| s.state.clone())
                .expect("an applicable action must have at least one outcome");

            steps += 1;
        }

        let value = root_handle.map(|h| self.inner.registry.node(h).value).unwrap_or(total_cost);
        SolveOutcome {
            converged: reason.is_none(),
            reason,
            value,
            states_touched: steps,
        }
    }

    fn recommended_action(&self) -> Option<ActionId> {
        self.inner.recommended_action()
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
        fn applicable(&self, s: &u32, _: &()) -> bool { *s < 5 }
        fn transition(&self, s: &u32, _: &()) -> Vec<Successor<u32>> {
            vec![Successor::new(s + 1, 1.0)]
        }
        fn cost(&self, _: &u32, _: &()) -> f64 { 1.0 }
        fn goal(&self, s: &u32) -> bool { *s == 5 }
    }

    #[test]
    fn short_sighted_scope_is_bounded_by_the_horizon() {
        let problem = Chain;
        let scope = short_sighted_scope(&problem, &0u32, 2, None);
        assert!(scope.contains(&0));
        assert!(scope.contains(&2));
        assert!(!scope.contains(&3));
    }

    #[test]
    fn ssipp_reaches_the_goal_on_a_chain() {
        let problem = Arc::new(Chain);
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Ssipp::new(&problem, &mut reg, 2, false, 0.0, 1e-6, 20, &cutoff);
        let outcome = solver.solve();
        assert!(outcome.converged);
        assert!((outcome.value - 5.0).abs() < 1.0);
    }

    #[test]
    fn labeled_ssipp_reaches_the_goal_and_labels_visited_states_solved() {
        let problem = Arc::new(Chain);
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let inner = Ssipp::new(&problem, &mut reg, 2, false, 0.0, 1e-6, 20, &cutoff);
        let mut solver = LabeledSsipp::new(inner);
        let outcome = solver.solve();
        assert!(outcome.converged);
        assert!((outcome.value - 5.0).abs() < 1.0);

        let handle = solver.inner.registry.get(&0u32).expect("initial state must be interned");
        assert!(solver.inner.registry.node(handle).labels.solved());
    }
}
