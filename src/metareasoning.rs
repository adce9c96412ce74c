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

//! Metareasoning simulator: replays a series of Value Iteration snapshots
//! as if planning and acting happened concurrently. At each real-world
//! step, the current [`ActionSelectionRule`] decides whether the agent
//! should spend one more unit of deliberation (a "NOP", costed at
//! `nop_cost`) continuing to refine its plan against the next VI snapshot,
//! or commit to executing the greedy action recommended by the latest
//! snapshot it has consulted so far.

use std::collections::HashMap;

use crate::mdp::Mdp;
use crate::registry::StateHandle;

/// Decides, at each real-world step, whether to NOP (keep deliberating)
/// or act on the best plan found so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSelectionRule {
    /// NOP whenever the Bellman residual at the current state under the
    /// latest consulted snapshot still exceeds `epsilon`; act once it
    /// drops below.
    MetaAssumption1,
    /// Like `MetaAssumption1`, but allows up to `max_consecutive_nops`
    /// NOPs in a row before forcing an action regardless of residual.
    MetaAssumption1MultipleNops,
    /// NOP while the greedy action recommended by the latest snapshot
    /// still differs from the one recommended by the previous snapshot
    /// (the plan is still changing).
    MetaAssumption2,
    /// NOP only on the single step where the recommended action would
    /// change relative to the last one actually executed; otherwise act
    /// immediately on the current recommendation.
    MetaChangeAction,
    /// Never NOP: always execute the action recommended by the latest
    /// available snapshot, however unconverged.
    NoMeta,
    /// NOP until the greedy action's Q-value improvement between two
    /// consecutive snapshots drops below `epsilon`.
    QValImprov,
    /// The omniscient baseline: deliberate through every snapshot before
    /// acting at all, then execute the fully converged policy.
    Optimal,
}

/// One per-iteration Value Iteration snapshot: the state values computed
/// after that sweep, keyed by registry handle.
pub type ValueSnapshot = HashMap<StateHandle, f64>;

pub struct MetareasoningSimulator<'a, M: Mdp> {
    problem: &'a M,
    history: Vec<ValueSnapshot>,
    /// Maps a registry handle back to its domain state, needed because the
    /// simulator walks the real problem while `history` only carries
    /// handles and values.
    states_by_handle: HashMap<StateHandle, M::State>,
    rule: ActionSelectionRule,
    epsilon: f64,
    nop_cost: f64,
    gamma: f64,
    max_consecutive_nops: usize,
    max_steps: usize,
}

impl<'a, M: Mdp> MetareasoningSimulator<'a, M> {
    pub fn new(
        problem: &'a M,
        history: Vec<Vec<(StateHandle, f64)>>,
        states_by_handle: HashMap<StateHandle, M::State>,
        rule: ActionSelectionRule,
        epsilon: f64,
        nop_cost: f64,
        gamma: f64,
        max_consecutive_nops: usize,
        max_steps: usize,
    ) -> Self {
        debug_assert!(gamma < 1.0, "metareasoning's discount factor must stay below 1.0");
        let history = history
            .into_iter()
            .map(|snapshot| snapshot.into_iter().collect::<ValueSnapshot>())
            .collect();
        MetareasoningSimulator {
            problem,
            history,
            states_by_handle,
            rule,
            epsilon,
            nop_cost,
            gamma,
            max_consecutive_nops,
            max_steps,
        }
    }

    fn value_of(&self, snapshot_idx: usize, state: &M::State) -> f64 {
        self.states_by_handle
            .iter()
            .find(|(_, s)| *s == state)
            .and_then(|(h, _)| self.history[snapshot_idx].get(h))
            .copied()
            .unwrap_or_else(|| self.problem.heuristic(state))
    }

    /// The greedy action and its Q-value at `state`, looking up successor
    /// values in snapshot `snapshot_idx`.
    fn greedy(&self, snapshot_idx: usize, state: &M::State) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, action) in self.problem.actions().iter().enumerate() {
            if !self.problem.applicable(state, action) {
                continue;
            }
            let mut q = self.problem.cost(state, action);
            for succ in self.problem.transition(state, action) {
                q += self.gamma * succ.probability * self.value_of(snapshot_idx, &succ.state);
            }
            if best.map(|(_, bv)| q < bv).unwrap_or(true) {
                best = Some((idx, q));
            }
        }
        best
    }

    fn residual(&self, snapshot_idx: usize, state: &M::State) -> f64 {
        let current = self.value_of(snapshot_idx, state);
        match self.greedy(snapshot_idx, state) {
            Some((_, q)) => (current - q).abs(),
            None => 0.0,
        }
    }

    /// Decides, from `snapshot_idx` (the latest snapshot consulted so
    /// far), `previous_snapshot_idx` (the one before it, if any), and
    /// `consecutive_nops`, whether to NOP.
    fn should_nop(
        &self,
        state: &M::State,
        snapshot_idx: usize,
        previous_snapshot_idx: Option<usize>,
        consecutive_nops: usize,
        last_executed_action: Option<usize>,
    ) -> bool {
        match self.rule {
            ActionSelectionRule::NoMeta => false,
            ActionSelectionRule::Optimal => snapshot_idx + 1 < self.history.len(),
            ActionSelectionRule::MetaAssumption1 => self.residual(snapshot_idx, state) > self.epsilon,
            ActionSelectionRule::MetaAssumption1MultipleNops => {
                consecutive_nops < self.max_consecutive_nops && self.residual(snapshot_idx, state) > self.epsilon
            }
            ActionSelectionRule::MetaAssumption2 => match previous_snapshot_idx {
                None => snapshot_idx + 1 < self.history.len(),
                Some(prev) => {
                    let current_best = self.greedy(snapshot_idx, state).map(|(a, _)| a);
                    let previous_best = self.greedy(prev, state).map(|(a, _)| a);
                    current_best != previous_best && snapshot_idx + 1 < self.history.len()
                }
            },
            ActionSelectionRule::MetaChangeAction => {
                let current_best = self.greedy(snapshot_idx, state).map(|(a, _)| a);
                current_best != last_executed_action && snapshot_idx + 1 < self.history.len()
            }
            ActionSelectionRule::QValImprov => match previous_snapshot_idx {
                None => snapshot_idx + 1 < self.history.len(),
                Some(prev) => {
                    let current = self.greedy(snapshot_idx, state).map(|(_, q)| q).unwrap_or(0.0);
                    let previous = self.greedy(prev, state).map(|(_, q)| q).unwrap_or(0.0);
                    (previous - current).abs() > self.epsilon && snapshot_idx + 1 < self.history.len()
                }
            },
        }
    }

    /// Simulates one execution trace, returning `(total_cost, nop_cost)`
    /// where `total_cost` includes both real-world action costs and
    /// accumulated NOP costs, and `nop_cost` isolates the latter.
    pub fn simulate(&self) -> (f64, f64) {
        let mut state = self.problem.initial_state();
        let mut total_cost = 0.0;
        let mut total_nop_cost = 0.0;
        let mut snapshot_idx = 0usize;
        let mut previous_snapshot_idx: Option<usize> = None;
        let mut consecutive_nops = 0usize;
        let mut last_executed_action: Option<usize> = None;
        let mut steps = 0usize;

        if self.history.is_empty() {
            return (0.0, 0.0);
        }

        while !self.problem.goal(&state) && steps < self.max_steps {
            if self.should_nop(&state, snapshot_idx, previous_snapshot_idx, consecutive_nops, last_executed_action) {
                total_cost += self.nop_cost;
                total_nop_cost += self.nop_cost;
                previous_snapshot_idx = Some(snapshot_idx);
                snapshot_idx = (snapshot_idx + 1).min(self.history.len() - 1);
                consecutive_nops += 1;
                steps += 1;
                continue;
            }

            consecutive_nops = 0;
            let (action_idx, _) = match self.greedy(snapshot_idx, &state) {
                Some(a) => a,
                None => {
                    total_cost += self.problem.dead_end_cost();
                    break;
                }
            };
            last_executed_action = Some(action_idx);
            let action = self.problem.actions()[action_idx].clone();
            total_cost += self.problem.cost(&state, &action);

            let successors = self.problem.transition(&state, &action);
            state = successors
                .iter()
                .max_by(|a, b| a.probability.partial_cmp(&b.probability).unwrap())
                .map(|s| s.state.clone())
                .expect("an applicable action must have at least one outcome");
            steps += 1;
        }

        (total_cost, total_nop_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bellman::generate_all;
    use crate::mdp::Successor;
    use crate::registry::StateRegistry;
    use crate::solver::{NoCutoff, Solver};
    use crate::solvers::vi::ValueIteration;

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

    fn run(rule: ActionSelectionRule) -> (f64, f64) {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let states = generate_all(&problem, &mut reg);
        let cutoff = NoCutoff;
        let states_by_handle = states.iter().map(|&h| (h, reg.state(h).clone())).collect();
        let mut vi = ValueIteration::new(&problem, &mut reg, states.clone(), 1e-9, 100, &cutoff);
        vi.solve();

        let sim = MetareasoningSimulator::new(&problem, vi.history.clone(), states_by_handle, rule, 1e-6, 0.1, 0.99, 3, 50);
        sim.simulate()
    }

    #[test]
    fn no_meta_incurs_no_deliberation_cost() {
        let (_, nop_cost) = run(ActionSelectionRule::NoMeta);
        assert_eq!(0.0, nop_cost);
    }

    #[test]
    fn optimal_reaches_the_goal_with_the_converged_policy() {
        let (total_cost, _) = run(ActionSelectionRule::Optimal);
        assert!(total_cost >= 3.0);
    }

    #[test]
    fn meta_assumption_1_never_exceeds_the_step_budget() {
        let (total_cost, nop_cost) = run(ActionSelectionRule::MetaAssumption1);
        assert!(total_cost >= nop_cost);
    }
}
