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

//! UCT: Monte Carlo tree search over the UCB1 action-selection rule.
//! `rollouts` simulations are run from the current state, each descending
//! the visit-count tree by UCB1 until `cutoff_depth`, at which point the
//! heuristic is used in place of a rollout policy. `delta` throttles
//! re-evaluation: the recommended action is only recomputed once the
//! visit count at the root has grown by at least `delta` since the last
//! recommendation.

use std::cell::Cell;
use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::mdp::Mdp;
use crate::registry::{ActionId, StateHandle, StateRegistry};
use crate::rng::SeededRng;
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

/// How the UCB1 exploration constant is chosen.
#[derive(Debug, Clone, Copy)]
pub enum UctExploration {
    /// A fixed constant, the usual `sqrt(2)` or a domain-tuned value.
    Fixed(f64),
    /// Derived from the spread of Q-values seen at a node so far: `c =
    /// spread / 2`, widening exploration automatically on noisier nodes.
    QValueDerived,
}

#[derive(Default)]
struct ActionStats {
    visits: u32,
    total_return: f64,
}

#[derive(Default)]
struct NodeStats {
    visits: u32,
    actions: HashMap<usize, ActionStats>,
}

pub struct Uct<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    rollouts: usize,
    cutoff_depth: usize,
    exploration: UctExploration,
    delta: u32,
    rng: SeededRng,
    cutoff: &'a C,
    tree: HashMap<StateHandle, NodeStats>,
    /// `(root visit count, recommendation)` as of the last time
    /// `recommended_action` actually recomputed, used to throttle
    /// re-evaluation by `delta`.
    last_recommendation: Cell<Option<(u32, Option<ActionId>)>>,
}

impl<'a, M: Mdp, C: Cutoff> Uct<'a, M, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        rollouts: usize,
        cutoff_depth: usize,
        exploration: UctExploration,
        delta: u32,
        seed: u64,
        cutoff: &'a C,
    ) -> Self {
        Uct {
            problem,
            registry,
            rollouts,
            cutoff_depth,
            exploration,
            delta: delta.max(1),
            rng: SeededRng::from_seed(seed),
            cutoff,
            tree: HashMap::new(),
            last_recommendation: Cell::new(None),
        }
    }

    fn exploration_constant(&self, stats: &NodeStats) -> f64 {
        match self.exploration {
            UctExploration::Fixed(c) => c,
            UctExploration::QValueDerived => {
                let means: Vec<f64> = stats
                    .actions
                    .values()
                    .filter(|a| a.visits > 0)
                    .map(|a| a.total_return / a.visits as f64)
                    .collect();
                if means.len() < 2 {
                    return 1.0;
                }
                let min = means.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = means.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                ((max - min) / 2.0).max(0.1)
            }
        }
    }

    /// Picks the action to expand at `state`: the first unvisited action,
    /// or the UCB1-maximizing one if every applicable action has been
    /// tried at least once.
    fn select_action(&mut self, state: StateHandle, applicable: &[(usize, M::Action)]) -> usize {
        self.tree.entry(state).or_default();
        let c = {
            let stats = self.tree.get(&state).unwrap();
            self.exploration_constant_for(stats)
        };
        let stats = self.tree.entry(state).or_default();
        stats.visits += 1;

        for (idx, _) in applicable {
            if !stats.actions.contains_key(idx) {
                stats.actions.insert(*idx, ActionStats::default());
                return *idx;
            }
        }

        applicable
            .iter()
            .map(|(idx, _)| {
                let a = &stats.actions[idx];
                let mean = -a.total_return / a.visits as f64; // minimize cost -> maximize -cost
                let bonus = c * ((stats.visits as f64).ln() / a.visits as f64).sqrt();
                (*idx, OrderedFloat(mean + bonus))
            })
            .max_by_key(|(_, score)| *score)
            .map(|(idx, _)| idx)
            .expect("applicable must be non-empty")
    }

    fn exploration_constant_for(&self, stats: &NodeStats) -> f64 {
        self.exploration_constant(stats)
    }

    /// One simulated rollout from `state`. Descends the UCB1 tree
    /// iteratively (never recursively, per this crate's redesign notes),
    /// collecting `(state, chosen action index, immediate cost)` triples,
    /// then walks the collected path backwards to fold in the leaf value
    /// and update every visited node's action statistics.
    fn simulate(&mut self, root: StateHandle) -> f64 {
        let mut path: Vec<(StateHandle, usize, f64)> = Vec::new();
        let mut current = root;
        let mut leaf_value = 0.0;

        for depth in 0..self.cutoff_depth {
            let s = self.registry.state(current).clone();
            if self.problem.goal(&s) {
                break;
            }

            let applicable: Vec<(usize, M::Action)> = self
                .problem
                .actions()
                .iter()
                .enumerate()
                .filter(|(_, a)| self.problem.applicable(&s, a))
                .map(|(i, a)| (i, a.clone()))
                .collect();
            if applicable.is_empty() {
                leaf_value = self.problem.dead_end_cost();
                break;
            }

            let chosen_idx = self.select_action(current, &applicable);
            let action = self.problem.actions()[chosen_idx].clone();
            let cost = self.problem.cost(&s, &action);
            let next =
                crate::bellman::random_successor(self.problem, self.registry, current, &action, self.rng.inner_mut());
            path.push((current, chosen_idx, cost));
            current = next;

            if depth + 1 == self.cutoff_depth {
                leaf_value = self.problem.heuristic(self.registry.state(current));
            }
        }

        let mut total = leaf_value;
        for &(state, chosen_idx, cost) in path.iter().rev() {
            total += cost;
            let stats = self.tree.entry(state).or_default();
            let action_stats = stats.actions.entry(chosen_idx).or_default();
            action_stats.visits += 1;
            action_stats.total_return += -total;
        }
        total
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for Uct<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let initial = self.problem.initial_state();
        let h0 = self.problem.heuristic(&initial);
        let root = self.registry.intern(initial, h0);

        let mut reason = None;
        let mut rollout = 0;
        while rollout < self.rollouts {
            if self.cutoff.must_stop() {
                reason = Some(Reason::CutoffOccurred);
                break;
            }
            self.simulate(root);
            rollout += 1;
        }

        let value = self
            .tree
            .get(&root)
            .and_then(|stats| {
                stats
                    .actions
                    .values()
                    .filter(|a| a.visits > 0)
                    .map(|a| a.total_return / a.visits as f64)
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m: f64| m.max(v))))
            })
            .map(|best_mean| -best_mean)
            .unwrap_or(h0);

        SolveOutcome {
            converged: reason.is_none(),
            reason,
            value,
            states_touched: self.tree.len(),
        }
    }

    fn recommended_action(&self) -> Option<ActionId> {
        let initial = self.problem.initial_state();
        let root = self.registry.get(&initial)?;
        let stats = self.tree.get(&root)?;

        if let Some((visits_at_last, cached)) = self.last_recommendation.get() {
            if stats.visits < visits_at_last + self.delta {
                return cached;
            }
        }

        let recommendation = stats
            .actions
            .iter()
            .filter(|(_, a)| a.visits > 0)
            .max_by_key(|(_, a)| OrderedFloat(a.total_return / a.visits as f64))
            .map(|(idx, _)| ActionId(*idx));
        self.last_recommendation.set(Some((stats.visits, recommendation)));
        recommendation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::Successor;
    use crate::solver::NoCutoff;

    struct TwoActions;
    impl Mdp for TwoActions {
        type State = u32;
        type Action = bool;
        fn initial_state(&self) -> u32 { 0 }
        fn actions(&self) -> &[bool] { &[true, false] }
        fn applicable(&self, s: &u32, _: &bool) -> bool { *s == 0 }
        fn transition(&self, _: &u32, a: &bool) -> Vec<Successor<u32>> {
            if *a { vec![Successor::new(1, 1.0)] } else { vec![Successor::new(2, 1.0)] }
        }
        fn cost(&self, _: &u32, a: &bool) -> f64 { if *a { 1.0 } else { 5.0 } }
        fn goal(&self, s: &u32) -> bool { *s == 1 || *s == 2 }
    }

    #[test]
    fn uct_prefers_the_cheaper_action_given_enough_rollouts() {
        let problem = TwoActions;
        let mut reg: StateRegistry<TwoActions> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Uct::new(&problem, &mut reg, 200, 5, UctExploration::Fixed(1.4), 1, 9, &cutoff);
        solver.solve();
        assert_eq!(Some(ActionId(0)), solver.recommended_action());
    }
}
