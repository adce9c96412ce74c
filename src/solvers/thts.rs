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

//! Trial-based Heuristic Tree Search: an explicit decision/chance node tree
//! is grown trial by trial, alternating decision and chance nodes. Each
//! trial descends from the root picking,
//! at decision nodes, the action maximizing UCB1 over chance-node means,
//! and at chance nodes sampling an outcome by its transition probability,
//! until a goal, a dead end, or `max_depth` is hit or the trial has
//! expanded `max_nodes_expanded_per_trial` fresh nodes. The trial then
//! backs its value up the path using the configured [`Backup`] rule, and
//! propagates solved labels: a chance node is solved once every outcome it
//! has expanded is itself solved and their probabilities cover the whole
//! distribution, and a decision node is solved once its best action's
//! chance node is solved. `num_virtual_rollouts` inflates the prior visit
//! count of a freshly created chance node so its initial UCB1 estimate does
//! not swing wildly on the first real visit.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use rand::Rng;

use crate::mdp::{Mdp, Successor};
use crate::registry::{ActionId, StateHandle, StateRegistry};
use crate::rng::SeededRng;
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

/// How a chance node's value estimate is updated after a trial passes
/// through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backup {
    /// Plain Monte Carlo average of all returns observed at this node.
    MonteCarlo,
    /// Average of the *best* return observed per visited decision-node
    /// child, rather than every return (reduces variance from unlucky
    /// chance outcomes).
    MaxMonteCarlo,
    /// Blends the Monte Carlo average with a one-step Bellman backup using
    /// the current children's estimates, weighted by how many children
    /// have been expanded so far.
    PartialBellman,
}

struct ChanceNode {
    visits: f64,
    total_return: f64,
    /// Outcomes of this chance node that a trial has actually sampled,
    /// keyed by their index in `Mdp::transition`'s result for this
    /// `(state, action)` pair.
    children: HashMap<usize, StateHandle>,
    solved: bool,
}

impl ChanceNode {
    fn new(virtual_rollouts: u32) -> Self {
        ChanceNode { visits: virtual_rollouts as f64, total_return: 0.0, children: HashMap::new(), solved: false }
    }
    fn mean(&self) -> f64 {
        if self.visits <= 0.0 {
            0.0
        } else {
            self.total_return / self.visits
        }
    }
}

#[derive(Default)]
struct DecisionNode {
    visits: u32,
    actions: HashMap<usize, ChanceNode>,
    solved: bool,
}

pub struct Thts<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    max_trials: usize,
    max_depth: usize,
    max_nodes_expanded_per_trial: usize,
    num_virtual_rollouts: u32,
    backup: Backup,
    exploration: f64,
    rng: SeededRng,
    cutoff: &'a C,
    tree: HashMap<StateHandle, DecisionNode>,
}

impl<'a, M: Mdp, C: Cutoff> Thts<'a, M, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        max_trials: usize,
        max_depth: usize,
        max_nodes_expanded_per_trial: usize,
        num_virtual_rollouts: u32,
        backup: Backup,
        exploration: f64,
        seed: u64,
        cutoff: &'a C,
    ) -> Self {
        Thts {
            problem,
            registry,
            max_trials,
            max_depth,
            max_nodes_expanded_per_trial,
            num_virtual_rollouts,
            backup,
            exploration,
            rng: SeededRng::from_seed(seed),
            cutoff,
            tree: HashMap::new(),
        }
    }

    fn applicable_actions(&self, state: &M::State) -> Vec<(usize, M::Action)> {
        self.problem
            .actions()
            .iter()
            .enumerate()
            .filter(|(_, a)| self.problem.applicable(state, a))
            .map(|(i, a)| (i, a.clone()))
            .collect()
    }

    fn select_action(&mut self, handle: StateHandle, applicable: &[(usize, M::Action)]) -> usize {
        let node = self.tree.entry(handle).or_default();
        node.visits += 1;

        for (idx, _) in applicable {
            if !node.actions.contains_key(idx) {
                node.actions.insert(*idx, ChanceNode::new(self.num_virtual_rollouts));
                return *idx;
            }
        }

        let ln_n = (node.visits as f64).ln();
        applicable
            .iter()
            .map(|(idx, _)| {
                let c = &node.actions[idx];
                let bonus = self.exploration * (ln_n / c.visits.max(1.0)).sqrt();
                (*idx, OrderedFloat(-c.mean() + bonus))
            })
            .max_by_key(|(_, score)| *score)
            .map(|(idx, _)| idx)
            .expect("applicable must be non-empty")
    }

    /// Whether `handle` is already known to be solved: a goal is trivially
    /// solved, otherwise solved-ness is whatever the tree has recorded for
    /// it from a previous backup.
    fn is_state_solved(&self, handle: StateHandle) -> bool {
        self.problem.goal(self.registry.state(handle)) || self.tree.get(&handle).map(|n| n.solved).unwrap_or(false)
    }

    /// The decision-node value estimate used as a Bellman target: the
    /// best chance-node mean if the node has been expanded, the heuristic
    /// otherwise.
    fn decision_value(&self, handle: StateHandle) -> f64 {
        match self.tree.get(&handle) {
            Some(n) if !n.actions.is_empty() => n.actions.values().map(|c| c.mean()).fold(f64::INFINITY, f64::min),
            _ => self.problem.heuristic(self.registry.state(handle)),
        }
    }

    /// Runs one trial, expanding at most `max_nodes_expanded_per_trial`
    /// fresh decision nodes, and backs the return up the visited path
    /// according to `self.backup`, propagating solved labels as it goes.
    fn trial(&mut self, root: StateHandle) {
        let mut path: Vec<(StateHandle, usize, f64, StateHandle, usize)> = Vec::new();
        let mut current = root;
        let mut expansions = 0usize;
        let mut leaf_value = 0.0;

        for _ in 0..self.max_depth {
            let s = self.registry.state(current).clone();
            if self.problem.goal(&s) {
                break;
            }
            let applicable = self.applicable_actions(&s);
            if applicable.is_empty() {
                leaf_value = self.problem.dead_end_cost();
                break;
            }

            let is_fresh = !self.tree.contains_key(&current);
            if is_fresh {
                if expansions >= self.max_nodes_expanded_per_trial {
                    leaf_value = self.problem.heuristic(&s);
                    break;
                }
                expansions += 1;
            }

            let chosen_idx = self.select_action(current, &applicable);
            let action = self.problem.actions()[chosen_idx].clone();
            let cost = self.problem.cost(&s, &action);
            let successors = self.problem.transition(&s, &action);
            let mut roll = self.rng.inner_mut().random::<f64>();
            let mut outcome_idx = successors.len() - 1;
            for (idx, succ) in successors.iter().enumerate() {
                if roll < succ.probability {
                    outcome_idx = idx;
                    break;
                }
                roll -= succ.probability;
            }
            let next_state = successors[outcome_idx].state.clone();
            let h = self.problem.heuristic(&next_state);
            let next = self.registry.intern(next_state, h);

            path.push((current, chosen_idx, cost, next, outcome_idx));
            current = next;
        }

        let mut total = leaf_value;
        for &(state, chosen_idx, cost, child, outcome_idx) in path.iter().rev() {
            total += cost;
            let child_mean = self
                .tree
                .get(&child)
                .map(|n| n.actions.values().map(|c| c.mean()).fold(f64::INFINITY, f64::min))
                .unwrap_or(total);

            let s = self.registry.state(state).clone();
            let action = self.problem.actions()[chosen_idx].clone();
            let successors: Vec<Successor<M::State>> = self.problem.transition(&s, &action);

            let virtual_rollouts = self.num_virtual_rollouts;
            let node = self.tree.entry(state).or_default();
            node.actions.entry(chosen_idx).or_insert_with(|| ChanceNode::new(virtual_rollouts));
            let (old_children, old_mean) = {
                let chance = &self.tree[&state].actions[&chosen_idx];
                (chance.children.clone(), chance.mean())
            };

            let backed_up = match self.backup {
                Backup::MonteCarlo => total,
                Backup::MaxMonteCarlo => total.min(cost + child_mean),
                Backup::PartialBellman => {
                    let mut known = old_children.clone();
                    known.insert(outcome_idx, child);
                    let mut known_mass = 0.0;
                    let mut weighted_value = 0.0;
                    for (&idx, &child_h) in known.iter() {
                        if let Some(succ) = successors.get(idx) {
                            known_mass += succ.probability;
                            weighted_value += succ.probability * self.decision_value(child_h);
                        }
                    }
                    let unknown_mass = (1.0 - known_mass).max(0.0);
                    cost + weighted_value + unknown_mass * old_mean
                }
            };

            let chance = self.tree.get_mut(&state).unwrap().actions.get_mut(&chosen_idx).unwrap();
            chance.visits += 1.0;
            chance.children.insert(outcome_idx, child);
            chance.total_return += backed_up;

            let chance_solved = {
                let chance = &self.tree[&state].actions[&chosen_idx];
                let mut covered_mass = 0.0;
                let mut all_solved = true;
                for (&idx, &child_h) in &chance.children {
                    if let Some(succ) = successors.get(idx) {
                        covered_mass += succ.probability;
                    }
                    if !self.is_state_solved(child_h) {
                        all_solved = false;
                    }
                }
                all_solved && (covered_mass - 1.0).abs() < 1e-6
            };
            self.tree.get_mut(&state).unwrap().actions.get_mut(&chosen_idx).unwrap().solved = chance_solved;

            let decision_solved = {
                let node = &self.tree[&state];
                node.actions
                    .values()
                    .min_by(|a, b| a.mean().partial_cmp(&b.mean()).unwrap())
                    .map(|c| c.solved)
                    .unwrap_or(false)
            };
            self.tree.get_mut(&state).unwrap().solved = decision_solved;
        }
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for Thts<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let initial = self.problem.initial_state();
        let h0 = self.problem.heuristic(&initial);
        let root = self.registry.intern(initial, h0);

        let mut reason = None;
        let mut trial = 0;
        while trial < self.max_trials {
            if self.cutoff.must_stop() {
                reason = Some(Reason::CutoffOccurred);
                break;
            }
            self.trial(root);
            trial += 1;
        }

        let value = self
            .tree
            .get(&root)
            .map(|n| n.actions.values().map(|c| c.mean()).fold(f64::INFINITY, f64::min))
            .unwrap_or(h0);

        SolveOutcome {
            converged: reason.is_none(),
            reason,
            value,
            states_touched: self.tree.len(),
        }
    }

    /// Recommends the action with the best empirical mean at the root,
    /// breaking ties by the most-visited chance node, matching
    /// `THTSSolver::recommend`'s tie-break.
    fn recommended_action(&self) -> Option<ActionId> {
        let initial = self.problem.initial_state();
        let root = self.registry.get(&initial)?;
        let node = self.tree.get(&root)?;
        node.actions
            .iter()
            .max_by(|(_, a), (_, b)| {
                (-a.mean())
                    .partial_cmp(&-b.mean())
                    .unwrap()
                    .then_with(|| a.visits.partial_cmp(&b.visits).unwrap())
            })
            .map(|(idx, _)| ActionId(*idx))
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
    fn thts_with_monte_carlo_backup_prefers_the_cheaper_action() {
        let problem = TwoActions;
        let mut reg: StateRegistry<TwoActions> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Thts::new(&problem, &mut reg, 200, 5, 1000, 1, Backup::MonteCarlo, 1.4, 7, &cutoff);
        solver.solve();
        assert_eq!(Some(ActionId(0)), solver.recommended_action());
    }

    #[test]
    fn thts_with_partial_bellman_backup_prefers_the_cheaper_action() {
        let problem = TwoActions;
        let mut reg: StateRegistry<TwoActions> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Thts::new(&problem, &mut reg, 200, 5, 1000, 1, Backup::PartialBellman, 1.4, 11, &cutoff);
        solver.solve();
        assert_eq!(Some(ActionId(0)), solver.recommended_action());
    }
}
