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

//! Hindsight Optimization: estimates the Q-value of each applicable action
//! at the current state by sampling `n_scenarios` full determinizations of
//! the future (one random outcome per transition, fixed in advance) and
//! solving each resulting deterministic shortest-path problem exactly,
//! averaging the results. The deterministic solve is a small Dijkstra-style
//! relaxation loop implemented locally (no external graph crate — this is
//! the one place the core needs shortest paths over non-negative edge
//! weights, solved by rolling a `binary-heap-plus` min-heap directly
//! rather than pulling in a graph library).

use binary_heap_plus::BinaryHeap;
use ordered_float::OrderedFloat;
use rand::Rng;

use crate::mdp::Mdp;
use crate::registry::{ActionId, StateRegistry};
use crate::rng::SeededRng;
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

pub struct Hop<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    n_scenarios: usize,
    max_horizon: usize,
    rng: SeededRng,
    cutoff: &'a C,
}

impl<'a, M: Mdp, C: Cutoff> Hop<'a, M, C> {
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        n_scenarios: usize,
        max_horizon: usize,
        seed: u64,
        cutoff: &'a C,
    ) -> Self {
        Hop { problem, registry, n_scenarios, max_horizon, rng: SeededRng::from_seed(seed), cutoff }
    }

    /// Draws one determinized scenario rooted at `(state, first_action)`:
    /// a fixed outcome for every transition encountered while solving the
    /// resulting deterministic shortest-path problem with Dijkstra's
    /// algorithm (min-heap ordered by tentative cost-to-go).
    fn scenario_cost(&mut self, state: &M::State, first_action: &M::Action) -> f64 {
        let first_successors = self.problem.transition(state, first_action);
        let start = self.sample(&first_successors);
        let immediate = self.problem.cost(state, first_action);

        let mut heap = BinaryHeap::new_by(|a: &(OrderedFloat<f64>, u64), b: &(OrderedFloat<f64>, u64)| b.0.cmp(&a.0));
        let mut best: std::collections::HashMap<u64, f64> = std::collections::HashMap::new();
        let mut states: std::collections::HashMap<u64, M::State> = std::collections::HashMap::new();
        let mut next_id = 0u64;

        let start_id = next_id;
        next_id += 1;
        states.insert(start_id, start.clone());
        best.insert(start_id, 0.0);
        heap.push((OrderedFloat(0.0), start_id));

        let mut reached_goal_cost = None;
        let mut expansions = 0;

        while let Some((OrderedFloat(cost_so_far), id)) = heap.pop() {
            expansions += 1;
            if expansions > self.max_horizon {
                break;
            }
            let s = states[&id].clone();
            if self.problem.goal(&s) {
                reached_goal_cost = Some(cost_so_far);
                break;
            }
            if cost_so_far > *best.get(&id).unwrap_or(&f64::INFINITY) {
                continue;
            }

            for action in self.problem.actions() {
                if !self.problem.applicable(&s, action) {
                    continue;
                }
                let successors = self.problem.transition(&s, action);
                let next_state = self.sample(&successors);
                let next_cost = cost_so_far + self.problem.cost(&s, action);

                let sid = next_id;
                next_id += 1;
                let entry = best.entry(sid).or_insert(f64::INFINITY);
                if next_cost < *entry {
                    *entry = next_cost;
                    states.insert(sid, next_state);
                    heap.push((OrderedFloat(next_cost), sid));
                }
            }
        }

        immediate + reached_goal_cost.unwrap_or(self.problem.dead_end_cost())
    }

    fn sample(&mut self, successors: &[crate::mdp::Successor<M::State>]) -> M::State {
        let mut roll = self.rng.inner_mut().random::<f64>();
        for succ in successors {
            if roll < succ.probability {
                return succ.state.clone();
            }
            roll -= succ.probability;
        }
        successors.last().expect("transition must not be empty for an applicable action").state.clone()
    }

    fn hindsight_qvalue(&mut self, state: &M::State, action: &M::Action) -> f64 {
        let mut total = 0.0;
        for _ in 0..self.n_scenarios {
            total += self.scenario_cost(state, action);
        }
        total / self.n_scenarios as f64
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for Hop<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let initial = self.problem.initial_state();
        let h0 = self.problem.heuristic(&initial);
        let root = self.registry.intern(initial.clone(), h0);

        let mut reason = None;
        if self.cutoff.must_stop() {
            reason = Some(Reason::CutoffOccurred);
        }

        let applicable: Vec<(usize, M::Action)> = self
            .problem
            .actions()
            .iter()
            .enumerate()
            .filter(|(_, a)| self.problem.applicable(&initial, a))
            .map(|(i, a)| (i, a.clone()))
            .collect();

        let mut best_q = f64::INFINITY;
        let mut best_action = None;
        for (idx, action) in &applicable {
            let q = self.hindsight_qvalue(&initial, action);
            if q < best_q {
                best_q = q;
                best_action = Some(ActionId(*idx));
            }
        }

        self.registry.node_mut(root).value = best_q.min(self.problem.dead_end_cost());
        self.registry.node_mut(root).best_action = best_action;

        SolveOutcome {
            converged: reason.is_none(),
            reason,
            value: self.registry.node(root).value,
            states_touched: applicable.len() * self.n_scenarios,
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
    fn hop_prefers_the_cheaper_action() {
        let problem = TwoActions;
        let mut reg: StateRegistry<TwoActions> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Hop::new(&problem, &mut reg, 10, 20, 4, &cutoff);
        solver.solve();
        assert_eq!(Some(ActionId(0)), solver.recommended_action());
    }
}
