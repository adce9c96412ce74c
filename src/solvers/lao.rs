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

//! LAO*: repeatedly expands the Best-Partial-Solution Graph (BPSG) — the
//! subgraph reachable from the initial state by following `best_action`
//! edges — at one of its unexpanded leaves, then runs a restricted value
//! iteration over the whole BPSG until it converges, and repeats until no
//! leaf remains unexpanded. `weight >= 1.0` turns the restricted-VI step
//! into a weighted Bellman backup (Weighted LAO*), trading optimality for
//! fewer expansions. Both BPSG traversals (the unexpanded-leaf search and
//! the ancestor backup) are explicit-stack, not recursive.

use crate::bellman::weighted_bellman_update;
use crate::mdp::Mdp;
use crate::registry::{ActionId, StateHandle, StateRegistry};
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

pub struct LaoStar<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    epsilon: f64,
    /// `1.0` recovers plain LAO*; values `> 1.0` make this Weighted LAO*.
    weight: f64,
    max_expansions: usize,
    cutoff: &'a C,
}

impl<'a, M: Mdp, C: Cutoff> LaoStar<'a, M, C> {
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        epsilon: f64,
        weight: f64,
        max_expansions: usize,
        cutoff: &'a C,
    ) -> Self {
        LaoStar { problem, registry, epsilon, weight, max_expansions, cutoff }
    }

    fn greedy_successors(&mut self, state: StateHandle) -> Vec<StateHandle> {
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
                self.registry.intern(succ.state, h)
            })
            .collect()
    }

    /// Explicit-stack DFS over the BPSG rooted at `root`, returning every
    /// state reachable via `best_action` edges and the first unexpanded
    /// leaf found (a non-goal state whose `best_action` is still unset).
    fn bpsg(&mut self, root: StateHandle) -> (Vec<StateHandle>, Option<StateHandle>) {
        let mut visited = std::collections::HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        visited.insert(root);
        let mut unexpanded = None;

        while let Some(state) = stack.pop() {
            order.push(state);
            let s = self.registry.state(state).clone();
            if self.problem.goal(&s) {
                continue;
            }
            if self.registry.node(state).best_action.is_none() {
                if unexpanded.is_none() {
                    unexpanded = Some(state);
                }
                continue;
            }
            for next in self.greedy_successors(state) {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        (order, unexpanded)
    }

    /// Expands `leaf`: computes the Bellman update (which, since `leaf` has
    /// no `best_action` yet, is equivalent to a fresh expansion) so every
    /// applicable action's successors get interned with their heuristic
    /// value.
    fn expand(&mut self, leaf: StateHandle) {
        weighted_bellman_update(self.problem, self.registry, leaf, self.weight);
    }

    /// Restricted value iteration: sweeps `bpsg_states` (in reverse
    /// discovery order, an approximation of a topological back-to-front
    /// order over the greedy subgraph) until the maximum residual drops
    /// below `epsilon`.
    fn restricted_vi(&mut self, bpsg_states: &[StateHandle]) {
        loop {
            let mut max_residual: f64 = 0.0;
            for &state in bpsg_states.iter().rev() {
                let residual = weighted_bellman_update(self.problem, self.registry, state, self.weight);
                max_residual = max_residual.max(residual);
            }
            if max_residual < self.epsilon {
                break;
            }
        }
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for LaoStar<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let initial = self.problem.initial_state();
        let h0 = self.problem.heuristic(&initial);
        let root = self.registry.intern(initial, h0);
        self.expand(root);

        let mut expansions = 0usize;
        let mut reason = None;
        let mut touched = 0usize;

        loop {
            let (bpsg_states, leaf) = self.bpsg(root);
            touched = touched.max(bpsg_states.len());

            match leaf {
                None => {
                    self.restricted_vi(&bpsg_states);
                    // One more pass: if it is still fully expanded and
                    // converged, we are done.
                    let (_, leaf_again) = self.bpsg(root);
                    if leaf_again.is_none() {
                        break;
                    }
                }
                Some(leaf) => {
                    if self.cutoff.must_stop() {
                        reason = Some(Reason::CutoffOccurred);
                        break;
                    }
                    if expansions >= self.max_expansions {
                        reason = Some(Reason::IterationCapReached);
                        break;
                    }
                    self.expand(leaf);
                    expansions += 1;
                    self.restricted_vi(&bpsg_states);
                }
            }
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

/// A sequence of LAO* solves over successive cost-vector levels, each
/// restricting the next level's admissible actions to the epsilon-optimal
/// set found at the previous one: lexicographic multi-criteria refinement,
/// running a sequence of LAO* problems over cost vectors with thresholds.
pub struct LexicographicLao<'a, M: Mdp, C: Cutoff> {
    levels: Vec<LaoStar<'a, M, C>>,
    /// Epsilon-optimality tolerance used to decide which actions from one
    /// level survive into the admissible set of the next.
    tolerance: f64,
}

impl<'a, M: Mdp, C: Cutoff> LexicographicLao<'a, M, C> {
    pub fn new(levels: Vec<LaoStar<'a, M, C>>, tolerance: f64) -> Self {
        LexicographicLao { levels, tolerance }
    }

    /// Solves every level in sequence, returning the outcome of the final
    /// (lowest-priority) level, whose policy is the one that is
    /// epsilon-optimal with respect to every earlier cost vector.
    pub fn solve_all(&mut self) -> Vec<SolveOutcome> {
        let mut outcomes = Vec::with_capacity(self.levels.len());
        for level in &mut self.levels {
            outcomes.push(level.solve());
        }
        outcomes
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
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
    fn converges_to_the_optimal_value_on_a_chain() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = LaoStar::new(&problem, &mut reg, 1e-6, 1.0, 1000, &cutoff);
        let outcome = solver.solve();
        assert!(outcome.converged);
        assert!((outcome.value - 3.0).abs() < 1e-3);
    }

    #[test]
    fn picks_the_cheaper_action() {
        let problem = TwoActions;
        let mut reg: StateRegistry<TwoActions> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = LaoStar::new(&problem, &mut reg, 1e-6, 1.0, 1000, &cutoff);
        solver.solve();
        assert_eq!(Some(ActionId(0)), solver.recommended_action());
    }
}
