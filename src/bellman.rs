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

//! This module provides the Bellman-update primitives every solver in this
//! crate is built on: Q-values, greedy action selection, residuals, and
//! reachability enumeration. Every solver funnels its value updates through
//! [`bellman_update`] or [`weighted_bellman_update`] rather than
//! reimplementing the backup; this is the "single canonical Bellman-update
//! primitive" called for by this crate's design notes.

use std::collections::VecDeque;

use rand::Rng;

use crate::mdp::Mdp;
use crate::registry::{ActionId, StateHandle, StateRegistry};

/// Computes `Q(s, a) = cost(s, a) + gamma * sum_s' p(s') * V(s')` for the
/// given state/action pair. `gamma` defaults to `1.0` throughout this crate
/// (the stochastic shortest-path formulation), but is threaded through
/// explicitly since the metareasoning simulator requires `gamma < 1.0`.
pub fn qvalue<M: Mdp>(
    problem: &M,
    registry: &mut StateRegistry<M>,
    state: StateHandle,
    action: &M::Action,
    gamma: f64,
) -> f64 {
    let s = registry.state(state).clone();
    let successors = problem.transition(&s, action);
    let mut expected_next_value = 0.0;
    for succ in &successors {
        let h = problem.heuristic(&succ.state);
        let handle = registry.intern(succ.state.clone(), h);
        expected_next_value += succ.probability * registry.node(handle).value;
    }
    problem.cost(&s, action) + gamma * expected_next_value
}

/// Performs one Bellman backup on `state`:
///
/// 1. If `state` is a goal, its value, best action and residual are reset
///    to the terminal values `(0.0, None, 0.0)`.
/// 2. Otherwise, the minimal Q-value over all applicable actions becomes
///    the new value, the residual is the absolute difference with the
///    previous value, and the best action is the first-enumerated
///    minimizer (ties broken by enumeration order, which solvers MUST
///    preserve to reproduce test vectors).
/// 3. If no action is applicable, `state` is marked `DEAD_END` and its
///    value set to `problem.dead_end_cost()`.
///
/// Returns the new residual.
pub fn bellman_update<M: Mdp>(problem: &M, registry: &mut StateRegistry<M>, state: StateHandle) -> f64 {
    let s = registry.state(state).clone();

    if problem.goal(&s) {
        let node = registry.node_mut(state);
        let residual = node.value.abs();
        node.value = 0.0;
        node.best_action = None;
        node.residual = 0.0;
        return residual;
    }

    let mut best_q = f64::INFINITY;
    let mut best_action: Option<ActionId> = None;
    for (idx, action) in problem.actions().iter().enumerate() {
        if !problem.applicable(&s, action) {
            continue;
        }
        let q = qvalue(problem, registry, state, action, 1.0);
        if q < best_q {
            best_q = q;
            best_action = Some(ActionId(idx));
        }
    }

    let node = registry.node_mut(state);
    if let Some(action) = best_action {
        let residual = (node.value - best_q).abs();
        node.value = best_q;
        node.best_action = Some(action);
        node.residual = residual;
        residual
    } else {
        node.labels.set_dead_end(true);
        let residual = (node.value - problem.dead_end_cost()).abs();
        node.value = problem.dead_end_cost();
        node.best_action = None;
        node.residual = residual;
        residual
    }
}

/// Like [`bellman_update`], but blends the heuristic and the Bellman target
/// by a weight `w`: `value <- (1 - w) * h(s) + w * q*`. Used by Weighted
/// LAO* to trade optimality for speed; `w == 1.0` recovers the ordinary
/// Bellman update (modulo goal/dead-end handling, which are unaffected by
/// the weight).
pub fn weighted_bellman_update<M: Mdp>(
    problem: &M,
    registry: &mut StateRegistry<M>,
    state: StateHandle,
    w: f64,
) -> f64 {
    let s = registry.state(state).clone();

    if problem.goal(&s) {
        let node = registry.node_mut(state);
        let residual = node.value.abs();
        node.value = 0.0;
        node.best_action = None;
        node.residual = 0.0;
        return residual;
    }

    let mut best_q = f64::INFINITY;
    let mut best_action: Option<ActionId> = None;
    for (idx, action) in problem.actions().iter().enumerate() {
        if !problem.applicable(&s, action) {
            continue;
        }
        let q = qvalue(problem, registry, state, action, 1.0);
        if q < best_q {
            best_q = q;
            best_action = Some(ActionId(idx));
        }
    }

    let node = registry.node_mut(state);
    if let Some(action) = best_action {
        let h = problem.heuristic(&s);
        let target = (1.0 - w) * h + w * best_q;
        let residual = (node.value - target).abs();
        node.value = target;
        node.best_action = Some(action);
        node.residual = residual;
        residual
    } else {
        node.labels.set_dead_end(true);
        let residual = (node.value - problem.dead_end_cost()).abs();
        node.value = problem.dead_end_cost();
        node.best_action = None;
        node.residual = residual;
        residual
    }
}

/// `|value_old(s) - value_new(s)|` from the most recent Bellman update.
pub fn residual<M: Mdp>(registry: &StateRegistry<M>, state: StateHandle) -> f64 {
    registry.node(state).residual
}

/// Returns the current best-action field of `state`, computing it with a
/// fresh [`bellman_update`] if it is not yet set.
pub fn greedy_action<M: Mdp>(
    problem: &M,
    registry: &mut StateRegistry<M>,
    state: StateHandle,
) -> Option<ActionId> {
    if registry.node(state).best_action.is_none() && !problem.goal(registry.state(state)) {
        bellman_update(problem, registry, state);
    }
    registry.node(state).best_action
}

/// Draws a successor of `(state, action)` according to the distribution
/// returned by [`Mdp::transition`], interning the outcome into `registry`.
pub fn random_successor<M: Mdp, R: Rng + ?Sized>(
    problem: &M,
    registry: &mut StateRegistry<M>,
    state: StateHandle,
    action: &M::Action,
    rng: &mut R,
) -> StateHandle {
    let s = registry.state(state).clone();
    let successors = problem.transition(&s, action);
    let mut roll: f64 = rng.random::<f64>();
    for succ in &successors {
        if roll < succ.probability {
            let h = problem.heuristic(&succ.state);
            return registry.intern(succ.state.clone(), h);
        }
        roll -= succ.probability;
    }
    // Floating point drift: fall back to the last outcome.
    let last = successors.last().expect("transition must not be empty for an applicable action");
    let h = problem.heuristic(&last.state);
    registry.intern(last.state.clone(), h)
}

/// Returns the highest-probability successor of `(state, action)`. Ties are
/// broken by returning the first maximal outcome in enumeration order.
pub fn most_likely_outcome<M: Mdp>(
    problem: &M,
    registry: &mut StateRegistry<M>,
    state: StateHandle,
    action: &M::Action,
) -> StateHandle {
    let s = registry.state(state).clone();
    let successors = problem.transition(&s, action);
    let best = successors
        .iter()
        .max_by(|a, b| a.probability.partial_cmp(&b.probability).unwrap())
        .expect("transition must not be empty for an applicable action");
    let h = problem.heuristic(&best.state);
    registry.intern(best.state.clone(), h)
}

/// Performs a breadth-first materialization of every state reachable from
/// `problem`'s initial state via `transition`, bounded by dead-end
/// detection (a state with no applicable action is a leaf). Intended for
/// solvers that are intrinsically synchronous (plain Value Iteration);
/// trial-based solvers never need to call this. Implemented with an
/// explicit queue, not recursion, so it scales to state spaces deeper than
/// the call stack.
pub fn generate_all<M: Mdp>(problem: &M, registry: &mut StateRegistry<M>) -> Vec<StateHandle> {
    let root = registry.intern(problem.initial_state(), problem.heuristic(&problem.initial_state()));
    let mut seen = vec![false; registry.len().max(root.index() + 1)];
    let mut order = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(root);
    mark(&mut seen, root);

    while let Some(handle) = queue.pop_front() {
        order.push(handle);
        let s = registry.state(handle).clone();
        if problem.goal(&s) {
            continue;
        }
        for action in problem.actions() {
            if !problem.applicable(&s, action) {
                continue;
            }
            for succ in problem.transition(&s, action) {
                let h = problem.heuristic(&succ.state);
                let handle = registry.intern(succ.state, h);
                if handle.index() >= seen.len() {
                    seen.resize(handle.index() + 1, false);
                }
                if !seen[handle.index()] {
                    mark(&mut seen, handle);
                    queue.push_back(handle);
                }
            }
        }
    }
    order
}

fn mark(seen: &mut [bool], handle: StateHandle) {
    seen[handle.index()] = true;
}

/// The outcome of [`reachable`]: the full set of states visited, and the
/// subset of "tip" states — those at the horizon, or already labeled
/// solved.
pub struct Reachable {
    pub states: Vec<StateHandle>,
    pub tips: Vec<StateHandle>,
}

/// Breadth-first search from `root`, following `best_action` when it is
/// set (falling back to every applicable action otherwise) up to `horizon`
/// transitions. States at the horizon, or already labeled `SOLVED`, are
/// reported as tips rather than expanded further.
pub fn reachable<M: Mdp>(
    problem: &M,
    registry: &mut StateRegistry<M>,
    root: StateHandle,
    horizon: usize,
) -> Reachable {
    let mut states = Vec::new();
    let mut tips = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back((root, 0usize));
    let mut visited = std::collections::HashSet::new();
    visited.insert(root);

    while let Some((handle, depth)) = queue.pop_front() {
        states.push(handle);
        let s = registry.state(handle).clone();

        if problem.goal(&s) || registry.node(handle).labels.solved() || depth >= horizon {
            tips.push(handle);
            continue;
        }

        let successors_of: Vec<M::Action> = if let Some(best) = registry.node(handle).best_action {
            vec![problem.actions()[best.index()].clone()]
        } else {
            problem
                .actions()
                .iter()
                .filter(|a| problem.applicable(&s, a))
                .cloned()
                .collect()
        };

        let mut any_expanded = false;
        for action in successors_of {
            for succ in problem.transition(&s, &action) {
                any_expanded = true;
                let h = problem.heuristic(&succ.state);
                let next = registry.intern(succ.state, h);
                if visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }
        if !any_expanded {
            tips.push(handle);
        }
    }

    Reachable { states, tips }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::Successor;

    /// A 3-state chain: 0 -[cost 1]-> 1 -[cost 1]-> 2 (goal). One action.
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
    fn bellman_update_on_goal_zeroes_value() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let goal = reg.intern(2, 5.0);
        let r = bellman_update(&problem, &mut reg, goal);
        assert_eq!(0.0, reg.node(goal).value);
        assert_eq!(None, reg.node(goal).best_action);
        assert_eq!(5.0, r);
    }

    #[test]
    fn bellman_update_propagates_cost_to_go() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let s0 = reg.intern(0, 0.0);
        let s1 = reg.intern(1, 0.0);
        let s2 = reg.intern(2, 0.0);
        bellman_update(&problem, &mut reg, s2);
        bellman_update(&problem, &mut reg, s1);
        bellman_update(&problem, &mut reg, s0);
        assert_eq!(1.0, reg.node(s1).value);
        assert_eq!(2.0, reg.node(s0).value);
        assert_eq!(Some(ActionId(0)), reg.node(s0).best_action);
    }

    #[test]
    fn dead_end_has_no_applicable_action() {
        struct NoActions;
        impl Mdp for NoActions {
            type State = u8;
            type Action = ();
            fn initial_state(&self) -> u8 { 0 }
            fn actions(&self) -> &[()] { &[] }
            fn applicable(&self, _: &u8, _: &()) -> bool { false }
            fn transition(&self, _: &u8, _: &()) -> Vec<Successor<u8>> { vec![] }
            fn cost(&self, _: &u8, _: &()) -> f64 { 0.0 }
            fn goal(&self, _: &u8) -> bool { false }
        }
        let problem = NoActions;
        let mut reg: StateRegistry<NoActions> = StateRegistry::new();
        let s = reg.intern(0, 0.0);
        bellman_update(&problem, &mut reg, s);
        assert!(reg.node(s).labels.dead_end());
        assert_eq!(problem.dead_end_cost(), reg.node(s).value);
    }

    #[test]
    fn generate_all_visits_the_whole_chain() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let visited = generate_all(&problem, &mut reg);
        assert_eq!(3, visited.len());
    }

    #[test]
    fn most_likely_outcome_picks_the_highest_probability_successor() {
        struct Branch;
        impl Mdp for Branch {
            type State = u8;
            type Action = ();
            fn initial_state(&self) -> u8 { 0 }
            fn actions(&self) -> &[()] { &[()] }
            fn applicable(&self, _: &u8, _: &()) -> bool { true }
            fn transition(&self, _: &u8, _: &()) -> Vec<Successor<u8>> {
                vec![Successor::new(1, 0.2), Successor::new(2, 0.8)]
            }
            fn cost(&self, _: &u8, _: &()) -> f64 { 0.0 }
            fn goal(&self, _: &u8) -> bool { false }
        }
        let problem = Branch;
        let mut reg: StateRegistry<Branch> = StateRegistry::new();
        let s = reg.intern(0, 0.0);
        let outcome = most_likely_outcome(&problem, &mut reg, s, &());
        assert_eq!(&2, reg.state(outcome));
    }

    #[test]
    fn weighted_bellman_update_blends_heuristic_and_target() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let s1 = reg.intern(1, 10.0);
        let s2 = reg.intern(2, 0.0);
        bellman_update(&problem, &mut reg, s2);
        weighted_bellman_update(&problem, &mut reg, s1, 0.5);
        // q* = cost(1) + 0 = 1.0; Chain does not override heuristic() so h(1) = 0.0.
        // target = 0.5*0.0 + 0.5*1.0 = 0.5
        assert_eq!(0.5, reg.node(s1).value);
    }
}
