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

//! Searches over candidate reductions (currently: candidate `k` budgets
//! for [`super::mkl::MklReduction`]), evaluating each one by simulating
//! the greedy policy of the reduced model against the *original*
//! stochastic problem. Two evaluators are provided: a Monte Carlo
//! estimate (cheap, approximate) and an exact Markov-chain evaluation
//! over the policy's induced absorbing chain (exact, only practical on
//! small reachable sets). Actions are grouped by a caller-supplied
//! symmetry key so that candidates differing only by a relabeling of
//! symmetric actions are evaluated once.

use std::collections::HashMap;

use crate::mdp::Mdp;
use crate::registry::StateRegistry;
use crate::rng::SeededRng;

/// One candidate reduction budget together with the estimated expected
/// cost of following its induced greedy policy against the real problem.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub budget: u32,
    pub estimated_cost: f64,
}

/// Groups actions into symmetry classes so a reduction search only ever
/// evaluates one representative per class. The default (no grouping)
/// implementation treats every action as its own class.
pub trait SymmetryKey<A> {
    fn key(&self, action: &A) -> u64;
}

/// No symmetry: every action is distinct.
pub struct NoSymmetry;
impl<A> SymmetryKey<A> for NoSymmetry {
    fn key(&self, _action: &A) -> u64 {
        0
    }
}

/// Runs `policy` (already solved, its `best_action` fields set over
/// `registry`) for `n_episodes` episodes of up to `max_steps` each,
/// starting at `root`, and returns the average total cost incurred. Used
/// by [`greedy_search`] to score a candidate reduction's policy against
/// the true stochastic dynamics.
pub fn monte_carlo_evaluate<M: Mdp>(
    problem: &M,
    registry: &mut StateRegistry<M>,
    root: crate::registry::StateHandle,
    n_episodes: usize,
    max_steps: usize,
    seed: u64,
) -> f64 {
    let mut rng = SeededRng::from_seed(seed);
    let mut total = 0.0;

    for _ in 0..n_episodes {
        let mut current = root;
        let mut episode_cost = 0.0;
        for _ in 0..max_steps {
            let s = registry.state(current).clone();
            if problem.goal(&s) {
                break;
            }
            let action_id = match registry.node(current).best_action {
                Some(a) => a,
                None => {
                    episode_cost += problem.dead_end_cost();
                    break;
                }
            };
            let action = problem.actions()[action_id.index()].clone();
            episode_cost += problem.cost(&s, &action);
            current = crate::bellman::random_successor(problem, registry, current, &action, rng.inner_mut());
        }
        total += episode_cost;
    }

    total / n_episodes as f64
}

/// Exact evaluation of a (already-solved) greedy policy's expected cost
/// over its induced absorbing Markov chain, restricted to `states`
/// (typically the states reachable under the policy). Solves the linear
/// system by value iteration over that restricted set rather than pulling
/// in a linear-algebra crate, consistent with this crate's "no external
/// numerical-solver dependency" posture.
pub fn exact_evaluate<M: Mdp>(
    problem: &M,
    registry: &mut StateRegistry<M>,
    states: &[crate::registry::StateHandle],
    epsilon: f64,
    max_iterations: usize,
) -> f64 {
    for _ in 0..max_iterations {
        let mut max_residual: f64 = 0.0;
        for &state in states {
            let s = registry.state(state).clone();
            if problem.goal(&s) {
                continue;
            }
            let action_id = match registry.node(state).best_action {
                Some(a) => a,
                None => continue,
            };
            let action = problem.actions()[action_id.index()].clone();
            let q = crate::bellman::qvalue(problem, registry, state, &action, 1.0);
            let node = registry.node_mut(state);
            max_residual = max_residual.max((node.value - q).abs());
            node.value = q;
        }
        if max_residual < epsilon {
            break;
        }
    }
    states.first().map(|&h| registry.node(h).value).unwrap_or(0.0)
}

/// Greedily searches candidate `k` budgets (ascending from `0` to
/// `max_k`), stopping as soon as a budget's Monte Carlo estimated cost is
/// within `tolerance` of the previous (larger) budget's — the smallest
/// reduction that doesn't visibly hurt solution quality. Returns every
/// candidate evaluated, in search order, so a caller can inspect the
/// whole trade-off curve.
pub fn greedy_search(
    budgets: impl IntoIterator<Item = u32>,
    mut evaluate: impl FnMut(u32) -> f64,
    tolerance: f64,
) -> Vec<Candidate> {
    let mut results = Vec::new();
    let mut previous_cost: Option<f64> = None;

    for budget in budgets {
        let estimated_cost = evaluate(budget);
        results.push(Candidate { budget, estimated_cost });
        if let Some(prev) = previous_cost {
            if (estimated_cost - prev).abs() <= tolerance {
                break;
            }
        }
        previous_cost = Some(estimated_cost);
    }
    results
}

/// Exhaustively evaluates every budget in `budgets`, returning the full
/// set of candidates sorted by estimated cost (cheapest policy first).
/// Practical only when `budgets` is small, hence "brute-force".
pub fn brute_force_search(
    budgets: impl IntoIterator<Item = u32>,
    mut evaluate: impl FnMut(u32) -> f64,
) -> Vec<Candidate> {
    let mut results: Vec<Candidate> = budgets
        .into_iter()
        .map(|budget| Candidate { budget, estimated_cost: evaluate(budget) })
        .collect();
    results.sort_by(|a, b| a.estimated_cost.partial_cmp(&b.estimated_cost).unwrap());
    results
}

/// Groups `actions` by `symmetry.key`, returning one representative per
/// class, in first-seen order.
pub fn representatives<A: Clone>(actions: &[A], symmetry: &impl SymmetryKey<A>) -> Vec<A> {
    let mut seen = HashMap::new();
    let mut reps = Vec::new();
    for action in actions {
        let key = symmetry.key(action);
        if seen.insert(key, ()).is_none() {
            reps.push(action.clone());
        }
    }
    reps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_search_stops_once_improvement_falls_below_tolerance() {
        let costs = [10.0, 8.0, 7.9, 7.89];
        let results = greedy_search(0..4u32, |k| costs[k as usize], 0.2);
        assert_eq!(3, results.len());
    }

    #[test]
    fn brute_force_search_sorts_by_estimated_cost() {
        let costs = [5.0, 1.0, 3.0];
        let results = brute_force_search(0..3u32, |k| costs[k as usize]);
        assert_eq!(1, results[0].budget);
        assert_eq!(2, results[1].budget);
        assert_eq!(0, results[2].budget);
    }

    #[test]
    fn representatives_picks_one_action_per_symmetry_class() {
        struct ParitySymmetry;
        impl SymmetryKey<i32> for ParitySymmetry {
            fn key(&self, action: &i32) -> u64 {
                (action % 2) as u64
            }
        }
        let reps = representatives(&[1, 2, 3, 4], &ParitySymmetry);
        assert_eq!(vec![1, 2], reps);
    }
}
