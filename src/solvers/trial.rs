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

//! The shared greedy-rollout template every trial-based solver (LRTDP,
//! BRTDP, VPI-RTDP, HDP, FLARES) builds on: update the current state,
//! follow its greedy action, sample an outcome, repeat until a goal, a
//! dead end, a solved state, or `max_depth` is reached. Each solver does
//! its own post-trial bookkeeping on the returned path; this module only
//! performs the rollout itself.

use rand::Rng;

use crate::bellman::bellman_update;
use crate::mdp::Mdp;
use crate::registry::{StateHandle, StateRegistry};

/// The path visited by one trial, in the order visited (root first).
/// `goal_reached` and `dead_end` are mutually exclusive; both are `false`
/// when the trial stopped only because it hit `max_depth` or an
/// already-solved state.
#[derive(Debug, Clone)]
pub struct Trial {
    pub path: Vec<StateHandle>,
    pub goal_reached: bool,
    pub dead_end: bool,
}

/// Picks the successor of `(state, action)` a trial should continue into.
/// Plugged in by the caller so that BRTDP (gap-weighted), VPI-RTDP
/// (value-of-information-weighted) and plain LRTDP (probability-weighted)
/// can reuse the same rollout loop with different sampling rules.
pub trait OutcomeSelector<M: Mdp> {
    fn select<R: Rng + ?Sized>(
        &self,
        problem: &M,
        registry: &mut StateRegistry<M>,
        state: StateHandle,
        action: &M::Action,
        rng: &mut R,
    ) -> StateHandle;
}

/// The plain "sample proportionally to the transition probabilities"
/// selector used by LRTDP, HDP and FLARES.
pub struct ProbabilityWeighted;
impl<M: Mdp> OutcomeSelector<M> for ProbabilityWeighted {
    fn select<R: Rng + ?Sized>(
        &self,
        problem: &M,
        registry: &mut StateRegistry<M>,
        state: StateHandle,
        action: &M::Action,
        rng: &mut R,
    ) -> StateHandle {
        crate::bellman::random_successor(problem, registry, state, action, rng)
    }
}

/// Runs a single greedy trial starting at `root`: Bellman-update the
/// current state, stop if it is a goal or already labeled `SOLVED`,
/// otherwise follow its (freshly recomputed) greedy action and sample a
/// successor with `selector`, continuing until `max_depth` steps have
/// been taken. Implemented iteratively, never recursively.
pub fn run_trial<M: Mdp, R: Rng + ?Sized, O: OutcomeSelector<M>>(
    problem: &M,
    registry: &mut StateRegistry<M>,
    root: StateHandle,
    max_depth: usize,
    selector: &O,
    rng: &mut R,
) -> Trial {
    let mut path = Vec::new();
    let mut current = root;
    let mut goal_reached = false;
    let mut dead_end = false;

    for _ in 0..max_depth {
        path.push(current);
        bellman_update(problem, registry, current);

        let s = registry.state(current).clone();
        if problem.goal(&s) {
            goal_reached = true;
            break;
        }
        if registry.node(current).labels.solved() {
            break;
        }
        let action = match registry.node(current).best_action {
            Some(a) => a,
            None => {
                dead_end = true;
                break;
            }
        };
        let action = problem.actions()[action.index()].clone();
        current = selector.select(problem, registry, current, &action, rng);
    }

    Trial { path, goal_reached, dead_end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::Successor;
    use crate::rng::SeededRng;

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
    fn a_trial_on_a_chain_walks_straight_to_the_goal() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let root = reg.intern(0, 0.0);
        let mut rng = SeededRng::from_seed(7);
        let trial = run_trial(&problem, &mut reg, root, 10, &ProbabilityWeighted, &mut rng);
        assert!(trial.goal_reached);
        assert!(!trial.dead_end);
        assert_eq!(3, trial.path.len());
    }

    #[test]
    fn a_trial_stops_at_max_depth_without_reaching_a_goal() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let root = reg.intern(0, 0.0);
        let mut rng = SeededRng::from_seed(7);
        let trial = run_trial(&problem, &mut reg, root, 1, &ProbabilityWeighted, &mut rng);
        assert!(!trial.goal_reached);
        assert_eq!(1, trial.path.len());
    }
}
