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

//! FLARES and Soft-FLARES: LRTDP-style trials that stop labeling states
//! `SOLVED` past a depth bound, instead marking them `SOLVED_FLARES` with
//! the depth they were reached at (`NodeData::labeled_at_depth`).
//! Soft-FLARES relaxes the hard depth cutoff into a probability of
//! stopping the trial, computed from a [`DistanceMetric`] through a
//! [`SolveProbabilityFn`], with the horizon itself drawn from a
//! [`HorizonFn`] — the strategy-enum pattern this crate uses wherever a
//! small trait object would otherwise be reached for, the same way
//! solver configuration knobs are kept as plain enums dispatched in a
//! `match` elsewhere in this crate.

use rand::Rng;

use crate::bellman::bellman_update;
use crate::mdp::Mdp;
use crate::registry::{ActionId, StateHandle, StateRegistry};
use crate::rng::SeededRng;
use crate::solver::{Cutoff, Reason, SolveOutcome, Solver};

/// How "far" a trial has gone, for Soft-FLARES' solve-probability function.
#[derive(Debug, Clone, Copy)]
pub enum DistanceMetric {
    /// Number of steps taken so far in the trial.
    StepCount,
    /// Cumulative probability of the trajectory followed so far.
    TrajectoryProbability,
    /// `1 - TrajectoryProbability`, i.e. how implausible the trajectory is.
    Plausibility,
}

impl DistanceMetric {
    fn value(&self, steps: u32, trajectory_probability: f64) -> f64 {
        match self {
            DistanceMetric::StepCount => steps as f64,
            DistanceMetric::TrajectoryProbability => trajectory_probability,
            DistanceMetric::Plausibility => 1.0 - trajectory_probability,
        }
    }
}

/// Maps a [`DistanceMetric`] reading to a probability of stopping the
/// trial and relying on the heuristic, rather than continuing to update
/// the true value.
#[derive(Debug, Clone, Copy)]
pub enum SolveProbabilityFn {
    Step { horizon: f64 },
    Linear { horizon: f64 },
    Exponential { rate: f64 },
    Logistic { midpoint: f64, steepness: f64 },
}

impl SolveProbabilityFn {
    fn probability(&self, distance: f64) -> f64 {
        match *self {
            SolveProbabilityFn::Step { horizon } => {
                if distance >= horizon { 1.0 } else { 0.0 }
            }
            SolveProbabilityFn::Linear { horizon } => (distance / horizon).clamp(0.0, 1.0),
            SolveProbabilityFn::Exponential { rate } => 1.0 - (-rate * distance).exp(),
            SolveProbabilityFn::Logistic { midpoint, steepness } => {
                1.0 / (1.0 + (-steepness * (distance - midpoint)).exp())
            }
        }
    }
}

/// Draws (possibly randomly) the horizon used by a [`SolveProbabilityFn`]
/// of kind `Step`/`Linear`, letting Soft-FLARES vary the effective
/// look-ahead from trial to trial.
#[derive(Debug, Clone, Copy)]
pub enum HorizonFn {
    Fixed(f64),
    Exponential { mean: f64 },
    Bernoulli { short: f64, long: f64, p_long: f64 },
}

impl HorizonFn {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            HorizonFn::Fixed(h) => h,
            HorizonFn::Exponential { mean } => -mean * (1.0 - rng.random::<f64>()).ln(),
            HorizonFn::Bernoulli { short, long, p_long } => {
                if rng.random::<f64>() < p_long { long } else { short }
            }
        }
    }
}

/// Plain FLARES: a hard depth bound past which states are labeled
/// `SOLVED_FLARES` instead of being fully converged.
pub struct Flares<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    epsilon: f64,
    depth_bound: u32,
    max_trial_depth: usize,
    max_trials: usize,
    rng: SeededRng,
    cutoff: &'a C,
}

impl<'a, M: Mdp, C: Cutoff> Flares<'a, M, C> {
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        epsilon: f64,
        depth_bound: u32,
        max_trial_depth: usize,
        max_trials: usize,
        seed: u64,
        cutoff: &'a C,
    ) -> Self {
        Flares {
            problem,
            registry,
            epsilon,
            depth_bound,
            max_trial_depth,
            max_trials,
            rng: SeededRng::from_seed(seed),
            cutoff,
        }
    }

    fn trial_and_label(&mut self, root: StateHandle) {
        let mut current = root;
        let mut path = Vec::new();
        let mut depth = 0u32;

        for _ in 0..self.max_trial_depth {
            path.push((current, depth));
            bellman_update(self.problem, self.registry, current);
            let s = self.registry.state(current).clone();
            if self.problem.goal(&s) || self.registry.node(current).labels.solved() {
                break;
            }
            if depth >= self.depth_bound {
                self.registry.node_mut(current).labels.set_solved_flares(true);
                self.registry.node_mut(current).labeled_at_depth = Some(depth);
                break;
            }
            let action_id = match self.registry.node(current).best_action {
                Some(a) => a,
                None => break,
            };
            let action = self.problem.actions()[action_id.index()].clone();
            current = crate::bellman::random_successor(self.problem, self.registry, current, &action, self.rng.inner_mut());
            depth += 1;
        }

        let mut all_converged = true;
        for &(state, _) in path.iter().rev() {
            let residual = bellman_update(self.problem, self.registry, state);
            if residual > self.epsilon {
                all_converged = false;
            }
        }
        if all_converged {
            for &(state, _) in &path {
                self.registry.node_mut(state).labels.set_solved(true);
            }
        }
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for Flares<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let initial = self.problem.initial_state();
        let h0 = self.problem.heuristic(&initial);
        let root = self.registry.intern(initial, h0);

        let mut trials = 0;
        let mut reason = None;

        while !self.registry.node(root).labels.solved() && !self.registry.node(root).labels.solved_flares() {
            if self.cutoff.must_stop() {
                reason = Some(Reason::CutoffOccurred);
                break;
            }
            if trials >= self.max_trials {
                reason = Some(Reason::IterationCapReached);
                break;
            }
            self.trial_and_label(root);
            trials += 1;
        }

        SolveOutcome {
            converged: reason.is_none(),
            reason,
            value: self.registry.node(root).value,
            states_touched: self.registry.len(),
        }
    }

    fn recommended_action(&self) -> Option<ActionId> {
        let initial = self.problem.initial_state();
        self.registry.get(&initial).and_then(|h| self.registry.node(h).best_action)
    }
}

/// Soft-FLARES: like [`Flares`], but the decision to stop a trial early is
/// probabilistic, driven by `distance_metric` through `solve_probability`
/// with a horizon redrawn from `horizon_fn` at the start of every trial.
pub struct SoftFlares<'a, M: Mdp, C: Cutoff> {
    problem: &'a M,
    registry: &'a mut StateRegistry<M>,
    epsilon: f64,
    distance_metric: DistanceMetric,
    solve_probability: SolveProbabilityFn,
    horizon_fn: HorizonFn,
    max_trial_depth: usize,
    max_trials: usize,
    rng: SeededRng,
    cutoff: &'a C,
}

impl<'a, M: Mdp, C: Cutoff> SoftFlares<'a, M, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        problem: &'a M,
        registry: &'a mut StateRegistry<M>,
        epsilon: f64,
        distance_metric: DistanceMetric,
        solve_probability: SolveProbabilityFn,
        horizon_fn: HorizonFn,
        max_trial_depth: usize,
        max_trials: usize,
        seed: u64,
        cutoff: &'a C,
    ) -> Self {
        SoftFlares {
            problem,
            registry,
            epsilon,
            distance_metric,
            solve_probability,
            horizon_fn,
            max_trial_depth,
            max_trials,
            rng: SeededRng::from_seed(seed),
            cutoff,
        }
    }

    fn trial_and_label(&mut self, root: StateHandle) {
        let horizon = self.horizon_fn.draw(self.rng.inner_mut());
        let mut current = root;
        let mut path = Vec::new();
        let mut depth = 0u32;
        let mut trajectory_probability = 1.0;

        for _ in 0..self.max_trial_depth {
            path.push((current, depth));
            bellman_update(self.problem, self.registry, current);
            let s = self.registry.state(current).clone();
            if self.problem.goal(&s) || self.registry.node(current).labels.solved() {
                break;
            }

            let distance = self.distance_metric.value(depth, trajectory_probability);
            let scaled_distance = distance / horizon.max(1e-9);
            let stop_probability = self.solve_probability.probability(scaled_distance);
            if self.rng.inner_mut().random::<f64>() < stop_probability {
                self.registry.node_mut(current).labels.set_solved_flares(true);
                self.registry.node_mut(current).labeled_at_depth = Some(depth);
                break;
            }

            let action_id = match self.registry.node(current).best_action {
                Some(a) => a,
                None => break,
            };
            let action = self.problem.actions()[action_id.index()].clone();

            let s2 = self.registry.state(current).clone();
            let successors = self.problem.transition(&s2, &action);
            let mut roll = self.rng.inner_mut().random::<f64>();
            let mut chosen = None;
            for succ in &successors {
                if roll < succ.probability {
                    chosen = Some(succ.clone());
                    break;
                }
                roll -= succ.probability;
            }
            let chosen = chosen.unwrap_or_else(|| successors.last().unwrap().clone());
            trajectory_probability *= chosen.probability;
            let h = self.problem.heuristic(&chosen.state);
            current = self.registry.intern(chosen.state, h);
            depth += 1;
        }

        let mut all_converged = true;
        for &(state, _) in path.iter().rev() {
            let residual = bellman_update(self.problem, self.registry, state);
            if residual > self.epsilon {
                all_converged = false;
            }
        }
        if all_converged {
            for &(state, _) in &path {
                self.registry.node_mut(state).labels.set_solved(true);
            }
        }
    }
}

impl<'a, M: Mdp, C: Cutoff> Solver for SoftFlares<'a, M, C> {
    fn solve(&mut self) -> SolveOutcome {
        let initial = self.problem.initial_state();
        let h0 = self.problem.heuristic(&initial);
        let root = self.registry.intern(initial, h0);

        let mut trials = 0;
        let mut reason = None;

        while !self.registry.node(root).labels.solved() {
            if self.cutoff.must_stop() {
                reason = Some(Reason::CutoffOccurred);
                break;
            }
            if trials >= self.max_trials {
                reason = Some(Reason::IterationCapReached);
                break;
            }
            self.trial_and_label(root);
            trials += 1;
        }

        SolveOutcome {
            converged: reason.is_none(),
            reason,
            value: self.registry.node(root).value,
            states_touched: self.registry.len(),
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
    fn flares_with_a_generous_depth_bound_converges_like_lrtdp() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Flares::new(&problem, &mut reg, 1e-6, 100, 50, 1000, 2, &cutoff);
        let outcome = solver.solve();
        assert!((outcome.value - 3.0).abs() < 1e-3);
    }

    #[test]
    fn flares_with_a_tight_depth_bound_stops_early_with_a_flares_label() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = Flares::new(&problem, &mut reg, 1e-6, 0, 50, 1, 2, &cutoff);
        solver.solve();
        let root = reg.get(&0).unwrap();
        assert!(reg.node(root).labels.solved_flares() || reg.node(root).labels.solved());
    }

    #[test]
    fn soft_flares_runs_to_completion_on_a_chain() {
        let problem = Chain;
        let mut reg: StateRegistry<Chain> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut solver = SoftFlares::new(
            &problem,
            &mut reg,
            1e-6,
            DistanceMetric::StepCount,
            SolveProbabilityFn::Linear { horizon: 10.0 },
            HorizonFn::Fixed(10.0),
            50,
            2000,
            3,
            &cutoff,
        );
        let outcome = solver.solve();
        assert!((outcome.value - 3.0).abs() < 1e-2);
    }
}
