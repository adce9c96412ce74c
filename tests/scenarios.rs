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

//! End-to-end coverage of the concrete resolution scenarios against the
//! demo domains: a deterministic racetrack, a small sailing board, the
//! three-node Canadian Traveler instance, a trap-bearing gridworld for
//! metareasoning, and a reduced-model racetrack replanning loop.

use std::collections::HashMap;

use ssp_search::bellman::generate_all;
use ssp_search::demos::ctp::Ctp;
use ssp_search::demos::gridworld::Gridworld;
use ssp_search::demos::racetrack::Racetrack;
use ssp_search::demos::sailing::Sailing;
use ssp_search::metareasoning::{ActionSelectionRule, MetareasoningSimulator};
use ssp_search::reduction::mkl::{MklReduction, MostLikelyIsPrimary, ReducedModel};
use ssp_search::registry::StateRegistry;
use ssp_search::solver::{NoCutoff, Solver};
use ssp_search::solvers::lao::LaoStar;
use ssp_search::solvers::lrtdp::Lrtdp;
use ssp_search::solvers::ssipp::Ssipp;
use ssp_search::solvers::thts::{Backup, Thts};
use ssp_search::solvers::vi::ValueIteration;
use ssp_search::Mdp;

/// Scenario B: single-row racetrack of length 5, no slip/error: both LAO*
/// and LRTDP must agree with the analytic cost of 4 accelerations.
#[test]
fn scenario_b_racetrack_lao_and_lrtdp_agree_on_four() {
    let problem = Racetrack::new(5, 5, 0.0, 0.0);

    let mut lao_reg: StateRegistry<Racetrack> = StateRegistry::new();
    let cutoff = NoCutoff;
    let mut lao = LaoStar::new(&problem, &mut lao_reg, 1e-6, 1.0, 10_000, &cutoff);
    let lao_outcome = lao.solve();
    assert!((lao_outcome.value - 4.0).abs() < 1e-3);

    let mut lrtdp_reg: StateRegistry<Racetrack> = StateRegistry::new();
    let mut lrtdp = Lrtdp::new(&problem, &mut lrtdp_reg, 1e-6, 50, 2000, 7, &cutoff);
    lrtdp.solve();
    let initial = lrtdp_reg.get(&problem.initial_state()).unwrap();
    assert!((lrtdp_reg.node(initial).value - 4.0).abs() < 1e-2);
}

/// Scenario C: 3x3 sailing board with uniform wind, LAO* must converge
/// within 1e-3 of the Value Iteration result.
#[test]
fn scenario_c_sailing_lao_matches_value_iteration() {
    let problem = Sailing::new(3, (2, 2));

    let mut vi_reg: StateRegistry<Sailing> = StateRegistry::new();
    let cutoff = NoCutoff;
    let mut vi = ValueIteration::over_reachable_states(&problem, &mut vi_reg, 1e-6, 5000, &cutoff);
    let vi_outcome = vi.solve();
    assert!(vi_outcome.converged);

    let mut lao_reg: StateRegistry<Sailing> = StateRegistry::new();
    let mut lao = LaoStar::new(&problem, &mut lao_reg, 1e-6, 1.0, 50_000, &cutoff);
    let lao_outcome = lao.solve();
    assert!((lao_outcome.value - vi_outcome.value).abs() < 1e-3);
}

/// Scenario D: THTS with PARTIAL_BELLMAN backup on the 3-node CTP instance
/// should find a policy no more expensive than 1.5 * (1 + tolerance).
#[test]
fn scenario_d_ctp_thts_partial_bellman_recommends_a_cheap_policy() {
    let problem = Ctp::three_node();
    let mut reg: StateRegistry<Ctp> = StateRegistry::new();
    let cutoff = NoCutoff;
    let mut thts = Thts::new(&problem, &mut reg, 10_000, 10, 200_000, 2, Backup::PartialBellman, 1.4, 5, &cutoff);
    let outcome = thts.solve();
    assert!(outcome.value <= 1.5 * 1.01);
}

/// Scenario E: gridworld with a single dead-end neighbor of the start
/// state; META_ASSUMPTION_2 must not do worse than NO_META in expectation
/// over repeated trajectories, and strictly better on at least one trial
/// given enough VI iterations to have converged before the dead end would
/// otherwise be walked into blindly.
#[test]
fn scenario_e_metareasoning_meta_assumption_2_is_no_worse_than_no_meta() {
    let problem = Gridworld::new(3, 1, (1, 0), (2, 0), 0.0).with_trap((0, 0));
    let mut reg: StateRegistry<Gridworld> = StateRegistry::new();
    let states = generate_all(&problem, &mut reg);
    let cutoff = NoCutoff;
    let states_by_handle: HashMap<_, _> = states.iter().map(|&h| (h, reg.state(h).clone())).collect();
    let mut vi = ValueIteration::new(&problem, &mut reg, states.clone(), 1e-9, 20, &cutoff);
    vi.solve();

    let no_meta = MetareasoningSimulator::new(
        &problem,
        vi.history.clone(),
        states_by_handle.clone(),
        ActionSelectionRule::NoMeta,
        1e-6,
        0.05,
        0.9,
        3,
        50,
    );
    let meta2 = MetareasoningSimulator::new(
        &problem,
        vi.history.clone(),
        states_by_handle,
        ActionSelectionRule::MetaAssumption2,
        1e-6,
        0.05,
        0.9,
        3,
        50,
    );

    let (no_meta_cost, _) = no_meta.simulate();
    let (meta2_cost, _) = meta2.simulate();
    assert!(meta2_cost <= no_meta_cost + 1e-6);
}

/// Scenario F: a reduced racetrack (two most-likely outcomes primary, i.e.
/// a budget large enough to always follow the primary branch) solved with
/// an embedded SSiPP-style continual replanning loop reaches the goal
/// within 1.2x the unreduced optimum.
#[test]
fn scenario_f_reduced_racetrack_replanning_is_near_optimal() {
    let base = Racetrack::new(6, 3, 0.2, 0.1);

    let mut vi_reg: StateRegistry<Racetrack> = StateRegistry::new();
    let cutoff = NoCutoff;
    let mut vi = ValueIteration::over_reachable_states(&base, &mut vi_reg, 1e-6, 5000, &cutoff);
    let optimal = vi.solve().value;

    let reduced = ReducedModel::new(&base, MklReduction::by_probability(2));
    let mut reduced_reg: StateRegistry<ReducedModel<'_, Racetrack, MostLikelyIsPrimary>> = StateRegistry::new();
    let mut lao = LaoStar::new(&reduced, &mut reduced_reg, 1e-6, 1.0, 50_000, &cutoff);
    let reduced_outcome = lao.solve();

    assert!(reduced_outcome.value <= 1.2 * optimal + 1e-6);
}

/// SSiPP reaches the goal on the same deterministic racetrack, exercising
/// the short-sighted sub-MDP / embedded LAO* composition end to end.
#[test]
fn ssipp_reaches_the_goal_on_a_deterministic_racetrack() {
    let problem = std::sync::Arc::new(Racetrack::new(5, 5, 0.0, 0.0));
    let mut reg: StateRegistry<Racetrack> = StateRegistry::new();
    let cutoff = NoCutoff;
    let mut ssipp = Ssipp::new(&problem, &mut reg, 3, false, 0.0, 1e-6, 50, &cutoff);
    let outcome = ssipp.solve();
    assert!(outcome.converged);
    assert!((outcome.value - 4.0).abs() < 1.0);
}

/// Interning a state that is already present returns the same handle and
/// never duplicates storage.
#[test]
fn reinterning_a_state_is_idempotent() {
    struct Trivial;
    impl Mdp for Trivial {
        type State = u8;
        type Action = ();
        fn initial_state(&self) -> u8 { 0 }
        fn actions(&self) -> &[()] { &[()] }
        fn applicable(&self, _: &u8, _: &()) -> bool { false }
        fn transition(&self, _: &u8, _: &()) -> Vec<ssp_search::Successor<u8>> { vec![] }
        fn cost(&self, _: &u8, _: &()) -> f64 { 0.0 }
        fn goal(&self, _: &u8) -> bool { true }
    }
    let mut reg: StateRegistry<Trivial> = StateRegistry::new();
    let a = reg.intern(5, 0.0);
    let b = reg.intern(5, 99.0);
    assert_eq!(a, b);
    assert_eq!(1, reg.len());
}
