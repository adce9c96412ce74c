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

//! A single-row racetrack: a car at position `x` with velocity `v` can
//! accelerate, brake, or coast; with probability `slip` the chosen
//! acceleration fails and the car coasts instead, and with probability
//! `error` the car additionally overshoots by one cell. Reaching or
//! passing the finish line at full stop counts as the goal; running off
//! either end of the track is a dead end.

use crate::mdp::{Mdp, Successor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pedal {
    Accelerate,
    Brake,
    Coast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CarState {
    pub x: i32,
    pub v: i32,
}

pub struct Racetrack {
    pub length: i32,
    pub max_speed: i32,
    pub slip: f64,
    pub error: f64,
    actions: [Pedal; 3],
}

impl Racetrack {
    pub fn new(length: i32, max_speed: i32, slip: f64, error: f64) -> Self {
        Racetrack { length, max_speed, slip, error, actions: [Pedal::Accelerate, Pedal::Brake, Pedal::Coast] }
    }

    fn intended_velocity(&self, v: i32, pedal: Pedal) -> i32 {
        let raw = match pedal {
            Pedal::Accelerate => v + 1,
            Pedal::Brake => v - 1,
            Pedal::Coast => v,
        };
        raw.clamp(0, self.max_speed)
    }

    fn advance(&self, state: &CarState, v: i32, overshoot: i32) -> CarState {
        CarState { x: state.x + v + overshoot, v }
    }
}

impl Mdp for Racetrack {
    type State = CarState;
    type Action = Pedal;

    fn initial_state(&self) -> CarState {
        CarState { x: 0, v: 0 }
    }

    fn actions(&self) -> &[Pedal] {
        &self.actions
    }

    fn applicable(&self, state: &CarState, _action: &Pedal) -> bool {
        !self.goal(state) && state.x >= 0 && state.x < self.length
    }

    fn transition(&self, state: &CarState, action: &Pedal) -> Vec<Successor<CarState>> {
        let intended_v = self.intended_velocity(state.v, *action);
        let coast_v = self.intended_velocity(state.v, Pedal::Coast);

        if self.slip <= 0.0 && self.error <= 0.0 {
            return vec![Successor::new(self.advance(state, intended_v, 0), 1.0)];
        }

        let mut outcomes = Vec::new();
        let p_slip = self.slip;
        let p_ok = 1.0 - p_slip;

        let push = |outcomes: &mut Vec<Successor<CarState>>, v: i32, base_prob: f64| {
            if self.error > 0.0 {
                outcomes.push(Successor::new(self.advance(state, v, 0), base_prob * (1.0 - self.error)));
                outcomes.push(Successor::new(self.advance(state, v, 1), base_prob * self.error));
            } else {
                outcomes.push(Successor::new(self.advance(state, v, 0), base_prob));
            }
        };

        push(&mut outcomes, intended_v, p_ok);
        if p_slip > 0.0 && coast_v != intended_v {
            push(&mut outcomes, coast_v, p_slip);
        } else if p_slip > 0.0 {
            // Slipping changes nothing when the intended pedal already
            // coasts; fold the probability mass back into the main outcome
            // rather than emitting a zero-content duplicate branch.
            outcomes.clear();
            push(&mut outcomes, intended_v, 1.0);
        }
        outcomes
    }

    fn cost(&self, _state: &CarState, _action: &Pedal) -> f64 {
        1.0
    }

    fn goal(&self, state: &CarState) -> bool {
        state.x >= self.length
    }

    fn heuristic(&self, state: &CarState) -> f64 {
        if state.x >= self.length {
            0.0
        } else {
            ((self.length - state.x) as f64 / (state.v.max(1) as f64)).ceil()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StateRegistry;
    use crate::solver::{NoCutoff, Solver};
    use crate::solvers::lao::LaoStar;
    use crate::solvers::lrtdp::Lrtdp;
    use crate::solvers::vi::ValueIteration;

    #[test]
    fn a_deterministic_length_five_track_costs_four_accelerations() {
        let problem = Racetrack::new(5, 5, 0.0, 0.0);
        let mut reg: StateRegistry<Racetrack> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut vi = ValueIteration::over_reachable_states(&problem, &mut reg, 1e-9, 1000, &cutoff);
        let outcome = vi.solve();
        assert!(outcome.converged);
        assert!((outcome.value - 4.0).abs() < 1e-6);
    }

    #[test]
    fn lao_star_agrees_with_value_iteration_on_the_deterministic_track() {
        let problem = Racetrack::new(5, 5, 0.0, 0.0);
        let mut reg: StateRegistry<Racetrack> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut lao = LaoStar::new(&problem, &mut reg, 1e-6, 1.0, 10_000, &cutoff);
        let outcome = lao.solve();
        assert!((outcome.value - 4.0).abs() < 1e-3);
    }

    #[test]
    fn lrtdp_agrees_with_value_iteration_on_the_deterministic_track() {
        let problem = Racetrack::new(5, 5, 0.0, 0.0);
        let mut reg: StateRegistry<Racetrack> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut lrtdp = Lrtdp::new(&problem, &mut reg, 1e-6, 50, 1000, 1, &cutoff);
        lrtdp.solve();
        let initial = reg.get(&problem.initial_state()).unwrap();
        assert!((reg.node(initial).value - 4.0).abs() < 1e-2);
    }
}
