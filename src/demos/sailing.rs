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

//! The sailing domain: a boat on an `n x n` grid must reach a fixed goal
//! cell while the wind direction changes stochastically each turn (one of
//! eight compass directions, uniformly at random) and the cost of moving
//! depends on the tack angle between the boat's heading and the wind.

use crate::mdp::{Mdp, Successor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoatState {
    pub x: i32,
    pub y: i32,
    pub wind: u8,
}

pub struct Sailing {
    pub size: i32,
    pub goal: (i32, i32),
    /// Cost per tack angle (0 = into the wind, .. 7 = a full circle away),
    /// indexed `0..=7`; `f64::INFINITY` for angles the boat cannot sail.
    pub tack_cost: [f64; 8],
    headings: [u8; 8],
}

impl Sailing {
    /// Cost indexed by tack penalty `{1,2,5,10,INF}`, mirrored
    /// symmetrically around the wind direction.
    pub fn new(size: i32, goal: (i32, i32)) -> Self {
        Sailing {
            size,
            goal,
            tack_cost: [f64::INFINITY, 10.0, 5.0, 2.0, 1.0, 2.0, 5.0, 10.0],
            headings: [0, 1, 2, 3, 4, 5, 6, 7],
        }
    }

    fn heading_delta(heading: u8) -> (i32, i32) {
        match heading % 8 {
            0 => (0, -1),
            1 => (1, -1),
            2 => (1, 0),
            3 => (1, 1),
            4 => (0, 1),
            5 => (-1, 1),
            6 => (-1, 0),
            _ => (-1, -1),
        }
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.size && y < self.size
    }
}

impl Mdp for Sailing {
    type State = BoatState;
    type Action = u8;

    fn initial_state(&self) -> BoatState {
        BoatState { x: 0, y: 0, wind: 0 }
    }

    fn actions(&self) -> &[u8] {
        &self.headings
    }

    fn applicable(&self, state: &BoatState, action: &u8) -> bool {
        if self.goal(state) {
            return false;
        }
        let angle = ((*action as i32 - state.wind as i32).rem_euclid(8)) as usize;
        self.tack_cost[angle].is_finite()
    }

    fn transition(&self, state: &BoatState, action: &u8) -> Vec<Successor<BoatState>> {
        let (dx, dy) = Self::heading_delta(*action);
        let (nx, ny) = (state.x + dx, state.y + dy);
        let (nx, ny) = if self.in_bounds(nx, ny) { (nx, ny) } else { (state.x, state.y) };

        (0..8u8)
            .map(|wind| Successor::new(BoatState { x: nx, y: ny, wind }, 1.0 / 8.0))
            .collect()
    }

    fn cost(&self, state: &BoatState, action: &u8) -> f64 {
        let angle = ((*action as i32 - state.wind as i32).rem_euclid(8)) as usize;
        self.tack_cost[angle]
    }

    fn goal(&self, state: &BoatState) -> bool {
        (state.x, state.y) == self.goal
    }

    fn heuristic(&self, state: &BoatState) -> f64 {
        let dx = (self.goal.0 - state.x).abs();
        let dy = (self.goal.1 - state.y).abs();
        dx.max(dy) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StateRegistry;
    use crate::solver::{NoCutoff, Solver};
    use crate::solvers::lao::LaoStar;
    use crate::solvers::vi::ValueIteration;

    #[test]
    fn lao_star_matches_value_iteration_on_a_3x3_board() {
        let problem = Sailing::new(3, (2, 2));
        let mut vi_reg: StateRegistry<Sailing> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut vi = ValueIteration::over_reachable_states(&problem, &mut vi_reg, 1e-6, 2000, &cutoff);
        let vi_outcome = vi.solve();
        assert!(vi_outcome.converged);

        let mut lao_reg: StateRegistry<Sailing> = StateRegistry::new();
        let mut lao = LaoStar::new(&problem, &mut lao_reg, 1e-6, 1.0, 20_000, &cutoff);
        let lao_outcome = lao.solve();

        assert!((lao_outcome.value - vi_outcome.value).abs() < 1e-3);
    }
}
