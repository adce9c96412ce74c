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

//! A slippery gridworld: moving in the intended direction succeeds with
//! probability `1 - slip`, and slides into one of the two perpendicular
//! directions with probability `slip / 2` each. Walls and obstacles are
//! absorbing in the sense that bumping into one leaves the agent in place.
//! `traps` are cells with no applicable action at all, so the shared
//! Bellman update labels them `DEAD_END` automatically; scenario E's
//! "single dead-end neighbor" metareasoning test is built from one.

use std::collections::HashSet;

use crate::mdp::{Mdp, Successor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    fn perpendicular(self) -> (Direction, Direction) {
        match self {
            Direction::Up | Direction::Down => (Direction::Left, Direction::Right),
            Direction::Left | Direction::Right => (Direction::Up, Direction::Down),
        }
    }
}

pub struct Gridworld {
    pub width: i32,
    pub height: i32,
    pub start: (i32, i32),
    pub goal: (i32, i32),
    pub obstacles: HashSet<(i32, i32)>,
    pub traps: HashSet<(i32, i32)>,
    pub slip: f64,
    actions: [Direction; 4],
}

impl Gridworld {
    pub fn new(width: i32, height: i32, start: (i32, i32), goal: (i32, i32), slip: f64) -> Self {
        Gridworld {
            width,
            height,
            start,
            goal,
            obstacles: HashSet::new(),
            traps: HashSet::new(),
            slip,
            actions: [Direction::Up, Direction::Down, Direction::Left, Direction::Right],
        }
    }

    pub fn with_trap(mut self, cell: (i32, i32)) -> Self {
        self.traps.insert(cell);
        self
    }

    pub fn with_obstacle(mut self, cell: (i32, i32)) -> Self {
        self.obstacles.insert(cell);
        self
    }

    fn in_bounds(&self, (x, y): (i32, i32)) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn step(&self, (x, y): (i32, i32), direction: Direction) -> (i32, i32) {
        let (dx, dy) = direction.delta();
        let next = (x + dx, y + dy);
        if self.in_bounds(next) && !self.obstacles.contains(&next) {
            next
        } else {
            (x, y)
        }
    }
}

impl Mdp for Gridworld {
    type State = (i32, i32);
    type Action = Direction;

    fn initial_state(&self) -> (i32, i32) {
        self.start
    }

    fn actions(&self) -> &[Direction] {
        &self.actions
    }

    fn applicable(&self, state: &(i32, i32), _action: &Direction) -> bool {
        !self.goal(state) && !self.traps.contains(state)
    }

    fn transition(&self, state: &(i32, i32), action: &Direction) -> Vec<Successor<(i32, i32)>> {
        if self.slip <= 0.0 {
            return vec![Successor::new(self.step(*state, *action), 1.0)];
        }
        let (left, right) = action.perpendicular();
        vec![
            Successor::new(self.step(*state, *action), 1.0 - self.slip),
            Successor::new(self.step(*state, left), self.slip / 2.0),
            Successor::new(self.step(*state, right), self.slip / 2.0),
        ]
    }

    fn cost(&self, _state: &(i32, i32), _action: &Direction) -> f64 {
        1.0
    }

    fn goal(&self, state: &(i32, i32)) -> bool {
        *state == self.goal
    }

    fn heuristic(&self, state: &(i32, i32)) -> f64 {
        ((state.0 - self.goal.0).abs() + (state.1 - self.goal.1).abs()) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StateRegistry;
    use crate::solver::{NoCutoff, Solver};
    use crate::solvers::vi::ValueIteration;

    #[test]
    fn deterministic_3x3_costs_the_manhattan_distance() {
        let problem = Gridworld::new(3, 3, (0, 0), (2, 2), 0.0);
        let mut reg: StateRegistry<Gridworld> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut vi = ValueIteration::over_reachable_states(&problem, &mut reg, 1e-9, 1000, &cutoff);
        let outcome = vi.solve();
        assert!(outcome.converged);
        assert!((outcome.value - 4.0).abs() < 1e-6);
    }

    #[test]
    fn a_trap_cell_is_a_proven_dead_end() {
        let problem = Gridworld::new(3, 1, (0, 0), (2, 0), 0.0).with_trap((1, 0));
        let mut reg: StateRegistry<Gridworld> = StateRegistry::new();
        let trap = reg.intern((1, 0), 0.0);
        crate::bellman::bellman_update(&problem, &mut reg, trap);
        assert!(reg.node(trap).labels.dead_end());
    }
}
