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

//! The Canadian Traveler Problem: a fixed graph whose edges may be blocked
//! ("weather"), with a per-edge probability of being open. Each edge's
//! status is unknown until the agent is adjacent to it and chooses to
//! `Observe` (free, reveals the edge without moving) or `Cross` (moves if
//! open, stays put and wastes the action if blocked). A small 3-node
//! instance is provided as [`Ctp::three_node`].

use crate::mdp::{Mdp, Successor};

/// `None` = unknown, `Some(true)` = open, `Some(false)` = blocked.
pub type EdgeStatus = Option<bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CtpState {
    pub node: usize,
    /// Belief over every edge in the graph, indexed the same way as
    /// `Ctp::edges`.
    pub beliefs: [EdgeStatus; Ctp::MAX_EDGES],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtpAction {
    Cross(usize),
    Observe(usize),
}

pub struct Ctp {
    pub num_nodes: usize,
    pub goal: usize,
    /// `(u, v, open_probability)` per edge.
    pub edges: Vec<(usize, usize, f64)>,
    actions: Vec<CtpAction>,
}

impl Ctp {
    pub const MAX_EDGES: usize = 8;

    pub fn new(num_nodes: usize, goal: usize, edges: Vec<(usize, usize, f64)>) -> Self {
        assert!(edges.len() <= Self::MAX_EDGES, "demo CTP encoding caps edges at {}", Self::MAX_EDGES);
        let mut actions = Vec::new();
        for idx in 0..edges.len() {
            actions.push(CtpAction::Cross(idx));
            actions.push(CtpAction::Observe(idx));
        }
        Ctp { num_nodes, goal, edges, actions }
    }

    /// A 3-node instance: edges (0-1) and (0-2) each open with probability
    /// 0.5, edge (1-2) always open.
    pub fn three_node() -> Self {
        Ctp::new(3, 2, vec![(0, 1, 0.5), (0, 2, 0.5), (1, 2, 1.0)])
    }

    fn incident_edges(&self, node: usize) -> impl Iterator<Item = (usize, usize, usize, f64)> + '_ {
        self.edges.iter().enumerate().filter_map(move |(idx, &(u, v, p))| {
            if u == node {
                Some((idx, u, v, p))
            } else if v == node {
                Some((idx, v, u, p))
            } else {
                None
            }
        })
    }

    fn empty_beliefs() -> [EdgeStatus; Self::MAX_EDGES] {
        [None; Self::MAX_EDGES]
    }
}

impl Mdp for Ctp {
    type State = CtpState;
    type Action = CtpAction;

    fn initial_state(&self) -> CtpState {
        CtpState { node: 0, beliefs: Self::empty_beliefs() }
    }

    fn actions(&self) -> &[CtpAction] {
        &self.actions
    }

    fn applicable(&self, state: &CtpState, action: &CtpAction) -> bool {
        if self.goal(state) {
            return false;
        }
        match action {
            CtpAction::Cross(idx) | CtpAction::Observe(idx) => {
                self.incident_edges(state.node).any(|(i, _, _, _)| i == *idx)
            }
        }
    }

    fn transition(&self, state: &CtpState, action: &CtpAction) -> Vec<Successor<CtpState>> {
        match action {
            CtpAction::Observe(idx) => {
                let (_, _, _, p) = self.incident_edges(state.node).find(|(i, _, _, _)| i == idx).unwrap();
                let mut open_beliefs = state.beliefs;
                open_beliefs[*idx] = Some(true);
                let mut closed_beliefs = state.beliefs;
                closed_beliefs[*idx] = Some(false);
                vec![
                    Successor::new(CtpState { node: state.node, beliefs: open_beliefs }, p),
                    Successor::new(CtpState { node: state.node, beliefs: closed_beliefs }, 1.0 - p),
                ]
            }
            CtpAction::Cross(idx) => {
                let (_, _, other, p) = self.incident_edges(state.node).find(|(i, _, _, _)| i == idx).unwrap();
                match state.beliefs[*idx] {
                    Some(true) => {
                        let mut beliefs = state.beliefs;
                        beliefs[*idx] = Some(true);
                        vec![Successor::new(CtpState { node: other, beliefs }, 1.0)]
                    }
                    Some(false) => vec![Successor::new(*state, 1.0)],
                    None => {
                        let mut open_beliefs = state.beliefs;
                        open_beliefs[*idx] = Some(true);
                        let mut closed_beliefs = state.beliefs;
                        closed_beliefs[*idx] = Some(false);
                        vec![
                            Successor::new(CtpState { node: other, beliefs: open_beliefs }, p),
                            Successor::new(CtpState { node: state.node, beliefs: closed_beliefs }, 1.0 - p),
                        ]
                    }
                }
            }
        }
    }

    fn cost(&self, _state: &CtpState, action: &CtpAction) -> f64 {
        match action {
            CtpAction::Observe(_) => 0.0,
            CtpAction::Cross(_) => 1.0,
        }
    }

    fn goal(&self, state: &CtpState) -> bool {
        state.node == self.goal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StateRegistry;
    use crate::solver::NoCutoff;
    use crate::solvers::thts::{Backup, Thts};
    use crate::solver::Solver;

    #[test]
    fn three_node_instance_is_solvable_with_thts() {
        let problem = Ctp::three_node();
        let mut reg: StateRegistry<Ctp> = StateRegistry::new();
        let cutoff = NoCutoff;
        let mut thts = Thts::new(&problem, &mut reg, 10_000, 10, 100_000, 1, Backup::PartialBellman, 1.4, 3, &cutoff);
        let outcome = thts.solve();
        assert!(outcome.value <= 2.0);
    }
}
