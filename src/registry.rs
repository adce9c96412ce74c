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

//! This module provides the hash-interned state registry every solver in
//! this crate shares. It owns every state object reachable from a problem's
//! initial state for the lifetime of the problem, and attaches the
//! solver-owned bookkeeping fields (value, best action, residual, labels)
//! to each one.

use std::collections::HashMap;
use std::hash::Hash;

use bit_set::BitSet;

use crate::mdp::Mdp;

/// A stable, dense, non-owning reference to a state interned in a
/// [`StateRegistry`]. Solvers pass handles around instead of references or
/// raw pointers; the registry remains the sole owner of the state data for
/// the lifetime of the problem (see this crate's design notes on replacing
/// raw pointers and manual deletion with explicit ownership).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateHandle(pub usize);

impl StateHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A dense index into [`Mdp::actions`], used as the type of
/// `NodeData::best_action` so it stays `Copy` regardless of how large the
/// domain's `Action` type is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

impl ActionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Bit positions of the named labels tracked in [`Labels`].
mod bit {
    pub const SOLVED: usize = 0;
    pub const CLOSED: usize = 1;
    pub const SOLVED_FLARES: usize = 2;
    pub const DEAD_END: usize = 3;
}

/// A small, dense bit-set of solver labels attached to a state, backed by
/// `bit-set` for compact flag storage.
#[derive(Debug, Clone, Default)]
pub struct Labels(BitSet);

impl Labels {
    pub fn new() -> Self {
        Labels(BitSet::with_capacity(8))
    }

    #[inline]
    pub fn solved(&self) -> bool {
        self.0.contains(bit::SOLVED)
    }
    #[inline]
    pub fn set_solved(&mut self, value: bool) {
        self.set_bit(bit::SOLVED, value)
    }

    #[inline]
    pub fn closed(&self) -> bool {
        self.0.contains(bit::CLOSED)
    }
    #[inline]
    pub fn set_closed(&mut self, value: bool) {
        self.set_bit(bit::CLOSED, value)
    }

    #[inline]
    pub fn solved_flares(&self) -> bool {
        self.0.contains(bit::SOLVED_FLARES)
    }
    #[inline]
    pub fn set_solved_flares(&mut self, value: bool) {
        self.set_bit(bit::SOLVED_FLARES, value)
    }

    #[inline]
    pub fn dead_end(&self) -> bool {
        self.0.contains(bit::DEAD_END)
    }
    #[inline]
    pub fn set_dead_end(&mut self, value: bool) {
        self.set_bit(bit::DEAD_END, value)
    }

    fn set_bit(&mut self, bit: usize, value: bool) {
        if value {
            self.0.insert(bit);
        } else {
            self.0.remove(bit);
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// The solver-owned fields attached to every interned state. Excluded from
/// state identity by construction: the registry's intern map is keyed on
/// `M::State` alone, and `NodeData` only ever lives in the parallel `nodes`
/// vector indexed by [`StateHandle`].
#[derive(Debug, Clone)]
pub struct NodeData {
    /// The current value estimate, initialized from the heuristic.
    pub value: f64,
    /// The currently preferred action, if one has been computed.
    pub best_action: Option<ActionId>,
    /// `|value_old - value_new|` from the most recent Bellman update.
    pub residual: f64,
    /// Solver labels (SOLVED, CLOSED, SOLVED_FLARES, DEAD_END, ...).
    pub labels: Labels,
    /// FLARES' "labeled at depth d" marker. `None` until FLARES or
    /// Soft-FLARES declares this state solved at some bounded depth.
    pub labeled_at_depth: Option<u32>,
}

impl NodeData {
    fn fresh(value: f64) -> Self {
        NodeData {
            value,
            best_action: None,
            residual: f64::INFINITY,
            labels: Labels::new(),
            labeled_at_depth: None,
        }
    }

    fn reset(&mut self, value: f64) {
        self.value = value;
        self.best_action = None;
        self.residual = f64::INFINITY;
        self.labels.clear();
        self.labeled_at_depth = None;
    }
}

/// The hash-interned set of canonical state objects owned by a problem.
/// Guarantees exactly one canonical object per equality class, so that
/// reference (handle) equality implies value equality: `intern(intern(x))
/// == intern(x)` and `intern(x) == intern(y)` iff `x == y`.
pub struct StateRegistry<M: Mdp> {
    index_of: HashMap<M::State, StateHandle, fxhash::FxBuildHasher>,
    states: Vec<M::State>,
    nodes: Vec<NodeData>,
}

impl<M: Mdp> StateRegistry<M> {
    pub fn new() -> Self {
        StateRegistry {
            index_of: HashMap::default(),
            states: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Interns `state`: returns the handle of the existing canonical object
    /// equal to `state` if one is present, otherwise inserts `state` as a
    /// fresh node (value initialized from `heuristic`) and returns its new
    /// handle.
    pub fn intern(&mut self, state: M::State, heuristic: f64) -> StateHandle {
        if let Some(&handle) = self.index_of.get(&state) {
            return handle;
        }
        let handle = StateHandle(self.states.len());
        self.index_of.insert(state.clone(), handle);
        self.states.push(state);
        self.nodes.push(NodeData::fresh(heuristic));
        handle
    }

    /// Looks up the handle of `state` without interning it.
    pub fn get(&self, state: &M::State) -> Option<StateHandle> {
        self.index_of.get(state).copied()
    }

    #[inline]
    pub fn state(&self, handle: StateHandle) -> &M::State {
        &self.states[handle.index()]
    }

    #[inline]
    pub fn node(&self, handle: StateHandle) -> &NodeData {
        &self.nodes[handle.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, handle: StateHandle) -> &mut NodeData {
        &mut self.nodes[handle.index()]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = StateHandle> {
        (0..self.states.len()).map(StateHandle)
    }

    /// Clears value, best action, labels and residual for every interned
    /// state, so that a solver can be re-run from a clean slate without
    /// re-discovering the state space.
    pub fn reset(&mut self, heuristic: impl Fn(&M::State) -> f64) {
        for (state, node) in self.states.iter().zip(self.nodes.iter_mut()) {
            node.reset(heuristic(state));
        }
    }
}

impl<M: Mdp> Default for StateRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::Successor;

    #[derive(Clone, Eq, PartialEq, Hash)]
    struct S(i32);

    struct Dummy;
    impl Mdp for Dummy {
        type State = S;
        type Action = u8;
        fn initial_state(&self) -> S { S(0) }
        fn actions(&self) -> &[u8] { &[] }
        fn applicable(&self, _: &S, _: &u8) -> bool { false }
        fn transition(&self, _: &S, _: &u8) -> Vec<Successor<S>> { vec![] }
        fn cost(&self, _: &S, _: &u8) -> f64 { 0.0 }
        fn goal(&self, s: &S) -> bool { s.0 == 0 }
    }

    #[test]
    fn interning_the_same_state_twice_returns_the_same_handle() {
        let mut reg: StateRegistry<Dummy> = StateRegistry::new();
        let a = reg.intern(S(1), 0.0);
        let b = reg.intern(S(1), 5.0);
        assert_eq!(a, b);
        assert_eq!(1, reg.len());
    }

    #[test]
    fn distinct_states_get_distinct_handles() {
        let mut reg: StateRegistry<Dummy> = StateRegistry::new();
        let a = reg.intern(S(1), 0.0);
        let b = reg.intern(S(2), 0.0);
        assert_ne!(a, b);
        assert_eq!(2, reg.len());
    }

    #[test]
    fn node_mut_updates_are_visible_through_node() {
        let mut reg: StateRegistry<Dummy> = StateRegistry::new();
        let a = reg.intern(S(1), 3.0);
        assert_eq!(3.0, reg.node(a).value);
        reg.node_mut(a).value = 9.0;
        assert_eq!(9.0, reg.node(a).value);
    }

    #[test]
    fn labels_round_trip() {
        let mut labels = Labels::new();
        assert!(!labels.solved());
        labels.set_solved(true);
        assert!(labels.solved());
        labels.set_dead_end(true);
        assert!(labels.solved() && labels.dead_end());
        labels.set_solved(false);
        assert!(!labels.solved() && labels.dead_end());
    }

    #[test]
    fn reset_restores_heuristic_value_and_clears_labels() {
        let mut reg: StateRegistry<Dummy> = StateRegistry::new();
        let a = reg.intern(S(1), 1.0);
        reg.node_mut(a).value = 42.0;
        reg.node_mut(a).labels.set_solved(true);
        reg.reset(|s| s.0 as f64);
        assert_eq!(1.0, reg.node(a).value);
        assert!(!reg.node(a).labels.solved());
    }
}
