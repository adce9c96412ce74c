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

//! A generic heuristic-search library for stochastic shortest-path
//! Markov decision processes (SSPs).
//!
//! The core is a small planning kernel — an [`mdp::Mdp`] trait, a
//! hash-interned [`registry::StateRegistry`], and a handful of canonical
//! Bellman primitives in [`bellman`] — shared by every search algorithm in
//! [`solvers`]: Value Iteration and LAO* (dynamic-programming solvers),
//! LRTDP, BRTDP, VPI-RTDP, HDP and FLARES/Soft-FLARES (trial-based
//! solvers), and SSiPP, UCT, HOP and THTS (short-sighted and sampling
//! solvers). [`reduction`] hosts the determinization/reduction layer that
//! SSiPP and the reduction-search procedures build on, and
//! [`metareasoning`] replays Value Iteration's convergence history to
//! study when an agent should stop deliberating and start acting.

pub mod bellman;
pub mod demos;
pub mod error;
pub mod mdp;
pub mod metareasoning;
pub mod reduction;
pub mod registry;
pub mod rng;
pub mod solver;
pub mod solvers;

pub use error::SspError;
pub use mdp::{Mdp, Successor};
pub use registry::{ActionId, StateHandle, StateRegistry};
pub use solver::{Cutoff, NoCutoff, Reason, SolveOutcome, Solver, TimeBudget};
