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

//! This module defines the `Solver` trait every heuristic-search algorithm
//! in this crate implements, along with the `Cutoff` trait used to bound
//! their running time.

use std::sync::{atomic::AtomicBool, Arc};
use std::time::Duration;

use crate::registry::ActionId;

/// A cutoff heuristic meant to decide when to stop the resolution of a
/// given problem. Polled between iterations (Value Iteration, LAO*) or
/// between trials (the RTDP family) as described in this crate's
/// concurrency and resource model.
pub trait Cutoff {
    fn must_stop(&self) -> bool;
}

/// _This is the default cutoff heuristic._ It never stops early: the
/// solver is left to run until it proves optimality (or exhausts its own
/// iteration cap, if it has one).
#[derive(Debug, Default, Copy, Clone)]
pub struct NoCutoff;
impl Cutoff for NoCutoff {
    fn must_stop(&self) -> bool {
        false
    }
}

/// A cutoff that fires once a fixed wall-clock budget elapses. Once the
/// budget runs out, a solver built on top of [`Cutoff`] is expected to
/// return the best policy computed so far; `best_action` fields may be
/// partial.
#[derive(Debug, Clone)]
pub struct TimeBudget {
    stop: Arc<AtomicBool>,
}
impl TimeBudget {
    pub fn new(budget: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        std::thread::spawn(move || {
            std::thread::sleep(budget);
            flag.store(true, std::sync::atomic::Ordering::Relaxed);
        });
        TimeBudget { stop }
    }
}
impl Cutoff for TimeBudget {
    fn must_stop(&self) -> bool {
        self.stop.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// The reason a solver stopped before proving optimality.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Reason {
    /// The configured [`Cutoff`] fired.
    CutoffOccurred,
    /// The solver's own iteration cap was reached (e.g. Value Iteration's
    /// `max_iterations`).
    IterationCapReached,
}

/// The outcome of a solver's resolution attempt. Mirrors this crate's
/// error-handling design: infeasibility and partial results are
/// communicated in-band, not via `Result`.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// `true` iff the search ran to convergence (no cutoff fired).
    pub converged: bool,
    /// If the search stopped early, the reason why.
    pub reason: Option<Reason>,
    /// The value of the initial state at the time resolution stopped.
    pub value: f64,
    /// The number of states for which a Bellman update was performed.
    pub states_touched: usize,
}

/// The common interface implemented by every heuristic-search algorithm in
/// this crate. `solve` runs the algorithm to (convergence or cutoff); the
/// resulting policy is encoded entirely in the state registry's
/// `best_action` fields, as a side effect — `solve` returns a summary, not
/// the policy itself, since the policy may cover many states.
pub trait Solver {
    /// Runs the algorithm until convergence (within its configured
    /// epsilon) or until its [`Cutoff`] fires. The policy is recovered
    /// afterwards from the state registry's `best_action` fields, starting
    /// at the initial state and following greedy actions.
    fn solve(&mut self) -> SolveOutcome;

    /// Returns the currently preferred action for the initial state, if
    /// one has been computed. `None` means either that resolution has not
    /// been run yet, or that the initial state is a proven dead end.
    fn recommended_action(&self) -> Option<ActionId>;
}
