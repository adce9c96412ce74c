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

//! This module defines the error type used at the ambient boundaries of
//! this crate: the classical-planner bridge and the CLI harness. The
//! in-core Bellman/solver hot path never returns a `Result` — per this
//! crate's error-handling design, infeasibility and timeouts are
//! communicated in-band through state fields (`dead_end_cost`,
//! `best_action`, the `Completion`/`SolveOutcome` returned by a solver),
//! not through exceptions or `Result`.

use thiserror::Error;

/// Errors surfaced at the edges of this crate: file I/O performed by the
/// CLI harness, and failures of the external classical-planner process
/// used by FF-style heuristics.
#[derive(Debug, Error)]
pub enum SspError {
    #[error("failed to read domain file {path}: {source}")]
    DomainFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse domain file {path}: {reason}")]
    DomainParse { path: String, reason: String },

    /// The external planner bridge could not produce an answer. Per this
    /// crate's error-handling design, the dual role of the "dead-end"
    /// sentinel (both a cost cap and an action marker) is preserved from
    /// the original implementation, but exposed here as a proper error
    /// variant rather than a magic value, so callers can tell a genuine
    /// bridge failure from a legitimate dead-end cost.
    #[error("external planner process failed: {reason}")]
    ExternalPlannerFailed { reason: String },

    #[error("unknown solver name {0:?}")]
    UnknownSolver(String),
}
