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

//! Determinization and reduction of stochastic problems into smaller ones
//! that existing solvers can attack directly: wrapping a problem over a
//! restricted state set ([`wrapper::WrapperProblem`], used by SSiPP's
//! short-sighted sub-MDPs), and bounding the number of "exceptional"
//! outcomes a policy is allowed to ever encounter
//! ([`mkl::MklReduction`]/[`mkl::ReducedModel`]).

pub mod mkl;
pub mod search;
pub mod wrapper;

pub use mkl::{MklReduction, ReducedModel};
pub use wrapper::WrapperProblem;

/// A reduction decides, for a given `(state, action, outcome_index)`
/// triple, whether that outcome is the "primary" (expected) one or an
/// exception a reduced model may choose to forbid or budget.
pub trait Reduction<S, A> {
    fn is_primary(&self, state: &S, action: &A, outcome_index: usize) -> bool;
}
