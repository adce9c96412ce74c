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

//! Heuristic-search algorithms over the planning kernel (`mdp`, `registry`,
//! `bellman`). Dynamic-programming solvers (`vi`, `lao`) in one family,
//! trial-based solvers (`lrtdp`, `brtdp`, `vpi_rtdp`, `hdp`, `flares`) in
//! another, and short-sighted/sampling solvers (`ssipp`, `uct`, `hop`,
//! `thts`) in a third, per this crate's component design.

pub mod vi;
pub mod lao;
pub mod trial;
pub mod lrtdp;
pub mod brtdp;
pub mod vpi_rtdp;
pub mod hdp;
pub mod flares;
pub mod ssipp;
pub mod uct;
pub mod hop;
pub mod thts;
