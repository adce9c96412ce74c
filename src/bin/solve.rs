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

//! A thin demonstration harness: loads one of this crate's own demo
//! domains, runs the requested solver on it, and prints the resulting
//! policy value and recommended first action. Not part of the core
//! library — ambient tooling only.

use clap::{Parser, ValueEnum};

use ssp_search::demos::gridworld::Gridworld;
use ssp_search::demos::racetrack::Racetrack;
use ssp_search::demos::sailing::Sailing;
use ssp_search::error::SspError;
use ssp_search::registry::StateRegistry;
use ssp_search::solver::{NoCutoff, Solver};
use ssp_search::solvers::lao::LaoStar;
use ssp_search::solvers::lrtdp::Lrtdp;
use ssp_search::solvers::uct::{Uct, UctExploration};
use ssp_search::solvers::vi::ValueIteration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Domain {
    Gridworld,
    Racetrack,
    Sailing,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    Vi,
    Lao,
    Lrtdp,
    Uct,
}

/// Solves a small demo stochastic shortest-path problem and prints the
/// resulting policy summary.
#[derive(Parser, Debug)]
#[command(name = "solve", about = "Run a heuristic-search SSP solver on a demo domain")]
struct Cli {
    #[arg(value_enum)]
    domain: Domain,

    #[arg(value_enum)]
    algorithm: Algorithm,

    #[arg(long, default_value_t = 1e-6)]
    epsilon: f64,

    #[arg(long, default_value_t = 10_000)]
    max_iterations: usize,

    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() -> Result<(), SspError> {
    let cli = Cli::parse();

    match cli.domain {
        Domain::Gridworld => {
            let problem = Gridworld::new(5, 5, (0, 0), (4, 4), 0.1);
            run(&problem, cli.algorithm, cli.epsilon, cli.max_iterations, cli.seed)
        }
        Domain::Racetrack => {
            let problem = Racetrack::new(10, 4, 0.1, 0.05);
            run(&problem, cli.algorithm, cli.epsilon, cli.max_iterations, cli.seed)
        }
        Domain::Sailing => {
            let problem = Sailing::new(4, (3, 3));
            run(&problem, cli.algorithm, cli.epsilon, cli.max_iterations, cli.seed)
        }
    }
    Ok(())
}

fn run<M: ssp_search::Mdp>(problem: &M, algorithm: Algorithm, epsilon: f64, max_iterations: usize, seed: u64) {
    let mut registry: StateRegistry<M> = StateRegistry::new();
    let cutoff = NoCutoff;

    match algorithm {
        Algorithm::Vi => {
            let mut solver = ValueIteration::over_reachable_states(problem, &mut registry, epsilon, max_iterations, &cutoff);
            let outcome = solver.solve();
            print_policy(solver.recommended_action(), &outcome);
        }
        Algorithm::Lao => {
            let mut solver = LaoStar::new(problem, &mut registry, epsilon, 1.0, max_iterations, &cutoff);
            let outcome = solver.solve();
            print_policy(solver.recommended_action(), &outcome);
        }
        Algorithm::Lrtdp => {
            let mut solver = Lrtdp::new(problem, &mut registry, epsilon, 1000, max_iterations, seed, &cutoff);
            let outcome = solver.solve();
            print_policy(solver.recommended_action(), &outcome);
        }
        Algorithm::Uct => {
            let mut solver = Uct::new(problem, &mut registry, max_iterations, 50, UctExploration::Fixed(1.4), 1, seed, &cutoff);
            let outcome = solver.solve();
            print_policy(solver.recommended_action(), &outcome);
        }
    }
}

fn print_policy(action: Option<ssp_search::ActionId>, outcome: &ssp_search::SolveOutcome) {
    println!("converged: {}", outcome.converged);
    println!("value(initial): {:.4}", outcome.value);
    println!("states touched: {}", outcome.states_touched);
    match action {
        Some(a) => println!("recommended action index: {}", a.index()),
        None => println!("recommended action: none (dead end or unsolved)"),
    }
}
