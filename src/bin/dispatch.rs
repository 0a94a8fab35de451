//! Solves a demo dataset and prints the schedule.
//!
//! Run with: cargo run --release --bin dispatch -- [DOWNTOWN|CITYWIDE] [--flow]

use service_dispatch::console;
use service_dispatch::cost::Euclidean;
use service_dispatch::demo_data::{self, DemoData};
use service_dispatch::solver::{self, SolverConfig, Strategy};
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    if let Err(err) = console::init_tracing() {
        console::print_error(&format!("logging unavailable: {}", err));
    }

    let mut demo = DemoData::Downtown;
    let mut strategy = Strategy::Decomposition;

    for arg in std::env::args().skip(1) {
        if arg == "--flow" {
            strategy = Strategy::GlobalFlow;
        } else {
            match arg.parse::<DemoData>() {
                Ok(d) => demo = d,
                Err(()) => {
                    console::print_error(&format!(
                        "unknown dataset {} (expected one of {})",
                        arg,
                        demo_data::list_demo_data().join(", ")
                    ));
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    console::print_banner();
    let problem = demo_data::generate(demo);
    console::print_config(problem.workers.len(), problem.tasks.len(), problem.slots.len());

    let started = Instant::now();
    let config = SolverConfig::default().with_strategy(strategy);
    match solver::solve(&problem, &config) {
        Ok(schedule) => {
            console::print_solving_ended(
                started.elapsed(),
                schedule.assignments.len(),
                schedule.total_cost,
                true,
            );
            console::print_schedule(&problem, &schedule);
            console::print_workload(&solver::analyze(&problem, &schedule, &Euclidean));
            ExitCode::SUCCESS
        }
        Err(err) => {
            console::print_solving_ended(started.elapsed(), 0, 0.0, false);
            console::print_error(&err.to_string());
            ExitCode::FAILURE
        }
    }
}
