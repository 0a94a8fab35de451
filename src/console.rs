//! Colorful console output for dispatch results.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::domain::{DispatchProblem, Schedule};
use crate::solver::Analysis;

/// Installs the global `tracing` subscriber: `RUST_LOG` plus `service_dispatch=info`.
///
/// Fails if a subscriber is already installed.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("service_dispatch=info".parse()?))
        .try_init()
}

/// ASCII art banner for startup.
pub fn print_banner() {
    let banner = r#"
  ____  _                 _       _
 |  _ \(_)___ _ __   __ _| |_ ___| |__
 | | | | / __| '_ \ / _` | __/ __| '_ \
 | |_| | \__ \ |_) | (_| | || (__| | | |
 |____/|_|___/ .__/ \__,_|\__\___|_| |_|
             |_|
"#;
    println!("{}", banner.cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "Service Dispatch".bright_cyan()
    );
}

/// Prints the problem dimensions.
pub fn print_config(workers: usize, tasks: usize, slots: usize) {
    println!(
        "{} {} {} Problem: employees ({}), service calls ({}), slots ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Solver]".bright_cyan(),
        workers.to_formatted_string(&Locale::en).bright_yellow(),
        tasks.to_formatted_string(&Locale::en).bright_yellow(),
        slots.to_formatted_string(&Locale::en).bright_yellow()
    );
}

/// Prints solver completion summary.
pub fn print_solving_ended(
    total_duration: Duration,
    assignments: usize,
    total_cost: f64,
    is_feasible: bool,
) {
    println!(
        "{} {} {} Solving ended: time spent ({}), assignments ({}), total distance ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Solver]".bright_cyan(),
        format_duration(total_duration).yellow(),
        assignments.to_formatted_string(&Locale::en).white(),
        format_cost(total_cost, is_feasible)
    );

    // Summary box (60 chars wide, 56 char content area)
    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════╗".bright_cyan());

    let status_text = if is_feasible {
        "✓ OPTIMAL DISPATCH FOUND"
    } else {
        "✗ NO FEASIBLE DISPATCH"
    };
    let status_colored = if is_feasible {
        status_text.bright_green().bold().to_string()
    } else {
        status_text.bright_red().bold().to_string()
    };
    let status_padding = 56 - status_text.chars().count();
    let left_pad = status_padding / 2;
    let right_pad = status_padding - left_pad;
    println!(
        "{}{}{}{}{}",
        "║".bright_cyan(),
        " ".repeat(left_pad),
        status_colored,
        " ".repeat(right_pad),
        "║".bright_cyan()
    );

    println!("{}", "╠══════════════════════════════════════════════════════════╣".bright_cyan());

    let cost_str = if is_feasible {
        format!("{:.4}", total_cost)
    } else {
        "-".to_string()
    };
    println!(
        "{}  {:<18}{:>36}  {}",
        "║".bright_cyan(),
        "Total Distance:",
        cost_str,
        "║".bright_cyan()
    );

    let time_str = format!("{:.3}s", total_duration.as_secs_f64());
    println!(
        "{}  {:<18}{:>36}  {}",
        "║".bright_cyan(),
        "Solving Time:",
        time_str,
        "║".bright_cyan()
    );

    println!("{}", "╚══════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}

/// Prints the schedule as `Employee -> Call (slot)` lines, grouped by employee.
pub fn print_schedule(problem: &DispatchProblem, schedule: &Schedule) {
    println!("{} {}", "Total travel distance:".bold(), format!("{:.4}", schedule.total_cost).bright_green());
    println!("{}", "Assignment:".bold());
    for worker in &problem.workers {
        for assignment in schedule.tasks_for(&worker.id) {
            println!(
                "  {} {} {} ({}) {}",
                worker.id.bright_white(),
                "->".bright_black(),
                assignment.task_id.bright_yellow(),
                assignment.slot.to_string().cyan(),
                format!("{:.3}", assignment.cost).bright_black()
            );
        }
    }
    println!();
}

/// Prints per-employee load from an analysis.
pub fn print_workload(analysis: &Analysis) {
    println!("{}", "Per-employee load:".bold());
    for load in &analysis.workers {
        let calls = if load.tasks.is_empty() {
            "idle".bright_black().to_string()
        } else {
            load.tasks.join(", ")
        };
        println!(
            "  {:<12} {:>9}  {}",
            load.worker_id,
            format!("{:.3}", load.distance),
            calls
        );
    }
    for violation in &analysis.violations {
        println!("  {} {}", "✗".bright_red(), violation);
    }
    println!();
}

/// Prints a solver failure.
pub fn print_error(message: &str) {
    println!(
        "{} {} {} {}",
        timestamp().bright_black(),
        "ERROR".bright_red(),
        "[Solver]".bright_cyan(),
        message.bright_red()
    );
}

/// Formats a duration nicely.
fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let mins = total_ms / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

/// Formats a total distance, red when no feasible schedule exists.
fn format_cost(cost: f64, is_feasible: bool) -> String {
    if is_feasible {
        format!("{:.4}", cost).bright_green().to_string()
    } else {
        "infeasible".bright_red().to_string()
    }
}

/// Returns a timestamp string.
fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}
