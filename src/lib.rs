//! Service Dispatch
//!
//! Assigns field employees to time-slotted service calls so that total travel
//! distance is minimized.
//!
//! # Domain Model
//!
//! - [`Worker`](domain::Worker): Employee with a fixed starting position
//! - [`Task`](domain::Task): Service call with a position and a time slot
//! - [`SlotCatalogue`](domain::SlotCatalogue): Ordered set of allowed slots
//! - [`DispatchProblem`](domain::DispatchProblem): Complete problem instance
//! - [`Schedule`](domain::Schedule): Optimal task → worker mapping
//!
//! # Constraints
//!
//! - **Coverage** (hard): Every service call gets exactly one employee
//! - **Slot capacity** (hard): An employee serves at most one call per slot
//! - **Travel distance** (objective): Minimize total distance travelled
//!
//! # Solving
//!
//! Slots never share a worker's capacity, so the default strategy solves one
//! Hungarian assignment per slot (optionally in parallel). A global min-cost
//! flow formulation is available as an alternative and yields the same
//! optimal cost.
//!
//! ```
//! use service_dispatch::demo_data::generate_downtown;
//! use service_dispatch::solver::{solve, SolverConfig};
//!
//! let problem = generate_downtown();
//! let schedule = solve(&problem, &SolverConfig::default()).unwrap();
//! assert_eq!(schedule.assignments.len(), problem.tasks.len());
//! ```

pub mod api;
pub mod console;
pub mod cost;
pub mod demo_data;
pub mod domain;
pub mod dto;
pub mod error;
pub mod flow;
pub mod hungarian;
pub mod solver;
