//! Demo data generators for Service Dispatch.
//!
//! Provides two datasets:
//! - Downtown (10 employees, 8 service calls, 5 slots): the classic hand-made
//!   instance with two calls in each of the first four slots
//! - Citywide (40 employees, 120 service calls, 8 hourly slots): seeded
//!   random instance over a 50 × 50 grid

use chrono::NaiveTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{DispatchProblem, Slot, SlotCatalogue, Task, Worker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Downtown,
    Citywide,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DOWNTOWN" => Ok(DemoData::Downtown),
            "CITYWIDE" => Ok(DemoData::Citywide),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Downtown => "DOWNTOWN",
            DemoData::Citywide => "CITYWIDE",
        }
    }
}

/// Employee starting positions for the Downtown dataset.
const DOWNTOWN_EMPLOYEES: &[(&str, f64, f64)] = &[
    ("Employee1", 0.0, 0.0),
    ("Employee2", 0.0, 5.0),
    ("Employee3", 5.0, 0.0),
    ("Employee4", 5.0, 5.0),
    ("Employee5", 10.0, 0.0),
    ("Employee6", 10.0, 5.0),
    ("Employee7", 15.0, 0.0),
    ("Employee8", 15.0, 5.0),
    ("Employee9", 20.0, 0.0),
    ("Employee10", 20.0, 5.0),
];

/// Service calls for the Downtown dataset: `(id, x, y, slot)`.
const DOWNTOWN_CALLS: &[(&str, f64, f64, &str)] = &[
    ("ServiceCall1", 2.0, 3.0, "9 AM"),
    ("ServiceCall2", 7.0, 2.0, "9 AM"),
    ("ServiceCall3", 12.0, 1.0, "11 AM"),
    ("ServiceCall4", 18.0, 4.0, "11 AM"),
    ("ServiceCall5", 4.0, 2.0, "1 PM"),
    ("ServiceCall6", 9.0, 3.0, "1 PM"),
    ("ServiceCall7", 14.0, 4.0, "3 PM"),
    ("ServiceCall8", 19.0, 1.0, "3 PM"),
];

/// Citywide dataset configuration.
struct CitywideConfig {
    seed: u64,
    employee_count: usize,
    call_count: usize,
    first_slot_hour: u32,
    slot_count: usize,
    grid_size: f64,
}

const CITYWIDE: CitywideConfig = CitywideConfig {
    seed: 0,
    employee_count: 40,
    call_count: 120,
    first_slot_hour: 8,
    slot_count: 8,
    grid_size: 50.0,
};

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec![DemoData::Downtown.as_str(), DemoData::Citywide.as_str()]
}

/// Generates a demo problem.
pub fn generate(demo: DemoData) -> DispatchProblem {
    match demo {
        DemoData::Downtown => generate_downtown(),
        DemoData::Citywide => generate_citywide(),
    }
}

/// Generates demo data by name (case-insensitive).
///
/// # Examples
///
/// ```
/// use service_dispatch::demo_data::generate_by_name;
///
/// let problem = generate_by_name("downtown").unwrap();
/// assert_eq!(problem.name, "Downtown");
///
/// assert!(generate_by_name("UNKNOWN").is_none());
/// ```
pub fn generate_by_name(name: &str) -> Option<DispatchProblem> {
    name.parse::<DemoData>().ok().map(generate)
}

/// Generates the Downtown dataset (10 employees, 8 calls).
///
/// The 5 PM slot is in the catalogue but has no calls.
///
/// # Examples
///
/// ```
/// use service_dispatch::demo_data::generate_downtown;
///
/// let problem = generate_downtown();
/// assert_eq!(problem.workers.len(), 10);
/// assert_eq!(problem.tasks.len(), 8);
/// assert_eq!(problem.slots.len(), 5);
/// ```
pub fn generate_downtown() -> DispatchProblem {
    let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
    let slots = SlotCatalogue::hourly(start, 5, 2);

    let workers = DOWNTOWN_EMPLOYEES
        .iter()
        .map(|&(id, x, y)| Worker::new(id, x, y))
        .collect();
    let tasks = DOWNTOWN_CALLS
        .iter()
        .map(|&(id, x, y, slot)| Task::new(id, x, y, slot))
        .collect();

    DispatchProblem::new("Downtown", workers, tasks, slots)
}

/// Generates the Citywide dataset (40 employees, 120 calls, 8 slots).
///
/// No slot receives more calls than there are employees, so the instance is
/// always feasible.
///
/// # Examples
///
/// ```
/// use service_dispatch::demo_data::generate_citywide;
///
/// let problem = generate_citywide();
/// assert_eq!(problem.workers.len(), 40);
/// assert_eq!(problem.tasks.len(), 120);
/// ```
pub fn generate_citywide() -> DispatchProblem {
    let config = &CITYWIDE;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let first = NaiveTime::from_hms_opt(config.first_slot_hour, 0, 0).unwrap_or_default();
    let slots = SlotCatalogue::hourly(first, config.slot_count, 1);
    let slot_list: Vec<Slot> = slots.iter().cloned().collect();

    let workers = (0..config.employee_count)
        .map(|i| {
            Worker::new(
                format!("Tech{:02}", i + 1),
                random_coord(&mut rng, config.grid_size),
                random_coord(&mut rng, config.grid_size),
            )
        })
        .collect();

    let mut load = vec![0usize; slot_list.len()];
    let tasks = (0..config.call_count)
        .map(|i| {
            let mut s = rng.gen_range(0..slot_list.len());
            while load[s] >= config.employee_count {
                s = (s + 1) % slot_list.len();
            }
            load[s] += 1;
            Task::new(
                format!("Call{:03}", i + 1),
                random_coord(&mut rng, config.grid_size),
                random_coord(&mut rng, config.grid_size),
                slot_list[s].clone(),
            )
        })
        .collect();

    DispatchProblem::new("Citywide", workers, tasks, slots)
}

/// Coordinate rounded to one decimal, like hand-entered map positions.
fn random_coord(rng: &mut StdRng, size: f64) -> f64 {
    (rng.gen_range(0.0..size) * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{solve, verify, SolverConfig, Strategy};

    #[test]
    fn test_demo_data_from_str() {
        assert_eq!("DOWNTOWN".parse::<DemoData>(), Ok(DemoData::Downtown));
        assert_eq!("citywide".parse::<DemoData>(), Ok(DemoData::Citywide));
        assert!("invalid".parse::<DemoData>().is_err());
        assert_eq!(list_demo_data(), vec!["DOWNTOWN", "CITYWIDE"]);
    }

    #[test]
    fn test_downtown_slots() {
        let problem = generate_downtown();
        let labels: Vec<&str> = problem.slots.iter().map(Slot::as_str).collect();
        assert_eq!(labels, ["9 AM", "11 AM", "1 PM", "3 PM", "5 PM"]);
        for call in &problem.tasks {
            assert!(problem.slots.contains(&call.slot), "{} has unknown slot", call.id);
        }
    }

    #[test]
    fn test_downtown_optimum() {
        let problem = generate_downtown();
        let schedule = solve(&problem, &SolverConfig::default()).unwrap();

        assert!((schedule.total_cost - 17.42955328423773).abs() < 1e-9);
        assert_eq!(schedule.worker_for("ServiceCall1"), Some("Employee2"));
        assert_eq!(schedule.worker_for("ServiceCall2"), Some("Employee3"));
        assert_eq!(schedule.worker_for("ServiceCall3"), Some("Employee5"));
        assert_eq!(schedule.worker_for("ServiceCall4"), Some("Employee10"));
        assert_eq!(schedule.worker_for("ServiceCall5"), Some("Employee3"));
        assert_eq!(schedule.worker_for("ServiceCall6"), Some("Employee6"));
        assert_eq!(schedule.worker_for("ServiceCall7"), Some("Employee8"));
        assert_eq!(schedule.worker_for("ServiceCall8"), Some("Employee9"));
    }

    #[test]
    fn test_citywide_is_reproducible_and_feasible() {
        let a = generate_citywide();
        let b = generate_citywide();
        assert_eq!(a, b);

        for slot in a.slots.iter() {
            assert!(a.tasks_in_slot(slot).count() <= a.workers.len());
        }

        let by_slot = solve(&a, &SolverConfig::default()).unwrap();
        let by_flow = solve(&a, &SolverConfig::default().with_strategy(Strategy::GlobalFlow)).unwrap();
        assert!(verify(&a, &by_slot).is_empty());
        assert!(verify(&a, &by_flow).is_empty());
        assert!((by_slot.total_cost - by_flow.total_cost).abs() < 1e-6);
    }
}
