//! Domain model for the Service Dispatch problem.
//!
//! # Overview
//!
//! Models a single-shot dispatch problem with:
//! - [`Worker`]s (field employees) with fixed starting [`Position`]s
//! - [`Task`]s (service calls) with positions and a time [`Slot`]
//! - A [`SlotCatalogue`] listing the allowed slots in display order
//! - [`DispatchProblem`] as the complete instance
//! - [`Schedule`] as the solved task → worker mapping
//!
//! # Design
//!
//! Entities are plain values. The optimizer reads them once per invocation and
//! never mutates them.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::InvalidInstanceError;

/// A point on the service area plane.
///
/// # Examples
///
/// ```
/// use service_dispatch::domain::Position;
///
/// let a = Position::new(0.0, 0.0);
/// let b = Position::new(3.0, 4.0);
/// assert_eq!(a.distance(&b), 5.0);
/// assert_eq!(b.scaled(2.0), Position::new(6.0, 8.0));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns this position with both coordinates multiplied by `k`.
    pub fn scaled(&self, k: f64) -> Self {
        Self {
            x: self.x * k,
            y: self.y * k,
        }
    }
}

/// A time slot label such as `"9 AM"`.
///
/// Slots carry no identity beyond their label; they only group tasks for the
/// per-worker capacity constraint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(String);

impl Slot {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Builds the 12-hour label for a wall-clock time.
    ///
    /// ```
    /// use chrono::NaiveTime;
    /// use service_dispatch::domain::Slot;
    ///
    /// let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    /// let one = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
    /// assert_eq!(Slot::at(nine).as_str(), "9 AM");
    /// assert_eq!(Slot::at(one).as_str(), "1 PM");
    /// ```
    pub fn at(time: NaiveTime) -> Self {
        Self(time.format("%-I %p").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Slot {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// The fixed, ordered set of slots a problem may use.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use service_dispatch::domain::{Slot, SlotCatalogue};
///
/// let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
/// let slots = SlotCatalogue::hourly(start, 5, 2);
/// let labels: Vec<&str> = slots.iter().map(Slot::as_str).collect();
/// assert_eq!(labels, ["9 AM", "11 AM", "1 PM", "3 PM", "5 PM"]);
/// assert_eq!(slots.position(&Slot::new("1 PM")), Some(2));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Slot>", into = "Vec<Slot>")]
pub struct SlotCatalogue {
    slots: Vec<Slot>,
}

impl SlotCatalogue {
    /// Creates a catalogue, rejecting repeated labels.
    pub fn new<I, S>(labels: I) -> Result<Self, InvalidInstanceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Slot>,
    {
        let mut seen = HashSet::new();
        let mut slots = Vec::new();
        for label in labels {
            let slot = label.into();
            if !seen.insert(slot.clone()) {
                return Err(InvalidInstanceError::DuplicateSlot { slot });
            }
            slots.push(slot);
        }
        Ok(Self { slots })
    }

    /// Builds up to `count` slots starting at `start`, `step_hours` apart.
    ///
    /// Labels carry no date, so the sequence stops at the first label that
    /// wraps around the clock onto an earlier one.
    pub fn hourly(start: NaiveTime, count: usize, step_hours: i64) -> Self {
        let mut seen = HashSet::new();
        let slots = (0..count)
            .map(|i| {
                let (time, _) = start.overflowing_add_signed(Duration::hours(step_hours * i as i64));
                Slot::at(time)
            })
            .take_while(|slot| seen.insert(slot.clone()))
            .collect();
        Self { slots }
    }

    /// Index of `slot` in catalogue order.
    pub fn position(&self, slot: &Slot) -> Option<usize> {
        self.slots.iter().position(|s| s == slot)
    }

    pub fn contains(&self, slot: &Slot) -> bool {
        self.position(slot).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl TryFrom<Vec<Slot>> for SlotCatalogue {
    type Error = InvalidInstanceError;

    fn try_from(slots: Vec<Slot>) -> Result<Self, Self::Error> {
        Self::new(slots)
    }
}

impl From<SlotCatalogue> for Vec<Slot> {
    fn from(catalogue: SlotCatalogue) -> Self {
        catalogue.slots
    }
}

/// A field employee available for dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub position: Position,
}

impl Worker {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            position: Position::new(x, y),
        }
    }
}

/// A service call that needs exactly one worker within its slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub position: Position,
    pub slot: Slot,
}

impl Task {
    pub fn new(id: impl Into<String>, x: f64, y: f64, slot: impl Into<Slot>) -> Self {
        Self {
            id: id.into(),
            position: Position::new(x, y),
            slot: slot.into(),
        }
    }
}

/// A complete dispatch problem instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchProblem {
    pub name: String,
    pub workers: Vec<Worker>,
    pub tasks: Vec<Task>,
    pub slots: SlotCatalogue,
}

impl DispatchProblem {
    pub fn new(
        name: impl Into<String>,
        workers: Vec<Worker>,
        tasks: Vec<Task>,
        slots: SlotCatalogue,
    ) -> Self {
        Self {
            name: name.into(),
            workers,
            tasks,
            slots,
        }
    }

    /// Starts a [`DispatchProblemBuilder`].
    pub fn builder(name: impl Into<String>) -> DispatchProblemBuilder {
        DispatchProblemBuilder::new(name)
    }

    pub fn get_worker(&self, id: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id == id)
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks scheduled in `slot`, in input order.
    pub fn tasks_in_slot<'a>(&'a self, slot: &'a Slot) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| &t.slot == slot)
    }

    /// Returns a copy with every coordinate multiplied by `k`.
    pub fn scaled(&self, k: f64) -> Self {
        let mut scaled = self.clone();
        for worker in &mut scaled.workers {
            worker.position = worker.position.scaled(k);
        }
        for task in &mut scaled.tasks {
            task.position = task.position.scaled(k);
        }
        scaled
    }
}

/// Fluent builder used by demo data and tests.
///
/// # Examples
///
/// ```
/// use service_dispatch::domain::DispatchProblem;
///
/// let problem = DispatchProblem::builder("pair")
///     .slots(["9AM"])
///     .worker("W0", 0.0, 0.0)
///     .worker("W1", 10.0, 0.0)
///     .task("A", 1.0, 0.0, "9AM")
///     .task("B", 9.0, 0.0, "9AM")
///     .build()
///     .unwrap();
/// assert_eq!(problem.workers.len(), 2);
/// assert_eq!(problem.tasks_in_slot(&"9AM".into()).count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct DispatchProblemBuilder {
    name: String,
    slots: Vec<Slot>,
    workers: Vec<Worker>,
    tasks: Vec<Task>,
}

impl DispatchProblemBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn slots<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Slot>,
    {
        self.slots.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn worker(mut self, id: impl Into<String>, x: f64, y: f64) -> Self {
        self.workers.push(Worker::new(id, x, y));
        self
    }

    pub fn task(mut self, id: impl Into<String>, x: f64, y: f64, slot: impl Into<Slot>) -> Self {
        self.tasks.push(Task::new(id, x, y, slot));
        self
    }

    /// Finishes the problem. Only the slot catalogue is checked here; the
    /// solver validates the rest of the instance.
    pub fn build(self) -> Result<DispatchProblem, InvalidInstanceError> {
        let slots = SlotCatalogue::new(self.slots)?;
        Ok(DispatchProblem::new(self.name, self.workers, self.tasks, slots))
    }
}

/// One task → worker pairing in a schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: String,
    pub worker_id: String,
    pub slot: Slot,
    /// Cost of this edge under the model used to solve.
    pub cost: f64,
}

/// A solved dispatch: every task mapped to one worker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Ordered by slot (catalogue order), then task id.
    pub assignments: Vec<Assignment>,
    pub total_cost: f64,
}

impl Schedule {
    /// Orders the assignments and sums their costs.
    pub fn from_assignments(slots: &SlotCatalogue, mut assignments: Vec<Assignment>) -> Self {
        assignments.sort_by(|a, b| {
            slots
                .position(&a.slot)
                .cmp(&slots.position(&b.slot))
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        let total_cost = assignments.iter().map(|a| a.cost).sum();
        Self {
            assignments,
            total_cost,
        }
    }

    /// Worker serving `task_id`, if assigned.
    pub fn worker_for(&self, task_id: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.task_id == task_id)
            .map(|a| a.worker_id.as_str())
    }

    /// Assignments of `worker_id`, in schedule order.
    pub fn tasks_for<'a>(&'a self, worker_id: &'a str) -> impl Iterator<Item = &'a Assignment> + 'a {
        self.assignments.iter().filter(move |a| a.worker_id == worker_id)
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_slot_rejected() {
        let err = SlotCatalogue::new(["9 AM", "11 AM", "9 AM"]).unwrap_err();
        assert_eq!(
            err,
            InvalidInstanceError::DuplicateSlot {
                slot: Slot::new("9 AM")
            }
        );
    }

    #[test]
    fn test_hourly_wraps_past_midnight() {
        let start = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
        let slots = SlotCatalogue::hourly(start, 3, 2);
        let labels: Vec<&str> = slots.iter().map(Slot::as_str).collect();
        assert_eq!(labels, ["10 PM", "12 AM", "2 AM"]);
    }

    #[test]
    fn test_hourly_stops_before_repeating_a_label() {
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let slots = SlotCatalogue::hourly(start, 13, 2);
        assert_eq!(slots.len(), 12);
        assert_eq!(slots.iter().filter(|s| s.as_str() == "9 AM").count(), 1);
        assert_eq!(slots.iter().last().map(Slot::as_str), Some("7 AM"));

        assert_eq!(SlotCatalogue::hourly(start, 3, 0).len(), 1);
    }

    #[test]
    fn test_catalogue_json_rejects_duplicates() {
        let slots: SlotCatalogue = serde_json::from_str(r#"["9 AM","11 AM"]"#).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(serde_json::to_string(&slots).unwrap(), r#"["9 AM","11 AM"]"#);

        let err = serde_json::from_str::<SlotCatalogue>(r#"["9AM","9AM"]"#).unwrap_err();
        assert!(err.to_string().contains("duplicate slot 9AM"));

        let problem = r#"{"name":"d","workers":[],"tasks":[],"slots":["9AM","9AM"]}"#;
        assert!(serde_json::from_str::<DispatchProblem>(problem).is_err());
    }

    #[test]
    fn test_scaled_problem() {
        let problem = DispatchProblem::builder("s")
            .slots(["9 AM"])
            .worker("W", 1.0, 2.0)
            .task("T", -3.0, 0.5, "9 AM")
            .build()
            .unwrap();
        let scaled = problem.scaled(4.0);
        assert_eq!(scaled.workers[0].position, Position::new(4.0, 8.0));
        assert_eq!(scaled.tasks[0].position, Position::new(-12.0, 2.0));
        assert_eq!(scaled.slots, problem.slots);
    }

    #[test]
    fn test_schedule_ordering() {
        let slots = SlotCatalogue::new(["9 AM", "11 AM"]).unwrap();
        let schedule = Schedule::from_assignments(
            &slots,
            vec![
                Assignment {
                    task_id: "C".into(),
                    worker_id: "W1".into(),
                    slot: "11 AM".into(),
                    cost: 2.0,
                },
                Assignment {
                    task_id: "B".into(),
                    worker_id: "W1".into(),
                    slot: "9 AM".into(),
                    cost: 1.5,
                },
                Assignment {
                    task_id: "A".into(),
                    worker_id: "W0".into(),
                    slot: "9 AM".into(),
                    cost: 0.5,
                },
            ],
        );
        let order: Vec<&str> = schedule.assignments.iter().map(|a| a.task_id.as_str()).collect();
        assert_eq!(order, ["A", "B", "C"]);
        assert_eq!(schedule.total_cost, 4.0);
        assert_eq!(schedule.worker_for("C"), Some("W1"));
        assert_eq!(schedule.tasks_for("W1").count(), 2);
    }
}
