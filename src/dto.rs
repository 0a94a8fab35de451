//! DTOs for REST API requests/responses.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Assignment, DispatchProblem, Schedule, Slot, SlotCatalogue, Task, Worker};
use crate::error::InvalidInstanceError;
use crate::solver::{Analysis, SolverConfig, SolverStatus, Strategy};

/// Employee with a starting location.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerDto {
    /// Unique employee identifier.
    pub id: String,
    /// Starting location as `[x, y]`.
    pub location: [f64; 2],
}

impl From<&Worker> for WorkerDto {
    fn from(w: &Worker) -> Self {
        Self {
            id: w.id.clone(),
            location: [w.position.x, w.position.y],
        }
    }
}

/// Service call with its slot and, once solved, its employee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    /// Unique service call identifier.
    pub id: String,
    /// Location as `[x, y]`.
    pub location: [f64; 2],
    /// Slot label, e.g. `"9 AM"`.
    pub slot: String,
    /// Assigned employee ID (absent if unassigned).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    /// Travel distance of the assigned employee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// Solver options accepted with a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolverConfigDto {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl From<SolverConfigDto> for SolverConfig {
    fn from(dto: SolverConfigDto) -> Self {
        SolverConfig {
            strategy: dto.strategy,
            parallel: dto.parallel,
            cancel: None,
        }
    }
}

/// Full dispatch plan for request/response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPlanDto {
    /// Problem name.
    pub name: String,
    /// Slot catalogue in display order.
    pub slots: Vec<String>,
    pub workers: Vec<WorkerDto>,
    /// All service calls; assignment is indicated by `worker`.
    pub tasks: Vec<TaskDto>,
    /// Total travel distance of the schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    /// Solver status ("NOT_SOLVING", "SOLVING").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_status: Option<String>,
    /// Why solving failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_config: Option<SolverConfigDto>,
}

impl DispatchPlanDto {
    /// Builds a plan DTO; tasks carry their employee when `schedule` is given.
    pub fn from_problem(
        problem: &DispatchProblem,
        schedule: Option<&Schedule>,
        status: Option<SolverStatus>,
    ) -> Self {
        let tasks = problem
            .tasks
            .iter()
            .map(|t| {
                let assignment = schedule.and_then(|s| s.assignments.iter().find(|a| a.task_id == t.id));
                TaskDto {
                    id: t.id.clone(),
                    location: [t.position.x, t.position.y],
                    slot: t.slot.to_string(),
                    worker: assignment.map(|a| a.worker_id.clone()),
                    distance: assignment.map(|a| a.cost),
                }
            })
            .collect();

        Self {
            name: problem.name.clone(),
            slots: problem.slots.iter().map(Slot::to_string).collect(),
            workers: problem.workers.iter().map(WorkerDto::from).collect(),
            tasks,
            total_cost: schedule.map(|s| s.total_cost),
            solver_status: status.map(|s| s.as_str().to_string()),
            error: None,
            solver_config: None,
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    /// Converts to the domain problem. Assignments are not part of the problem.
    pub fn to_domain(&self) -> Result<DispatchProblem, InvalidInstanceError> {
        let slots = SlotCatalogue::new(self.slots.iter().map(|s| Slot::new(s.as_str())))?;
        let workers = self
            .workers
            .iter()
            .map(|w| Worker::new(w.id.as_str(), w.location[0], w.location[1]))
            .collect();
        let tasks = self
            .tasks
            .iter()
            .map(|t| Task::new(t.id.as_str(), t.location[0], t.location[1], t.slot.as_str()))
            .collect();
        Ok(DispatchProblem::new(self.name.as_str(), workers, tasks, slots))
    }

    /// Assignments carried by the tasks' `worker` fields.
    ///
    /// Edge costs are left at zero; [`analyze`](crate::solver::analyze)
    /// recomputes them.
    pub fn to_schedule(&self, problem: &DispatchProblem) -> Schedule {
        let assignments = self
            .tasks
            .iter()
            .filter_map(|t| {
                t.worker.as_ref().map(|w| Assignment {
                    task_id: t.id.clone(),
                    worker_id: w.clone(),
                    slot: Slot::new(t.slot.as_str()),
                    cost: 0.0,
                })
            })
            .collect();
        Schedule::from_assignments(&problem.slots, assignments)
    }

    /// Solver options, defaulting when none were sent.
    pub fn solver_config(&self) -> SolverConfig {
        self.solver_config.map(SolverConfig::from).unwrap_or_default()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Status indicator ("UP" when healthy).
    pub status: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub solver_engine: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub total_cost: Option<f64>,
    pub solver_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error body for rejected requests.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// "INVALID_INSTANCE", "INFEASIBLE" or "CANCELLED".
    pub kind: String,
    /// Human-readable explanation.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerLoadDto {
    pub worker_id: String,
    pub tasks: Vec<String>,
    pub distance: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub total_cost: f64,
    pub feasible: bool,
    pub violations: Vec<String>,
    pub workers: Vec<WorkerLoadDto>,
}

impl From<Analysis> for AnalyzeResponse {
    fn from(analysis: Analysis) -> Self {
        Self {
            total_cost: analysis.total_cost,
            feasible: analysis.is_feasible(),
            violations: analysis.violations.iter().map(ToString::to_string).collect(),
            workers: analysis
                .workers
                .into_iter()
                .map(|w| WorkerLoadDto {
                    worker_id: w.worker_id,
                    tasks: w.tasks,
                    distance: w.distance,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::generate_downtown;
    use crate::solver::{solve, SolverConfig};

    #[test]
    fn test_plan_json_shape() {
        let problem = generate_downtown();
        let schedule = solve(&problem, &SolverConfig::default()).unwrap();
        let dto = DispatchPlanDto::from_problem(&problem, Some(&schedule), Some(SolverStatus::NotSolving));
        let json = serde_json::to_value(&dto).unwrap();

        assert_eq!(json["name"], "Downtown");
        assert_eq!(json["slots"][0], "9 AM");
        assert_eq!(json["workers"][1]["location"], serde_json::json!([0.0, 5.0]));
        assert_eq!(json["tasks"][0]["worker"], "Employee2");
        assert_eq!(json["solverStatus"], "NOT_SOLVING");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_to_domain_and_schedule() {
        let problem = generate_downtown();
        let schedule = solve(&problem, &SolverConfig::default()).unwrap();
        let dto = DispatchPlanDto::from_problem(&problem, Some(&schedule), None);

        let back = dto.to_domain().unwrap();
        assert_eq!(back, problem);
        let carried = dto.to_schedule(&back);
        assert_eq!(carried.assignments.len(), schedule.assignments.len());
        for (a, b) in carried.assignments.iter().zip(&schedule.assignments) {
            assert_eq!(a.task_id, b.task_id);
            assert_eq!(a.worker_id, b.worker_id);
        }
    }

    #[test]
    fn test_solver_config_defaults() {
        let json = r#"{"name":"x","slots":[],"workers":[],"tasks":[],"solverConfig":{"strategy":"GLOBAL_FLOW"}}"#;
        let dto: DispatchPlanDto = serde_json::from_str(json).unwrap();
        let config = dto.solver_config();
        assert_eq!(config.strategy, Strategy::GlobalFlow);
        assert!(config.parallel);
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let json = r#"{"name":"x","slots":["9 AM","9 AM"],"workers":[],"tasks":[]}"#;
        let dto: DispatchPlanDto = serde_json::from_str(json).unwrap();
        assert!(dto.to_domain().is_err());
    }
}
