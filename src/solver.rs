//! Solver for the Service Dispatch problem.
//!
//! Two exact strategies are available:
//!
//! - [`Strategy::Decomposition`]: one Hungarian assignment per slot. Slots only
//!   share workers through per-(worker, slot) capacity, so the subproblems are
//!   independent and may run on the rayon pool.
//! - [`Strategy::GlobalFlow`]: a single min-cost flow network over all slots.
//!
//! Both return the same optimal total cost. The module also hosts
//! [`SolverService`], which runs solves as background jobs for the REST API.

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::console;
use crate::cost::{CostMatrix, CostModel, Euclidean};
use crate::domain::{Assignment, DispatchProblem, Schedule, Slot, Task, Worker};
use crate::error::{DispatchError, DispatchResult, InfeasibleError, InvalidInstanceError};
use crate::flow::{self, FlowError};
use crate::hungarian::{self, HungarianError};

/// Which exact algorithm to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Per-slot Hungarian assignment.
    #[default]
    Decomposition,
    /// Successive shortest paths over one network.
    GlobalFlow,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Decomposition => "DECOMPOSITION",
            Strategy::GlobalFlow => "GLOBAL_FLOW",
        }
    }
}

/// Solver configuration.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub strategy: Strategy,
    /// Solve slot subproblems on the rayon pool. Ignored by the flow strategy.
    pub parallel: bool,
    /// Checked between matching iterations.
    pub cancel: Option<CancellationToken>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Decomposition,
            parallel: true,
            cancel: None,
        }
    }
}

impl SolverConfig {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Checks the instance before any matching starts.
///
/// Cost validity is checked separately while the cost matrix is built.
pub fn validate(problem: &DispatchProblem) -> Result<(), InvalidInstanceError> {
    if problem.workers.is_empty() {
        return Err(InvalidInstanceError::NoWorkers);
    }
    if problem.tasks.is_empty() {
        return Err(InvalidInstanceError::NoTasks);
    }

    let mut slots = HashSet::new();
    for slot in problem.slots.iter() {
        if !slots.insert(slot) {
            return Err(InvalidInstanceError::DuplicateSlot { slot: slot.clone() });
        }
    }

    let mut worker_ids = HashSet::new();
    for worker in &problem.workers {
        if !worker_ids.insert(worker.id.as_str()) {
            return Err(InvalidInstanceError::DuplicateWorker {
                id: worker.id.clone(),
            });
        }
    }

    let mut task_ids = HashSet::new();
    for task in &problem.tasks {
        if !task_ids.insert(task.id.as_str()) {
            return Err(InvalidInstanceError::DuplicateTask { id: task.id.clone() });
        }
        if !problem.slots.contains(&task.slot) {
            return Err(InvalidInstanceError::UnknownSlot {
                task: task.id.clone(),
                slot: task.slot.clone(),
            });
        }
    }
    Ok(())
}

/// Solves with Euclidean travel distance.
///
/// # Examples
///
/// ```
/// use service_dispatch::domain::DispatchProblem;
/// use service_dispatch::solver::{solve, SolverConfig};
///
/// let problem = DispatchProblem::builder("pair")
///     .slots(["9AM"])
///     .worker("W0", 0.0, 0.0)
///     .worker("W1", 10.0, 0.0)
///     .task("A", 1.0, 0.0, "9AM")
///     .task("B", 9.0, 0.0, "9AM")
///     .build()
///     .unwrap();
///
/// let schedule = solve(&problem, &SolverConfig::default()).unwrap();
/// assert_eq!(schedule.total_cost, 2.0);
/// assert_eq!(schedule.worker_for("A"), Some("W0"));
/// assert_eq!(schedule.worker_for("B"), Some("W1"));
/// ```
pub fn solve(problem: &DispatchProblem, config: &SolverConfig) -> DispatchResult<Schedule> {
    solve_with(problem, &Euclidean, config)
}

/// Solves with a caller-supplied cost model.
pub fn solve_with<M: CostModel + ?Sized>(
    problem: &DispatchProblem,
    model: &M,
    config: &SolverConfig,
) -> DispatchResult<Schedule> {
    let started = Instant::now();
    validate(problem)?;
    let prepared = Prepared::new(problem, model)?;

    debug!(
        problem = %problem.name,
        workers = prepared.workers.len(),
        tasks = prepared.tasks.len(),
        strategy = config.strategy.as_str(),
        "Cost matrix built"
    );

    let result = match config.strategy {
        Strategy::Decomposition => prepared.by_slot(config),
        Strategy::GlobalFlow => prepared.by_flow(config),
    };

    match &result {
        Ok(schedule) => info!(
            problem = %problem.name,
            strategy = config.strategy.as_str(),
            total_cost = schedule.total_cost,
            duration_ms = started.elapsed().as_millis() as u64,
            "Dispatch solved"
        ),
        Err(err) => warn!(problem = %problem.name, error = %err, "Dispatch failed"),
    }
    result
}

/// Validated problem with id-sorted entities and the full cost matrix.
struct Prepared<'a> {
    problem: &'a DispatchProblem,
    workers: Vec<&'a Worker>,
    tasks: Vec<&'a Task>,
    matrix: CostMatrix,
}

impl<'a> Prepared<'a> {
    fn new<M: CostModel + ?Sized>(problem: &'a DispatchProblem, model: &M) -> DispatchResult<Self> {
        // Sorting by id makes tie-breaking reproducible regardless of input order.
        let mut workers: Vec<&Worker> = problem.workers.iter().collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        let mut tasks: Vec<&Task> = problem.tasks.iter().collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));

        let matrix = CostMatrix::build(&workers, &tasks, model)?;
        Ok(Self {
            problem,
            workers,
            tasks,
            matrix,
        })
    }

    fn assignment(&self, task: usize, worker: usize) -> Assignment {
        Assignment {
            task_id: self.tasks[task].id.clone(),
            worker_id: self.workers[worker].id.clone(),
            slot: self.tasks[task].slot.clone(),
            cost: self.matrix.get(worker, task),
        }
    }

    fn infeasible(&self, slot: &Slot) -> DispatchError {
        InfeasibleError {
            slot: slot.clone(),
            tasks: self.problem.tasks_in_slot(slot).count(),
            workers: self.workers.len(),
        }
        .into()
    }

    /// First slot, in catalogue order, with more tasks than workers.
    fn first_oversubscribed(&self) -> Option<&'a Slot> {
        self.problem
            .slots
            .iter()
            .find(|slot| self.problem.tasks_in_slot(slot).count() > self.workers.len())
    }

    fn by_slot(&self, config: &SolverConfig) -> DispatchResult<Schedule> {
        let groups: Vec<(&Slot, Vec<usize>)> = self
            .problem
            .slots
            .iter()
            .map(|slot| {
                let members = (0..self.tasks.len())
                    .filter(|&t| &self.tasks[t].slot == slot)
                    .collect::<Vec<_>>();
                (slot, members)
            })
            .filter(|(_, members)| !members.is_empty())
            .collect();

        let cancel = config.cancel.as_ref();
        let solve_group = |(slot, members): &(&Slot, Vec<usize>)| {
            self.solve_slot(slot, members, cancel)
        };

        let results: Vec<DispatchResult<Vec<Assignment>>> = if config.parallel {
            groups.par_iter().map(solve_group).collect()
        } else {
            groups.iter().map(solve_group).collect()
        };

        let mut assignments = Vec::with_capacity(self.tasks.len());
        for result in results {
            assignments.extend(result?);
        }
        Ok(Schedule::from_assignments(&self.problem.slots, assignments))
    }

    fn solve_slot(
        &self,
        slot: &Slot,
        members: &[usize],
        cancel: Option<&CancellationToken>,
    ) -> DispatchResult<Vec<Assignment>> {
        let rows = members.len();
        let cols = self.workers.len();
        let columns = hungarian::solve(rows, cols, |r, c| self.matrix.get(c, members[r]), cancel)
            .map_err(|err| match err {
                HungarianError::TooManyRows { .. } => self.infeasible(slot),
                HungarianError::Cancelled => DispatchError::Cancelled,
            })?;

        let assignments: Vec<Assignment> = members
            .iter()
            .zip(columns)
            .map(|(&task, worker)| self.assignment(task, worker))
            .collect();
        debug!(
            slot = %slot,
            tasks = rows,
            cost = assignments.iter().map(|a| a.cost).sum::<f64>(),
            "Slot solved"
        );
        Ok(assignments)
    }

    fn by_flow(&self, config: &SolverConfig) -> DispatchResult<Schedule> {
        let workers = flow::solve(&self.tasks, &self.problem.slots, &self.matrix, config.cancel.as_ref())
            .map_err(|err| match err {
                // Report the same slot the decomposition would.
                FlowError::Unrouted { task } => {
                    self.infeasible(self.first_oversubscribed().unwrap_or(&self.tasks[task].slot))
                }
                FlowError::UnknownSlot { task } => InvalidInstanceError::UnknownSlot {
                    task: self.tasks[task].id.clone(),
                    slot: self.tasks[task].slot.clone(),
                }
                .into(),
                FlowError::Cancelled => DispatchError::Cancelled,
            })?;

        let assignments = workers
            .into_iter()
            .enumerate()
            .map(|(task, worker)| self.assignment(task, worker))
            .collect();
        Ok(Schedule::from_assignments(&self.problem.slots, assignments))
    }
}

// ============================================================================
// Verification & Analysis
// ============================================================================

/// A hard-constraint violation found in a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Unassigned { task: String },
    AssignedTwice { task: String },
    UnknownTask { task: String },
    UnknownWorker { worker: String },
    SlotConflict { worker: String, slot: Slot, tasks: Vec<String> },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Unassigned { task } => write!(f, "{} has no employee", task),
            Violation::AssignedTwice { task } => write!(f, "{} is assigned more than once", task),
            Violation::UnknownTask { task } => write!(f, "{} is not part of the problem", task),
            Violation::UnknownWorker { worker } => write!(f, "{} is not part of the problem", worker),
            Violation::SlotConflict { worker, slot, tasks } => {
                write!(f, "{} serves {} calls at {}: {}", worker, tasks.len(), slot, tasks.join(", "))
            }
        }
    }
}

/// Lists every hard-constraint violation in `schedule`.
///
/// The problem's task slots are authoritative; `Assignment::slot` is ignored.
pub fn verify(problem: &DispatchProblem, schedule: &Schedule) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut per_task: HashMap<&str, usize> = HashMap::new();
    let mut per_pair: BTreeMap<(&str, usize), Vec<String>> = BTreeMap::new();

    for assignment in &schedule.assignments {
        let Some(task) = problem.get_task(&assignment.task_id) else {
            violations.push(Violation::UnknownTask {
                task: assignment.task_id.clone(),
            });
            continue;
        };
        if problem.get_worker(&assignment.worker_id).is_none() {
            violations.push(Violation::UnknownWorker {
                worker: assignment.worker_id.clone(),
            });
            continue;
        }
        *per_task.entry(task.id.as_str()).or_default() += 1;
        let slot_idx = problem.slots.position(&task.slot).unwrap_or(usize::MAX);
        per_pair
            .entry((assignment.worker_id.as_str(), slot_idx))
            .or_default()
            .push(task.id.clone());
    }

    for task in &problem.tasks {
        match per_task.get(task.id.as_str()).copied().unwrap_or(0) {
            0 => violations.push(Violation::Unassigned { task: task.id.clone() }),
            1 => {}
            _ => violations.push(Violation::AssignedTwice { task: task.id.clone() }),
        }
    }

    for ((worker, _), mut tasks) in per_pair {
        tasks.sort();
        tasks.dedup();
        if tasks.len() > 1 {
            let slot = problem
                .get_task(&tasks[0])
                .map(|t| t.slot.clone())
                .unwrap_or_else(|| Slot::new("?"));
            violations.push(Violation::SlotConflict {
                worker: worker.to_string(),
                slot,
                tasks,
            });
        }
    }

    violations
}

/// Travel summary for one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerLoad {
    pub worker_id: String,
    pub tasks: Vec<String>,
    pub distance: f64,
}

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub total_cost: f64,
    pub violations: Vec<Violation>,
    /// One entry per worker, in problem order.
    pub workers: Vec<WorkerLoad>,
}

impl Analysis {
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Recomputes edge costs under `model` and reports violations and per-worker
/// load. Assignments referring to unknown tasks or workers contribute no cost.
pub fn analyze<M: CostModel + ?Sized>(
    problem: &DispatchProblem,
    schedule: &Schedule,
    model: &M,
) -> Analysis {
    let mut loads: Vec<WorkerLoad> = problem
        .workers
        .iter()
        .map(|w| WorkerLoad {
            worker_id: w.id.clone(),
            tasks: Vec::new(),
            distance: 0.0,
        })
        .collect();

    let mut total_cost = 0.0;
    for assignment in &schedule.assignments {
        let worker = problem.workers.iter().position(|w| w.id == assignment.worker_id);
        let task = problem.get_task(&assignment.task_id);
        if let (Some(w), Some(task)) = (worker, task) {
            let cost = model.cost(&problem.workers[w], task);
            total_cost += cost;
            loads[w].tasks.push(task.id.clone());
            loads[w].distance += cost;
        }
    }

    Analysis {
        total_cost,
        violations: verify(problem, schedule),
        workers: loads,
    }
}

// ============================================================================
// Job Service
// ============================================================================

/// Status of a solving job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    /// Not currently solving.
    NotSolving,
    /// Actively solving.
    Solving,
}

impl SolverStatus {
    /// Returns the status as a SCREAMING_SNAKE_CASE string for API responses.
    ///
    /// ```
    /// use service_dispatch::solver::SolverStatus;
    ///
    /// assert_eq!(SolverStatus::NotSolving.as_str(), "NOT_SOLVING");
    /// assert_eq!(SolverStatus::Solving.as_str(), "SOLVING");
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            SolverStatus::NotSolving => "NOT_SOLVING",
            SolverStatus::Solving => "SOLVING",
        }
    }
}

/// A solving job with current state.
pub struct SolveJob {
    /// Unique job identifier.
    pub id: String,
    /// Current status.
    pub status: SolverStatus,
    /// Problem being solved.
    pub problem: DispatchProblem,
    /// Optimal schedule once solved.
    pub schedule: Option<Schedule>,
    /// Failure message when solving ended without a schedule.
    pub error: Option<String>,
    /// Solver configuration.
    pub config: SolverConfig,
}

impl SolveJob {
    /// Creates a new solve job with default config.
    pub fn new(id: String, problem: DispatchProblem) -> Self {
        Self::with_config(id, problem, SolverConfig::default())
    }

    /// Creates a new solve job with custom config.
    pub fn with_config(id: String, problem: DispatchProblem, config: SolverConfig) -> Self {
        Self {
            id,
            status: SolverStatus::NotSolving,
            problem,
            schedule: None,
            error: None,
            config,
        }
    }
}

/// Manages dispatch solving jobs.
///
/// # Examples
///
/// ```
/// use service_dispatch::solver::{SolverService, SolverStatus};
/// use service_dispatch::demo_data::generate_downtown;
///
/// let service = SolverService::new();
/// let job = service.create_job("test-1".to_string(), generate_downtown());
/// assert_eq!(job.read().status, SolverStatus::NotSolving);
/// assert_eq!(service.list_jobs(), vec!["test-1".to_string()]);
/// ```
pub struct SolverService {
    jobs: RwLock<HashMap<String, Arc<RwLock<SolveJob>>>>,
}

impl SolverService {
    /// Creates a new solver service.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a new job for the given problem with default config.
    pub fn create_job(&self, id: String, problem: DispatchProblem) -> Arc<RwLock<SolveJob>> {
        self.create_job_with_config(id, problem, SolverConfig::default())
    }

    /// Creates a new job with custom config.
    pub fn create_job_with_config(
        &self,
        id: String,
        problem: DispatchProblem,
        config: SolverConfig,
    ) -> Arc<RwLock<SolveJob>> {
        let job = Arc::new(RwLock::new(SolveJob::with_config(id.clone(), problem, config)));
        self.jobs.write().insert(id, job.clone());
        job
    }

    /// Gets a job by ID.
    pub fn get_job(&self, id: &str) -> Option<Arc<RwLock<SolveJob>>> {
        self.jobs.read().get(id).cloned()
    }

    /// Lists all job IDs.
    pub fn list_jobs(&self) -> Vec<String> {
        self.jobs.read().keys().cloned().collect()
    }

    /// Removes a job by ID.
    pub fn remove_job(&self, id: &str) -> Option<Arc<RwLock<SolveJob>>> {
        self.jobs.write().remove(id)
    }

    /// Starts solving a job on the blocking pool.
    pub fn start_solving(&self, job: Arc<RwLock<SolveJob>>) {
        let config = {
            let mut guard = job.write();
            let token = CancellationToken::new();
            guard.config.cancel = Some(token);
            guard.status = SolverStatus::Solving;
            guard.schedule = None;
            guard.error = None;
            guard.config.clone()
        };

        tokio::task::spawn_blocking(move || solve_blocking(job, config));
    }

    /// Cancels a solving job. Returns false if it was not solving.
    pub fn stop_solving(&self, id: &str) -> bool {
        if let Some(job) = self.get_job(id) {
            let mut guard = job.write();
            if guard.status == SolverStatus::Solving {
                if let Some(token) = guard.config.cancel.take() {
                    token.cancel();
                }
                guard.status = SolverStatus::NotSolving;
                return true;
            }
        }
        false
    }
}

impl Default for SolverService {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the solver in a blocking context and stores the outcome on the job.
fn solve_blocking(job: Arc<RwLock<SolveJob>>, config: SolverConfig) {
    let (job_id, problem) = {
        let guard = job.read();
        (guard.id.clone(), guard.problem.clone())
    };
    let started = Instant::now();

    console::print_config(problem.workers.len(), problem.tasks.len(), problem.slots.len());
    info!(
        job_id = %job_id,
        workers = problem.workers.len(),
        tasks = problem.tasks.len(),
        strategy = config.strategy.as_str(),
        "Starting dispatch solver"
    );

    let result = solve(&problem, &config);

    match &result {
        Ok(schedule) => console::print_solving_ended(
            started.elapsed(),
            schedule.assignments.len(),
            schedule.total_cost,
            true,
        ),
        Err(err) => {
            warn!(job_id = %job_id, error = %err, "Dispatch job failed");
            console::print_solving_ended(started.elapsed(), 0, 0.0, false);
        }
    }

    let mut guard = job.write();
    match result {
        Ok(schedule) => guard.schedule = Some(schedule),
        Err(err) => guard.error = Some(err.to_string()),
    }
    guard.config.cancel = None;
    guard.status = SolverStatus::NotSolving;
}
