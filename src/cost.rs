//! Travel cost models and the dense worker × task cost matrix.

use crate::domain::{Task, Worker};
use crate::error::InvalidInstanceError;

/// Cost of sending a worker to a task.
///
/// Implementations must return a finite, non-negative value for every pair;
/// [`CostMatrix::build`] rejects anything else before solving starts.
///
/// Any `Fn(&Worker, &Task) -> f64` is a cost model:
///
/// ```
/// use service_dispatch::cost::CostModel;
/// use service_dispatch::domain::{Task, Worker};
///
/// let manhattan = |w: &Worker, t: &Task| {
///     (w.position.x - t.position.x).abs() + (w.position.y - t.position.y).abs()
/// };
/// let w = Worker::new("W", 0.0, 0.0);
/// let t = Task::new("T", 3.0, 4.0, "9 AM");
/// assert_eq!(manhattan.cost(&w, &t), 7.0);
/// ```
pub trait CostModel: Sync {
    fn cost(&self, worker: &Worker, task: &Task) -> f64;
}

impl<F> CostModel for F
where
    F: Fn(&Worker, &Task) -> f64 + Sync,
{
    fn cost(&self, worker: &Worker, task: &Task) -> f64 {
        self(worker, task)
    }
}

/// Straight-line distance between the worker's start and the task.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl CostModel for Euclidean {
    fn cost(&self, worker: &Worker, task: &Task) -> f64 {
        worker.position.distance(&task.position)
    }
}

/// Row-major matrix of edge costs, one row per worker.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    workers: usize,
    tasks: usize,
    data: Vec<f64>,
}

impl CostMatrix {
    /// Evaluates `model` over the full worker × task product.
    ///
    /// # Examples
    ///
    /// ```
    /// use service_dispatch::cost::{CostMatrix, Euclidean};
    /// use service_dispatch::domain::{Task, Worker};
    ///
    /// let workers = [Worker::new("W0", 0.0, 0.0), Worker::new("W1", 10.0, 0.0)];
    /// let tasks = [Task::new("A", 1.0, 0.0, "9AM")];
    /// let w: Vec<&Worker> = workers.iter().collect();
    /// let t: Vec<&Task> = tasks.iter().collect();
    ///
    /// let matrix = CostMatrix::build(&w, &t, &Euclidean).unwrap();
    /// assert_eq!(matrix.get(0, 0), 1.0);
    /// assert_eq!(matrix.get(1, 0), 9.0);
    /// ```
    pub fn build<M: CostModel + ?Sized>(
        workers: &[&Worker],
        tasks: &[&Task],
        model: &M,
    ) -> Result<Self, InvalidInstanceError> {
        let mut data = Vec::with_capacity(workers.len() * tasks.len());
        for worker in workers {
            for task in tasks {
                let cost = model.cost(worker, task);
                if !cost.is_finite() || cost < 0.0 {
                    return Err(InvalidInstanceError::InvalidCost {
                        worker: worker.id.clone(),
                        task: task.id.clone(),
                        cost,
                    });
                }
                data.push(cost);
            }
        }
        Ok(Self {
            workers: workers.len(),
            tasks: tasks.len(),
            data,
        })
    }

    #[inline]
    pub fn get(&self, worker: usize, task: usize) -> f64 {
        self.data[worker * self.tasks + task]
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn tasks(&self) -> usize {
        self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Vec<Worker>, Vec<Task>) {
        (
            vec![Worker::new("W0", 0.0, 0.0), Worker::new("W1", 1.0, 1.0)],
            vec![Task::new("T0", 0.0, 0.0, "9AM"), Task::new("T1", 2.0, 2.0, "9AM")],
        )
    }

    #[test]
    fn test_zero_distance_is_valid() {
        let (workers, tasks) = pair();
        let w: Vec<&Worker> = workers.iter().collect();
        let t: Vec<&Task> = tasks.iter().collect();
        let matrix = CostMatrix::build(&w, &t, &Euclidean).unwrap();
        assert_eq!(matrix.get(0, 0), 0.0);
        assert_eq!(matrix.workers(), 2);
        assert_eq!(matrix.tasks(), 2);
    }

    #[test]
    fn test_negative_cost_rejected() {
        let (workers, tasks) = pair();
        let w: Vec<&Worker> = workers.iter().collect();
        let t: Vec<&Task> = tasks.iter().collect();
        let model = |w: &Worker, _: &Task| if w.id == "W1" { -1.0 } else { 1.0 };
        let err = CostMatrix::build(&w, &t, &model).unwrap_err();
        assert_eq!(
            err,
            InvalidInstanceError::InvalidCost {
                worker: "W1".into(),
                task: "T0".into(),
                cost: -1.0,
            }
        );
    }

    #[test]
    fn test_non_finite_cost_rejected() {
        let (workers, tasks) = pair();
        let w: Vec<&Worker> = workers.iter().collect();
        let t: Vec<&Task> = tasks.iter().collect();

        let nan = |_: &Worker, _: &Task| f64::NAN;
        assert!(matches!(
            CostMatrix::build(&w, &t, &nan),
            Err(InvalidInstanceError::InvalidCost { .. })
        ));

        let inf = |_: &Worker, t: &Task| if t.id == "T1" { f64::INFINITY } else { 0.0 };
        assert!(matches!(
            CostMatrix::build(&w, &t, &inf),
            Err(InvalidInstanceError::InvalidCost { .. })
        ));
    }
}
