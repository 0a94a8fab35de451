//! Global min-cost flow formulation of the dispatch problem.
//!
//! Network layout:
//!
//! ```text
//! source ─(cap S)─▶ worker ─(cap 1)─▶ worker×slot ─(cap 1, cost d)─▶ task ─(cap 1)─▶ sink
//! ```
//!
//! `S` is the number of occupied slots, so the source edge never binds; the
//! worker×slot edge carries the one-task-per-slot capacity. Flow is pushed by
//! successive shortest augmenting paths found with SPFA on the residual graph.

use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::cost::CostMatrix;
use crate::domain::{SlotCatalogue, Task};

/// Relaxations smaller than this are ignored to keep SPFA from cycling on
/// rounding noise.
const EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Edge {
    to: usize,
    rev: usize,
    cap: i64,
    flow: i64,
    cost: f64,
}

impl Edge {
    fn residual(&self) -> i64 {
        self.cap - self.flow
    }
}

/// Handle to a forward edge: `(from node, index in adjacency list)`.
pub type EdgeRef = (usize, usize);

/// Residual network with real-valued edge costs.
#[derive(Debug, Clone, Default)]
pub struct FlowNetwork {
    graph: Vec<Vec<Edge>>,
}

impl FlowNetwork {
    pub fn new(nodes: usize) -> Self {
        Self {
            graph: vec![Vec::new(); nodes],
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    /// Adds `from → to` plus its zero-capacity reverse edge.
    pub fn add_edge(&mut self, from: usize, to: usize, cap: i64, cost: f64) -> EdgeRef {
        let fwd = self.graph[from].len();
        let bwd = self.graph[to].len() + usize::from(from == to);
        self.graph[from].push(Edge {
            to,
            rev: bwd,
            cap,
            flow: 0,
            cost,
        });
        self.graph[to].push(Edge {
            to: from,
            rev: fwd,
            cap: 0,
            flow: 0,
            cost: -cost,
        });
        (from, fwd)
    }

    /// Flow currently carried by a forward edge.
    pub fn flow(&self, (from, idx): EdgeRef) -> i64 {
        self.graph[from][idx].flow
    }

    /// Pushes flow along one cheapest `source → sink` path.
    ///
    /// Returns the pushed amount and the path cost, or `None` once the sink is
    /// unreachable.
    pub fn augment(&mut self, source: usize, sink: usize) -> Option<(i64, f64)> {
        let n = self.graph.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<EdgeRef>> = vec![None; n];
        let mut queued = vec![false; n];
        let mut queue = VecDeque::new();

        dist[source] = 0.0;
        queue.push_back(source);
        queued[source] = true;

        while let Some(u) = queue.pop_front() {
            queued[u] = false;
            for (i, edge) in self.graph[u].iter().enumerate() {
                if edge.residual() <= 0 {
                    continue;
                }
                let candidate = dist[u] + edge.cost;
                if candidate + EPS < dist[edge.to] {
                    dist[edge.to] = candidate;
                    prev[edge.to] = Some((u, i));
                    if !queued[edge.to] {
                        queued[edge.to] = true;
                        queue.push_back(edge.to);
                    }
                }
            }
        }

        if !dist[sink].is_finite() {
            return None;
        }

        let mut pushed = i64::MAX;
        let mut node = sink;
        while let Some((u, i)) = prev[node] {
            pushed = pushed.min(self.graph[u][i].residual());
            node = u;
        }

        let mut node = sink;
        while let Some((u, i)) = prev[node] {
            let rev = self.graph[u][i].rev;
            self.graph[u][i].flow += pushed;
            self.graph[node][rev].flow -= pushed;
            node = u;
        }

        Some((pushed, dist[sink]))
    }
}

/// Why the flow formulation did not route every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("task #{task} could not be routed to any worker")]
    Unrouted { task: usize },

    #[error("task #{task} has a slot outside the catalogue")]
    UnknownSlot { task: usize },

    #[error("flow cancelled")]
    Cancelled,
}

/// Solves the whole problem as one network.
///
/// `matrix` rows follow the worker order the caller used to build it and its
/// columns follow `tasks`. Returns `assignment[task] = worker`.
pub fn solve(
    tasks: &[&Task],
    slots: &SlotCatalogue,
    matrix: &CostMatrix,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<usize>, FlowError> {
    let n_workers = matrix.workers();
    let n_tasks = tasks.len();

    // Compact index for every catalogue slot that has at least one task.
    let mut occupied: Vec<Option<usize>> = vec![None; slots.len()];
    let mut n_slots = 0usize;
    let mut task_slot = Vec::with_capacity(n_tasks);
    for (t, task) in tasks.iter().enumerate() {
        let pos = slots
            .position(&task.slot)
            .ok_or(FlowError::UnknownSlot { task: t })?;
        let compact = *occupied[pos].get_or_insert_with(|| {
            n_slots += 1;
            n_slots - 1
        });
        task_slot.push(compact);
    }

    let source = 0;
    let worker_base = 1;
    let pair_base = worker_base + n_workers;
    let task_base = pair_base + n_workers * n_slots;
    let sink = task_base + n_tasks;
    let mut net = FlowNetwork::new(sink + 1);

    for w in 0..n_workers {
        net.add_edge(source, worker_base + w, n_slots as i64, 0.0);
        for s in 0..n_slots {
            net.add_edge(worker_base + w, pair_base + w * n_slots + s, 1, 0.0);
        }
    }

    let mut task_edges: Vec<Vec<EdgeRef>> = vec![Vec::with_capacity(n_workers); n_tasks];
    for w in 0..n_workers {
        for (t, &s) in task_slot.iter().enumerate() {
            let edge = net.add_edge(pair_base + w * n_slots + s, task_base + t, 1, matrix.get(w, t));
            task_edges[t].push(edge);
        }
    }

    let sink_edges: Vec<EdgeRef> = (0..n_tasks)
        .map(|t| net.add_edge(task_base + t, sink, 1, 0.0))
        .collect();

    let mut routed = 0usize;
    while routed < n_tasks {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(FlowError::Cancelled);
        }
        match net.augment(source, sink) {
            Some((pushed, path_cost)) => {
                trace!(routed, path_cost, "augmented");
                routed += pushed as usize;
            }
            None => {
                let task = sink_edges
                    .iter()
                    .position(|&e| net.flow(e) == 0)
                    .unwrap_or_default();
                return Err(FlowError::Unrouted { task });
            }
        }
    }

    // Every sink edge is saturated here; a task without a carrying edge
    // means the network was built inconsistently.
    task_edges
        .iter()
        .enumerate()
        .map(|(task, edges)| {
            edges
                .iter()
                .position(|&e| net.flow(e) > 0)
                .ok_or(FlowError::Unrouted { task })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Euclidean;
    use crate::domain::Worker;

    #[test]
    fn test_network_single_path() {
        let mut net = FlowNetwork::new(3);
        let a = net.add_edge(0, 1, 2, 1.5);
        let b = net.add_edge(1, 2, 1, 2.0);
        assert_eq!(net.augment(0, 2), Some((1, 3.5)));
        assert_eq!(net.flow(a), 1);
        assert_eq!(net.flow(b), 1);
        assert_eq!(net.augment(0, 2), None);
        assert_eq!(net.node_count(), 3);
    }

    #[test]
    fn test_reroutes_through_residual_edge() {
        // Two sources of supply, two demands; the greedy first path must be
        // undone through the residual graph to reach the optimum.
        let workers = [Worker::new("W0", 0.0, 0.0), Worker::new("W1", 4.0, 0.0)];
        let tasks = [Task::new("A", 1.0, 0.0, "9AM"), Task::new("B", -1.0, 0.0, "9AM")];
        let w: Vec<&Worker> = workers.iter().collect();
        let t: Vec<&Task> = tasks.iter().collect();
        let slots = SlotCatalogue::new(["9AM"]).unwrap();
        let matrix = CostMatrix::build(&w, &t, &Euclidean).unwrap();

        let assignment = solve(&t, &slots, &matrix, None).unwrap();
        assert_eq!(assignment, vec![1, 0]);
    }

    #[test]
    fn test_worker_serves_each_slot_once() {
        let workers = [Worker::new("W0", 0.0, 0.0), Worker::new("W1", 100.0, 0.0)];
        let tasks = [
            Task::new("A", 0.0, 0.0, "9AM"),
            Task::new("B", 0.0, 1.0, "9AM"),
            Task::new("C", 0.0, 2.0, "11AM"),
        ];
        let w: Vec<&Worker> = workers.iter().collect();
        let t: Vec<&Task> = tasks.iter().collect();
        let slots = SlotCatalogue::new(["9AM", "11AM"]).unwrap();
        let matrix = CostMatrix::build(&w, &t, &Euclidean).unwrap();

        let assignment = solve(&t, &slots, &matrix, None).unwrap();
        assert_ne!(assignment[0], assignment[1]);
        assert_eq!(assignment[2], 0);
    }

    #[test]
    fn test_unrouted_when_slot_oversubscribed() {
        let workers = [Worker::new("W0", 0.0, 0.0)];
        let tasks = [Task::new("A", 0.0, 0.0, "9AM"), Task::new("B", 1.0, 0.0, "9AM")];
        let w: Vec<&Worker> = workers.iter().collect();
        let t: Vec<&Task> = tasks.iter().collect();
        let slots = SlotCatalogue::new(["9AM"]).unwrap();
        let matrix = CostMatrix::build(&w, &t, &Euclidean).unwrap();

        let err = solve(&t, &slots, &matrix, None).unwrap_err();
        assert_eq!(err, FlowError::Unrouted { task: 1 });
    }

    #[test]
    fn test_task_outside_catalogue() {
        let workers = [Worker::new("W0", 0.0, 0.0), Worker::new("W1", 1.0, 0.0)];
        let tasks = [Task::new("A", 0.0, 0.0, "9AM"), Task::new("B", 1.0, 0.0, "noon")];
        let w: Vec<&Worker> = workers.iter().collect();
        let t: Vec<&Task> = tasks.iter().collect();
        let slots = SlotCatalogue::new(["9AM"]).unwrap();
        let matrix = CostMatrix::build(&w, &t, &Euclidean).unwrap();

        assert_eq!(solve(&t, &slots, &matrix, None), Err(FlowError::UnknownSlot { task: 1 }));
    }

    #[test]
    fn test_cancelled() {
        let workers = [Worker::new("W0", 0.0, 0.0)];
        let tasks = [Task::new("A", 0.0, 0.0, "9AM")];
        let w: Vec<&Worker> = workers.iter().collect();
        let t: Vec<&Task> = tasks.iter().collect();
        let slots = SlotCatalogue::new(["9AM"]).unwrap();
        let matrix = CostMatrix::build(&w, &t, &Euclidean).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(solve(&t, &slots, &matrix, Some(&token)), Err(FlowError::Cancelled));
    }
}
