//! Error types for dispatch solving.

use crate::domain::Slot;

/// Result type for solver operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Top-level solver error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// Malformed input, detected before any matching starts.
    #[error("invalid instance: {0}")]
    InvalidInstance(#[from] InvalidInstanceError),

    /// Well-formed input that admits no feasible assignment.
    #[error("infeasible: {0}")]
    Infeasible(#[from] InfeasibleError),

    /// The solve was cancelled through its cancellation token.
    #[error("solving was cancelled")]
    Cancelled,
}

impl DispatchError {
    pub fn is_infeasible(&self) -> bool {
        matches!(self, DispatchError::Infeasible(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, DispatchError::InvalidInstance(_))
    }
}

/// Ways a problem instance can be malformed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidInstanceError {
    #[error("no workers supplied")]
    NoWorkers,

    #[error("no tasks supplied")]
    NoTasks,

    #[error("duplicate worker id {id}")]
    DuplicateWorker { id: String },

    #[error("duplicate task id {id}")]
    DuplicateTask { id: String },

    #[error("duplicate slot {slot} in catalogue")]
    DuplicateSlot { slot: Slot },

    #[error("task {task} references unknown slot {slot}")]
    UnknownSlot { task: String, slot: Slot },

    #[error("cost {cost} for worker {worker} and task {task} is not a finite non-negative number")]
    InvalidCost { worker: String, task: String, cost: f64 },
}

/// A slot whose tasks outnumber the workers able to serve them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("slot {slot} has {tasks} tasks but only {workers} eligible workers")]
pub struct InfeasibleError {
    pub slot: Slot,
    pub tasks: usize,
    pub workers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infeasible_message_names_slot() {
        let err = DispatchError::from(InfeasibleError {
            slot: Slot::new("9AM"),
            tasks: 3,
            workers: 2,
        });
        assert!(err.is_infeasible());
        assert_eq!(
            err.to_string(),
            "infeasible: slot 9AM has 3 tasks but only 2 eligible workers"
        );
    }

    #[test]
    fn test_invalid_message() {
        let err = DispatchError::from(InvalidInstanceError::UnknownSlot {
            task: "Call1".into(),
            slot: Slot::new("7 PM"),
        });
        assert!(err.is_invalid());
        assert_eq!(
            err.to_string(),
            "invalid instance: task Call1 references unknown slot 7 PM"
        );
    }
}
