// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task state machine
//!
//! A task is an externally-executed unit of work owned by one
//! execution. Its id is derived deterministically (see `id`), so a
//! replayed schedule call names the same task instead of creating a
//! duplicate. Terminal states are final; a cancel racing a natural
//! completion keeps whichever outcome committed first.

use crate::error::TaskFailure;
use crate::execution::ExecutionId;
use serde::{Deserialize, Serialize};

/// Deterministically derived task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// Deterministically derived promise identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromiseId(pub String);

impl std::fmt::Display for PromiseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministically derived timer identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub String);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Events that can change task state
#[derive(Debug, Clone)]
pub enum TaskTransition {
    /// A worker picked the task up
    Start,
    /// Work completed successfully
    Complete { output: serde_json::Value },
    /// Work failed
    Fail { error: TaskFailure },
    /// Cancellation requested (no-op once terminal)
    Cancel,
}

/// A task row as materialized by the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub execution_id: ExecutionId,
    pub kind: String,
    pub input: serde_json::Value,
    pub status: TaskStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<TaskFailure>,
    pub idempotency_key: Option<String>,
}

impl TaskRecord {
    /// Create a new task row in the Pending state
    pub fn new(
        id: TaskId,
        execution_id: ExecutionId,
        kind: impl Into<String>,
        input: serde_json::Value,
        idempotency_key: Option<String>,
    ) -> Self {
        TaskRecord {
            id,
            execution_id,
            kind: kind.into(),
            input,
            status: TaskStatus::Pending,
            output: None,
            error: None,
            idempotency_key,
        }
    }

    /// Pure transition function. Invalid transitions leave the row
    /// unchanged: in particular `Cancel` against a terminal row is a
    /// success no-op, which is what makes select_ok's cancel race safe.
    pub fn transition(&self, event: TaskTransition) -> TaskRecord {
        match (&self.status, event) {
            (TaskStatus::Pending, TaskTransition::Start) => TaskRecord {
                status: TaskStatus::Running,
                ..self.clone()
            },
            (TaskStatus::Pending | TaskStatus::Running, TaskTransition::Complete { output }) => {
                TaskRecord {
                    status: TaskStatus::Completed,
                    output: Some(output),
                    ..self.clone()
                }
            }
            (TaskStatus::Pending | TaskStatus::Running, TaskTransition::Fail { error }) => {
                TaskRecord {
                    status: TaskStatus::Failed,
                    error: Some(error),
                    ..self.clone()
                }
            }
            (TaskStatus::Pending | TaskStatus::Running, TaskTransition::Cancel) => TaskRecord {
                status: TaskStatus::Cancelled,
                ..self.clone()
            },
            // Terminal states are final
            _ => self.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
