// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands: not-yet-durable effects
//!
//! A command is an effect execution code has requested but that has not
//! committed yet. Commands accumulate in a batch between two suspension
//! points and become events in one atomic append. Buffering is pure;
//! nothing here performs I/O.

use crate::event::EventKind;
use crate::execution::{ExecutionId, ExecutionKind};
use crate::task::{PromiseId, TaskId, TimerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An effect buffered between suspension points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Schedule a task for the worker pool
    ScheduleTask {
        task_id: TaskId,
        kind: String,
        input: serde_json::Value,
        idempotency_key: Option<String>,
    },
    /// Start a durable timer
    StartTimer {
        timer_id: TimerId,
        fire_at: DateTime<Utc>,
    },
    /// Create a promise resolvable from outside the execution
    CreatePromise { promise_id: PromiseId },
    /// Start a child execution
    StartChild {
        child_id: ExecutionId,
        kind: ExecutionKind,
        input: serde_json::Value,
    },
    /// Request best-effort cancellation of an in-flight task
    CancelTask { task_id: TaskId },
    /// Record the high-water mark of a signal drain
    DrainSignals {
        name: crate::signal::SignalName,
        up_to_seq: u64,
    },
}

impl Command {
    /// The event this command becomes when the batch commits
    pub fn into_event(self) -> EventKind {
        match self {
            Command::ScheduleTask {
                task_id,
                kind,
                input,
                idempotency_key,
            } => EventKind::TaskScheduled {
                task_id,
                kind,
                input,
                idempotency_key,
            },
            Command::StartTimer { timer_id, fire_at } => {
                EventKind::TimerStarted { timer_id, fire_at }
            }
            Command::CreatePromise { promise_id } => EventKind::PromiseCreated { promise_id },
            Command::StartChild {
                child_id,
                kind,
                input,
            } => EventKind::ChildExecutionStarted {
                child_id,
                kind,
                input,
            },
            Command::CancelTask { task_id } => EventKind::TaskCancelRequested { task_id },
            Command::DrainSignals { name, up_to_seq } => {
                EventKind::SignalsDrained { name, up_to_seq }
            }
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::ScheduleTask { .. } => "schedule-task",
            Command::StartTimer { .. } => "start-timer",
            Command::CreatePromise { .. } => "create-promise",
            Command::StartChild { .. } => "start-child",
            Command::CancelTask { .. } => "cancel-task",
            Command::DrainSignals { .. } => "drain-signals",
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
