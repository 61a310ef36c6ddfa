// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable event model
//!
//! Events are the only durable state in the system. Each execution
//! owns one append-only, strictly ordered, gapless stream; the core
//! never mutates history, only appends. Replaying a fixed prefix must
//! reproduce the same sequence of decisions - determinism is the
//! central invariant everything else leans on.

use crate::error::TaskFailure;
use crate::execution::{ExecutionId, ExecutionKind};
use crate::signal::SignalName;
use crate::task::{PromiseId, TaskId, TimerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable fact in an execution's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub execution_id: ExecutionId,
    /// Strictly increasing, gapless, starting at 1
    pub sequence: u64,
    pub kind: EventKind,
    pub recorded_at: DateTime<Utc>,
}

/// Every kind of fact the log can record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// Execution triggered; carries the kind and trigger input
    ExecutionStarted {
        kind: ExecutionKind,
        input: serde_json::Value,
    },

    // Task lifecycle
    TaskScheduled {
        task_id: TaskId,
        kind: String,
        input: serde_json::Value,
        idempotency_key: Option<String>,
    },
    TaskCompleted {
        task_id: TaskId,
        output: serde_json::Value,
    },
    TaskFailed {
        task_id: TaskId,
        error: TaskFailure,
    },
    /// Best-effort cancel request for in-flight work (select_ok losers)
    TaskCancelRequested {
        task_id: TaskId,
    },

    // Signals
    SignalReceived {
        name: SignalName,
        value: serde_json::Value,
    },
    /// Marks a drain call's high-water mark so replay consumes exactly
    /// the values the original drain saw, not later arrivals
    SignalsDrained {
        name: SignalName,
        up_to_seq: u64,
    },

    // Promises
    PromiseCreated {
        promise_id: PromiseId,
    },
    PromiseResolved {
        promise_id: PromiseId,
        value: serde_json::Value,
    },
    PromiseRejected {
        promise_id: PromiseId,
        error: TaskFailure,
    },

    // Timers
    TimerStarted {
        timer_id: TimerId,
        fire_at: DateTime<Utc>,
    },
    TimerFired {
        timer_id: TimerId,
    },

    // Child executions
    ChildExecutionStarted {
        child_id: ExecutionId,
        kind: ExecutionKind,
        input: serde_json::Value,
    },
    ChildExecutionCompleted {
        child_id: ExecutionId,
        output: serde_json::Value,
    },
    ChildExecutionFailed {
        child_id: ExecutionId,
        error: TaskFailure,
    },

    /// Opaque application state snapshot paired with a batch commit
    Checkpoint {
        state: serde_json::Value,
    },

    /// Cancellation delivered as an event, observed at the next wait
    CancellationRequested {
        reason: Option<String>,
    },

    // Terminal events
    ExecutionCompleted {
        output: serde_json::Value,
    },
    ExecutionFailed {
        error: TaskFailure,
    },
    ExecutionCancelled,
}

impl EventKind {
    /// Get the event name for logging and pattern matching.
    /// Format: "category:action"
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ExecutionStarted { .. } => "execution:started",
            EventKind::TaskScheduled { .. } => "task:scheduled",
            EventKind::TaskCompleted { .. } => "task:completed",
            EventKind::TaskFailed { .. } => "task:failed",
            EventKind::TaskCancelRequested { .. } => "task:cancel-requested",
            EventKind::SignalReceived { .. } => "signal:received",
            EventKind::SignalsDrained { .. } => "signal:drained",
            EventKind::PromiseCreated { .. } => "promise:created",
            EventKind::PromiseResolved { .. } => "promise:resolved",
            EventKind::PromiseRejected { .. } => "promise:rejected",
            EventKind::TimerStarted { .. } => "timer:started",
            EventKind::TimerFired { .. } => "timer:fired",
            EventKind::ChildExecutionStarted { .. } => "child:started",
            EventKind::ChildExecutionCompleted { .. } => "child:completed",
            EventKind::ChildExecutionFailed { .. } => "child:failed",
            EventKind::Checkpoint { .. } => "execution:checkpoint",
            EventKind::CancellationRequested { .. } => "execution:cancellation-requested",
            EventKind::ExecutionCompleted { .. } => "execution:completed",
            EventKind::ExecutionFailed { .. } => "execution:failed",
            EventKind::ExecutionCancelled => "execution:cancelled",
        }
    }

    /// Whether this event closes the execution's history
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::ExecutionCompleted { .. }
                | EventKind::ExecutionFailed { .. }
                | EventKind::ExecutionCancelled
        )
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
