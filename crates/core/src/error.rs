// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the workspace
//!
//! Four families, deliberately distinct (see also the engine's
//! `ExecuteError`):
//! - transport errors: retryable, no side effect was duplicated
//! - conflict errors: fatal to the current in-memory instance
//! - replay divergence: recorded history disagrees with the code path
//! - task failure: an ordinary application-level value, recoverable

use crate::execution::ExecutionId;
use crate::idempotency::Tenant;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the dispatcher collaborator
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Transient transport failure; safe to retry the same call
    #[error("transport error: {0}")]
    Transport(String),
    /// Conflict; the caller holds a stale view and must not retry
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    /// The referenced entity does not exist
    #[error("not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },
}

impl DispatchError {
    /// Whether the call may be retried without duplicating side effects
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Transport(_))
    }
}

/// Conflicts detected by the dispatcher's optimistic checks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// The event log tail moved underneath this writer
    #[error("sequence mismatch for {execution_id}: expected tail {expected}, found {actual}")]
    SequenceMismatch {
        execution_id: ExecutionId,
        expected: u64,
        actual: u64,
    },
    /// The idempotency key is live and bound to a different target
    #[error("idempotency key {key:?} for tenant {tenant} already claimed by {existing_target}")]
    KeyClaimed {
        tenant: Tenant,
        key: String,
        existing_target: String,
    },
    /// The execution's history ends in a terminal event
    #[error("execution {execution_id} is closed")]
    ExecutionClosed { execution_id: ExecutionId },
}

/// Recorded history disagrees with what the code just asked for.
///
/// Always fatal: it means the execution's code changed incompatibly
/// since the history was written. Never auto-retried.
#[derive(Debug, Clone, Error)]
#[error("replay divergence: history recorded {expected}, code requested {requested}")]
pub struct ReplayDivergence {
    pub expected: String,
    pub requested: String,
}

/// An application-level failure of a task, child execution, or handler.
///
/// This is a value, not a fault: awaiting code may retry, fall back, or
/// propagate it. An unhandled failure terminates the execution FAILED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct TaskFailure {
    pub code: String,
    pub message: String,
}

impl TaskFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Control-flow signal propagated out of execution code with `?`.
///
/// Not a failure: `Suspended` parks the execution until new events
/// arrive, `Cancelled` is observed at the next wait point and leads to
/// a CANCELLED terminal state (never auto-retried, unlike FAILED).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupt {
    #[error("execution suspended")]
    Suspended,
    #[error("execution cancelled")]
    Cancelled,
}
