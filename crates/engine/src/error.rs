// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-side error types
//!
//! These layer over the core taxonomy: waits can be interrupted
//! (control flow), diverge (fatal), or fail (application value); the
//! handler boundary collapses waits into [`ExecuteError`]; commits and
//! the runner have their own failure modes.

use thiserror::Error;
use tidal_core::{
    ConflictError, DispatchError, ExecutionKind, Interrupt, ReplayDivergence, TaskFailure,
};

/// Failure to commit a command batch
#[derive(Debug, Error)]
pub enum CommitError {
    /// Transient; the batch is retained and the commit may be retried
    #[error("transport error: {0}")]
    Transport(String),
    /// Another writer advanced the log; this instance is stale
    #[error("stale writer: {0}")]
    Stale(ConflictError),
    /// The dispatcher rejected the batch outright
    #[error("commit rejected: {0}")]
    Rejected(String),
}

impl From<DispatchError> for CommitError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Transport(msg) => CommitError::Transport(msg),
            DispatchError::Conflict(conflict) => CommitError::Stale(conflict),
            DispatchError::NotFound { kind, id } => {
                CommitError::Rejected(format!("not found: {kind} {id}"))
            }
        }
    }
}

/// What a wait call can produce besides a value
#[derive(Debug, Error)]
pub enum WaitError {
    /// No resolution recorded yet (or cancellation observed); propagate
    /// with `?` to park the execution
    #[error(transparent)]
    Interrupt(#[from] Interrupt),
    /// Recorded history disagrees with the code path; fatal
    #[error(transparent)]
    Divergence(#[from] ReplayDivergence),
    /// The awaited work failed; recoverable by the caller
    #[error("task failed: {0}")]
    TaskFailed(TaskFailure),
    /// A timeout-guarded wait elapsed before the work resolved
    #[error("wait timed out")]
    TimedOut,
}

/// What a handler invocation can produce besides an output
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Interrupt(#[from] Interrupt),
    #[error(transparent)]
    Divergence(#[from] ReplayDivergence),
    /// Unhandled application failure; terminates the execution FAILED
    #[error(transparent)]
    Failure(TaskFailure),
}

impl ExecuteError {
    /// Shorthand for an application failure
    pub fn fail(code: impl Into<String>, message: impl Into<String>) -> Self {
        ExecuteError::Failure(TaskFailure::new(code, message))
    }
}

impl From<WaitError> for ExecuteError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Interrupt(interrupt) => ExecuteError::Interrupt(interrupt),
            WaitError::Divergence(divergence) => ExecuteError::Divergence(divergence),
            WaitError::TaskFailed(failure) => ExecuteError::Failure(failure),
            WaitError::TimedOut => {
                ExecuteError::Failure(TaskFailure::new("timeout", "wait timed out"))
            }
        }
    }
}

impl From<TaskFailure> for ExecuteError {
    fn from(failure: TaskFailure) -> Self {
        ExecuteError::Failure(failure)
    }
}

/// Errors surfaced by the runner loop
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Commit(#[from] CommitError),
    /// Fatal: code changed incompatibly under recorded history
    #[error(transparent)]
    Divergence(#[from] ReplayDivergence),
    #[error("no handler registered for execution kind {0}")]
    UnknownKind(ExecutionKind),
}
