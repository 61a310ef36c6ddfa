// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution records and status transitions
//!
//! An execution is one workflow or agent run. The record here is the
//! dispatcher-materialized view; the authoritative state is always the
//! event log, from which everything below can be rebuilt.

use crate::error::TaskFailure;
use crate::idempotency::Tenant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for an execution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ExecutionId {
    fn from(s: String) -> Self {
        ExecutionId(s)
    }
}

impl From<&str> for ExecutionId {
    fn from(s: &str) -> Self {
        ExecutionId(s.to_string())
    }
}

/// Registered kind an execution was triggered as (resolved to a handler)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionKind(pub String);

impl ExecutionKind {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExecutionKind {
    fn from(s: &str) -> Self {
        ExecutionKind(s.to_string())
    }
}

/// Lifecycle status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Created but never run
    Pending,
    /// A worker holds the lease and is replaying/advancing
    Running,
    /// Parked until new events arrive
    Waiting,
    /// Terminal: produced an output
    Completed,
    /// Terminal: unhandled application failure
    Failed,
    /// Terminal: cancelled; never auto-retried, distinct from Failed
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Rejected status transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid execution transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: ExecutionStatus,
    pub to: ExecutionStatus,
}

/// One workflow or agent run, as materialized by the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub tenant: Tenant,
    pub kind: ExecutionKind,
    pub input: serde_json::Value,
    pub status: ExecutionStatus,
    /// Sequence of the latest checkpoint event, if any
    pub checkpoint_seq: Option<u64>,
    /// Current replay epoch (scopes deterministic id derivation)
    pub segment: u64,
    pub parent: Option<ExecutionId>,
    pub idempotency_key: Option<String>,
    pub key_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Error captured by the final event of a FAILED execution
    pub error: Option<TaskFailure>,
    pub output: Option<serde_json::Value>,
}

impl Execution {
    /// Guarded status transition.
    ///
    /// Terminal states are final. `Waiting` is only reachable from
    /// `Running` (an execution parks mid-cycle, never from cold).
    pub fn transition(&self, to: ExecutionStatus) -> Result<Execution, InvalidTransition> {
        use ExecutionStatus::*;
        let ok = match (self.status, to) {
            (Pending, Running) => true,
            (Pending, Cancelled) => true,
            (Running, Waiting | Completed | Failed | Cancelled) => true,
            (Waiting, Running | Completed | Failed | Cancelled) => true,
            _ => false,
        };
        if !ok {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(Execution {
            status: to,
            ..self.clone()
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
