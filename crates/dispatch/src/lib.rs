// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tidal-dispatch: the dispatcher collaborator boundary
//!
//! The dispatcher is the external service that persists event streams,
//! routes poll requests to workers, and owns the idempotency-key
//! index. The core consumes it through the [`Dispatcher`] trait and
//! never assumes anything about its persistence engine.
//!
//! [`MemoryDispatcher`] is a complete in-process implementation used
//! by tests and embedded deployments, with fault injection for
//! exercising the retry and atomic-commit paths.

mod memory;

pub use memory::MemoryDispatcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tidal_core::{
    DispatchError, EventKind, EventRecord, Execution, ExecutionId, ExecutionKind, SignalName,
    TaskId, TaskRecord, Tenant,
};

/// The dispatcher collaborator, as seen by the core.
///
/// All calls are synchronous from the core's viewpoint: a returned
/// `Transport` error is retryable with no duplicated side effect, a
/// `Conflict` is fatal to the caller's in-memory instance.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Atomically append events to an execution's log.
    ///
    /// The append is rejected with a sequence conflict if
    /// `expected_tail_seq` no longer matches the log tail - the caller
    /// is a stale writer and must discard its view. Either every event
    /// becomes visible, in order, or none does. Returns the new tail.
    async fn append_events(
        &self,
        execution_id: &ExecutionId,
        expected_tail_seq: u64,
        events: Vec<EventKind>,
    ) -> Result<u64, DispatchError>;

    /// Load the full ordered history of an execution
    async fn load_history(&self, execution_id: &ExecutionId)
        -> Result<Vec<EventRecord>, DispatchError>;

    /// Find the execution bound to `(tenant, idempotency_key)` or
    /// create one. Returns the id and whether it was created by this
    /// call. Without a key, always creates.
    async fn claim_or_create_execution(
        &self,
        tenant: &Tenant,
        idempotency_key: Option<&str>,
        key_expires_at: Option<DateTime<Utc>>,
        kind: &ExecutionKind,
        input: serde_json::Value,
    ) -> Result<(ExecutionId, bool), DispatchError>;

    /// Find the task bound to `(tenant, idempotency_key)` or create
    /// one owned by the given execution.
    async fn claim_or_create_task(
        &self,
        tenant: &Tenant,
        idempotency_key: &str,
        execution_id: &ExecutionId,
        kind: &str,
        input: serde_json::Value,
    ) -> Result<(TaskId, bool), DispatchError>;

    /// Append one signal value to an execution's named channel.
    ///
    /// With an idempotency key, a re-delivery returns the sequence of
    /// the original append instead of enqueueing a duplicate.
    async fn deliver_signal(
        &self,
        execution_id: &ExecutionId,
        name: &SignalName,
        value: serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Result<u64, DispatchError>;

    /// Atomic get-or-create-execution-then-append-signal composite:
    /// first contact creates the execution, subsequent contacts just
    /// signal it.
    async fn signal_or_start(
        &self,
        tenant: &Tenant,
        idempotency_key: &str,
        kind: &ExecutionKind,
        input: serde_json::Value,
        name: &SignalName,
        value: serde_json::Value,
    ) -> Result<(ExecutionId, u64), DispatchError>;

    /// Materialized execution record
    async fn execution(&self, execution_id: &ExecutionId) -> Result<Execution, DispatchError>;

    /// Materialized task row
    async fn task(&self, task_id: &TaskId) -> Result<TaskRecord, DispatchError>;

    /// All task rows owned by an execution
    async fn tasks_for(&self, execution_id: &ExecutionId)
        -> Result<Vec<TaskRecord>, DispatchError>;

    /// Children index (one-directional parent fk, queried here)
    async fn children_of(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<ExecutionId>, DispatchError>;
}
