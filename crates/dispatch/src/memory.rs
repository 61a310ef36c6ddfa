// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory dispatcher
//!
//! A complete implementation of [`Dispatcher`] backed by a single
//! mutex-guarded state table: per-execution append-only event streams
//! with an optimistic tail check, the idempotency-key index, task rows
//! materialized from events, and a children index. Tests drive the
//! worker-pool and timer-service sides through the helper methods
//! (`complete_task`, `fire_timer`, ...), and can inject transport
//! failures with `fail_next_appends`.

use crate::Dispatcher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tidal_core::{
    Clock, ConflictError, DispatchError, EventKind, EventRecord, Execution, ExecutionId,
    ExecutionKind, ExecutionStatus, IdGen, IdempotencyKey, KeyIndex, PromiseId, SignalName,
    SystemClock, TaskFailure, TaskId, TaskRecord, TaskTransition, Tenant, TimerId, UuidIdGen,
};

#[derive(Default)]
struct Inner {
    executions: HashMap<ExecutionId, Execution>,
    histories: HashMap<ExecutionId, Vec<EventRecord>>,
    tasks: HashMap<TaskId, TaskRecord>,
    children: HashMap<ExecutionId, Vec<ExecutionId>>,
    keys: KeyIndex,
    fail_appends: u32,
}

/// In-memory [`Dispatcher`] for tests and embedded hosts
#[derive(Clone)]
pub struct MemoryDispatcher<C: Clock = SystemClock, G: IdGen = UuidIdGen> {
    inner: Arc<Mutex<Inner>>,
    clock: C,
    ids: G,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::with_parts(SystemClock, UuidIdGen)
    }
}

impl Default for MemoryDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock, G: IdGen> MemoryDispatcher<C, G> {
    /// Build with an explicit clock and id generator (deterministic tests)
    pub fn with_parts(clock: C, ids: G) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
            ids,
        }
    }

    /// Fail the next `n` calls to `append_events` with a transport
    /// error, before any state is touched
    pub fn fail_next_appends(&self, n: u32) {
        self.lock().fail_appends = n;
    }

    // Worker-pool stand-in ------------------------------------------------

    /// Report a task as completed. A no-op if the row is already
    /// terminal (cancel racing natural completion).
    pub fn complete_task(
        &self,
        task_id: &TaskId,
        output: serde_json::Value,
    ) -> Result<(), DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let task = inner
            .tasks
            .get(task_id)
            .ok_or_else(|| not_found("task", task_id.as_str()))?;
        if task.is_terminal() {
            return Ok(());
        }
        let execution_id = task.execution_id.clone();
        append_locked(
            &mut inner,
            &execution_id,
            None,
            vec![EventKind::TaskCompleted {
                task_id: task_id.clone(),
                output,
            }],
            now,
            false,
        )?;
        Ok(())
    }

    /// Report a task as failed. A no-op if the row is already terminal.
    pub fn fail_task(&self, task_id: &TaskId, error: TaskFailure) -> Result<(), DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let task = inner
            .tasks
            .get(task_id)
            .ok_or_else(|| not_found("task", task_id.as_str()))?;
        if task.is_terminal() {
            return Ok(());
        }
        let execution_id = task.execution_id.clone();
        append_locked(
            &mut inner,
            &execution_id,
            None,
            vec![EventKind::TaskFailed {
                task_id: task_id.clone(),
                error,
            }],
            now,
            false,
        )?;
        Ok(())
    }

    /// Mark a pending task as picked up by a worker
    pub fn start_task(&self, task_id: &TaskId) -> Result<(), DispatchError> {
        let mut inner = self.lock();
        let task = inner
            .tasks
            .get(task_id)
            .ok_or_else(|| not_found("task", task_id.as_str()))?;
        let started = task.transition(TaskTransition::Start);
        inner.tasks.insert(task_id.clone(), started);
        Ok(())
    }

    // Timer-service stand-in ----------------------------------------------

    /// Record that a durable timer fired
    pub fn fire_timer(
        &self,
        execution_id: &ExecutionId,
        timer_id: &TimerId,
    ) -> Result<u64, DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        append_locked(
            &mut inner,
            execution_id,
            None,
            vec![EventKind::TimerFired {
                timer_id: timer_id.clone(),
            }],
            now,
            false,
        )
    }

    // Promise completion --------------------------------------------------

    pub fn resolve_promise(
        &self,
        execution_id: &ExecutionId,
        promise_id: &PromiseId,
        value: serde_json::Value,
    ) -> Result<u64, DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        append_locked(
            &mut inner,
            execution_id,
            None,
            vec![EventKind::PromiseResolved {
                promise_id: promise_id.clone(),
                value,
            }],
            now,
            false,
        )
    }

    pub fn reject_promise(
        &self,
        execution_id: &ExecutionId,
        promise_id: &PromiseId,
        error: TaskFailure,
    ) -> Result<u64, DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        append_locked(
            &mut inner,
            execution_id,
            None,
            vec![EventKind::PromiseRejected {
                promise_id: promise_id.clone(),
                error,
            }],
            now,
            false,
        )
    }

    /// Request cancellation; the execution observes it at its next
    /// wait point, never as a synchronous interrupt
    pub fn request_cancellation(
        &self,
        execution_id: &ExecutionId,
        reason: Option<String>,
    ) -> Result<u64, DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        append_locked(
            &mut inner,
            execution_id,
            None,
            vec![EventKind::CancellationRequested { reason }],
            now,
            false,
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(kind: &'static str, id: &str) -> DispatchError {
    DispatchError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn tail_of(history: &[EventRecord]) -> u64 {
    history.last().map(|r| r.sequence).unwrap_or(0)
}

fn is_closed(history: &[EventRecord]) -> bool {
    history.last().is_some_and(|r| r.kind.is_terminal())
}

/// Walk the status machine through intermediate states where the
/// materialization jumps (e.g. Pending straight to a terminal state
/// within one cycle).
fn advance_status(execution: &Execution, to: ExecutionStatus) -> Execution {
    if execution.status == to || execution.status.is_terminal() {
        return execution.clone();
    }
    if let Ok(next) = execution.transition(to) {
        return next;
    }
    if let Ok(running) = execution.transition(ExecutionStatus::Running) {
        if let Ok(next) = running.transition(to) {
            return next;
        }
    }
    tracing::warn!(
        execution_id = %execution.id,
        from = ?execution.status,
        to = ?to,
        "unreachable status transition ignored"
    );
    execution.clone()
}

/// Append events to one execution under the already-held lock.
///
/// `expected_tail` of `None` means "at the current tail" (internal
/// re-entrant appends such as child completion fan-out). `from_core`
/// marks the core's own commits, which park the execution (Waiting)
/// unless terminal.
fn append_locked(
    inner: &mut Inner,
    execution_id: &ExecutionId,
    expected_tail: Option<u64>,
    events: Vec<EventKind>,
    now: DateTime<Utc>,
    from_core: bool,
) -> Result<u64, DispatchError> {
    let history = inner
        .histories
        .get(execution_id)
        .ok_or_else(|| not_found("execution", execution_id.as_str()))?;

    let actual_tail = tail_of(history);
    if let Some(expected) = expected_tail {
        if expected != actual_tail {
            return Err(ConflictError::SequenceMismatch {
                execution_id: execution_id.clone(),
                expected,
                actual: actual_tail,
            }
            .into());
        }
    }
    if is_closed(history) {
        return Err(ConflictError::ExecutionClosed {
            execution_id: execution_id.clone(),
        }
        .into());
    }

    let tenant = inner
        .executions
        .get(execution_id)
        .map(|e| e.tenant.clone())
        .ok_or_else(|| not_found("execution", execution_id.as_str()))?;

    // Validation pass: idempotency conflicts reject the whole batch
    // before anything becomes visible.
    for kind in &events {
        if let EventKind::TaskScheduled {
            task_id,
            idempotency_key: Some(key),
            ..
        } = kind
        {
            let full_key = IdempotencyKey::new(tenant.as_str(), key.clone());
            if let Some(record) = inner.keys.get(&full_key, now) {
                if record.target_id != task_id.as_str() {
                    return Err(ConflictError::KeyClaimed {
                        tenant: tenant.clone(),
                        key: key.clone(),
                        existing_target: record.target_id.clone(),
                    }
                    .into());
                }
            }
        }
    }

    let mut seq = actual_tail;
    let mut terminal = false;
    let mut parent_notifications: Vec<(ExecutionId, EventKind)> = Vec::new();

    for kind in events {
        seq += 1;
        terminal = terminal || kind.is_terminal();
        apply_event(inner, execution_id, &tenant, seq, &kind, now)?;
        if kind.is_terminal() {
            if let Some(parent) = inner
                .executions
                .get(execution_id)
                .and_then(|e| e.parent.clone())
            {
                parent_notifications.push((parent, child_outcome(execution_id, &kind)));
            }
        }
        let record = EventRecord {
            execution_id: execution_id.clone(),
            sequence: seq,
            kind,
            recorded_at: now,
        };
        inner
            .histories
            .get_mut(execution_id)
            .ok_or_else(|| not_found("execution", execution_id.as_str()))?
            .push(record);
    }

    if from_core && !terminal && seq > actual_tail {
        if let Some(execution) = inner.executions.get(execution_id) {
            let mut parked = advance_status(execution, ExecutionStatus::Waiting);
            parked.segment += 1;
            inner.executions.insert(execution_id.clone(), parked);
        }
    }

    // Fan terminal outcomes out to the parent log (one-directional fk,
    // the parent only ever learns through its own events).
    for (parent_id, kind) in parent_notifications {
        if let Err(error) = append_locked(inner, &parent_id, None, vec![kind], now, false) {
            tracing::warn!(%parent_id, %error, "dropping child outcome for closed parent");
        }
    }

    Ok(seq)
}

/// Translate a child's terminal event into the parent-visible fact
fn child_outcome(child_id: &ExecutionId, kind: &EventKind) -> EventKind {
    match kind {
        EventKind::ExecutionCompleted { output } => EventKind::ChildExecutionCompleted {
            child_id: child_id.clone(),
            output: output.clone(),
        },
        EventKind::ExecutionFailed { error } => EventKind::ChildExecutionFailed {
            child_id: child_id.clone(),
            error: error.clone(),
        },
        _ => EventKind::ChildExecutionFailed {
            child_id: child_id.clone(),
            error: TaskFailure::new("cancelled", "child execution was cancelled"),
        },
    }
}

/// Materialize one event into the derived tables
fn apply_event(
    inner: &mut Inner,
    execution_id: &ExecutionId,
    tenant: &Tenant,
    seq: u64,
    kind: &EventKind,
    now: DateTime<Utc>,
) -> Result<(), DispatchError> {
    match kind {
        EventKind::TaskScheduled {
            task_id,
            kind,
            input,
            idempotency_key,
        } => {
            if !inner.tasks.contains_key(task_id) {
                inner.tasks.insert(
                    task_id.clone(),
                    TaskRecord::new(
                        task_id.clone(),
                        execution_id.clone(),
                        kind.clone(),
                        input.clone(),
                        idempotency_key.clone(),
                    ),
                );
            }
            if let Some(key) = idempotency_key {
                let full_key = IdempotencyKey::new(tenant.as_str(), key.clone());
                inner
                    .keys
                    .claim(full_key, task_id.as_str(), None, now)
                    .map_err(DispatchError::Conflict)?;
            }
        }
        EventKind::TaskCompleted { task_id, output } => {
            if let Some(task) = inner.tasks.get(task_id) {
                let next = task.transition(TaskTransition::Complete {
                    output: output.clone(),
                });
                inner.tasks.insert(task_id.clone(), next);
            }
        }
        EventKind::TaskFailed { task_id, error } => {
            if let Some(task) = inner.tasks.get(task_id) {
                let next = task.transition(TaskTransition::Fail {
                    error: error.clone(),
                });
                inner.tasks.insert(task_id.clone(), next);
            }
        }
        EventKind::TaskCancelRequested { task_id } => {
            if let Some(task) = inner.tasks.get(task_id) {
                let next = task.transition(TaskTransition::Cancel);
                inner.tasks.insert(task_id.clone(), next);
            }
        }
        EventKind::ChildExecutionStarted {
            child_id,
            kind,
            input,
        } => {
            create_execution_locked(
                inner,
                child_id.clone(),
                tenant.clone(),
                kind.clone(),
                input.clone(),
                Some(execution_id.clone()),
                None,
                None,
                now,
            );
            inner
                .children
                .entry(execution_id.clone())
                .or_default()
                .push(child_id.clone());
        }
        EventKind::Checkpoint { .. } => {
            if let Some(execution) = inner.executions.get_mut(execution_id) {
                execution.checkpoint_seq = Some(seq);
            }
        }
        EventKind::ExecutionCompleted { output } => {
            if let Some(execution) = inner.executions.get(execution_id) {
                let mut done = advance_status(execution, ExecutionStatus::Completed);
                done.output = Some(output.clone());
                inner.executions.insert(execution_id.clone(), done);
            }
        }
        EventKind::ExecutionFailed { error } => {
            if let Some(execution) = inner.executions.get(execution_id) {
                let mut failed = advance_status(execution, ExecutionStatus::Failed);
                failed.error = Some(error.clone());
                inner.executions.insert(execution_id.clone(), failed);
            }
        }
        EventKind::ExecutionCancelled => {
            if let Some(execution) = inner.executions.get(execution_id) {
                let cancelled = advance_status(execution, ExecutionStatus::Cancelled);
                inner.executions.insert(execution_id.clone(), cancelled);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Create an execution record and seed its history with
/// `ExecutionStarted`. Assumes the id is fresh.
#[allow(clippy::too_many_arguments)]
fn create_execution_locked(
    inner: &mut Inner,
    id: ExecutionId,
    tenant: Tenant,
    kind: ExecutionKind,
    input: serde_json::Value,
    parent: Option<ExecutionId>,
    idempotency_key: Option<String>,
    key_expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) {
    let execution = Execution {
        id: id.clone(),
        tenant,
        kind: kind.clone(),
        input: input.clone(),
        status: ExecutionStatus::Pending,
        checkpoint_seq: None,
        segment: 0,
        parent,
        idempotency_key,
        key_expires_at,
        created_at: now,
        error: None,
        output: None,
    };
    inner.executions.insert(id.clone(), execution);
    inner.histories.insert(
        id.clone(),
        vec![EventRecord {
            execution_id: id,
            sequence: 1,
            kind: EventKind::ExecutionStarted { kind, input },
            recorded_at: now,
        }],
    );
}

#[async_trait]
impl<C: Clock, G: IdGen> Dispatcher for MemoryDispatcher<C, G> {
    async fn append_events(
        &self,
        execution_id: &ExecutionId,
        expected_tail_seq: u64,
        events: Vec<EventKind>,
    ) -> Result<u64, DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        if inner.fail_appends > 0 {
            inner.fail_appends -= 1;
            return Err(DispatchError::Transport("injected append failure".into()));
        }
        append_locked(
            &mut inner,
            execution_id,
            Some(expected_tail_seq),
            events,
            now,
            true,
        )
    }

    async fn load_history(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<EventRecord>, DispatchError> {
        let inner = self.lock();
        inner
            .histories
            .get(execution_id)
            .cloned()
            .ok_or_else(|| not_found("execution", execution_id.as_str()))
    }

    async fn claim_or_create_execution(
        &self,
        tenant: &Tenant,
        idempotency_key: Option<&str>,
        key_expires_at: Option<DateTime<Utc>>,
        kind: &ExecutionKind,
        input: serde_json::Value,
    ) -> Result<(ExecutionId, bool), DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();

        if let Some(key) = idempotency_key {
            let full_key = IdempotencyKey::new(tenant.as_str(), key);
            if let Some(record) = inner.keys.get(&full_key, now) {
                let existing = ExecutionId::from(record.target_id.as_str());
                if inner.executions.contains_key(&existing) {
                    return Ok((existing, false));
                }
                return Err(ConflictError::KeyClaimed {
                    tenant: tenant.clone(),
                    key: key.to_string(),
                    existing_target: record.target_id.clone(),
                }
                .into());
            }
        }

        let id = ExecutionId(format!("exec-{}", self.ids.next()));
        create_execution_locked(
            &mut inner,
            id.clone(),
            tenant.clone(),
            kind.clone(),
            input,
            None,
            idempotency_key.map(str::to_string),
            key_expires_at,
            now,
        );
        if let Some(key) = idempotency_key {
            let full_key = IdempotencyKey::new(tenant.as_str(), key);
            inner
                .keys
                .claim(full_key, id.as_str(), key_expires_at, now)
                .map_err(DispatchError::Conflict)?;
        }
        tracing::debug!(execution_id = %id, kind = %kind, "execution created");
        Ok((id, true))
    }

    async fn claim_or_create_task(
        &self,
        tenant: &Tenant,
        idempotency_key: &str,
        execution_id: &ExecutionId,
        kind: &str,
        input: serde_json::Value,
    ) -> Result<(TaskId, bool), DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let full_key = IdempotencyKey::new(tenant.as_str(), idempotency_key);
        if let Some(record) = inner.keys.get(&full_key, now) {
            let existing = TaskId::from(record.target_id.as_str());
            if inner.tasks.contains_key(&existing) {
                return Ok((existing, false));
            }
            return Err(ConflictError::KeyClaimed {
                tenant: tenant.clone(),
                key: idempotency_key.to_string(),
                existing_target: record.target_id.clone(),
            }
            .into());
        }

        let task_id = TaskId(format!("task-{}", self.ids.next()));
        append_locked(
            &mut inner,
            execution_id,
            None,
            vec![EventKind::TaskScheduled {
                task_id: task_id.clone(),
                kind: kind.to_string(),
                input,
                idempotency_key: Some(idempotency_key.to_string()),
            }],
            now,
            false,
        )?;
        Ok((task_id, true))
    }

    async fn deliver_signal(
        &self,
        execution_id: &ExecutionId,
        name: &SignalName,
        value: serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Result<u64, DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let tenant = inner
            .executions
            .get(execution_id)
            .map(|e| e.tenant.clone())
            .ok_or_else(|| not_found("execution", execution_id.as_str()))?;

        if let Some(key) = idempotency_key {
            let full_key = IdempotencyKey::new(tenant.as_str(), key);
            if let Some(record) = inner.keys.get(&full_key, now) {
                // Re-delivery: return the original append's sequence
                if let Some(seq) = record
                    .target_id
                    .strip_prefix("signal:")
                    .and_then(|s| s.parse::<u64>().ok())
                {
                    return Ok(seq);
                }
                return Err(ConflictError::KeyClaimed {
                    tenant,
                    key: key.to_string(),
                    existing_target: record.target_id.clone(),
                }
                .into());
            }
        }

        let seq = append_locked(
            &mut inner,
            execution_id,
            None,
            vec![EventKind::SignalReceived {
                name: name.clone(),
                value,
            }],
            now,
            false,
        )?;
        if let Some(key) = idempotency_key {
            let full_key = IdempotencyKey::new(tenant.as_str(), key);
            inner
                .keys
                .claim(full_key, format!("signal:{seq}"), None, now)
                .map_err(DispatchError::Conflict)?;
        }
        Ok(seq)
    }

    async fn signal_or_start(
        &self,
        tenant: &Tenant,
        idempotency_key: &str,
        kind: &ExecutionKind,
        input: serde_json::Value,
        name: &SignalName,
        value: serde_json::Value,
    ) -> Result<(ExecutionId, u64), DispatchError> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let full_key = IdempotencyKey::new(tenant.as_str(), idempotency_key);
        let execution_id = match inner.keys.get(&full_key, now) {
            Some(record) => {
                let existing = ExecutionId::from(record.target_id.as_str());
                if !inner.executions.contains_key(&existing) {
                    return Err(ConflictError::KeyClaimed {
                        tenant: tenant.clone(),
                        key: idempotency_key.to_string(),
                        existing_target: record.target_id.clone(),
                    }
                    .into());
                }
                existing
            }
            None => {
                let id = ExecutionId(format!("exec-{}", self.ids.next()));
                create_execution_locked(
                    &mut inner,
                    id.clone(),
                    tenant.clone(),
                    kind.clone(),
                    input,
                    None,
                    Some(idempotency_key.to_string()),
                    None,
                    now,
                );
                inner
                    .keys
                    .claim(full_key, id.as_str(), None, now)
                    .map_err(DispatchError::Conflict)?;
                id
            }
        };

        let seq = append_locked(
            &mut inner,
            &execution_id,
            None,
            vec![EventKind::SignalReceived {
                name: name.clone(),
                value,
            }],
            now,
            false,
        )?;
        Ok((execution_id, seq))
    }

    async fn execution(&self, execution_id: &ExecutionId) -> Result<Execution, DispatchError> {
        self.lock()
            .executions
            .get(execution_id)
            .cloned()
            .ok_or_else(|| not_found("execution", execution_id.as_str()))
    }

    async fn task(&self, task_id: &TaskId) -> Result<TaskRecord, DispatchError> {
        self.lock()
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| not_found("task", task_id.as_str()))
    }

    async fn tasks_for(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<TaskRecord>, DispatchError> {
        let mut tasks: Vec<TaskRecord> = self
            .lock()
            .tasks
            .values()
            .filter(|t| &t.execution_id == execution_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    async fn children_of(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<ExecutionId>, DispatchError> {
        Ok(self
            .lock()
            .children
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
