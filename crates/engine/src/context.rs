// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution context: the handler-facing API
//!
//! Handlers are synchronous, deterministic functions over this
//! context. Every operation either fast-forwards from recorded history
//! or buffers a command; a wait with no recorded resolution propagates
//! [`Interrupt::Suspended`] with `?` and the runner commits the batch.
//!
//! Determinism contract for handler code: no wall clock, no randomness,
//! no outside I/O. Use [`ExecutionContext::now`] for time and schedule
//! tasks for anything effectful.

use crate::batch::CommandBatch;
use crate::error::WaitError;
use crate::replay::{CategoryKey, ReplayEngine};
use crate::suspension::{SuspensionController, WaitState};
use chrono::{DateTime, Duration, Utc};
use tidal_core::{
    derive_child_id, derive_promise_id, derive_task_id, derive_timer_id, Command, EventKind,
    ExecutionId, ExecutionKind, Interrupt, PromiseId, ReplayDivergence, SignalName, TaskId,
    TimerId,
};

/// Deterministic view of one execution, rebuilt each run cycle
pub struct ExecutionContext {
    execution_id: ExecutionId,
    controller: SuspensionController,
    pending_checkpoint: Option<serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(execution_id: ExecutionId, engine: ReplayEngine) -> Self {
        ExecutionContext {
            controller: SuspensionController::new(execution_id.clone(), engine),
            execution_id,
            pending_checkpoint: None,
        }
    }

    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    /// Deterministic time: the recorded time of the last consumed
    /// event, identical on every replay
    pub fn now(&self) -> DateTime<Utc> {
        self.controller.engine().logical_now()
    }

    /// Whether a cancellation request is on record. Waits observe it
    /// automatically; loops without waits can poll this to exit early.
    pub fn cancellation_requested(&self) -> bool {
        self.controller.engine().cancellation_requested()
    }

    // ---- tasks ----

    /// Schedule a task. Replaying the same code path yields the same
    /// derived id, so the task is scheduled at most once.
    pub fn schedule(
        &mut self,
        kind: &str,
        input: serde_json::Value,
    ) -> Result<TaskId, WaitError> {
        self.schedule_keyed(kind, input, None)
    }

    /// Schedule a task carrying a caller-supplied idempotency key
    pub fn schedule_keyed(
        &mut self,
        kind: &str,
        input: serde_json::Value,
        idempotency_key: Option<String>,
    ) -> Result<TaskId, WaitError> {
        let (segment, seq) = self.controller.next_slot();
        let task_id = derive_task_id(&self.execution_id, segment, seq);
        let key = CategoryKey::Task(task_id.clone());

        if let Some(recorded) = self.controller.engine().recorded_schedule(&key) {
            if let EventKind::TaskScheduled {
                kind: recorded_kind,
                input: recorded_input,
                ..
            } = &recorded.kind
            {
                if recorded_kind != kind || recorded_input != &input {
                    return Err(divergence(
                        format!("task {task_id} kind={recorded_kind} input={recorded_input}"),
                        format!("task {task_id} kind={kind} input={input}"),
                    ));
                }
            }
        } else {
            self.controller.batch_mut().buffer(Command::ScheduleTask {
                task_id: task_id.clone(),
                kind: kind.to_string(),
                input,
                idempotency_key,
            });
        }
        self.controller.register(key);
        Ok(task_id)
    }

    /// Wait for a task's resolution.
    ///
    /// Completion yields the output; failure yields
    /// [`WaitError::TaskFailed`], an ordinary value the caller may
    /// handle. No resolution yet suspends the execution.
    pub fn wait_task(&mut self, task_id: &TaskId) -> Result<serde_json::Value, WaitError> {
        let key = CategoryKey::Task(task_id.clone());
        match self.controller.try_resolve(&key) {
            Some(record) => match record.kind {
                EventKind::TaskCompleted { output, .. } => Ok(output),
                EventKind::TaskFailed { error, .. } => Err(WaitError::TaskFailed(error)),
                other => Err(divergence(
                    other.name().to_string(),
                    format!("task resolution for {task_id}"),
                )),
            },
            None => Err(WaitError::Interrupt(self.controller.park())),
        }
    }

    /// Schedule and wait in one call
    pub fn run_task(
        &mut self,
        kind: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, WaitError> {
        let task_id = self.schedule(kind, input)?;
        self.wait_task(&task_id)
    }

    /// Request best-effort cancellation of an in-flight task.
    /// No-ops if a cancel is already recorded or buffered.
    pub fn cancel_task(&mut self, task_id: &TaskId) {
        if self.controller.engine().cancel_requested(task_id)
            || self.controller.batch().contains_cancel(task_id)
        {
            return;
        }
        self.controller.batch_mut().buffer(Command::CancelTask {
            task_id: task_id.clone(),
        });
        self.controller
            .mark(CategoryKey::Task(task_id.clone()), WaitState::Cancelled);
    }

    // ---- timers ----

    /// Start a durable timer firing after `delay` of logical time
    pub fn start_timer(&mut self, delay: Duration) -> TimerId {
        let (segment, seq) = self.controller.next_slot();
        let timer_id = derive_timer_id(&self.execution_id, segment, seq);
        let key = CategoryKey::Timer(timer_id.clone());

        // A recorded start carries the authoritative fire_at
        if self.controller.engine().recorded_schedule(&key).is_none() {
            let fire_at = self.now() + delay;
            self.controller.batch_mut().buffer(Command::StartTimer {
                timer_id: timer_id.clone(),
                fire_at,
            });
        }
        self.controller.register(key);
        timer_id
    }

    /// Wait for a timer to fire
    pub fn wait_timer(&mut self, timer_id: &TimerId) -> Result<(), WaitError> {
        let key = CategoryKey::Timer(timer_id.clone());
        match self.controller.try_resolve(&key) {
            Some(_) => Ok(()),
            None => Err(WaitError::Interrupt(self.controller.park())),
        }
    }

    /// Start a timer and wait for it: a durable sleep
    pub fn sleep(&mut self, delay: Duration) -> Result<(), WaitError> {
        let timer_id = self.start_timer(delay);
        self.wait_timer(&timer_id)
    }

    // ---- promises ----

    /// Create a promise resolvable from outside the execution
    pub fn create_promise(&mut self) -> PromiseId {
        let (segment, seq) = self.controller.next_slot();
        let promise_id = derive_promise_id(&self.execution_id, segment, seq);
        let key = CategoryKey::Promise(promise_id.clone());

        if self.controller.engine().recorded_schedule(&key).is_none() {
            self.controller.batch_mut().buffer(Command::CreatePromise {
                promise_id: promise_id.clone(),
            });
        }
        self.controller.register(key);
        promise_id
    }

    /// Wait for a promise; rejection surfaces like a task failure
    pub fn wait_promise(&mut self, promise_id: &PromiseId) -> Result<serde_json::Value, WaitError> {
        let key = CategoryKey::Promise(promise_id.clone());
        match self.controller.try_resolve(&key) {
            Some(record) => match record.kind {
                EventKind::PromiseResolved { value, .. } => Ok(value),
                EventKind::PromiseRejected { error, .. } => Err(WaitError::TaskFailed(error)),
                other => Err(divergence(
                    other.name().to_string(),
                    format!("promise resolution for {promise_id}"),
                )),
            },
            None => Err(WaitError::Interrupt(self.controller.park())),
        }
    }

    // ---- child executions ----

    /// Start a child execution
    pub fn spawn_child(
        &mut self,
        kind: &ExecutionKind,
        input: serde_json::Value,
    ) -> Result<ExecutionId, WaitError> {
        let (segment, seq) = self.controller.next_slot();
        let child_id = derive_child_id(&self.execution_id, segment, seq);
        let key = CategoryKey::Child(child_id.clone());

        if let Some(recorded) = self.controller.engine().recorded_schedule(&key) {
            if let EventKind::ChildExecutionStarted {
                kind: recorded_kind,
                input: recorded_input,
                ..
            } = &recorded.kind
            {
                if recorded_kind != kind || recorded_input != &input {
                    return Err(divergence(
                        format!("child {child_id} kind={recorded_kind}"),
                        format!("child {child_id} kind={kind}"),
                    ));
                }
            }
        } else {
            self.controller.batch_mut().buffer(Command::StartChild {
                child_id: child_id.clone(),
                kind: kind.clone(),
                input,
            });
        }
        self.controller.register(key);
        Ok(child_id)
    }

    /// Wait for a child execution's terminal outcome
    pub fn wait_child(&mut self, child_id: &ExecutionId) -> Result<serde_json::Value, WaitError> {
        let key = CategoryKey::Child(child_id.clone());
        match self.controller.try_resolve(&key) {
            Some(record) => match record.kind {
                EventKind::ChildExecutionCompleted { output, .. } => Ok(output),
                EventKind::ChildExecutionFailed { error, .. } => Err(WaitError::TaskFailed(error)),
                other => Err(divergence(
                    other.name().to_string(),
                    format!("child outcome for {child_id}"),
                )),
            },
            None => Err(WaitError::Interrupt(self.controller.park())),
        }
    }

    // ---- signals ----

    /// Wait for the next value on a named signal channel (FIFO)
    pub fn wait_for_signal(&mut self, name: &SignalName) -> Result<serde_json::Value, WaitError> {
        let key = CategoryKey::Signal(name.clone());
        self.controller.register(key.clone());
        match self.controller.try_resolve(&key) {
            Some(record) => match record.kind {
                EventKind::SignalReceived { value, .. } => Ok(value),
                other => Err(divergence(
                    other.name().to_string(),
                    format!("signal value on {name}"),
                )),
            },
            None => Err(WaitError::Interrupt(self.controller.park())),
        }
    }

    /// Consume every signal value currently buffered on a channel
    /// without suspending. Never blocks; an empty channel yields an
    /// empty vec.
    ///
    /// The first run records the drain's high-water mark so a replayed
    /// drain sees exactly the values the original saw, even if more
    /// arrived since.
    pub fn drain_signals(&mut self, name: &SignalName) -> Vec<serde_json::Value> {
        let up_to = match self.controller.engine_mut().pop_drain_marker(name) {
            Some(recorded) => recorded,
            None => {
                let mark = self.controller.engine().last_sequence();
                self.controller.batch_mut().buffer(Command::DrainSignals {
                    name: name.clone(),
                    up_to_seq: mark,
                });
                mark
            }
        };
        let drained = self.controller.engine_mut().drain_up_to(name, up_to);
        self.controller.note_drain();
        drained
            .into_iter()
            .filter_map(|record| match record.kind {
                EventKind::SignalReceived { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }

    // ---- checkpoints ----

    /// Persist an application state snapshot.
    ///
    /// The first run suspends so the snapshot commits atomically with
    /// the buffered batch; replays consume the recorded checkpoint and
    /// fall straight through.
    pub fn checkpoint(&mut self, state: serde_json::Value) -> Result<(), Interrupt> {
        if self.controller.pop_checkpoint().is_some() {
            return Ok(());
        }
        self.pending_checkpoint = Some(state);
        Err(Interrupt::Suspended)
    }

    /// The most recent committed checkpoint, if any
    pub fn latest_checkpoint(&self) -> Option<&serde_json::Value> {
        self.controller
            .engine()
            .latest_checkpoint()
            .map(|(_, state)| state)
    }

    // ---- runner seam ----

    pub(crate) fn take_pending_checkpoint(&mut self) -> Option<serde_json::Value> {
        self.pending_checkpoint.take()
    }

    pub(crate) fn controller(&self) -> &SuspensionController {
        &self.controller
    }

    /// Current command batch (visible for assertions)
    pub fn batch(&self) -> &CommandBatch {
        self.controller.batch()
    }

    pub fn into_batch(self) -> CommandBatch {
        self.controller.into_batch()
    }
}

fn divergence(expected: String, requested: String) -> WaitError {
    WaitError::Divergence(ReplayDivergence {
        expected,
        requested,
    })
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
