// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replay engine: index of recorded history
//!
//! On every run cycle the handler is executed from the top against the
//! full recorded history. The replay engine indexes that history so
//! each schedule call can find its recorded counterpart and each wait
//! can consume its recorded resolution in order. Consumption is purely
//! in-memory; the underlying log is never touched.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use tidal_core::{EventKind, EventRecord, ExecutionId, PromiseId, SignalName, TaskId, TimerId};

/// Identity of one wait/schedule slot, namespaced by category so a
/// task and a timer deriving the same hex string can never collide
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryKey {
    Task(TaskId),
    Signal(SignalName),
    Promise(PromiseId),
    Timer(TimerId),
    Child(ExecutionId),
}

impl std::fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryKey::Task(id) => write!(f, "task:{id}"),
            CategoryKey::Signal(name) => write!(f, "signal:{name}"),
            CategoryKey::Promise(id) => write!(f, "promise:{id}"),
            CategoryKey::Timer(id) => write!(f, "timer:{id}"),
            CategoryKey::Child(id) => write!(f, "child:{id}"),
        }
    }
}

/// Indexed view of one execution's recorded history
#[derive(Debug, Default)]
pub struct ReplayEngine {
    /// Schedule-type events, keyed by the derived id they carry
    schedules: HashMap<CategoryKey, EventRecord>,
    /// Resolution-type events, FIFO per key (signals queue multiple)
    resolutions: HashMap<CategoryKey, VecDeque<EventRecord>>,
    /// Checkpoint events in order, consumed positionally
    checkpoints: VecDeque<EventRecord>,
    latest_checkpoint: Option<(u64, serde_json::Value)>,
    /// Recorded drain high-water marks, FIFO per signal name
    drains: HashMap<SignalName, VecDeque<u64>>,
    cancel_requested: HashSet<TaskId>,
    cancellation: Option<Option<String>>,
    started_at: DateTime<Utc>,
    last_consumed_at: DateTime<Utc>,
    last_sequence: u64,
    closed: bool,
}

impl ReplayEngine {
    /// Index a full ordered history
    pub fn new(history: &[EventRecord]) -> Self {
        let mut engine = ReplayEngine {
            started_at: DateTime::UNIX_EPOCH,
            last_consumed_at: DateTime::UNIX_EPOCH,
            ..ReplayEngine::default()
        };
        for record in history {
            engine.last_sequence = record.sequence;
            match &record.kind {
                EventKind::ExecutionStarted { .. } => {
                    engine.started_at = record.recorded_at;
                    engine.last_consumed_at = record.recorded_at;
                }
                EventKind::TaskScheduled { task_id, .. } => {
                    engine
                        .schedules
                        .insert(CategoryKey::Task(task_id.clone()), record.clone());
                }
                EventKind::TaskCompleted { task_id, .. }
                | EventKind::TaskFailed { task_id, .. } => {
                    engine.queue(CategoryKey::Task(task_id.clone()), record);
                }
                EventKind::TaskCancelRequested { task_id } => {
                    engine.cancel_requested.insert(task_id.clone());
                }
                EventKind::SignalReceived { name, .. } => {
                    engine.queue(CategoryKey::Signal(name.clone()), record);
                }
                EventKind::SignalsDrained { name, up_to_seq } => {
                    engine
                        .drains
                        .entry(name.clone())
                        .or_default()
                        .push_back(*up_to_seq);
                }
                EventKind::PromiseCreated { promise_id } => {
                    engine
                        .schedules
                        .insert(CategoryKey::Promise(promise_id.clone()), record.clone());
                }
                EventKind::PromiseResolved { promise_id, .. }
                | EventKind::PromiseRejected { promise_id, .. } => {
                    engine.queue(CategoryKey::Promise(promise_id.clone()), record);
                }
                EventKind::TimerStarted { timer_id, .. } => {
                    engine
                        .schedules
                        .insert(CategoryKey::Timer(timer_id.clone()), record.clone());
                }
                EventKind::TimerFired { timer_id } => {
                    engine.queue(CategoryKey::Timer(timer_id.clone()), record);
                }
                EventKind::ChildExecutionStarted { child_id, .. } => {
                    engine
                        .schedules
                        .insert(CategoryKey::Child(child_id.clone()), record.clone());
                }
                EventKind::ChildExecutionCompleted { child_id, .. }
                | EventKind::ChildExecutionFailed { child_id, .. } => {
                    engine.queue(CategoryKey::Child(child_id.clone()), record);
                }
                EventKind::Checkpoint { state } => {
                    engine.latest_checkpoint = Some((record.sequence, state.clone()));
                    engine.checkpoints.push_back(record.clone());
                }
                EventKind::CancellationRequested { reason } => {
                    engine.cancellation = Some(reason.clone());
                }
                EventKind::ExecutionCompleted { .. }
                | EventKind::ExecutionFailed { .. }
                | EventKind::ExecutionCancelled => {
                    engine.closed = true;
                }
            }
        }
        engine
    }

    fn queue(&mut self, key: CategoryKey, record: &EventRecord) {
        self.resolutions
            .entry(key)
            .or_default()
            .push_back(record.clone());
    }

    /// The recorded schedule event for a slot, if this slot already ran
    pub fn recorded_schedule(&self, key: &CategoryKey) -> Option<&EventRecord> {
        self.schedules.get(key)
    }

    /// The next unconsumed resolution for a slot, without consuming it
    pub fn peek(&self, key: &CategoryKey) -> Option<&EventRecord> {
        self.resolutions.get(key).and_then(VecDeque::front)
    }

    /// Consume the next resolution for a slot. Advances logical time.
    pub fn pop_next(&mut self, key: &CategoryKey) -> Option<EventRecord> {
        let record = self.resolutions.get_mut(key)?.pop_front()?;
        self.last_consumed_at = record.recorded_at;
        Some(record)
    }

    /// Unconsumed resolutions queued for a slot
    pub fn pending_count(&self, key: &CategoryKey) -> usize {
        self.resolutions.get(key).map_or(0, VecDeque::len)
    }

    /// Consume the next recorded drain high-water mark for a signal
    pub fn pop_drain_marker(&mut self, name: &SignalName) -> Option<u64> {
        self.drains.get_mut(name)?.pop_front()
    }

    /// Consume every queued signal value at or below `up_to_seq`
    pub fn drain_up_to(&mut self, name: &SignalName, up_to_seq: u64) -> Vec<EventRecord> {
        let key = CategoryKey::Signal(name.clone());
        let mut drained = Vec::new();
        while let Some(front) = self.peek(&key) {
            if front.sequence > up_to_seq {
                break;
            }
            if let Some(record) = self.pop_next(&key) {
                drained.push(record);
            }
        }
        drained
    }

    /// Consume the next recorded checkpoint, positionally
    pub fn pop_checkpoint(&mut self) -> Option<EventRecord> {
        let record = self.checkpoints.pop_front()?;
        self.last_consumed_at = record.recorded_at;
        Some(record)
    }

    /// The most recent checkpoint in the whole history
    pub fn latest_checkpoint(&self) -> Option<(u64, &serde_json::Value)> {
        self.latest_checkpoint
            .as_ref()
            .map(|(seq, state)| (*seq, state))
    }

    /// Whether a cancellation request is on record
    pub fn cancellation_requested(&self) -> bool {
        self.cancellation.is_some()
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation.as_ref()?.as_deref()
    }

    /// Whether a best-effort cancel was already recorded for this task
    pub fn cancel_requested(&self, task_id: &TaskId) -> bool {
        self.cancel_requested.contains(task_id)
    }

    /// Sequence of the last recorded event (the optimistic append key)
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Deterministic "now": the recorded time of the last consumed
    /// event. Identical on every replay of the same prefix.
    pub fn logical_now(&self) -> DateTime<Utc> {
        self.last_consumed_at
    }

    /// Whether the history ends in a terminal event
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
