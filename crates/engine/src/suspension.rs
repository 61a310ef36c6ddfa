// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Suspension controller
//!
//! Tracks the wait state of every slot the handler has touched this
//! cycle, owns the command batch, and keeps the `(segment,
//! seq-in-segment)` counters that make derived ids replay-stable. The
//! segment advances on every consumed resolution, drain, and
//! checkpoint, so both counters are a pure function of the code path
//! and the consumed history prefix.

use crate::batch::CommandBatch;
use crate::replay::{CategoryKey, ReplayEngine};
use std::collections::HashMap;
use tidal_core::{EventKind, EventRecord, ExecutionId, Interrupt};

/// Lifecycle of one wait slot within a run cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Scheduled (recorded or buffered), resolution not yet consumed
    Requested,
    /// Resolved successfully
    Resolved,
    /// Resolved with an application failure
    Failed,
    /// Lost a select race; best-effort cancel requested
    Cancelled,
}

impl WaitState {
    /// Only `Requested` advances; resolved outcomes are final, so a
    /// cancel arriving after a resolution never overwrites it
    pub fn advance(self, to: WaitState) -> WaitState {
        match self {
            WaitState::Requested => to,
            _ => self,
        }
    }
}

/// Per-cycle wait bookkeeping plus the deterministic id counters
#[derive(Debug)]
pub struct SuspensionController {
    engine: ReplayEngine,
    batch: CommandBatch,
    waits: HashMap<CategoryKey, WaitState>,
    /// Resolutions already consumed this cycle; repeated waits on the
    /// same single-resolution slot observe the same outcome. Signal
    /// channels never land here.
    resolved: HashMap<CategoryKey, EventRecord>,
    segment: u64,
    seq_in_segment: u32,
}

impl SuspensionController {
    pub fn new(execution_id: ExecutionId, engine: ReplayEngine) -> Self {
        let batch = CommandBatch::new(execution_id, engine.last_sequence());
        SuspensionController {
            engine,
            batch,
            waits: HashMap::new(),
            resolved: HashMap::new(),
            segment: 0,
            seq_in_segment: 0,
        }
    }

    /// Claim the next schedule slot: `(segment, seq-in-segment)`
    pub fn next_slot(&mut self) -> (u64, u32) {
        let slot = (self.segment, self.seq_in_segment);
        self.seq_in_segment += 1;
        slot
    }

    fn bump_segment(&mut self) {
        self.segment += 1;
        self.seq_in_segment = 0;
    }

    /// Record that a slot is in flight
    pub fn register(&mut self, key: CategoryKey) {
        self.waits.entry(key).or_insert(WaitState::Requested);
    }

    pub fn mark(&mut self, key: CategoryKey, to: WaitState) {
        let state = self.waits.entry(key).or_insert(WaitState::Requested);
        *state = state.advance(to);
    }

    pub fn wait_state(&self, key: &CategoryKey) -> Option<WaitState> {
        self.waits.get(key).copied()
    }

    /// Consume the resolution for a slot if one is available.
    ///
    /// A fresh consume advances the segment (a new replay epoch starts
    /// after every resolved wait). A repeat wait on an already-consumed
    /// single-resolution slot (task, timer, promise, child) returns the
    /// cached outcome without advancing anything. Signal slots are
    /// multi-value FIFO channels keyed by name, so every wait consumes
    /// the next queued value instead.
    pub fn try_resolve(&mut self, key: &CategoryKey) -> Option<EventRecord> {
        if single_resolution(key) {
            if let Some(record) = self.resolved.get(key) {
                return Some(record.clone());
            }
        }
        let record = self.engine.pop_next(key)?;
        self.bump_segment();
        let outcome = match &record.kind {
            EventKind::TaskFailed { .. }
            | EventKind::PromiseRejected { .. }
            | EventKind::ChildExecutionFailed { .. } => WaitState::Failed,
            _ => WaitState::Resolved,
        };
        self.mark(key.clone(), outcome);
        if single_resolution(key) {
            self.resolved.insert(key.clone(), record.clone());
        }
        Some(record)
    }

    /// Sequence of the next resolution without consuming it (for
    /// signals always the head of the queue, never a cached record)
    pub fn resolved_sequence(&self, key: &CategoryKey) -> Option<u64> {
        if let Some(record) = self.resolved.get(key) {
            return Some(record.sequence);
        }
        self.engine.peek(key).map(|r| r.sequence)
    }

    /// The next resolution record without consuming it
    pub fn peek_resolution(&self, key: &CategoryKey) -> Option<&EventRecord> {
        self.resolved.get(key).or_else(|| self.engine.peek(key))
    }

    /// Consume the next recorded checkpoint; a checkpoint is a
    /// suspension point, so it advances the segment like a resolution
    pub fn pop_checkpoint(&mut self) -> Option<EventRecord> {
        let record = self.engine.pop_checkpoint()?;
        self.bump_segment();
        Some(record)
    }

    /// A drain call is one consume regardless of how many values it
    /// yields; the segment advances exactly once
    pub fn note_drain(&mut self) {
        self.bump_segment();
    }

    /// The interrupt to propagate when a wait has no resolution:
    /// cancellation, once requested, is observed at the next miss
    pub fn park(&self) -> Interrupt {
        if self.engine.cancellation_requested() {
            Interrupt::Cancelled
        } else {
            Interrupt::Suspended
        }
    }

    pub fn segment(&self) -> u64 {
        self.segment
    }

    pub fn engine(&self) -> &ReplayEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ReplayEngine {
        &mut self.engine
    }

    pub fn batch(&self) -> &CommandBatch {
        &self.batch
    }

    pub fn batch_mut(&mut self) -> &mut CommandBatch {
        &mut self.batch
    }

    pub fn into_batch(self) -> CommandBatch {
        self.batch
    }
}

/// Whether a slot resolves at most once. Only these participate in
/// the resolved cache; a signal name answers many waits.
fn single_resolution(key: &CategoryKey) -> bool {
    !matches!(key, CategoryKey::Signal(_))
}

#[cfg(test)]
#[path = "suspension_tests.rs"]
mod tests;
