// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command batch: atomic unit of durability
//!
//! Commands buffered between two suspension points commit in one
//! append keyed by the expected log tail. A transport failure leaves
//! the buffer intact for retry; a conflict means this instance is a
//! stale writer and must be abandoned.

use crate::error::CommitError;
use tidal_core::{Command, EventKind, ExecutionId, TaskId};
use tidal_dispatch::Dispatcher;

/// Buffered effects awaiting one atomic commit
#[derive(Debug)]
pub struct CommandBatch {
    execution_id: ExecutionId,
    /// Tail sequence this writer last observed
    expected_tail: u64,
    commands: Vec<Command>,
}

impl CommandBatch {
    pub fn new(execution_id: ExecutionId, expected_tail: u64) -> Self {
        CommandBatch {
            execution_id,
            expected_tail,
            commands: Vec::new(),
        }
    }

    /// Buffer one command; pure, no I/O
    pub fn buffer(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether a cancel for this task is already buffered
    pub fn contains_cancel(&self, task_id: &TaskId) -> bool {
        self.commands
            .iter()
            .any(|c| matches!(c, Command::CancelTask { task_id: id } if id == task_id))
    }

    /// Drop all buffered commands without committing them.
    ///
    /// Used when the execution terminates by failure or cancellation:
    /// effects requested after the last suspension point never happened.
    pub fn discard(&mut self) {
        self.commands.clear();
    }

    pub fn expected_tail(&self) -> u64 {
        self.expected_tail
    }

    /// Commit the batch as one atomic append, optionally with a
    /// checkpoint snapshot and a terminal event at the end.
    ///
    /// On success the buffer is cleared and the expected tail advances.
    /// On a transport error the buffer is retained so the same commit
    /// can be retried without re-running the handler.
    pub async fn commit<D>(
        &mut self,
        dispatcher: &D,
        checkpoint: Option<serde_json::Value>,
        terminal: Option<EventKind>,
    ) -> Result<u64, CommitError>
    where
        D: Dispatcher + ?Sized,
    {
        let mut events: Vec<EventKind> = self
            .commands
            .iter()
            .cloned()
            .map(Command::into_event)
            .collect();
        if let Some(state) = checkpoint {
            events.push(EventKind::Checkpoint { state });
        }
        if let Some(event) = terminal {
            events.push(event);
        }
        if events.is_empty() {
            return Ok(self.expected_tail);
        }

        tracing::debug!(
            execution = %self.execution_id,
            expected_tail = self.expected_tail,
            events = events.len(),
            "committing batch"
        );
        let tail = dispatcher
            .append_events(&self.execution_id, self.expected_tail, events)
            .await?;
        self.commands.clear();
        self.expected_tail = tail;
        Ok(tail)
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
