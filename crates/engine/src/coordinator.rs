// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-wait coordination over the execution context
//!
//! join/select combinators on top of the single-slot waits. All
//! ordering decisions come from recorded event sequences, never from
//! wall-clock arrival, so a replay reproduces the same winner and the
//! same result order.

use crate::context::ExecutionContext;
use crate::error::WaitError;
use crate::replay::CategoryKey;
use crate::suspension::WaitState;
use chrono::Duration;
use tidal_core::{EventKind, TaskFailure, TaskId};

/// Settled outcome of one awaited task
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Completed(serde_json::Value),
    Failed(TaskFailure),
}

impl ExecutionContext {
    /// Wait for every task; outputs in input order. Fails fast on the
    /// first task failure encountered in input order.
    pub fn join_all(&mut self, tasks: &[TaskId]) -> Result<Vec<serde_json::Value>, WaitError> {
        tasks.iter().map(|task| self.wait_task(task)).collect()
    }

    /// Wait for every task and report each outcome, failures included
    pub fn join_settled(&mut self, tasks: &[TaskId]) -> Result<Vec<WaitOutcome>, WaitError> {
        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            match self.wait_task(task) {
                Ok(output) => outcomes.push(WaitOutcome::Completed(output)),
                Err(WaitError::TaskFailed(failure)) => outcomes.push(WaitOutcome::Failed(failure)),
                Err(other) => return Err(other),
            }
        }
        Ok(outcomes)
    }

    /// Wait for the first task to complete successfully.
    ///
    /// The winner is the successful completion with the lowest recorded
    /// sequence. Losers still in flight get a best-effort cancel;
    /// losers that already resolved keep their outcome untouched. If
    /// every task failed, the combined failure is returned.
    pub fn select_ok(
        &mut self,
        tasks: &[TaskId],
    ) -> Result<(TaskId, serde_json::Value), WaitError> {
        let mut winner: Option<(u64, TaskId)> = None;
        let mut unresolved = Vec::new();
        let mut failures = Vec::new();

        for task in tasks {
            let key = CategoryKey::Task(task.clone());
            match self.controller().peek_resolution(&key) {
                Some(record) => match &record.kind {
                    EventKind::TaskCompleted { .. } => {
                        let candidate = (record.sequence, task.clone());
                        let better = match &winner {
                            None => true,
                            Some((seq, _)) => candidate.0 < *seq,
                        };
                        if better {
                            winner = Some(candidate);
                        }
                    }
                    EventKind::TaskFailed { error, .. } => failures.push(error.clone()),
                    _ => {}
                },
                None => unresolved.push(task.clone()),
            }
        }

        if let Some((_, winner_id)) = winner {
            let output = self.wait_task(&winner_id)?;
            for loser in tasks.iter().filter(|t| **t != winner_id) {
                let key = CategoryKey::Task(loser.clone());
                // Resolved losers keep their outcome; only in-flight
                // work gets the cancel request
                if self.controller().peek_resolution(&key).is_none()
                    && self.controller().wait_state(&key) != Some(WaitState::Cancelled)
                {
                    self.cancel_task(loser);
                }
            }
            return Ok((winner_id, output));
        }

        if failures.len() == tasks.len() && !tasks.is_empty() {
            let summary = failures
                .iter()
                .map(|f| f.code.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(WaitError::TaskFailed(TaskFailure::new(
                "all_failed",
                format!("every selected task failed: {summary}"),
            )));
        }

        Err(WaitError::Interrupt(self.controller().park()))
    }

    /// Wait for a task, bounded by a durable timer.
    ///
    /// Which side wins is decided by recorded sequence order: if the
    /// timer fired before the task resolved, the wait times out even
    /// though both are now in history.
    pub fn wait_with_timeout(
        &mut self,
        task_id: &TaskId,
        timeout: Duration,
    ) -> Result<serde_json::Value, WaitError> {
        let timer_id = self.start_timer(timeout);
        let task_seq = self
            .controller()
            .resolved_sequence(&CategoryKey::Task(task_id.clone()));
        let timer_seq = self
            .controller()
            .resolved_sequence(&CategoryKey::Timer(timer_id.clone()));

        match (task_seq, timer_seq) {
            (Some(task), Some(timer)) if timer < task => {
                self.wait_timer(&timer_id)?;
                Err(WaitError::TimedOut)
            }
            (Some(_), _) => self.wait_task(task_id),
            (None, Some(_)) => {
                self.wait_timer(&timer_id)?;
                Err(WaitError::TimedOut)
            }
            (None, None) => Err(WaitError::Interrupt(self.controller().park())),
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
