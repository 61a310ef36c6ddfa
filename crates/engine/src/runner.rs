// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner: the replay/advance cycle
//!
//! One cycle loads the full history, replays the handler over it, and
//! commits whatever the handler produced: a suspended batch, a
//! checkpoint, or a terminal event. The cycle is idempotent - running
//! a terminal execution is a read, and a stale cycle loses its commit
//! to the optimistic append and changes nothing.

use crate::context::ExecutionContext;
use crate::error::{ExecuteError, RunnerError};
use crate::registry::HandlerRegistry;
use crate::replay::ReplayEngine;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tidal_core::{
    EventKind, ExecutionId, ExecutionKind, ExecutionStatus, Interrupt, TaskFailure, Tenant,
};
use tidal_dispatch::Dispatcher;

/// Outcome of one run cycle
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(serde_json::Value),
    /// Parked; will be woken when new events arrive
    Suspended,
    Failed(TaskFailure),
    Cancelled,
}

/// Drives executions against a dispatcher and a frozen registry
pub struct Runner<D: Dispatcher> {
    dispatcher: Arc<D>,
    registry: Arc<HandlerRegistry>,
}

impl<D: Dispatcher> Runner<D> {
    pub fn new(dispatcher: Arc<D>, registry: Arc<HandlerRegistry>) -> Self {
        Runner {
            dispatcher,
            registry,
        }
    }

    pub fn dispatcher(&self) -> &Arc<D> {
        &self.dispatcher
    }

    /// Trigger an execution, idempotently when a key is given.
    ///
    /// Returns the execution id and whether this call created it. Does
    /// not run a cycle; call [`Runner::run_once`] to advance it.
    pub async fn trigger(
        &self,
        tenant: &Tenant,
        kind: &ExecutionKind,
        input: serde_json::Value,
        idempotency_key: Option<&str>,
        key_expires_at: Option<DateTime<Utc>>,
    ) -> Result<(ExecutionId, bool), RunnerError> {
        if !self.registry.contains(kind) {
            return Err(RunnerError::UnknownKind(kind.clone()));
        }
        let (execution_id, created) = self
            .dispatcher
            .claim_or_create_execution(tenant, idempotency_key, key_expires_at, kind, input)
            .await?;
        tracing::info!(execution = %execution_id, kind = %kind, created, "triggered");
        Ok((execution_id, created))
    }

    /// Run one replay/advance cycle for an execution.
    ///
    /// Terminal executions short-circuit to their recorded outcome.
    /// Divergence never appends anything; the history stays intact for
    /// inspection.
    pub async fn run_once(&self, execution_id: &ExecutionId) -> Result<RunOutcome, RunnerError> {
        let execution = self.dispatcher.execution(execution_id).await?;
        match execution.status {
            ExecutionStatus::Completed => {
                return Ok(RunOutcome::Completed(
                    execution.output.unwrap_or(serde_json::Value::Null),
                ));
            }
            ExecutionStatus::Failed => {
                return Ok(RunOutcome::Failed(execution.error.unwrap_or_else(|| {
                    TaskFailure::new("unknown", "failed without a recorded error")
                })));
            }
            ExecutionStatus::Cancelled => return Ok(RunOutcome::Cancelled),
            _ => {}
        }

        let handler = self
            .registry
            .get(&execution.kind)
            .ok_or_else(|| RunnerError::UnknownKind(execution.kind.clone()))?;

        let history = self.dispatcher.load_history(execution_id).await?;
        let engine = ReplayEngine::new(&history);
        let mut ctx = ExecutionContext::new(execution_id.clone(), engine);

        let span = tracing::info_span!(
            "cycle",
            execution = %execution_id,
            kind = %execution.kind,
            tail = history.len(),
        );
        let result = span.in_scope(|| handler.execute(&mut ctx, &execution.input));

        let checkpoint = ctx.take_pending_checkpoint();
        let mut batch = ctx.into_batch();

        match result {
            Ok(output) => {
                batch
                    .commit(
                        self.dispatcher.as_ref(),
                        checkpoint,
                        Some(EventKind::ExecutionCompleted {
                            output: output.clone(),
                        }),
                    )
                    .await?;
                tracing::info!(execution = %execution_id, "completed");
                Ok(RunOutcome::Completed(output))
            }
            Err(ExecuteError::Interrupt(Interrupt::Suspended)) => {
                tracing::debug!(
                    execution = %execution_id,
                    commands = batch.len(),
                    "suspending"
                );
                batch
                    .commit(self.dispatcher.as_ref(), checkpoint, None)
                    .await?;
                Ok(RunOutcome::Suspended)
            }
            Err(ExecuteError::Interrupt(Interrupt::Cancelled)) => {
                // Effects requested after the last commit never happened
                batch.discard();
                batch
                    .commit(
                        self.dispatcher.as_ref(),
                        None,
                        Some(EventKind::ExecutionCancelled),
                    )
                    .await?;
                tracing::info!(execution = %execution_id, "cancelled");
                Ok(RunOutcome::Cancelled)
            }
            Err(ExecuteError::Failure(failure)) => {
                batch.discard();
                batch
                    .commit(
                        self.dispatcher.as_ref(),
                        None,
                        Some(EventKind::ExecutionFailed {
                            error: failure.clone(),
                        }),
                    )
                    .await?;
                tracing::warn!(execution = %execution_id, code = %failure.code, "failed");
                Ok(RunOutcome::Failed(failure))
            }
            Err(ExecuteError::Divergence(divergence)) => {
                tracing::error!(
                    execution = %execution_id,
                    expected = %divergence.expected,
                    requested = %divergence.requested,
                    "replay divergence"
                );
                Err(RunnerError::Divergence(divergence))
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
