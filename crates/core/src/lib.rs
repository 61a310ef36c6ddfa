// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tidal-core: data model for the Tidal durable execution core
//!
//! This crate provides:
//! - The immutable event model (the only durable state in the system)
//! - Pure state machines for executions and tasks
//! - Deterministic id derivation for replay-safe scheduling
//! - Idempotency key records and claim semantics
//! - The error taxonomy shared by the engine and dispatcher
//!
//! Nothing in this crate performs I/O.

pub mod clock;
pub mod id;

pub mod command;
pub mod error;
pub mod event;
pub mod execution;
pub mod idempotency;
pub mod signal;
pub mod task;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use command::Command;
pub use error::{ConflictError, DispatchError, Interrupt, ReplayDivergence, TaskFailure};
pub use event::{EventKind, EventRecord};
pub use execution::{Execution, ExecutionId, ExecutionKind, ExecutionStatus, InvalidTransition};
pub use id::{
    derive_child_id, derive_promise_id, derive_task_id, derive_timer_id, IdGen, SequentialIdGen,
    UuidIdGen,
};
pub use idempotency::{ClaimOutcome, IdempotencyKey, KeyIndex, KeyRecord, Tenant};
pub use signal::{InvalidSignalName, SignalName};
pub use task::{PromiseId, TaskId, TaskRecord, TaskStatus, TaskTransition, TimerId};
