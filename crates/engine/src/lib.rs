// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tidal-engine: the replay-based execution engine
//!
//! Execution code runs as a deterministic handler over an
//! [`ExecutionContext`]. Every effect the handler requests is either
//! fast-forwarded from recorded history or buffered as a command; when
//! the handler hits a wait with no recorded resolution it returns
//! [`tidal_core::Interrupt::Suspended`] through `?` and the [`Runner`]
//! commits the buffered batch atomically before parking the execution.
//!
//! Nothing in the handler path performs I/O. All I/O happens in the
//! runner, through the dispatcher boundary.

pub mod batch;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod registry;
pub mod replay;
pub mod runner;
pub mod suspension;

pub use batch::CommandBatch;
pub use context::ExecutionContext;
pub use coordinator::WaitOutcome;
pub use error::{CommitError, ExecuteError, RunnerError, WaitError};
pub use registry::{ExecutionHandler, HandlerRegistry, RegistryBuilder};
pub use replay::{CategoryKey, ReplayEngine};
pub use runner::{RunOutcome, Runner};
pub use suspension::{SuspensionController, WaitState};
