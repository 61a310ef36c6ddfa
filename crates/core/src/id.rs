// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation and deterministic derivation
//!
//! Two distinct flavors. Trigger-time ids (executions created from the
//! outside) are random and minted by the dispatcher through `IdGen`.
//! Ids for anything scheduled *during* an execution are derived from
//! `(execution, segment, sequence-within-segment)` so that a replayed
//! schedule call names the exact same resource instead of a new one.

use crate::execution::ExecutionId;
use crate::task::{PromiseId, TaskId, TimerId};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of hex characters kept from the digest
const DERIVED_ID_LEN: usize = 32;

fn derive(tag: &str, execution_id: &ExecutionId, segment: u64, seq: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    hasher.update([0u8]);
    hasher.update(execution_id.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(segment.to_be_bytes());
    hasher.update(seq.to_be_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..DERIVED_ID_LEN].to_string()
}

/// Derived id for a task scheduled at a given call slot
pub fn derive_task_id(execution_id: &ExecutionId, segment: u64, seq: u32) -> TaskId {
    TaskId(derive("task", execution_id, segment, seq))
}

/// Derived id for a timer started at a given call slot
pub fn derive_timer_id(execution_id: &ExecutionId, segment: u64, seq: u32) -> TimerId {
    TimerId(derive("timer", execution_id, segment, seq))
}

/// Derived id for a promise created at a given call slot
pub fn derive_promise_id(execution_id: &ExecutionId, segment: u64, seq: u32) -> PromiseId {
    PromiseId(derive("promise", execution_id, segment, seq))
}

/// Derived id for a child execution spawned at a given call slot
pub fn derive_child_id(execution_id: &ExecutionId, segment: u64, seq: u32) -> ExecutionId {
    ExecutionId(derive("child", execution_id, segment, seq))
}

/// Mints fresh ids at trigger time. Replay never calls this: anything
/// scheduled from inside an execution gets a derived id instead.
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

/// Random v4 UUIDs for production hosts
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Counting ids for tests; clones share the counter so every mint is
/// unique across the whole fixture
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        SequentialIdGen {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        format!(
            "{}-{}",
            self.prefix,
            self.counter.fetch_add(1, Ordering::SeqCst)
        )
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        SequentialIdGen::new("id")
    }
}
