// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler registry
//!
//! Maps execution kinds to their deterministic handlers. Built once at
//! startup and frozen; the runner resolves kinds against the frozen
//! registry on every cycle.

use crate::context::ExecutionContext;
use crate::error::ExecuteError;
use std::collections::HashMap;
use std::sync::Arc;
use tidal_core::ExecutionKind;

/// A deterministic handler for one execution kind.
///
/// The body must be a pure function of the context and input: no wall
/// clock, no randomness, no outside I/O. Effects go through the
/// context; suspension propagates with `?`.
pub trait ExecutionHandler: Send + Sync {
    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, ExecuteError>;
}

impl<F> ExecutionHandler for F
where
    F: Fn(&mut ExecutionContext, &serde_json::Value) -> Result<serde_json::Value, ExecuteError>
        + Send
        + Sync,
{
    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, ExecuteError> {
        self(ctx, input)
    }
}

/// Builder for the frozen registry
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<ExecutionKind, Arc<dyn ExecutionHandler>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    /// Register a handler for a kind; a second registration for the
    /// same kind replaces the first
    pub fn register(
        mut self,
        kind: impl Into<ExecutionKind>,
        handler: impl ExecutionHandler + 'static,
    ) -> Self {
        self.handlers.insert(kind.into(), Arc::new(handler));
        self
    }

    pub fn freeze(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// Immutable kind-to-handler map
pub struct HandlerRegistry {
    handlers: HashMap<ExecutionKind, Arc<dyn ExecutionHandler>>,
}

impl HandlerRegistry {
    pub fn get(&self, kind: &ExecutionKind) -> Option<Arc<dyn ExecutionHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &ExecutionKind) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ExecutionKind> {
        self.handlers.keys()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
