// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal names
//!
//! A signal is a named, ordered, multi-value input channel per
//! execution. Each `(execution, name)` pair is an independent FIFO
//! queue; values delivered before any wait call simply buffer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validated signal channel name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalName(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSignalName {
    #[error("signal name must not be empty")]
    Empty,
    #[error("signal name {0:?} contains an invalid character")]
    InvalidCharacter(String),
}

impl SignalName {
    /// Validate and wrap a signal name.
    ///
    /// Colons are reserved for event name namespacing and whitespace is
    /// rejected to keep names safe as log/index keys.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidSignalName> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidSignalName::Empty);
        }
        if name.chars().any(|c| c == ':' || c.is_whitespace()) {
            return Err(InvalidSignalName::InvalidCharacter(name));
        }
        Ok(SignalName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SignalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
