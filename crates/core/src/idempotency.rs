// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency key records
//!
//! A caller-supplied key maps to at most one live target per tenant.
//! Re-claiming with the same target id is a no-op success; with a
//! different target id it is a conflict. Expired records are
//! reclaimable. The dispatcher persists the index; the pure claim
//! logic lives here so it has one implementation and one test suite.

use crate::error::ConflictError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tenant scope for idempotency keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant(pub String);

impl Tenant {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Tenant {
    fn from(s: &str) -> Self {
        Tenant(s.to_string())
    }
}

/// A fully-qualified idempotency key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub tenant: Tenant,
    pub key: String,
}

impl IdempotencyKey {
    pub fn new(tenant: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            tenant: Tenant(tenant.into()),
            key: key.into(),
        }
    }
}

/// What a live key points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub target_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Outcome of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The key was free (or expired) and is now bound to the target
    Created,
    /// The key was already bound to this same target
    Existing,
}

/// In-memory `(tenant, key) -> target` index
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    records: HashMap<IdempotencyKey, KeyRecord>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a key for a target.
    ///
    /// At most one live record per key: same target is a no-op
    /// success, different target is a conflict, expired records are
    /// replaced.
    pub fn claim(
        &mut self,
        key: IdempotencyKey,
        target_id: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, ConflictError> {
        let target_id = target_id.into();
        match self.records.get(&key) {
            Some(record) if !record.is_expired(now) => {
                if record.target_id == target_id {
                    Ok(ClaimOutcome::Existing)
                } else {
                    Err(ConflictError::KeyClaimed {
                        tenant: key.tenant,
                        key: key.key,
                        existing_target: record.target_id.clone(),
                    })
                }
            }
            _ => {
                self.records.insert(
                    key,
                    KeyRecord {
                        target_id,
                        expires_at,
                    },
                );
                Ok(ClaimOutcome::Created)
            }
        }
    }

    /// Look up the live target for a key, ignoring expired records
    pub fn get(&self, key: &IdempotencyKey, now: DateTime<Utc>) -> Option<&KeyRecord> {
        self.records.get(key).filter(|r| !r.is_expired(now))
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
