// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! One-shot gradient cache.
//!
//! The gradient path computes goal and gradient in a single backend call,
//! but array-based algorithms ask for them through two separate callbacks.
//! The cache bridges the two: `evaluate` stores the gradient under the
//! canonical key of its parameter vector, and the algorithm's gradient
//! callback retrieves it with [`pop`](GradientCache::pop).
//!
//! Entries are consumed exactly once. The cache only stays bounded if every
//! stored gradient is eventually popped; algorithms that evaluate without
//! consuming (e.g. value-only line-search probes) leave entries behind.
//! That is the caller's invariant to keep, not enforced here.

use std::collections::HashMap;

use ndarray::{Array1, ArrayView1};

use crate::error::{OptimError, Result};

/// Canonical string key for a parameter vector.
///
/// Uses the round-trippable `{:?}` float formatting, so two vectors share a
/// key exactly when they are bitwise-equal as decimal literals.
pub fn vector_key(x: &ArrayView1<f64>) -> String {
    let parts: Vec<String> = x.iter().map(|v| format!("{:?}", v)).collect();
    format!("[{}]", parts.join(", "))
}

/// Map from canonical parameter-vector keys to cached gradients.
#[derive(Debug, Default)]
pub struct GradientCache {
    entries: HashMap<String, Array1<f64>>,
}

impl GradientCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a gradient under the canonical key of `x`, replacing any
    /// previous entry for the same key.
    pub fn insert(&mut self, x: &ArrayView1<f64>, gradient: Array1<f64>) {
        self.entries.insert(vector_key(x), gradient);
    }

    /// Retrieve and remove the gradient cached for `x`.
    ///
    /// # Errors
    ///
    /// Fails with `GradientNotFound` if no entry exists for the exact key.
    /// Callers that need repeated access must re-request evaluation.
    pub fn pop(&mut self, x: &ArrayView1<f64>) -> Result<Array1<f64>> {
        let key = vector_key(x);
        self.entries
            .remove(&key)
            .ok_or_else(|| OptimError::GradientNotFound(key).into())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no gradients are cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
