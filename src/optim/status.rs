// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-evaluation status snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Initial value of the best-goal tracker.
///
/// A large finite sentinel rather than infinity: any real goal improves on
/// it, and it serializes cleanly into the log files.
pub const GOAL_SENTINEL: f64 = 9_876_543_210.123_456_789;

/// Snapshot of one goal evaluation.
///
/// Overwritten once per evaluation and read by best tracking, the run log,
/// and the output sinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationStatus {
    /// Goal value.
    pub goal: f64,
    /// Physical values of the optimized parameters, keyed by id.
    pub params: BTreeMap<String, f64>,
    /// Flattened opt-space gradient, present on the gradient path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient: Option<Vec<f64>>,
    /// Evaluation counter, 1-based.
    pub evaluation: u64,
    /// Wall-clock time of the evaluation.
    pub time: String,
}
