// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! qoctl — quantum optimal-control optimizer
//!
//! Tunes control-pulse parameters to minimize a physics-derived goal
//! function (gate infidelity), with pluggable minimization algorithms,
//! durable run logs, and best-point checkpointing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              Optimizer core              │
//! │  best tracking · gradient cache · logs   │
//! ├─────────────────────┬────────────────────┤
//! │  Algorithms         │  Output sinks      │
//! │  (L-BFGS, N-M)      │  (files, counters) │
//! ├─────────────────────┴────────────────────┤
//! │          ParameterMap (opt space)        │
//! ├──────────────────────────────────────────┤
//! │     Simulation backend (GoalBackend)     │
//! │  Instruction → waveforms → propagators   │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`params`]: Named bounded parameters and the flat opt-space vector
//! - [`signal`]: Envelope shapes, carriers, and per-gate instructions
//! - [`sim`]: Simulation backends and the goal contract
//! - [`optim`]: The optimization loop, algorithms, and run logs
//! - [`output`]: Periodic output sinks
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod optim;
pub mod output;
pub mod params;
pub mod signal;
pub mod sim;

pub use config::Config;
pub use error::{Error, Result};
pub use optim::{OptimizationStatus, Optimizer, RunLog};
pub use params::{ParameterMap, Quantity};
pub use signal::Instruction;
pub use sim::{Experiment, GoalBackend};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
