// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Control-signal assembly.
//!
//! [`Component`] is a single named signal primitive (envelope or carrier).
//! [`Instruction`] aggregates components per drive channel into the control
//! specification for one gate.

pub mod envelope;
pub mod instruction;

pub use envelope::{Component, ComponentKind, Shape};
pub use instruction::Instruction;
