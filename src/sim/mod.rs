// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Simulation backends: everything the optimizer needs to turn a parameter
//! vector into a goal value.
//!
//! The core trait is [`GoalBackend`]. The propagator-based [`Experiment`]
//! is the production backend; [`AnalyticBackend`] provides closed-form
//! goals for algorithm and optimizer tests.
//!
//! # Modules
//!
//! - [`expm`]: Matrix exponential via scaling-and-squaring + Padé(13)
//! - [`propagation`]: Per-slice propagators, chains, fidelity, adjoint gradient
//! - [`experiment`]: Instruction-driven gate simulation backend
//! - [`analytic`]: Closed-form reference backends

pub mod analytic;
pub mod experiment;
pub mod expm;
pub mod propagation;

pub use analytic::AnalyticBackend;
pub use experiment::{Experiment, Model};
pub use expm::matrix_exp;

use ndarray::{Array1, ArrayView1};
use num_complex::Complex64;

use crate::error::{BackendError, Result};
use crate::params::ParameterMap;
use crate::signal::Instruction;

/// Parameter vector handed to the goal wrapper.
///
/// The variant decides what happens at the return boundary: `Plain` input
/// yields a plain scalar, `Tracked` input keeps the gradient attached so
/// downstream consumers can read it without re-evaluating.
#[derive(Debug, Clone)]
pub enum ParamVector {
    /// Plain numeric vector; evaluation returns a bare scalar.
    Plain(Array1<f64>),
    /// Gradient-tracked vector; evaluation returns the goal with its
    /// gradient attached.
    Tracked(Array1<f64>),
}

impl ParamVector {
    /// The numeric values regardless of variant.
    pub fn values(&self) -> ArrayView1<'_, f64> {
        match self {
            ParamVector::Plain(x) | ParamVector::Tracked(x) => x.view(),
        }
    }

    /// True for the gradient-tracked variant.
    pub fn is_tracked(&self) -> bool {
        matches!(self, ParamVector::Tracked(_))
    }
}

/// Goal value returned by the goal wrapper.
#[derive(Debug, Clone)]
pub enum GoalValue {
    /// Bare scalar (plain input path).
    Scalar(f64),
    /// Scalar with the gradient attached (tracked input path).
    Tracked { value: f64, gradient: Array1<f64> },
}

impl GoalValue {
    /// The scalar goal regardless of variant.
    pub fn value(&self) -> f64 {
        match self {
            GoalValue::Scalar(v) => *v,
            GoalValue::Tracked { value, .. } => *value,
        }
    }

    /// The attached gradient, if any.
    pub fn gradient(&self) -> Option<&Array1<f64>> {
        match self {
            GoalValue::Scalar(_) => None,
            GoalValue::Tracked { gradient, .. } => Some(gradient),
        }
    }
}

/// One row of a time-resolved dynamics table.
#[derive(Debug, Clone)]
pub struct DynamicsSample {
    /// Time in seconds.
    pub time: f64,
    /// State populations at that time.
    pub populations: Vec<f64>,
}

/// Contract between the optimizer and the simulation.
///
/// `goal` must be callable repeatedly with updated parameter maps. The
/// gradient path is opt-in: backends that cannot differentiate their goal
/// keep the default and fail with `NotDifferentiable`. Gradients are
/// reported with respect to the *physical* values of the map's opt
/// parameters, in opt-map order; the optimizer applies bounds scaling.
pub trait GoalBackend {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Evaluate the goal for the parameter map's current values.
    fn goal(&mut self, pmap: &ParameterMap) -> Result<f64>;

    /// Evaluate the goal and its gradient.
    fn goal_with_gradient(&mut self, pmap: &ParameterMap) -> Result<(f64, Array1<f64>)> {
        let _ = pmap;
        Err(BackendError::NotDifferentiable(self.name().to_string()).into())
    }

    /// Total propagator of the last evaluation, if the backend keeps one.
    fn propagator(&self) -> Option<&ndarray::Array2<Complex64>> {
        None
    }

    /// Time-resolved populations of the last evaluation, if available.
    fn dynamics(&self) -> Option<Vec<DynamicsSample>> {
        None
    }

    /// The instruction being optimized, if the backend is pulse-driven.
    fn instruction(&self) -> Option<&Instruction> {
        None
    }
}
