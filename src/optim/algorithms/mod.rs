// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pluggable minimization algorithms.
//!
//! An [`Algorithm`] minimizes an [`Objective`] from an initial guess. The
//! optimizer hands algorithms an objective adapter, so algorithms never see
//! the simulation backend or the parameter map directly — only opt-space
//! vectors and scalars.
//!
//! Gradient-free algorithms must never call [`Objective::gradient`];
//! gradient-based ones should query value and gradient in lockstep so the
//! optimizer's one-shot gradient cache stays drained.

pub mod lbfgs;
pub mod nelder_mead;

pub use lbfgs::Lbfgs;
pub use nelder_mead::NelderMead;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{OptimError, Result};

/// Objective contract handed to algorithms.
pub trait Objective {
    /// Goal value at `x`.
    fn evaluate(&mut self, x: &ArrayView1<f64>) -> Result<f64>;

    /// Gradient at `x`.
    ///
    /// For the optimizer's autograd adapter this is a one-shot cache
    /// lookup: it succeeds once per preceding `evaluate` of the same point.
    fn gradient(&mut self, x: &ArrayView1<f64>) -> Result<Array1<f64>>;
}

/// Options shared by the provided algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmOptions {
    /// Maximum number of iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Convergence tolerance on the goal change.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Convergence tolerance on the gradient norm (gradient-based only).
    #[serde(default = "default_gradient_tolerance")]
    pub gradient_tolerance: f64,

    /// Number of curvature pairs kept by L-BFGS.
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,

    /// Initial simplex step in opt-space units (Nelder-Mead only).
    #[serde(default = "default_initial_step")]
    pub initial_step: f64,
}

impl Default for AlgorithmOptions {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            gradient_tolerance: default_gradient_tolerance(),
            memory_size: default_memory_size(),
            initial_step: default_initial_step(),
        }
    }
}

fn default_max_iterations() -> usize {
    200
}

fn default_tolerance() -> f64 {
    1e-10
}

fn default_gradient_tolerance() -> f64 {
    1e-8
}

fn default_memory_size() -> usize {
    10
}

fn default_initial_step() -> f64 {
    0.1
}

/// Result of a minimization run.
#[derive(Debug, Clone)]
pub struct MinimizeResult {
    /// Final iterate in opt space.
    pub x: Array1<f64>,
    /// Goal at the final iterate.
    pub goal: f64,
    /// Iterations executed.
    pub iterations: usize,
    /// Whether a convergence criterion was met before the iteration cap.
    pub converged: bool,
}

/// A minimization algorithm.
pub trait Algorithm: std::fmt::Debug {
    /// Algorithm name, as used in configuration.
    fn name(&self) -> &'static str;

    /// True if the algorithm consumes gradients.
    fn uses_gradient(&self) -> bool;

    /// Minimize `objective` starting from `x0`.
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        x0: Array1<f64>,
        options: &AlgorithmOptions,
    ) -> Result<MinimizeResult>;
}

/// Look up an algorithm by its configuration name.
pub fn algorithm_by_name(name: &str) -> Result<Box<dyn Algorithm>> {
    match name {
        "lbfgs" => Ok(Box::new(Lbfgs)),
        "nelder-mead" => Ok(Box::new(NelderMead)),
        other => Err(OptimError::UnknownAlgorithm(other.to_string()).into()),
    }
}

/// The documented default: L-BFGS.
pub fn default_algorithm() -> Box<dyn Algorithm> {
    Box::new(Lbfgs)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_by_name() {
        assert_eq!(algorithm_by_name("lbfgs").unwrap().name(), "lbfgs");
        assert_eq!(
            algorithm_by_name("nelder-mead").unwrap().name(),
            "nelder-mead"
        );
    }

    #[test]
    fn test_algorithm_by_name_unknown() {
        let result = algorithm_by_name("cmaes");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown algorithm"));
    }

    #[test]
    fn test_default_algorithm_is_lbfgs() {
        assert_eq!(default_algorithm().name(), "lbfgs");
        assert!(default_algorithm().uses_gradient());
    }

    #[test]
    fn test_options_defaults() {
        let options = AlgorithmOptions::default();
        assert_eq!(options.max_iterations, 200);
        assert_eq!(options.memory_size, 10);
    }

    #[test]
    fn test_options_deserialize_partial() {
        let options: AlgorithmOptions = serde_yaml::from_str("max_iterations: 50").unwrap();
        assert_eq!(options.max_iterations, 50);
        assert_eq!(options.memory_size, 10);
    }
}
