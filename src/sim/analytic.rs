// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Closed-form goal backends.
//!
//! These have exact goals and gradients, which makes them the reference
//! problems for algorithm and optimizer tests: the quadratic bowl for
//! convergence basics, Rosenbrock for line-search robustness.

use ndarray::Array1;

use crate::error::{BackendError, Result};
use crate::params::ParameterMap;
use crate::sim::GoalBackend;

#[derive(Debug, Clone)]
enum Kind {
    Quadratic { center: Vec<f64> },
    Rosenbrock,
}

/// Backend with a closed-form goal and gradient.
#[derive(Debug, Clone)]
pub struct AnalyticBackend {
    kind: Kind,
}

impl AnalyticBackend {
    /// `f(v) = Σ (v_i - center_i)²`.
    pub fn quadratic(center: Vec<f64>) -> Self {
        Self {
            kind: Kind::Quadratic { center },
        }
    }

    /// Rosenbrock in two parameters:
    /// `f(x, y) = (1 - x)² + 100 (y - x²)²`.
    pub fn rosenbrock() -> Self {
        Self {
            kind: Kind::Rosenbrock,
        }
    }

    fn values(&self, pmap: &ParameterMap) -> Result<Vec<f64>> {
        let v: Vec<f64> = pmap
            .opt_map()
            .iter()
            .filter_map(|id| pmap.value(id))
            .collect();
        let expected = match &self.kind {
            Kind::Quadratic { center } => center.len(),
            Kind::Rosenbrock => 2,
        };
        if v.len() != expected {
            return Err(BackendError::Dimension {
                expected,
                actual: v.len(),
            }
            .into());
        }
        Ok(v)
    }
}

impl GoalBackend for AnalyticBackend {
    fn name(&self) -> &str {
        match self.kind {
            Kind::Quadratic { .. } => "quadratic",
            Kind::Rosenbrock => "rosenbrock",
        }
    }

    fn goal(&mut self, pmap: &ParameterMap) -> Result<f64> {
        let v = self.values(pmap)?;
        Ok(match &self.kind {
            Kind::Quadratic { center } => v
                .iter()
                .zip(center.iter())
                .map(|(vi, ci)| (vi - ci).powi(2))
                .sum(),
            Kind::Rosenbrock => {
                (1.0 - v[0]).powi(2) + 100.0 * (v[1] - v[0] * v[0]).powi(2)
            }
        })
    }

    fn goal_with_gradient(&mut self, pmap: &ParameterMap) -> Result<(f64, Array1<f64>)> {
        let v = self.values(pmap)?;
        match &self.kind {
            Kind::Quadratic { center } => {
                let goal = v
                    .iter()
                    .zip(center.iter())
                    .map(|(vi, ci)| (vi - ci).powi(2))
                    .sum();
                let grad = v
                    .iter()
                    .zip(center.iter())
                    .map(|(vi, ci)| 2.0 * (vi - ci))
                    .collect();
                Ok((goal, grad))
            }
            Kind::Rosenbrock => {
                let goal = (1.0 - v[0]).powi(2) + 100.0 * (v[1] - v[0] * v[0]).powi(2);
                let grad = Array1::from_vec(vec![
                    -2.0 * (1.0 - v[0]) - 400.0 * (v[1] - v[0] * v[0]) * v[0],
                    200.0 * (v[1] - v[0] * v[0]),
                ]);
                Ok((goal, grad))
            }
        }
    }
}
