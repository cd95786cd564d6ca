// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Nelder-Mead downhill simplex.
//!
//! Gradient-free: robust to noisy goals, adequate for small parameter
//! counts. Standard reflection/expansion/contraction/shrink with the
//! conventional coefficients.

use ndarray::Array1;

use crate::error::Result;
use crate::optim::algorithms::{Algorithm, AlgorithmOptions, MinimizeResult, Objective};

/// Gradient-free simplex algorithm.
#[derive(Debug)]
pub struct NelderMead;

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl Algorithm for NelderMead {
    fn name(&self) -> &'static str {
        "nelder-mead"
    }

    fn uses_gradient(&self) -> bool {
        false
    }

    fn minimize(
        &self,
        objective: &mut dyn Objective,
        x0: Array1<f64>,
        options: &AlgorithmOptions,
    ) -> Result<MinimizeResult> {
        let n = x0.len();

        // Initial simplex: x0 plus one step along each coordinate.
        let mut simplex: Vec<Array1<f64>> = Vec::with_capacity(n + 1);
        simplex.push(x0.clone());
        for i in 0..n {
            let mut vertex = x0.clone();
            vertex[i] += options.initial_step;
            simplex.push(vertex);
        }
        let mut values: Vec<f64> = Vec::with_capacity(n + 1);
        for vertex in &simplex {
            values.push(objective.evaluate(&vertex.view())?);
        }

        let mut iterations = 0;
        let mut converged = false;

        for _ in 0..options.max_iterations {
            iterations += 1;

            // Order: best first, worst last.
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            let best = order[0];
            let worst = order[n];
            let second_worst = order[n - 1];

            if (values[worst] - values[best]).abs()
                < options.tolerance * values[best].abs().max(1.0)
            {
                converged = true;
                break;
            }

            // Centroid of all vertices but the worst.
            let mut centroid = Array1::zeros(n);
            for (i, vertex) in simplex.iter().enumerate() {
                if i != worst {
                    centroid = centroid + vertex;
                }
            }
            centroid /= n as f64;

            let reflected = &centroid + &((&centroid - &simplex[worst]) * REFLECT);
            let f_reflected = objective.evaluate(&reflected.view())?;

            if f_reflected < values[best] {
                let expanded = &centroid + &((&centroid - &simplex[worst]) * EXPAND);
                let f_expanded = objective.evaluate(&expanded.view())?;
                if f_expanded < f_reflected {
                    simplex[worst] = expanded;
                    values[worst] = f_expanded;
                } else {
                    simplex[worst] = reflected;
                    values[worst] = f_reflected;
                }
            } else if f_reflected < values[second_worst] {
                simplex[worst] = reflected;
                values[worst] = f_reflected;
            } else {
                let contracted =
                    &centroid + &((&simplex[worst] - &centroid) * CONTRACT);
                let f_contracted = objective.evaluate(&contracted.view())?;
                if f_contracted < values[worst] {
                    simplex[worst] = contracted;
                    values[worst] = f_contracted;
                } else {
                    // Shrink toward the best vertex.
                    let anchor = simplex[best].clone();
                    for i in 0..=n {
                        if i != best {
                            simplex[i] = &anchor + &((&simplex[i] - &anchor) * SHRINK);
                            values[i] = objective.evaluate(&simplex[i].view())?;
                        }
                    }
                }
            }
        }

        let (best_idx, _) = values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .expect("simplex is non-empty");
        Ok(MinimizeResult {
            x: simplex[best_idx].clone(),
            goal: values[best_idx],
            iterations,
            converged,
        })
    }
}
