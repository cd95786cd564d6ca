// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Limited-memory BFGS with Armijo backtracking.
//!
//! Two-loop recursion over a bounded history of curvature pairs. The line
//! search queries value and gradient in lockstep at every trial point, so
//! objectives backed by the one-shot gradient cache are drained as they are
//! filled.
//!
//! # References
//!
//! - Nocedal & Wright, "Numerical Optimization", 2nd ed., ch. 7.

use std::collections::VecDeque;

use ndarray::{Array1, ArrayView1};

use crate::error::{OptimError, Result};
use crate::optim::algorithms::{Algorithm, AlgorithmOptions, MinimizeResult, Objective};

/// Default quasi-Newton algorithm.
#[derive(Debug)]
pub struct Lbfgs;

const ARMIJO_C1: f64 = 1e-4;
const MAX_LINE_SEARCH_STEPS: usize = 30;

impl Algorithm for Lbfgs {
    fn name(&self) -> &'static str {
        "lbfgs"
    }

    fn uses_gradient(&self) -> bool {
        true
    }

    fn minimize(
        &self,
        objective: &mut dyn Objective,
        x0: Array1<f64>,
        options: &AlgorithmOptions,
    ) -> Result<MinimizeResult> {
        let mut x = x0;
        let (mut f, mut g) = eval_fg(objective, &x.view())?;

        let mut s_hist: VecDeque<Array1<f64>> = VecDeque::new();
        let mut y_hist: VecDeque<Array1<f64>> = VecDeque::new();
        let mut rho_hist: VecDeque<f64> = VecDeque::new();

        let mut iterations = 0;
        let mut converged = false;

        for _ in 0..options.max_iterations {
            iterations += 1;

            if norm(&g) < options.gradient_tolerance {
                converged = true;
                break;
            }

            let mut direction = two_loop_direction(&g, &s_hist, &y_hist, &rho_hist);
            if g.dot(&direction) >= 0.0 {
                // Curvature history stopped being a descent model; restart
                // from steepest descent.
                s_hist.clear();
                y_hist.clear();
                rho_hist.clear();
                direction = -&g;
            }

            let (x_new, f_new, g_new) = line_search(objective, &x, &direction, f, &g)?;

            let s = &x_new - &x;
            let y = &g_new - &g;
            let sy = s.dot(&y);
            if sy > 1e-12 {
                s_hist.push_back(s);
                y_hist.push_back(y);
                rho_hist.push_back(1.0 / sy);
                if s_hist.len() > options.memory_size {
                    s_hist.pop_front();
                    y_hist.pop_front();
                    rho_hist.pop_front();
                }
            }

            let f_change = (f - f_new).abs();
            x = x_new;
            f = f_new;
            g = g_new;

            if f_change < options.tolerance * f.abs().max(1.0) {
                converged = true;
                break;
            }
        }

        Ok(MinimizeResult {
            x,
            goal: f,
            iterations,
            converged,
        })
    }
}

/// Query value and gradient at the same point, in that order.
fn eval_fg(
    objective: &mut dyn Objective,
    x: &ArrayView1<f64>,
) -> Result<(f64, Array1<f64>)> {
    let f = objective.evaluate(x)?;
    let g = objective.gradient(x)?;
    Ok((f, g))
}

fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Two-loop recursion: apply the implicit inverse-Hessian approximation to
/// the gradient and negate.
fn two_loop_direction(
    g: &Array1<f64>,
    s_hist: &VecDeque<Array1<f64>>,
    y_hist: &VecDeque<Array1<f64>>,
    rho_hist: &VecDeque<f64>,
) -> Array1<f64> {
    let m = s_hist.len();
    let mut q = g.clone();
    let mut alpha = vec![0.0; m];

    for i in (0..m).rev() {
        alpha[i] = rho_hist[i] * s_hist[i].dot(&q);
        q = q - &y_hist[i] * alpha[i];
    }

    // Scale by gamma = s·y / y·y of the most recent pair (initial Hessian
    // guess).
    let gamma = if m > 0 {
        let sy = s_hist[m - 1].dot(&y_hist[m - 1]);
        let yy = y_hist[m - 1].dot(&y_hist[m - 1]);
        sy / yy
    } else {
        1.0
    };
    let mut r = q * gamma;

    for i in 0..m {
        let beta = rho_hist[i] * y_hist[i].dot(&r);
        r = r + &s_hist[i] * (alpha[i] - beta);
    }

    -r
}

/// Armijo backtracking from a unit step.
fn line_search(
    objective: &mut dyn Objective,
    x: &Array1<f64>,
    direction: &Array1<f64>,
    f0: f64,
    g0: &Array1<f64>,
) -> Result<(Array1<f64>, f64, Array1<f64>)> {
    let slope = g0.dot(direction);
    let mut alpha = 1.0;

    for _ in 0..MAX_LINE_SEARCH_STEPS {
        let x_trial = x + &(direction * alpha);
        let (f_trial, g_trial) = eval_fg(objective, &x_trial.view())?;

        if f_trial.is_finite() && f_trial <= f0 + ARMIJO_C1 * alpha * slope {
            return Ok((x_trial, f_trial, g_trial));
        }
        alpha *= 0.5;
    }

    Err(OptimError::AlgorithmFailed(
        "line search failed to find sufficient decrease".to_string(),
    )
    .into())
}
