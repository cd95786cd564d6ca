// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Instruction-driven gate simulation backend.
//!
//! An [`Experiment`] binds a [`Model`] (drift and control Hamiltonians), an
//! [`Instruction`] (the pulse specification being optimized), a target
//! unitary, and a time grid. Its goal is the average gate infidelity
//! `1 - F`. The differentiable path chains the adjoint amplitude gradient
//! from [`propagation`](crate::sim::propagation) through the envelope
//! parameter derivatives, so one simulation yields the full gradient.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::{Error, Result};
use crate::params::ParameterMap;
use crate::signal::Instruction;
use crate::sim::propagation::{
    backward_chain, fidelity_gradient, forward_chain, gate_fidelity, propagators,
};
use crate::sim::{DynamicsSample, GoalBackend};

/// Drift and control Hamiltonians with their drive-channel names.
#[derive(Debug, Clone)]
pub struct Model {
    /// Drift Hamiltonian, Hz.
    pub drift: Array2<Complex64>,
    /// Control Hamiltonians, one per drive channel, Hz.
    pub controls: Vec<Array2<Complex64>>,
    /// Channel name driving each control, same order as `controls`.
    pub channels: Vec<String>,
}

impl Model {
    /// Create a model.
    ///
    /// # Errors
    ///
    /// Fails if matrix dimensions disagree or the channel list does not
    /// match the control list.
    pub fn new(
        drift: Array2<Complex64>,
        controls: Vec<Array2<Complex64>>,
        channels: Vec<String>,
    ) -> Result<Self> {
        let d = drift.nrows();
        if drift.ncols() != d {
            return Err(Error::Config("drift Hamiltonian must be square".into()));
        }
        for h in &controls {
            if h.nrows() != d || h.ncols() != d {
                return Err(Error::Config(
                    "control Hamiltonian dimension does not match drift".into(),
                ));
            }
        }
        if channels.len() != controls.len() {
            return Err(Error::Config(format!(
                "{} channels declared for {} controls",
                channels.len(),
                controls.len()
            )));
        }
        Ok(Self {
            drift,
            controls,
            channels,
        })
    }

    /// Hilbert-space dimension.
    pub fn dim(&self) -> usize {
        self.drift.nrows()
    }

    fn control_index(&self, channel: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == channel)
    }
}

/// Look up a named single- or two-qubit target unitary.
pub fn named_target(name: &str) -> Result<Array2<Complex64>> {
    let re = |x: f64| Complex64::new(x, 0.0);
    let im = |x: f64| Complex64::new(0.0, x);
    match name {
        "id" => Ok(Array2::from_diag_elem(2, re(1.0))),
        "x" => Ok(ndarray::array![[re(0.0), re(1.0)], [re(1.0), re(0.0)]]),
        "y" => Ok(ndarray::array![[re(0.0), im(-1.0)], [im(1.0), re(0.0)]]),
        "z" => Ok(ndarray::array![[re(1.0), re(0.0)], [re(0.0), re(-1.0)]]),
        "h" => {
            let s = std::f64::consts::FRAC_1_SQRT_2;
            Ok(ndarray::array![[re(s), re(s)], [re(s), re(-s)]])
        }
        "cz" => {
            let mut m = Array2::from_diag_elem(4, re(1.0));
            m[[3, 3]] = re(-1.0);
            Ok(m)
        }
        other => Err(Error::Config(format!("unknown target gate '{}'", other))),
    }
}

/// Propagator-based goal backend: infidelity of one gate.
#[derive(Debug, Clone)]
pub struct Experiment {
    model: Model,
    instruction: Instruction,
    target: Array2<Complex64>,
    n_slices: usize,
    last_propagator: Option<Array2<Complex64>>,
    last_forward: Option<Vec<Array2<Complex64>>>,
}

impl Experiment {
    /// Create an experiment.
    ///
    /// # Errors
    ///
    /// Fails if the target dimension does not match the model, the slice
    /// count is zero, or the instruction declares a channel the model does
    /// not drive.
    pub fn new(
        model: Model,
        instruction: Instruction,
        target: Array2<Complex64>,
        n_slices: usize,
    ) -> Result<Self> {
        if target.nrows() != model.dim() || target.ncols() != model.dim() {
            return Err(Error::Config(format!(
                "target dimension {} does not match model dimension {}",
                target.nrows(),
                model.dim()
            )));
        }
        if n_slices == 0 {
            return Err(Error::Config("n_slices must be > 0".into()));
        }
        for chan in instruction.channels() {
            if model.control_index(chan).is_none() {
                return Err(Error::Config(format!(
                    "instruction channel '{}' has no control Hamiltonian",
                    chan
                )));
            }
        }
        Ok(Self {
            model,
            instruction,
            target,
            n_slices,
            last_propagator: None,
            last_forward: None,
        })
    }

    /// Slice duration in seconds.
    pub fn dt(&self) -> f64 {
        self.instruction.gate_length() / self.n_slices as f64
    }

    /// Midpoint time of slice `k`.
    fn slice_time(&self, k: usize) -> f64 {
        self.instruction.t_start() + (k as f64 + 0.5) * self.dt()
    }

    /// Sample every control channel at every slice midpoint.
    fn amplitude_table(&self) -> Array2<f64> {
        let mut amps = Array2::zeros((self.model.controls.len(), self.n_slices));
        for (c, chan) in self.model.channels.iter().enumerate() {
            for k in 0..self.n_slices {
                amps[[c, k]] = self.instruction.sample(chan, self.slice_time(k));
            }
        }
        amps
    }

    /// Run the simulation, cache snapshots, and return `(infidelity, props)`.
    fn simulate(&mut self) -> Result<(f64, Vec<Array2<Complex64>>)> {
        let amps = self.amplitude_table();
        let props = propagators(&amps.view(), &self.model.drift, &self.model.controls, self.dt())?;
        let forward = forward_chain(&props);
        let total = forward[self.n_slices].clone();
        let fid = gate_fidelity(&total, &self.target);
        self.last_propagator = Some(total);
        self.last_forward = Some(forward);
        Ok((1.0 - fid, props))
    }
}

impl GoalBackend for Experiment {
    fn name(&self) -> &str {
        "experiment"
    }

    fn goal(&mut self, pmap: &ParameterMap) -> Result<f64> {
        self.instruction.apply_params(pmap);
        let (goal, _) = self.simulate()?;
        Ok(goal)
    }

    fn goal_with_gradient(&mut self, pmap: &ParameterMap) -> Result<(f64, Array1<f64>)> {
        self.instruction.apply_params(pmap);
        let (goal, props) = self.simulate()?;
        let forward = self
            .last_forward
            .as_ref()
            .expect("simulate() caches the forward chain");
        let backward = backward_chain(&props);
        let amp_grad = fidelity_gradient(
            &props,
            forward,
            &backward,
            &self.target,
            &self.model.controls,
            self.dt(),
        );

        // d(infidelity)/dθ = -Σ_k dF/da[c,k] · da[c,k]/dθ
        let mut grad = Array1::zeros(pmap.opt_len());
        for (i, id) in pmap.opt_map().iter().enumerate() {
            let parts: Vec<&str> = id.split('/').collect();
            if parts.len() != 4 || parts[0] != self.instruction.name {
                continue;
            }
            let (chan, comp, param) = (parts[1], parts[2], parts[3]);
            let Some(c) = self.model.control_index(chan) else {
                continue;
            };
            let mut acc = 0.0;
            for k in 0..self.n_slices {
                acc += amp_grad[[c, k]]
                    * self
                        .instruction
                        .sample_grad(chan, comp, param, self.slice_time(k));
            }
            grad[i] = -acc;
        }
        Ok((goal, grad))
    }

    fn propagator(&self) -> Option<&Array2<Complex64>> {
        self.last_propagator.as_ref()
    }

    fn dynamics(&self) -> Option<Vec<DynamicsSample>> {
        let forward = self.last_forward.as_ref()?;
        let dt = self.dt();
        let t_start = self.instruction.t_start();
        Some(
            forward
                .iter()
                .enumerate()
                .map(|(k, u)| DynamicsSample {
                    time: t_start + k as f64 * dt,
                    populations: (0..u.nrows()).map(|i| u[[i, 0]].norm_sqr()).collect(),
                })
                .collect(),
        )
    }

    fn instruction(&self) -> Option<&Instruction> {
        Some(&self.instruction)
    }
}
