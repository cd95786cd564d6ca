// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. qoctl.yaml file
//! 3. Environment variables (QOCTL_*)
//! 4. CLI arguments

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use ndarray::array;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::optim::algorithms::{self, AlgorithmOptions};
use crate::output::OutputFlags;
use crate::params::{ParameterMap, Quantity};
use crate::signal::{Component, Instruction, Shape};
use crate::sim::experiment::{named_target, Experiment, Model};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Run log settings
    #[serde(default)]
    pub run: RunConfig,

    /// Algorithm selection and options
    #[serde(default)]
    pub algorithm: AlgorithmConfig,

    /// Periodic output settings
    #[serde(default)]
    pub outputs: OutputsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Experiment definition (required for `optimize`)
    #[serde(default)]
    pub experiment: Option<ExperimentConfig>,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            }
        } else {
            for path in &["qoctl.yaml", "qoctl.yml", "/etc/qoctl/config.yaml"] {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("QOCTL_LOGDIR") {
            self.run.logdir = val;
        }
        if let Ok(val) = env::var("QOCTL_LOGNAME") {
            self.run.logname = val;
        }
        if let Ok(val) = env::var("QOCTL_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("QOCTL_OUTPUT_DIR") {
            self.outputs.directory = val;
        }
        if let Ok(val) = env::var("QOCTL_ALGORITHM") {
            self.algorithm.name = val;
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.run.logdir.is_empty() {
            return Err(Error::Config("run.logdir cannot be empty".into()));
        }
        if self.run.logname.is_empty() {
            return Err(Error::Config("run.logname cannot be empty".into()));
        }
        if !self.algorithm.name.is_empty() {
            algorithms::algorithm_by_name(&self.algorithm.name)?;
        }
        if let Some(experiment) = &self.experiment {
            experiment.validate()?;
        }
        Ok(())
    }
}

/// Run log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Run directory for the log and best-point files
    #[serde(default = "default_logdir")]
    pub logdir: String,

    /// Log file name inside the run directory
    #[serde(default = "default_logname")]
    pub logname: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            logdir: default_logdir(),
            logname: default_logname(),
        }
    }
}

fn default_logdir() -> String {
    "./logs/run".into()
}

fn default_logname() -> String {
    "optim.log".into()
}

/// Algorithm selection.
///
/// An empty name means "not configured": the optimizer installs its default
/// and warns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Algorithm name ("lbfgs", "nelder-mead"), or empty for the default
    #[serde(default)]
    pub name: String,

    /// Options handed to the algorithm
    #[serde(default)]
    pub options: AlgorithmOptions,
}

/// Periodic output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsConfig {
    /// Directory for dynamics/pulse/unitary artifacts
    #[serde(default = "default_output_dir")]
    pub directory: String,

    /// Artifact family flags
    #[serde(flatten)]
    pub flags: OutputFlags,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            flags: OutputFlags::default(),
        }
    }
}

fn default_output_dir() -> String {
    "./outputs".into()
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

/// A bounded parameter value in the experiment definition.
///
/// Parameters without bounds are fixed constants; only bounded parameters
/// can appear in `opt_map`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Physical value
    pub value: f64,
    /// Lower bound (optional; required for optimized parameters)
    #[serde(default)]
    pub min: Option<f64>,
    /// Upper bound (optional; required for optimized parameters)
    #[serde(default)]
    pub max: Option<f64>,
    /// Unit label
    #[serde(default)]
    pub unit: String,
}

/// One signal component in the experiment definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Component name, unique per channel
    pub name: String,

    /// "envelope" (default) or "carrier"
    #[serde(default = "default_component_kind")]
    pub kind: String,

    /// Envelope shape name (envelope components only)
    #[serde(default)]
    pub shape: Option<String>,

    /// Named parameters
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
}

fn default_component_kind() -> String {
    "envelope".into()
}

/// One drive channel in the experiment definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name, e.g. "d1"
    pub name: String,

    /// Control Hamiltonian axis: "x", "y", or "z"
    pub control: String,

    /// Signal components on this channel
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

/// Experiment definition: model, instruction, target, and the opt map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Gate/instruction name
    #[serde(default = "default_gate_name")]
    pub gate: String,

    /// Target gate name (see `named_target`)
    #[serde(default = "default_target")]
    pub target: String,

    /// Gate duration in seconds
    #[serde(default = "default_t_final")]
    pub t_final: f64,

    /// Number of piecewise-constant slices
    #[serde(default = "default_n_slices")]
    pub n_slices: usize,

    /// Qubit detuning in Hz (drift term)
    #[serde(default)]
    pub detuning: f64,

    /// Drive channels
    pub channels: Vec<ChannelConfig>,

    /// Parameter ids exposed to the optimizer
    pub opt_map: Vec<String>,
}

fn default_gate_name() -> String {
    "gate".into()
}

fn default_target() -> String {
    "x".into()
}

fn default_t_final() -> f64 {
    20e-9
}

fn default_n_slices() -> usize {
    100
}

impl ExperimentConfig {
    /// Validate the definition without building it.
    pub fn validate(&self) -> Result<()> {
        if self.t_final <= 0.0 {
            return Err(Error::Config("experiment.t_final must be > 0".into()));
        }
        if self.n_slices == 0 {
            return Err(Error::Config("experiment.n_slices must be > 0".into()));
        }
        if self.channels.is_empty() {
            return Err(Error::Config(
                "experiment.channels cannot be empty".into(),
            ));
        }
        if self.opt_map.is_empty() {
            return Err(Error::Config("experiment.opt_map cannot be empty".into()));
        }
        Ok(())
    }

    /// Build the simulation backend and parameter map.
    pub fn build(&self) -> Result<(Experiment, ParameterMap)> {
        self.validate()?;

        let mut controls = Vec::new();
        let mut channel_names = Vec::new();
        for channel in &self.channels {
            controls.push(control_hamiltonian(&channel.control)?);
            channel_names.push(channel.name.clone());
        }
        let drift = pauli_z() * Complex64::new(self.detuning / 2.0, 0.0);
        let model = Model::new(drift, controls, channel_names.clone())?;

        let mut instruction =
            Instruction::new(self.gate.as_str(), channel_names, 0.0, self.t_final)?;
        let mut pmap = ParameterMap::new();

        for channel in &self.channels {
            for comp_config in &channel.components {
                let component = build_component(comp_config)?;
                for (key, spec) in &comp_config.params {
                    if let (Some(min), Some(max)) = (spec.min, spec.max) {
                        let id = format!(
                            "{}/{}/{}/{}",
                            self.gate, channel.name, comp_config.name, key
                        );
                        pmap.insert(id, Quantity::new(spec.value, min, max, spec.unit.as_str())?);
                    }
                }
                instruction.add_component(component, &channel.name)?;
            }
        }
        pmap.set_opt_map(self.opt_map.clone())?;

        let target = named_target(&self.target)?;
        let experiment = Experiment::new(model, instruction, target, self.n_slices)?;
        Ok((experiment, pmap))
    }
}

fn build_component(config: &ComponentConfig) -> Result<Component> {
    let values: BTreeMap<String, f64> = config
        .params
        .iter()
        .map(|(k, spec)| (k.clone(), spec.value))
        .collect();
    match config.kind.as_str() {
        "envelope" => {
            let shape_name = config.shape.as_deref().ok_or_else(|| {
                Error::Config(format!(
                    "envelope component '{}' needs a shape",
                    config.name
                ))
            })?;
            Component::envelope(config.name.as_str(), Shape::from_name(shape_name)?, values)
        }
        "carrier" => {
            let freq = values.get("freq").copied().ok_or_else(|| {
                Error::Config(format!(
                    "carrier component '{}' needs a freq parameter",
                    config.name
                ))
            })?;
            let phase = values.get("phase").copied().unwrap_or(0.0);
            Ok(Component::carrier(config.name.as_str(), freq, phase))
        }
        other => Err(Error::Config(format!(
            "unknown component kind '{}' on component '{}'",
            other, config.name
        ))),
    }
}

fn control_hamiltonian(axis: &str) -> Result<ndarray::Array2<Complex64>> {
    let re = |x: f64| Complex64::new(x, 0.0);
    let im = |x: f64| Complex64::new(0.0, x);
    match axis {
        "x" => Ok(array![[re(0.0), re(1.0)], [re(1.0), re(0.0)]]),
        "y" => Ok(array![[re(0.0), im(-1.0)], [im(1.0), re(0.0)]]),
        "z" => Ok(array![[re(1.0), re(0.0)], [re(0.0), re(-1.0)]]),
        other => Err(Error::Config(format!(
            "unknown control axis '{}' (expected x, y, or z)",
            other
        ))),
    }
}

fn pauli_z() -> ndarray::Array2<Complex64> {
    array![
        [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
        [Complex64::new(0.0, 0.0), Complex64::new(-1.0, 0.0)]
    ]
}
