// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Periodic output sinks.
//!
//! Goal evaluation has documented side effects: after best tracking, the
//! optimizer hands each registered [`StatusSink`] an [`EvalSnapshot`].
//! [`FileOutputs`] is the standard sink; it writes dynamics tables, pulse
//! dumps, and serialized propagators, each gated by its own flag and
//! numbered by its own monotonically increasing counter.

use std::fs;
use std::path::PathBuf;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::optim::status::OptimizationStatus;
use crate::signal::Instruction;
use crate::sim::DynamicsSample;

/// Everything a sink may consume after one evaluation.
pub struct EvalSnapshot<'a> {
    /// The evaluation's status.
    pub status: &'a OptimizationStatus,
    /// The instruction being optimized, for pulse dumps.
    pub instruction: Option<&'a Instruction>,
    /// Total propagator of the evaluation.
    pub propagator: Option<&'a Array2<Complex64>>,
    /// Time-resolved populations of the evaluation.
    pub dynamics: Option<Vec<DynamicsSample>>,
}

/// Consumer of per-evaluation snapshots.
pub trait StatusSink {
    /// Called once per goal evaluation, after best tracking.
    fn on_evaluation(&mut self, snapshot: &EvalSnapshot<'_>) -> Result<()>;
}

/// Which artifact families to write.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OutputFlags {
    /// Write `dynamics_NNNN.csv` tables.
    #[serde(default)]
    pub write_dynamics: bool,
    /// Write `pulses_NNNN.json` dumps.
    #[serde(default)]
    pub write_pulses: bool,
    /// Write `unitary_NNNN.txt` propagator dumps.
    #[serde(default)]
    pub store_unitaries: bool,
}

/// Number of waveform samples per channel in a pulse dump.
const PULSE_DUMP_SAMPLES: usize = 101;

/// File-writing sink with independent counters per artifact family.
pub struct FileOutputs {
    dir: PathBuf,
    flags: OutputFlags,
    dynamics_counter: u64,
    pulses_counter: u64,
    unitaries_counter: u64,
}

impl FileOutputs {
    /// Create the sink, creating the output directory.
    pub fn new(dir: impl Into<PathBuf>, flags: OutputFlags) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            flags,
            dynamics_counter: 0,
            pulses_counter: 0,
            unitaries_counter: 0,
        })
    }

    /// Current counters: (dynamics, pulses, unitaries).
    pub fn counters(&self) -> (u64, u64, u64) {
        (
            self.dynamics_counter,
            self.pulses_counter,
            self.unitaries_counter,
        )
    }

    fn write_dynamics(&mut self, dynamics: &[DynamicsSample]) -> Result<()> {
        let dim = dynamics.first().map_or(0, |s| s.populations.len());
        let mut csv = String::from("time");
        for i in 0..dim {
            csv.push_str(&format!(",p{}", i));
        }
        csv.push('\n');
        for sample in dynamics {
            csv.push_str(&format!("{:e}", sample.time));
            for p in &sample.populations {
                csv.push_str(&format!(",{}", p));
            }
            csv.push('\n');
        }
        let path = self.dir.join(format!("dynamics_{:04}.csv", self.dynamics_counter));
        fs::write(path, csv)?;
        self.dynamics_counter += 1;
        Ok(())
    }

    fn write_pulses(&mut self, instruction: &Instruction, goal: f64) -> Result<()> {
        let t0 = instruction.t_start();
        let t1 = instruction.t_end();
        let mut waveforms = serde_json::Map::new();
        for chan in instruction.channels() {
            let samples: Vec<[f64; 2]> = (0..PULSE_DUMP_SAMPLES)
                .map(|i| {
                    let t = t0 + (t1 - t0) * i as f64 / (PULSE_DUMP_SAMPLES - 1) as f64;
                    [t, instruction.sample(chan, t)]
                })
                .collect();
            waveforms.insert(chan.clone(), json!(samples));
        }
        let doc = json!({
            "goal": goal,
            "instruction": instruction.serialize(),
            "waveforms": waveforms,
        });
        let path = self.dir.join(format!("pulses_{:04}.json", self.pulses_counter));
        fs::write(path, serde_json::to_string(&doc)?)?;
        self.pulses_counter += 1;
        Ok(())
    }

    fn write_unitary(&mut self, propagator: &Array2<Complex64>) -> Result<()> {
        let mut text = String::from("Re:\n");
        for i in 0..propagator.nrows() {
            for j in 0..propagator.ncols() {
                text.push_str(&format!("{:>8.3}", propagator[[i, j]].re));
            }
            text.push('\n');
        }
        text.push_str("Im:\n");
        for i in 0..propagator.nrows() {
            for j in 0..propagator.ncols() {
                text.push_str(&format!("{:>8.3}", propagator[[i, j]].im));
            }
            text.push('\n');
        }
        let path = self
            .dir
            .join(format!("unitary_{:04}.txt", self.unitaries_counter));
        fs::write(path, text)?;
        self.unitaries_counter += 1;
        Ok(())
    }
}

impl StatusSink for FileOutputs {
    fn on_evaluation(&mut self, snapshot: &EvalSnapshot<'_>) -> Result<()> {
        if self.flags.write_dynamics {
            if let Some(dynamics) = &snapshot.dynamics {
                self.write_dynamics(dynamics)?;
            }
        }
        if self.flags.write_pulses {
            if let Some(instruction) = snapshot.instruction {
                self.write_pulses(instruction, snapshot.status.goal)?;
            }
        }
        if self.flags.store_unitaries {
            if let Some(propagator) = snapshot.propagator {
                self.write_unitary(propagator)?;
            }
        }
        Ok(())
    }
}
