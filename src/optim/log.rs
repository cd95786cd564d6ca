// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run log and best-point file.
//!
//! The run log is append-only, human-readable structured text: a start
//! marker with the parameter map and algorithm options, one entry per
//! evaluation, and an end marker with the total runtime. The best-point
//! file is overwritten whenever a new best is found.
//!
//! File handles are opened, appended, and flushed per operation — never
//! held across the run — so partial progress survives interruption.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::error::Result;
use crate::optim::status::OptimizationStatus;
use crate::params::ParameterMap;

/// Name of the marker file that points at the active run directory.
pub const RECENT_MARKER: &str = "recent";

/// Append-only run log plus the best-point file, both inside one run
/// directory.
#[derive(Debug, Clone)]
pub struct RunLog {
    logdir: PathBuf,
    logname: String,
}

impl RunLog {
    /// Create a log rooted at `logdir`, writing to `logname` inside it.
    pub fn new(logdir: impl Into<PathBuf>, logname: impl Into<String>) -> Self {
        Self {
            logdir: logdir.into(),
            logname: logname.into(),
        }
    }

    /// The run directory.
    pub fn logdir(&self) -> &Path {
        &self.logdir
    }

    /// Path of the run log file.
    pub fn log_path(&self) -> PathBuf {
        self.logdir.join(&self.logname)
    }

    /// Path of the best-point file.
    pub fn best_path(&self) -> PathBuf {
        self.logdir.join(format!("best_point_{}", self.logname))
    }

    /// Create the run directory and refresh the `recent` marker beside it.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.logdir)?;
        if let Some(parent) = self.logdir.parent() {
            if !parent.as_os_str().is_empty() {
                fs::write(parent.join(RECENT_MARKER), format!("{}\n", self.logdir.display()))?;
            }
        }
        Ok(())
    }

    /// Point the log at a new directory, removing the stale `recent`
    /// marker and the old directory.
    ///
    /// A missing marker or directory is not an error; any other I/O
    /// failure is surfaced.
    pub fn replace_logdir(&mut self, new_logdir: impl Into<PathBuf>) -> Result<()> {
        let old_logdir = std::mem::replace(&mut self.logdir, new_logdir.into());
        if let Some(parent) = old_logdir.parent() {
            if !parent.as_os_str().is_empty() {
                ignore_not_found(fs::remove_file(parent.join(RECENT_MARKER)))?;
            }
        }
        ignore_not_found(fs::remove_dir_all(&old_logdir))?;
        self.prepare()
    }

    fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Write the start marker: wall-clock time, opt map, units, algorithm
    /// options.
    pub fn start(&self, pmap: &ParameterMap, options: &serde_json::Value) -> Result<()> {
        let mut text = String::new();
        text.push_str(&format!("Starting optimization at {}\n\n", timestamp()));
        text.push_str("Optimization parameters:\n");
        text.push_str(&serde_json::to_string(pmap.opt_map())?);
        text.push('\n');
        text.push_str("Units:\n");
        text.push_str(&serde_json::to_string(&pmap.opt_units())?);
        text.push('\n');
        text.push_str("Algorithm options:\n");
        text.push_str(&serde_json::to_string(options)?);
        text.push('\n');
        self.append(&text)
    }

    /// Write one per-evaluation entry.
    pub fn evaluation(&self, status: &OptimizationStatus) -> Result<()> {
        let text = format!(
            "\nFinished evaluation {} at {}\n{}\n",
            status.evaluation,
            timestamp(),
            serde_json::to_string(status)?
        );
        self.append(&text)
    }

    /// Write the end marker with the total runtime in seconds.
    pub fn finish(&self, elapsed_secs: f64) -> Result<()> {
        let text = format!(
            "Finished at {}\nTotal runtime: {}\n\n",
            timestamp(),
            elapsed_secs
        );
        self.append(&text)
    }

    /// Overwrite the best-point file with the map layout, units, and the
    /// full status of the new best.
    pub fn write_best_point(
        &self,
        pmap: &ParameterMap,
        status: &OptimizationStatus,
    ) -> Result<()> {
        let doc = json!({
            "opt_map": pmap.opt_map(),
            "units": pmap.opt_units(),
            "optim_status": status,
        });
        let mut content = serde_json::to_string(&doc)?;
        content.push('\n');
        fs::write(self.best_path(), content)?;
        Ok(())
    }
}

pub(crate) fn timestamp() -> String {
    chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

fn ignore_not_found(result: std::io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
