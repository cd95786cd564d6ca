// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! The optimizer core.
//!
//! [`Optimizer`] drives iterative minimization of a physics-derived goal
//! over a real-valued parameter vector. It owns the mutable loop state
//! (status snapshot, gradient cache, best tracking, evaluation counter),
//! bridges the array-based [`Algorithm`] contract to the
//! [`GoalBackend`] simulation contract, and keeps the run log and
//! best-point file durable after every evaluation.
//!
//! Goal evaluation has documented side effects, in fixed order: status
//! snapshot, best tracking, sink emission, run-log append.
//!
//! # State machine
//!
//! Idle --`begin_logging`--> Running --`end_logging`--> Finalized.
//! Evaluations are only legal while Running; a finalized optimizer cannot
//! be restarted.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use ndarray::{Array1, ArrayView1};
use tracing::warn;

use crate::error::{OptimError, Result};
use crate::optim::algorithms::{self, Algorithm, AlgorithmOptions, MinimizeResult, Objective};
use crate::optim::gradient::GradientCache;
use crate::optim::log::{timestamp, RunLog};
use crate::optim::status::{OptimizationStatus, GOAL_SENTINEL};
use crate::output::{EvalSnapshot, StatusSink};
use crate::params::ParameterMap;
use crate::sim::{GoalBackend, GoalValue, ParamVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    Finalized,
}

impl RunState {
    fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Running => "Running",
            RunState::Finalized => "Finalized",
        }
    }
}

/// Outcome of a full [`Optimizer::optimize`] run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best goal seen across all evaluations.
    pub best_goal: f64,
    /// Parameter values of the best evaluation.
    pub best_params: BTreeMap<String, f64>,
    /// Total number of goal evaluations.
    pub evaluations: u64,
    /// The algorithm's own result.
    pub algorithm_result: MinimizeResult,
}

/// Iterative minimization of a goal function with pluggable algorithm.
pub struct Optimizer {
    pmap: ParameterMap,
    backend: Box<dyn GoalBackend>,
    algorithm: Box<dyn Algorithm>,
    options: AlgorithmOptions,
    log: RunLog,
    sinks: Vec<Box<dyn StatusSink>>,
    status: OptimizationStatus,
    gradients: GradientCache,
    current_best_goal: f64,
    current_best_params: Option<BTreeMap<String, f64>>,
    evaluation: u64,
    state: RunState,
    created_by: Option<PathBuf>,
    started_at: Option<Instant>,
}

impl Optimizer {
    /// Create an optimizer.
    ///
    /// Passing `None` for the algorithm installs the documented default
    /// (L-BFGS) and emits a single warning, so the substitution is
    /// observable.
    pub fn new(
        pmap: ParameterMap,
        backend: Box<dyn GoalBackend>,
        log: RunLog,
        algorithm: Option<Box<dyn Algorithm>>,
    ) -> Self {
        let mut optimizer = Self {
            pmap,
            backend,
            algorithm: algorithms::default_algorithm(),
            options: AlgorithmOptions::default(),
            log,
            sinks: Vec::new(),
            status: OptimizationStatus::default(),
            gradients: GradientCache::new(),
            current_best_goal: GOAL_SENTINEL,
            current_best_params: None,
            evaluation: 0,
            state: RunState::Idle,
            created_by: None,
            started_at: None,
        };
        optimizer.set_algorithm(algorithm);
        optimizer
    }

    /// Install a minimization algorithm; `None` falls back to the default
    /// L-BFGS with a warning.
    pub fn set_algorithm(&mut self, algorithm: Option<Box<dyn Algorithm>>) {
        match algorithm {
            Some(algorithm) => self.algorithm = algorithm,
            None => {
                warn!("No algorithm passed. Using default L-BFGS");
                self.algorithm = algorithms::default_algorithm();
            }
        }
    }

    /// Set the options handed to the algorithm (also logged at start).
    pub fn set_options(&mut self, options: AlgorithmOptions) {
        self.options = options;
    }

    /// Register a status sink, called after best tracking on every
    /// evaluation.
    pub fn add_sink(&mut self, sink: Box<dyn StatusSink>) {
        self.sinks.push(sink);
    }

    /// Record the config file this optimizer was created from.
    pub fn set_created_by(&mut self, config: impl Into<PathBuf>) {
        self.created_by = Some(config.into());
    }

    /// The config file this optimizer was created from, if recorded.
    pub fn created_by(&self) -> Option<&PathBuf> {
        self.created_by.as_ref()
    }

    /// Name of the installed algorithm.
    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }

    /// The parameter map.
    pub fn pmap(&self) -> &ParameterMap {
        &self.pmap
    }

    /// Mutable access to the parameter map (e.g. to seed start values).
    pub fn pmap_mut(&mut self) -> &mut ParameterMap {
        &mut self.pmap
    }

    /// Best goal seen so far ([`GOAL_SENTINEL`] before any evaluation).
    pub fn current_best_goal(&self) -> f64 {
        self.current_best_goal
    }

    /// Parameters of the best evaluation so far.
    pub fn current_best_params(&self) -> Option<&BTreeMap<String, f64>> {
        self.current_best_params.as_ref()
    }

    /// Number of evaluations performed.
    pub fn evaluations(&self) -> u64 {
        self.evaluation
    }

    /// Status of the most recent evaluation.
    pub fn status(&self) -> &OptimizationStatus {
        &self.status
    }

    /// Point the run log at a new directory (see [`RunLog::replace_logdir`]).
    pub fn replace_logdir(&mut self, new_logdir: impl Into<PathBuf>) -> Result<()> {
        self.log.replace_logdir(new_logdir)
    }

    /// Seed the parameter map from a previous run's best-point file.
    pub fn load_best(&mut self, path: &std::path::Path) -> Result<()> {
        self.pmap.load_best(path)
    }

    fn require_running(&self) -> Result<()> {
        if self.state != RunState::Running {
            return Err(OptimError::InvalidState {
                expected: "Running",
                actual: self.state.as_str(),
            }
            .into());
        }
        Ok(())
    }

    /// Open the run bracket: record wall-clock start, parameter map, and
    /// algorithm options.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` unless the optimizer is Idle; a finalized
    /// optimizer cannot re-enter Running.
    pub fn begin_logging(&mut self) -> Result<()> {
        if self.state != RunState::Idle {
            return Err(OptimError::InvalidState {
                expected: "Idle",
                actual: self.state.as_str(),
            }
            .into());
        }
        self.log.prepare()?;
        self.log.start(&self.pmap, &serde_json::to_value(&self.options)?)?;
        self.started_at = Some(Instant::now());
        self.state = RunState::Running;
        Ok(())
    }

    /// Close the run bracket: record the elapsed runtime.
    pub fn end_logging(&mut self) -> Result<()> {
        self.require_running()?;
        let elapsed = self
            .started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.log.finish(elapsed)?;
        self.state = RunState::Finalized;
        Ok(())
    }

    /// Evaluate the goal for a parameter vector.
    ///
    /// Plain input returns a bare scalar even though the backend may track
    /// gradients internally. Tracked input skips the scalar conversion at
    /// the return boundary: the result carries the gradient, and the
    /// gradient cache is left untouched (caching is the contract of
    /// [`evaluate_goal_with_gradient`](Self::evaluate_goal_with_gradient)).
    pub fn evaluate_goal(&mut self, x: &ParamVector) -> Result<GoalValue> {
        self.require_running()?;
        self.pmap.set_opt_vector(&x.values())?;
        match x {
            ParamVector::Plain(_) => {
                let goal = self.backend.goal(&self.pmap)?;
                self.record_status(goal, None)?;
                Ok(GoalValue::Scalar(goal))
            }
            ParamVector::Tracked(_) => {
                let (goal, phys_grad) = self.backend.goal_with_gradient(&self.pmap)?;
                let gradient = self.to_opt_gradient(phys_grad);
                self.record_status(goal, Some(gradient.to_vec()))?;
                Ok(GoalValue::Tracked {
                    value: goal,
                    gradient,
                })
            }
        }
    }

    /// Evaluate the goal and its gradient, caching the gradient under the
    /// canonical key of `x` for one-shot retrieval.
    pub fn evaluate_goal_with_gradient(
        &mut self,
        x: &ArrayView1<f64>,
    ) -> Result<(f64, Array1<f64>)> {
        self.require_running()?;
        self.pmap.set_opt_vector(x)?;
        let (goal, phys_grad) = self.backend.goal_with_gradient(&self.pmap)?;
        let gradient = self.to_opt_gradient(phys_grad);
        self.gradients.insert(x, gradient.clone());
        self.record_status(goal, Some(gradient.to_vec()))?;
        Ok((goal, gradient))
    }

    /// Retrieve and remove the gradient cached for `x`.
    ///
    /// # Errors
    ///
    /// Fails with `GradientNotFound` if no entry exists — a caller error,
    /// not recoverable here.
    pub fn lookup_gradient(&mut self, x: &ArrayView1<f64>) -> Result<Array1<f64>> {
        self.gradients.pop(x)
    }

    /// Update the best tracker from the current status; on strict
    /// improvement the best-point file is overwritten.
    pub fn track_best(&mut self) -> Result<()> {
        if self.status.goal < self.current_best_goal {
            self.current_best_goal = self.status.goal;
            self.current_best_params = Some(self.status.params.clone());
            self.log.write_best_point(&self.pmap, &self.status)?;
        }
        Ok(())
    }

    /// Backend gradients are reported against physical values; convert to
    /// opt space and flatten.
    fn to_opt_gradient(&self, phys_grad: Array1<f64>) -> Array1<f64> {
        &phys_grad * &self.pmap.scales()
    }

    fn record_status(&mut self, goal: f64, gradient: Option<Vec<f64>>) -> Result<()> {
        self.evaluation += 1;
        self.status = OptimizationStatus {
            goal,
            params: self.pmap.named_values(),
            gradient,
            evaluation: self.evaluation,
            time: timestamp(),
        };
        // Update best, then emit side effects.
        self.track_best()?;
        self.emit_outputs()?;
        self.log.evaluation(&self.status)
    }

    fn emit_outputs(&mut self) -> Result<()> {
        if self.sinks.is_empty() {
            return Ok(());
        }
        let snapshot = EvalSnapshot {
            status: &self.status,
            instruction: self.backend.instruction(),
            propagator: self.backend.propagator(),
            dynamics: self.backend.dynamics(),
        };
        for sink in self.sinks.iter_mut() {
            sink.on_evaluation(&snapshot)?;
        }
        Ok(())
    }

    /// Run the full optimization: open the log bracket, minimize with the
    /// installed algorithm, close the bracket on every exit path, and write
    /// the best values back into the parameter map.
    pub fn optimize(&mut self) -> Result<OptimizationResult> {
        self.begin_logging()?;
        let x0 = self.pmap.opt_vector();
        let options = self.options.clone();

        // The objective adapters borrow the whole optimizer, so take the
        // algorithm out for the duration of the run.
        let algorithm = std::mem::replace(&mut self.algorithm, algorithms::default_algorithm());
        let outcome = if algorithm.uses_gradient() {
            let mut objective = AutogradObjective { optimizer: self };
            algorithm.minimize(&mut objective, x0, &options)
        } else {
            let mut objective = ScalarObjective { optimizer: self };
            algorithm.minimize(&mut objective, x0, &options)
        };
        self.algorithm = algorithm;

        let ended = self.end_logging();
        let algorithm_result = outcome?;
        ended?;

        if let Some(best) = self.current_best_params.clone() {
            for (id, value) in best {
                self.pmap.set_value(&id, value)?;
            }
        }

        Ok(OptimizationResult {
            best_goal: self.current_best_goal,
            best_params: self.current_best_params.clone().unwrap_or_default(),
            evaluations: self.evaluation,
            algorithm_result,
        })
    }
}

/// Wrapper for gradient-free algorithms: plain goal, no gradient access.
struct ScalarObjective<'a> {
    optimizer: &'a mut Optimizer,
}

impl Objective for ScalarObjective<'_> {
    fn evaluate(&mut self, x: &ArrayView1<f64>) -> Result<f64> {
        let goal = self
            .optimizer
            .evaluate_goal(&ParamVector::Plain(x.to_owned()))?;
        Ok(goal.value())
    }

    fn gradient(&mut self, _x: &ArrayView1<f64>) -> Result<Array1<f64>> {
        Err(OptimError::AlgorithmFailed(
            "gradient requested from a gradient-free objective".to_string(),
        )
        .into())
    }
}

/// Wrapper for gradient-based algorithms: evaluation stores the gradient,
/// the gradient callback consumes it from the one-shot cache.
struct AutogradObjective<'a> {
    optimizer: &'a mut Optimizer,
}

impl Objective for AutogradObjective<'_> {
    fn evaluate(&mut self, x: &ArrayView1<f64>) -> Result<f64> {
        let (goal, _) = self.optimizer.evaluate_goal_with_gradient(x)?;
        Ok(goal)
    }

    fn gradient(&mut self, x: &ArrayView1<f64>) -> Result<Array1<f64>> {
        self.optimizer.lookup_gradient(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Quantity;
    use crate::sim::AnalyticBackend;
    use approx::assert_relative_eq;
    use std::collections::VecDeque;
    use std::fs;

    /// Backend that replays a fixed sequence of goals.
    struct ScriptedBackend {
        goals: VecDeque<f64>,
    }

    impl ScriptedBackend {
        fn new(goals: &[f64]) -> Self {
            Self {
                goals: goals.iter().copied().collect(),
            }
        }
    }

    impl GoalBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn goal(&mut self, _pmap: &ParameterMap) -> Result<f64> {
            Ok(self.goals.pop_front().expect("script exhausted"))
        }

        fn goal_with_gradient(
            &mut self,
            pmap: &ParameterMap,
        ) -> Result<(f64, Array1<f64>)> {
            let goal = self.goal(pmap)?;
            Ok((goal, Array1::zeros(pmap.opt_len())))
        }
    }

    fn pmap_2d(x: f64, y: f64) -> ParameterMap {
        let mut pmap = ParameterMap::new();
        pmap.insert("p/x", Quantity::new(x, -5.0, 5.0, "a.u.").unwrap());
        pmap.insert("p/y", Quantity::new(y, -5.0, 5.0, "a.u.").unwrap());
        pmap.set_opt_map(vec!["p/x".into(), "p/y".into()]).unwrap();
        pmap
    }

    fn scripted_optimizer(
        goals: &[f64],
        root: &std::path::Path,
    ) -> Optimizer {
        Optimizer::new(
            pmap_2d(0.0, 0.0),
            Box::new(ScriptedBackend::new(goals)),
            RunLog::new(root.join("run"), "optim.log"),
            Some(Box::new(algorithms::Lbfgs)),
        )
    }

    fn quadratic_optimizer(root: &std::path::Path) -> Optimizer {
        Optimizer::new(
            pmap_2d(0.0, 0.0),
            Box::new(AnalyticBackend::quadratic(vec![1.0, -2.0])),
            RunLog::new(root.join("run"), "optim.log"),
            Some(Box::new(algorithms::Lbfgs)),
        )
    }

    fn plain(values: &[f64]) -> ParamVector {
        ParamVector::Plain(Array1::from_vec(values.to_vec()))
    }

    // =========================================================================
    // Algorithm installation
    // =========================================================================

    #[test]
    fn test_no_algorithm_installs_default_lbfgs() {
        let root = tempfile::tempdir().unwrap();
        let optimizer = Optimizer::new(
            pmap_2d(0.0, 0.0),
            Box::new(ScriptedBackend::new(&[])),
            RunLog::new(root.path().join("run"), "optim.log"),
            None,
        );
        assert_eq!(optimizer.algorithm_name(), "lbfgs");
    }

    #[test]
    fn test_explicit_algorithm_kept() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = scripted_optimizer(&[], root.path());
        optimizer.set_algorithm(Some(Box::new(algorithms::NelderMead)));
        assert_eq!(optimizer.algorithm_name(), "nelder-mead");
    }

    // =========================================================================
    // State machine
    // =========================================================================

    #[test]
    fn test_end_before_begin_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = scripted_optimizer(&[], root.path());
        let result = optimizer.end_logging();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid optimizer state"));
    }

    #[test]
    fn test_evaluate_outside_running_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = scripted_optimizer(&[1.0], root.path());
        assert!(optimizer.evaluate_goal(&plain(&[0.0, 0.0])).is_err());
    }

    #[test]
    fn test_reentering_running_after_finalize_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = scripted_optimizer(&[1.0], root.path());
        optimizer.begin_logging().unwrap();
        optimizer.end_logging().unwrap();

        let again = optimizer.begin_logging();
        assert!(again.is_err());
        assert!(again
            .unwrap_err()
            .to_string()
            .contains("currently Finalized"));
        assert!(optimizer.evaluate_goal(&plain(&[0.0, 0.0])).is_err());
    }

    #[test]
    fn test_double_begin_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = scripted_optimizer(&[], root.path());
        optimizer.begin_logging().unwrap();
        assert!(optimizer.begin_logging().is_err());
    }

    // =========================================================================
    // Goal wrapper variants
    // =========================================================================

    #[test]
    fn test_plain_input_returns_plain_scalar() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = quadratic_optimizer(root.path());
        optimizer.begin_logging().unwrap();

        let x = Array1::from_vec(vec![0.1, 0.1]);
        let goal = optimizer.evaluate_goal(&ParamVector::Plain(x.clone())).unwrap();
        assert!(matches!(goal, GoalValue::Scalar(_)));
        // Plain evaluation never populates the gradient cache.
        assert!(optimizer.lookup_gradient(&x.view()).is_err());
    }

    #[test]
    fn test_tracked_input_stays_tracked() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = quadratic_optimizer(root.path());
        optimizer.begin_logging().unwrap();

        let x = Array1::from_vec(vec![0.1, 0.1]);
        let goal = optimizer
            .evaluate_goal(&ParamVector::Tracked(x.clone()))
            .unwrap();
        assert!(goal.gradient().is_some());
        // Tracked evaluation also leaves the cache alone; caching belongs
        // to evaluate_goal_with_gradient.
        assert!(optimizer.lookup_gradient(&x.view()).is_err());
    }

    #[test]
    fn test_gradient_cached_and_consumed_once() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = quadratic_optimizer(root.path());
        optimizer.begin_logging().unwrap();

        let x = Array1::from_vec(vec![0.2, -0.3]);
        let (_, gradient) = optimizer.evaluate_goal_with_gradient(&x.view()).unwrap();

        let looked_up = optimizer.lookup_gradient(&x.view()).unwrap();
        assert_eq!(looked_up, gradient);

        let second = optimizer.lookup_gradient(&x.view());
        assert!(second.is_err());
        assert!(second
            .unwrap_err()
            .to_string()
            .contains("No cached gradient"));
    }

    #[test]
    fn test_gradient_is_bounds_scaled() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = quadratic_optimizer(root.path());
        optimizer.begin_logging().unwrap();

        // At opt x=(0,0), physical v=(0,0): d goal/dv = 2(v-c) = (-2, 4);
        // opt-space gradient scales by (max-min)/2 = 5.
        let x = Array1::from_vec(vec![0.0, 0.0]);
        let (_, gradient) = optimizer.evaluate_goal_with_gradient(&x.view()).unwrap();
        assert_relative_eq!(gradient[0], -10.0);
        assert_relative_eq!(gradient[1], 20.0);
    }

    #[test]
    fn test_status_snapshot_contents() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = quadratic_optimizer(root.path());
        optimizer.begin_logging().unwrap();

        optimizer.evaluate_goal(&plain(&[0.0, 0.0])).unwrap();
        let status = optimizer.status();
        assert_eq!(status.evaluation, 1);
        assert_relative_eq!(status.params["p/x"], 0.0);
        assert!(status.gradient.is_none());

        let x = Array1::from_vec(vec![0.0, 0.0]);
        optimizer.evaluate_goal_with_gradient(&x.view()).unwrap();
        assert_eq!(optimizer.status().evaluation, 2);
        assert_eq!(optimizer.status().gradient.as_ref().unwrap().len(), 2);
    }

    // =========================================================================
    // Best tracking
    // =========================================================================

    #[test]
    fn test_best_is_min_of_goals() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = scripted_optimizer(&[5.0, 2.0, 3.0], root.path());
        optimizer.begin_logging().unwrap();

        optimizer.evaluate_goal(&plain(&[0.1, 0.0])).unwrap();
        optimizer.evaluate_goal(&plain(&[0.2, 0.0])).unwrap();
        optimizer.evaluate_goal(&plain(&[0.3, 0.0])).unwrap();
        optimizer.end_logging().unwrap();

        assert_relative_eq!(optimizer.current_best_goal(), 2.0);
        // Opt 0.2 over [-5, 5] is physical 1.0.
        let best = optimizer.current_best_params().unwrap();
        assert_relative_eq!(best["p/x"], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_best_keeps_first_occurrence_on_tie() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = scripted_optimizer(&[2.0, 2.0], root.path());
        optimizer.begin_logging().unwrap();

        optimizer.evaluate_goal(&plain(&[0.1, 0.0])).unwrap();
        optimizer.evaluate_goal(&plain(&[0.4, 0.0])).unwrap();

        let best = optimizer.current_best_params().unwrap();
        assert_relative_eq!(best["p/x"], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_best_unchanged_without_evaluations() {
        let root = tempfile::tempdir().unwrap();
        let optimizer = scripted_optimizer(&[], root.path());
        assert_eq!(optimizer.current_best_goal(), GOAL_SENTINEL);
        assert!(optimizer.current_best_params().is_none());
    }

    #[test]
    fn test_best_point_file_written_before_sinks() {
        /// Sink that reads the best-point file as it is notified.
        struct BestFileProbe {
            path: std::path::PathBuf,
            seen: Vec<f64>,
        }
        impl StatusSink for BestFileProbe {
            fn on_evaluation(&mut self, _snapshot: &EvalSnapshot<'_>) -> Result<()> {
                let content = fs::read_to_string(&self.path)?;
                let doc: serde_json::Value = serde_json::from_str(&content).unwrap();
                self.seen.push(doc["optim_status"]["goal"].as_f64().unwrap());
                Ok(())
            }
        }

        let root = tempfile::tempdir().unwrap();
        let log = RunLog::new(root.path().join("run"), "optim.log");
        let best_path = log.best_path();
        let mut optimizer = Optimizer::new(
            pmap_2d(0.0, 0.0),
            Box::new(ScriptedBackend::new(&[5.0, 2.0])),
            log,
            Some(Box::new(algorithms::Lbfgs)),
        );
        optimizer.add_sink(Box::new(BestFileProbe {
            path: best_path.clone(),
            seen: Vec::new(),
        }));
        optimizer.begin_logging().unwrap();
        optimizer.evaluate_goal(&plain(&[0.0, 0.0])).unwrap();
        optimizer.evaluate_goal(&plain(&[0.1, 0.0])).unwrap();

        // At each emission the file already reflected the new best.
        let content = fs::read_to_string(&best_path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(doc["optim_status"]["goal"], 2.0);
    }

    // =========================================================================
    // End-to-end logging
    // =========================================================================

    #[test]
    fn test_three_evaluations_log_layout() {
        let root = tempfile::tempdir().unwrap();
        let log = RunLog::new(root.path().join("run"), "optim.log");
        let log_path = log.log_path();
        let best_path = log.best_path();
        let mut optimizer = Optimizer::new(
            pmap_2d(0.0, 0.0),
            Box::new(ScriptedBackend::new(&[5.0, 2.0, 3.0])),
            log,
            Some(Box::new(algorithms::Lbfgs)),
        );

        optimizer.begin_logging().unwrap();
        optimizer.evaluate_goal(&plain(&[0.1, 0.0])).unwrap();
        optimizer.evaluate_goal(&plain(&[0.2, 0.0])).unwrap();
        optimizer.evaluate_goal(&plain(&[0.3, 0.0])).unwrap();
        optimizer.end_logging().unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.matches("Starting optimization at").count(), 1);
        assert_eq!(content.matches("Finished evaluation").count(), 3);
        assert_eq!(content.matches("Finished at").count(), 1);

        let runtime: f64 = content
            .lines()
            .find(|l| l.starts_with("Total runtime:"))
            .and_then(|l| l.split(": ").nth(1))
            .unwrap()
            .parse()
            .unwrap();
        assert!(runtime >= 0.0);

        let best: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&best_path).unwrap()).unwrap();
        assert_eq!(best["optim_status"]["goal"], 2.0);
        assert_relative_eq!(
            best["optim_status"]["params"]["p/x"].as_f64().unwrap(),
            1.0,
            epsilon = 1e-12
        );
    }

    // =========================================================================
    // Full driver
    // =========================================================================

    #[test]
    fn test_optimize_quadratic_with_lbfgs() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = quadratic_optimizer(root.path());
        let result = optimizer.optimize().unwrap();

        assert!(result.best_goal < 1e-8, "goal was {}", result.best_goal);
        assert!(result.evaluations > 0);
        // Best values written back into the map.
        assert_relative_eq!(optimizer.pmap().value("p/x").unwrap(), 1.0, epsilon = 1e-3);
        assert_relative_eq!(optimizer.pmap().value("p/y").unwrap(), -2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_optimize_quadratic_with_nelder_mead() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = Optimizer::new(
            pmap_2d(0.0, 0.0),
            Box::new(AnalyticBackend::quadratic(vec![1.0, -2.0])),
            RunLog::new(root.path().join("run"), "optim.log"),
            Some(Box::new(algorithms::NelderMead)),
        );
        optimizer.set_options(AlgorithmOptions {
            max_iterations: 500,
            tolerance: 1e-12,
            ..Default::default()
        });
        let result = optimizer.optimize().unwrap();
        assert!(result.best_goal < 1e-6, "goal was {}", result.best_goal);
    }

    #[test]
    fn test_optimize_finalizes_log_on_failure() {
        struct FailingBackend;
        impl GoalBackend for FailingBackend {
            fn name(&self) -> &str {
                "failing"
            }
            fn goal(&mut self, _pmap: &ParameterMap) -> Result<f64> {
                Err(crate::error::BackendError::Evaluation("diverged".into()).into())
            }
            fn goal_with_gradient(
                &mut self,
                _pmap: &ParameterMap,
            ) -> Result<(f64, Array1<f64>)> {
                Err(crate::error::BackendError::Evaluation("diverged".into()).into())
            }
        }

        let root = tempfile::tempdir().unwrap();
        let log = RunLog::new(root.path().join("run"), "optim.log");
        let log_path = log.log_path();
        let mut optimizer = Optimizer::new(
            pmap_2d(0.0, 0.0),
            Box::new(FailingBackend),
            log,
            Some(Box::new(algorithms::Lbfgs)),
        );

        assert!(optimizer.optimize().is_err());
        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("Starting optimization at"));
        assert!(content.contains("Total runtime:"));
    }

    #[test]
    fn test_created_by_recorded() {
        let root = tempfile::tempdir().unwrap();
        let mut optimizer = scripted_optimizer(&[], root.path());
        assert!(optimizer.created_by().is_none());
        optimizer.set_created_by("configs/rx90p.yaml");
        assert_eq!(
            optimizer.created_by().unwrap().to_string_lossy(),
            "configs/rx90p.yaml"
        );
    }
}
