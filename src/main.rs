// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! qoctl CLI
//!
//! Drives pulse-parameter optimization from a YAML configuration file.
//!
//! # Usage
//!
//! ```bash
//! # Run the optimization described by qoctl.yaml
//! qoctl optimize
//!
//! # Run with a custom config and algorithm
//! qoctl optimize --config rx90p.yaml --algorithm nelder-mead
//!
//! # Validate a configuration file
//! qoctl validate --config rx90p.yaml
//!
//! # Show the best point of the most recent run
//! qoctl best
//! ```

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qoctl::config::Config;
use qoctl::error::{Error, Result};
use qoctl::optim::algorithms::algorithm_by_name;
use qoctl::optim::{Optimizer, RunLog};
use qoctl::output::FileOutputs;
use qoctl::VERSION;

/// Quantum optimal-control optimizer
#[derive(Parser)]
#[command(name = "qoctl")]
#[command(author = "qoctl Contributors")]
#[command(version = VERSION)]
#[command(about = "Pulse-level gate calibration through goal minimization")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the optimization described by the configuration
    Optimize {
        /// Algorithm override
        #[arg(long, env = "QOCTL_ALGORITHM")]
        algorithm: Option<String>,

        /// Run directory override
        #[arg(long)]
        logdir: Option<PathBuf>,

        /// Seed start values from a previous best-point file
        #[arg(long)]
        from_best: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,

    /// Show effective configuration
    Config,

    /// Show the best point of the configured run directory
    Best,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Optimize {
            algorithm,
            logdir,
            from_best,
        } => {
            // Override config with CLI args
            if let Some(name) = algorithm {
                config.algorithm.name = name;
            }
            if let Some(dir) = logdir {
                config.run.logdir = dir.display().to_string();
            }

            config.validate()?;

            let experiment_config = config.experiment.as_ref().ok_or_else(|| {
                Error::Config("configuration has no experiment section".into())
            })?;
            let (experiment, pmap) = experiment_config.build()?;

            let algorithm = if config.algorithm.name.is_empty() {
                None
            } else {
                Some(algorithm_by_name(&config.algorithm.name)?)
            };

            let log = RunLog::new(&config.run.logdir, config.run.logname.as_str());
            let mut optimizer = Optimizer::new(pmap, Box::new(experiment), log, algorithm);
            optimizer.set_options(config.algorithm.options.clone());
            if let Some(path) = &cli.config {
                optimizer.set_created_by(path);
            }
            if let Some(path) = &from_best {
                optimizer.load_best(path)?;
            }

            let flags = config.outputs.flags;
            if flags.write_dynamics || flags.write_pulses || flags.store_unitaries {
                optimizer.add_sink(Box::new(FileOutputs::new(
                    &config.outputs.directory,
                    flags,
                )?));
            }

            info!(
                version = VERSION,
                algorithm = optimizer.algorithm_name(),
                logdir = %config.run.logdir,
                "Starting optimization"
            );

            let result = optimizer.optimize()?;

            println!(
                "Best goal {:e} after {} evaluations (converged: {})",
                result.best_goal, result.evaluations, result.algorithm_result.converged
            );
            for (id, value) in &result.best_params {
                println!("  {} = {:e}", id, value);
            }
        }

        Commands::Validate => match config.validate() {
            Ok(()) => {
                println!("Configuration is valid");
            }
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
        },

        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
        }

        Commands::Best => {
            let path =
                RunLog::new(&config.run.logdir, config.run.logname.as_str()).best_path();
            match fs::read_to_string(&path) {
                Ok(content) => print!("{}", content),
                Err(e) => {
                    eprintln!("No best point at {}: {}", path.display(), e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
