// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the optimizer.

use std::fmt;

/// Result type alias for optimizer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error types.
#[derive(Debug)]
pub enum Error {
    /// Configuration error
    Config(String),
    /// Simulation backend error
    Backend(BackendError),
    /// Optimization loop error
    Optim(OptimError),
    /// Signal/instruction assembly error
    Signal(SignalError),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Backend(e) => write!(f, "Backend error: {}", e),
            Error::Optim(e) => write!(f, "Optimization error: {}", e),
            Error::Signal(e) => write!(f, "Signal error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Backend(e) => Some(e),
            Error::Optim(e) => Some(e),
            Error::Signal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Error::Backend(e)
    }
}

impl From<OptimError> for Error {
    fn from(e: OptimError) -> Self {
        Error::Optim(e)
    }
}

impl From<SignalError> for Error {
    fn from(e: SignalError) -> Self {
        Error::Signal(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Simulation-backend errors.
#[derive(Debug)]
pub enum BackendError {
    /// The backend does not implement the differentiable evaluation path
    NotDifferentiable(String),
    /// Goal evaluation failed
    Evaluation(String),
    /// Parameter vector length does not match the backend's expectation
    Dimension { expected: usize, actual: usize },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotDifferentiable(name) => {
                write!(f, "Backend '{}' is not differentiable", name)
            }
            BackendError::Evaluation(msg) => write!(f, "Evaluation failed: {}", msg),
            BackendError::Dimension { expected, actual } => {
                write!(
                    f,
                    "Parameter dimension mismatch: expected {}, got {}",
                    expected, actual
                )
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Optimization-loop errors.
#[derive(Debug)]
pub enum OptimError {
    /// No cached gradient exists for the given parameter key
    GradientNotFound(String),
    /// Operation not allowed in the optimizer's current state
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
    /// The minimization algorithm failed
    AlgorithmFailed(String),
    /// Unknown algorithm name in configuration
    UnknownAlgorithm(String),
}

impl fmt::Display for OptimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimError::GradientNotFound(key) => {
                write!(f, "No cached gradient for key '{}'", key)
            }
            OptimError::InvalidState { expected, actual } => {
                write!(
                    f,
                    "Invalid optimizer state: expected {}, currently {}",
                    expected, actual
                )
            }
            OptimError::AlgorithmFailed(msg) => write!(f, "Algorithm failed: {}", msg),
            OptimError::UnknownAlgorithm(name) => write!(f, "Unknown algorithm: {}", name),
        }
    }
}

impl std::error::Error for OptimError {}

/// Signal/instruction errors.
#[derive(Debug)]
pub enum SignalError {
    /// Component added to a channel the instruction does not declare
    UnknownChannel { channel: String, instruction: String },
    /// Instruction time window is inverted
    InvalidWindow { t_start: f64, t_end: f64 },
    /// Unknown envelope shape name in configuration
    UnknownShape(String),
    /// Envelope is missing a required parameter
    MissingParam { component: String, param: String },
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalError::UnknownChannel {
                channel,
                instruction,
            } => {
                write!(
                    f,
                    "Channel '{}' is not declared by instruction '{}'",
                    channel, instruction
                )
            }
            SignalError::InvalidWindow { t_start, t_end } => {
                write!(
                    f,
                    "Invalid time window: t_end {} < t_start {}",
                    t_end, t_start
                )
            }
            SignalError::UnknownShape(name) => write!(f, "Unknown envelope shape: {}", name),
            SignalError::MissingParam { component, param } => {
                write!(
                    f,
                    "Component '{}' is missing parameter '{}'",
                    component, param
                )
            }
        }
    }
}

impl std::error::Error for SignalError {}
