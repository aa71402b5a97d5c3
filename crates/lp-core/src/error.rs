//! Core error types for live-poll

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a session-altering command is rejected.
///
/// These never reach the client; the coordinator logs them and drops the
/// command without changing state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Question is missing or blank
    #[error("Poll question is empty")]
    EmptyQuestion,

    /// Fewer than two usable options after trimming
    #[error("Poll needs at least 2 distinct non-empty options, got {0}")]
    TooFewOptions(usize),

    /// More options than the configured limit
    #[error("Poll has {got} options, maximum is {max}")]
    TooManyOptions { got: usize, max: usize },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
