//! lp-core: Core configuration and error types for live-poll
//!
//! This crate provides the configuration structures, error taxonomy, and
//! small shared helpers used by the coordinator daemon.

pub mod config;
pub mod error;
pub mod time;

pub use config::{PollPolicy, ServerConfig};
pub use error::{CommandError, ConfigError};
