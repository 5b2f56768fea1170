//! # Tether Utilities
//!
//! Shared utilities and logging for Tether.
//!
//! This crate provides the ambient pieces used across the Tether workspace,
//! most importantly the logging setup built on `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_with_level, init_with_config, LogConfig, LogFormat, LogLevel, LoggingError, LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};
