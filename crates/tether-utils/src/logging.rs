//! # Logging Utilities
//!
//! Logging infrastructure for Tether using `tracing`.
//!
//! This module provides structured logging with support for:
//! - Two output formats (JSON for machines, pretty for people)
//! - Environment variable configuration
//! - Optional file output next to the console
//!
//! Console output goes to stderr, so whatever a binary prints on stdout stays
//! machine readable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether_utils::init_logging;
//!
//! // Initialize with default settings (reads from RUST_LOG env var)
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! // Use tracing macros throughout your code
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=tether_core=trace`)
//! - `TETHER_LOG_FORMAT`: Set output format (`json` or `pretty`, default: `pretty`)
//! - `TETHER_LOG_FILE`: Optional log file, rotated daily. If it names a
//!   directory, a dated `YYYY-MM-DD-tether.log` is created inside it instead.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use tether_utils::{LogFormat, LogLevel, init_logging_with_level};
//!
//! // Keep the guard alive for as long as logs should reach the file
//! let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
//!     .expect("Failed to initialize logging");
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, io};

use chrono::{NaiveDate, Utc};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "TETHER_LOG_FORMAT";
/// Environment variable naming the log file
pub const LOG_FILE_ENV: &str = "TETHER_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    #[default]
    Pretty,
    /// JSON format, one object per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Resolved logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogConfig
{
    pub format: LogFormat,
    /// Overrides `RUST_LOG` when set
    pub level: Option<LogLevel>,
    /// Value of `TETHER_LOG_FILE`
    pub file: Option<PathBuf>,
}

impl LogConfig
{
    /// Read the configuration from the environment.
    ///
    /// ## Errors
    ///
    /// `InvalidFormat` if `TETHER_LOG_FORMAT` is set to something unknown.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        Self::from_values(env::var(LOG_FORMAT_ENV).ok().as_deref(), env::var_os(LOG_FILE_ENV).map(PathBuf::from))
    }

    /// Build the configuration from raw variable values.
    ///
    /// Empty values count as unset.
    ///
    /// ## Errors
    ///
    /// `InvalidFormat` if `format` is not a known format name.
    pub fn from_values(format: Option<&str>, file: Option<PathBuf>) -> Result<Self, LoggingError>
    {
        let format = match format.filter(|value| !value.is_empty()) {
            Some(value) => LogFormat::from_str(value).map_err(LoggingError::InvalidFormat)?,
            None => LogFormat::default(),
        };

        Ok(Self {
            format,
            level: None,
            file: file.filter(|path| !path.as_os_str().is_empty()),
        })
    }
}

/// Keeps file logging alive
///
/// Log lines reach the file through a background writer; dropping the guard
/// flushes it and stops it. Hold it until the program exits.
#[derive(Debug)]
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging with default settings
///
/// Reads configuration from environment variables:
/// - `RUST_LOG`: Log level filter (e.g., `debug`, `tether_core=debug`)
/// - `TETHER_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
/// - `TETHER_LOG_FILE`: Optional path to log file
///
/// ## Example
///
/// ```rust,no_run
/// use tether_utils::init_logging;
///
/// let _guard = init_logging().expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - `TETHER_LOG_FORMAT` has an unknown value
/// - The log file can not be created (if `TETHER_LOG_FILE` is set)
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_with_config(&LogConfig::from_env()?)
}

/// Initialize logging with explicit level and format
///
/// The level takes precedence over `RUST_LOG`. `TETHER_LOG_FILE` is still
/// honoured.
///
/// ## Example
///
/// ```rust,no_run
/// use tether_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    let config = LogConfig {
        format,
        level: Some(level),
        file: env::var_os(LOG_FILE_ENV).map(PathBuf::from).filter(|path| !path.as_os_str().is_empty()),
    };
    init_with_config(&config)
}

/// Initialize logging from an explicit configuration
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_with_config(config: &LogConfig) -> Result<LoggingGuard, LoggingError>
{
    let env_filter = build_filter(config.level);

    let (file_writer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let result = match config.format {
        LogFormat::Pretty => {
            let console_layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_writer(io::stderr)
                .with_filter(env_filter.clone());

            let file_layer = file_writer.map(|writer: NonBlocking| {
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false) // No ANSI in files
                    .with_filter(env_filter)
            });

            Registry::default().with(console_layer).with(file_layer).try_init()
        }
        LogFormat::Json => {
            let console_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(io::stderr)
                .with_filter(env_filter.clone());

            let file_layer = file_writer.map(|writer: NonBlocking| {
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(env_filter)
            });

            Registry::default().with(console_layer).with(file_layer).try_init()
        }
    };

    result.map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    Ok(LoggingGuard { _file: guard })
}

/// Build the level filter
///
/// Priority:
/// 1. An explicit level (from the `--log-level` CLI flag)
/// 2. `RUST_LOG` (supports module-specific filters like `tether_core=debug`)
/// 3. `INFO`
fn build_filter(explicit_level: Option<LogLevel>) -> EnvFilter
{
    match explicit_level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    }
}

/// Where file logs go and how they rotate
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileTarget
{
    directory: PathBuf,
    file_name: String,
    daily: bool,
}

/// Resolve `TETHER_LOG_FILE` into a directory and file name.
///
/// A directory gets a dated file that is never rotated (the date is already
/// in the name); a file path is rotated daily.
fn file_target(path: &Path, is_dir: bool, today: NaiveDate) -> FileTarget
{
    if is_dir {
        return FileTarget {
            directory: path.to_path_buf(),
            file_name: format!("{}-tether.log", today.format("%Y-%m-%d")),
            daily: false,
        };
    }

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map_or_else(|| "tether.log".to_string(), |name| name.to_string_lossy().into_owned());

    FileTarget {
        directory,
        file_name,
        daily: true,
    }
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, LoggingError>
{
    let target = file_target(path, path.is_dir(), Utc::now().date_naive());
    fs::create_dir_all(&target.directory)?;

    let rotation = if target.daily {
        Rotation::DAILY
    } else {
        Rotation::NEVER
    };

    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(target.file_name)
        .build(&target.directory)
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
