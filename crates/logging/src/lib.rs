//! Stakeledger Logging
//!
//! One place to install the global `tracing` subscriber. Components never
//! touch it; they only emit through the `tracing` macros.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{fmt as fmt_layer, prelude::*, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `Debug` when verbose, `Info` otherwise.
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::Debug
        } else {
            Self::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Filter used when `RUST_LOG` is unset: stakeledger crates at `level`,
/// everything else at `warn`.
pub fn default_filter(level: LogLevel) -> String {
    let crates = [
        "stakeledger_core",
        "stakeledger_store",
        "stakeledger_aggregator",
        "stakeledger_settings",
        "stakeledger_app",
        "stakeledger",
    ];
    let mut directives = vec!["warn".to_string()];
    directives.extend(crates.iter().map(|c| format!("{c}={level}")));
    directives.join(",")
}

/// Install a fmt subscriber. `RUST_LOG` takes precedence over `level`.
pub fn try_init(level: LogLevel) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter(level))
            .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer::layer().with_target(true))
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

/// Like [`try_init`], but an already installed subscriber is not an error.
pub fn init(level: LogLevel) {
    let _ = try_init(level);
}
