//! CLI error type.

use std::fmt;
use std::io;

use assetfs::config::ConfigError;
use assetfs::logging::LoggingError;
use assetfs::AssetError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is inconsistent.
    Config(String),
    /// Bad command-line argument.
    InvalidArgument(String),
    /// Resolution or traversal failure.
    Asset(AssetError),
    /// Logging could not be set up.
    Logging(String),
    /// HTTP server failure.
    Serve(String),
    /// Terminal or file I/O.
    Io(io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Asset(e) => write!(f, "{}", e),
            CliError::Logging(msg) => write!(f, "Logging error: {}", msg),
            CliError::Serve(msg) => write!(f, "Server error: {}", msg),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Asset(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AssetError> for CliError {
    fn from(e: AssetError) -> Self {
        CliError::Asset(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e.to_string())
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

/// Unwrap a command result or exit the process with status 1.
///
/// Only `main` calls this; commands return errors.
pub fn must<T>(result: Result<T, CliError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
