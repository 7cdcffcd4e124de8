//! CLI error type.

use std::fmt;

use webwalker::config::ConfigError;
use webwalker::graph::{GraphError, NavigationError};
use webwalker::logging::LoggingError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be used.
    Config(ConfigError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// An input image could not be read.
    Image { path: String, message: String },

    /// The navigation graph could not be loaded.
    Graph(GraphError),

    /// No route between the requested tiles.
    Navigation(NavigationError),

    /// Invalid command-line input.
    Usage(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Image { path, message } => {
                write!(f, "Failed to read image {}: {}", path, message)
            }
            CliError::Graph(e) => write!(f, "Failed to load graph: {}", e),
            CliError::Navigation(e) => write!(f, "{}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Graph(e) => Some(e),
            CliError::Navigation(e) => Some(e),
            CliError::Image { .. } | CliError::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<GraphError> for CliError {
    fn from(e: GraphError) -> Self {
        CliError::Graph(e)
    }
}

impl From<NavigationError> for CliError {
    fn from(e: NavigationError) -> Self {
        CliError::Navigation(e)
    }
}
