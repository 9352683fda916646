//! CLI error types with exit code handling
//!
//! Every failure surfaced by a command is a [`CliError`], which knows the
//! exit code it maps to.

use miette::Diagnostic;
use stackfile_run::{GraphError, RunError};
use stackfile_state::StateError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Loading the state failed
    #[error("{message}")]
    #[diagnostic(code(stackfile::state))]
    State {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The release graph is inconsistent
    #[error("{message}")]
    #[diagnostic(code(stackfile::graph))]
    Graph { message: String },

    /// One or more releases failed or were skipped
    #[error("{message}")]
    #[diagnostic(code(stackfile::release))]
    Releases { message: String },

    /// Invalid arguments or options
    #[error("{message}")]
    #[diagnostic(code(stackfile::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(stackfile::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(stackfile::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::State { .. } | CliError::Graph { .. } => exit_codes::STATE_ERROR,
            CliError::Releases { .. } => exit_codes::RELEASE_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } | CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<StateError> for CliError {
    fn from(err: StateError) -> Self {
        CliError::State {
            help: err.help().map(str::to_string),
            message: err.to_string(),
        }
    }
}

impl From<GraphError> for CliError {
    fn from(err: GraphError) -> Self {
        CliError::Graph {
            message: err.to_string(),
        }
    }
}

impl From<RunError> for CliError {
    fn from(err: RunError) -> Self {
        CliError::Releases {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_keeps_help() {
        let err: CliError = StateError::UndefinedEnvironment {
            name: "prod".to_string(),
            suggestion: Some("Did you mean `production`?".to_string()),
        }
        .into();

        assert_eq!(err.exit_code(), exit_codes::STATE_ERROR);
        assert!(matches!(&err, CliError::State { help: Some(h), .. } if h.contains("production")));
    }

    #[test]
    fn test_exit_codes() {
        let run = CliError::from(RunError {
            failed: Vec::new(),
            skipped: Vec::new(),
        });
        assert_eq!(run.exit_code(), exit_codes::RELEASE_ERROR);
        assert_eq!(
            CliError::usage_with_help("bad", "try --help").exit_code(),
            exit_codes::USAGE_ERROR
        );
    }
}
