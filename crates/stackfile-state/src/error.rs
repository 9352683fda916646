//! Error types for stackfile-state

use stackfile_core::CoreError;
use stackfile_engine::{EngineError, TemplateError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for state loading
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that abort a state load
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateError {
    /// A state, base or values file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Rendered document is not valid state YAML
    #[error("failed to parse {name}: {source}")]
    Parse {
        name: String,
        source: serde_yaml::Error,
    },

    /// Template rendering failed
    #[error(transparent)]
    Template(Box<TemplateError>),

    /// Selector, values or needs syntax error
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("environment \"{name}\" is not defined")]
    UndefinedEnvironment {
        name: String,
        suggestion: Option<String>,
    },

    #[error("environment values file matching \"{pattern}\" does not exist in \"{dir}\"")]
    MissingEnvironmentValues { pattern: String, dir: String },

    #[error("values file \"{path}\" of release \"{release}\" does not exist")]
    MissingReleaseValues { release: String, path: String },

    #[error("no matches for path: {pattern}")]
    NoMatches { pattern: String },

    #[error("invalid glob pattern \"{pattern}\": {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("inclusion cycle detected: {chain}")]
    InclusionCycle { chain: String },

    #[error("cannot use 'selectorsInherited: true' along with explicit selectors for path: {path}")]
    ConflictingSelectors { path: String },

    #[error("invalid condition \"{condition}\" for release \"{release}\": expected the form `<key>.enabled`")]
    InvalidCondition { release: String, condition: String },

    #[error("condition \"{condition}\" for release \"{release}\" must be a boolean, found {found}")]
    ConditionNotBool {
        release: String,
        condition: String,
        found: &'static str,
    },

    #[error(
        "no releases found that matches specified selector({selector}) and environment({environment}), in any helmfile"
    )]
    NoReleasesFound {
        selector: String,
        environment: String,
    },

    /// Error raised while processing a state file
    #[error("in {path}: {cause}")]
    InFile {
        path: String,
        cause: Box<StateError>,
    },

    /// Error raised by a nested inclusion
    #[error("in .helmfiles[{index}]: {cause}")]
    InInclusion {
        index: usize,
        cause: Box<StateError>,
    },

    /// Error raised by a base document
    #[error("in .bases[{index}]: {cause}")]
    InBase {
        index: usize,
        cause: Box<StateError>,
    },
}

impl StateError {
    pub(crate) fn in_file(self, path: impl Into<String>) -> Self {
        Self::InFile {
            path: path.into(),
            cause: Box::new(self),
        }
    }

    pub(crate) fn in_inclusion(self, index: usize) -> Self {
        Self::InInclusion {
            index,
            cause: Box::new(self),
        }
    }

    pub(crate) fn in_base(self, index: usize) -> Self {
        Self::InBase {
            index,
            cause: Box::new(self),
        }
    }

    /// The innermost error, with path annotations peeled off
    pub fn root_cause(&self) -> &StateError {
        match self {
            Self::InFile { cause, .. }
            | Self::InInclusion { cause, .. }
            | Self::InBase { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// The annotation chain leading to the root cause (`in a.yaml: in .helmfiles[0]: `)
    pub fn location(&self) -> String {
        match self {
            Self::InFile { path, cause } => format!("in {}: {}", path, cause.location()),
            Self::InInclusion { index, cause } => {
                format!("in .helmfiles[{}]: {}", index, cause.location())
            }
            Self::InBase { index, cause } => format!("in .bases[{}]: {}", index, cause.location()),
            _ => String::new(),
        }
    }

    /// Help text for the root cause, if any
    pub fn help(&self) -> Option<&str> {
        match self.root_cause() {
            Self::UndefinedEnvironment { suggestion, .. } => suggestion.as_deref(),
            Self::Template(e) => e.suggestion.as_deref(),
            _ => None,
        }
    }
}

impl From<TemplateError> for StateError {
    fn from(err: TemplateError) -> Self {
        Self::Template(Box::new(err))
    }
}

impl From<EngineError> for StateError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Template(e) => e.into(),
            EngineError::Io(source) => Self::Read {
                path: PathBuf::new(),
                source,
            },
        }
    }
}
