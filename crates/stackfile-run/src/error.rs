//! Error types for stackfile-run

use stackfile_core::ReleaseId;
use std::time::Duration;
use thiserror::Error;

/// Result type for graph building
pub type Result<T> = std::result::Result<T, GraphError>;

/// Consistency errors found before anything is scheduled
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// Two or more releases share `(context, namespace, name)`
    #[error("found {count} duplicate releases with ID \"{id}\"")]
    Duplicate { id: ReleaseId, count: usize },

    /// A `needs` target exists but is excluded by the active selectors
    #[error(
        "release \"{release}\" depends on \"{dependency}\" which does not match the selectors. Please add a selector like \"--selector name={name}\", or indicate whether to skip (--skip-needs) or include (--include-needs) these dependencies"
    )]
    Unselected {
        release: ReleaseId,
        dependency: ReleaseId,
        name: String,
    },

    /// A `needs` target does not exist anywhere
    #[error(
        "release(s) \"{}\" depend(s) on an undefined release \"{dependency}\". Perhaps you made a typo in \"needs\" or forgot defining a release named \"{name}\" with appropriate \"namespace\" and \"kubeContext\"?",
        join_ids(releases)
    )]
    Undefined {
        releases: Vec<ReleaseId>,
        dependency: ReleaseId,
        name: String,
    },

    /// The needs graph is not acyclic
    #[error("dependency cycle detected: {}", join_chain(chain))]
    Cycle { chain: Vec<ReleaseId> },
}

fn join_ids(ids: &[ReleaseId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\", \"")
}

fn join_chain(ids: &[ReleaseId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Failures of a single chart executor call
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("command \"{command}\" exited with code {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("unexpected output from {command}: {message}")]
    Output { command: String, message: String },

    #[error("{0}")]
    Other(String),

    /// Any of the above, attributed to a release
    #[error("release \"{release}\": {source}")]
    Release {
        release: ReleaseId,
        source: Box<ExecError>,
    },
}

impl ExecError {
    /// Attribute this error to a release, once
    pub fn for_release(self, release: &ReleaseId) -> Self {
        match self {
            Self::Release { .. } => self,
            other => Self::Release {
                release: release.clone(),
                source: Box::new(other),
            },
        }
    }
}

/// Aggregate failure of a run: every failed and skipped release
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}", self.render())]
pub struct RunError {
    /// Failed releases with their error message
    pub failed: Vec<(ReleaseId, String)>,

    /// Skipped releases with the failed release that blocked them
    pub skipped: Vec<(ReleaseId, ReleaseId)>,
}

impl RunError {
    fn render(&self) -> String {
        let mut lines = vec![format!(
            "{} release(s) failed, {} skipped",
            self.failed.len(),
            self.skipped.len()
        )];
        for (id, message) in &self.failed {
            lines.push(format!("  failed {}: {}", id, message));
        }
        for (id, because) in &self.skipped {
            lines.push(format!("  skipped {}: dependency {} failed", id, because));
        }
        lines.join("\n")
    }
}
