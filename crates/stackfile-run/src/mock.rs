//! In-memory chart executor for tests
//!
//! Records every call in order and answers from scripted per-release
//! results, without touching a cluster.

use async_trait::async_trait;
use stackfile_core::{Release, ReleaseStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ExecError;
use crate::executor::{ChartExecutor, ExecFlags};

/// Executor operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Diff,
    Apply,
    Delete,
    Status,
}

/// A recorded call: operation and release name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub release: String,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    diffs: HashMap<String, bool>,
    statuses: HashMap<String, ReleaseStatus>,
    failures: HashMap<(String, Operation), String>,
}

/// Scripted executor keyed by release name
///
/// Diffs report a change and releases are not installed unless scripted
/// otherwise. A successful apply marks the release deployed, a delete marks
/// it not installed.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the diff result for `release`
    pub fn with_diff(self, release: &str, changed: bool) -> Self {
        self.lock().diffs.insert(release.to_string(), changed);
        self
    }

    /// Script the live status of `release`
    pub fn with_status(self, release: &str, status: ReleaseStatus) -> Self {
        self.lock().statuses.insert(release.to_string(), status);
        self
    }

    /// Make `operation` on `release` fail with `message`
    pub fn fail_on(self, release: &str, operation: Operation, message: &str) -> Self {
        self.lock()
            .failures
            .insert((release.to_string(), operation), message.to_string());
        self
    }

    /// Every call, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn diffed(&self) -> Vec<String> {
        self.names(Operation::Diff)
    }

    pub fn applied(&self) -> Vec<String> {
        self.names(Operation::Apply)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.names(Operation::Delete)
    }

    fn names(&self, operation: Operation) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.release.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and return the scripted failure, if any
    fn record(&self, release: &Release, operation: Operation) -> Result<(), ExecError> {
        let mut state = self.lock();
        state.calls.push(Call {
            operation,
            release: release.name().to_string(),
        });
        match state.failures.get(&(release.name().to_string(), operation)) {
            Some(message) => Err(ExecError::Other(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChartExecutor for MockExecutor {
    async fn diff(&self, release: &Release, _flags: ExecFlags) -> Result<bool, ExecError> {
        self.record(release, Operation::Diff)?;
        Ok(self.lock().diffs.get(release.name()).copied().unwrap_or(true))
    }

    async fn apply(&self, release: &Release, _flags: ExecFlags) -> Result<(), ExecError> {
        self.record(release, Operation::Apply)?;
        self.lock()
            .statuses
            .insert(release.name().to_string(), ReleaseStatus::Deployed);
        Ok(())
    }

    async fn delete(&self, release: &Release) -> Result<(), ExecError> {
        self.record(release, Operation::Delete)?;
        self.lock()
            .statuses
            .insert(release.name().to_string(), ReleaseStatus::NotInstalled);
        Ok(())
    }

    async fn status(&self, release: &Release) -> Result<ReleaseStatus, ExecError> {
        self.record(release, Operation::Status)?;
        Ok(self
            .lock()
            .statuses
            .get(release.name())
            .copied()
            .unwrap_or_default())
    }
}
