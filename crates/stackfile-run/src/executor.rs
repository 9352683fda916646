//! Chart executor contract and the per-run executor registry

use async_trait::async_trait;
use stackfile_core::{Release, ReleaseStatus};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ExecError;
use crate::helm::HelmExecutor;

/// Flags passed through to every executor call of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecFlags {
    /// Drop values stored with the live release instead of reusing them
    pub reset_values: bool,
}

/// The tool performing diff, install and delete against a live system
///
/// One handle serves every release with the same `(binary, context)` and
/// is called concurrently from scheduler workers.
#[async_trait]
pub trait ChartExecutor: Send + Sync {
    /// Whether applying `release` would change anything
    async fn diff(&self, release: &Release, flags: ExecFlags) -> Result<bool, ExecError>;

    /// Install or upgrade `release`
    async fn apply(&self, release: &Release, flags: ExecFlags) -> Result<(), ExecError>;

    /// Uninstall `release`
    async fn delete(&self, release: &Release) -> Result<(), ExecError>;

    /// Live status of `release`
    async fn status(&self, release: &Release) -> Result<ReleaseStatus, ExecError>;
}

/// Registry key: executor binary and kube context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutorKey {
    pub binary: String,
    pub context: String,
}

impl ExecutorKey {
    pub fn for_release(release: &Release) -> Self {
        Self {
            binary: release.helm_binary.clone(),
            context: release.id.context.clone(),
        }
    }
}

impl fmt::Display for ExecutorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}", self.binary)
        } else {
            write!(f, "{}@{}", self.binary, self.context)
        }
    }
}

type Factory = dyn Fn(&ExecutorKey) -> Arc<dyn ChartExecutor> + Send + Sync;

/// Executor handles owned by a run, created on first use per key
pub struct ExecutorRegistry {
    factory: Box<Factory>,
    handles: Mutex<HashMap<ExecutorKey, Arc<dyn ChartExecutor>>>,
}

impl ExecutorRegistry {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&ExecutorKey) -> Arc<dyn ChartExecutor> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Registry spawning a [`HelmExecutor`] per key
    pub fn helm() -> Self {
        Self::new(|key| Arc::new(HelmExecutor::new(&key.binary, &key.context)) as Arc<dyn ChartExecutor>)
    }

    /// Registry handing out the same executor for every key
    pub fn shared(executor: Arc<dyn ChartExecutor>) -> Self {
        Self::new(move |_| Arc::clone(&executor))
    }

    pub fn get(&self, key: &ExecutorKey) -> Arc<dyn ChartExecutor> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            handles
                .entry(key.clone())
                .or_insert_with(|| (self.factory)(key)),
        )
    }

    pub fn for_release(&self, release: &Release) -> Arc<dyn ChartExecutor> {
        self.get(&ExecutorKey::for_release(release))
    }

    /// Number of handles created so far
    pub fn len(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("handles", &self.len())
            .finish()
    }
}
