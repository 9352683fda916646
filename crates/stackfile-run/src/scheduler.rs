//! Bounded-concurrency scheduler
//!
//! Each release goes its own direction: installing releases wait for the
//! releases they need, deleting releases wait for every deleting release
//! that needs them. A failure skips everything waiting on it, transitively,
//! while unrelated releases keep going.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stackfile_core::Release;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, warn};

use crate::error::ExecError;
use crate::executor::{ChartExecutor, ExecFlags, ExecutorRegistry};
use crate::graph::ReleaseGraph;
use crate::report::{ReleaseOutcome, ReleaseResult, RunReport};

/// What a run does to the selected releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunMode {
    /// Report drift without mutating anything
    Diff,
    /// Diff, then apply only what changed
    Apply,
    /// Apply without diffing
    Sync,
    /// Delete every release
    Destroy,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Diff => "diff",
            Self::Apply => "apply",
            Self::Sync => "sync",
            Self::Destroy => "destroy",
        };
        write!(f, "{}", s)
    }
}

/// Direction a single release takes in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Install,
    Delete,
}

impl Direction {
    pub fn of(release: &Release, mode: RunMode) -> Self {
        if mode == RunMode::Destroy || !release.installed {
            Self::Delete
        } else {
            Self::Install
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Options for a run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Maximum releases processed at once; 0 means unbounded
    pub concurrency: usize,

    /// Install releases that are not present yet without diffing them
    pub skip_diff_on_install: bool,

    /// Drop values stored with live releases when applying
    pub reset_values: bool,

    /// Report pending changes through the exit status
    pub detailed_exitcode: bool,
}

impl RunOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_skip_diff_on_install(mut self, skip: bool) -> Self {
        self.skip_diff_on_install = skip;
        self
    }

    pub fn with_reset_values(mut self, reset: bool) -> Self {
        self.reset_values = reset;
        self
    }

    pub fn with_detailed_exitcode(mut self, detailed: bool) -> Self {
        self.detailed_exitcode = detailed;
        self
    }

    fn flags(&self) -> ExecFlags {
        ExecFlags {
            reset_values: self.reset_values,
        }
    }
}

/// Drives a [`ReleaseGraph`] through a [`ChartExecutor`] per release
#[derive(Debug)]
pub struct Scheduler {
    registry: Arc<ExecutorRegistry>,
    options: RunOptions,
}

impl Scheduler {
    pub fn new(registry: ExecutorRegistry, options: RunOptions) -> Self {
        Self {
            registry: Arc::new(registry),
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run every release of `graph`; failures are reported, not returned
    pub async fn run(&self, graph: &ReleaseGraph, mode: RunMode) -> RunReport {
        let directions: Vec<Direction> = graph
            .releases()
            .iter()
            .map(|r| Direction::of(r, mode))
            .collect();
        let (waits_on, unblocks) = wait_edges(graph, &directions);

        let report = Arc::new(Mutex::new(RunReport::new(mode)));
        let mut pending: Vec<usize> = waits_on.iter().map(Vec::len).collect();
        let mut resolved = vec![false; graph.len()];
        let mut ready: VecDeque<usize> = (0..graph.len()).filter(|&n| pending[n] == 0).collect();
        let mut tasks: JoinSet<bool> = JoinSet::new();
        let mut running: HashMap<Id, usize> = HashMap::new();
        let limit = match self.options.concurrency {
            0 => usize::MAX,
            n => n,
        };

        info!(mode = %mode, releases = graph.len(), concurrency = self.options.concurrency, "starting run");

        loop {
            while tasks.len() < limit {
                let Some(node) = ready.pop_front() else {
                    break;
                };
                let release = graph.release(node).clone();
                let executor = self.registry.for_release(&release);
                let task = Task {
                    release,
                    direction: directions[node],
                    mode,
                    options: self.options.clone(),
                    executor,
                };
                let report = Arc::clone(&report);
                let handle = tasks.spawn(async move {
                    let result = task.execute().await;
                    let success = !result.outcome.is_failure();
                    lock(&report).push(result);
                    success
                });
                running.insert(handle.id(), node);
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };
            let (node, success) = match joined {
                Ok((id, success)) => match running.remove(&id) {
                    Some(node) => (node, success),
                    None => continue,
                },
                Err(e) => {
                    let Some(node) = running.remove(&e.id()) else {
                        continue;
                    };
                    let release = graph.release(node);
                    warn!(release = %release.id, error = %e, "release task aborted");
                    lock(&report).push(ReleaseResult {
                        id: release.id.clone(),
                        direction: directions[node],
                        outcome: ReleaseOutcome::Failed {
                            error: format!("release task aborted: {}", e),
                        },
                        started_at: None,
                        finished_at: Utc::now(),
                    });
                    (node, false)
                }
            };
            resolved[node] = true;

            if success {
                for &next in &unblocks[node] {
                    pending[next] -= 1;
                    if pending[next] == 0 && !resolved[next] {
                        ready.push_back(next);
                    }
                }
            } else {
                skip_waiting(graph, node, &unblocks, &directions, &mut resolved, &report);
            }
        }

        let mut report = lock(&report).clone();
        report.finish();
        info!(mode = %mode, outcome = ?report.outcome(), "run finished");
        report
    }
}

/// Per node: the nodes it waits for, and the nodes waiting for it
fn wait_edges(graph: &ReleaseGraph, directions: &[Direction]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let mut waits_on = vec![Vec::new(); graph.len()];
    let mut unblocks = vec![Vec::new(); graph.len()];

    for node in 0..graph.len() {
        let blockers: Vec<usize> = match directions[node] {
            Direction::Install => graph.dependencies(node).to_vec(),
            Direction::Delete => graph
                .dependents(node)
                .iter()
                .copied()
                .filter(|&d| directions[d] == Direction::Delete)
                .collect(),
        };
        for &blocker in &blockers {
            unblocks[blocker].push(node);
        }
        waits_on[node] = blockers;
    }

    for list in &mut unblocks {
        list.sort_unstable();
    }
    (waits_on, unblocks)
}

/// Mark everything transitively waiting on `failed` as skipped
fn skip_waiting(
    graph: &ReleaseGraph,
    failed: usize,
    unblocks: &[Vec<usize>],
    directions: &[Direction],
    resolved: &mut [bool],
    report: &Mutex<RunReport>,
) {
    let failed_id = graph.release(failed).id.clone();
    let mut queue: VecDeque<usize> = unblocks[failed].iter().copied().collect();

    while let Some(node) = queue.pop_front() {
        if resolved[node] {
            continue;
        }
        resolved[node] = true;
        let release = graph.release(node);
        warn!(release = %release.id, failed = %failed_id, "skipping release");
        lock(report).push(ReleaseResult {
            id: release.id.clone(),
            direction: directions[node],
            outcome: ReleaseOutcome::Skipped {
                failed_dependency: failed_id.clone(),
            },
            started_at: None,
            finished_at: Utc::now(),
        });
        queue.extend(unblocks[node].iter().copied());
    }
}

fn lock(report: &Mutex<RunReport>) -> std::sync::MutexGuard<'_, RunReport> {
    report.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One release's work within a run
struct Task {
    release: Release,
    direction: Direction,
    mode: RunMode,
    options: RunOptions,
    executor: Arc<dyn ChartExecutor>,
}

impl Task {
    async fn execute(self) -> ReleaseResult {
        let started_at = Utc::now();
        debug!(release = %self.release.id, direction = %self.direction, "processing release");

        let outcome = match self.outcome().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let e = e.for_release(&self.release.id);
                warn!(release = %self.release.id, error = %e, "release failed");
                ReleaseOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        info!(release = %self.release.id, outcome = %outcome, "release done");

        ReleaseResult {
            id: self.release.id,
            direction: self.direction,
            outcome,
            started_at: Some(started_at),
            finished_at: Utc::now(),
        }
    }

    async fn outcome(&self) -> Result<ReleaseOutcome, ExecError> {
        match self.direction {
            Direction::Install => self.install().await,
            Direction::Delete => self.delete().await,
        }
    }

    async fn install(&self) -> Result<ReleaseOutcome, ExecError> {
        let release = &self.release;
        let flags = self.options.flags();

        if self.mode == RunMode::Diff {
            let changed = self.timed(self.executor.diff(release, flags)).await?;
            return Ok(if changed {
                ReleaseOutcome::Changed
            } else {
                ReleaseOutcome::Unchanged
            });
        }

        let installed = self.timed(self.executor.status(release)).await?.is_installed();
        let needs_diff = self.mode == RunMode::Apply && (installed || !self.options.skip_diff_on_install);
        if needs_diff && !self.timed(self.executor.diff(release, flags)).await? {
            return Ok(ReleaseOutcome::Unchanged);
        }

        self.timed(self.executor.apply(release, flags)).await?;
        Ok(if installed {
            ReleaseOutcome::Upgraded
        } else {
            ReleaseOutcome::Installed
        })
    }

    async fn delete(&self) -> Result<ReleaseOutcome, ExecError> {
        let release = &self.release;
        if !self.timed(self.executor.status(release)).await?.is_installed() {
            return Ok(ReleaseOutcome::NotInstalled);
        }
        if self.mode == RunMode::Diff {
            return Ok(ReleaseOutcome::Changed);
        }

        self.timed(self.executor.delete(release)).await?;
        Ok(ReleaseOutcome::Deleted)
    }

    /// Bound an executor call by the release timeout
    async fn timed<T>(&self, call: impl Future<Output = Result<T, ExecError>>) -> Result<T, ExecError> {
        match self.release.timeout {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .map_err(|_| ExecError::Timeout { after })?,
            None => call.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::release;
    use crate::graph::GraphOptions;
    use crate::mock::{MockExecutor, Operation};
    use crate::report::RunOutcome;
    use stackfile_core::ReleaseStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps in `apply` and remembers how many applies overlapped
    #[derive(Default)]
    struct SlowExecutor {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChartExecutor for SlowExecutor {
        async fn diff(&self, _release: &Release, _flags: ExecFlags) -> Result<bool, ExecError> {
            Ok(true)
        }

        async fn apply(&self, _release: &Release, _flags: ExecFlags) -> Result<(), ExecError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete(&self, _release: &Release) -> Result<(), ExecError> {
            Ok(())
        }

        async fn status(&self, _release: &Release) -> Result<ReleaseStatus, ExecError> {
            Ok(ReleaseStatus::NotInstalled)
        }
    }

    /// Panics when applying one release, delegates everything else
    struct PanicOnApply {
        name: &'static str,
        inner: MockExecutor,
    }

    #[async_trait::async_trait]
    impl ChartExecutor for PanicOnApply {
        async fn diff(&self, release: &Release, flags: ExecFlags) -> Result<bool, ExecError> {
            self.inner.diff(release, flags).await
        }

        async fn apply(&self, release: &Release, flags: ExecFlags) -> Result<(), ExecError> {
            if release.name() == self.name {
                panic!("executor crashed on {}", self.name);
            }
            self.inner.apply(release, flags).await
        }

        async fn delete(&self, release: &Release) -> Result<(), ExecError> {
            self.inner.delete(release).await
        }

        async fn status(&self, release: &Release) -> Result<ReleaseStatus, ExecError> {
            self.inner.status(release).await
        }
    }

    async fn run_with(
        universe: &[Release],
        executor: Arc<dyn ChartExecutor>,
        options: RunOptions,
    ) -> RunReport {
        let selected: Vec<usize> = (0..universe.len()).collect();
        let graph = ReleaseGraph::build(universe, &selected, &GraphOptions::default()).unwrap();
        Scheduler::new(ExecutorRegistry::shared(executor), options)
            .run(&graph, RunMode::Apply)
            .await
    }

    fn outcome<'a>(report: &'a RunReport, release: &Release) -> &'a ReleaseOutcome {
        &report.get(&release.id).unwrap().outcome
    }

    fn not_installed(mut release: Release) -> Release {
        release.installed = false;
        release
    }

    async fn run(universe: &[Release], mock: &MockExecutor, mode: RunMode) -> RunReport {
        let selected: Vec<usize> = (0..universe.len()).collect();
        let graph = ReleaseGraph::build(universe, &selected, &GraphOptions::default()).unwrap();
        let registry = ExecutorRegistry::shared(Arc::new(mock.clone()));
        let scheduler = Scheduler::new(registry, RunOptions::default().with_concurrency(1));
        scheduler.run(&graph, mode).await
    }

    #[tokio::test]
    async fn test_mixed_install_and_delete() {
        let universe = vec![
            release("database", &["logging"]),
            not_installed(release("frontend-v1", &["servicemesh", "logging", "backend-v1"])),
            release("frontend-v2", &["servicemesh", "logging", "backend-v2"]),
            release("frontend-v3", &["servicemesh", "logging", "backend-v2"]),
            not_installed(release(
                "backend-v1",
                &["servicemesh", "logging", "database", "anotherbackend"],
            )),
            release("backend-v2", &["servicemesh", "logging", "database", "anotherbackend"]),
            release("anotherbackend", &["servicemesh", "logging", "database"]),
            release("servicemesh", &["logging"]),
            release("logging", &[]),
            release("front-proxy", &[]),
        ];
        let mock = MockExecutor::new()
            .with_diff("frontend-v2", false)
            .with_status("frontend-v1", ReleaseStatus::Deployed);

        let report = run(&universe, &mock, RunMode::Apply).await;

        assert_eq!(
            mock.applied(),
            vec![
                "logging",
                "front-proxy",
                "database",
                "servicemesh",
                "anotherbackend",
                "backend-v2",
                "frontend-v3",
            ]
        );
        assert_eq!(mock.deleted(), vec!["frontend-v1"]);
        assert_eq!(report.outcome(), RunOutcome::Changed);
        assert_eq!(
            report.get(&universe[4].id).map(|r| &r.outcome),
            Some(&ReleaseOutcome::NotInstalled)
        );
    }

    #[tokio::test]
    async fn test_noop_run() {
        let universe = vec![release("bar", &[]), not_installed(release("foo", &["bar"]))];
        let mock = MockExecutor::new()
            .with_diff("bar", false)
            .with_status("bar", ReleaseStatus::Deployed);

        let report = run(&universe, &mock, RunMode::Apply).await;

        assert!(mock.applied().is_empty());
        assert!(mock.deleted().is_empty());
        assert_eq!(report.outcome(), RunOutcome::NoOp);
    }

    #[tokio::test]
    async fn test_install_order() {
        let universe = vec![
            release("baz", &[]),
            release("foo", &["bar"]),
            release("bar", &[]),
        ];
        let mock = MockExecutor::new();

        let report = run(&universe, &mock, RunMode::Apply).await;

        assert_eq!(mock.applied(), vec!["baz", "bar", "foo"]);
        assert!(report
            .results
            .iter()
            .all(|r| r.outcome == ReleaseOutcome::Installed));
    }

    #[tokio::test]
    async fn test_upgrade_only_on_drift() {
        let universe = vec![release("foo", &[]), release("bar", &[])];
        let mock = MockExecutor::new()
            .with_status("foo", ReleaseStatus::Deployed)
            .with_status("bar", ReleaseStatus::Deployed)
            .with_diff("bar", false);

        let report = run(&universe, &mock, RunMode::Apply).await;

        assert_eq!(mock.applied(), vec!["foo"]);
        assert_eq!(report.results[0].outcome, ReleaseOutcome::Upgraded);
        assert_eq!(report.results[1].outcome, ReleaseOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_skip_diff_on_install() {
        let universe = vec![release("new", &[]), release("old", &[])];
        let mock = MockExecutor::new().with_status("old", ReleaseStatus::Deployed);
        let graph = ReleaseGraph::build(&universe, &[0, 1], &GraphOptions::default()).unwrap();
        let scheduler = Scheduler::new(
            ExecutorRegistry::shared(Arc::new(mock.clone())),
            RunOptions::default()
                .with_concurrency(1)
                .with_skip_diff_on_install(true),
        );

        scheduler.run(&graph, RunMode::Apply).await;

        assert_eq!(mock.diffed(), vec!["old"]);
        assert_eq!(mock.applied(), vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_failure_skips_dependents_only() {
        let universe = vec![
            release("database", &[]),
            release("backend", &["database"]),
            release("frontend", &["backend"]),
            release("logging", &[]),
        ];
        let mock = MockExecutor::new().fail_on("database", Operation::Apply, "connection refused");

        let report = run(&universe, &mock, RunMode::Apply).await;

        assert_eq!(mock.applied(), vec!["database", "logging"]);
        assert_eq!(report.outcome(), RunOutcome::Failed);

        let err = report.into_result().unwrap_err();
        assert_eq!(err.failed.len(), 1);
        assert!(err.failed[0].1.contains("connection refused"));
        let skipped: Vec<(&str, &str)> = err
            .skipped
            .iter()
            .map(|(id, because)| (id.name.as_str(), because.name.as_str()))
            .collect();
        assert_eq!(skipped, vec![("backend", "database"), ("frontend", "database")]);
    }

    #[tokio::test]
    async fn test_delete_dependents_first() {
        let universe = vec![
            not_installed(release("backend", &[])),
            not_installed(release("frontend", &["backend"])),
        ];
        let mock = MockExecutor::new()
            .with_status("backend", ReleaseStatus::Deployed)
            .with_status("frontend", ReleaseStatus::Deployed);

        run(&universe, &mock, RunMode::Apply).await;

        assert_eq!(mock.deleted(), vec!["frontend", "backend"]);
    }

    #[tokio::test]
    async fn test_destroy_ignores_installed_flag() {
        let universe = vec![
            release("database", &[]),
            release("backend", &["database"]),
            release("frontend", &["backend"]),
        ];
        let mock = MockExecutor::new()
            .with_status("database", ReleaseStatus::Deployed)
            .with_status("backend", ReleaseStatus::Deployed)
            .with_status("frontend", ReleaseStatus::Deployed);

        let report = run(&universe, &mock, RunMode::Destroy).await;

        assert_eq!(mock.deleted(), vec!["frontend", "backend", "database"]);
        assert!(report.results.iter().all(|r| r.direction == Direction::Delete));
    }

    #[tokio::test]
    async fn test_diff_mode_never_mutates() {
        let universe = vec![release("foo", &[]), not_installed(release("bar", &[]))];
        let mock = MockExecutor::new().with_status("bar", ReleaseStatus::Deployed);

        let report = run(&universe, &mock, RunMode::Diff).await;

        assert!(mock.applied().is_empty());
        assert!(mock.deleted().is_empty());
        assert_eq!(report.outcome(), RunOutcome::Changed);
        assert!(report.results.iter().all(|r| r.outcome == ReleaseOutcome::Changed));
    }

    #[tokio::test]
    async fn test_sync_applies_without_diff() {
        let universe = vec![release("foo", &[])];
        let mock = MockExecutor::new()
            .with_status("foo", ReleaseStatus::Deployed)
            .with_diff("foo", false);

        let report = run(&universe, &mock, RunMode::Sync).await;

        assert!(mock.diffed().is_empty());
        assert_eq!(mock.applied(), vec!["foo"]);
        assert_eq!(report.results[0].outcome, ReleaseOutcome::Upgraded);
    }

    #[tokio::test]
    async fn test_unbounded_concurrency_respects_needs() {
        let universe = vec![
            release("c", &["b"]),
            release("b", &["a"]),
            release("a", &[]),
            release("x", &[]),
            release("y", &[]),
        ];
        let selected: Vec<usize> = (0..universe.len()).collect();
        let graph = ReleaseGraph::build(&universe, &selected, &GraphOptions::default()).unwrap();
        let mock = MockExecutor::new();
        let scheduler = Scheduler::new(
            ExecutorRegistry::shared(Arc::new(mock.clone())),
            RunOptions::default(),
        );

        let report = scheduler.run(&graph, RunMode::Apply).await;

        let applied = mock.applied();
        let pos = |name: &str| applied.iter().position(|n| n == name).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
        assert_eq!(report.results.len(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bound() {
        let universe: Vec<Release> = (0..8).map(|i| release(&format!("app-{}", i), &[])).collect();
        let executor = Arc::new(SlowExecutor::default());

        let report = run_with(
            &universe,
            executor.clone(),
            RunOptions::default().with_concurrency(2),
        )
        .await;

        assert_eq!(report.results.len(), 8);
        assert_eq!(executor.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delete_failure_skips_dependencies() {
        let universe = vec![
            not_installed(release("backend", &[])),
            not_installed(release("frontend", &["backend"])),
        ];
        let mock = MockExecutor::new()
            .with_status("backend", ReleaseStatus::Deployed)
            .with_status("frontend", ReleaseStatus::Deployed)
            .fail_on("frontend", Operation::Delete, "uninstall hook failed");

        let report = run(&universe, &mock, RunMode::Apply).await;

        assert_eq!(mock.deleted(), vec!["frontend"]);
        assert!(outcome(&report, &universe[1]).is_failure());
        assert_eq!(
            outcome(&report, &universe[0]),
            &ReleaseOutcome::Skipped {
                failed_dependency: universe[1].id.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_install_failure_does_not_block_deletion() {
        let universe = vec![
            release("database", &[]),
            not_installed(release("old-api", &["database"])),
            release("new-api", &["database"]),
        ];
        let mock = MockExecutor::new()
            .with_status("old-api", ReleaseStatus::Deployed)
            .fail_on("database", Operation::Apply, "connection refused");

        let report = run(&universe, &mock, RunMode::Apply).await;

        assert_eq!(mock.deleted(), vec!["old-api"]);
        assert_eq!(outcome(&report, &universe[1]), &ReleaseOutcome::Deleted);
        assert_eq!(
            outcome(&report, &universe[2]),
            &ReleaseOutcome::Skipped {
                failed_dependency: universe[0].id.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_panicking_task_skips_dependents() {
        let universe = vec![
            release("database", &[]),
            release("backend", &["database"]),
            release("frontend", &["backend"]),
        ];
        let mock = MockExecutor::new();
        let executor = Arc::new(PanicOnApply {
            name: "backend",
            inner: mock.clone(),
        });

        let report = run_with(&universe, executor, RunOptions::default().with_concurrency(1)).await;

        assert_eq!(mock.applied(), vec!["database"]);
        assert_eq!(report.results.len(), 3);
        match outcome(&report, &universe[1]) {
            ReleaseOutcome::Failed { error } => assert!(error.contains("release task aborted")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(
            outcome(&report, &universe[2]),
            &ReleaseOutcome::Skipped {
                failed_dependency: universe[1].id.clone()
            }
        );
    }
}
