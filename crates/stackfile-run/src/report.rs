//! Run report: per-release outcomes and the aggregate result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackfile_core::ReleaseId;
use std::fmt;

use crate::error::RunError;
use crate::scheduler::{Direction, RunMode};

/// What happened to one release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ReleaseOutcome {
    /// Diffed without drift, nothing applied
    Unchanged,
    /// Diff mode only: applying or deleting would change something
    Changed,
    Installed,
    Upgraded,
    Deleted,
    /// Marked for deletion but not present
    NotInstalled,
    Failed { error: String },
    /// Not attempted because a dependency (or dependent, when deleting) failed
    #[serde(rename_all = "camelCase")]
    Skipped { failed_dependency: ReleaseId },
}

impl ReleaseOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Skipped { .. })
    }

    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Changed | Self::Installed | Self::Upgraded | Self::Deleted
        )
    }
}

impl fmt::Display for ReleaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Changed => write!(f, "changed"),
            Self::Installed => write!(f, "installed"),
            Self::Upgraded => write!(f, "upgraded"),
            Self::Deleted => write!(f, "deleted"),
            Self::NotInstalled => write!(f, "not installed"),
            Self::Failed { error } => write!(f, "failed: {}", error),
            Self::Skipped { failed_dependency } => {
                write!(f, "skipped: {} failed", failed_dependency)
            }
        }
    }
}

/// Outcome of one release within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResult {
    pub id: ReleaseId,
    pub direction: Direction,
    #[serde(flatten)]
    pub outcome: ReleaseOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

/// Aggregate result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunOutcome {
    /// Nothing changed
    NoOp,
    /// Changes applied, or found by a diff, without failures
    Changed,
    /// At least one release failed or was skipped
    Failed,
}

/// Results of every release of a run, in completion order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub results: Vec<ReleaseResult>,
}

impl RunReport {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            finished_at: None,
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: ReleaseResult) {
        self.results.push(result);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn get(&self, id: &ReleaseId) -> Option<&ReleaseResult> {
        self.results.iter().find(|r| &r.id == id)
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.results.iter().any(|r| r.outcome.is_failure()) {
            RunOutcome::Failed
        } else if self.results.iter().any(|r| r.outcome.is_change()) {
            RunOutcome::Changed
        } else {
            RunOutcome::NoOp
        }
    }

    pub fn count(&self, pred: impl Fn(&ReleaseOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// `Err` listing every failed and skipped release, if any
    pub fn into_result(self) -> Result<Self, RunError> {
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        for result in &self.results {
            match &result.outcome {
                ReleaseOutcome::Failed { error } => failed.push((result.id.clone(), error.clone())),
                ReleaseOutcome::Skipped { failed_dependency } => {
                    skipped.push((result.id.clone(), failed_dependency.clone()))
                }
                _ => {}
            }
        }

        if failed.is_empty() && skipped.is_empty() {
            Ok(self)
        } else {
            Err(RunError { failed, skipped })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, outcome: ReleaseOutcome) -> ReleaseResult {
        ReleaseResult {
            id: ReleaseId::new("default", "", name),
            direction: Direction::Install,
            outcome,
            started_at: None,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_outcome_aggregation() {
        let mut report = RunReport::new(RunMode::Apply);
        report.push(result("a", ReleaseOutcome::Unchanged));
        assert_eq!(report.outcome(), RunOutcome::NoOp);

        report.push(result("b", ReleaseOutcome::Upgraded));
        assert_eq!(report.outcome(), RunOutcome::Changed);

        report.push(result(
            "c",
            ReleaseOutcome::Skipped {
                failed_dependency: ReleaseId::new("default", "", "d"),
            },
        ));
        assert_eq!(report.outcome(), RunOutcome::Failed);
    }

    #[test]
    fn test_into_result_collects_failures() {
        let mut report = RunReport::new(RunMode::Apply);
        report.push(result("db", ReleaseOutcome::Failed { error: "boom".to_string() }));
        report.push(result(
            "api",
            ReleaseOutcome::Skipped {
                failed_dependency: ReleaseId::new("default", "", "db"),
            },
        ));
        report.push(result("web", ReleaseOutcome::Installed));

        let err = report.into_result().unwrap_err();
        assert_eq!(err.failed.len(), 1);
        assert_eq!(err.skipped[0].1.name, "db");
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(result(
            "api",
            ReleaseOutcome::Skipped {
                failed_dependency: ReleaseId::new("", "", "db"),
            },
        ))
        .unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["failedDependency"]["name"], "db");
    }
}
