//! Display formatting for CLI output

use console::{Style, style};
use stackfile_core::Release;
use stackfile_run::{Direction, ReleaseOutcome, RunOutcome, RunReport};

/// Style for a release outcome
fn outcome_style(outcome: &ReleaseOutcome) -> Style {
    match outcome {
        ReleaseOutcome::Installed | ReleaseOutcome::Upgraded => Style::new().green(),
        ReleaseOutcome::Changed | ReleaseOutcome::Deleted => Style::new().yellow(),
        ReleaseOutcome::Failed { .. } => Style::new().red().bold(),
        ReleaseOutcome::Skipped { .. } => Style::new().red(),
        ReleaseOutcome::Unchanged | ReleaseOutcome::NotInstalled => Style::new().dim(),
    }
}

/// Print releases as a table
pub fn print_releases<'a>(releases: impl IntoIterator<Item = &'a Release>) {
    println!(
        "{:<24} {:<16} {:<8} {:<10} {:<40} {:<24} {}",
        style("NAME").bold(),
        style("NAMESPACE").bold(),
        style("ENABLED").bold(),
        style("INSTALLED").bold(),
        style("LABELS").bold(),
        style("CHART").bold(),
        style("VERSION").bold()
    );

    for release in releases {
        println!(
            "{:<24} {:<16} {:<8} {:<10} {:<40} {:<24} {}",
            release.name(),
            release.namespace(),
            release.enabled,
            release.installed,
            user_labels(release),
            release.chart,
            release.version.as_deref().unwrap_or("")
        );
    }
}

/// `k:v` pairs of labels, without the built-in ones
fn user_labels(release: &Release) -> String {
    release
        .labels
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "name" | "namespace" | "chart"))
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Print a run report: one line per release, then totals
pub fn print_report(report: &RunReport) {
    println!();
    println!("{}", style(format!("{} results", report.mode)).bold());
    for result in &report.results {
        let label = match (&result.outcome, result.direction) {
            (ReleaseOutcome::Changed, Direction::Delete) => "would delete".to_string(),
            (outcome, _) => outcome.to_string(),
        };
        let outcome = outcome_style(&result.outcome).apply_to(label);
        println!(
            "  {} {} ({})",
            outcome,
            result.id,
            style(result.direction).dim()
        );
    }

    let failed = report.count(|o| o.is_failure());
    let changed = report.count(ReleaseOutcome::is_change);
    let summary = format!(
        "{} releases: {} changed, {} failed or skipped",
        report.results.len(),
        changed,
        failed
    );
    let summary = match report.outcome() {
        RunOutcome::Failed => style(summary).red().bold(),
        RunOutcome::Changed => style(summary).green(),
        RunOutcome::NoOp => style(summary).dim(),
    };
    println!("{}", summary);
}
