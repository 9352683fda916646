//! Diff, apply, sync and destroy commands

use console::style;
use stackfile_run::{
    ExecutorRegistry, GraphOptions, ReleaseGraph, RunMode, RunOptions, RunOutcome, Scheduler,
};

use crate::display;
use crate::error::Result;
use crate::exit_codes;
use crate::workspace::Workspace;

/// Run the selected releases in `mode`; returns the exit code
pub async fn run(
    workspace: &Workspace,
    mode: RunMode,
    graph_options: &GraphOptions,
    run_options: RunOptions,
) -> Result<u8> {
    let graph = ReleaseGraph::build(workspace.releases(), workspace.selected(), graph_options)?;
    if graph.is_empty() {
        println!("No releases to {}", mode);
        return Ok(exit_codes::SUCCESS);
    }

    println!(
        "{} {} release(s)",
        style(format!("Running {}:", mode)).bold(),
        graph.len()
    );

    let detailed_exitcode = run_options.detailed_exitcode;
    let scheduler = Scheduler::new(ExecutorRegistry::helm(), run_options);
    let report = scheduler.run(&graph, mode).await;
    display::print_report(&report);

    let outcome = report.outcome();
    report.into_result()?;

    Ok(match outcome {
        RunOutcome::Changed if detailed_exitcode => exit_codes::CHANGES,
        _ => exit_codes::SUCCESS,
    })
}
