//! Plan command - show the release graph grouped into dependency levels

use console::style;
use stackfile_run::{GraphOptions, ReleaseGraph};

use crate::error::Result;
use crate::workspace::Workspace;

/// Run the plan command
pub fn run(workspace: &Workspace, options: &GraphOptions) -> Result<()> {
    let graph = ReleaseGraph::build(workspace.releases(), workspace.selected(), options)?;
    let plan = graph.plan();

    let display = plan.display();
    let mut lines = display.lines();
    if let Some(header) = lines.next() {
        println!("{}", style(header).bold());
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
