//! List command - list the releases matching the selectors

use stackfile_core::Release;

use crate::display;
use crate::error::{CliError, Result};
use crate::workspace::Workspace;

/// Run the list command
///
/// Disabled releases are listed too, so a false `condition` is visible.
pub fn run(workspace: &Workspace, output_json: bool) -> Result<()> {
    let releases: Vec<&Release> = workspace
        .loaded
        .iter()
        .flat_map(|loaded| loaded.states.iter())
        .flat_map(|state| {
            state
                .releases
                .iter()
                .filter(|release| state.selector().matches(&release.labels))
        })
        .collect();

    if output_json {
        let json = serde_json::to_string_pretty(&releases)
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    if releases.is_empty() {
        println!("No releases found");
        return Ok(());
    }

    display::print_releases(releases);
    Ok(())
}
