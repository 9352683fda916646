//! Build command - print every state after merging and rendering

use console::style;
use serde::Serialize;
use stackfile_core::{StateSpec, Value};
use std::path::Path;

use crate::error::{CliError, Result};
use crate::workspace::Workspace;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuiltState<'a> {
    environment: BuiltEnvironment<'a>,
    #[serde(flatten)]
    spec: &'a StateSpec,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuiltEnvironment<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    kube_context: &'a str,
    values: &'a Value,
}

/// Run the build command
pub fn run(workspace: &Workspace) -> Result<()> {
    for state in workspace.loaded.iter().flat_map(|loaded| loaded.states.iter()) {
        let built = BuiltState {
            environment: BuiltEnvironment {
                name: &state.environment.name,
                kube_context: &state.environment.kube_context,
                values: state.environment.values.inner(),
            },
            spec: &state.spec,
        };
        print_document(&state.path, &built)?;
    }
    Ok(())
}

fn print_document(path: &Path, state: &BuiltState<'_>) -> Result<()> {
    let yaml = serde_yaml::to_string(state).map_err(|e| CliError::internal(e.to_string()))?;
    println!("---");
    println!("{}", style(format!("# Source: {}", path.display())).dim());
    print!("{}", yaml);
    Ok(())
}
