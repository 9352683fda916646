//! Locating state files and loading them into one release universe

use stackfile_core::Release;
use stackfile_state::{LoadOptions, LoadedState, StateError, StateLoader};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CliError, Result};

/// State files tried, in order, when `--file` is not given
const DEFAULT_FILES: &[&str] = &["stackfile.yaml", "helmfile.yaml"];

/// Directory whose `*.yaml` files are all loaded when no default file exists
const DEFAULT_DIR: &str = "helmfile.d";

/// Root state files to load, relative to `dir`
pub fn discover(file: Option<&Path>, dir: &Path) -> Result<Vec<PathBuf>> {
    if let Some(file) = file {
        return Ok(vec![file.to_path_buf()]);
    }

    for name in DEFAULT_FILES {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(vec![candidate]);
        }
    }

    let pattern = dir.join(DEFAULT_DIR).join("*.yaml");
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .map_err(|e| CliError::internal(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(CliError::usage_with_help(
            "no state file found",
            format!(
                "create {} or {}/*.yaml, or pass one with --file",
                DEFAULT_FILES.join(" or "),
                DEFAULT_DIR
            ),
        ));
    }
    Ok(files)
}

/// Every root state of a run and the combined release universe
pub struct Workspace {
    pub loaded: Vec<LoadedState>,
    releases: Vec<Release>,
    selected: Vec<usize>,
}

impl Workspace {
    /// Load each file with `options`; selectors must match somewhere, not
    /// in every file
    pub fn load(files: &[PathBuf], options: &LoadOptions) -> Result<Self> {
        let mut ordered: Vec<&PathBuf> = files.iter().collect();
        if options.reverse {
            ordered.reverse();
        }

        let mut workspace = Self {
            loaded: Vec::new(),
            releases: Vec::new(),
            selected: Vec::new(),
        };

        for file in ordered {
            debug!(path = %file.display(), "loading state file");
            let file_options = options
                .clone()
                .with_file(file)
                .with_require_match(files.len() == 1);
            let loaded = StateLoader::new(file_options)?.load()?;

            let offset = workspace.releases.len();
            workspace
                .selected
                .extend(loaded.selected_indices().iter().map(|i| i + offset));
            workspace.releases.extend(loaded.releases().iter().cloned());
            workspace.loaded.push(loaded);
        }

        if !options.selectors.is_empty() && workspace.selected.is_empty() {
            return Err(StateError::NoReleasesFound {
                selector: format!("[{}]", options.selectors.join(" ")),
                environment: options.environment.clone(),
            }
            .into());
        }
        Ok(workspace)
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    pub fn selected(&self) -> &[usize] {
        &self.selected
    }
}
