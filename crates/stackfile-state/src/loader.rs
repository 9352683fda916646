//! State loading
//!
//! Each state file goes through:
//!
//! 1. split into `---` separated parts
//! 2. per part, a lenient render against the environment known so far,
//!    from which `bases`, `values` and `environments` are read
//! 3. `bases` are loaded and merged underneath the part
//! 4. a strict render of the part against the updated environment
//! 5. the final environment is resolved and releases are materialized
//! 6. nested `helmfiles` are loaded depth first, before the state's own releases

use stackfile_core::{
    EnvironmentSection, InclusionSpec, Release, Selector, StateSpec, Values, ValuesEntry,
    parse_set_values,
};
use stackfile_engine::{Engine, RenderMode};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::env::{EnvironmentResolver, Resolution, ResolvedEnvironment, has_glob_meta, resolve_path};
use crate::error::{Result, StateError};
use crate::options::{DEFAULT_HELM_BINARY, LoadOptions};
use crate::release::ReleaseResolver;

/// One loaded state file
#[derive(Debug, Clone)]
pub struct State {
    /// Path the state was loaded from
    pub path: PathBuf,

    /// Rendered document merged with its bases
    pub spec: StateSpec,

    pub environment: ResolvedEnvironment,

    /// Selector groups active for this state
    pub selectors: Vec<String>,

    selector: Selector,

    /// Every release of the state, selected or not
    pub releases: Vec<Release>,
}

impl State {
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Whether a release of this state takes part in the run
    pub fn is_selected(&self, release: &Release) -> bool {
        release.enabled && self.selector.matches(&release.labels)
    }

    pub fn selected(&self) -> impl Iterator<Item = &Release> {
        self.releases.iter().filter(|r| self.is_selected(r))
    }
}

/// The result of loading a root state and everything it includes
#[derive(Debug, Clone)]
pub struct LoadedState {
    /// Requested environment name
    pub environment: String,

    /// States in processing order: nested inclusions before their parent
    pub states: Vec<State>,

    releases: Vec<Release>,
    selected: Vec<usize>,
}

impl LoadedState {
    /// The whole release universe, in run order
    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    /// Indices into [`releases`](Self::releases) picked by the selectors
    pub fn selected_indices(&self) -> &[usize] {
        &self.selected
    }

    pub fn selected(&self) -> impl Iterator<Item = &Release> {
        self.selected.iter().map(|&i| &self.releases[i])
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.binary_search(&index).is_ok()
    }

    /// The root state, loaded last
    pub fn root(&self) -> Option<&State> {
        self.states.last()
    }
}

/// Load the state described by `options`
pub fn load(options: LoadOptions) -> Result<LoadedState> {
    StateLoader::new(options)?.load()
}

/// Loads a root state file and its inclusions
#[derive(Debug)]
pub struct StateLoader {
    options: LoadOptions,
    set_values: Values,
}

impl StateLoader {
    pub fn new(options: LoadOptions) -> Result<Self> {
        let set_values = parse_set_values(&options.state_values_set)?;
        Ok(Self {
            options,
            set_values,
        })
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn load(&self) -> Result<LoadedState> {
        // Validate selectors up front so a typo fails before any file is read
        Selector::parse(&self.options.selectors)?;

        let mut states = Vec::new();
        let mut stack = Vec::new();
        self.load_state(
            &self.options.file,
            &[],
            self.options.selectors.clone(),
            &mut stack,
            &mut states,
        )?;

        let mut releases = Vec::new();
        let mut selected = Vec::new();
        for state in &states {
            for release in &state.releases {
                if state.is_selected(release) {
                    selected.push(releases.len());
                }
                releases.push(release.clone());
            }
        }

        if self.options.reverse {
            let last = releases.len().saturating_sub(1);
            releases.reverse();
            for index in selected.iter_mut() {
                *index = last - *index;
            }
            selected.reverse();
        }

        if self.options.require_match && !self.options.selectors.is_empty() && selected.is_empty() {
            return Err(StateError::NoReleasesFound {
                selector: format!("[{}]", self.options.selectors.join(" ")),
                environment: self.options.environment.clone(),
            });
        }

        info!(
            states = states.len(),
            releases = releases.len(),
            selected = selected.len(),
            "loaded state"
        );

        Ok(LoadedState {
            environment: self.options.environment.clone(),
            states,
            releases,
            selected,
        })
    }

    fn resolver(&self) -> EnvironmentResolver<'_> {
        EnvironmentResolver::new(&self.options, &self.set_values)
    }

    fn load_state(
        &self,
        path: &Path,
        overlays: &[ValuesEntry],
        selectors: Vec<String>,
        stack: &mut Vec<PathBuf>,
        out: &mut Vec<State>,
    ) -> Result<()> {
        let display = path.display().to_string();
        self.load_state_inner(path, overlays, selectors, stack, out)
            .map_err(|e| e.in_file(display))
    }

    fn load_state_inner(
        &self,
        path: &Path,
        overlays: &[ValuesEntry],
        selectors: Vec<String>,
        stack: &mut Vec<PathBuf>,
        out: &mut Vec<State>,
    ) -> Result<()> {
        let content = self.enter(path, stack)?;
        let dir = parent_dir(path);

        debug!(path = %path.display(), ?selectors, "loading state");

        let spec =
            self.render_document(path, &content, &dir, overlays, &StateSpec::default(), stack)?;
        let environment = self
            .resolver()
            .resolve(&spec, &dir, overlays, Resolution::Complete)?;
        let selector = Selector::parse(&selectors)?;

        for (index, inclusion) in spec.helmfiles.iter().enumerate() {
            self.load_inclusion(&dir, inclusion, overlays, &selectors, stack, out)
                .map_err(|e| e.in_inclusion(index))?;
        }

        let helm_binary = self
            .options
            .helm_binary
            .clone()
            .or_else(|| spec.helm_binary.clone())
            .unwrap_or_else(|| DEFAULT_HELM_BINARY.to_string());

        let releases = ReleaseResolver {
            options: &self.options,
            spec: &spec,
            environment: &environment,
            source: path,
            dir: &dir,
            helm_binary: &helm_binary,
        }
        .resolve_all()?;

        stack.pop();
        out.push(State {
            path: path.to_path_buf(),
            spec,
            environment,
            selectors,
            selector,
            releases,
        });
        Ok(())
    }

    fn load_inclusion(
        &self,
        dir: &Path,
        inclusion: &InclusionSpec,
        parent_overlays: &[ValuesEntry],
        parent_selectors: &[String],
        stack: &mut Vec<PathBuf>,
        out: &mut Vec<State>,
    ) -> Result<()> {
        let explicit = inclusion.selectors.as_ref().is_some_and(|s| !s.is_empty());
        if explicit && inclusion.selectors_inherited {
            return Err(StateError::ConflictingSelectors {
                path: inclusion.path.clone(),
            });
        }

        let selectors = self.options.inheritance.resolve(
            parent_selectors,
            inclusion.selectors.as_deref(),
            inclusion.selectors_inherited,
        );

        // The parent's overlays stay underneath; new overlay files are relative to the parent
        let overlays: Vec<ValuesEntry> = parent_overlays
            .iter()
            .cloned()
            .chain(inclusion.values.iter().map(|entry| match entry {
                ValuesEntry::File(file) => {
                    ValuesEntry::File(resolve_path(dir, file).to_string_lossy().into_owned())
                }
                inline => inline.clone(),
            }))
            .collect();

        for path in expand_inclusion(dir, &inclusion.path)? {
            self.load_state(&path, &overlays, selectors.clone(), stack, out)?;
        }
        Ok(())
    }

    /// Render every part of a document and merge the results
    ///
    /// `inherited` is the including document as merged so far; a base sees
    /// its environments and values but none of it ends up in the result.
    fn render_document(
        &self,
        path: &Path,
        content: &str,
        dir: &Path,
        overlays: &[ValuesEntry],
        inherited: &StateSpec,
        stack: &mut Vec<PathBuf>,
    ) -> Result<StateSpec> {
        let parts = split_documents(content);
        let mut accumulated = StateSpec::default();

        for (index, part) in parts.iter().enumerate() {
            let name = if parts.len() > 1 {
                format!("{}.part.{}", path.display(), index)
            } else {
                path.display().to_string()
            };
            let engine = Engine::builder().base_dir(dir).build();

            let mut view = inherited.clone();
            view.merge(accumulated.clone());
            let known = self
                .resolver()
                .resolve(&view, dir, overlays, Resolution::Partial)?;
            let section = self.environment_section(&engine, part, &known, &name);

            let mut bases = StateSpec::default();
            for (base_index, base) in section.bases.iter().enumerate() {
                let mut seed = view.clone();
                seed.merge(bases.clone());
                let base_spec = self
                    .load_base(&resolve_path(dir, base), dir, overlays, &seed, stack)
                    .map_err(|e| e.in_base(base_index))?;
                bases.merge(base_spec);
            }

            let mut env_spec = view;
            env_spec.merge(bases.clone());
            env_spec.merge(section.into_spec());
            let environment = self
                .resolver()
                .resolve(&env_spec, dir, overlays, Resolution::Partial)?;

            let rendered = engine.render_str(part, &environment.render_context(), &name)?;
            let mut body = StateSpec::from_yaml(&rendered)
                .map_err(|source| StateError::Parse { name, source })?;
            body.bases.clear();

            accumulated.merge(bases);
            accumulated.merge(body);
        }

        Ok(accumulated)
    }

    /// First, lenient pass over a part
    ///
    /// A part whose release section is not yet renderable still yields its
    /// environment section; if even that fails, the part contributes nothing
    /// and the strict pass reports the real error.
    fn environment_section(
        &self,
        engine: &Engine,
        part: &str,
        known: &ResolvedEnvironment,
        name: &str,
    ) -> EnvironmentSection {
        let lenient = engine.with_mode(RenderMode::Lenient);
        let rendered = match lenient.render_str(part, &known.render_context(), name) {
            Ok(rendered) => rendered,
            Err(e) => {
                debug!(template = name, error = %e, "first pass render failed");
                return EnvironmentSection::default();
            }
        };

        EnvironmentSection::from_yaml(&rendered).unwrap_or_else(|e| {
            debug!(template = name, error = %e, "first pass output is not valid YAML");
            EnvironmentSection::default()
        })
    }

    fn load_base(
        &self,
        path: &Path,
        dir: &Path,
        overlays: &[ValuesEntry],
        inherited: &StateSpec,
        stack: &mut Vec<PathBuf>,
    ) -> Result<StateSpec> {
        let display = path.display().to_string();
        let result = self.enter(path, stack).and_then(|content| {
            let spec = self.render_document(path, &content, dir, overlays, inherited, stack);
            stack.pop();
            spec
        });
        result.map_err(|e| e.in_file(display))
    }

    /// Push `path` on the inclusion stack and read it
    fn enter(&self, path: &Path, stack: &mut Vec<PathBuf>) -> Result<String> {
        let canonical = path.canonicalize().map_err(|source| StateError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(start) = stack.iter().position(|p| p == &canonical) {
            let chain: Vec<String> = stack[start..]
                .iter()
                .chain(std::iter::once(&canonical))
                .map(|p| p.display().to_string())
                .collect();
            return Err(StateError::InclusionCycle {
                chain: chain.join(" -> "),
            });
        }

        let content = std::fs::read_to_string(&canonical).map_err(|source| StateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        stack.push(canonical);
        Ok(content)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Paths matched by an inclusion entry, in the order the glob yields them
fn expand_inclusion(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = resolve_path(dir, pattern);
    if !has_glob_meta(pattern) {
        return Ok(vec![full]);
    }

    let full_pattern = full.to_string_lossy().into_owned();
    let matches: Vec<PathBuf> = glob::glob(&full_pattern)
        .map_err(|e| StateError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();

    if matches.is_empty() {
        return Err(StateError::NoMatches {
            pattern: pattern.to_string(),
        });
    }
    Ok(matches)
}

/// Split a multi-document body on `---` separator lines
fn split_documents(content: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        if line.trim_end() == "---" {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    parts.push(current);

    parts.retain(|part| !part.trim().is_empty());
    parts
}
