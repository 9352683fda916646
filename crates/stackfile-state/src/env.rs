//! Environment resolution
//!
//! Layers, lowest precedence first:
//!
//! 1. top-level `values`
//! 2. `values` given by the inclusion that pulled this state in
//! 3. the named environment's `values`
//! 4. `--state-values-file` files
//! 5. `--state-values-set` assignments
//!
//! Mappings merge deeply, everything else (sequences included) is replaced.

use stackfile_core::{MissingFileHandler, StateSpec, Value, Values, ValuesEntry};
use stackfile_engine::suggestions::find_closest_matches;
use stackfile_engine::{Engine, EnvironmentInfo, RenderContext};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, StateError};
use crate::options::{DEFAULT_ENVIRONMENT, LoadOptions};

/// A named environment with its merged values
#[derive(Debug, Clone, Default)]
pub struct ResolvedEnvironment {
    pub name: String,
    pub kube_context: String,
    pub values: Values,
}

impl ResolvedEnvironment {
    /// An environment with no values yet
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Template variables for rendering against this environment
    pub fn render_context(&self) -> RenderContext {
        RenderContext::new(
            EnvironmentInfo::new(&self.name, self.values.inner().clone())
                .with_kube_context(&self.kube_context),
        )
    }
}

/// How strictly an undefined environment is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Intermediate resolution while a document is still being assembled
    Partial,
    /// Final resolution of a complete state
    Complete,
}

pub(crate) struct EnvironmentResolver<'a> {
    options: &'a LoadOptions,
    set_values: &'a Values,
}

impl<'a> EnvironmentResolver<'a> {
    pub(crate) fn new(options: &'a LoadOptions, set_values: &'a Values) -> Self {
        Self {
            options,
            set_values,
        }
    }

    /// Resolve the requested environment of `spec`
    ///
    /// `overlays` must carry absolute file paths; they come from the parent
    /// state's directory, not from `dir`.
    pub(crate) fn resolve(
        &self,
        spec: &StateSpec,
        dir: &Path,
        overlays: &[ValuesEntry],
        resolution: Resolution,
    ) -> Result<ResolvedEnvironment> {
        let name = self.options.environment.as_str();
        let env_spec = spec.environments.get(name);

        if env_spec.is_none() && name != DEFAULT_ENVIRONMENT && resolution == Resolution::Complete {
            let known: Vec<&str> = spec.environments.keys().map(String::as_str).collect();
            let suggestion = find_closest_matches(name, &known, 1)
                .first()
                .map(|closest| format!("Did you mean `{}`?", closest))
                .or_else(|| {
                    (!known.is_empty())
                        .then(|| format!("Defined environments: {}", known.join(", ")))
                });
            return Err(StateError::UndefinedEnvironment {
                name: name.to_string(),
                suggestion,
            });
        }

        let handler = env_spec
            .and_then(|env| env.missing_file_handler)
            .unwrap_or_default();

        let mut env = ResolvedEnvironment {
            name: name.to_string(),
            kube_context: self
                .options
                .kube_context
                .clone()
                .or_else(|| spec.helm_defaults.kube_context.clone())
                .unwrap_or_default(),
            values: Values::new(),
        };

        self.layer(&mut env, &spec.values, dir, handler)?;
        self.layer(&mut env, overlays, dir, handler)?;
        if let Some(env_spec) = env_spec {
            self.layer(&mut env, &env_spec.values, dir, handler)?;
        }

        for file in &self.options.state_values_files {
            let values = read_values(file)?;
            env.values.merge(&values);
        }
        env.values.merge(self.set_values);

        debug!(environment = name, ?resolution, "resolved environment");
        Ok(env)
    }

    fn layer(
        &self,
        env: &mut ResolvedEnvironment,
        entries: &[ValuesEntry],
        dir: &Path,
        handler: MissingFileHandler,
    ) -> Result<()> {
        for entry in entries {
            match entry {
                ValuesEntry::Inline(value) => {
                    let values = Values::from_value(value.clone())?;
                    env.values.merge(&values);
                }
                ValuesEntry::File(pattern) => {
                    let files = expand_values_pattern(pattern, dir)?;
                    if files.is_empty() {
                        report_missing(handler, pattern, dir)?;
                        continue;
                    }
                    for file in files {
                        let values = if is_template(&file) {
                            render_values(&file, env)?
                        } else {
                            read_values(&file)?
                        };
                        env.values.merge(&values);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Files matching a values entry, in glob order
pub(crate) fn expand_values_pattern(pattern: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    let full = resolve_path(dir, pattern);

    if !has_glob_meta(pattern) {
        return Ok(if full.is_file() { vec![full] } else { Vec::new() });
    }

    let full_pattern = full.to_string_lossy().into_owned();
    let paths = glob::glob(&full_pattern).map_err(|e| StateError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    Ok(paths.filter_map(|entry| entry.ok()).filter(|p| p.is_file()).collect())
}

pub(crate) fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

pub(crate) fn resolve_path(dir: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        dir.join(candidate)
    }
}

fn is_template(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "j2")
}

fn report_missing(handler: MissingFileHandler, pattern: &str, dir: &Path) -> Result<()> {
    let dir = dir.display().to_string();
    match handler {
        MissingFileHandler::Error => {
            return Err(StateError::MissingEnvironmentValues {
                pattern: pattern.to_string(),
                dir,
            });
        }
        MissingFileHandler::Warn => {
            warn!(pattern, dir = %dir, "skipping missing environment values file")
        }
        MissingFileHandler::Info => {
            info!(pattern, dir = %dir, "skipping missing environment values file")
        }
        MissingFileHandler::Debug => {
            debug!(pattern, dir = %dir, "skipping missing environment values file")
        }
    }
    Ok(())
}

fn read_values(path: &Path) -> Result<Values> {
    let content = std::fs::read_to_string(path).map_err(|source| StateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_values(path, &content)
}

/// Render a `.j2` values file against the layers merged so far
fn render_values(path: &Path, env: &ResolvedEnvironment) -> Result<Values> {
    let template = std::fs::read_to_string(path).map_err(|source| StateError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut builder = Engine::builder();
    if let Some(dir) = path.parent() {
        builder = builder.base_dir(dir);
    }
    let rendered = builder
        .build()
        .render_str(&template, &env.render_context(), &path.display().to_string())?;

    parse_values(path, &rendered)
}

fn parse_values(path: &Path, content: &str) -> Result<Values> {
    let value = Value::from_yaml(content).map_err(|source| StateError::Parse {
        name: path.display().to_string(),
        source,
    })?;
    Values::from_value(value).map_err(|e| StateError::from(e).in_file(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackfile_core::parse_set_values;
    use std::fs;
    use tempfile::TempDir;

    fn resolve(
        dir: &TempDir,
        spec: &str,
        options: &LoadOptions,
        resolution: Resolution,
    ) -> Result<ResolvedEnvironment> {
        let spec = StateSpec::from_yaml(spec).unwrap();
        let set = parse_set_values(&options.state_values_set).unwrap();
        EnvironmentResolver::new(options, &set).resolve(&spec, dir.path(), &[], resolution)
    }

    #[test]
    fn test_layer_precedence() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("base.yaml"), "bar: bar\nbaz: baz\nlist: [1, 2]\n").unwrap();
        fs::write(dir.path().join("prod.yaml"), "bar: bar_env\nlist: [3]\n").unwrap();
        let overrides = dir.path().join("overrides.yaml");
        fs::write(&overrides, "baz: baz_override\n").unwrap();

        let options = LoadOptions::default()
            .with_environment("production")
            .with_state_values_file(&overrides)
            .with_state_values_set("extra=1");

        let env = resolve(
            &dir,
            "values: [base.yaml]\nenvironments:\n  production:\n    values: [prod.yaml]\n",
            &options,
            Resolution::Complete,
        )
        .unwrap();

        assert_eq!(env.values.get("bar").unwrap(), &"bar_env");
        assert_eq!(env.values.get("baz").unwrap(), &"baz_override");
        assert_eq!(env.values.get("extra").unwrap(), &1);
        assert_eq!(
            env.values.get("list").unwrap(),
            &Value::Seq(vec![Value::Int(3)])
        );
    }

    #[test]
    fn test_undefined_environment() {
        let dir = TempDir::new().unwrap();
        let options = LoadOptions::default().with_environment("prod");
        let spec = "environments:\n  production: {}\n";

        let err = resolve(&dir, spec, &options, Resolution::Complete).unwrap_err();
        assert_eq!(err.to_string(), "environment \"prod\" is not defined");
        assert!(err.help().unwrap().contains("production"));

        assert!(resolve(&dir, spec, &options, Resolution::Partial).is_ok());
    }

    #[test]
    fn test_default_environment_may_be_undeclared() {
        let dir = TempDir::new().unwrap();
        let env = resolve(&dir, "values:\n  - a: 1\n", &LoadOptions::default(), Resolution::Complete)
            .unwrap();
        assert_eq!(env.name, "default");
        assert_eq!(env.values.get("a").unwrap(), &1);
    }

    #[test]
    fn test_missing_file_error() {
        let dir = TempDir::new().unwrap();
        let spec = "environments:\n  default:\n    values:\n    - env.*.yaml\n";

        let err = resolve(&dir, spec, &LoadOptions::default(), Resolution::Complete).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "environment values file matching \"env.*.yaml\" does not exist in \"{}\"",
                dir.path().display()
            )
        );
    }

    #[test]
    fn test_missing_file_handlers_continue() {
        let dir = TempDir::new().unwrap();
        for handler in ["Warn", "Info", "Debug"] {
            let spec = format!(
                "environments:\n  default:\n    missingFileHandler: {}\n    values:\n    - missing.yaml\n    - a: 1\n",
                handler
            );
            let env = resolve(&dir, &spec, &LoadOptions::default(), Resolution::Complete).unwrap();
            assert_eq!(env.values.get("a").unwrap(), &1, "handler {}", handler);
        }
    }

    #[test]
    fn test_glob_matches_merge_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("env.a.yaml"), "x: a\ny: a\n").unwrap();
        fs::write(dir.path().join("env.b.yaml"), "x: b\n").unwrap();

        let spec = "environments:\n  default:\n    values:\n    - env.*.yaml\n";
        let env = resolve(&dir, spec, &LoadOptions::default(), Resolution::Complete).unwrap();

        assert_eq!(env.values.get("x").unwrap(), &"b");
        assert_eq!(env.values.get("y").unwrap(), &"a");
    }

    #[test]
    fn test_template_values_file_sees_lower_layers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("derived.yaml.j2"),
            "url: \"https://{{ values.host }}:{{ values.port }}\"\n",
        )
        .unwrap();

        let spec = "values:\n  - host: example.com\n    port: 8443\n  - derived.yaml.j2\n";
        let env = resolve(&dir, spec, &LoadOptions::default(), Resolution::Complete).unwrap();

        assert_eq!(env.values.get("url").unwrap(), &"https://example.com:8443");
    }

    #[test]
    fn test_environment_kube_context() {
        let dir = TempDir::new().unwrap();
        let spec = "helmDefaults:\n  kubeContext: from-defaults\n";

        let env = resolve(&dir, spec, &LoadOptions::default(), Resolution::Complete).unwrap();
        assert_eq!(env.kube_context, "from-defaults");

        let options = LoadOptions::default().with_kube_context("from-cli");
        let env = resolve(&dir, spec, &options, Resolution::Complete).unwrap();
        assert_eq!(env.kube_context, "from-cli");
    }
}
