//! Turning release definitions into resolved releases

use indexmap::IndexMap;
use stackfile_core::{
    MissingFileHandler, NeedRef, Release, ReleaseId, ReleaseSpec, ReleaseValues, SetValue,
    StateSpec, Value, ValuesEntry, parse_scalar,
};
use stackfile_engine::{Engine, ReleaseInfo};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::env::{ResolvedEnvironment, resolve_path};
use crate::error::{Result, StateError};
use crate::options::LoadOptions;

/// Resolves the releases of one state against its environment
pub(crate) struct ReleaseResolver<'a> {
    pub options: &'a LoadOptions,
    pub spec: &'a StateSpec,
    pub environment: &'a ResolvedEnvironment,
    pub source: &'a Path,
    pub dir: &'a Path,
    pub helm_binary: &'a str,
}

impl ReleaseResolver<'_> {
    pub(crate) fn resolve_all(&self) -> Result<Vec<Release>> {
        self.spec
            .releases
            .iter()
            .map(|release| self.resolve(release))
            .collect()
    }

    pub(crate) fn resolve(&self, spec: &ReleaseSpec) -> Result<Release> {
        let defaults = &self.spec.helm_defaults;

        let context = spec
            .kube_context
            .clone()
            .or_else(|| self.options.kube_context.clone())
            .or_else(|| defaults.kube_context.clone())
            .unwrap_or_default();
        let namespace = self
            .options
            .namespace
            .clone()
            .or_else(|| spec.namespace.clone())
            .unwrap_or_default();
        let id = ReleaseId::new(context, namespace, &spec.name);

        let mut labels: IndexMap<String, String> = self.spec.common_labels.clone();
        labels.extend(spec.labels.clone());
        labels.insert("name".to_string(), spec.name.clone());
        labels.insert("namespace".to_string(), id.namespace.clone());
        labels.insert("chart".to_string(), spec.chart.clone());

        let enabled = match &spec.condition {
            Some(condition) => self.evaluate_condition(&spec.name, condition)?,
            None => true,
        };

        let needs = spec
            .needs
            .iter()
            .map(|need| NeedRef::parse(need))
            .collect::<stackfile_core::Result<Vec<_>>>()?;

        let info = ReleaseInfo {
            name: spec.name.clone(),
            namespace: id.namespace.clone(),
            chart: spec.chart.clone(),
            kube_context: id.context.clone(),
            labels: labels.clone(),
        };

        let mut values = self.render_values_templates(spec, &info)?;
        values.extend(self.literal_values(spec)?);

        let mut set = self.render_set_templates(spec, &info)?;
        set.extend(spec.set.iter().cloned());

        let release = Release {
            id,
            chart: spec.chart.clone(),
            version: spec.version.clone(),
            installed: spec.installed.unwrap_or(true),
            enabled,
            labels,
            needs,
            values,
            set,
            timeout: spec.timeout.or(defaults.timeout),
            wait: defaults.wait.unwrap_or(false),
            create_namespace: defaults.create_namespace.unwrap_or(true),
            args: defaults.args.clone(),
            helm_binary: self.helm_binary.to_string(),
            source: self.source.to_path_buf(),
        };

        if !release.enabled {
            debug!(release = %release.id, "release disabled by condition");
        }
        Ok(release)
    }

    /// `condition: foo.enabled` reads a boolean from the environment values
    fn evaluate_condition(&self, release: &str, condition: &str) -> Result<bool> {
        let valid = condition
            .strip_suffix(".enabled")
            .is_some_and(|key| !key.is_empty());
        if !valid {
            return Err(StateError::InvalidCondition {
                release: release.to_string(),
                condition: condition.to_string(),
            });
        }

        match self.environment.values.get(condition) {
            Some(Value::Bool(enabled)) => Ok(*enabled),
            other => Err(StateError::ConditionNotBool {
                release: release.to_string(),
                condition: condition.to_string(),
                found: other.map(Value::type_name).unwrap_or("nothing"),
            }),
        }
    }

    fn engine(&self) -> Engine {
        Engine::builder().base_dir(self.dir).build()
    }

    fn render_values_templates(
        &self,
        spec: &ReleaseSpec,
        info: &ReleaseInfo,
    ) -> Result<Vec<ReleaseValues>> {
        let ctx = self.environment.render_context().with_release(info.clone());
        let engine = self.engine();
        let mut rendered = Vec::with_capacity(spec.values_template.len());

        for (index, entry) in spec.values_template.iter().enumerate() {
            let (name, template) = match entry {
                ValuesEntry::File(path) => {
                    let full = resolve_path(self.dir, path);
                    let template =
                        std::fs::read_to_string(&full).map_err(|source| StateError::Read {
                            path: full.clone(),
                            source,
                        })?;
                    (full.display().to_string(), template)
                }
                ValuesEntry::Inline(value) => {
                    let template = serde_yaml::to_string(value).map_err(|source| {
                        StateError::Parse {
                            name: format!("{}.valuesTemplate[{}]", spec.name, index),
                            source,
                        }
                    })?;
                    (format!("{}.valuesTemplate[{}]", spec.name, index), template)
                }
            };

            let output = engine.render_str(&template, &ctx, &name)?;
            let value = Value::from_yaml(&output)
                .map_err(|source| StateError::Parse { name, source })?;
            rendered.push(ReleaseValues::Inline(value));
        }

        Ok(rendered)
    }

    fn render_set_templates(&self, spec: &ReleaseSpec, info: &ReleaseInfo) -> Result<Vec<SetValue>> {
        let ctx = self.environment.render_context().with_release(info.clone());
        let engine = self.engine();

        spec.set_template
            .iter()
            .map(|entry| -> Result<SetValue> {
                let value = match &entry.value {
                    Value::String(template) => {
                        let name = format!("{}.setTemplate.{}", spec.name, entry.name);
                        parse_scalar(&engine.render_str(template, &ctx, &name)?)
                    }
                    other => other.clone(),
                };
                Ok(SetValue {
                    name: entry.name.clone(),
                    value,
                })
            })
            .collect()
    }

    fn literal_values(&self, spec: &ReleaseSpec) -> Result<Vec<ReleaseValues>> {
        let handler = spec.missing_file_handler.unwrap_or_default();
        let mut values = Vec::with_capacity(spec.values.len());

        for entry in &spec.values {
            match entry {
                ValuesEntry::Inline(value) => values.push(ReleaseValues::Inline(value.clone())),
                ValuesEntry::File(path) => {
                    let full = resolve_path(self.dir, path);
                    if full.is_file() {
                        values.push(ReleaseValues::File(full));
                        continue;
                    }
                    match handler {
                        MissingFileHandler::Error => {
                            return Err(StateError::MissingReleaseValues {
                                release: spec.name.clone(),
                                path: full.display().to_string(),
                            });
                        }
                        MissingFileHandler::Warn => {
                            warn!(release = %spec.name, path = %full.display(), "skipping missing values file")
                        }
                        MissingFileHandler::Info => {
                            info!(release = %spec.name, path = %full.display(), "skipping missing values file")
                        }
                        MissingFileHandler::Debug => {
                            debug!(release = %spec.name, path = %full.display(), "skipping missing values file")
                        }
                    }
                }
            }
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackfile_core::Values;
    use tempfile::TempDir;

    fn environment(yaml: &str) -> ResolvedEnvironment {
        ResolvedEnvironment {
            name: "default".to_string(),
            kube_context: String::new(),
            values: Values::from_yaml(yaml).unwrap(),
        }
    }

    fn resolve_with(
        state: &str,
        env: &ResolvedEnvironment,
        options: &LoadOptions,
        dir: &Path,
    ) -> Result<Vec<Release>> {
        let spec = StateSpec::from_yaml(state).unwrap();
        let source = dir.join("stackfile.yaml");
        ReleaseResolver {
            options,
            spec: &spec,
            environment: env,
            source: &source,
            dir,
            helm_binary: "helm",
        }
        .resolve_all()
    }

    #[test]
    fn test_identity_and_labels() {
        let dir = TempDir::new().unwrap();
        let releases = resolve_with(
            r#"
helmDefaults:
  kubeContext: defaults-ctx
commonLabels:
  team: platform
releases:
  - name: db
    namespace: data
    chart: charts/mysql
    labels:
      team: storage
      tier: backend
  - name: web
    kubeContext: own-ctx
    chart: charts/web
"#,
            &environment(""),
            &LoadOptions::default(),
            dir.path(),
        )
        .unwrap();

        assert_eq!(releases[0].id.to_string(), "defaults-ctx/data/db");
        assert_eq!(releases[0].labels["team"], "storage");
        assert_eq!(releases[0].labels["tier"], "backend");
        assert_eq!(releases[0].labels["name"], "db");
        assert_eq!(releases[0].labels["namespace"], "data");
        assert_eq!(releases[0].labels["chart"], "charts/mysql");
        assert_eq!(releases[1].id.to_string(), "own-ctx//web");
        assert!(releases[0].installed && releases[0].enabled);
    }

    #[test]
    fn test_cli_overrides() {
        let dir = TempDir::new().unwrap();
        let options = LoadOptions::default()
            .with_namespace("override")
            .with_kube_context("cli-ctx");
        let releases = resolve_with(
            "helmDefaults:\n  kubeContext: defaults-ctx\nreleases:\n  - name: a\n    namespace: mine\n    chart: c\n",
            &environment(""),
            &options,
            dir.path(),
        )
        .unwrap();

        assert_eq!(releases[0].id.to_string(), "cli-ctx/override/a");
    }

    #[test]
    fn test_condition() {
        let dir = TempDir::new().unwrap();
        let env = environment("db:\n  enabled: false\ncache:\n  enabled: true\nweb:\n  enabled: maybe\n");
        let options = LoadOptions::default();

        let releases = resolve_with(
            "releases:\n  - name: db\n    chart: c\n    condition: db.enabled\n  - name: cache\n    chart: c\n    condition: cache.enabled\n",
            &env,
            &options,
            dir.path(),
        )
        .unwrap();
        assert!(!releases[0].enabled);
        assert!(releases[1].enabled);

        let err = resolve_with(
            "releases:\n  - name: web\n    chart: c\n    condition: web.enabled\n",
            &env,
            &options,
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, StateError::ConditionNotBool { found: "string", .. }));

        let err = resolve_with(
            "releases:\n  - name: web\n    chart: c\n    condition: web.on\n",
            &env,
            &options,
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, StateError::InvalidCondition { .. }));
    }

    #[test]
    fn test_templates_come_before_literals() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("web.yaml"), "replicas: 2\n").unwrap();

        let releases = resolve_with(
            r#"
releases:
  - name: web
    namespace: front
    chart: charts/web
    valuesTemplate:
      - host: "{{ release.name }}.{{ values.domain }}"
    values:
      - web.yaml
      - debug: true
    setTemplate:
      - name: image.tag
        value: "{{ values.tag }}"
    set:
      - name: replicas
        value: 3
"#,
            &environment("domain: example.com\ntag: 42\n"),
            &LoadOptions::default(),
            dir.path(),
        )
        .unwrap();

        let web = &releases[0];
        assert_eq!(web.values.len(), 3);
        match &web.values[0] {
            ReleaseValues::Inline(value) => {
                assert_eq!(value.get_path("host").unwrap(), &"web.example.com")
            }
            other => panic!("unexpected values entry: {:?}", other),
        }
        assert_eq!(web.values[1], ReleaseValues::File(dir.path().join("web.yaml")));

        assert_eq!(web.set[0].name, "image.tag");
        assert_eq!(web.set[0].value, Value::Int(42));
        assert_eq!(web.set[1].name, "replicas");
    }

    #[test]
    fn test_missing_release_values_file() {
        let dir = TempDir::new().unwrap();
        let state = "releases:\n  - name: web\n    chart: c\n    values: [missing.yaml]\n";

        let err = resolve_with(state, &environment(""), &LoadOptions::default(), dir.path())
            .unwrap_err();
        assert!(matches!(err, StateError::MissingReleaseValues { .. }));

        let state = "releases:\n  - name: web\n    chart: c\n    missingFileHandler: Warn\n    values: [missing.yaml]\n";
        let releases =
            resolve_with(state, &environment(""), &LoadOptions::default(), dir.path()).unwrap();
        assert!(releases[0].values.is_empty());
    }

    #[test]
    fn test_invalid_need_reference() {
        let dir = TempDir::new().unwrap();
        let state = "releases:\n  - name: web\n    chart: c\n    needs: [a/b/c/d]\n";

        let err = resolve_with(state, &environment(""), &LoadOptions::default(), dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("a/b/c/d"));
    }
}
