//! State document model
//!
//! These types mirror the YAML layout of a state file after templating.
//! They are deliberately close to the source text: paths are unresolved,
//! `needs` are raw strings and release defaults are not applied yet. The
//! loader turns them into resolved [`crate::Release`] values.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::value::Value;

/// One state document (or the merge of several parts and bases)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSpec {
    /// Documents merged underneath this one
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "nullable")]
    pub bases: Vec<String>,

    /// Top-level values, the lowest environment layer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValuesEntry>,

    #[serde(
        default,
        skip_serializing_if = "IndexMap::is_empty",
        deserialize_with = "environment_map"
    )]
    pub environments: IndexMap<String, EnvironmentSpec>,

    #[serde(default, skip_serializing_if = "HelmDefaults::is_empty")]
    pub helm_defaults: HelmDefaults,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_binary: Option<String>,

    /// Nested state inclusions
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "nullable")]
    pub helmfiles: Vec<InclusionSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositorySpec>,

    #[serde(
        default,
        skip_serializing_if = "IndexMap::is_empty",
        deserialize_with = "scalar_map"
    )]
    pub common_labels: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "nullable")]
    pub releases: Vec<ReleaseSpec>,
}

impl StateSpec {
    /// Parse a rendered document; an empty document is an empty spec
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let spec: Option<StateSpec> = serde_yaml::from_str(yaml)?;
        Ok(spec.unwrap_or_default())
    }

    /// Layer `other` on top of `self`
    ///
    /// Lists concatenate in order, environment value lists concatenate per
    /// environment, scalar settings from `other` win when present.
    pub fn merge(&mut self, other: StateSpec) {
        self.bases.extend(other.bases);
        self.values.extend(other.values);

        for (name, env) in other.environments {
            match self.environments.get_mut(&name) {
                Some(existing) => {
                    existing.values.extend(env.values);
                    if env.missing_file_handler.is_some() {
                        existing.missing_file_handler = env.missing_file_handler;
                    }
                }
                None => {
                    self.environments.insert(name, env);
                }
            }
        }

        self.helm_defaults.merge(other.helm_defaults);
        if other.helm_binary.is_some() {
            self.helm_binary = other.helm_binary;
        }
        self.helmfiles.extend(other.helmfiles);
        self.repositories.extend(other.repositories);
        self.common_labels.extend(other.common_labels);
        self.releases.extend(other.releases);
    }
}

/// The parts of a document needed to resolve its environment
///
/// Parsed from the first, lenient render of a document, where release
/// definitions may not be valid yet. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSection {
    #[serde(default, deserialize_with = "nullable")]
    pub bases: Vec<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub values: Vec<ValuesEntry>,

    #[serde(default, deserialize_with = "environment_map")]
    pub environments: IndexMap<String, EnvironmentSpec>,
}

impl EnvironmentSection {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let section: Option<EnvironmentSection> = serde_yaml::from_str(yaml)?;
        Ok(section.unwrap_or_default())
    }

    /// Environment-only spec, without the bases
    pub fn into_spec(self) -> StateSpec {
        StateSpec {
            values: self.values,
            environments: self.environments,
            ..StateSpec::default()
        }
    }
}

/// A values list entry: either a file reference or an inline mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValuesEntry {
    File(String),
    Inline(Value),
}

/// Policy for values files that do not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingFileHandler {
    #[default]
    Error,
    Warn,
    Info,
    Debug,
}

/// A named environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValuesEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_file_handler: Option<MissingFileHandler>,
}

/// Execution defaults applied to every release of a state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_namespace: Option<bool>,

    /// Extra arguments passed to every executor call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl HelmDefaults {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn merge(&mut self, other: HelmDefaults) {
        if other.kube_context.is_some() {
            self.kube_context = other.kube_context;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.wait.is_some() {
            self.wait = other.wait;
        }
        if other.create_namespace.is_some() {
            self.create_namespace = other.create_namespace;
        }
        if !other.args.is_empty() {
            self.args = other.args;
        }
    }
}

/// A chart repository declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySpec {
    pub name: String,
    pub url: String,
}

/// A nested state inclusion
///
/// Written either as a bare path/glob string or as a mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawInclusion")]
pub struct InclusionSpec {
    pub path: String,

    /// `None` when the entry does not mention selectors at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selectors_inherited: bool,

    /// Value overlays layered underneath the nested state's own environment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValuesEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInclusion {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        selectors: Option<Vec<String>>,
        #[serde(default, rename = "selectorsInherited")]
        selectors_inherited: bool,
        #[serde(default)]
        values: Vec<ValuesEntry>,
    },
}

impl From<RawInclusion> for InclusionSpec {
    fn from(raw: RawInclusion) -> Self {
        match raw {
            RawInclusion::Path(path) => Self {
                path,
                ..Self::default()
            },
            RawInclusion::Detailed {
                path,
                selectors,
                selectors_inherited,
                values,
            } => Self {
                path,
                selectors,
                selectors_inherited,
                values,
            },
        }
    }
}

/// A `set` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetValue {
    pub name: String,
    pub value: Value,
}

/// A release as written in a state document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_context: Option<String>,

    #[serde(default)]
    pub chart: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// `false` marks the release for deletion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<bool>,

    /// Environment value path (`foo.enabled`) that toggles the release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "IndexMap::is_empty",
        deserialize_with = "scalar_map"
    )]
    pub labels: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValuesEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_template: Vec<ValuesEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set: Vec<SetValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_template: Vec<SetValue>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_file_handler: Option<MissingFileHandler>,
}

/// Treat an explicit `null` (`releases:` with nothing under it) as empty
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Environments may be declared without a body (`test:`)
fn environment_map<'de, D>(deserializer: D) -> Result<IndexMap<String, EnvironmentSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Option<EnvironmentSpec>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, env)| (name, env.unwrap_or_default()))
        .collect())
}

/// Deserialize a mapping whose values may be any scalar into strings
fn scalar_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(key, value)| match value.to_scalar_string() {
            Some(s) => Ok((key, s)),
            None => Err(serde::de::Error::custom(format!(
                "label \"{}\" must be a scalar, found {}",
                key,
                value.type_name()
            ))),
        })
        .collect()
}
