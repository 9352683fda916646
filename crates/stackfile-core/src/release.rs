//! Resolved release types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::document::SetValue;
use crate::error::{CoreError, Result};
use crate::value::Value;

/// Release identity: `(context, namespace, name)`
///
/// Displayed as `context/namespace/name`; empty parts stay empty, so a
/// release without namespace in context `default` reads `default//foo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReleaseId {
    pub context: String,
    pub namespace: String,
    pub name: String,
}

impl ReleaseId {
    pub fn new(
        context: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.context, self.namespace, self.name)
    }
}

/// A `needs` entry: `name`, `namespace/name` or `context/namespace/name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedRef {
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
}

impl NeedRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidNeed {
            reference: reference.to_string(),
        };

        let parts: Vec<&str> = reference.split('/').collect();
        let need = match parts.as_slice() {
            [name] => Self {
                context: None,
                namespace: None,
                name: name.to_string(),
            },
            [namespace, name] => Self {
                context: None,
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            },
            [context, namespace, name] => Self {
                context: Some(context.to_string()),
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            },
            _ => return Err(invalid()),
        };

        if need.name.is_empty() {
            return Err(invalid());
        }
        Ok(need)
    }

    /// Resolve against the referencing release; missing parts default to its own
    pub fn resolve(&self, from: &ReleaseId) -> ReleaseId {
        ReleaseId {
            context: self.context.clone().unwrap_or_else(|| from.context.clone()),
            namespace: self
                .namespace
                .clone()
                .unwrap_or_else(|| from.namespace.clone()),
            name: self.name.clone(),
        }
    }
}

/// Values handed to the chart executor for one release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReleaseValues {
    /// Absolute path of a values file
    File(PathBuf),
    /// Inline mapping
    Inline(Value),
}

/// A fully resolved release, ready for selection and graph building
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: ReleaseId,

    pub chart: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// `false` marks the release for deletion
    pub installed: bool,

    /// `false` when the release's condition evaluated to false
    pub enabled: bool,

    /// User labels, common labels and the built-in `name`/`namespace`/`chart`
    pub labels: IndexMap<String, String>,

    pub needs: Vec<NeedRef>,

    pub values: Vec<ReleaseValues>,

    pub set: Vec<SetValue>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub timeout: Option<Duration>,

    pub wait: bool,

    pub create_namespace: bool,

    pub args: Vec<String>,

    /// Executor binary used for this release
    pub helm_binary: String,

    /// State file that defined the release
    pub source: PathBuf,
}

impl Release {
    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn namespace(&self) -> &str {
        &self.id.namespace
    }

    pub fn context(&self) -> &str {
        &self.id.context
    }

    /// Needs resolved to identities
    pub fn need_ids(&self) -> impl Iterator<Item = ReleaseId> + '_ {
        self.needs.iter().map(|need| need.resolve(&self.id))
    }
}

/// Live status of a release as reported by the chart executor
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStatus {
    #[default]
    NotInstalled,
    Deployed,
    Failed,
    Pending,
}

impl ReleaseStatus {
    /// Whether a release exists on the target, in any state
    pub fn is_installed(&self) -> bool {
        !matches!(self, Self::NotInstalled)
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotInstalled => "not-installed",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::Pending => "pending",
        };
        write!(f, "{}", s)
    }
}
