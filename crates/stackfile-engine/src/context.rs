//! Variables exposed to state templates

use indexmap::IndexMap;
use serde::Serialize;
use stackfile_core::Value;

/// The `environment` template variable
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub name: String,
    pub kube_context: String,
    pub values: Value,
}

impl EnvironmentInfo {
    pub fn new(name: impl Into<String>, values: Value) -> Self {
        Self {
            name: name.into(),
            kube_context: String::new(),
            values,
        }
    }

    pub fn with_kube_context(mut self, kube_context: impl Into<String>) -> Self {
        self.kube_context = kube_context.into();
        self
    }
}

/// The `release` template variable, only set for release templates
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
    pub chart: String,
    pub kube_context: String,
    pub labels: IndexMap<String, String>,
}

/// Everything a template can reference
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub environment: EnvironmentInfo,
    pub release: Option<ReleaseInfo>,
}

impl RenderContext {
    pub fn new(environment: EnvironmentInfo) -> Self {
        Self {
            environment,
            release: None,
        }
    }

    pub fn with_release(mut self, release: ReleaseInfo) -> Self {
        self.release = Some(release);
        self
    }

    /// Shorthand for `environment.values`
    pub fn values(&self) -> &Value {
        &self.environment.values
    }
}
