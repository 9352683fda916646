//! Options controlling a state load

use stackfile_core::SelectorInheritance;
use std::path::PathBuf;

/// Environment used when none is requested
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Executor binary used when neither the state nor the caller sets one
pub const DEFAULT_HELM_BINARY: &str = "helm";

/// Options for loading a state file and its inclusions
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Root state file
    pub file: PathBuf,

    /// Environment to resolve
    pub environment: String,

    /// Selector groups given on the command line
    pub selectors: Vec<String>,

    /// How nested inclusions inherit selectors
    pub inheritance: SelectorInheritance,

    /// Extra state values files, layered over environment values
    pub state_values_files: Vec<PathBuf>,

    /// `key=value` state values, the highest precedence layer
    pub state_values_set: Vec<String>,

    /// Overrides every release's namespace
    pub namespace: Option<String>,

    /// Kube context for releases that do not set their own
    pub kube_context: Option<String>,

    /// Enumerate releases in reverse order
    pub reverse: bool,

    /// Overrides the executor binary of every state
    pub helm_binary: Option<String>,

    /// Fail when selectors are given and pick no release
    pub require_match: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            file: PathBuf::from("stackfile.yaml"),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            selectors: Vec::new(),
            inheritance: SelectorInheritance::default(),
            state_values_files: Vec::new(),
            state_values_set: Vec::new(),
            namespace: None,
            kube_context: None,
            reverse: false,
            helm_binary: None,
            require_match: true,
        }
    }
}

impl LoadOptions {
    /// Load options for a root state file
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_selectors<S: Into<String>>(mut self, selectors: impl IntoIterator<Item = S>) -> Self {
        self.selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_inheritance(mut self, inheritance: SelectorInheritance) -> Self {
        self.inheritance = inheritance;
        self
    }

    pub fn with_state_values_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.state_values_files.push(file.into());
        self
    }

    pub fn with_state_values_set(mut self, set: impl Into<String>) -> Self {
        self.state_values_set.push(set.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_kube_context(mut self, kube_context: impl Into<String>) -> Self {
        self.kube_context = Some(kube_context.into());
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn with_helm_binary(mut self, binary: impl Into<String>) -> Self {
        self.helm_binary = Some(binary.into());
        self
    }

    pub fn with_require_match(mut self, require: bool) -> Self {
        self.require_match = require;
        self
    }
}
