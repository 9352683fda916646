//! Stackfile Core - Core types for the release orchestrator
//!
//! This crate provides the foundational types used throughout stackfile:
//! - `Value`: Tagged configuration value with explicit deep merge
//! - `Values`: Mapping-rooted values with dotted-path access
//! - `StateSpec`: The state document model (releases, environments, inclusions)
//! - `Release`: A resolved release with its identity and needs
//! - `Selector`: Label selectors and their inheritance policies

pub mod value;
pub mod values;
pub mod document;
pub mod release;
pub mod selector;
pub mod error;

pub use value::{Mapping, Value};
pub use values::{Values, parse_scalar, parse_set_values};
pub use document::{
    EnvironmentSection, EnvironmentSpec, HelmDefaults, InclusionSpec, MissingFileHandler, ReleaseSpec,
    RepositorySpec, SetValue, StateSpec, ValuesEntry,
};
pub use release::{NeedRef, Release, ReleaseId, ReleaseStatus, ReleaseValues};
pub use selector::{LabelFilter, Selector, SelectorInheritance};
pub use error::{CoreError, Result};
