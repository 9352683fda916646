//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("malformed label: {expr}. Expected label in form k=v or k!=v")]
    MalformedLabel { expr: String },

    #[error("invalid --state-values-set format: '{arg}'. Expected key=value")]
    InvalidSet { arg: String },

    #[error("invalid needs reference \"{reference}\": expected name, namespace/name or context/namespace/name")]
    InvalidNeed { reference: String },

    #[error("values must be a mapping, found {found}")]
    NotAMapping { found: &'static str },

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
