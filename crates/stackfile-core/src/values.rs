//! Values handling with deep merge support

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::value::Value;

/// Values container rooted at a mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub Value);

impl Default for Values {
    fn default() -> Self {
        Self::new()
    }
}

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(Value::empty_map())
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string
    ///
    /// The document must be a mapping (or empty).
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value = Value::from_yaml(yaml)?;
        Self::from_value(value)
    }

    /// Wrap a value, rejecting anything that is not a mapping
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(_) => Ok(Self(value)),
            Value::Null => Ok(Self::new()),
            other => Err(CoreError::NotAMapping {
                found: other.type_name(),
            }),
        }
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Mappings: recursive merge
    /// - Sequences: overlay replaces base (not appended)
    pub fn merge(&mut self, overlay: &Values) {
        self.0.merge(&overlay.0);
    }

    /// Merge multiple values in order, later entries win
    pub fn merge_all(values: impl IntoIterator<Item = Values>) -> Self {
        let mut result = Values::new();
        for v in values {
            result.merge(&v);
        }
        result
    }

    /// Set a value by dotted path (e.g., "image.tag")
    pub fn set(&mut self, path: &str, value: Value) {
        self.0.set_path(path, value);
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.get_path(path)
    }

    /// Get the inner value
    pub fn inner(&self) -> &Value {
        &self.0
    }

    /// Convert to the inner value
    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Map(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }
}

/// Parse a single `--set`-style scalar, inferring its type
pub fn parse_scalar(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" | "~" => Value::Null,
        _ => {
            if let Ok(num) = raw.parse::<i64>() {
                Value::Int(num)
            } else if let Ok(num) = raw.parse::<f64>() {
                Value::Float(num)
            } else if raw.starts_with('[') || raw.starts_with('{') {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

/// Parse --state-values-set arguments (key=value format)
pub fn parse_set_values(set_args: &[String]) -> Result<Values> {
    let mut values = Values::new();

    for arg in set_args {
        let (key, val) = arg
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| CoreError::InvalidSet { arg: arg.clone() })?;

        values.set(key, parse_scalar(val));
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_merge() {
        let mut base = Values::from_yaml(r#"
image:
  repository: nginx
  tag: "1.0"
replicas: 1
"#).unwrap();

        let overlay = Values::from_yaml(r#"
image:
  tag: "2.0"
  pullPolicy: Always
replicas: 3
"#).unwrap();

        base.merge(&overlay);

        assert_eq!(base.get("image.repository").unwrap(), &"nginx");
        assert_eq!(base.get("image.tag").unwrap(), &"2.0");
        assert_eq!(base.get("image.pullPolicy").unwrap(), &"Always");
        assert_eq!(base.get("replicas").unwrap(), &3);
    }

    #[test]
    fn test_layered_precedence() {
        let base = Values::from_yaml("bar: bar\nbaz: baz\nlist: [a, b]").unwrap();
        let env = Values::from_yaml("bar: bar_env\nlist: [c]").unwrap();
        let set = parse_set_values(&["baz=baz_override".to_string()]).unwrap();

        let merged = Values::merge_all([base, env, set]);

        assert_eq!(merged.get("bar").unwrap(), &"bar_env");
        assert_eq!(merged.get("baz").unwrap(), &"baz_override");
        assert_eq!(
            merged.get("list").unwrap(),
            &Value::Seq(vec![Value::from("c")])
        );
    }

    #[test]
    fn test_set_nested() {
        let mut values = Values::new();
        values.set("image.tag", Value::from("v1"));
        values.set("replicas", Value::Int(3));

        assert_eq!(values.get("image.tag").unwrap(), &"v1");
        assert_eq!(values.get("replicas").unwrap(), &3);
    }

    #[test]
    fn test_parse_set_values() {
        let args = vec![
            "image.tag=v2".to_string(),
            "replicas=5".to_string(),
            "debug=true".to_string(),
            "ratio=0.5".to_string(),
            "hosts=[\"a\",\"b\"]".to_string(),
        ];

        let values = parse_set_values(&args).unwrap();

        assert_eq!(values.get("image.tag").unwrap(), &"v2");
        assert_eq!(values.get("replicas").unwrap(), &5);
        assert_eq!(values.get("debug").unwrap(), &true);
        assert_eq!(values.get("ratio").unwrap(), &Value::Float(0.5));
        assert_eq!(
            values.get("hosts").unwrap(),
            &Value::Seq(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_parse_set_values_rejects_missing_key() {
        assert!(parse_set_values(&["noequals".to_string()]).is_err());
        assert!(parse_set_values(&["=value".to_string()]).is_err());
    }

    #[test]
    fn test_from_yaml_rejects_non_mapping() {
        let err = Values::from_yaml("- a\n- b").unwrap_err();
        assert!(err.to_string().contains("sequence"));
    }
}
