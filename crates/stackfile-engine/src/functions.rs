//! Template functions (global functions available in templates)

use minijinja::{Error, ErrorKind, Value};
use std::path::{Path, PathBuf};

/// Fail with a custom error message
///
/// Usage: {{ fail("Something went wrong") }}
pub fn fail(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}

/// Create a dict from key-value pairs
///
/// Usage: {{ dict("key1", value1, "key2", value2) }}
pub fn dict(args: Vec<Value>) -> Result<Value, Error> {
    if !args.len().is_multiple_of(2) {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "dict requires an even number of arguments (key-value pairs)",
        ));
    }

    let mut pairs = Vec::with_capacity(args.len() / 2);
    for chunk in args.chunks(2) {
        let key = chunk[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "dict keys must be strings"))?;
        pairs.push((key.to_string(), chunk[1].clone()));
    }

    Ok(Value::from_iter(pairs))
}

/// Create a list from values
///
/// Usage: {{ list("a", "b", "c") }}
pub fn list(args: Vec<Value>) -> Value {
    Value::from(args)
}

/// Get a value with a default if undefined
///
/// Usage: {{ get(values, "key", "default") }}
pub fn get(obj: Value, key: String, default: Option<Value>) -> Value {
    match obj.get_attr(&key) {
        Ok(v) if !v.is_undefined() => v,
        _ => default.unwrap_or(Value::UNDEFINED),
    }
}

/// Return first non-empty value
///
/// Usage: {{ coalesce(a, b, c) }}
pub fn coalesce(args: Vec<Value>) -> Value {
    args.into_iter()
        .find(|arg| {
            !arg.is_undefined() && !arg.is_none() && arg.as_str().is_none_or(|s| !s.is_empty())
        })
        .unwrap_or(Value::UNDEFINED)
}

/// Ternary operator
///
/// Usage: {{ ternary(true_value, false_value, condition) }}
pub fn ternary(true_val: Value, false_val: Value, condition: Value) -> Value {
    if condition.is_true() {
        true_val
    } else {
        false_val
    }
}

/// Convert a value to a string representation
///
/// Usage: {{ tostring(value) }}
pub fn tostring(value: Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

/// Read an environment variable, with an optional default
///
/// Usage: {{ env("HOME") }} / {{ env("REGION", "eu-west-1") }}
pub fn env(name: String, default: Option<String>) -> String {
    std::env::var(&name)
        .ok()
        .or(default)
        .unwrap_or_default()
}

/// Read an environment variable that must be set and non-empty
///
/// Usage: {{ required_env("DEPLOY_TOKEN") }}
pub fn required_env(name: String) -> Result<String, Error> {
    match std::env::var(&name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("required env var `{}` is not set", name),
        )),
    }
}

/// Build a `read_file` function that resolves paths against `base_dir`
///
/// Usage: {{ read_file("templates.yaml") }}
pub fn read_file(base_dir: PathBuf) -> impl Fn(String) -> Result<String, Error> + Send + Sync + 'static {
    move |path: String| {
        let full = resolve(&base_dir, &path);
        std::fs::read_to_string(&full).map_err(|e| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("failed to read {}: {}", full.display(), e),
            )
        })
    }
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict() {
        let value = dict(vec![Value::from("a"), Value::from(1)]).unwrap();
        assert_eq!(value.get_attr("a").unwrap(), Value::from(1));
        assert!(dict(vec![Value::from("a")]).is_err());
    }

    #[test]
    fn test_coalesce_skips_empty() {
        let value = coalesce(vec![Value::UNDEFINED, Value::from(""), Value::from("x")]);
        assert_eq!(value.as_str(), Some("x"));
        assert!(coalesce(vec![]).is_undefined());
    }

    #[test]
    fn test_ternary() {
        assert_eq!(
            ternary(Value::from("yes"), Value::from("no"), Value::from(true)).as_str(),
            Some("yes")
        );
    }

    #[test]
    fn test_env_default() {
        assert_eq!(
            env("STACKFILE_TEST_SURELY_UNSET".to_string(), Some("fallback".to_string())),
            "fallback"
        );
        assert!(required_env("STACKFILE_TEST_SURELY_UNSET".to_string()).is_err());
    }

    #[test]
    fn test_read_file_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snippet.txt"), "hello").unwrap();

        let read = read_file(dir.path().to_path_buf());
        assert_eq!(read("snippet.txt".to_string()).unwrap(), "hello");
        assert!(read("missing.txt".to_string()).is_err());
    }
}
