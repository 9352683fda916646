//! Fuzzy matching and context-aware suggestions for template errors

use stackfile_core::Value;

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// All registered filters in the engine
pub const AVAILABLE_FILTERS: &[&str] = &[
    // Custom filters
    "toyaml",
    "tojson",
    "b64encode",
    "b64decode",
    "quote",
    "squote",
    "nindent",
    "indent",
    "required",
    "haskey",
    // Built-in MiniJinja filters
    "default",
    "upper",
    "lower",
    "replace",
    "trim",
    "join",
    "first",
    "last",
    "length",
    "sort",
    "map",
    "select",
    "selectattr",
    "dictsort",
    "items",
    "int",
    "float",
    "string",
    "list",
    "bool",
];

/// All registered functions in the engine
pub const AVAILABLE_FUNCTIONS: &[&str] = &[
    "fail",
    "dict",
    "list",
    "get",
    "coalesce",
    "ternary",
    "tostring",
    "env",
    "required_env",
    "read_file",
    // Built-in MiniJinja globals
    "range",
    "namespace",
];

/// Top-level context variables available in state templates
pub const CONTEXT_VARIABLES: &[&str] = &["environment", "values", "release"];

/// Find candidates within edit distance, closest first
pub fn find_closest_matches<'a>(input: &str, candidates: &[&'a str], max_results: usize) -> Vec<&'a str> {
    let mut matches: Vec<(usize, &str)> = candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = strsim::levenshtein(input, candidate);
            (distance <= MAX_SUGGESTION_DISTANCE && distance > 0).then_some((distance, candidate))
        })
        .collect();

    matches.sort_by_key(|(distance, _)| *distance);
    matches.truncate(max_results);
    matches.into_iter().map(|(_, text)| text).collect()
}

fn did_you_mean(matches: &[&str]) -> Option<String> {
    if matches.is_empty() {
        return None;
    }
    let quoted: Vec<String> = matches.iter().map(|m| format!("`{}`", m)).collect();
    Some(format!("Did you mean {}?", quoted.join(" or ")))
}

/// Suggest corrections for an undefined top-level variable
pub fn suggest_undefined_variable(variable_name: &str) -> Option<String> {
    let root = variable_name.split('.').next().unwrap_or(variable_name);

    if root == "value" || root == "env" {
        return Some(
            "Use `values.key` or `environment.values.key` to read environment values".to_string(),
        );
    }

    did_you_mean(&find_closest_matches(root, CONTEXT_VARIABLES, 1))
}

/// Suggest corrections for an unknown filter
pub fn suggest_unknown_filter(filter_name: &str) -> Option<String> {
    did_you_mean(&find_closest_matches(filter_name, AVAILABLE_FILTERS, 3)).or_else(|| {
        Some(format!(
            "Unknown filter `{}`. Common filters: toyaml, tojson, quote, default, indent, nindent",
            filter_name
        ))
    })
}

/// Suggest corrections for an unknown function
pub fn suggest_unknown_function(func_name: &str) -> Option<String> {
    did_you_mean(&find_closest_matches(func_name, AVAILABLE_FUNCTIONS, 3)).or_else(|| {
        Some(format!(
            "Unknown function `{}`. Available functions: {}",
            func_name,
            AVAILABLE_FUNCTIONS.join(", ")
        ))
    })
}

/// Keys of the mapping found at `path` (empty path is the root)
pub fn extract_available_keys(values: &Value, path: &str) -> Vec<String> {
    let target = if path.is_empty() {
        Some(values)
    } else {
        values.get_path(path)
    };

    target
        .and_then(Value::as_map)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

/// Suggest available properties when accessing an undefined key
pub fn suggest_available_properties(
    parent_path: &str,
    attempted_key: &str,
    values: &Value,
) -> Option<String> {
    let available = extract_available_keys(values, parent_path);
    if available.is_empty() {
        return None;
    }

    let prefix = if parent_path.is_empty() {
        "values".to_string()
    } else {
        format!("values.{}", parent_path)
    };

    let candidates: Vec<&str> = available.iter().map(String::as_str).collect();
    let matches = find_closest_matches(attempted_key, &candidates, 3);

    if matches.is_empty() {
        Some(format!(
            "Key `{}` not found in `{}`. Available keys: {}",
            attempted_key,
            prefix,
            available.join(", ")
        ))
    } else {
        let suggestions: Vec<String> = matches
            .iter()
            .map(|m| format!("`{}.{}`", prefix, m))
            .collect();
        Some(format!(
            "Did you mean {}? Available: {}",
            suggestions.join(" or "),
            available.join(", ")
        ))
    }
}

/// Generate a type-specific hint for iteration errors
pub fn suggest_iteration_fix(type_name: &str) -> String {
    match type_name {
        "mapping" => {
            "Mappings require `| dictsort` or `| items` to iterate: `{% for key, value in obj | items %}`"
                .to_string()
        }
        "null" => "Value is null. Use `| default([])` for an empty list".to_string(),
        _ => format!("Value of type `{}` is not iterable", type_name),
    }
}

/// Extract a quoted name from an error message
pub fn extract_variable_name(msg: &str) -> Option<String> {
    let patterns = [("`", "`"), ("'", "'"), ("\"", "\"")];

    for (start, end) in patterns {
        if let Some(start_idx) = msg.find(start) {
            let rest = &msg[start_idx + start.len()..];
            if let Some(end_idx) = rest.find(end) {
                return Some(rest[..end_idx].to_string());
            }
        }
    }
    None
}

/// Extract filter name from error message
pub fn extract_filter_name(msg: &str) -> Option<String> {
    extract_variable_name(msg)
}

/// Extract function name from error message
pub fn extract_function_name(msg: &str) -> Option<String> {
    extract_variable_name(msg)
}
