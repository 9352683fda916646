//! Engine error types with source-aware formatting

use miette::{Diagnostic, NamedSource, SourceSpan};
use stackfile_core::Value;
use thiserror::Error;

use crate::suggestions::{
    AVAILABLE_FILTERS, extract_filter_name, extract_function_name, extract_variable_name,
    suggest_available_properties, suggest_iteration_fix, suggest_undefined_variable,
    suggest_unknown_filter, suggest_unknown_function,
};

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

impl TemplateErrorKind {
    fn of(err: &minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::UndefinedError => Self::UndefinedVariable,
            ErrorKind::UnknownFilter => Self::UnknownFilter,
            ErrorKind::UnknownFunction => Self::UnknownFunction,
            ErrorKind::SyntaxError => Self::SyntaxError,
            ErrorKind::InvalidOperation => Self::InvalidOperation,
            ErrorKind::NonPrimitive | ErrorKind::NonKey => Self::TypeError,
            _ => {
                let msg = err.to_string().to_lowercase();
                if msg.contains("undefined") {
                    Self::UndefinedVariable
                } else if msg.contains("not iterable") || msg.contains("cannot") {
                    Self::TypeError
                } else {
                    Self::Other
                }
            }
        }
    }
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(stackfile::template::render))]
pub struct TemplateError {
    /// Error message
    pub message: String,

    /// Error kind for categorization
    pub kind: TemplateErrorKind,

    /// Template source code
    #[source_code]
    pub src: NamedSource<String>,

    /// Error location in source
    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    /// Suggestion for fixing the error
    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a new template error from a MiniJinja error
    ///
    /// When `values` is given, undefined-key errors suggest keys that do exist.
    pub fn from_minijinja(
        err: minijinja::Error,
        template_name: &str,
        template_source: &str,
        values: Option<&Value>,
    ) -> Self {
        let (kind, message) = categorize_minijinja_error(&err);
        let span = err
            .line()
            .and_then(|line_num| calculate_span(template_source, line_num));
        let suggestion = generate_suggestion(&err, kind, values);

        Self {
            message,
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
            suggestion,
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

/// Error kind plus a message naming the failing expression when known
fn categorize_minijinja_error(err: &minijinja::Error) -> (TemplateErrorKind, String) {
    let kind = TemplateErrorKind::of(err);
    let msg = err.to_string();

    if kind == TemplateErrorKind::UndefinedVariable {
        if let Some(expr) = extract_expression_from_display(&format!("{:#}", err)) {
            return (kind, format!("undefined variable `{}`", expr));
        }
    }

    let cleaned = ["invalid operation: ", "syntax error: "]
        .iter()
        .fold(msg, |msg, prefix| msg.replace(prefix, ""))
        .replace("undefined value", "undefined variable");
    (kind, cleaned)
}

/// Extract the problematic expression from MiniJinja's detailed display
///
/// The display marks the failing line with `>`:
///
/// ```text
///    8 >   name: {{ values.app.name }}
///      i            ^^^^^^^^^ undefined value
/// ```
fn extract_expression_from_display(display: &str) -> Option<String> {
    let expression_in = |line: &str| -> Option<String> {
        let start = line.find("{{")?;
        let end = line[start..].find("}}")?;
        let expr = line[start + 2..start + end].trim();
        let expr = expr.split('|').next().unwrap_or(expr).trim();
        (!expr.is_empty()).then(|| expr.to_string())
    };

    display
        .lines()
        .find(|line| {
            let trimmed = line.trim_start();
            trimmed.contains(" > ") || trimmed.starts_with("> ")
        })
        .and_then(expression_in)
}

/// Calculate the source span for a given line number
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (index, line) in source.lines().enumerate() {
        if index + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len().into()));
        }
        offset += line.len() + 1;
    }

    None
}

/// Generate context-aware suggestions based on error kind
fn generate_suggestion(
    err: &minijinja::Error,
    kind: TemplateErrorKind,
    values: Option<&Value>,
) -> Option<String> {
    let msg = err.to_string();
    let detailed = format!("{:#}", err);

    match kind {
        TemplateErrorKind::UndefinedVariable => {
            let var_name = extract_expression_from_display(&detailed)
                .or_else(|| extract_variable_name(&msg))?;

            let in_values = var_name
                .strip_prefix("values.")
                .or_else(|| var_name.strip_prefix("environment.values."));
            if let (Some(path), Some(values)) = (in_values, values) {
                let (parent, key) = match path.rsplit_once('.') {
                    Some((parent, key)) => (parent, key),
                    None => ("", path),
                };
                if let Some(suggestion) = suggest_available_properties(parent, key, values) {
                    return Some(suggestion);
                }
            }

            suggest_undefined_variable(&var_name).or_else(|| {
                Some(format!(
                    "Variable `{}` is not defined. Check spelling or use `| default(\"fallback\")`.",
                    var_name
                ))
            })
        }

        TemplateErrorKind::UnknownFilter => match extract_filter_name(&msg) {
            Some(name) => suggest_unknown_filter(&name),
            None => Some(format!(
                "Unknown filter. Available: {}",
                AVAILABLE_FILTERS.join(", ")
            )),
        },

        TemplateErrorKind::UnknownFunction => {
            extract_function_name(&msg).and_then(|name| suggest_unknown_function(&name))
        }

        TemplateErrorKind::SyntaxError => {
            if msg.contains('}') || msg.contains('%') {
                Some(
                    "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements, `{# #}` for comments".to_string(),
                )
            } else {
                None
            }
        }

        TemplateErrorKind::TypeError if msg.to_lowercase().contains("not iterable") => {
            Some(suggest_iteration_fix("mapping"))
        }

        _ => None,
    }
}
