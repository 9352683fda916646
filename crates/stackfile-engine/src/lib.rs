//! Stackfile Engine - Jinja2 templating for state documents
//!
//! This crate provides a MiniJinja-based template engine with:
//! - Two render modes: lenient (chainable undefined) and strict
//! - YAML-oriented filters (toyaml, nindent, quote, etc.)
//! - Environment access helpers (env, required_env, read_file)
//! - Human-readable error messages with suggestions

pub mod context;
pub mod engine;
pub mod error;
pub mod filters;
pub mod functions;
pub mod suggestions;

pub use context::{EnvironmentInfo, ReleaseInfo, RenderContext};
pub use engine::{Engine, EngineBuilder, RenderMode};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use suggestions::{AVAILABLE_FILTERS, AVAILABLE_FUNCTIONS};
