//! Template engine based on MiniJinja

use minijinja::{Environment, UndefinedBehavior};
use std::path::PathBuf;
use tracing::trace;

use crate::context::RenderContext;
use crate::error::{Result, TemplateError};
use crate::filters;
use crate::functions;

/// How undefined variables behave while rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Undefined values render as empty and attribute access on them chains
    Lenient,
    /// Any use of an undefined value is an error
    #[default]
    Strict,
}

impl RenderMode {
    fn undefined_behavior(self) -> UndefinedBehavior {
        match self {
            Self::Lenient => UndefinedBehavior::Chainable,
            Self::Strict => UndefinedBehavior::Strict,
        }
    }
}

/// Template engine builder
#[derive(Debug, Default)]
pub struct EngineBuilder {
    mode: RenderMode,
    base_dir: Option<PathBuf>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Directory `read_file` resolves relative paths against
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            mode: self.mode,
            base_dir: self.base_dir,
        }
    }
}

/// The template engine
#[derive(Debug, Clone)]
pub struct Engine {
    mode: RenderMode,
    base_dir: Option<PathBuf>,
}

impl Engine {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            base_dir: None,
        }
    }

    pub fn lenient() -> Self {
        Self::new(RenderMode::Lenient)
    }

    pub fn strict() -> Self {
        Self::new(RenderMode::Strict)
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Same engine, different undefined behavior
    pub fn with_mode(&self, mode: RenderMode) -> Self {
        Self {
            mode,
            base_dir: self.base_dir.clone(),
        }
    }

    /// Create a configured MiniJinja environment
    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(self.mode.undefined_behavior());
        env.set_keep_trailing_newline(true);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);
        env.add_filter("haskey", filters::haskey);

        env.add_function("fail", functions::fail);
        env.add_function("dict", functions::dict);
        env.add_function("list", functions::list);
        env.add_function("get", functions::get);
        env.add_function("coalesce", functions::coalesce);
        env.add_function("ternary", functions::ternary);
        env.add_function("tostring", functions::tostring);
        env.add_function("env", functions::env);
        env.add_function("required_env", functions::required_env);

        let base_dir = self
            .base_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        env.add_function("read_file", functions::read_file(base_dir));

        env
    }

    /// Render a single template string
    pub fn render_str(
        &self,
        template: &str,
        context: &RenderContext,
        template_name: &str,
    ) -> Result<String> {
        trace!(template = template_name, mode = ?self.mode, "rendering template");

        let env = self.create_environment();
        let ctx = minijinja::context! {
            environment => &context.environment,
            values => &context.environment.values,
            release => &context.release,
        };

        env.render_named_str(template_name, template, ctx)
            .map_err(|e| {
                TemplateError::from_minijinja(e, template_name, template, Some(context.values()))
                    .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EnvironmentInfo, ReleaseInfo};
    use crate::error::{EngineError, TemplateErrorKind};
    use stackfile_core::Value;

    fn create_test_context() -> RenderContext {
        let values = Value::from_yaml(
            r#"
image:
  repository: nginx
  tag: "1.25"
replicas: 3
"#,
        )
        .unwrap();

        RenderContext::new(EnvironmentInfo::new("production", values).with_kube_context("prod"))
    }

    #[test]
    fn test_render_simple() {
        let engine = Engine::strict();
        let ctx = create_test_context();

        let result = engine
            .render_str("replicas: {{ values.replicas }}", &ctx, "test.yaml")
            .unwrap();

        assert_eq!(result, "replicas: 3");
    }

    #[test]
    fn test_render_environment() {
        let engine = Engine::strict();
        let ctx = create_test_context();

        let template = "{{ environment.name }}/{{ environment.kubeContext }}/{{ environment.values.image.tag }}";
        let result = engine.render_str(template, &ctx, "test.yaml").unwrap();

        assert_eq!(result, "production/prod/1.25");
    }

    #[test]
    fn test_render_with_filters() {
        let engine = Engine::strict();
        let ctx = create_test_context();

        let template = "image:{{ values.image | toyaml | nindent(2) }}";
        let result = engine.render_str(template, &ctx, "test.yaml").unwrap();

        insta::assert_snapshot!(result, @r#"
        image:
          repository: nginx
          tag: '1.25'
        "#);
    }

    #[test]
    fn test_render_release_info() {
        let engine = Engine::strict();
        let ctx = create_test_context().with_release(ReleaseInfo {
            name: "myapp".to_string(),
            namespace: "web".to_string(),
            chart: "stable/nginx".to_string(),
            ..Default::default()
        });

        let template = "{{ release.name }}@{{ release.namespace }}";
        let result = engine.render_str(template, &ctx, "test.yaml").unwrap();

        assert_eq!(result, "myapp@web");
    }

    #[test]
    fn test_strict_undefined_error() {
        let engine = Engine::strict();
        let ctx = create_test_context();

        let err = engine
            .render_str("value: {{ values.missing.key }}", &ctx, "test.yaml")
            .unwrap_err();

        match err {
            EngineError::Template(e) => assert_eq!(e.kind(), TemplateErrorKind::UndefinedVariable),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lenient_chains_undefined() {
        let engine = Engine::lenient();
        let ctx = create_test_context();

        let result = engine
            .render_str("a: '{{ values.missing.key }}'", &ctx, "test.yaml")
            .unwrap();

        assert_eq!(result, "a: ''");
    }

    #[test]
    fn test_read_file_uses_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("extra.txt"), "from disk").unwrap();

        let engine = Engine::builder().base_dir(dir.path()).build();
        let ctx = create_test_context();

        let result = engine
            .render_str("{{ read_file('extra.txt') }}", &ctx, "test.yaml")
            .unwrap();
        assert_eq!(result, "from disk");
    }
}
