//! Template contract and string-field expansion
//!
//! Templates fill a package with tasks; command fields they emit may carry
//! `{{ name }}` placeholders, expanded against the template's exported
//! configuration at add time. The engine sees that configuration only as an
//! explicit name→value map, never through reflection.

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};
use thiserror::Error;

use crate::error::BuildError;
use crate::package::Package;

/// Expansion failure; fatal for the build that triggered it.
#[derive(Debug, Error)]
#[error("template expansion failed: {0}")]
pub struct RenderError(#[from] minijinja::Error);

/// The variable namespace command fields are expanded against.
///
/// Built explicitly by the template, one [`set`] per exported configuration
/// value. Expansion is a pure function of the field text and this snapshot.
///
/// [`set`]: RenderContext::set
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    vars: BTreeMap<String, minijinja::Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` for use as `{{ name }}` in command fields.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<minijinja::Value>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Expand one template-bearing field. Unknown variables are errors: a
    /// silently empty expansion would still fingerprint, and then cache, the
    /// wrong command.
    pub fn render(&self, field: &str) -> Result<String, RenderError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Ok(env.render_str(field, &self.vars)?)
    }
}

/// User code that fills a package with tasks.
pub trait Template {
    /// The variable namespace for command-field expansion.
    fn context(&self) -> RenderContext {
        RenderContext::new()
    }

    /// Populate `package` through [`Package::add_commands`].
    fn render(&self, package: &mut Package) -> Result<(), BuildError>;
}

/// Render `template` into a fresh package.
pub fn render_template<P: Template>(template: &P) -> Result<Package, BuildError> {
    let mut package = Package::new(template.context());
    template.render(&mut package)?;
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_expands_bound_variables() {
        let mut ctx = RenderContext::new();
        ctx.set("version", "1.2.3").set("port", 8080);

        let rendered = ctx.render("install v{{ version }} on :{{ port }}").unwrap();
        assert_eq!(rendered, "install v1.2.3 on :8080");
    }

    #[test]
    fn render_without_placeholders_is_identity() {
        let ctx = RenderContext::new();
        assert_eq!(ctx.render("uptime").unwrap(), "uptime");
    }

    #[test]
    fn render_rejects_unknown_variables() {
        let ctx = RenderContext::new();
        assert!(ctx.render("echo {{ missing }}").is_err());
    }

    #[test]
    fn render_rejects_broken_syntax() {
        let ctx = RenderContext::new();
        assert!(ctx.render("echo {{ unclosed").is_err());
    }

    #[test]
    fn render_is_deterministic_for_a_snapshot() {
        let mut ctx = RenderContext::new();
        ctx.set("name", "db");

        let first = ctx.render("host-{{ name }}").unwrap();
        let second = ctx.render("host-{{ name }}").unwrap();
        assert_eq!(first, second);
    }
}
