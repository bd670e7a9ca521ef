//! Plain shell commands

use crate::command::{Command, ValidationError};
use crate::template::{RenderContext, RenderError};

/// Runs a raw shell line on the target.
///
/// The line may carry `{{ name }}` placeholders, expanded against the
/// template context when the command is added.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Command for ShellCommand {
    fn shell(&self) -> String {
        self.command.clone()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.command.trim().is_empty() {
            return Err(ValidationError::new("shell command must not be empty"));
        }
        Ok(())
    }

    fn render(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        self.command = ctx.render(&self.command)?;
        Ok(())
    }
}
