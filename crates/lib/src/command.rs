//! The command contract
//!
//! A command is anything that can express itself as shell text. The
//! remaining methods are optional capabilities with absent defaults, so
//! the catalog stays open: third-party command kinds implement exactly the
//! capabilities they have, and the engine probes for the rest.

use thiserror::Error;

use bedrock_core::hash;

use crate::template::{RenderContext, RenderError};

/// Rejection from a command's [`validate`] capability.
///
/// [`validate`]: Command::validate
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A single shell-expressible operation.
pub trait Command: Send {
    /// The shell text executed on the target.
    fn shell(&self) -> String;

    /// Custom cache identity. `None` means fingerprint the shell text.
    fn checksum(&self) -> Option<String> {
        None
    }

    /// Label used in events and logs instead of the raw shell text.
    fn logging(&self) -> Option<String> {
        None
    }

    /// Reject impossible configurations before the command enters a package.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Expand template-bearing fields in place against `ctx`.
    fn render(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        let _ = ctx;
        Ok(())
    }
}

/// A command's cache identity: its custom checksum if it advertises one,
/// else the SHA-256 of its post-expansion shell text.
pub fn command_checksum(command: &dyn Command) -> String {
    command
        .checksum()
        .unwrap_or_else(|| hash::fingerprint(&command.shell()))
}

/// Label for a command in events and logs.
pub fn log_label(command: &dyn Command) -> String {
    command.logging().unwrap_or_else(|| command.shell())
}
