//! Writing files on the target

use std::io::Write;

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::Compression;
use flate2::write::GzEncoder;

use crate::command::{Command, ValidationError};
use crate::template::{RenderContext, RenderError};

/// Writes `content` to `path`, creating parent directories, then applies
/// owner and mode.
///
/// Content travels gzip+base64 so arbitrary bytes survive the shell; the
/// encoding is deterministic, keeping the command's fingerprint stable for
/// unchanged content.
#[derive(Debug, Clone)]
pub struct FileCommand {
    path: String,
    content: String,
    owner: String,
    mode: u32,
}

impl FileCommand {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        owner: impl Into<String>,
        mode: u32,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            owner: owner.into(),
            mode,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    fn payload(&self) -> String {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        // Writing into a Vec cannot fail.
        let _ = encoder.write_all(self.content.as_bytes());
        STANDARD.encode(encoder.finish().unwrap_or_default())
    }
}

impl Command for FileCommand {
    fn shell(&self) -> String {
        format!(
            "mkdir -p $(dirname {path}) && echo {payload} | base64 -d | gunzip > {path} && chown {owner} {path} && chmod {mode:o} {path}",
            path = self.path,
            payload = self.payload(),
            owner = self.owner,
            mode = self.mode,
        )
    }

    fn logging(&self) -> Option<String> {
        Some(format!(
            "writing file {} ({} bytes, {} {:o})",
            self.path,
            self.content.len(),
            self.owner,
            self.mode
        ))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.path.is_empty() {
            return Err(ValidationError::new("file path must be set"));
        }
        if self.owner.is_empty() {
            return Err(ValidationError::new("file owner must be set"));
        }
        Ok(())
    }

    fn render(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        self.path = ctx.render(&self.path)?;
        self.content = ctx.render(&self.content)?;
        Ok(())
    }
}
