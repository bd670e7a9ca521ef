//! Fetching archives and files onto the target

use crate::command::{Command, ValidationError};
use crate::template::{RenderContext, RenderError};

/// Downloads an archive on the target and unpacks it below `destination`.
///
/// Urls without a recognized archive suffix are rejected at validation,
/// before the command enters a package. The fetch happens on the target
/// through its own shell, so the controlling machine never proxies the
/// bytes.
#[derive(Debug, Clone)]
pub struct DownloadCommand {
    url: String,
    destination: String,
}

impl DownloadCommand {
    pub fn new(url: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    fn tar_flag(&self) -> Option<&'static str> {
        if self.url.ends_with(".tar.gz") || self.url.ends_with(".tgz") {
            Some("z")
        } else if self.url.ends_with(".tar.bz2") || self.url.ends_with(".tbz2") {
            Some("j")
        } else if self.url.ends_with(".tar") {
            Some("")
        } else {
            None
        }
    }
}

impl Command for DownloadCommand {
    fn shell(&self) -> String {
        let flag = self.tar_flag().unwrap_or("");
        format!(
            "mkdir -p {dest} && curl -SsfL {url} | tar -C {dest} -x{flag}f -",
            dest = self.destination,
            url = self.url,
        )
    }

    fn logging(&self) -> Option<String> {
        Some(format!("downloading {} to {}", self.url, self.destination))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::new("download url must be set"));
        }
        if self.destination.is_empty() {
            return Err(ValidationError::new("download destination must be set"));
        }
        if self.tar_flag().is_none() {
            return Err(ValidationError::new(format!("unsupported archive format: {}", self.url)));
        }
        Ok(())
    }

    fn render(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        self.url = ctx.render(&self.url)?;
        self.destination = ctx.render(&self.destination)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tarballs_are_piped_into_tar() {
        let command = DownloadCommand::new("https://example.com/app-1.0.tar.gz", "/opt");
        assert_eq!(
            command.shell(),
            "mkdir -p /opt && curl -SsfL https://example.com/app-1.0.tar.gz | tar -C /opt -xzf -"
        );
    }

    #[test]
    fn bzip2_tarballs_get_the_j_flag() {
        let command = DownloadCommand::new("https://example.com/app.tar.bz2", "/opt");
        assert!(command.shell().contains("tar -C /opt -xjf -"));
    }

    #[test]
    fn url_and_destination_are_required() {
        assert!(DownloadCommand::new("", "/opt").validate().is_err());
        assert!(DownloadCommand::new("https://example.com/x.tar.gz", "").validate().is_err());
        assert!(DownloadCommand::new("https://example.com/x.tar.gz", "/opt").validate().is_ok());
    }

    #[test]
    fn unsupported_archive_suffixes_are_rejected() {
        assert!(DownloadCommand::new("https://example.com/app.zip", "/opt").validate().is_err());
        assert!(DownloadCommand::new("https://example.com/app.bin", "/opt").validate().is_err());
        assert!(DownloadCommand::new("https://example.com/app.tar", "/opt").validate().is_ok());
        assert!(DownloadCommand::new("https://example.com/app.tbz2", "/opt").validate().is_ok());
    }

    #[test]
    fn render_expands_url_and_destination() {
        let mut ctx = RenderContext::new();
        ctx.set("version", "0.90.9");

        let mut command = DownloadCommand::new(
            "https://example.com/app-{{ version }}.tar.gz",
            "/opt/app-{{ version }}",
        );
        command.render(&ctx).unwrap();

        assert_eq!(command.url(), "https://example.com/app-0.90.9.tar.gz");
        assert_eq!(command.destination(), "/opt/app-0.90.9");
    }
}
