//! Package installation on the target

use crate::command::{Command, ValidationError};

/// Installs distribution packages noninteractively.
#[derive(Debug, Clone)]
pub struct InstallPackagesCommand {
    packages: Vec<String>,
}

impl InstallPackagesCommand {
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }
}

impl Command for InstallPackagesCommand {
    fn shell(&self) -> String {
        format!(
            "DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends {}",
            self.packages.join(" ")
        )
    }

    fn logging(&self) -> Option<String> {
        Some(format!("installing packages {}", self.packages.join(", ")))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.packages.is_empty() {
            return Err(ValidationError::new("package list must not be empty"));
        }
        if self.packages.iter().any(|p| p.is_empty()) {
            return Err(ValidationError::new("package names must not be empty"));
        }
        Ok(())
    }
}
