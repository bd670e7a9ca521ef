//! User management on the target

use crate::command::{Command, ValidationError};

/// Creates a user if it does not already exist.
///
/// The existence check makes the command idempotent on the host even when
/// its cache entry is lost.
#[derive(Debug, Clone)]
pub struct UserCommand {
    name: String,
    system: bool,
}

impl UserCommand {
    /// A login user with a home directory and shell.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system: false,
        }
    }

    /// A system user for running services.
    pub fn system(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system: true,
        }
    }
}

impl Command for UserCommand {
    fn shell(&self) -> String {
        let flags = if self.system {
            "--system -U"
        } else {
            "-m -s /bin/bash -U"
        };
        format!(
            "{{ grep -e '^{name}:' /etc/passwd > /dev/null || {{ useradd {flags} {name}; }}; }}",
            name = self.name,
        )
    }

    fn logging(&self) -> Option<String> {
        let kind = if self.system { "system user" } else { "user" };
        Some(format!("adding {} {}", kind, self.name))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::new("user name must be set"));
        }
        if self.name.contains(char::is_whitespace) {
            return Err(ValidationError::new("user name must not contain whitespace"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_user_gets_home_and_shell() {
        assert_eq!(
            UserCommand::new("deploy").shell(),
            "{ grep -e '^deploy:' /etc/passwd > /dev/null || { useradd -m -s /bin/bash -U deploy; }; }"
        );
    }

    #[test]
    fn system_user_gets_the_system_flag() {
        let shell = UserCommand::system("elasticsearch").shell();
        assert!(shell.contains("useradd --system -U elasticsearch"));
    }

    #[test]
    fn name_is_required_and_must_be_one_word() {
        assert!(UserCommand::new("").validate().is_err());
        assert!(UserCommand::new("two words").validate().is_err());
        assert!(UserCommand::new("deploy").validate().is_ok());
    }
}
