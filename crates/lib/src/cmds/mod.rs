//! Built-in command catalog
//!
//! Sugar over the [`Command`] contract for the operations most templates
//! need. Anything not covered here can implement the trait directly.
//!
//! [`Command`]: crate::command::Command

mod download;
mod file;
mod pkg;
mod shell;
mod user;

pub use download::DownloadCommand;
pub use file::FileCommand;
pub use pkg::InstallPackagesCommand;
pub use shell::ShellCommand;
pub use user::UserCommand;

use crate::command::Command;

/// Shorthand for boxing a raw shell line as a command.
pub fn cmd(line: impl Into<String>) -> Box<dyn Command> {
    Box::new(ShellCommand::new(line))
}
