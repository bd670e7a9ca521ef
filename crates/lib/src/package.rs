//! Package assembly: ordered tasks of validated, rendered commands
//!
//! A package is what a template renders into: tasks in insertion order,
//! each an ordered list of commands. The assembler validates commands and
//! expands their template-bearing fields as they are added; it never
//! executes anything.

use chrono::{DateTime, Local};

use crate::command::{Command, command_checksum, log_label};
use crate::error::BuildError;
use crate::template::RenderContext;

/// One command inside a task, with its cache bookkeeping.
pub struct CommandEntry {
    pub(crate) command: Box<dyn Command>,
    pub(crate) checksum: String,
    pub(crate) log_message: String,
    pub(crate) cached: bool,
}

impl CommandEntry {
    /// The command's cache identity, computed after field expansion.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Whether the host's cache vouches for this command at this position.
    pub fn cached(&self) -> bool {
        self.cached
    }

    pub fn log_message(&self) -> &str {
        &self.log_message
    }

    pub fn command(&self) -> &dyn Command {
        self.command.as_ref()
    }
}

/// A named group of commands; the unit of cache partitioning.
pub struct Task {
    pub(crate) name: String,
    pub(crate) commands: Vec<CommandEntry>,
    pub(crate) started: Option<DateTime<Local>>,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[CommandEntry] {
        &self.commands
    }

    pub(crate) fn commands_mut(&mut self) -> &mut [CommandEntry] {
        &mut self.commands
    }

    pub fn started(&self) -> Option<DateTime<Local>> {
        self.started
    }
}

/// Ordered tasks rendered from one template. Tasks are never reordered.
pub struct Package {
    tasks: Vec<Task>,
    context: RenderContext,
}

impl Package {
    pub(crate) fn new(context: RenderContext) -> Self {
        Self {
            tasks: Vec::new(),
            context,
        }
    }

    /// Append a task with the given commands, in order.
    ///
    /// Each command is validated, then its template-bearing fields are
    /// expanded against the owning template's context. The package takes
    /// ownership, so the expanded fields are the ones later fingerprinted
    /// and executed.
    pub fn add_commands<I>(&mut self, name: &str, commands: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = Box<dyn Command>>,
    {
        if name.is_empty() {
            return Err(BuildError::InvalidTask);
        }
        if self.tasks.iter().any(|task| task.name == name) {
            return Err(BuildError::DuplicateTask(name.to_string()));
        }

        let mut entries = Vec::new();
        for mut command in commands {
            command.validate()?;
            command.render(&self.context)?;
            let checksum = command_checksum(command.as_ref());
            let log_message = log_label(command.as_ref());
            entries.push(CommandEntry {
                command,
                checksum,
                log_message,
                cached: false,
            });
        }

        self.tasks.push(Task {
            name: name.to_string(),
            commands: entries,
            started: None,
        });
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }
}
