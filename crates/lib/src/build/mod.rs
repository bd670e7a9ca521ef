//! Build orchestration: render, prepare, diff, execute
//!
//! One build provisions one target. The flow is strictly sequential:
//! render the template, make sure the target can host the cache, read the
//! host's checksum tree, mark what is already done, then run the rest task
//! by task, command by command. The first error aborts the build.

mod checksum;
mod prepare;
mod runner;

use chrono::Local;
use tracing::{debug, info};

use bedrock_core::cache::CacheLayout;
use bedrock_core::event::{self, EventBus, ExecStatus, Message};
use bedrock_target::{CapturedOutput, Target, TransportError, run_captured};

use crate::error::BuildError;
use crate::package::{Package, Task};
use crate::template::{Template, render_template};

/// The glue between a target and a template.
///
/// Holds the basic parameters of a provisioning run; [`run`] and
/// [`dry_run`] do the work.
///
/// [`run`]: Build::run
/// [`dry_run`]: Build::dry_run
pub struct Build<T, P> {
    /// Where to run the build.
    pub target: T,
    /// What to build.
    pub template: P,
    /// `KEY=VALUE` entries prefixed verbatim to every task command.
    pub env: Vec<String>,
    /// Host-side cache location.
    pub cache: CacheLayout,
    bus: EventBus,
}

impl<T: Target, P: Template> Build<T, P> {
    pub fn new(target: T, template: P) -> Self {
        Self {
            target,
            template,
            env: Vec::new(),
            cache: CacheLayout::default(),
            bus: event::global().clone(),
        }
    }

    /// Replace the event bus; tests use an in-memory one.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_cache(mut self, cache: CacheLayout) -> Self {
        self.cache = cache;
        self
    }

    /// Render the template and run every pending command of every task.
    ///
    /// Stops at the first error and returns it; whatever completed before
    /// the error stays cached on the host for the next run.
    pub async fn run(&mut self) -> Result<(), BuildError> {
        let mut package = self.prepare().await?;
        let hostname = self.hostname();
        info!(host = %hostname, tasks = package.tasks().len(), "starting build");

        self.bus.publish(&Message::runlist(&hostname, ExecStatus::Started));
        for task in package.tasks_mut() {
            if let Err(err) = self.build_task(task).await {
                self
                    .bus
                    .publish(&Message::runlist(&hostname, ExecStatus::Error).with_error(&err));
                return Err(err);
            }
        }
        self
            .bus
            .publish(&Message::runlist(&hostname, ExecStatus::ExecFinished));
        info!(host = %hostname, "build finished");
        Ok(())
    }

    /// Emit the same per-command decisions as [`run`] without running
    /// anything: `cached` for commands the host vouches for, `exec-start`
    /// for commands that would execute.
    ///
    /// [`run`]: Build::run
    pub async fn dry_run(&mut self) -> Result<(), BuildError> {
        let package = self.prepare().await?;
        let hostname = self.hostname();

        for task in package.tasks() {
            for entry in task.commands() {
                let status = if entry.cached() {
                    ExecStatus::Cached
                } else {
                    ExecStatus::ExecStart
                };
                self.bus.publish(&Message::command(
                    &hostname,
                    task.name(),
                    entry.checksum(),
                    entry.log_message(),
                    status,
                ));
            }
        }
        Ok(())
    }

    /// Render, preflight the target, read the remote cache, mark cached
    /// entries.
    async fn prepare(&mut self) -> Result<Package, BuildError> {
        let mut package = render_template(&self.template)?;
        prepare::prepare_target(self).await?;
        let tree = checksum::read_checksum_tree(self).await?;
        checksum::mark_cached(&mut package, &tree);
        Ok(package)
    }

    async fn build_task(&self, task: &mut Task) -> Result<(), BuildError> {
        let started = Local::now();
        task.started = Some(started);
        let stamp = started.format("%Y%m%d_%H%M%S").to_string();
        let run_file = self.cache.run_file(&task.name, &stamp);
        let hostname = self.hostname();

        for entry in task.commands.iter() {
            if entry.cached {
                debug!(task = %task.name, checksum = %entry.checksum, "command cached, skipping");
                self.bus.publish(&Message::command(
                    &hostname,
                    &task.name,
                    &entry.checksum,
                    &entry.log_message,
                    ExecStatus::Cached,
                ));
                continue;
            }

            self.bus.publish(&Message::command(
                &hostname,
                &task.name,
                &entry.checksum,
                &entry.log_message,
                ExecStatus::ExecStart,
            ));

            let result = runner::run_command(self, &hostname, &task.name, &run_file, entry).await;

            let mut finished = Message::command(
                &hostname,
                &task.name,
                &entry.checksum,
                &entry.log_message,
                ExecStatus::ExecFinished,
            );
            if let Err(err) = &result {
                finished = finished.with_error(err);
            }
            self.bus.publish(&finished);
            result?;
        }

        Ok(())
    }

    pub(crate) fn hostname(&self) -> String {
        self.target.hostname().unwrap_or_else(|| "MISSING".to_string())
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Run a bootstrap/diff command on the target, capturing output.
    pub(crate) async fn exec_internal(&self, raw: &str) -> Result<CapturedOutput, InternalError> {
        let wrapped = internal_wrap(self.target.user(), raw);
        debug!(command = raw, "running internal command");
        let mut cmd = self.target.command(&wrapped).map_err(InternalError::Transport)?;
        let output = run_captured(cmd.as_mut())
            .await
            .map_err(InternalError::Transport)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(InternalError::Failed {
                code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }
}

/// Outcome of an internal command that did not succeed.
pub(crate) enum InternalError {
    Transport(TransportError),
    Failed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// Prefix `sudo ` unless the target user is already root.
pub(crate) fn sudo_wrap(user: &str, raw: &str) -> String {
    if user == "root" {
        raw.to_string()
    } else {
        format!("sudo {raw}")
    }
}

/// Wrap an internal command in a heredoc-bounded `sh -x -e` invocation:
/// strict failure semantics and uniform echoing, independent of the login
/// shell on the far side.
pub(crate) fn internal_wrap(user: &str, raw: &str) -> String {
    sudo_wrap(user, &format!("sh -x -e <<\"EOC\"\n{raw}\nEOC\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_commands_are_not_sudo_wrapped() {
        assert_eq!(sudo_wrap("root", "uptime"), "uptime");
    }

    #[test]
    fn non_root_commands_are_sudo_wrapped() {
        assert_eq!(sudo_wrap("deploy", "uptime"), "sudo uptime");
    }

    #[test]
    fn internal_commands_run_under_strict_sh() {
        assert_eq!(
            internal_wrap("root", "ls /var"),
            "sh -x -e <<\"EOC\"\nls /var\nEOC\n"
        );
        assert_eq!(
            internal_wrap("deploy", "ls /var"),
            "sudo sh -x -e <<\"EOC\"\nls /var\nEOC\n"
        );
    }
}
