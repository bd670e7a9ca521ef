//! bedrock: incremental remote provisioning
//!
//! A build is the glue between a [`Target`] (a machine that runs shell
//! commands) and a [`Template`] (user code that emits them). Running a
//! build renders the template into a [`Package`] of named tasks, each an
//! ordered list of commands, fingerprints every command, diffs the
//! fingerprints against the checksum cache on the target host, and
//! executes only what the cache cannot vouch for. Successful commands are
//! recorded back into the cache, so interrupted runs resume where they
//! stopped.

pub mod build;
pub mod cmds;
pub mod command;
pub mod error;
pub mod package;
pub mod template;

pub use bedrock_core::cache::{CACHE_GROUP, CacheLayout, ChecksumTree, DEFAULT_CACHE_ROOT};
pub use bedrock_core::event::{self, EventBus, ExecStatus, Message};
pub use bedrock_core::hash::fingerprint;
pub use bedrock_target::{ExecCommand, ExitStatus, LocalTarget, OutputStream, Target, TransportError};

pub use build::Build;
pub use command::Command;
pub use error::BuildError;
pub use package::{Package, Task};
pub use template::{RenderContext, Template};

/// Render `template` and run it on `target` with default settings.
pub async fn run<T, P>(target: T, template: P) -> Result<(), BuildError>
where
    T: Target,
    P: Template,
{
    Build::new(target, template).run().await
}

/// Report which commands a run would execute, without executing anything.
pub async fn dry_run<T, P>(target: T, template: P) -> Result<(), BuildError>
where
    T: Target,
    P: Template,
{
    Build::new(target, template).dry_run().await
}
