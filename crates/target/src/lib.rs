//! bedrock-target: the contract between the build engine and a machine
//! that runs shell commands
//!
//! A [`Target`] turns raw command lines into [`ExecCommand`]s: startable
//! processes with pipeable stdin/stdout/stderr. The engine never cares how
//! the command reaches the machine; an SSH session and a local shell are
//! interchangeable here. This crate ships the contract and the local
//! implementation ([`LocalTarget`]).

pub mod local;

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub use local::LocalTarget;

/// Transport-level failure: the command could not be started, its streams
/// broke down, or the session died.
///
/// A command that ran to completion with a non-zero exit is *not* a
/// transport error; that outcome lives in [`ExitStatus`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("output stream missing or already taken")]
    MissingStream,

    #[error("command was not started")]
    NotStarted,

    #[error("session cancelled")]
    Cancelled,

    #[error("session error: {0}")]
    Session(String),
}

/// Exit state of a command that ran to completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitStatus {
    code: Option<i32>,
}

impl ExitStatus {
    /// `code` is `None` when the command was terminated by a signal.
    pub fn new(code: Option<i32>) -> Self {
        Self { code }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

/// Byte stream of a running command's stdout or stderr.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// A single command prepared on a target.
///
/// Lifecycle: optionally [`set_stdin`], then [`start`], then drain the
/// output streams, then [`wait`].
///
/// [`set_stdin`]: ExecCommand::set_stdin
/// [`start`]: ExecCommand::start
/// [`wait`]: ExecCommand::wait
#[async_trait]
pub trait ExecCommand: Send {
    /// Bytes fed to the command's stdin. The stream is closed after the
    /// last byte so readers on the far side see EOF.
    fn set_stdin(&mut self, input: Vec<u8>);

    /// Take the stdout stream. `None` once taken, or before `start`.
    fn take_stdout(&mut self) -> Option<OutputStream>;

    /// Take the stderr stream. `None` once taken, or before `start`.
    fn take_stderr(&mut self) -> Option<OutputStream>;

    async fn start(&mut self) -> Result<(), TransportError>;

    /// Wait for the command to finish. `Ok` for every command that ran to
    /// completion, whatever its exit code; `Err` only when the transport
    /// itself failed.
    async fn wait(&mut self) -> Result<ExitStatus, TransportError>;
}

/// A machine that accepts raw shell command lines.
#[async_trait]
pub trait Target: Send {
    /// Login user the target executes as; decides sudo wrapping.
    fn user(&self) -> &str;

    /// Prepare (but do not start) a command from a raw shell line.
    fn command(&self, raw: &str) -> Result<Box<dyn ExecCommand>, TransportError>;

    /// Tear down and re-establish the session, so server-side changes such
    /// as fresh group memberships become visible to later commands.
    async fn reset(&mut self) -> Result<(), TransportError>;

    /// Human-readable host identity for events.
    fn hostname(&self) -> Option<String> {
        None
    }
}

/// stdout and stderr of a completed command, drained separately.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run a prepared command to completion, capturing both output streams.
pub async fn run_captured(cmd: &mut dyn ExecCommand) -> Result<CapturedOutput, TransportError> {
    cmd.start().await?;
    let mut stdout = cmd.take_stdout().ok_or(TransportError::MissingStream)?;
    let mut stderr = cmd.take_stderr().ok_or(TransportError::MissingStream)?;

    let mut out = Vec::new();
    let mut err = Vec::new();
    let (out_read, err_read) = tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
    out_read?;
    err_read?;

    let status = cmd.wait().await?;
    Ok(CapturedOutput {
        status,
        stdout: String::from_utf8_lossy(&out).into_owned(),
        stderr: String::from_utf8_lossy(&err).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_success_only_for_zero() {
        assert!(ExitStatus::new(Some(0)).success());
        assert!(!ExitStatus::new(Some(1)).success());
        assert!(!ExitStatus::new(None).success());
    }
}
