//! Same-host target: runs raw command lines through `sh -c`

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::{ExecCommand, ExitStatus, OutputStream, Target, TransportError};

/// Runs builds against the local machine.
///
/// Commands go through `sh -c`, so the same raw strings a remote login
/// shell would interpret (heredocs included) work unchanged.
pub struct LocalTarget {
    user: String,
}

impl LocalTarget {
    /// Target the local machine as `user`.
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    /// Target the local machine as the invoking user.
    pub fn current_user() -> Self {
        let user = std::env::var("USER").unwrap_or_else(|_| "root".to_string());
        Self::new(user)
    }
}

#[async_trait]
impl Target for LocalTarget {
    fn user(&self) -> &str {
        &self.user
    }

    fn command(&self, raw: &str) -> Result<Box<dyn ExecCommand>, TransportError> {
        debug!(command = raw, "preparing local command");
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(raw)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(Box::new(LocalExec {
            command,
            stdin: None,
            child: None,
        }))
    }

    async fn reset(&mut self) -> Result<(), TransportError> {
        // Every command runs in a fresh `sh`; there is no session to renew.
        Ok(())
    }

    fn hostname(&self) -> Option<String> {
        Some("localhost".to_string())
    }
}

struct LocalExec {
    command: Command,
    stdin: Option<Vec<u8>>,
    child: Option<Child>,
}

#[async_trait]
impl ExecCommand for LocalExec {
    fn set_stdin(&mut self, input: Vec<u8>) {
        self.stdin = Some(input);
    }

    fn take_stdout(&mut self) -> Option<OutputStream> {
        let stream = self.child.as_mut()?.stdout.take()?;
        Some(Box::new(stream))
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        let stream = self.child.as_mut()?.stderr.take()?;
        Some(Box::new(stream))
    }

    async fn start(&mut self) -> Result<(), TransportError> {
        let mut child = self.command.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            let input = self.stdin.take().unwrap_or_default();
            // Close stdin after the payload so line-readers terminate.
            tokio::spawn(async move {
                let _ = stdin.write_all(&input).await;
                let _ = stdin.shutdown().await;
            });
        }
        self.child = Some(child);
        Ok(())
    }

    async fn wait(&mut self) -> Result<ExitStatus, TransportError> {
        let child = self.child.as_mut().ok_or(TransportError::NotStarted)?;
        let status = child.wait().await?;
        Ok(ExitStatus::new(status.code()))
    }
}
