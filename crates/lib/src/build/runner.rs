//! Per-command execution: streaming capture and cache persistence
//!
//! Runs one pending command on the target, mirroring its interleaved
//! stdout/stderr to the event bus line by line while keeping a copy for the
//! cache. Success is recorded as `<checksum>.log` + `<checksum>.done` + a
//! `.run` manifest append; failure leaves only `<checksum>.failed.log` for
//! inspection.

use std::collections::VecDeque;
use std::io;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bedrock_core::event::{ExecStatus, Message};
use bedrock_target::{OutputStream, Target, TransportError, run_captured};

use super::{Build, InternalError, sudo_wrap};
use crate::error::BuildError;
use crate::package::CommandEntry;
use crate::template::Template;

const STDERR_TAIL_LINES: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

pub(crate) async fn run_command<T, P>(
    build: &Build<T, P>,
    hostname: &str,
    task_name: &str,
    run_file: &str,
    entry: &CommandEntry,
) -> Result<(), BuildError>
where
    T: Target,
    P: Template,
{
    let dir = build.cache.task_dir(task_name);
    ensure_cache_dir(build, &dir).await?;

    // Final shell text: env prefix, sudo, command. Entries are prepended
    // one at a time in list order, so the first-listed entry sits closest
    // to the command.
    let mut text = sudo_wrap(build.target.user(), &entry.command().shell());
    for env in &build.env {
        text = format!("{env} {text}");
    }

    debug!(task = %task_name, checksum = %entry.checksum, "executing command");
    let mut cmd = build.target.command(&text).map_err(BuildError::from)?;
    cmd.start().await.map_err(BuildError::from)?;
    let stdout = cmd.take_stdout().ok_or(TransportError::MissingStream).map_err(BuildError::from)?;
    let stderr = cmd.take_stderr().ok_or(TransportError::MissingStream).map_err(BuildError::from)?;

    let (tx, mut rx) = mpsc::channel::<(StreamKind, String)>(64);
    let stdout_reader = tokio::spawn(forward_lines(stdout, StreamKind::Stdout, tx.clone()));
    let stderr_reader = tokio::spawn(forward_lines(stderr, StreamKind::Stderr, tx));

    // Interleave in arrival order: one buffered copy for the cache, one
    // message per line for subscribers.
    let mut captured = String::new();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Some((kind, line)) = rx.recv().await {
        captured.push_str(&line);
        captured.push('\n');
        if kind == StreamKind::Stderr {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());
        }
        build.bus().publish(
            &Message::command(
                hostname,
                task_name,
                &entry.checksum,
                &entry.log_message,
                ExecStatus::ExecStart,
            )
            .with_line(line),
        );
    }
    drain(stdout_reader).await?;
    drain(stderr_reader).await?;

    let status = cmd.wait().await.map_err(BuildError::from)?;

    if status.success() {
        persist_success(build, task_name, &entry.checksum, run_file, &captured).await
    } else {
        persist_failure(build, task_name, &entry.checksum, &captured).await;
        Err(BuildError::CommandFailed {
            checksum: entry.checksum.clone(),
            code: status.code(),
            stderr_tail: tail.into_iter().collect::<Vec<_>>().join("\n"),
        })
    }
}

/// Create the task's cache dir. `mkdir -p` keeps this idempotent; the
/// setgid mode lets every group member share the files created below it.
async fn ensure_cache_dir<T, P>(build: &Build<T, P>, dir: &str) -> Result<(), BuildError>
where
    T: Target,
    P: Template,
{
    match build.exec_internal(&format!("mkdir -m2775 -p {dir}")).await {
        Ok(_) => Ok(()),
        Err(InternalError::Transport(err)) => Err(err.into()),
        Err(InternalError::Failed { code, stderr, .. }) => Err(BuildError::TargetUnusable(format!(
            "creating cache dir {dir} failed with exit code {code:?}: {stderr}"
        ))),
    }
}

/// Record a completed command: log, then marker, then manifest append.
///
/// The marker is written strictly after the log so no `.done` ever exists
/// without its `.log`; the manifest append lands before the next command
/// starts.
async fn persist_success<T, P>(
    build: &Build<T, P>,
    task_name: &str,
    checksum: &str,
    run_file: &str,
    captured: &str,
) -> Result<(), BuildError>
where
    T: Target,
    P: Template,
{
    let log = build.cache.log_file(task_name, checksum);
    let done = build.cache.done_marker(task_name, checksum);
    let raw = format!("cat - > {log} && touch {done} && echo {done} >> {run_file}");

    let mut cmd = build
        .target
        .command(&sudo_wrap(build.target.user(), &raw))
        .map_err(BuildError::from)?;
    cmd.set_stdin(captured.as_bytes().to_vec());
    let output = run_captured(cmd.as_mut()).await.map_err(BuildError::from)?;

    if output.status.success() {
        debug!(task = %task_name, checksum = %checksum, "command completion recorded");
        Ok(())
    } else {
        Err(BuildError::TargetUnusable(format!(
            "recording completion of {checksum} failed with exit code {:?}: {}",
            output.status.code(),
            output.stderr
        )))
    }
}

/// Keep the output of a failed attempt around for operators. Best effort:
/// the command failure is what the build reports, not this write.
async fn persist_failure<T, P>(build: &Build<T, P>, task_name: &str, checksum: &str, captured: &str)
where
    T: Target,
    P: Template,
{
    let failed_log = build.cache.failed_log_file(task_name, checksum);
    let raw = format!("cat - > {failed_log}");

    let result = async {
        let mut cmd = build.target.command(&sudo_wrap(build.target.user(), &raw))?;
        cmd.set_stdin(captured.as_bytes().to_vec());
        run_captured(cmd.as_mut()).await
    }
    .await;

    match result {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            warn!(checksum = %checksum, code = ?output.status.code(), "could not write failure log")
        }
        Err(err) => warn!(checksum = %checksum, error = %err, "could not write failure log"),
    }
}

async fn forward_lines(
    stream: OutputStream,
    kind: StreamKind,
    tx: mpsc::Sender<(StreamKind, String)>,
) -> io::Result<()> {
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        if tx.send((kind, line)).await.is_err() {
            break;
        }
    }
    Ok(())
}

async fn drain(reader: JoinHandle<io::Result<()>>) -> Result<(), BuildError> {
    match reader.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(TransportError::Io(err).into()),
        Err(_) => Err(TransportError::Session("output reader panicked".to_string()).into()),
    }
}
