//! Build-level errors
//!
//! Every variant is fatal for the current build: the engine neither retries
//! nor continues past the first failure. Target preparation is the one
//! place that tolerates an expected check failure, and it re-raises as
//! [`BuildError::TargetUnusable`] when the repair pass cannot fix things.

use thiserror::Error;

use bedrock_core::cache::CorruptCache;
use bedrock_target::TransportError;

use crate::command::ValidationError;
use crate::template::RenderError;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Template expansion of a command field failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A command rejected its own configuration at add time.
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] ValidationError),

    /// A task was added with an empty name.
    #[error("task name must not be empty")]
    InvalidTask,

    /// Two tasks with the same name in one package.
    #[error("duplicate task {0:?}")]
    DuplicateTask(String),

    /// Preflight failed and the repair sequence could not fix the target.
    #[error("target unusable: {0}")]
    TargetUnusable(String),

    /// The transport failed; the command's outcome is unknown.
    #[error(transparent)]
    Transport(TransportError),

    /// A command ran to completion with a non-zero exit.
    #[error("command {checksum} failed with exit code {code:?}")]
    CommandFailed {
        checksum: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    /// The host's checksum directory is malformed.
    #[error(transparent)]
    CorruptCache(#[from] CorruptCache),

    /// The build was cancelled; the in-flight command was abandoned and no
    /// completion marker written.
    #[error("build cancelled")]
    Cancelled,
}

impl From<TransportError> for BuildError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => BuildError::Cancelled,
            other => BuildError::Transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_its_own_kind() {
        let err: BuildError = TransportError::Cancelled.into();
        assert!(matches!(err, BuildError::Cancelled));

        let err: BuildError = TransportError::Session("connection lost".to_string()).into();
        assert!(matches!(err, BuildError::Transport(_)));
    }

    #[test]
    fn corrupt_cache_carries_task_and_checksum() {
        let err = BuildError::from(CorruptCache {
            task: "base".to_string(),
            checksum: "abc".to_string(),
        });
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("base"));
    }
}
