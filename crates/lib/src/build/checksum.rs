//! Remote checksum state and the cached/pending decision

use tracing::{debug, info};

use bedrock_core::cache::{CacheLayout, ChecksumTree};
use bedrock_target::Target;

use super::{Build, InternalError};
use crate::error::BuildError;
use crate::package::Package;
use crate::template::Template;

/// Shell that prints the newest `.run` manifest of every task directory.
pub(crate) fn tree_read_command(cache: &CacheLayout) -> String {
    format!(
        "[ -d {root} ] && {{ ls {root} | while read dir; do ls -t {root}/$dir/*.run | head -n1 | xargs cat; done; }}",
        root = cache.root(),
    )
}

/// Read and parse the target's checksum tree in a single round trip.
pub(crate) async fn read_checksum_tree<T, P>(build: &Build<T, P>) -> Result<ChecksumTree, BuildError>
where
    T: Target,
    P: Template,
{
    let raw = tree_read_command(&build.cache);
    match build.exec_internal(&raw).await {
        Ok(output) => {
            let tree = ChecksumTree::parse(&build.cache, &output.stdout)?;
            info!(tasks = tree.len(), "read checksum tree");
            Ok(tree)
        }
        Err(InternalError::Transport(err)) => Err(err.into()),
        Err(InternalError::Failed { code, stdout, stderr }) => Err(BuildError::TargetUnusable(format!(
            "reading the checksum tree failed with exit code {code:?}: out={stdout:?} err={stderr:?}"
        ))),
    }
}

/// Mark each command entry whose position and checksum match the host's
/// record for its task.
///
/// The first mismatch breaks the streak: every later command in the task
/// stays pending even if its checksum happens to match, because it may
/// depend on side effects of the re-executed predecessor.
pub(crate) fn mark_cached(package: &mut Package, tree: &ChecksumTree) {
    for task in package.tasks_mut() {
        let known = tree.task(task.name()).unwrap_or(&[]);
        let mut streak = true;
        let name = task.name().to_string();
        for (position, entry) in task.commands_mut().iter_mut().enumerate() {
            streak = streak && known.get(position).map(String::as_str) == Some(entry.checksum());
            entry.cached = streak;
            debug!(
                task = %name,
                position,
                checksum = %entry.checksum,
                cached = entry.cached,
                "cache decision"
            );
        }
    }
}
