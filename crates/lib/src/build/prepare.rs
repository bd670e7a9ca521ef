//! Target preflight and repair
//!
//! A usable target has the cache group, the build user in that group, the
//! cache root, and the `.v2` layout sentinel. Anything less triggers one
//! repair pass: create what is missing, migrate a pre-`.v2` layout by
//! synthesizing `.run` manifests from the existing `.done` markers, then
//! reset the transport so the fresh group membership takes effect in a new
//! session. A target the repair pass cannot fix is unusable.

use tracing::info;

use bedrock_core::cache::{CACHE_GROUP, CacheLayout};
use bedrock_target::Target;

use super::{Build, InternalError};
use crate::error::BuildError;
use crate::template::Template;

/// Preflight: group exists, user is a member, cache root and sentinel are
/// present. Exit status is the answer.
pub(crate) fn check_command(cache: &CacheLayout, user: &str) -> String {
    format!(
        "{{ grep \"^{group}:\" /etc/group | grep {user}; }} && [ -d {root} ] && [ -f {sentinel} ]",
        group = CACHE_GROUP,
        root = cache.root(),
        sentinel = cache.sentinel(),
    )
}

/// The repair sequence, one `&&`-joined script.
pub(crate) fn repair_command(cache: &CacheLayout, user: &str) -> String {
    let root = cache.root();
    let steps = [
        format!("{{ grep -e '^{CACHE_GROUP}:' /etc/group > /dev/null || {{ groupadd {CACHE_GROUP}; }}; }}"),
        format!("{{ [ -d {root} ] || {{ mkdir -p -m 2775 {root} && chgrp {CACHE_GROUP} {root}; }}; }}"),
        format!("usermod -a -G {CACHE_GROUP} {user}"),
        format!(
            "[ -f {sentinel} ] || {{ export DATE=$(date \"+%Y%m%d_%H%M%S\") && \
              ls {root} | while read dir; do ls -t {root}/$dir/*.done | tac > {root}/$dir/$DATE.run; done && \
              touch {sentinel}; }}",
            sentinel = cache.sentinel(),
        ),
    ];
    steps.join(" && ")
}

/// Make sure the target can host the cache, repairing it once if needed.
pub(crate) async fn prepare_target<T, P>(build: &mut Build<T, P>) -> Result<(), BuildError>
where
    T: Target,
    P: Template,
{
    let user = build.target.user().to_string();
    if user.is_empty() {
        return Err(BuildError::TargetUnusable("target user is not set".to_string()));
    }

    let check = check_command(&build.cache, &user);
    match build.exec_internal(&check).await {
        Ok(_) => return Ok(()),
        Err(InternalError::Transport(err)) => return Err(err.into()),
        Err(InternalError::Failed { .. }) => {}
    }

    info!(user = %user, "target not prepared for provisioning, repairing");
    match build.exec_internal(&repair_command(&build.cache, &user)).await {
        Ok(_) => {}
        Err(InternalError::Transport(err)) => return Err(err.into()),
        Err(InternalError::Failed { code, stdout, stderr }) => {
            return Err(BuildError::TargetUnusable(format!(
                "failed to prepare user {user:?} for provisioning: exit code {code:?}, out={stdout:?} err={stderr:?}"
            )));
        }
    }

    // The user's new group membership only applies to fresh sessions.
    build.target.reset().await?;

    match build.exec_internal(&check).await {
        Ok(_) => Ok(()),
        Err(InternalError::Transport(err)) => Err(err.into()),
        Err(InternalError::Failed { .. }) => Err(BuildError::TargetUnusable(
            "target still not prepared after repair".to_string(),
        )),
    }
}
