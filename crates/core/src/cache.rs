//! Host-side cache layout and checksum-tree parsing
//!
//! Every target host carries a cache directory recording which commands
//! already completed there. Layout:
//!
//! ```text
//! <root>/
//! ├── .v2                        # layout-migration sentinel
//! └── <task>/
//!     ├── <checksum>.done        # success marker
//!     ├── <checksum>.log         # captured output of the completed command
//!     ├── <checksum>.failed.log  # captured output of a failed attempt
//!     └── <stamp>.run            # completion-ordered marker list; newest wins
//! ```
//!
//! The directory is group-owned (mode `2775`, setgid) so several operators
//! in the cache group can share one host's cache.

use std::collections::HashMap;

use thiserror::Error;

use crate::hash::CHECKSUM_LEN;

/// Default cache root on the target host.
pub const DEFAULT_CACHE_ROOT: &str = "/var/lib/bedrock/cache";

/// Group owning the cache tree.
pub const CACHE_GROUP: &str = "bedrock";

/// Malformed content in the host's checksum directory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid checksum {checksum:?} found for task {task:?}")]
pub struct CorruptCache {
    pub task: String,
    pub checksum: String,
}

/// Paths inside the target-side cache tree.
///
/// All paths are plain POSIX strings: they are spliced into shell commands
/// that run on the target, never opened locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: String,
}

impl Default for CacheLayout {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ROOT)
    }
}

impl CacheLayout {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// The `.v2` sentinel marking a migrated layout.
    pub fn sentinel(&self) -> String {
        format!("{}/.v2", self.root)
    }

    pub fn task_dir(&self, task: &str) -> String {
        format!("{}/{}", self.root, task)
    }

    pub fn done_marker(&self, task: &str, checksum: &str) -> String {
        format!("{}/{}/{}.done", self.root, task, checksum)
    }

    pub fn log_file(&self, task: &str, checksum: &str) -> String {
        format!("{}/{}/{}.log", self.root, task, checksum)
    }

    pub fn failed_log_file(&self, task: &str, checksum: &str) -> String {
        format!("{}/{}/{}.failed.log", self.root, task, checksum)
    }

    /// The run manifest for a run started at `stamp` (`%Y%m%d_%H%M%S`).
    pub fn run_file(&self, task: &str, stamp: &str) -> String {
        format!("{}/{}/{}.run", self.root, task, stamp)
    }
}

/// Per-task checksum lists in completion order, as read from the newest
/// `.run` manifest of every task directory on the host.
///
/// Position within a list is significant: it is the order in which commands
/// completed on the most recent run, and the diff against it is strictly
/// positional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumTree {
    tasks: HashMap<String, Vec<String>>,
}

impl ChecksumTree {
    /// Parse the concatenated `.run` manifests read from a host.
    ///
    /// Each useful line is the path of a `.done` marker under the cache
    /// root. Blank lines and lines without the `.done` suffix are skipped
    /// (the read command echoes shell tracing on stderr, but defensive
    /// parsing costs nothing here). A checksum that is not 64 characters
    /// long is corrupt.
    pub fn parse(layout: &CacheLayout, raw: &str) -> Result<Self, CorruptCache> {
        let prefix = format!("{}/", layout.root());
        let mut tasks: HashMap<String, Vec<String>> = HashMap::new();

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || !line.ends_with(".done") {
                continue;
            }

            let rel = line.strip_prefix(&prefix).unwrap_or(line);
            let (task, base) = match rel.rsplit_once('/') {
                Some((dir, base)) => (dir, base),
                None => (".", rel),
            };
            let checksum = base.strip_suffix(".done").unwrap_or(base);
            if checksum.len() != CHECKSUM_LEN {
                return Err(CorruptCache {
                    task: task.to_string(),
                    checksum: checksum.to_string(),
                });
            }
            tasks.entry(task.to_string()).or_default().push(checksum.to_string());
        }

        Ok(Self { tasks })
    }

    /// The completion-ordered checksums recorded for `task`, if any.
    pub fn task(&self, name: &str) -> Option<&[String]> {
        self.tasks.get(name).map(Vec::as_slice)
    }

    pub fn insert(&mut self, task: impl Into<String>, checksums: Vec<String>) {
        self.tasks.insert(task.into(), checksums);
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Serialize back to `.done` marker lines, the format [`parse`] reads.
    ///
    /// [`parse`]: ChecksumTree::parse
    pub fn manifest(&self, layout: &CacheLayout) -> String {
        let mut out = String::new();
        for (task, checksums) in &self.tasks {
            for checksum in checksums {
                out.push_str(&layout.done_marker(task, checksum));
                out.push('\n');
            }
        }
        out
    }
}
