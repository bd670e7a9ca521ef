//! bedrock-core: kernel types for the bedrock provisioning engine
//!
//! This crate provides the pieces of the engine that carry no I/O:
//! - `hash`: command fingerprints (SHA-256 of post-expansion shell text)
//! - `cache`: the host-side cache directory layout and checksum-tree parsing
//! - `event`: typed build events and the process-wide event bus
//!
//! The types are target- and runtime-agnostic. The `bedrock` crate drives
//! them against an actual machine.

pub mod cache;
pub mod event;
pub mod hash;

pub use cache::{CACHE_GROUP, CacheLayout, ChecksumTree, CorruptCache, DEFAULT_CACHE_ROOT};
pub use event::{EventBus, ExecStatus, Message};
pub use hash::fingerprint;
