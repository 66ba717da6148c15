//! Shared Kubernetes utilities for kdeploy.
//!
//! Everything in here is pure: no file system, no cluster access.

pub mod merge_keys;
pub mod patch;
pub mod scope;

pub use merge_keys::MergeKeys;
pub use patch::{merge_patch, strategic_merge_patch, PatchError};
pub use scope::is_cluster_scoped_kind;
