//! Access to raw content
//!
//! A bridge reads and writes file contents by root-relative path. Two
//! backends exist with the same semantics:
//!
//! ```text
//! FilesystemBridge   files under a root directory
//! AuditBridge        FilesystemBridge reads, writes recorded in memory
//! GitBridge          blobs and trees reachable from a git ref
//! ```
//!
//! Paths always use `/` separators and never start with one.

mod audit;
mod filesystem;
mod git;
mod glob;

pub use audit::{AuditBridge, Mutation};
pub use filesystem::FilesystemBridge;
pub use git::{CommitAuthor, GitBridge};
pub use glob::Glob;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Bridge: Send + Sync {
    /// Paths matching a glob pattern, sorted
    async fn glob(&self, pattern: &str) -> Result<Vec<String>>;

    /// UTF-8 content at `path`; [`Error::NotFound`](crate::Error::NotFound) if absent
    async fn get(&self, path: &str) -> Result<String>;

    async fn put(&self, path: &str, content: &str) -> Result<()>;

    /// Remove `path`; [`Error::NotFound`](crate::Error::NotFound) if absent
    async fn delete(&self, path: &str) -> Result<()>;

    /// Whether generated schema files may be written next to the content
    fn supports_building(&self) -> bool;
}

/// Join path segments, skipping empty ones
pub(crate) fn join_path(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => dir.to_string(),
        _ => format!("{}/{}", dir.trim_end_matches('/'), name),
    }
}
