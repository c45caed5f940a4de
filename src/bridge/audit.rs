//! Dry-run bridge for audits
//!
//! Reads go to the wrapped filesystem bridge unless an earlier write in this
//! session shadows them. Writes and deletes are only recorded.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{Bridge, FilesystemBridge, Glob};
use crate::error::{Error, Result};

/// A write the audit would have performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put { path: String, content: String },
    Delete { path: String },
}

impl Mutation {
    pub fn path(&self) -> &str {
        match self {
            Mutation::Put { path, .. } | Mutation::Delete { path } => path,
        }
    }
}

#[derive(Default)]
struct Overlay {
    /// `None` marks a pending delete
    files: BTreeMap<String, Option<String>>,
    mutations: Vec<Mutation>,
}

pub struct AuditBridge {
    inner: FilesystemBridge,
    overlay: Mutex<Overlay>,
}

impl AuditBridge {
    pub fn new(inner: FilesystemBridge) -> Self {
        Self {
            inner,
            overlay: Mutex::new(Overlay::default()),
        }
    }

    /// Every recorded write, in order
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.overlay.lock().await.mutations.clone()
    }
}

#[async_trait]
impl Bridge for AuditBridge {
    async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let mut paths = self.inner.glob(pattern).await?;
        let overlay = self.overlay.lock().await;
        let glob = Glob::new(pattern)?;
        paths.retain(|p| !matches!(overlay.files.get(p), Some(None)));
        for (path, content) in &overlay.files {
            if content.is_some() && glob.is_match(path) && !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths.sort();
        Ok(paths)
    }

    async fn get(&self, path: &str) -> Result<String> {
        let shadowed = self.overlay.lock().await.files.get(path).cloned();
        match shadowed {
            Some(Some(content)) => Ok(content),
            Some(None) => Err(Error::not_found(path)),
            None => self.inner.get(path).await,
        }
    }

    async fn put(&self, path: &str, content: &str) -> Result<()> {
        let mut overlay = self.overlay.lock().await;
        overlay.files.insert(path.to_string(), Some(content.to_string()));
        overlay.mutations.push(Mutation::Put {
            path: path.to_string(),
            content: content.to_string(),
        });
        tracing::debug!(path, "audit: recorded put");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        // Deleting something absent fails the same way it would for real
        self.get(path).await?;
        let mut overlay = self.overlay.lock().await;
        overlay.files.insert(path.to_string(), None);
        overlay.mutations.push(Mutation::Delete { path: path.to_string() });
        tracing::debug!(path, "audit: recorded delete");
        Ok(())
    }

    fn supports_building(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_never_touch_disk() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("posts")).unwrap();
        std::fs::write(tmp.path().join("posts/a.md"), "original").unwrap();

        let bridge = AuditBridge::new(FilesystemBridge::new(tmp.path()));
        bridge.put("posts/a.md", "changed").await.unwrap();
        bridge.put("posts/b.md", "new").await.unwrap();

        assert_eq!(bridge.get("posts/a.md").await.unwrap(), "changed");
        assert_eq!(std::fs::read_to_string(tmp.path().join("posts/a.md")).unwrap(), "original");
        assert!(!tmp.path().join("posts/b.md").exists());
        assert_eq!(bridge.glob("posts/*.md").await.unwrap(), vec!["posts/a.md", "posts/b.md"]);

        bridge.delete("posts/a.md").await.unwrap();
        assert!(matches!(bridge.get("posts/a.md").await, Err(Error::NotFound { .. })));
        assert!(tmp.path().join("posts/a.md").exists());
        assert_eq!(bridge.glob("posts/*.md").await.unwrap(), vec!["posts/b.md"]);

        let mutations = bridge.mutations().await;
        assert_eq!(mutations.len(), 3);
        assert_eq!(mutations[2], Mutation::Delete { path: "posts/a.md".into() });
    }
}
