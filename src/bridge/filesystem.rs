//! Bridge over a directory on the local filesystem

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

use super::{join_path, Bridge, Glob};
use crate::error::{Error, Result};
use crate::validation::validate_relative_path;

#[derive(Debug, Clone)]
pub struct FilesystemBridge {
    root: PathBuf,
}

impl FilesystemBridge {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        validate_relative_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl Bridge for FilesystemBridge {
    async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let glob = Glob::new(pattern)?;
        let base = glob.base().to_string();
        let start = if base.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&base)
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&start)
            .min_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let relative = match entry.path().strip_prefix(&start) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let path = join_path(&base, &relative);
            if glob.is_match(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    async fn get(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        match fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found(path)),
            Err(source) => Err(Error::FileReadError { path: full, source }),
        }
    }

    async fn put(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, content)
            .await
            .map_err(|source| Error::FileWriteError { path: full, source })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found(path)),
            Err(e) => Err(e.into()),
        }
    }

    fn supports_building(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let tmp = TempDir::new().unwrap();
        let bridge = FilesystemBridge::new(tmp.path());

        bridge.put("content/posts/hello.md", "# Hello").await.unwrap();
        assert_eq!(bridge.get("content/posts/hello.md").await.unwrap(), "# Hello");

        bridge.delete("content/posts/hello.md").await.unwrap();
        assert!(matches!(
            bridge.get("content/posts/hello.md").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            bridge.delete("content/posts/hello.md").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_glob() {
        let tmp = TempDir::new().unwrap();
        let bridge = FilesystemBridge::new(tmp.path());
        for path in ["posts/b.md", "posts/a.md", "posts/2023/c.md", "posts/d.json", "pages/e.md"] {
            bridge.put(path, "x").await.unwrap();
        }

        assert_eq!(bridge.glob("posts/*.md").await.unwrap(), vec!["posts/a.md", "posts/b.md"]);
        assert_eq!(
            bridge.glob("posts/**/*.md").await.unwrap(),
            vec!["posts/2023/c.md", "posts/a.md", "posts/b.md"]
        );
        assert!(bridge.glob("missing/*.md").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        let bridge = FilesystemBridge::new(tmp.path());
        assert!(bridge.get("../outside.md").await.is_err());
        assert!(bridge.put("/etc/passwd", "x").await.is_err());
    }
}
