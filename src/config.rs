//! Project configuration
//!
//! Settings live in `.mdgraph/config.yaml` next to the schema. Every key is
//! optional:
//!
//! ```yaml
//! generated: .mdgraph/__generated__
//! bridge:
//!   kind: git            # filesystem | git
//!   ref: refs/heads/main
//! store:
//!   kind: disk           # memory | disk | filesystem
//!   path: .mdgraph/index
//! server:
//!   port: 4001
//!   watch: true
//! build:
//!   retries: 3
//!   retry_delay_ms: 250
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{Bridge, CommitAuthor, FilesystemBridge, GitBridge};
use crate::database::RetryPolicy;
use crate::error::{Error, Result};
use crate::store::{FilesystemStore, LevelStore, Store};

/// Directory holding the schema, configuration and generated files
pub const CONFIG_DIR: &str = ".mdgraph";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema source, relative to the project root
    pub schema: Option<PathBuf>,
    /// Output directory of generated files, relative to the project root
    pub generated: Option<PathBuf>,
    pub bridge: BridgeConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeKind {
    #[default]
    Filesystem,
    Git,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub kind: BridgeKind,
    /// Ref to read and commit to; the checked-out branch when unset
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub commit_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Disk,
    /// No index; lists scan the bridge
    Filesystem,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Index directory for `disk`, relative to the project root
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub watch: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 4001, watch: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Attempts after the first one
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay_ms: 250,
        }
    }
}

impl Config {
    /// Read `.mdgraph/config.yaml` under `root`, or defaults if absent
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_DIR).join("config.yaml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| Error::FileReadError {
            path: path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Schema source path: configured, else `schema.yaml`, else `schema.json`
    pub fn schema_path(&self, root: &Path) -> PathBuf {
        if let Some(schema) = &self.schema {
            return root.join(schema);
        }
        let yaml = root.join(CONFIG_DIR).join("schema.yaml");
        let json = root.join(CONFIG_DIR).join("schema.json");
        if !yaml.exists() && json.exists() {
            json
        } else {
            yaml
        }
    }

    pub fn generated_dir(&self, root: &Path) -> PathBuf {
        match &self.generated {
            Some(dir) => root.join(dir),
            None => root.join(CONFIG_DIR).join("__generated__"),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.build.retries.saturating_add(1),
            Duration::from_millis(self.build.retry_delay_ms),
        )
    }

    pub fn open_bridge(&self, root: &Path) -> Result<Arc<dyn Bridge>> {
        match self.bridge.kind {
            BridgeKind::Filesystem => Ok(Arc::new(FilesystemBridge::new(root))),
            BridgeKind::Git => {
                let mut bridge = match &self.bridge.reference {
                    Some(reference) => GitBridge::open(root, reference.clone())?,
                    None => GitBridge::from_workdir(root)?,
                };
                if let (Some(name), Some(email)) = (&self.bridge.author_name, &self.bridge.author_email) {
                    bridge = bridge.with_author(CommitAuthor {
                        name: name.clone(),
                        email: email.clone(),
                    });
                }
                if let Some(message) = &self.bridge.commit_message {
                    bridge = bridge.with_commit_message(message.clone());
                }
                tracing::debug!(reference = bridge.reference(), "using git bridge");
                Ok(Arc::new(bridge))
            }
        }
    }

    pub fn open_store(&self, root: &Path) -> Result<Arc<dyn Store>> {
        match self.store.kind {
            StoreKind::Memory => Ok(Arc::new(LevelStore::temporary()?)),
            StoreKind::Disk => {
                let path = match &self.store.path {
                    Some(path) => root.join(path),
                    None => root.join(CONFIG_DIR).join("index"),
                };
                Ok(Arc::new(LevelStore::open(path)?))
            }
            StoreKind::Filesystem => Ok(Arc::new(FilesystemStore::new(root))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 4001);
        assert_eq!(config.retry_policy().attempts, 4);
        assert_eq!(
            config.generated_dir(tmp.path()),
            tmp.path().join(".mdgraph/__generated__")
        );
        assert_eq!(config.schema_path(tmp.path()), tmp.path().join(".mdgraph/schema.yaml"));
    }

    #[test]
    fn test_partial_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(CONFIG_DIR)).unwrap();
        std::fs::write(
            tmp.path().join(".mdgraph/config.yaml"),
            "bridge:\n  kind: git\n  ref: refs/heads/content\nstore:\n  kind: filesystem\nserver:\n  port: 8080\n",
        )
        .unwrap();
        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.bridge.kind, BridgeKind::Git);
        assert_eq!(config.bridge.reference.as_deref(), Some("refs/heads/content"));
        assert_eq!(config.store.kind, StoreKind::Filesystem);
        assert_eq!(config.server.port, 8080);
        assert!(config.server.watch);
        assert_eq!(config.build.retries, 3);
    }

    #[test]
    fn test_json_schema_fallback() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(CONFIG_DIR)).unwrap();
        std::fs::write(tmp.path().join(".mdgraph/schema.json"), "{}").unwrap();
        let config = Config::default();
        assert_eq!(config.schema_path(tmp.path()), tmp.path().join(".mdgraph/schema.json"));
    }

    #[test]
    fn test_stores_open() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        assert!(config.open_store(tmp.path()).unwrap().supports_indexing());
        config.store.kind = StoreKind::Filesystem;
        assert!(!config.open_store(tmp.path()).unwrap().supports_indexing());
        assert!(config.open_bridge(tmp.path()).unwrap().supports_building());
    }
}
