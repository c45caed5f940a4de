//! Store that reads and writes content files directly
//!
//! Behaves like a bridge: no seeding and no indexing, so the database falls
//! back to globbing and filtering in memory.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use super::{PutOptions, Store, StoreQueryOptions, StoreQueryResponse};
use crate::bridge::{Bridge, FilesystemBridge};
use crate::database::document::{parse_content, stringify_content};
use crate::error::{Error, Result};
use crate::schema::Format;

pub struct FilesystemStore {
    bridge: FilesystemBridge,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            bridge: FilesystemBridge::new(root),
        }
    }
}

#[async_trait]
impl Store for FilesystemStore {
    async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        self.bridge.glob(pattern).await
    }

    async fn get(&self, filepath: &str) -> Result<Value> {
        let content = self.bridge.get(filepath).await?;
        Ok(Value::Object(parse_content(filepath, &content)?))
    }

    async fn put(&self, filepath: &str, data: Value, _options: &PutOptions) -> Result<()> {
        let format = filepath
            .rsplit_once('.')
            .and_then(|(_, ext)| Format::from_extension(ext))
            .ok_or_else(|| Error::unsupported(format!("writing {}", filepath)))?;
        let record = data.as_object().ok_or_else(|| Error::StoreError {
            message: format!("record for {} is not an object", filepath),
        })?;
        let content = stringify_content(format, record)?;
        self.bridge.put(filepath, &content).await
    }

    async fn seed(&self, _filepath: &str, _data: Value, _options: &PutOptions) -> Result<()> {
        Err(Error::unsupported("seed"))
    }

    async fn delete(&self, filepath: &str, _options: &PutOptions) -> Result<()> {
        self.bridge.delete(filepath).await
    }

    async fn query(&self, _options: StoreQueryOptions) -> Result<StoreQueryResponse> {
        Err(Error::unsupported("query"))
    }

    fn supports_seeding(&self) -> bool {
        false
    }

    fn supports_indexing(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_passthrough() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());
        store
            .put("posts/a.json", json!({"title": "A"}), &PutOptions::default())
            .await
            .unwrap();
        assert_eq!(store.get("posts/a.json").await.unwrap()["title"], "A");
        assert_eq!(store.glob("posts/*.json").await.unwrap(), vec!["posts/a.json"]);

        assert!(!store.supports_indexing());
        assert!(matches!(
            store.query(StoreQueryOptions::default()).await,
            Err(Error::Unsupported { .. })
        ));
        assert!(matches!(
            store.seed("posts/b.json", json!({}), &PutOptions::default()).await,
            Err(Error::Unsupported { .. })
        ));
    }
}
