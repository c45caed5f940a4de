//! Content database
//!
//! Orchestrates a [`Bridge`] (source of truth), a [`Store`] (rebuildable
//! index) and the compiled schema:
//!
//! ```text
//! build:  SchemaSource ─normalize─▶ Schema ─compile─▶ generated files
//!                                      └─glob + parse every document─▶ store generation ─▶ swap
//! read:   path ─bridge.get─▶ content ─parse + aliases─▶ Document
//! write:  data ─aliases + serialize─▶ bridge.put ─▶ store.put
//! ```
//!
//! A build moves the status `Idle → Indexing → Ready`, or to `Error` without
//! touching the previous snapshot or index generation.

pub mod alias;
pub mod document;
pub mod frontmatter;
pub mod lock;
pub mod retry;

pub use document::{Document, SystemInfo};
pub use lock::{AsyncLock, RebuildGate};
pub use retry::{retry, RetryPolicy};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::bridge::Bridge;
use crate::compiler::{self, CompiledSchema};
use crate::error::{Error, Result};
use crate::schema::{normalize, Collection, FieldShape, Schema, SchemaSource, TEMPLATE_KEY};
use crate::store::filter::{coerce_filter_chain_operands, make_filter, make_filter_chain, make_key_for_field};
use crate::store::{FilterCondition, PageInfo, PutOptions, Store, StoreEdge, StoreQueryOptions, StoreQueryResponse};
use crate::validation;

/// Build state of a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Idle,
    Indexing,
    Ready,
    Error(String),
}

/// Schema and compiled artifacts of the last successful build
#[derive(Debug)]
pub struct Snapshot {
    pub schema: Schema,
    pub compiled: CompiledSchema,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Where generated files go; nothing is written when unset
    pub output_dir: Option<PathBuf>,
    pub skip_index: bool,
    /// Also write `types.ts` and `client.ts`
    pub sdk: bool,
    pub retry: RetryPolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            skip_index: false,
            sdk: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Filter, order and pagination of a document list
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filter: Vec<FilterCondition>,
    /// Index name to order by
    pub sort: Option<String>,
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub after: Option<String>,
    pub before: Option<String>,
}

pub struct Database {
    bridge: Arc<dyn Bridge>,
    store: Arc<dyn Store>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    status: RwLock<Status>,
    build_lock: AsyncLock,
}

impl Database {
    pub fn new(bridge: Arc<dyn Bridge>, store: Arc<dyn Store>) -> Self {
        Self {
            bridge,
            store,
            snapshot: RwLock::new(None),
            status: RwLock::new(Status::Idle),
            build_lock: AsyncLock::new(),
        }
    }

    pub fn bridge(&self) -> &Arc<dyn Bridge> {
        &self.bridge
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn status(&self) -> Status {
        self.status.read().await.clone()
    }

    /// The last successful build
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.snapshot.read().await.clone().ok_or_else(|| Error::BuildError {
            message: "the database has not been built".to_string(),
        })
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Compile `source`, write generated files and rebuild the index
    ///
    /// Builds are serialized by the build lock. Transient failures are
    /// retried according to `options.retry`.
    pub async fn build(&self, source: &SchemaSource, options: &BuildOptions) -> Result<Arc<Snapshot>> {
        let _guard = self.build_lock.acquire().await;

        let result = retry(&options.retry, |attempt| self.build_once(source, options, attempt)).await;
        match result {
            Ok(snapshot) => {
                *self.snapshot.write().await = Some(snapshot.clone());
                *self.status.write().await = Status::Ready;
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!(error = %e, "build failed");
                *self.status.write().await = Status::Error(e.to_string());
                Err(e)
            }
        }
    }

    async fn build_once(&self, source: &SchemaSource, options: &BuildOptions, attempt: u32) -> Result<Arc<Snapshot>> {
        tracing::debug!(attempt, "building schema");
        let schema = normalize(source)?;
        let compiled = compiler::compile(&schema)?;

        if let Some(dir) = &options.output_dir {
            if self.bridge.supports_building() {
                compiled.write_to(dir, options.sdk)?;
            } else {
                tracing::debug!("bridge does not support building, skipping generated files");
            }
        }

        if !options.skip_index {
            *self.status.write().await = Status::Indexing;
            self.index(&schema).await?;
        }

        Ok(Arc::new(Snapshot { schema, compiled }))
    }

    /// Seed every document into a fresh store generation and promote it
    async fn index(&self, schema: &Schema) -> Result<()> {
        if !self.store.supports_seeding() {
            return Ok(());
        }
        self.store.begin_generation().await?;
        match self.seed_all(schema).await {
            Ok(count) => {
                self.store.commit_generation().await?;
                tracing::info!(documents = count, "indexed content");
                Ok(())
            }
            Err(e) => {
                self.store.abort_generation().await?;
                Err(e)
            }
        }
    }

    async fn seed_all(&self, schema: &Schema) -> Result<usize> {
        let mut count = 0;
        for collection in &schema.collections {
            let options = put_options(collection);
            for path in self.bridge.glob(&collection.glob_pattern()).await? {
                // Longest-path ownership keeps nested collections apart
                if schema.collection_for_path(&path).map(|c| c.name.as_str()) != Some(collection.name.as_str()) {
                    continue;
                }
                let content = self.bridge.get(&path).await?;
                match Document::parse(schema, collection, &path, &content) {
                    Ok(document) => {
                        self.store.seed(&path, document.record(), &options).await?;
                        count += 1;
                    }
                    Err(e) if e.is_transient() => return Err(e),
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "skipping document");
                    }
                }
            }
            tracing::debug!(collection = %collection.name, "seeded collection");
        }
        Ok(count)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_document(&self, collection: &str, relative_path: &str) -> Result<Document> {
        let snapshot = self.snapshot().await?;
        let collection = snapshot.schema.require_collection(collection)?;
        let filepath = collection.filepath(relative_path);
        self.read(&snapshot.schema, collection, &filepath).await
    }

    /// Fetch a document by its root-relative path
    pub async fn get_document_by_id(&self, id: &str) -> Result<Document> {
        let snapshot = self.snapshot().await?;
        let collection = snapshot
            .schema
            .collection_for_path(id)
            .ok_or_else(|| Error::not_found(id))?;
        self.read(&snapshot.schema, collection, id).await
    }

    /// Resolve a reference value against the collections it may point to
    pub async fn resolve_reference(&self, id: &str, targets: &[String]) -> Result<Document> {
        let snapshot = self.snapshot().await?;
        for target in targets {
            if let Some(collection) = snapshot.schema.collection(target) {
                if collection.relative_path(id).is_some() {
                    return self.read(&snapshot.schema, collection, id).await;
                }
            }
        }
        Err(Error::not_found(id))
    }

    async fn read(&self, schema: &Schema, collection: &Collection, filepath: &str) -> Result<Document> {
        let content = self.bridge.get(filepath).await?;
        Document::parse(schema, collection, filepath, &content)
    }

    /// Paths of the documents of `collection` matching `options`
    pub async fn list_documents(&self, collection: &str, options: &ListOptions) -> Result<StoreQueryResponse> {
        let snapshot = self.snapshot().await?;
        let collection = snapshot.schema.require_collection(collection)?;
        let chain = coerce_filter_chain_operands(make_filter_chain(&options.filter)?)?;

        if let Some(sort) = &options.sort {
            if collection.index(sort).is_none() {
                return Err(Error::query(format!(
                    "Collection '{}' has no index named '{}'",
                    collection.name, sort
                )));
            }
        }

        let reverse = options.last.is_some() && options.first.is_none();
        let limit = options.first.or(options.last);

        if self.store.supports_indexing() {
            return self
                .store
                .query(StoreQueryOptions {
                    collection: collection.name.clone(),
                    index_definitions: collection.indexes.clone(),
                    filter_chain: chain,
                    sort: options.sort.clone(),
                    gt: options.after.clone(),
                    lt: options.before.clone(),
                    reverse,
                    limit,
                    ..Default::default()
                })
                .await;
        }

        self.scan(&snapshot.schema, collection, chain, options, reverse, limit).await
    }

    /// Glob, parse and filter in memory when the store cannot index
    async fn scan(
        &self,
        schema: &Schema,
        collection: &Collection,
        chain: Vec<crate::store::Filter>,
        options: &ListOptions,
        reverse: bool,
        limit: Option<usize>,
    ) -> Result<StoreQueryResponse> {
        let predicate = make_filter(chain);
        let index = options.sort.as_deref().and_then(|name| collection.index(name));

        let mut matches = Vec::new();
        for path in self.bridge.glob(&collection.glob_pattern()).await? {
            if schema.collection_for_path(&path).map(|c| c.name.as_str()) != Some(collection.name.as_str()) {
                continue;
            }
            let document = match self.read(schema, collection, &path).await {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "skipping unreadable document");
                    continue;
                }
            };
            let record = document.record();
            if !predicate(&record) {
                continue;
            }
            let key = match index {
                Some(index) => match record.as_object().and_then(|data| make_key_for_field(index, data)) {
                    Some(key) => format!("{}\u{1D}{}", key, path),
                    None => continue,
                },
                None => path.clone(),
            };
            matches.push((key, path));
        }
        matches.sort();

        let after = options.after.as_deref().map(decode_cursor).transpose()?;
        let before = options.before.as_deref().map(decode_cursor).transpose()?;
        matches.retain(|(key, _)| {
            after.as_ref().map(|a| key > a).unwrap_or(true) && before.as_ref().map(|b| key < b).unwrap_or(true)
        });
        if reverse {
            matches.reverse();
        }

        let total = matches.len();
        let take = limit.unwrap_or(total);
        let edges: Vec<StoreEdge> = matches
            .into_iter()
            .take(take)
            .map(|(key, path)| StoreEdge {
                cursor: STANDARD.encode(key.as_bytes()),
                path,
            })
            .collect();

        let page_info = PageInfo {
            has_previous_page: if reverse { before.is_some() } else { after.is_some() },
            has_next_page: total > edges.len(),
            start_cursor: edges.first().map(|e| e.cursor.clone()).unwrap_or_default(),
            end_cursor: edges.last().map(|e| e.cursor.clone()).unwrap_or_default(),
        };
        Ok(StoreQueryResponse { edges, page_info })
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a new document; fails if the path is taken
    pub async fn create_document(&self, collection: &str, relative_path: &str, data: Map<String, Value>) -> Result<Document> {
        let snapshot = self.snapshot().await?;
        let collection = snapshot.schema.require_collection(collection)?;
        let filepath = self.new_filepath(collection, relative_path).await?;
        let data = with_template(&snapshot.schema, collection, data)?;
        self.write(&snapshot.schema, collection, &filepath, data, true).await
    }

    /// Merge `data` over an existing document
    ///
    /// Top-level fields in `data` replace the stored ones. Switching to
    /// another template replaces the document entirely.
    pub async fn update_document(&self, collection: &str, relative_path: &str, data: Map<String, Value>) -> Result<Document> {
        let snapshot = self.snapshot().await?;
        let collection = snapshot.schema.require_collection(collection)?;
        let filepath = collection.filepath(relative_path);
        let existing = self.read(&snapshot.schema, collection, &filepath).await?;

        let switching = match (existing.data.get(TEMPLATE_KEY), data.get(TEMPLATE_KEY)) {
            (Some(old), Some(new)) => old != new,
            _ => false,
        };
        let merged = if switching {
            data
        } else {
            let mut merged = existing.data.clone();
            merged.extend(data);
            merged
        };
        let merged = with_template(&snapshot.schema, collection, merged)?;
        self.write(&snapshot.schema, collection, &filepath, merged, true).await
    }

    pub async fn delete_document(&self, collection: &str, relative_path: &str) -> Result<Document> {
        let snapshot = self.snapshot().await?;
        let collection = snapshot.schema.require_collection(collection)?;
        let filepath = collection.filepath(relative_path);
        let existing = self.read(&snapshot.schema, collection, &filepath).await?;

        self.bridge.delete(&filepath).await?;
        if self.store.supports_indexing() {
            self.store.delete(&filepath, &put_options(collection)).await?;
        }
        tracing::info!(collection = %collection.name, path = %filepath, "deleted document");
        Ok(existing)
    }

    /// Create an empty document, tagged with `template` in polymorphic collections
    pub async fn add_pending_document(&self, collection: &str, relative_path: &str, template: Option<&str>) -> Result<Document> {
        let snapshot = self.snapshot().await?;
        let collection = snapshot.schema.require_collection(collection)?;
        let filepath = self.new_filepath(collection, relative_path).await?;

        let mut data = Map::new();
        if let Some(template) = template {
            data.insert(TEMPLATE_KEY.to_string(), Value::String(template.to_string()));
        }
        let data = with_template(&snapshot.schema, collection, data)?;
        self.write(&snapshot.schema, collection, &filepath, data, false).await
    }

    /// Full path for a new document, or `DocumentAlreadyExists`
    async fn new_filepath(&self, collection: &Collection, relative_path: &str) -> Result<String> {
        validation::validate_relative_path(relative_path)?;
        let filepath = collection.filepath(relative_path);
        match self.bridge.get(&filepath).await {
            Ok(_) => Err(Error::DocumentAlreadyExists {
                collection: collection.name.clone(),
                relative_path: relative_path.to_string(),
            }),
            Err(Error::NotFound { .. }) => Ok(filepath),
            Err(e) => Err(e),
        }
    }

    async fn write(
        &self,
        schema: &Schema,
        collection: &Collection,
        filepath: &str,
        data: Map<String, Value>,
        validate: bool,
    ) -> Result<Document> {
        if validate {
            let template = data.get(TEMPLATE_KEY).and_then(Value::as_str);
            schema.validate_data(collection, template, &data)?;
        }
        let content = document::serialize(schema, collection, filepath, &data)?;
        // Parsed before the put so a failure leaves the file untouched
        let document = Document::parse(schema, collection, filepath, &content)?;
        self.bridge.put(filepath, &content).await?;

        if self.store.supports_indexing() {
            self.store
                .put(filepath, document.record(), &put_options(collection))
                .await?;
        }
        tracing::info!(collection = %collection.name, path = %filepath, "wrote document");
        Ok(document)
    }
}

fn put_options(collection: &Collection) -> PutOptions {
    PutOptions::new(collection.name.clone(), collection.indexes.clone())
}

/// Tag data of a single-template polymorphic collection with its template
fn with_template(schema: &Schema, collection: &Collection, mut data: Map<String, Value>) -> Result<Map<String, Value>> {
    if let FieldShape::Polymorphic { .. } = &collection.shape {
        if !data.contains_key(TEMPLATE_KEY) {
            match schema.shape_templates(&collection.shape).as_slice() {
                [only] => {
                    data.insert(TEMPLATE_KEY.to_string(), Value::String(only.name.clone()));
                }
                _ => {
                    return Err(Error::NoTemplateFound {
                        field: collection.name.clone(),
                    })
                }
            }
        }
    }
    Ok(data)
}

fn decode_cursor(cursor: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(cursor)
        .map_err(|e| Error::query(format!("Invalid cursor '{}': {}", cursor, e)))?;
    String::from_utf8(bytes).map_err(|e| Error::query(format!("Invalid cursor '{}': {}", cursor, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::FilesystemBridge;
    use crate::schema::{parse_source, FieldType};
    use crate::store::{FilesystemStore, LevelStore};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"
collections:
  - name: author
    path: content/authors
    fields:
      - { name: name, type: string, isTitle: true }
  - name: post
    path: content/posts
    fields:
      - { name: title, type: string, required: true }
      - { name: date, type: datetime }
      - { name: author, type: reference, collections: [author] }
      - { name: body, type: rich-text, isBody: true }
  - name: page
    path: content/pages
    templates:
      - name: landing
        fields:
          - { name: headline, type: string }
      - name: article
        fields:
          - { name: title, type: string }
"#;

    fn write(root: &std::path::Path, path: &str, content: &str) {
        let full = root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    fn options() -> BuildOptions {
        BuildOptions {
            retry: RetryPolicy::new(2, Duration::from_millis(1)),
            ..Default::default()
        }
    }

    async fn setup(indexing: bool) -> (TempDir, Database) {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "content/authors/jane.md", "---\nname: Jane\n---\n");
        write(tmp.path(), "content/posts/a.md", "---\ntitle: A\ndate: 2023-01-01\nauthor: content/authors/jane.md\n---\n\nBody A\n");
        write(tmp.path(), "content/posts/b.md", "---\ntitle: B\ndate: 2023-06-01\n---\n");
        write(tmp.path(), "content/pages/home.md", "---\n_template: landing\nheadline: Hi\n---\n");

        let bridge: Arc<dyn Bridge> = Arc::new(FilesystemBridge::new(tmp.path()));
        let store: Arc<dyn Store> = if indexing {
            Arc::new(LevelStore::temporary().unwrap())
        } else {
            Arc::new(FilesystemStore::new(tmp.path()))
        };
        let db = Database::new(bridge, store);
        let source = parse_source(SCHEMA, false).unwrap();
        db.build(&source, &options()).await.unwrap();
        (tmp, db)
    }

    fn title_eq(value: &str) -> Vec<FilterCondition> {
        let mut ops = Map::new();
        ops.insert("eq".into(), json!(value));
        vec![FilterCondition::new("title", FieldType::String, ops)]
    }

    #[tokio::test]
    async fn test_build_reaches_ready() {
        let (_tmp, db) = setup(true).await;
        assert_eq!(db.status().await, Status::Ready);
        let snapshot = db.snapshot().await.unwrap();
        assert_eq!(snapshot.schema.collections.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_build_keeps_snapshot() {
        let (_tmp, db) = setup(true).await;
        let broken = parse_source("collections:\n  - name: post\n    path: posts\n", false).unwrap();
        assert!(db.build(&broken, &options()).await.is_err());
        assert!(matches!(db.status().await, Status::Error(_)));
        assert_eq!(db.snapshot().await.unwrap().schema.collections.len(), 3);
        assert_eq!(db.list_documents("post", &ListOptions::default()).await.unwrap().edges.len(), 2);
    }

    #[tokio::test]
    async fn test_get_document() {
        let (_tmp, db) = setup(true).await;
        let doc = db.get_document("post", "a.md").await.unwrap();
        assert_eq!(doc.data["title"], "A");
        assert_eq!(doc.data["body"], "Body A\n");
        assert_eq!(doc.sys.filename, "a");

        let page = db.get_document_by_id("content/pages/home.md").await.unwrap();
        assert_eq!(page.sys.template, "landing");

        assert!(matches!(db.get_document("post", "missing.md").await, Err(Error::NotFound { .. })));
        assert!(matches!(
            db.get_document("nope", "a.md").await,
            Err(Error::CollectionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_reference() {
        let (_tmp, db) = setup(true).await;
        let jane = db
            .resolve_reference("content/authors/jane.md", &["author".to_string()])
            .await
            .unwrap();
        assert_eq!(jane.sys.filename, "jane");
        assert!(db
            .resolve_reference("content/authors/jane.md", &["post".to_string()])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_with_and_without_index() {
        for indexing in [true, false] {
            let (_tmp, db) = setup(indexing).await;
            let all = db.list_documents("post", &ListOptions::default()).await.unwrap();
            assert_eq!(all.paths(), vec!["content/posts/a.md", "content/posts/b.md"]);

            let filtered = db
                .list_documents(
                    "post",
                    &ListOptions {
                        filter: title_eq("A"),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(filtered.paths(), vec!["content/posts/a.md"]);

            let first = db
                .list_documents(
                    "post",
                    &ListOptions {
                        first: Some(1),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(first.paths(), vec!["content/posts/a.md"]);
            assert!(first.page_info.has_next_page);

            let next = db
                .list_documents(
                    "post",
                    &ListOptions {
                        first: Some(1),
                        after: Some(first.page_info.end_cursor.clone()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(next.paths(), vec!["content/posts/b.md"]);
            assert!(next.page_info.has_previous_page);
            assert!(!next.page_info.has_next_page);

            let last = db
                .list_documents(
                    "post",
                    &ListOptions {
                        last: Some(1),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(last.paths(), vec!["content/posts/b.md"]);
        }
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let (tmp, db) = setup(true).await;
        let data = json!({"title": "C", "body": "Hello"});
        let created = db
            .create_document("post", "c.md", data.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(created.id, "content/posts/c.md");
        let on_disk = std::fs::read_to_string(tmp.path().join("content/posts/c.md")).unwrap();
        assert_eq!(on_disk, "---\ntitle: C\n---\n\nHello");
        assert_eq!(
            db.list_documents("post", &ListOptions { filter: title_eq("C"), ..Default::default() })
                .await
                .unwrap()
                .paths(),
            vec!["content/posts/c.md"]
        );

        let err = db
            .create_document("post", "c.md", data.as_object().unwrap().clone())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to add document, c.md already exists in collection 'post'"
        );

        let updated = db
            .update_document("post", "c.md", json!({"title": "C2"}).as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(updated.data["title"], "C2");
        assert_eq!(updated.data["body"], "Hello");

        db.delete_document("post", "c.md").await.unwrap();
        assert!(!tmp.path().join("content/posts/c.md").exists());
        assert!(db
            .list_documents("post", &ListOptions { filter: title_eq("C2"), ..Default::default() })
            .await
            .unwrap()
            .edges
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_file_format() {
        let (tmp, db) = setup(true).await;
        write(tmp.path(), "content/posts/legacy.json", "{\n  \"title\": \"Old\"\n}\n");

        let updated = db
            .update_document("post", "legacy.json", json!({"title": "New"}).as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(updated.data["title"], "New");

        let on_disk = std::fs::read_to_string(tmp.path().join("content/posts/legacy.json")).unwrap();
        let parsed: Value = serde_json::from_str(&on_disk).unwrap();
        assert_eq!(parsed["title"], "New");
        assert_eq!(db.get_document("post", "legacy.json").await.unwrap().data["title"], "New");
    }

    #[tokio::test]
    async fn test_required_fields_are_checked() {
        let (_tmp, db) = setup(true).await;
        let err = db
            .create_document("post", "x.md", json!({"body": "no title"}).as_object().unwrap().clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField { .. }));
    }

    #[tokio::test]
    async fn test_template_switch_replaces_data() {
        let (_tmp, db) = setup(true).await;
        let doc = db
            .update_document(
                "page",
                "home.md",
                json!({"_template": "article", "title": "Now an article"}).as_object().unwrap().clone(),
            )
            .await
            .unwrap();
        assert_eq!(doc.sys.template, "article");
        assert!(doc.data.get("headline").is_none());
    }

    #[tokio::test]
    async fn test_add_pending_document() {
        let (tmp, db) = setup(true).await;
        let doc = db.add_pending_document("page", "new.md", Some("article")).await.unwrap();
        assert_eq!(doc.sys.template, "article");
        let on_disk = std::fs::read_to_string(tmp.path().join("content/pages/new.md")).unwrap();
        assert_eq!(on_disk, "---\n_template: article\n---\n");

        assert!(matches!(
            db.add_pending_document("page", "other.md", None).await,
            Err(Error::NoTemplateFound { .. })
        ));
        assert!(matches!(
            db.add_pending_document("post", "a.md", None).await,
            Err(Error::DocumentAlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_unbuilt_database() {
        let tmp = TempDir::new().unwrap();
        let db = Database::new(
            Arc::new(FilesystemBridge::new(tmp.path())),
            Arc::new(LevelStore::temporary().unwrap()),
        );
        assert_eq!(db.status().await, Status::Idle);
        assert!(matches!(db.get_document("post", "a.md").await, Err(Error::BuildError { .. })));
    }
}
