//! Content audit
//!
//! Checks every document of every collection against the schema by pushing
//! it back through `updateDocument`. Against an [`AuditBridge`] nothing is
//! written; with `clean` the documents are rewritten in canonical form.
//!
//! Both checks go through [`resolve`], the same path editors use.

use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::bridge::{AuditBridge, Bridge, FilesystemBridge};
use crate::config::Config;
use crate::database::alias::{classify, Keys, TemplateTag};
use crate::database::{BuildOptions, Database};
use crate::error::{Error, Result};
use crate::resolver::resolve;
use crate::schema::{self, Collection, FieldShape, Schema, COLLECTION_KEY, TEMPLATE_KEY};
use crate::store::LevelStore;

const COLLECTION_QUERY: &str = r#"query ($collection: String) {
  getCollection(collection: $collection) {
    format
    documents {
      edges {
        node {
          ... on Document {
            sys { extension path relativePath }
          }
        }
      }
    }
  }
}"#;

const DOCUMENT_QUERY: &str = r#"query ($collection: String, $relativePath: String) {
  getDocument(collection: $collection, relativePath: $relativePath) {
    ... on Document { dataJSON }
  }
}"#;

const UPDATE_MUTATION: &str = r#"mutation ($collection: String, $relativePath: String!, $params: DocumentMutation!) {
  updateDocument(collection: $collection, relativePath: $relativePath, params: $params) {
    __typename
  }
}"#;

/// A document the audit could not re-submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditError {
    pub path: String,
    pub message: String,
}

/// Outcome of [`audit_collection`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectionAudit {
    pub documents: usize,
    /// Documents whose extension differs from the collection format
    pub mismatches: usize,
}

#[derive(Debug, Default)]
pub struct AuditReport {
    pub documents: usize,
    pub warnings: usize,
    pub errors: Vec<AuditError>,
    /// Writes that were (or, in a dry run, would have been) performed
    pub writes: usize,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.warnings == 0 && self.errors.is_empty()
    }
}

/// Audit the project at `root`
pub async fn run(root: &Path, config: &Config, clean: bool) -> Result<AuditReport> {
    let source = schema::load_source(&config.schema_path(root))?;
    let filesystem = FilesystemBridge::new(root);

    let audit = Arc::new(AuditBridge::new(filesystem.clone()));
    let bridge: Arc<dyn Bridge> = if clean { Arc::new(filesystem) } else { audit.clone() };
    let db = Database::new(bridge, Arc::new(LevelStore::temporary()?));
    let snapshot = db
        .build(
            &source,
            &BuildOptions {
                retry: config.retry_policy(),
                ..Default::default()
            },
        )
        .await?;

    let mut report = AuditReport::default();
    for collection in &snapshot.schema.collections {
        tracing::info!(collection = %collection.name, "auditing collection");
        let checked = audit_collection(&db, collection, root).await?;
        report.documents += checked.documents;
        report.warnings += checked.mismatches;
        report.errors.extend(audit_documents(&db, &snapshot.schema, collection).await?);
    }
    report.writes = if clean {
        let failed: BTreeSet<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
        report.documents - failed.len()
    } else {
        audit.mutations().await.len()
    };
    Ok(report)
}

/// Warn about documents whose extension does not match the collection format
pub async fn audit_collection(db: &Database, collection: &Collection, root: &Path) -> Result<CollectionAudit> {
    let data = query(db, COLLECTION_QUERY, json!({"collection": collection.name})).await?;
    let format = data["getCollection"]["format"].as_str().unwrap_or_default();

    let edges = edges(&data);
    let mut mismatches = 0;
    for edge in &edges {
        let sys = &edge["node"]["sys"];
        let extension = sys["extension"].as_str().unwrap_or_default();
        if extension.trim_start_matches('.') != format {
            mismatches += 1;
            tracing::warn!(
                location = %root.join(sys["path"].as_str().unwrap_or_default()).display(),
                extension,
                expected = format,
                "document extension does not match the collection format"
            );
        }
    }
    Ok(CollectionAudit {
        documents: edges.len(),
        mismatches,
    })
}

/// Re-submit every document of `collection` through `updateDocument`
pub async fn audit_documents(db: &Database, schema: &Schema, collection: &Collection) -> Result<Vec<AuditError>> {
    let data = query(db, COLLECTION_QUERY, json!({"collection": collection.name})).await?;

    let mut errors = Vec::new();
    for edge in edges(&data) {
        let sys = &edge["node"]["sys"];
        let path = sys["path"].as_str().unwrap_or_default().to_string();
        let relative_path = sys["relativePath"].as_str().unwrap_or_default();

        let document = resolve(
            db,
            DOCUMENT_QUERY,
            vars(json!({"collection": collection.name, "relativePath": relative_path})),
        )
        .await;
        let fetched = document.data["getDocument"]["dataJSON"].as_object().cloned();
        let data_json = match (fetched, document.errors.first()) {
            (Some(data_json), _) => data_json,
            (None, error) => {
                let message = error.map(|e| e.message.clone()).unwrap_or_else(|| "document not readable".to_string());
                tracing::error!(path = %path, error = %message, "audit failed");
                errors.push(AuditError { path, message });
                continue;
            }
        };

        let params = transform_document_into_mutation_payload(schema, collection, &data_json);
        let result = resolve(
            db,
            UPDATE_MUTATION,
            vars(json!({
                "collection": collection.name,
                "relativePath": relative_path,
                "params": params,
            })),
        )
        .await;
        for error in result.errors {
            tracing::error!(path = %path, error = %error.message, "audit failed");
            errors.push(AuditError {
                path: path.clone(),
                message: error.message,
            });
        }
    }
    Ok(errors)
}

/// Canonical document data → `DocumentMutation` params
///
/// Polymorphic values are keyed by their template:
/// `{ _template: "hero", headline: "Hi" }` → `{ hero: { headline: "Hi" } }`.
pub fn transform_document_into_mutation_payload(schema: &Schema, collection: &Collection, data: &Map<String, Value>) -> Value {
    let mut data = data.clone();
    data.remove(COLLECTION_KEY);
    data.remove("__typename");

    let mut payload = Map::new();
    payload.insert(collection.name.clone(), transform_object(schema, &collection.shape, &data));
    Value::Object(payload)
}

fn transform_object(schema: &Schema, shape: &FieldShape, value: &Map<String, Value>) -> Value {
    match shape {
        FieldShape::Flat { fields } => Value::Object(
            value
                .iter()
                .map(|(name, v)| {
                    let converted = match fields.iter().find(|f| &f.name == name).and_then(|f| f.shape()) {
                        Some(nested) => transform_value(schema, nested, v),
                        None => v.clone(),
                    };
                    (name.clone(), converted)
                })
                .collect(),
        ),
        FieldShape::Polymorphic { .. } => match classify(shape, value, Keys::Canonical) {
            TemplateTag::Tagged(name) => {
                let mut rest = value.clone();
                rest.remove(TEMPLATE_KEY);
                rest.remove("__typename");
                let fields = match schema.shape_template(shape, &name) {
                    Some(template) => template.fields.clone(),
                    None => Vec::new(),
                };
                let mut keyed = Map::new();
                keyed.insert(name, transform_object(schema, &FieldShape::Flat { fields }, &rest));
                Value::Object(keyed)
            }
            // Left as is; the mutation reports the missing template
            TemplateTag::Untagged => Value::Object(value.clone()),
        },
    }
}

fn transform_value(schema: &Schema, shape: &FieldShape, value: &Value) -> Value {
    match value {
        Value::Object(object) => transform_object(schema, shape, object),
        Value::Array(items) => Value::Array(items.iter().map(|item| transform_value(schema, shape, item)).collect()),
        other => other.clone(),
    }
}

async fn query(db: &Database, query: &str, variables: Value) -> Result<Value> {
    let result = resolve(db, query, vars(variables)).await;
    match result.errors.into_iter().next() {
        Some(error) => Err(Error::query(error.message)),
        None => Ok(result.data),
    }
}

fn edges(data: &Value) -> Vec<Value> {
    data["getCollection"]["documents"]["edges"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}

fn vars(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, parse_source};
    use tempfile::TempDir;

    const SCHEMA: &str = r#"
collections:
  - name: post
    path: content/posts
    fields:
      - { name: title, type: string, required: true }
      - name: blocks
        type: object
        list: true
        templates:
          - name: hero
            fields:
              - { name: headline, type: string }
"#;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    #[test]
    fn test_mutation_payload() {
        let schema = normalize(&parse_source(SCHEMA, false).unwrap()).unwrap();
        let post = schema.collection("post").unwrap();
        let data = json!({
            "_collection": "post",
            "title": "Hi",
            "blocks": [{"_template": "hero", "headline": "Big"}]
        });
        let payload = transform_document_into_mutation_payload(&schema, post, data.as_object().unwrap());
        assert_eq!(
            payload,
            json!({"post": {"title": "Hi", "blocks": [{"hero": {"headline": "Big"}}]}})
        );
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_writing() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".mdgraph/schema.yaml", SCHEMA);
        write(tmp.path(), "content/posts/ok.md", "---\ntitle: Fine\n---\n");
        write(tmp.path(), "content/posts/bad.md", "---\nblocks: []\n---\n");
        let before = std::fs::read_to_string(tmp.path().join("content/posts/ok.md")).unwrap();

        let report = run(tmp.path(), &Config::default(), false).await.unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.warnings, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "content/posts/bad.md");
        assert_eq!(
            report.errors[0].message,
            "Missing required field 'title' in collection 'post'"
        );
        assert_eq!(report.writes, 1);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("content/posts/ok.md")).unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn test_clean_rewrites_in_place() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".mdgraph/schema.yaml", SCHEMA);
        write(tmp.path(), "content/posts/ok.md", "---\ntitle: 'Fine'\n---\n");
        let legacy = "{\n  \"title\": \"Old\"\n}\n";
        write(tmp.path(), "content/posts/legacy.json", legacy);

        let report = run(tmp.path(), &Config::default(), true).await.unwrap();

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.documents, 1);
        assert_eq!(report.writes, 1);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("content/posts/ok.md")).unwrap(),
            "---\ntitle: Fine\n---\n"
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("content/posts/legacy.json")).unwrap(),
            legacy
        );
    }
}
