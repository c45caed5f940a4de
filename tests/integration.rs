//! Integration tests for mdgraph
//!
//! Full flows from schema source through the database, the bridges and the
//! GraphQL resolver down to files on disk and git objects.

use mdgraph::bridge::{Bridge, FilesystemBridge, GitBridge};
use mdgraph::compiler;
use mdgraph::database::alias::{replace_aliases_with_names, replace_keys_with_aliases};
use mdgraph::database::{BuildOptions, Database, ListOptions, RetryPolicy};
use mdgraph::schema::{normalize, parse_source, FieldType, SchemaSource};
use mdgraph::store::{FilesystemStore, FilterCondition, LevelStore, Store};
use mdgraph::resolve;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
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
      - { name: title, type: string, alias: heading }
      - { name: author, type: reference, collections: [author] }
      - name: blocks
        type: object
        list: true
        templates:
          - name: hero
            fields:
              - { name: headline, type: string, alias: head }
          - name: quote
            fields:
              - { name: text, type: string }
  - name: event
    path: content/events
    fields:
      - { name: title, type: string }
      - { name: date, type: datetime }
      - { name: seats, type: number }
    indexes:
      - name: by-date
        fields: [{ name: date }]
      - name: by-title-date
        fields: [{ name: title }, { name: date }]
"#;

fn source() -> SchemaSource {
    parse_source(SCHEMA, false).expect("schema parses")
}

fn write(root: &Path, path: &str, content: &str) {
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

fn seed_content(root: &Path) {
    write(root, "content/authors/jane.md", "---\nname: Jane\n---\n");
    write(
        root,
        "content/posts/a.md",
        "---\nheading: A\nauthor: content/authors/jane.md\nblocks:\n  - _template: hero\n    head: Big\n---\n",
    );
    write(root, "content/posts/b.md", "---\nheading: B\n---\n");
    write(root, "content/events/a.md", "---\ntitle: Launch\ndate: 2023-01-01\nseats: 10\n---\n");
    write(root, "content/events/b.md", "---\ntitle: Meetup\ndate: 2023-06-01\nseats: 50\n---\n");
    write(root, "content/events/c.md", "---\ntitle: Launch\ndate: 2024-01-01\nseats: 20\n---\n");
}

async fn open(root: &Path, store: Arc<dyn Store>) -> Database {
    let db = Database::new(Arc::new(FilesystemBridge::new(root)), store);
    db.build(&source(), &options()).await.expect("build succeeds");
    db
}

fn condition(path: &str, field_type: FieldType, operators: Value) -> FilterCondition {
    let operators = match operators {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    FilterCondition::new(path, field_type, operators)
}

fn sorted(paths: Vec<&str>) -> Vec<String> {
    let mut paths: Vec<String> = paths.into_iter().map(str::to_string).collect();
    paths.sort();
    paths
}

// =============================================================================
// Aliases
// =============================================================================

#[test]
fn test_alias_round_trip() {
    let schema = normalize(&source()).unwrap();
    let post = schema.collection("post").unwrap();
    let data = json!({
        "title": "Hello",
        "blocks": [
            {"_template": "hero", "headline": "Big"},
            {"_template": "quote", "text": "Wise"}
        ]
    });
    let data = data.as_object().unwrap();

    let stored = replace_keys_with_aliases(&schema, &post.shape, data, "post").unwrap();
    assert_eq!(stored["heading"], "Hello");
    assert_eq!(stored["blocks"][0]["head"], "Big");

    let back = replace_aliases_with_names(&schema, &post.shape, &stored, "post").unwrap();
    assert_eq!(&back, data);
}

#[tokio::test]
async fn test_aliases_on_disk_and_canonical_in_api() {
    let tmp = TempDir::new().unwrap();
    seed_content(tmp.path());
    let db = open(tmp.path(), Arc::new(LevelStore::temporary().unwrap())).await;

    let mut data = Map::new();
    data.insert("title".into(), json!("Fresh"));
    data.insert("blocks".into(), json!([{"_template": "hero", "headline": "Loud"}]));
    db.create_document("post", "fresh.md", data).await.unwrap();

    let on_disk = std::fs::read_to_string(tmp.path().join("content/posts/fresh.md")).unwrap();
    assert!(on_disk.contains("heading: Fresh"));
    assert!(on_disk.contains("head: Loud"));
    assert!(!on_disk.contains("headline"));

    let doc = db.get_document("post", "fresh.md").await.unwrap();
    assert_eq!(doc.data["title"], "Fresh");
    assert_eq!(doc.data["blocks"][0]["headline"], "Loud");
}

// =============================================================================
// Filtering and indexes
// =============================================================================

#[tokio::test]
async fn test_index_path_matches_full_scan() {
    let tmp = TempDir::new().unwrap();
    seed_content(tmp.path());
    let indexed = open(tmp.path(), Arc::new(LevelStore::temporary().unwrap())).await;
    let scanned = open(tmp.path(), Arc::new(FilesystemStore::new(tmp.path()))).await;

    let chains = vec![
        vec![condition("date", FieldType::Datetime, json!({"gte": "2023-01-01", "lt": "2024-01-01"}))],
        vec![condition("date", FieldType::Datetime, json!({"after": "2023-03-01"}))],
        vec![
            condition("title", FieldType::String, json!({"eq": "Launch"})),
            condition("date", FieldType::Datetime, json!({"gt": "2023-06-01"})),
        ],
        vec![condition("title", FieldType::String, json!({"startsWith": "Me"}))],
        vec![condition("seats", FieldType::Number, json!({"gte": 20}))],
    ];

    for filter in chains {
        let list = ListOptions {
            filter: filter.clone(),
            ..Default::default()
        };
        let from_index = indexed.list_documents("event", &list).await.unwrap();
        let from_scan = scanned.list_documents("event", &list).await.unwrap();
        assert_eq!(
            sorted(from_index.paths()),
            sorted(from_scan.paths()),
            "filter {:?}",
            filter
        );
    }
}

#[tokio::test]
async fn test_equality_filter_without_index() {
    let tmp = TempDir::new().unwrap();
    seed_content(tmp.path());
    let db = open(tmp.path(), Arc::new(LevelStore::temporary().unwrap())).await;

    let response = db
        .list_documents(
            "post",
            &ListOptions {
                filter: vec![condition("title", FieldType::String, json!({"eq": "A"}))],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(response.paths(), vec!["content/posts/a.md"]);
}

#[tokio::test]
async fn test_datetime_range_with_index() {
    let tmp = TempDir::new().unwrap();
    seed_content(tmp.path());
    let db = open(tmp.path(), Arc::new(LevelStore::temporary().unwrap())).await;

    let response = db
        .list_documents(
            "event",
            &ListOptions {
                filter: vec![condition("date", FieldType::Datetime, json!({"gte": "2023-01-01", "lt": "2024-01-01"}))],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(response.paths(), vec!["content/events/a.md", "content/events/b.md"]);
}

#[tokio::test]
async fn test_graphql_filter_and_sort() {
    let tmp = TempDir::new().unwrap();
    seed_content(tmp.path());
    let db = open(tmp.path(), Arc::new(LevelStore::temporary().unwrap())).await;

    let result = resolve(
        &db,
        r#"{
            getEventList(filter: { title: { eq: "Launch" } }, sort: "by-date", last: 1) {
                totalCount
                edges { node { ... on EventDocument { data { date } } } }
            }
        }"#,
        Map::new(),
    )
    .await;
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let list = &result.data["getEventList"];
    assert_eq!(list["totalCount"], 1);
    assert_eq!(list["edges"][0]["node"]["data"]["date"], "2024-01-01");
}

// =============================================================================
// References
// =============================================================================

#[tokio::test]
async fn test_reference_resolution() {
    let tmp = TempDir::new().unwrap();
    seed_content(tmp.path());
    let db = open(tmp.path(), Arc::new(LevelStore::temporary().unwrap())).await;

    let result = resolve(
        &db,
        r#"{
            getPostDocument(relativePath: "a.md") {
                data {
                    author {
                        ... on AuthorDocument { sys { filename } data { name } }
                    }
                }
            }
        }"#,
        Map::new(),
    )
    .await;
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let author = &result.data["getPostDocument"]["data"]["author"];
    assert_eq!(author["sys"]["filename"], "jane");
    assert_eq!(author["data"]["name"], "Jane");
}

// =============================================================================
// Compiler
// =============================================================================

#[test]
fn test_compiler_is_idempotent() {
    let first = compiler::compile(&normalize(&source()).unwrap()).unwrap();
    let second = compiler::compile(&normalize(&source()).unwrap()).unwrap();
    assert_eq!(first.sdl(), second.sdl());
    assert_eq!(first.files(true).unwrap(), second.files(true).unwrap());
}

#[tokio::test]
async fn test_build_writes_identical_output() {
    let tmp = TempDir::new().unwrap();
    seed_content(tmp.path());
    let out = tmp.path().join(".mdgraph/__generated__");
    let db = Database::new(
        Arc::new(FilesystemBridge::new(tmp.path())),
        Arc::new(LevelStore::temporary().unwrap()),
    );
    let build = BuildOptions {
        output_dir: Some(out.clone()),
        ..options()
    };

    db.build(&source(), &build).await.unwrap();
    let first = std::fs::read(out.join("schema.gql")).unwrap();
    db.build(&source(), &build).await.unwrap();
    let second = std::fs::read(out.join("schema.gql")).unwrap();
    assert_eq!(first, second);
}

// =============================================================================
// Git
// =============================================================================

const REF: &str = "refs/heads/main";

fn git_db(root: &Path) -> (Arc<GitBridge>, Database) {
    let bridge = Arc::new(GitBridge::init(root, REF).unwrap());
    let db = Database::new(bridge.clone(), Arc::new(LevelStore::temporary().unwrap()));
    (bridge, db)
}

#[tokio::test]
async fn test_git_identical_write_is_one_commit() {
    let tmp = TempDir::new().unwrap();
    let (bridge, db) = git_db(tmp.path());
    db.build(&source(), &options()).await.unwrap();

    let mut data = Map::new();
    data.insert("name".into(), json!("Jane"));
    db.create_document("author", "jane.md", data.clone()).await.unwrap();
    let after_create = bridge.head().unwrap().expect("ref advanced");

    db.update_document("author", "jane.md", data).await.unwrap();
    assert_eq!(bridge.head().unwrap(), Some(after_create));
    assert!(!tmp.path().join("content/authors/jane.md").exists());
}

#[tokio::test]
async fn test_git_history_is_linear() {
    let tmp = TempDir::new().unwrap();
    let (bridge, db) = git_db(tmp.path());
    db.build(&source(), &options()).await.unwrap();

    let mut heads = Vec::new();
    for (i, title) in ["One", "Two", "Three"].into_iter().enumerate() {
        let mut data = Map::new();
        data.insert("title".into(), json!(title));
        if i == 0 {
            db.create_document("event", "e.md", data).await.unwrap();
        } else {
            db.update_document("event", "e.md", data).await.unwrap();
        }
        heads.push(bridge.head().unwrap().expect("ref advanced"));
    }

    let repo = git2::Repository::open(tmp.path()).unwrap();
    for pair in heads.windows(2) {
        let commit = repo.find_commit(pair[1]).unwrap();
        assert_eq!(commit.parent_count(), 1);
        assert_eq!(commit.parent_id(0).unwrap(), pair[0]);
    }
    let tip = repo.find_reference(REF).unwrap().peel_to_commit().unwrap();
    assert_eq!(tip.id(), heads[2]);
    let content = bridge.get("content/events/e.md").await.unwrap();
    assert!(content.contains("title: Three"));
}

#[tokio::test]
async fn test_git_delete_collapses_empty_directories() {
    let tmp = TempDir::new().unwrap();
    let bridge = GitBridge::init(tmp.path(), REF).unwrap();
    bridge.put("keep.md", "kept\n").await.unwrap();
    bridge.put("a/b/only-file.md", "gone\n").await.unwrap();

    bridge.delete("a/b/only-file.md").await.unwrap();

    let repo = git2::Repository::open(tmp.path()).unwrap();
    let tree = repo.find_reference(REF).unwrap().peel_to_tree().unwrap();
    assert!(tree.get_path(Path::new("a/b")).is_err());
    assert!(tree.get_path(Path::new("a")).is_err());
    assert!(tree.get_path(Path::new("keep.md")).is_ok());
}
