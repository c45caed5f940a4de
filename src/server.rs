//! GraphQL development server
//!
//! Serves `POST /graphql` against a built [`Database`] and, when watching,
//! rebuilds on file changes. A failed rebuild leaves the previous snapshot
//! serving.

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use notify::{Event, RecursiveMode, Watcher};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{Config, CONFIG_DIR};
use crate::database::{BuildOptions, Database, RebuildGate, Status};
use crate::error::{Error, Result};
use crate::resolver::{resolve_request, GraphQLRequest};
use crate::schema;

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub port: u16,
    pub watch: bool,
    pub build: BuildOptions,
}

pub struct AppState {
    pub db: Arc<Database>,
}

/// State shared by watcher-triggered rebuilds
struct Rebuild {
    schema_path: PathBuf,
    options: BuildOptions,
    /// Changes below these directories never trigger a rebuild
    ignored: Vec<PathBuf>,
}

/// Build the project at `root` and serve it until shutdown
pub async fn serve(root: &Path, config: &Config, options: ServeOptions) -> Result<()> {
    let db = Arc::new(Database::new(config.open_bridge(root)?, config.open_store(root)?));
    let schema_path = config.schema_path(root);
    let source = schema::load_source(&schema_path)?;
    db.build(&source, &options.build).await?;

    let mut ignored = vec![root.join(".git"), config.generated_dir(root), root.join(CONFIG_DIR).join("index")];
    if let Some(output) = &options.build.output_dir {
        ignored.push(output.clone());
    }
    let rebuild = Arc::new(Rebuild {
        schema_path,
        options: options.build.clone(),
        ignored,
    });

    // Dropping the watcher stops the events
    let _watcher = if options.watch {
        Some(watch(root, db.clone(), rebuild)?)
    } else {
        None
    };

    tracing::info!(port = options.port, "serving GraphQL at http://localhost:{}/graphql", options.port);
    let state = web::Data::new(AppState { db });
    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .bind(("127.0.0.1", options.port))?
        .run()
        .await?;
    Ok(())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/graphql", web::post().to(graphql))
        .route("/status", web::get().to(status));
}

async fn graphql(state: web::Data<AppState>, request: web::Json<GraphQLRequest>) -> impl Responder {
    let request = request.into_inner();
    tracing::debug!(operation = ?request.operation_name, "graphql request");
    let result = resolve_request(&state.db, request).await;
    HttpResponse::Ok().json(result)
}

async fn status(state: web::Data<AppState>) -> impl Responder {
    let body = match state.db.status().await {
        Status::Idle => json!({"status": "idle"}),
        Status::Indexing => json!({"status": "indexing"}),
        Status::Ready => json!({"status": "ready"}),
        Status::Error(message) => json!({"status": "error", "message": message}),
    };
    HttpResponse::Ok().json(body)
}

// ============================================================================
// Watching
// ============================================================================

fn watch(root: &Path, db: Arc<Database>, rebuild: Arc<Rebuild>) -> Result<notify::RecommendedWatcher> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| match event {
        Ok(event) => {
            let _ = tx.send(event.paths);
        }
        Err(e) => tracing::warn!(error = %e, "watch error"),
    })
    .map_err(|e| Error::Other(format!("failed to start watcher: {}", e)))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| Error::Other(format!("failed to watch {}: {}", root.display(), e)))?;

    let gate = Arc::new(RebuildGate::new());
    tokio::spawn(async move {
        while let Some(paths) = rx.recv().await {
            if !paths.iter().any(|p| should_rebuild(p, &rebuild.ignored)) {
                continue;
            }
            let (gate, db, rebuild) = (gate.clone(), db.clone(), rebuild.clone());
            tokio::spawn(async move {
                gate.trigger(|| run_rebuild(&db, &rebuild)).await;
            });
        }
    });

    tracing::info!(root = %root.display(), "watching for changes");
    Ok(watcher)
}

async fn run_rebuild(db: &Database, rebuild: &Rebuild) {
    tracing::info!("change detected, rebuilding");
    let source = match schema::load_source(&rebuild.schema_path) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(error = %e, "schema unreadable, keeping previous build");
            return;
        }
    };
    if let Err(e) = db.build(&source, &rebuild.options).await {
        tracing::error!(error = %e, "rebuild failed, keeping previous build");
    }
}

fn should_rebuild(path: &Path, ignored: &[PathBuf]) -> bool {
    !ignored.iter().any(|dir| path.starts_with(dir) || in_staging_sibling(path, dir))
}

/// Generated files are staged in hidden siblings such as `.__generated__.tmp`
fn in_staging_sibling(path: &Path, dir: &Path) -> bool {
    let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) else {
        return false;
    };
    let prefix = format!(".{}.", name.to_string_lossy());
    path.strip_prefix(parent)
        .ok()
        .and_then(|rest| rest.components().next())
        .map_or(false, |first| first.as_os_str().to_string_lossy().starts_with(&prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::FilesystemBridge;
    use crate::schema::parse_source;
    use crate::store::LevelStore;
    use actix_web::test;
    use serde_json::Value;
    use tempfile::TempDir;

    #[core::prelude::v1::test]
    fn test_should_rebuild() {
        let ignored = vec![PathBuf::from("/p/.git"), PathBuf::from("/p/.mdgraph/__generated__")];
        assert!(should_rebuild(Path::new("/p/content/a.md"), &ignored));
        assert!(should_rebuild(Path::new("/p/.mdgraph/schema.yaml"), &ignored));
        assert!(!should_rebuild(Path::new("/p/.git/index"), &ignored));
        assert!(!should_rebuild(Path::new("/p/.mdgraph/__generated__/schema.gql"), &ignored));
        assert!(!should_rebuild(Path::new("/p/.mdgraph/.__generated__.tmp/schema.gql"), &ignored));
    }

    #[actix_web::test]
    async fn test_graphql_endpoint() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("content/posts")).unwrap();
        std::fs::write(tmp.path().join("content/posts/a.md"), "---\ntitle: A\n---\n").unwrap();

        let db = Database::new(
            Arc::new(FilesystemBridge::new(tmp.path())),
            Arc::new(LevelStore::temporary().unwrap()),
        );
        let source = parse_source(
            "collections:\n  - name: post\n    path: content/posts\n    fields:\n      - { name: title, type: string }\n",
            false,
        )
        .unwrap();
        db.build(&source, &BuildOptions::default()).await.unwrap();

        let state = web::Data::new(AppState { db: Arc::new(db) });
        let app = test::init_service(App::new().app_data(state).configure(routes)).await;

        let request = test::TestRequest::post()
            .uri("/graphql")
            .set_json(json!({"query": "{ getPostDocument(relativePath: \"a.md\") { data { title } } }"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["data"]["getPostDocument"]["data"]["title"], "A");
        assert!(body.get("errors").is_none());

        let request = test::TestRequest::get().uri("/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["status"], "ready");
    }
}
