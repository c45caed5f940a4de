//! Schema compiler
//!
//! Turns a normalized [`Schema`] into everything a running server and its
//! clients need:
//!
//! | File            | Content                                       |
//! |-----------------|-----------------------------------------------|
//! | `schema.gql`    | GraphQL SDL                                   |
//! | `_graphql.json` | the same document as a serialized AST         |
//! | `_schema.json`  | normalized schema snapshot                    |
//! | `_lookup.json`  | [`TypeRegistry`] used by the resolver         |
//! | `frags.gql`     | one `<X>Parts` fragment per collection        |
//! | `queries.gql`   | `get<X>Document` / `get<X>List` operations    |
//! | `types.ts`      | TypeScript types                              |
//! | `client.ts`     | typed SDK bound to the generated operations   |
//!
//! Compilation is pure: the same schema always yields byte-identical files.

pub mod builder;
pub mod codegen;
pub mod namer;
pub mod operations;
pub mod registry;

pub use registry::{CollectionTypes, DataType, FieldHint, RootField, TypeRegistry};

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Generated artifacts of one schema
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    pub graphql: mdgql::Document,
    pub fragments: mdgql::Document,
    pub queries: mdgql::Document,
    pub registry: TypeRegistry,
    pub snapshot: Value,
    pub types_ts: String,
    pub client_ts: String,
}

pub fn compile(schema: &Schema) -> Result<CompiledSchema> {
    let graphql = builder::build_schema_ast(schema);
    let fragments = operations::build_fragments(schema);
    let queries = operations::build_queries(schema);
    let types_ts = codegen::render_types(&graphql, &queries)?;
    let client_ts = codegen::render_client(&fragments, &queries)?;

    Ok(CompiledSchema {
        registry: TypeRegistry::from_schema(schema),
        snapshot: schema.snapshot()?,
        graphql,
        fragments,
        queries,
        types_ts,
        client_ts,
    })
}

impl CompiledSchema {
    pub fn sdl(&self) -> String {
        mdgql::print(&self.graphql)
    }

    /// File name → content, in a fixed order
    pub fn files(&self, sdk: bool) -> Result<Vec<(&'static str, String)>> {
        let mut files = vec![
            ("schema.gql", self.sdl()),
            ("_graphql.json", pretty(&self.graphql)?),
            ("_schema.json", pretty(&self.snapshot)?),
            ("_lookup.json", pretty(&self.registry)?),
            ("frags.gql", mdgql::print(&self.fragments)),
            ("queries.gql", mdgql::print(&self.queries)),
        ];
        if sdk {
            files.push(("types.ts", self.types_ts.clone()));
            files.push(("client.ts", self.client_ts.clone()));
        }
        Ok(files)
    }

    /// Write every artifact to `dir`
    ///
    /// Files go to a sibling staging directory first, which replaces `dir`
    /// only once all of them are written. A failure leaves `dir` as it was.
    pub fn write_to(&self, dir: &Path, sdk: bool) -> Result<()> {
        let staging = sibling(dir, "tmp")?;
        let previous = sibling(dir, "old")?;

        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging).map_err(|source| Error::FileWriteError {
            path: staging.clone(),
            source,
        })?;

        for (name, content) in self.files(sdk)? {
            let path = staging.join(name);
            if let Err(source) = std::fs::write(&path, content) {
                let _ = std::fs::remove_dir_all(&staging);
                return Err(Error::FileWriteError { path, source });
            }
        }

        if previous.exists() {
            std::fs::remove_dir_all(&previous)?;
        }
        if dir.exists() {
            std::fs::rename(dir, &previous)?;
        }
        if let Err(e) = std::fs::rename(&staging, dir) {
            if previous.exists() {
                std::fs::rename(&previous, dir)?;
            }
            return Err(e.into());
        }
        if previous.exists() {
            std::fs::remove_dir_all(&previous)?;
        }

        tracing::debug!(dir = %dir.display(), "wrote generated files");
        Ok(())
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
}

/// `.../__generated__` → `.../.__generated__.{suffix}`
fn sibling(dir: &Path, suffix: &str) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .ok_or_else(|| Error::Other(format!("invalid output directory '{}'", dir.display())))?;
    Ok(dir.with_file_name(format!(".{}.{}", name.to_string_lossy(), suffix)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, parse_source};
    use tempfile::TempDir;

    const SOURCE: &str = r#"
collections:
  - name: author
    path: content/authors
    fields:
      - { name: name, type: string, isTitle: true }
  - name: post
    path: content/posts
    fields:
      - { name: title, type: string }
      - { name: date, type: datetime }
      - { name: author, type: reference, collections: [author] }
      - name: blocks
        type: object
        list: true
        templates:
          - name: hero
            fields:
              - { name: headline, type: string }
          - name: quote
            fields:
              - { name: text, type: string }
"#;

    fn compiled() -> CompiledSchema {
        let schema = normalize(&parse_source(SOURCE, false).unwrap()).unwrap();
        compile(&schema).unwrap()
    }

    #[test]
    fn test_compile_is_idempotent() {
        let first = compiled().files(true).unwrap();
        let second = compiled().files(true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_to_replaces_directory() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("__generated__");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("stale.txt"), "old").unwrap();

        compiled().write_to(&out, true).unwrap();

        assert!(!out.join("stale.txt").exists());
        for name in [
            "schema.gql",
            "_graphql.json",
            "_schema.json",
            "_lookup.json",
            "frags.gql",
            "queries.gql",
            "types.ts",
            "client.ts",
        ] {
            assert!(out.join(name).exists(), "missing {}", name);
        }
        let sdl = std::fs::read_to_string(out.join("schema.gql")).unwrap();
        assert!(sdl.contains("union PostBlocks = PostBlocksHero | PostBlocksQuote"));
        assert!(!tmp.path().join(".__generated__.tmp").exists());
        assert!(!tmp.path().join(".__generated__.old").exists());
    }

    #[test]
    fn test_write_without_sdk() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("gen");
        compiled().write_to(&out, false).unwrap();
        assert!(out.join("schema.gql").exists());
        assert!(!out.join("client.ts").exists());
    }

    #[test]
    fn test_lookup_round_trips() {
        let compiled = compiled();
        let json = pretty(&compiled.registry).unwrap();
        let back: TypeRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, compiled.registry);
    }
}
