//! Schema definitions for mdgraph
//!
//! Schemas define the structure of collections:
//! - Collections of documents stored under a directory in one format
//! - Fields with types, aliases and options
//! - Templates for polymorphic documents and objects
//! - Indexes over top-level fields
//!
//! The source lives in `.mdgraph/schema.yaml` (or `.json`) and is normalized
//! into an immutable [`Schema`].

mod model;
mod normalize;
mod source;

pub use model::*;
pub use normalize::normalize;
pub use source::*;

use std::path::Path;

use crate::error::{Error, Result};

/// Load a schema source from a YAML or JSON file
pub fn load_source(path: &Path) -> Result<SchemaSource> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::FileReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
    parse_source(&content, is_json)
}

/// Parse a schema source from text
pub fn parse_source(content: &str, is_json: bool) -> Result<SchemaSource> {
    if is_json {
        Ok(serde_json::from_str(content)?)
    } else {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Load and normalize a schema
pub fn load(path: &Path) -> Result<Schema> {
    normalize(&load_source(path)?)
}
