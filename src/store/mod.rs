//! Ordered record store with secondary indexes
//!
//! The store never holds the source of truth. It caches canonical document
//! values (plus `_collection` and `_template`) keyed by file path, and keeps
//! one ordered index per [`IndexDefinition`] so list queries can scan a key
//! range instead of every record.

pub mod filter;
pub mod jsonpath;
mod filesystem;
mod level;

pub use filesystem::FilesystemStore;
pub use filter::{Filter, FilterCondition, Op};
pub use level::LevelStore;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::schema::IndexDefinition;

/// Name of the implicit index ordering a collection by file path
pub const FILEPATH_INDEX: &str = "__filepath__";

/// Options for [`Store::put`], [`Store::seed`] and [`Store::delete`]
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub collection: Option<String>,
    pub index_definitions: Vec<IndexDefinition>,
}

impl PutOptions {
    pub fn new(collection: impl Into<String>, index_definitions: Vec<IndexDefinition>) -> Self {
        Self {
            collection: Some(collection.into()),
            index_definitions,
        }
    }
}

/// Options for [`Store::query`]
#[derive(Debug, Clone, Default)]
pub struct StoreQueryOptions {
    pub collection: String,
    /// Indexes declared for the collection
    pub index_definitions: Vec<IndexDefinition>,
    pub filter_chain: Vec<Filter>,
    /// Index to order by; defaults to file path order
    pub sort: Option<String>,
    /// Start after this cursor
    pub gt: Option<String>,
    /// Start at this cursor
    pub gte: Option<String>,
    /// End before this cursor
    pub lt: Option<String>,
    /// End at this cursor
    pub lte: Option<String>,
    pub reverse: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreEdge {
    pub cursor: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_previous_page: bool,
    pub has_next_page: bool,
    pub start_cursor: String,
    pub end_cursor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreQueryResponse {
    pub edges: Vec<StoreEdge>,
    pub page_info: PageInfo,
}

impl StoreQueryResponse {
    pub fn paths(&self) -> Vec<&str> {
        self.edges.iter().map(|e| e.path.as_str()).collect()
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// File paths of stored records matching a glob pattern
    async fn glob(&self, pattern: &str) -> Result<Vec<String>>;

    /// Stored record for a file path
    async fn get(&self, filepath: &str) -> Result<Value>;

    /// Write a record into the live data set
    async fn put(&self, filepath: &str, data: Value, options: &PutOptions) -> Result<()>;

    /// Write a record into the generation being built
    async fn seed(&self, filepath: &str, data: Value, options: &PutOptions) -> Result<()>;

    async fn delete(&self, filepath: &str, options: &PutOptions) -> Result<()>;

    /// Run a filtered, ordered, paginated query over one collection
    async fn query(&self, options: StoreQueryOptions) -> Result<StoreQueryResponse>;

    fn supports_seeding(&self) -> bool;

    fn supports_indexing(&self) -> bool;

    /// Start a fresh generation; seeds go there until commit or abort
    async fn begin_generation(&self) -> Result<()> {
        Ok(())
    }

    /// Promote the generation being built to live
    async fn commit_generation(&self) -> Result<()> {
        Ok(())
    }

    /// Drop the generation being built, keeping the live one
    async fn abort_generation(&self) -> Result<()> {
        Ok(())
    }
}
