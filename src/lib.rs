//! mdgraph - GraphQL over markdown content
//!
//! A content database that compiles a declarative schema of collections into
//! a GraphQL schema and serves documents stored as markdown, JSON, YAML or
//! TOML files on disk or in a git repository.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        mdgraph Database                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │   Schema    │  │  Compiler   │  │   Resolver              │  │
//! │  │ (normalize) │─▶│  (GraphQL)  │  │   (mdgql executor)      │  │
//! │  └─────────────┘  └─────────────┘  └───────────┬─────────────┘  │
//! │                                                │                │
//! │                                                ▼                │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │                      Database                               ││
//! │  │  (build lock, status, snapshot swap, aliases, retry)        ││
//! │  └───────────────┬───────────────────────────────┬─────────────┘│
//! │                  │                               │              │
//! │                  ▼                               ▼              │
//! │  ┌───────────────────────────┐   ┌─────────────────────────────┐│
//! │  │   Bridge                  │   │   Store                     ││
//! │  │   (filesystem, git,       │   │   (sled index, filesystem   ││
//! │  │    audit dry run)         │   │    scan)                    ││
//! │  └───────────────────────────┘   └─────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod bridge;
pub mod compiler;
pub mod config;
pub mod database;
pub mod error;
pub mod resolver;
pub mod schema;
pub mod server;
pub mod store;
pub mod validation;

pub use config::Config;
pub use database::{Database, Document};
pub use error::{Error, Result};
pub use resolver::{resolve, resolve_request, ExecutionResult, GraphQLRequest};
pub use schema::Schema;
