//! Error types for mdgraph
//!
//! Provides structured error types with context for better debugging
//! and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for mdgraph operations
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Schema Errors
    // ==========================================================================
    #[error("Schema error at '{path}': {message}")]
    SchemaCompile { path: String, message: String },

    #[error("Collection '{name}' does not exist")]
    CollectionNotFound { name: String },

    // ==========================================================================
    // Document Errors
    // ==========================================================================
    #[error("Unable to find record {path}")]
    NotFound { path: String },

    #[error("Unable to add document, {relative_path} already exists in collection '{collection}'")]
    DocumentAlreadyExists {
        collection: String,
        relative_path: String,
    },

    #[error("No template found for field {field}")]
    NoTemplateFound { field: String },

    #[error("Missing required field '{field}' in collection '{collection}'")]
    MissingRequiredField { collection: String, field: String },

    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Reserved name '{name}' cannot be used")]
    ReservedName { name: String },

    // ==========================================================================
    // Query Errors
    // ==========================================================================
    #[error("{message}")]
    InvalidFilter { message: String },

    #[error("GraphQL parse error: {message}")]
    ParseError { message: String },

    #[error("{message}")]
    QueryError { message: String },

    // ==========================================================================
    // Storage Errors
    // ==========================================================================
    #[error("Store operation failed: {message}")]
    StoreError { message: String },

    #[error("{operation} is not supported by this backend")]
    Unsupported { operation: String },

    #[error("Build failed: {message}")]
    BuildError { message: String },

    // ==========================================================================
    // Git Errors
    // ==========================================================================
    #[error("Git operation failed: {message}")]
    GitError {
        message: String,
        #[source]
        source: Option<git2::Error>,
    },

    // ==========================================================================
    // IO Errors
    // ==========================================================================
    #[error("Failed to read file '{path}': {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ==========================================================================
    // Serialization Errors
    // ==========================================================================
    #[error("Failed to parse YAML: {message}")]
    YamlParseError { message: String },

    #[error("Failed to parse JSON: {message}")]
    JsonParseError { message: String },

    #[error("Failed to parse TOML: {message}")]
    TomlParseError { message: String },

    #[error("Failed to render template: {message}")]
    TemplateError { message: String },

    // ==========================================================================
    // Catch-all
    // ==========================================================================
    #[error("{0}")]
    Other(String),
}

/// Result type alias for mdgraph operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SchemaCompile {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Error::QueryError {
            message: message.into(),
        }
    }

    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Error::InvalidFilter {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Error::Unsupported {
            operation: operation.into(),
        }
    }
}

// =============================================================================
// Conversions from external error types
// =============================================================================

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Error::GitError {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::YamlParseError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonParseError {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::TomlParseError {
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::TomlParseError {
            message: err.to_string(),
        }
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::StoreError {
            message: err.to_string(),
        }
    }
}

impl From<tera::Error> for Error {
    fn from(err: tera::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Error::TemplateError { message }
    }
}

impl From<mdgql::ParseError> for Error {
    fn from(err: mdgql::ParseError) -> Self {
        Error::ParseError {
            message: err.to_string(),
        }
    }
}

impl From<crate::validation::ValidationError> for Error {
    fn from(err: crate::validation::ValidationError) -> Self {
        match err {
            crate::validation::ValidationError::InvalidIdentifier(value, reason) => {
                Error::InvalidIdentifier {
                    kind: "identifier",
                    value,
                    reason,
                }
            }
            crate::validation::ValidationError::InvalidPath(value, reason) => {
                Error::InvalidIdentifier {
                    kind: "path",
                    value,
                    reason,
                }
            }
            crate::validation::ValidationError::TooLong(value, _max) => Error::InvalidIdentifier {
                kind: "identifier",
                value,
                reason: "exceeds maximum length",
            },
            crate::validation::ValidationError::Empty => Error::InvalidIdentifier {
                kind: "identifier",
                value: String::new(),
                reason: "cannot be empty",
            },
            crate::validation::ValidationError::Reserved(name) => Error::ReservedName { name },
        }
    }
}

// =============================================================================
// Error Display Helpers
// =============================================================================

impl Error {
    /// Returns a user-friendly suggestion for fixing the error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::SchemaCompile { .. } => {
                Some("Fix the schema definition in .mdgraph/schema.yaml and rebuild")
            }
            Error::CollectionNotFound { .. } => {
                Some("Declare the collection in .mdgraph/schema.yaml")
            }
            Error::NotFound { .. } => Some("Check the collection path and relative path"),
            Error::DocumentAlreadyExists { .. } => {
                Some("Use an update mutation to change an existing document")
            }
            Error::NoTemplateFound { .. } => {
                Some("Set the template discriminator on the value (usually `_template`)")
            }
            Error::InvalidIdentifier { .. } => {
                Some("Use only letters, numbers, underscores, and hyphens")
            }
            Error::InvalidFilter { .. } => {
                Some("Range filters need one of gt/gte/after and one of lt/lte/before")
            }
            _ => None,
        }
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::CollectionNotFound { .. }
                | Error::NotFound { .. }
                | Error::DocumentAlreadyExists { .. }
                | Error::NoTemplateFound { .. }
                | Error::MissingRequiredField { .. }
                | Error::InvalidValue { .. }
                | Error::InvalidIdentifier { .. }
                | Error::InvalidFilter { .. }
                | Error::ParseError { .. }
                | Error::QueryError { .. }
        )
    }

    /// Errors a concurrent file write can cause while indexing
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::FileReadError { .. }
                | Error::FileWriteError { .. }
                | Error::NotFound { .. }
                | Error::YamlParseError { .. }
                | Error::JsonParseError { .. }
                | Error::TomlParseError { .. }
                | Error::ParseError { .. }
                | Error::StoreError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DocumentAlreadyExists {
            collection: "post".to_string(),
            relative_path: "hello.md".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unable to add document, hello.md already exists in collection 'post'"
        );

        let err = Error::schema("collections.post.fields.title", "duplicate field name");
        assert_eq!(
            err.to_string(),
            "Schema error at 'collections.post.fields.title': duplicate field name"
        );
    }

    #[test]
    fn test_error_suggestion() {
        let err = Error::CollectionNotFound {
            name: "post".to_string(),
        };
        assert!(err.suggestion().is_some());
        assert!(err.is_recoverable());
        assert!(!Error::BuildError { message: "x".into() }.is_recoverable());
    }
}
