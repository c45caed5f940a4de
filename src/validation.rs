//! Input validation for mdgraph
//!
//! Schema identifiers become GraphQL names and document paths become
//! repository paths, so both are checked before use.

use thiserror::Error;

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid identifier '{0}': {1}")]
    InvalidIdentifier(String, &'static str),

    #[error("Invalid path '{0}': {1}")]
    InvalidPath(String, &'static str),

    #[error("Identifier '{0}' is too long (max {1} characters)")]
    TooLong(String, usize),

    #[error("Identifier cannot be empty")]
    Empty,

    #[error("Reserved name: '{0}'")]
    Reserved(String),
}

/// Maximum length for identifiers
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Keys with meaning inside stored documents
pub const RESERVED_KEYS: &[&str] = &["_template", "_body", "_collection", "_id"];

/// Reserved device names that cannot be path segments
const RESERVED_SEGMENTS: &[&str] = &[
    "con", "prn", "aux", "nul",
    "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8", "com9",
    "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Validate a collection or template name
///
/// Rules:
/// - Must be 1-255 characters
/// - Only alphanumeric, underscore, and hyphen allowed
/// - Must start with a letter
pub fn validate_collection_name(name: &str) -> Result<(), ValidationError> {
    check_length(name)?;

    for (i, c) in name.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
            return Err(ValidationError::InvalidIdentifier(
                name.to_string(),
                "contains invalid characters (only alphanumeric, underscore, and hyphen allowed)",
            ));
        }
        if i == 0 && !c.is_ascii_alphabetic() {
            return Err(ValidationError::InvalidIdentifier(
                name.to_string(),
                "must start with a letter",
            ));
        }
    }

    Ok(())
}

/// Validate a field name, which is used verbatim as a GraphQL field name
pub fn validate_field_name(name: &str) -> Result<(), ValidationError> {
    check_length(name)?;

    if RESERVED_KEYS.contains(&name) || name.starts_with("__") {
        return Err(ValidationError::Reserved(name.to_string()));
    }

    for (i, c) in name.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(ValidationError::InvalidIdentifier(
                name.to_string(),
                "contains invalid characters (only alphanumeric and underscore allowed)",
            ));
        }
        if i == 0 && c.is_ascii_digit() {
            return Err(ValidationError::InvalidIdentifier(
                name.to_string(),
                "cannot start with a digit",
            ));
        }
    }

    Ok(())
}

/// Validate a document path relative to its collection (`nested/hello.md`)
pub fn validate_relative_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::Empty);
    }

    if path.starts_with('/') || path.contains('\\') {
        return Err(ValidationError::InvalidPath(
            path.to_string(),
            "must be a relative path using forward slashes",
        ));
    }

    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(ValidationError::InvalidPath(
                path.to_string(),
                "contains path traversal or empty segments",
            ));
        }
        if segment.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ValidationError::TooLong(segment.to_string(), MAX_IDENTIFIER_LENGTH));
        }
        if segment.chars().any(|c| c.is_control() || c == ':' || c == '\u{1d}') {
            return Err(ValidationError::InvalidPath(
                path.to_string(),
                "contains control characters or ':'",
            ));
        }
        let stem = segment.split('.').next().unwrap_or(segment);
        if RESERVED_SEGMENTS.contains(&stem.to_lowercase().as_str()) {
            return Err(ValidationError::Reserved(segment.to_string()));
        }
    }

    Ok(())
}

fn check_length(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong(name.to_string(), MAX_IDENTIFIER_LENGTH));
    }
    Ok(())
}
