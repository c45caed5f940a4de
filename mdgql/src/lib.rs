//! mdgql - GraphQL documents for mdgraph
//!
//! Parses the executable documents clients send to the content API and
//! prints the documents the schema compiler produces.
//!
//! # Syntax Overview
//!
//! ```graphql
//! # Fetch one document
//! query getPostDocument($relativePath: String!) {
//!   getPostDocument(relativePath: $relativePath) {
//!     id
//!     data { ...PostParts }
//!   }
//! }
//!
//! # Filtered, paginated listing
//! {
//!   getPostList(filter: {date: {after: "2023-01-01"}}, first: 10) {
//!     edges { cursor node { id } }
//!   }
//! }
//!
//! fragment PostParts on Post { title }
//! ```
//!
//! Type-system definitions (`type`, `interface`, `union`, `input`, `scalar`,
//! `enum`) are represented in the AST and printed, but only executable
//! definitions are parsed.

mod ast;
mod error;
mod parser;
mod printer;

pub use ast::*;
pub use error::ParseError;
pub use printer::{print_definition, print_value};

/// Parse a GraphQL executable document
pub fn parse(input: &str) -> Result<Document, ParseError> {
    parser::parse_document(input)
}

/// Parse a single GraphQL input value
pub fn parse_value(input: &str) -> Result<Value, ParseError> {
    parser::parse_value(input)
}

/// Print a document
pub fn print(doc: &Document) -> String {
    printer::print_document(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let doc = parse("query { getCollections { name } }").unwrap();
        assert_eq!(doc.operations().count(), 1);
    }

    #[test]
    fn test_parse_mutation() {
        let doc = parse(r#"mutation { deleteDocument(collection: "post", relativePath: "a.md") { id } }"#).unwrap();
        let op = doc.operation(None).unwrap();
        assert_eq!(op.operation, OperationType::Mutation);
    }

    #[test]
    fn test_operation_selection() {
        let doc = parse("query a { x } query b { y }").unwrap();
        assert!(doc.operation(None).is_none());
        assert_eq!(doc.operation(Some("b")).unwrap().name.as_deref(), Some("b"));
    }

    #[test]
    fn test_value_json_conversion() {
        let value = parse_value(r#"{title: $t, n: 2, list: [true, null]}"#).unwrap();
        let mut vars = serde_json::Map::new();
        vars.insert("t".into(), serde_json::json!("Hello"));
        assert_eq!(
            value.to_json(&vars),
            serde_json::json!({"title": "Hello", "n": 2, "list": [true, null]})
        );
    }

    #[test]
    fn test_definition_names() {
        let doc = parse("query named { a } fragment F on T { b }").unwrap();
        let names: Vec<_> = doc.definitions.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec![Some("named"), Some("F")]);
    }
}
