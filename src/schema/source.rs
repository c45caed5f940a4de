//! Declarative schema source as written in `.mdgraph/schema.yaml`
//!
//! ```yaml
//! templates:
//!   - name: hero
//!     fields:
//!       - { name: headline, type: string }
//! collections:
//!   - name: post
//!     path: content/posts
//!     format: md
//!     fields:
//!       - { name: title, type: string, isTitle: true, required: true }
//!       - { name: author, type: reference, collections: [author] }
//!       - { name: blocks, type: object, list: true, templates: [hero] }
//!       - { name: body, type: rich-text, isBody: true }
//!     indexes:
//!       - name: author-date
//!         fields: [{ name: author }, { name: date }]
//! ```

use serde::{Deserialize, Serialize};

/// Root of a schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSource {
    #[serde(default)]
    pub collections: Vec<CollectionSource>,
    /// Templates that fields may reference by name
    #[serde(default)]
    pub templates: Vec<TemplateSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSource {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Directory holding the collection's documents, relative to the content root
    pub path: String,
    #[serde(default)]
    pub format: Option<Format>,
    /// Glob (relative to `path`, without extension) selecting documents. Defaults to `**/*`
    #[serde(default, rename = "match")]
    pub matches: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<FieldSource>>,
    #[serde(default)]
    pub templates: Option<Vec<TemplateRef>>,
    #[serde(default)]
    pub indexes: Vec<IndexSource>,
}

/// A template either declared inline or referring to a global template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateRef {
    Named(String),
    Inline(TemplateSource),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSource {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSource>,
    /// Delimiters of the embedded block syntax for this template
    #[serde(default, rename = "match")]
    pub matcher: Option<TemplateMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSource {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Key used in stored documents when it differs from `name`
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub fields: Option<Vec<FieldSource>>,
    #[serde(default)]
    pub templates: Option<Vec<TemplateRef>>,
    /// Target collections of a reference field
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub is_title: bool,
    #[serde(default)]
    pub is_body: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSource {
    pub name: String,
    pub fields: Vec<IndexFieldSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFieldSource {
    pub name: String,
}

/// Field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Datetime,
    Image,
    RichText,
    Reference,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Datetime => "datetime",
            FieldType::Image => "image",
            FieldType::RichText => "rich-text",
            FieldType::Reference => "reference",
            FieldType::Object => "object",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "datetime" => Some(FieldType::Datetime),
            "image" => Some(FieldType::Image),
            "rich-text" => Some(FieldType::RichText),
            "reference" => Some(FieldType::Reference),
            "object" => Some(FieldType::Object),
            _ => None,
        }
    }

    /// Types that can appear in an index and be compared
    pub fn is_indexable(&self) -> bool {
        matches!(
            self,
            FieldType::String
                | FieldType::Number
                | FieldType::Boolean
                | FieldType::Datetime
                | FieldType::Image
                | FieldType::Reference
        )
    }
}

/// On-disk document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Md,
    Mdx,
    Markdown,
    Json,
    Yaml,
    Yml,
    Toml,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Md => "md",
            Format::Mdx => "mdx",
            Format::Markdown => "markdown",
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Yml => "yml",
            Format::Toml => "toml",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "md" => Some(Format::Md),
            "mdx" => Some(Format::Mdx),
            "markdown" => Some(Format::Markdown),
            "json" => Some(Format::Json),
            "yaml" => Some(Format::Yaml),
            "yml" => Some(Format::Yml),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    /// Front matter plus a body
    pub fn is_markdown(&self) -> bool {
        matches!(self, Format::Md | Format::Mdx | Format::Markdown)
    }
}
