//! Documents and their on-disk formats
//!
//! A document is read from its bridge path, parsed by the file's actual
//! extension and translated into canonical data:
//!
//! ```text
//! content/posts/hello.md ──parse──▶ values (stored keys) ──aliases──▶ data (field names)
//! ```
//!
//! Writing goes the other way and always uses the collection's format.

use serde::Serialize;
use serde_json::{Map, Value};

use super::alias::{replace_aliases_with_names, replace_keys_with_aliases};
use super::frontmatter;
use crate::error::{Error, Result};
use crate::schema::{Collection, Format, Schema, BODY_KEY, TEMPLATE_KEY};

/// Metadata derived from a document's location
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// File name without extension
    pub filename: String,
    /// File name with extension
    pub basename: String,
    /// Relative path segments, extension stripped from the last one
    pub breadcrumbs: Vec<String>,
    pub path: String,
    pub relative_path: String,
    /// Extension including the dot
    pub extension: String,
    pub template: String,
    pub collection: String,
}

impl SystemInfo {
    pub fn new(collection: &Collection, filepath: &str, template: &str) -> Self {
        let relative_path = collection.relative_path(filepath).unwrap_or(filepath).to_string();
        let basename = relative_path.rsplit('/').next().unwrap_or(&relative_path).to_string();
        let (filename, extension) = match basename.rfind('.') {
            Some(dot) if dot > 0 => (basename[..dot].to_string(), basename[dot..].to_string()),
            _ => (basename.clone(), String::new()),
        };
        let mut breadcrumbs: Vec<String> = relative_path.split('/').map(str::to_string).collect();
        if let Some(last) = breadcrumbs.last_mut() {
            *last = filename.clone();
        }
        Self {
            filename,
            basename,
            breadcrumbs,
            path: filepath.to_string(),
            relative_path,
            extension,
            template: template.to_string(),
            collection: collection.name.clone(),
        }
    }

    /// Breadcrumbs, optionally keeping the extension on the last segment
    pub fn breadcrumbs(&self, exclude_extension: bool) -> Vec<String> {
        if exclude_extension {
            return self.breadcrumbs.clone();
        }
        let mut crumbs = self.breadcrumbs.clone();
        if let Some(last) = crumbs.last_mut() {
            last.push_str(&self.extension);
        }
        crumbs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Root-relative path of the file
    pub id: String,
    pub sys: SystemInfo,
    /// Values as stored, keyed by alias
    pub values: Map<String, Value>,
    /// Values keyed by field name, polymorphic nodes tagged with `_template`
    pub data: Map<String, Value>,
}

impl Document {
    /// Parse raw file content into a document of `collection`
    pub fn parse(schema: &Schema, collection: &Collection, filepath: &str, content: &str) -> Result<Self> {
        let actual = extension_of(filepath).and_then(Format::from_extension);
        if !format_matches(actual, collection.format) {
            tracing::warn!(
                path = filepath,
                expected = collection.format.extension(),
                "document extension does not match the collection format"
            );
        }

        let values = parse_content(filepath, content)?;
        let data = replace_aliases_with_names(schema, &collection.shape, &values, &collection.name)?;
        let template = data
            .get(TEMPLATE_KEY)
            .and_then(Value::as_str)
            .unwrap_or(&collection.name)
            .to_string();

        Ok(Self {
            id: filepath.to_string(),
            sys: SystemInfo::new(collection, filepath, &template),
            values,
            data,
        })
    }

    /// Canonical data plus the keys the store indexes by
    pub fn record(&self) -> Value {
        let mut record = self.data.clone();
        record.insert(crate::schema::COLLECTION_KEY.to_string(), Value::String(self.sys.collection.clone()));
        record
            .entry(TEMPLATE_KEY.to_string())
            .or_insert_with(|| Value::String(self.sys.template.clone()));
        Value::Object(record)
    }
}

/// Serialize canonical `data` for the file at `filepath`
///
/// The file's own extension decides the format so documents that do not
/// match their collection format keep theirs. Unknown extensions fall back
/// to the collection format.
pub fn serialize(schema: &Schema, collection: &Collection, filepath: &str, data: &Map<String, Value>) -> Result<String> {
    let values = replace_keys_with_aliases(schema, &collection.shape, data, &collection.name)?;
    let format = extension_of(filepath)
        .and_then(Format::from_extension)
        .unwrap_or(collection.format);
    stringify_content(format, &values)
}

fn extension_of(filepath: &str) -> Option<&str> {
    let name = filepath.rsplit('/').next()?;
    name.rsplit_once('.').map(|(_, ext)| ext)
}

fn format_matches(actual: Option<Format>, expected: Format) -> bool {
    fn family(format: Format) -> &'static str {
        match format {
            Format::Md | Format::Markdown => "md",
            Format::Yaml | Format::Yml => "yaml",
            other => other.extension(),
        }
    }
    actual.map(|a| family(a) == family(expected)).unwrap_or(false)
}

/// Parse file content into stored values, choosing the parser by extension
pub fn parse_content(filepath: &str, content: &str) -> Result<Map<String, Value>> {
    let format = extension_of(filepath)
        .and_then(Format::from_extension)
        .ok_or_else(|| Error::unsupported(format!("reading {}", filepath)))?;

    match format {
        Format::Md | Format::Mdx | Format::Markdown => {
            let (mut values, body) = frontmatter::parse(content)?;
            values.insert(BODY_KEY.to_string(), Value::String(body));
            Ok(values)
        }
        Format::Json => as_object(serde_json::from_str(content)?, filepath),
        Format::Yaml | Format::Yml => {
            if content.trim().is_empty() {
                return Ok(Map::new());
            }
            as_object(frontmatter::yaml_to_json(serde_yaml::from_str(content)?)?, filepath)
        }
        Format::Toml => as_object(toml_to_json(toml::from_str(content)?), filepath),
    }
}

/// Render stored values in `format`
pub fn stringify_content(format: Format, values: &Map<String, Value>) -> Result<String> {
    match format {
        Format::Md | Format::Mdx | Format::Markdown => {
            let mut fields = values.clone();
            let body = match fields.remove(BODY_KEY) {
                Some(Value::String(body)) => body,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            frontmatter::render(&fields, &body)
        }
        Format::Json => Ok(format!("{}\n", serde_json::to_string_pretty(values)?)),
        Format::Yaml | Format::Yml => Ok(serde_yaml::to_string(values)?),
        Format::Toml => Ok(toml::to_string_pretty(&strip_nulls(values))?),
    }
}

fn as_object(value: Value, filepath: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(Error::ParseError {
            message: format!("{} does not contain an object", filepath),
        }),
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect()),
    }
}

/// TOML has no null
fn strip_nulls(values: &Map<String, Value>) -> Map<String, Value> {
    values
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let v = match v {
                Value::Object(map) => Value::Object(strip_nulls(map)),
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .filter(|i| !i.is_null())
                        .map(|i| match i {
                            Value::Object(map) => Value::Object(strip_nulls(map)),
                            other => other.clone(),
                        })
                        .collect(),
                ),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, parse_source};
    use serde_json::json;

    fn schema() -> Schema {
        let source = parse_source(
            r#"
collections:
  - name: post
    path: content/posts
    fields:
      - { name: title, type: string }
      - { name: body, type: rich-text, isBody: true }
  - name: setting
    path: content/settings
    format: toml
    fields:
      - { name: theme, type: string }
      - { name: count, type: number }
"#,
            false,
        )
        .unwrap();
        normalize(&source).unwrap()
    }

    #[test]
    fn test_system_info() {
        let schema = schema();
        let post = schema.collection("post").unwrap();
        let sys = SystemInfo::new(post, "content/posts/2023/hello.md", "post");
        assert_eq!(sys.filename, "hello");
        assert_eq!(sys.basename, "hello.md");
        assert_eq!(sys.extension, ".md");
        assert_eq!(sys.relative_path, "2023/hello.md");
        assert_eq!(sys.breadcrumbs, vec!["2023", "hello"]);
        assert_eq!(sys.breadcrumbs(false), vec!["2023", "hello.md"]);
    }

    #[test]
    fn test_parse_markdown_document() {
        let schema = schema();
        let post = schema.collection("post").unwrap();
        let doc = Document::parse(&schema, post, "content/posts/hello.md", "---\ntitle: Hello\n---\n\nBody text\n")
            .unwrap();
        assert_eq!(doc.data.get("title"), Some(&json!("Hello")));
        assert_eq!(doc.data.get("body"), Some(&json!("Body text\n")));
        assert_eq!(doc.values.get("_body"), Some(&json!("Body text\n")));
        assert_eq!(doc.sys.template, "post");

        let record = doc.record();
        assert_eq!(record["_collection"], "post");
        assert_eq!(record["_template"], "post");
    }

    #[test]
    fn test_serialize_uses_collection_format() {
        let schema = schema();
        let post = schema.collection("post").unwrap();
        let data = json!({"title": "Hi", "body": "Text\n"});
        let content = serialize(&schema, post, "content/posts/hi.md", data.as_object().unwrap()).unwrap();
        assert_eq!(content, "---\ntitle: Hi\n---\n\nText\n");

        let setting = schema.collection("setting").unwrap();
        let data = json!({"theme": "dark", "count": 3, "missing": null});
        let content = serialize(&schema, setting, "content/settings/site.toml", data.as_object().unwrap()).unwrap();
        let parsed = parse_content("content/settings/site.toml", &content).unwrap();
        assert_eq!(parsed.get("theme"), Some(&json!("dark")));
        assert_eq!(parsed.get("count"), Some(&json!(3)));
        assert!(parsed.get("missing").is_none());
    }

    #[test]
    fn test_mismatched_extension_still_parses() {
        let schema = schema();
        let post = schema.collection("post").unwrap();
        let doc = Document::parse(&schema, post, "content/posts/legacy.json", r#"{"title": "Old"}"#).unwrap();
        assert_eq!(doc.data.get("title"), Some(&json!("Old")));
        assert_eq!(doc.sys.extension, ".json");
    }

    #[test]
    fn test_serialize_keeps_file_format() {
        let schema = schema();
        let post = schema.collection("post").unwrap();
        let data = json!({"title": "New"});

        let content = serialize(&schema, post, "content/posts/legacy.json", data.as_object().unwrap()).unwrap();
        let doc = Document::parse(&schema, post, "content/posts/legacy.json", &content).unwrap();
        assert_eq!(doc.data.get("title"), Some(&json!("New")));
        assert!(!content.starts_with("---"));

        let content = serialize(&schema, post, "content/posts/notes", data.as_object().unwrap()).unwrap();
        assert_eq!(content, "---\ntitle: New\n---\n");
    }

    #[test]
    fn test_unknown_extension() {
        assert!(matches!(
            parse_content("content/posts/image.png", ""),
            Err(Error::Unsupported { .. })
        ));
    }
}
