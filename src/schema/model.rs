//! Normalized schema model
//!
//! Produced once by [`normalize`](super::normalize) and shared read-only
//! behind an `Arc`. Templates live in a registry keyed by id so that
//! list-recursive templates can refer to themselves.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::source::{FieldType, Format, TemplateMatch};
use crate::error::{Error, Result};

/// Key carrying the template name in polymorphic values
pub const TEMPLATE_KEY: &str = "_template";
/// Key carrying the markdown body in stored values
pub const BODY_KEY: &str = "_body";
/// Key carrying the owning collection in indexed records
pub const COLLECTION_KEY: &str = "_collection";

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub version: String,
    pub collections: Vec<Collection>,
    pub templates: BTreeMap<String, Template>,
}

impl Schema {
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn require_collection(&self, name: &str) -> Result<&Collection> {
        self.collection(name).ok_or_else(|| Error::CollectionNotFound {
            name: name.to_string(),
        })
    }

    /// The collection whose directory contains `filepath` (longest path wins)
    pub fn collection_for_path(&self, filepath: &str) -> Option<&Collection> {
        self.collections
            .iter()
            .filter(|c| c.relative_path(filepath).is_some())
            .max_by_key(|c| c.path.len())
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Templates of a polymorphic shape, in declaration order
    pub fn shape_templates<'a>(&'a self, shape: &'a FieldShape) -> Vec<&'a Template> {
        match shape {
            FieldShape::Flat { .. } => Vec::new(),
            FieldShape::Polymorphic { templates, .. } => {
                templates.iter().filter_map(|id| self.template(id)).collect()
            }
        }
    }

    /// Find the template of a polymorphic shape by its name
    pub fn shape_template<'a>(&'a self, shape: &'a FieldShape, name: &str) -> Option<&'a Template> {
        self.shape_templates(shape).into_iter().find(|t| t.name == name)
    }

    /// Flattened JSON snapshot of the schema
    pub fn snapshot(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Check required fields and option lists of canonical `data`
    pub fn validate_data(&self, collection: &Collection, template: Option<&str>, data: &Map<String, Value>) -> Result<()> {
        let fields = match &collection.shape {
            FieldShape::Flat { fields } => fields.as_slice(),
            shape @ FieldShape::Polymorphic { .. } => {
                let name = template.ok_or_else(|| Error::NoTemplateFound {
                    field: collection.name.clone(),
                })?;
                &self
                    .shape_template(shape, name)
                    .ok_or_else(|| Error::NoTemplateFound {
                        field: collection.name.clone(),
                    })?
                    .fields
            }
        };

        for field in fields {
            let value = data.get(&field.name);
            let missing = match value {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                _ => false,
            };
            if field.required && missing {
                return Err(Error::MissingRequiredField {
                    collection: collection.name.clone(),
                    field: field.name.clone(),
                });
            }
            if let Some(value) = value {
                field.check_options(value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub name: String,
    pub label: String,
    /// Directory of the collection, without trailing slash
    pub path: String,
    pub format: Format,
    pub matches: String,
    pub shape: FieldShape,
    pub indexes: Vec<IndexDefinition>,
    pub namespace: Vec<String>,
}

impl Collection {
    /// Glob selecting every document of the collection
    pub fn glob_pattern(&self) -> String {
        format!("{}/{}.{}", self.path, self.matches, self.format.extension())
    }

    /// Path of `filepath` inside this collection, if it belongs to it
    pub fn relative_path<'a>(&self, filepath: &'a str) -> Option<&'a str> {
        if self.path.is_empty() {
            return Some(filepath);
        }
        filepath
            .strip_prefix(self.path.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Full path of a document from its relative path
    pub fn filepath(&self, relative_path: &str) -> String {
        if self.path.is_empty() {
            relative_path.to_string()
        } else {
            format!("{}/{}", self.path, relative_path)
        }
    }

    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self.shape, FieldShape::Polymorphic { .. })
    }
}

/// The field structure of a collection or object field
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldShape {
    Flat { fields: Vec<Field> },
    Polymorphic {
        /// Template ids, in declaration order
        templates: Vec<String>,
        /// Key that carries the template name in stored values
        key: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub label: String,
    pub fields: Vec<Field>,
    pub namespace: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<TemplateMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub label: String,
    pub description: Option<String>,
    pub kind: FieldKind,
    pub list: bool,
    pub required: bool,
    pub options: Vec<String>,
    pub is_title: bool,
    pub is_body: bool,
    pub namespace: Vec<String>,
}

impl Field {
    /// Key used for this field in stored values
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn field_type(&self) -> FieldType {
        match &self.kind {
            FieldKind::String => FieldType::String,
            FieldKind::Number => FieldType::Number,
            FieldKind::Boolean => FieldType::Boolean,
            FieldKind::Datetime => FieldType::Datetime,
            FieldKind::Image => FieldType::Image,
            FieldKind::RichText => FieldType::RichText,
            FieldKind::Reference { .. } => FieldType::Reference,
            FieldKind::Object { .. } => FieldType::Object,
        }
    }

    pub fn shape(&self) -> Option<&FieldShape> {
        match &self.kind {
            FieldKind::Object { shape } => Some(shape),
            _ => None,
        }
    }

    fn check_options(&self, value: &Value) -> Result<()> {
        if self.options.is_empty() {
            return Ok(());
        }
        let allowed = |v: &Value| match v {
            Value::String(s) => self.options.iter().any(|o| o == s),
            Value::Number(n) => self.options.iter().any(|o| o == &n.to_string()),
            Value::Null => true,
            _ => false,
        };
        let ok = match value {
            Value::Array(items) if self.list => items.iter().all(allowed),
            other => allowed(other),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidValue {
                field: self.name.clone(),
                message: format!("expected one of [{}]", self.options.join(", ")),
            })
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Datetime,
    Image,
    RichText,
    Reference { collections: Vec<String> },
    Object { shape: FieldShape },
}

/// An ordered composite index over top-level fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<IndexField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
}

impl IndexDefinition {
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == field)
    }
}
