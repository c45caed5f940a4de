//! Translation between stored keys and canonical field names
//!
//! Stored values use each field's alias (or name) and carry a template name
//! under the discriminator key of their polymorphic scope. Canonical values
//! use field names and always carry the template under `_template`. Both
//! directions walk the schema recursively. Keys the schema does not know
//! are passed through untouched.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::{Field, FieldShape, Schema, Template, TEMPLATE_KEY};

/// Whether a value names the template it follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateTag {
    Tagged(String),
    Untagged,
}

/// Which key set a value uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keys {
    Stored,
    Canonical,
}

/// Read the template tag of `value` within `shape`
pub fn classify(shape: &FieldShape, value: &Map<String, Value>, keys: Keys) -> TemplateTag {
    let key = match (shape, keys) {
        (FieldShape::Flat { .. }, _) => return TemplateTag::Untagged,
        (FieldShape::Polymorphic { key, .. }, Keys::Stored) => key.as_str(),
        (FieldShape::Polymorphic { .. }, Keys::Canonical) => TEMPLATE_KEY,
    };
    match value.get(key).and_then(Value::as_str) {
        Some(name) => TemplateTag::Tagged(name.to_string()),
        None => TemplateTag::Untagged,
    }
}

/// The template of a polymorphic `value`, or `NoTemplateFound`
pub fn template_for_data<'a>(
    schema: &'a Schema,
    shape: &'a FieldShape,
    value: &Map<String, Value>,
    keys: Keys,
    field: &str,
) -> Result<&'a Template> {
    match classify(shape, value, keys) {
        TemplateTag::Tagged(name) => schema.shape_template(shape, &name).ok_or_else(|| Error::NoTemplateFound {
            field: field.to_string(),
        }),
        TemplateTag::Untagged => Err(Error::NoTemplateFound {
            field: field.to_string(),
        }),
    }
}

/// Stored keys → canonical names
pub fn replace_aliases_with_names(
    schema: &Schema,
    shape: &FieldShape,
    values: &Map<String, Value>,
    field: &str,
) -> Result<Map<String, Value>> {
    match shape {
        FieldShape::Flat { fields } => fields_to_names(schema, fields, values, None),
        FieldShape::Polymorphic { key, .. } => {
            let template = template_for_data(schema, shape, values, Keys::Stored, field)?;
            let mut out = Map::new();
            out.insert(TEMPLATE_KEY.to_string(), Value::String(template.name.clone()));
            out.extend(fields_to_names(schema, &template.fields, values, Some(key))?);
            Ok(out)
        }
    }
}

/// Canonical names → stored keys
pub fn replace_keys_with_aliases(
    schema: &Schema,
    shape: &FieldShape,
    data: &Map<String, Value>,
    field: &str,
) -> Result<Map<String, Value>> {
    match shape {
        FieldShape::Flat { fields } => fields_to_aliases(schema, fields, data, None),
        FieldShape::Polymorphic { key, .. } => {
            let template = template_for_data(schema, shape, data, Keys::Canonical, field)?;
            let mut out = Map::new();
            out.insert(key.clone(), Value::String(template.name.clone()));
            out.extend(fields_to_aliases(schema, &template.fields, data, Some(TEMPLATE_KEY))?);
            Ok(out)
        }
    }
}

fn fields_to_names(
    schema: &Schema,
    fields: &[Field],
    values: &Map<String, Value>,
    discriminator: Option<&str>,
) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in values {
        if Some(key.as_str()) == discriminator {
            continue;
        }
        match fields.iter().find(|f| f.key() == key && f.name != TEMPLATE_KEY) {
            Some(field) => {
                let converted = convert(schema, field, value, replace_aliases_with_names)?;
                out.insert(field.name.clone(), converted);
            }
            None => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(out)
}

fn fields_to_aliases(
    schema: &Schema,
    fields: &[Field],
    data: &Map<String, Value>,
    discriminator: Option<&str>,
) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for (name, value) in data {
        if Some(name.as_str()) == discriminator {
            continue;
        }
        match fields.iter().find(|f| &f.name == name && f.name != TEMPLATE_KEY) {
            Some(field) => {
                let converted = convert(schema, field, value, replace_keys_with_aliases)?;
                out.insert(field.key().to_string(), converted);
            }
            None => {
                out.insert(name.clone(), value.clone());
            }
        }
    }
    Ok(out)
}

type ShapeTransform = fn(&Schema, &FieldShape, &Map<String, Value>, &str) -> Result<Map<String, Value>>;

fn convert(schema: &Schema, field: &Field, value: &Value, transform: ShapeTransform) -> Result<Value> {
    let shape = match field.shape() {
        Some(shape) => shape,
        None => return Ok(value.clone()),
    };
    let one = |v: &Value| -> Result<Value> {
        match v {
            Value::Object(map) => Ok(Value::Object(transform(schema, shape, map, &field.name)?)),
            other => Ok(other.clone()),
        }
    };
    match value {
        Value::Array(items) => Ok(Value::Array(items.iter().map(one).collect::<Result<_>>()?)),
        other => one(other),
    }
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
  - name: page
    path: content/pages
    fields:
      - name: title
        type: string
        alias: heading
      - name: blocks
        type: object
        list: true
        templates:
          - name: hero
            fields:
              - { name: _template, type: string, alias: kind }
              - { name: headline, type: string, alias: head }
              - name: cta
                type: object
                fields:
                  - { name: label, type: string, alias: text }
          - name: quote
            fields:
              - { name: author, type: string }
      - name: body
        type: rich-text
        isBody: true
"#,
            false,
        )
        .unwrap();
        normalize(&source).unwrap()
    }

    fn page_shape(schema: &Schema) -> &FieldShape {
        &schema.collection("page").unwrap().shape
    }

    #[test]
    fn test_aliases_to_names() {
        let schema = schema();
        let stored = json!({
            "heading": "Welcome",
            "blocks": [
                {"kind": "hero", "head": "Big", "cta": {"text": "Go"}},
                {"kind": "quote", "author": "Ann"}
            ],
            "_body": "Hello",
            "extra": 1
        });
        let data = replace_aliases_with_names(&schema, page_shape(&schema), stored.as_object().unwrap(), "page")
            .unwrap();
        assert_eq!(
            Value::Object(data),
            json!({
                "title": "Welcome",
                "blocks": [
                    {"_template": "hero", "headline": "Big", "cta": {"label": "Go"}},
                    {"_template": "quote", "author": "Ann"}
                ],
                "body": "Hello",
                "extra": 1
            })
        );
    }

    #[test]
    fn test_round_trip() {
        let schema = schema();
        let shape = page_shape(&schema);
        let data = json!({
            "title": "Welcome",
            "blocks": [
                {"_template": "hero", "headline": "Big", "cta": {"label": "Go"}},
                {"_template": "quote", "author": "Ann"}
            ],
            "body": "Hello"
        });
        let data = data.as_object().unwrap();
        let stored = replace_keys_with_aliases(&schema, shape, data, "page").unwrap();
        assert_eq!(stored["blocks"][0]["kind"], "hero");
        assert_eq!(stored["_body"], "Hello");
        let back = replace_aliases_with_names(&schema, shape, &stored, "page").unwrap();
        assert_eq!(&back, data);
    }

    #[test]
    fn test_unknown_template_is_an_error() {
        let schema = schema();
        let stored = json!({"blocks": [{"kind": "video"}]});
        let err = replace_aliases_with_names(&schema, page_shape(&schema), stored.as_object().unwrap(), "page")
            .unwrap_err();
        assert_eq!(err.to_string(), "No template found for field blocks");
    }

    #[test]
    fn test_classify() {
        let schema = schema();
        let blocks = match page_shape(&schema) {
            FieldShape::Flat { fields } => fields.iter().find(|f| f.name == "blocks").unwrap().shape().unwrap(),
            _ => unreachable!(),
        };
        let tagged = json!({"kind": "hero"});
        assert_eq!(
            classify(blocks, tagged.as_object().unwrap(), Keys::Stored),
            TemplateTag::Tagged("hero".into())
        );
        assert_eq!(
            classify(blocks, tagged.as_object().unwrap(), Keys::Canonical),
            TemplateTag::Untagged
        );
        assert_eq!(
            classify(page_shape(&schema), tagged.as_object().unwrap(), Keys::Stored),
            TemplateTag::Untagged
        );
    }
}
