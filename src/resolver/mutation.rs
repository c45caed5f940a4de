//! Mutation params → canonical document data
//!
//! Polymorphic positions accept two spellings:
//!
//! ```text
//! { hero: { headline: "Hi" } }              keyed by template
//! { _template: "hero", headline: "Hi" }      explicit discriminator
//! ```
//!
//! Both become `{ _template: "hero", headline: "Hi" }`.

use serde_json::{Map, Value};

use crate::database::alias::{classify, Keys, TemplateTag};
use crate::error::{Error, Result};
use crate::schema::{Field, FieldKind, FieldShape, Schema, Template, TEMPLATE_KEY};

/// Convert params for a value of `shape`; `field` names the position in errors
pub fn params_to_data(schema: &Schema, shape: &FieldShape, params: &Map<String, Value>, field: &str) -> Result<Map<String, Value>> {
    match shape {
        FieldShape::Flat { fields } => fields_to_data(schema, fields, params, field),
        FieldShape::Polymorphic { .. } => {
            let (template, values) = select_template(schema, shape, params, field)?;
            let mut data = Map::new();
            data.insert(TEMPLATE_KEY.to_string(), Value::String(template.name.clone()));
            data.extend(fields_to_data(schema, &template.fields, values, field)?);
            Ok(data)
        }
    }
}

fn select_template<'a, 'p>(
    schema: &'a Schema,
    shape: &'a FieldShape,
    params: &'p Map<String, Value>,
    field: &str,
) -> Result<(&'a Template, &'p Map<String, Value>)> {
    let no_template = || Error::NoTemplateFound {
        field: field.to_string(),
    };
    match classify(shape, params, Keys::Canonical) {
        TemplateTag::Tagged(name) => {
            let template = schema.shape_template(shape, &name).ok_or_else(no_template)?;
            Ok((template, params))
        }
        TemplateTag::Untagged => {
            let mut entries = params.iter().filter(|(_, v)| !v.is_null());
            match (entries.next(), entries.next()) {
                (Some((name, Value::Object(values))), None) => {
                    let template = schema.shape_template(shape, name).ok_or_else(no_template)?;
                    Ok((template, values))
                }
                _ => Err(no_template()),
            }
        }
    }
}

fn fields_to_data(schema: &Schema, fields: &[Field], params: &Map<String, Value>, scope: &str) -> Result<Map<String, Value>> {
    let mut data = Map::new();
    for (name, value) in params {
        if name == TEMPLATE_KEY {
            continue;
        }
        let field = fields.iter().find(|f| &f.name == name).ok_or_else(|| Error::InvalidValue {
            field: format!("{}.{}", scope, name),
            message: "unknown field".to_string(),
        })?;
        let converted = match (&field.kind, value) {
            (FieldKind::Object { shape }, Value::Object(object)) => {
                Value::Object(params_to_data(schema, shape, object, &field.name)?)
            }
            (FieldKind::Object { shape }, Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(object) => params_to_data(schema, shape, object, &field.name).map(Value::Object),
                        other => Ok(other.clone()),
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            (_, other) => other.clone(),
        };
        data.insert(field.name.clone(), converted);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, parse_source};
    use serde_json::json;

    fn schema() -> Schema {
        normalize(
            &parse_source(
                r#"
collections:
  - name: post
    path: content/posts
    fields:
      - { name: title, type: string }
      - name: blocks
        type: object
        list: true
        templates:
          - name: hero
            fields:
              - { name: headline, type: string }
          - name: quote
            fields:
              - { name: text, type: string }
"#,
                false,
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn convert(params: Value) -> Result<Map<String, Value>> {
        let schema = schema();
        let post = schema.collection("post").unwrap();
        params_to_data(&schema, &post.shape, params.as_object().unwrap(), "post")
    }

    #[test]
    fn test_keyed_by_template() {
        let data = convert(json!({
            "title": "Hi",
            "blocks": [{"hero": {"headline": "Big"}}, {"quote": {"text": "Wise"}}]
        }))
        .unwrap();
        assert_eq!(
            Value::Object(data),
            json!({
                "title": "Hi",
                "blocks": [
                    {"_template": "hero", "headline": "Big"},
                    {"_template": "quote", "text": "Wise"}
                ]
            })
        );
    }

    #[test]
    fn test_explicit_template() {
        let data = convert(json!({"blocks": [{"_template": "quote", "text": "Wise"}]})).unwrap();
        assert_eq!(data["blocks"][0], json!({"_template": "quote", "text": "Wise"}));
    }

    #[test]
    fn test_ambiguous_or_unknown_template() {
        assert!(matches!(
            convert(json!({"blocks": [{"hero": {}, "quote": {}}]})),
            Err(Error::NoTemplateFound { .. })
        ));
        assert!(matches!(
            convert(json!({"blocks": [{"banner": {}}]})),
            Err(Error::NoTemplateFound { .. })
        ));
        assert!(matches!(convert(json!({"nope": 1})), Err(Error::InvalidValue { .. })));
    }
}
