//! GraphQL filter arguments → store filter conditions
//!
//! ```text
//! { title: { eq: "A" }, seo: { author: { startsWith: "J" } } }
//!     ──▶ title {eq}            seo.author {startsWith}
//!
//! { blocks: { hero: { headline: { eq: "Hi" } } } }
//!     ──▶ blocks[?(@._template=="hero")].headline {eq}
//! ```
//!
//! At the top of a polymorphic collection the template key selects the
//! template's fields and adds an `_template` equality condition.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::{Collection, Field, FieldKind, FieldShape, FieldType, Schema, TEMPLATE_KEY};
use crate::store::FilterCondition;

/// Flatten a `<X>Filter` argument of `collection`
pub fn filter_conditions(schema: &Schema, collection: &Collection, filter: &Value) -> Result<Vec<FilterCondition>> {
    let filter = match filter {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => return Err(Error::invalid_filter(format!("Expected a filter object, got {}", other))),
    };

    let mut conditions = Vec::new();
    match &collection.shape {
        FieldShape::Flat { fields } => walk_fields(schema, fields, filter, "", &mut conditions)?,
        shape @ FieldShape::Polymorphic { .. } => {
            for (name, nested) in filter {
                let template = schema.shape_template(shape, name).ok_or_else(|| {
                    Error::invalid_filter(format!(
                        "Unknown template '{}' in filter on collection '{}'",
                        name, collection.name
                    ))
                })?;
                let nested = as_object(nested, name)?;
                let mut eq = Map::new();
                eq.insert("eq".to_string(), Value::String(template.name.clone()));
                conditions.push(FilterCondition::new(TEMPLATE_KEY, FieldType::String, eq));
                walk_fields(schema, &template.fields, nested, "", &mut conditions)?;
            }
        }
    }
    Ok(conditions)
}

fn walk_fields(
    schema: &Schema,
    fields: &[Field],
    filter: &Map<String, Value>,
    prefix: &str,
    out: &mut Vec<FilterCondition>,
) -> Result<()> {
    for (name, expression) in filter {
        if expression.is_null() {
            continue;
        }
        let field = fields
            .iter()
            .find(|f| &f.name == name)
            .ok_or_else(|| Error::invalid_filter(format!("Unknown field '{}' in filter", join(prefix, name))))?;
        let path = join(prefix, &field.name);
        let expression = as_object(expression, &path)?;

        match &field.kind {
            FieldKind::Object { shape } => walk_shape(schema, shape, expression, &path, out)?,
            _ => out.push(FilterCondition::new(path, field.field_type(), expression.clone())),
        }
    }
    Ok(())
}

fn walk_shape(
    schema: &Schema,
    shape: &FieldShape,
    filter: &Map<String, Value>,
    path: &str,
    out: &mut Vec<FilterCondition>,
) -> Result<()> {
    match shape {
        FieldShape::Flat { fields } => walk_fields(schema, fields, filter, path, out),
        FieldShape::Polymorphic { .. } => {
            for (name, nested) in filter {
                if nested.is_null() {
                    continue;
                }
                let template = schema.shape_template(shape, name).ok_or_else(|| {
                    Error::invalid_filter(format!("Unknown template '{}' in filter on '{}'", name, path))
                })?;
                let scoped = format!("{}[?(@.{}==\"{}\")]", path, TEMPLATE_KEY, template.name);
                walk_fields(schema, &template.fields, as_object(nested, &scoped)?, &scoped, out)?;
            }
            Ok(())
        }
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::invalid_filter(format!("Filter on '{}' must be an object", path)))
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
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
      - { name: date, type: datetime }
      - name: seo
        type: object
        fields:
          - { name: rating, type: number }
      - name: blocks
        type: object
        list: true
        templates:
          - name: hero
            fields:
              - { name: headline, type: string }
  - name: page
    path: content/pages
    templates:
      - name: landing
        fields:
          - { name: headline, type: string }
"#,
                false,
            )
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_flat_and_nested_fields() {
        let schema = schema();
        let post = schema.collection("post").unwrap();
        let filter = json!({
            "title": {"eq": "A"},
            "date": {"after": "2023-01-01", "before": "2024-01-01"},
            "seo": {"rating": {"gte": 3}},
        });
        let conditions = filter_conditions(&schema, post, &filter).unwrap();
        let paths: Vec<_> = conditions.iter().map(|c| c.filter_path.as_str()).collect();
        assert_eq!(paths, vec!["title", "date", "seo.rating"]);
        assert_eq!(conditions[1].filter_expression["_type"], "datetime");
        assert_eq!(conditions[2].filter_expression["_type"], "number");
    }

    #[test]
    fn test_polymorphic_field_is_scoped() {
        let schema = schema();
        let post = schema.collection("post").unwrap();
        let filter = json!({"blocks": {"hero": {"headline": {"eq": "Hi"}}}});
        let conditions = filter_conditions(&schema, post, &filter).unwrap();
        assert_eq!(conditions[0].filter_path, "blocks[?(@._template==\"hero\")].headline");
    }

    #[test]
    fn test_polymorphic_collection_adds_template_condition() {
        let schema = schema();
        let page = schema.collection("page").unwrap();
        let filter = json!({"landing": {"headline": {"startsWith": "H"}}});
        let conditions = filter_conditions(&schema, page, &filter).unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].filter_path, "_template");
        assert_eq!(conditions[0].filter_expression["eq"], "landing");
        assert_eq!(conditions[1].filter_path, "headline");
    }

    #[test]
    fn test_unknown_field() {
        let schema = schema();
        let post = schema.collection("post").unwrap();
        let err = filter_conditions(&schema, post, &json!({"nope": {"eq": 1}})).unwrap_err();
        assert!(matches!(err, Error::InvalidFilter { .. }));
        assert!(filter_conditions(&schema, post, &Value::Null).unwrap().is_empty());
    }
}
