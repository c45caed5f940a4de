//! Persisted fragments and queries
//!
//! Each collection gets a `<X>Parts` fragment selecting its whole data tree
//! and two operations, `get<X>Document` and `get<X>List`, that spread it.
//! Recursive templates would give an infinite selection, so object fields
//! below [`MAX_DEPTH`] are left out.

use mdgql::{
    Definition, Document, Field as SelectionField, FragmentDefinition, InlineFragment, OperationDefinition,
    OperationType, Selection, Type, Value, VariableDefinition,
};

use super::namer;
use crate::schema::{Collection, Field, FieldKind, FieldShape, Schema};

/// Object nesting depth kept in generated fragments
pub const MAX_DEPTH: usize = 5;

/// One `<X>Parts` fragment per collection
pub fn build_fragments(schema: &Schema) -> Document {
    let definitions = schema
        .collections
        .iter()
        .map(|c| {
            Definition::Fragment(FragmentDefinition {
                name: namer::fragment_name(&c.namespace),
                type_condition: namer::type_name(&c.namespace),
                directives: Vec::new(),
                selection_set: mdgql::SelectionSet::new(shape_selections(schema, &c.shape, 0)),
            })
        })
        .collect();
    Document::new(definitions)
}

/// `get<X>Document` and `get<X>List` for every collection
pub fn build_queries(schema: &Schema) -> Document {
    let mut definitions = Vec::new();
    for collection in &schema.collections {
        definitions.push(Definition::Operation(document_query(collection)));
        definitions.push(Definition::Operation(list_query(collection)));
    }
    Document::new(definitions)
}

fn document_query(collection: &Collection) -> OperationDefinition {
    let ns = &collection.namespace;
    let name = namer::query_document_name(ns);
    let mut root = SelectionField::with_selection(name.clone(), document_selections(collection));
    root.arguments = vec![mdgql::Argument::new("relativePath", Value::Variable("relativePath".into()))];

    OperationDefinition {
        operation: OperationType::Query,
        name: Some(name),
        variable_definitions: vec![variable("relativePath", Type::named("String").non_null())],
        directives: Vec::new(),
        selection_set: mdgql::SelectionSet::new(vec![Selection::Field(root)]),
    }
}

fn list_query(collection: &Collection) -> OperationDefinition {
    let ns = &collection.namespace;
    let name = namer::query_list_name(ns);

    let variables = vec![
        variable("before", Type::named("String")),
        variable("after", Type::named("String")),
        variable("first", Type::named("Float")),
        variable("last", Type::named("Float")),
        variable("sort", Type::named("String")),
        variable("filter", Type::named(namer::filter_type_name(ns))),
    ];

    let page_info = SelectionField::with_selection(
        "pageInfo",
        ["hasPreviousPage", "hasNextPage", "startCursor", "endCursor"]
            .iter()
            .map(|f| leaf(f))
            .collect(),
    );
    let node = SelectionField::with_selection("node", document_selections(collection));
    let edges = SelectionField::with_selection("edges", vec![leaf("cursor"), Selection::Field(node)]);

    let mut root = SelectionField::with_selection(
        name.clone(),
        vec![leaf("totalCount"), Selection::Field(page_info), Selection::Field(edges)],
    );
    root.arguments = variables
        .iter()
        .map(|v| mdgql::Argument::new(v.name.clone(), Value::Variable(v.name.clone())))
        .collect();

    OperationDefinition {
        operation: OperationType::Query,
        name: Some(name),
        variable_definitions: variables,
        directives: Vec::new(),
        selection_set: mdgql::SelectionSet::new(vec![Selection::Field(root)]),
    }
}

/// `id`, `sys { ... }` and `data { ...XParts }`
fn document_selections(collection: &Collection) -> Vec<Selection> {
    let sys = SelectionField::with_selection(
        "sys",
        ["filename", "basename", "breadcrumbs", "path", "relativePath", "extension"]
            .iter()
            .map(|f| leaf(f))
            .collect(),
    );
    let data = SelectionField::with_selection(
        "data",
        vec![Selection::FragmentSpread(mdgql::FragmentSpread {
            name: namer::fragment_name(&collection.namespace),
            directives: Vec::new(),
        })],
    );
    vec![Selection::Field(sys), leaf("id"), Selection::Field(data)]
}

fn shape_selections(schema: &Schema, shape: &FieldShape, depth: usize) -> Vec<Selection> {
    let mut selections = vec![leaf("__typename")];
    match shape {
        FieldShape::Flat { fields } => selections.extend(field_selections(schema, fields, depth)),
        FieldShape::Polymorphic { .. } => {
            for template in schema.shape_templates(shape) {
                selections.push(Selection::InlineFragment(InlineFragment {
                    type_condition: Some(namer::type_name(&template.namespace)),
                    directives: Vec::new(),
                    selection_set: mdgql::SelectionSet::new(field_selections(schema, &template.fields, depth)),
                }));
            }
        }
    }
    selections
}

fn field_selections(schema: &Schema, fields: &[Field], depth: usize) -> Vec<Selection> {
    let mut selections = Vec::with_capacity(fields.len());
    for field in fields {
        match &field.kind {
            FieldKind::Reference { .. } => {
                let id = InlineFragment {
                    type_condition: Some("Document".to_string()),
                    directives: Vec::new(),
                    selection_set: mdgql::SelectionSet::new(vec![leaf("id")]),
                };
                selections.push(Selection::Field(SelectionField::with_selection(
                    field.name.clone(),
                    vec![Selection::InlineFragment(id)],
                )));
            }
            FieldKind::Object { shape } => {
                if depth + 1 >= MAX_DEPTH {
                    continue;
                }
                selections.push(Selection::Field(SelectionField::with_selection(
                    field.name.clone(),
                    shape_selections(schema, shape, depth + 1),
                )));
            }
            _ => selections.push(leaf(&field.name)),
        }
    }
    selections
}

fn leaf(name: &str) -> Selection {
    Selection::Field(SelectionField::leaf(name))
}

fn variable(name: &str, ty: Type) -> VariableDefinition {
    VariableDefinition {
        name: name.to_string(),
        ty,
        default_value: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, parse_source};

    fn schema() -> Schema {
        normalize(
            &parse_source(
                r#"
templates:
  - name: section
    fields:
      - { name: heading, type: string }
      - name: children
        type: object
        list: true
        templates: [section]
collections:
  - name: author
    path: content/authors
    fields:
      - { name: name, type: string }
  - name: post
    path: content/posts
    fields:
      - { name: title, type: string }
      - { name: author, type: reference, collections: [author] }
      - name: sections
        type: object
        list: true
        templates: [section]
"#,
                false,
            )
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_fragment_per_collection() {
        let doc = build_fragments(&schema());
        let names: Vec<_> = doc.fragments().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["AuthorParts", "PostParts"]);

        let printed = mdgql::print(&doc);
        assert!(printed.contains("fragment PostParts on Post"));
        assert!(printed.contains("... on Document"));
        assert!(printed.contains("... on Section"));
    }

    #[test]
    fn test_recursive_templates_are_cut() {
        let printed = mdgql::print(&build_fragments(&schema()));
        // sections + four levels of children, then the cut
        assert_eq!(printed.matches("children {").count(), MAX_DEPTH - 2);
    }

    #[test]
    fn test_queries_parse_back() {
        let schema = schema();
        let printed = mdgql::print(&build_queries(&schema));
        assert!(printed.contains("query getPostDocument($relativePath: String!)"));
        assert!(printed.contains("getPostList("));

        let parsed = mdgql::parse(&printed).unwrap();
        assert_eq!(parsed.operations().count(), 4);
        assert!(parsed.operation(Some("getAuthorList")).is_some());
    }
}
