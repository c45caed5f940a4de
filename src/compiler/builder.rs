//! GraphQL type-system AST for a schema
//!
//! The output has three layers:
//! - static definitions shared by every schema (scalars, `SystemInfo`,
//!   `PageInfo`, the `Node`/`Document`/`Connection` interfaces, filter inputs)
//! - per-collection types derived from the field tree
//! - cross-collection types and the `Query`/`Mutation` roots
//!
//! Nested types can be reached from several places (a global template used
//! by two collections), so definitions are de-duplicated by name, first wins.

use std::collections::HashSet;

use mdgql::{
    Definition, Document, FieldDefinition, InputObjectTypeDefinition, InputValueDefinition,
    InterfaceTypeDefinition, ObjectTypeDefinition, ScalarTypeDefinition, Type, UnionTypeDefinition,
};

use super::namer;
use crate::schema::{Collection, Field, FieldKind, FieldShape, Schema, Template};

/// Build the type-system document for `schema`
pub fn build_schema_ast(schema: &Schema) -> Document {
    let mut builder = Builder::new(schema);
    builder.static_definitions();
    for collection in &schema.collections {
        builder.collection(collection);
    }
    builder.cross_collection();
    builder.query();
    builder.mutation();
    Document::new(uniq_by_name(builder.definitions))
}

/// Keep the first definition of each name
pub fn uniq_by_name(definitions: Vec<Definition>) -> Vec<Definition> {
    let mut seen = HashSet::new();
    definitions
        .into_iter()
        .filter(|d| match d.name() {
            Some(name) => seen.insert(name.to_string()),
            None => true,
        })
        .collect()
}

struct Builder<'s> {
    schema: &'s Schema,
    definitions: Vec<Definition>,
    /// Templates already emitted, so list-recursive templates terminate
    templates: HashSet<String>,
}

impl<'s> Builder<'s> {
    fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            definitions: Vec::new(),
            templates: HashSet::new(),
        }
    }

    // ========================================================================
    // Static definitions
    // ========================================================================

    fn static_definitions(&mut self) {
        self.scalar("Reference", "References another document, used as a foreign key");
        self.scalar("JSON", "Arbitrary JSON");

        self.object(
            "SystemInfo",
            &[],
            vec![
                field("filename", non_null("String")),
                field("basename", non_null("String")),
                field("breadcrumbs", non_null_list("String"))
                    .with_arguments(vec![arg("excludeExtension", named("Boolean"))]),
                field("path", non_null("String")),
                field("relativePath", non_null("String")),
                field("extension", non_null("String")),
                field("template", non_null("String")),
                field("collection", non_null("Collection")),
            ],
        );

        self.object(
            "PageInfo",
            &[],
            vec![
                field("hasPreviousPage", non_null("Boolean")),
                field("hasNextPage", non_null("Boolean")),
                field("startCursor", non_null("String")),
                field("endCursor", non_null("String")),
            ],
        );

        self.interface("Node", vec![field("id", non_null("ID"))]);
        self.interface("Document", document_interface_fields());
        self.interface(
            "Connection",
            vec![
                field("totalCount", non_null("Float")),
                field("pageInfo", non_null("PageInfo")),
            ],
        );

        self.object(
            "Collection",
            &[],
            vec![
                field("name", non_null("String")),
                field("slug", non_null("String")),
                field("label", named("String")),
                field("path", non_null("String")),
                field("format", named("String")),
                field("matches", named("String")),
                field("templates", Type::named("JSON").list()),
                field("fields", Type::named("JSON").list()),
                field("documents", non_null("DocumentConnection")).with_arguments(list_arguments(None)),
            ],
        );

        self.input(
            "StringFilter",
            vec![
                arg("startsWith", named("String")),
                arg("eq", named("String")),
                arg("in", Type::named("String").list()),
            ],
        );
        self.input(
            "NumberFilter",
            vec![
                arg("lt", named("Float")),
                arg("lte", named("Float")),
                arg("gte", named("Float")),
                arg("gt", named("Float")),
                arg("eq", named("Float")),
                arg("in", Type::named("Float").list()),
            ],
        );
        self.input(
            "DatetimeFilter",
            vec![
                arg("after", named("String")),
                arg("before", named("String")),
                arg("gt", named("String")),
                arg("gte", named("String")),
                arg("lt", named("String")),
                arg("lte", named("String")),
                arg("eq", named("String")),
                arg("in", Type::named("String").list()),
            ],
        );
        self.input("BooleanFilter", vec![arg("eq", named("Boolean"))]);
        self.input(
            "ImageFilter",
            vec![
                arg("startsWith", named("String")),
                arg("eq", named("String")),
                arg("in", Type::named("String").list()),
            ],
        );
        self.input(
            "RichTextFilter",
            vec![arg("startsWith", named("String")), arg("eq", named("String"))],
        );
    }

    // ========================================================================
    // Per-collection types
    // ========================================================================

    fn collection(&mut self, collection: &Collection) {
        let ns = &collection.namespace;
        let data = self.shape(&collection.shape, ns);

        let document = namer::document_type_name(ns);
        let mut fields = vec![field("id", non_null("ID")), field("sys", non_null("SystemInfo"))];
        fields.push(field("data", non_null(&data)));
        fields.extend(document_interface_fields().into_iter().filter(|f| f.name != "id" && f.name != "sys"));
        self.object(&document, &["Node", "Document"], fields);

        let edges = namer::connection_edges_type_name(ns);
        self.object(
            &edges,
            &[],
            vec![field("cursor", non_null("String")), field("node", named(&document))],
        );
        self.object(&namer::connection_type_name(ns), &["Connection"], connection_fields(&edges));
    }

    /// Emit the output, filter and mutation types of a shape; returns the output type name
    fn shape(&mut self, shape: &FieldShape, namespace: &[String]) -> String {
        let name = namer::type_name(namespace);
        match shape {
            FieldShape::Flat { fields } => {
                self.field_set(&name, namespace, fields);
            }
            FieldShape::Polymorphic { .. } => {
                let templates = self.schema.shape_templates(shape);
                let mut members = Vec::with_capacity(templates.len());
                let mut filters = Vec::with_capacity(templates.len());
                let mut mutations = Vec::with_capacity(templates.len());
                for template in templates {
                    self.template(template);
                    members.push(namer::type_name(&template.namespace));
                    filters.push(arg(&template.name, named(&namer::filter_type_name(&template.namespace))));
                    mutations.push(arg(&template.name, named(&namer::mutation_type_name(&template.namespace))));
                }
                self.union(&name, members);
                self.input(&namer::filter_type_name(namespace), filters);
                self.input(&namer::mutation_type_name(namespace), mutations);
            }
        }
        name
    }

    fn template(&mut self, template: &Template) {
        if !self.templates.insert(template.id.clone()) {
            return;
        }
        let name = namer::type_name(&template.namespace);
        self.field_set(&name, &template.namespace, &template.fields);
    }

    /// Object type plus its filter and mutation inputs
    fn field_set(&mut self, name: &str, namespace: &[String], fields: &[Field]) {
        let outputs = fields
            .iter()
            .map(|f| FieldDefinition::new(f.name.clone(), self.output_type(f)))
            .collect();
        self.object(name, &[], outputs);

        let filters = fields
            .iter()
            .map(|f| arg(&f.name, named(&filter_type(f))))
            .collect();
        self.input(&namer::filter_type_name(namespace), filters);

        let mutations = fields.iter().map(|f| arg(&f.name, mutation_type(f))).collect();
        self.input(&namer::mutation_type_name(namespace), mutations);
    }

    fn output_type(&mut self, field: &Field) -> Type {
        let name = match &field.kind {
            FieldKind::Reference { collections } => {
                let name = namer::reference_type_name(&field.namespace);
                let members = collections
                    .iter()
                    .filter_map(|c| self.schema.collection(c))
                    .map(|c| namer::document_type_name(&c.namespace))
                    .collect();
                self.union(&name, members);
                name
            }
            FieldKind::Object { shape } => self.shape(shape, &field.namespace),
            other => scalar_name(other).to_string(),
        };
        let ty = Type::named(name);
        if field.list {
            ty.list()
        } else {
            ty
        }
    }

    // ========================================================================
    // Cross-collection types and roots
    // ========================================================================

    fn cross_collection(&mut self) {
        let documents: Vec<String> = self
            .schema
            .collections
            .iter()
            .map(|c| namer::document_type_name(&c.namespace))
            .collect();
        self.union("DocumentNode", documents);

        self.object(
            "DocumentConnectionEdges",
            &[],
            vec![field("cursor", non_null("String")), field("node", named("DocumentNode"))],
        );
        self.object("DocumentConnection", &["Connection"], connection_fields("DocumentConnectionEdges"));

        let params = self
            .schema
            .collections
            .iter()
            .map(|c| arg(&c.name, named(&namer::mutation_type_name(&c.namespace))))
            .collect();
        self.input("DocumentMutation", params);
    }

    fn query(&mut self) {
        let mut fields = vec![
            field("getCollection", non_null("Collection")).with_arguments(vec![arg("collection", named("String"))]),
            field("getCollections", Type::named("Collection").non_null().list().non_null()),
            field("node", non_null("Node")).with_arguments(vec![arg("id", named("String"))]),
            field("getDocument", non_null("DocumentNode"))
                .with_arguments(vec![arg("collection", named("String")), arg("relativePath", named("String"))]),
            field("getDocumentList", non_null("DocumentConnection")).with_arguments(list_arguments(None)),
            field("getDocumentFields", non_null("JSON")),
        ];
        for collection in &self.schema.collections {
            let ns = &collection.namespace;
            fields.push(
                field(&namer::query_document_name(ns), non_null(&namer::document_type_name(ns)))
                    .with_arguments(vec![arg("relativePath", named("String"))]),
            );
            fields.push(
                field(&namer::query_list_name(ns), non_null(&namer::connection_type_name(ns)))
                    .with_arguments(list_arguments(Some(namer::filter_type_name(ns)))),
            );
        }
        self.object("Query", &[], fields);
    }

    fn mutation(&mut self) {
        let path_args = || vec![arg("collection", named("String")), arg("relativePath", non_null("String"))];
        let with_params = |mut args: Vec<InputValueDefinition>, params: &str| {
            args.push(arg("params", non_null(params)));
            args
        };

        let mut fields = vec![
            field("addPendingDocument", non_null("DocumentNode")).with_arguments(vec![
                arg("collection", non_null("String")),
                arg("relativePath", non_null("String")),
                arg("template", named("String")),
            ]),
            field("updateDocument", non_null("DocumentNode"))
                .with_arguments(with_params(path_args(), "DocumentMutation")),
            field("deleteDocument", non_null("DocumentNode")).with_arguments(path_args()),
            field("createDocument", non_null("DocumentNode"))
                .with_arguments(with_params(path_args(), "DocumentMutation")),
        ];
        for collection in &self.schema.collections {
            let ns = &collection.namespace;
            let document = namer::document_type_name(ns);
            let params = namer::mutation_type_name(ns);
            let relative_path = vec![arg("relativePath", non_null("String"))];
            fields.push(
                field(&namer::update_mutation_name(ns), non_null(&document))
                    .with_arguments(with_params(relative_path.clone(), &params)),
            );
            fields.push(
                field(&namer::create_mutation_name(ns), non_null(&document))
                    .with_arguments(with_params(relative_path, &params)),
            );
        }
        self.object("Mutation", &[], fields);
    }

    // ========================================================================
    // Definition helpers
    // ========================================================================

    fn scalar(&mut self, name: &str, description: &str) {
        self.definitions.push(Definition::Scalar(ScalarTypeDefinition {
            name: name.to_string(),
            description: Some(description.to_string()),
        }));
    }

    fn object(&mut self, name: &str, interfaces: &[&str], fields: Vec<FieldDefinition>) {
        self.definitions.push(Definition::Object(ObjectTypeDefinition {
            name: name.to_string(),
            description: None,
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            fields,
        }));
    }

    fn interface(&mut self, name: &str, fields: Vec<FieldDefinition>) {
        self.definitions.push(Definition::Interface(InterfaceTypeDefinition {
            name: name.to_string(),
            description: None,
            fields,
        }));
    }

    fn union(&mut self, name: &str, members: Vec<String>) {
        self.definitions.push(Definition::Union(UnionTypeDefinition {
            name: name.to_string(),
            description: None,
            members,
        }));
    }

    fn input(&mut self, name: &str, fields: Vec<InputValueDefinition>) {
        self.definitions.push(Definition::InputObject(InputObjectTypeDefinition {
            name: name.to_string(),
            description: None,
            fields,
        }));
    }
}

fn field(name: &str, ty: Type) -> FieldDefinition {
    FieldDefinition::new(name, ty)
}

fn arg(name: &str, ty: Type) -> InputValueDefinition {
    InputValueDefinition::new(name, ty)
}

fn named(name: &str) -> Type {
    Type::named(name)
}

fn non_null(name: &str) -> Type {
    Type::named(name).non_null()
}

fn non_null_list(name: &str) -> Type {
    Type::named(name).non_null().list().non_null()
}

fn document_interface_fields() -> Vec<FieldDefinition> {
    vec![
        field("id", non_null("ID")),
        field("sys", non_null("SystemInfo")),
        field("values", non_null("JSON")),
        field("dataJSON", non_null("JSON")),
        field("form", non_null("JSON")),
    ]
}

fn connection_fields(edges: &str) -> Vec<FieldDefinition> {
    vec![
        field("totalCount", non_null("Float")),
        field("pageInfo", non_null("PageInfo")),
        field("edges", Type::named(edges).list()),
    ]
}

/// Pagination arguments of list fields, plus an optional filter
pub(crate) fn list_arguments(filter: Option<String>) -> Vec<InputValueDefinition> {
    let mut args = vec![
        arg("before", named("String")),
        arg("after", named("String")),
        arg("first", named("Float")),
        arg("last", named("Float")),
        arg("sort", named("String")),
    ];
    if let Some(filter) = filter {
        args.push(arg("filter", named(&filter)));
    }
    args
}

fn scalar_name(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Number => "Float",
        FieldKind::Boolean => "Boolean",
        _ => "String",
    }
}

fn filter_type(field: &Field) -> String {
    match &field.kind {
        FieldKind::String | FieldKind::Reference { .. } => "StringFilter".to_string(),
        FieldKind::Number => "NumberFilter".to_string(),
        FieldKind::Boolean => "BooleanFilter".to_string(),
        FieldKind::Datetime => "DatetimeFilter".to_string(),
        FieldKind::Image => "ImageFilter".to_string(),
        FieldKind::RichText => "RichTextFilter".to_string(),
        FieldKind::Object { .. } => namer::filter_type_name(&field.namespace),
    }
}

fn mutation_type(field: &Field) -> Type {
    let name = match &field.kind {
        FieldKind::Object { .. } => namer::mutation_type_name(&field.namespace),
        other => scalar_name(other).to_string(),
    };
    let ty = Type::named(name);
    if field.list {
        ty.list()
    } else {
        ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, parse_source};

    fn schema(yaml: &str) -> Schema {
        normalize(&parse_source(yaml, false).unwrap()).unwrap()
    }

    const BLOG: &str = r#"
templates:
  - name: hero
    fields:
      - { name: headline, type: string }
      - name: children
        type: object
        list: true
        templates: [hero]
collections:
  - name: author
    path: content/authors
    fields:
      - { name: name, type: string }
  - name: post
    path: content/posts
    fields:
      - { name: title, type: string }
      - { name: tags, type: string, list: true }
      - { name: rating, type: number }
      - { name: author, type: reference, collections: [author] }
      - name: blocks
        type: object
        list: true
        templates: [hero]
  - name: page
    path: content/pages
    templates: [hero]
"#;

    fn find<'a>(doc: &'a Document, name: &str) -> &'a Definition {
        doc.definitions
            .iter()
            .find(|d| d.name() == Some(name))
            .unwrap_or_else(|| panic!("missing definition {}", name))
    }

    #[test]
    fn test_collection_types() {
        let doc = build_schema_ast(&schema(BLOG));
        for name in [
            "Post",
            "PostDocument",
            "PostConnection",
            "PostConnectionEdges",
            "PostFilter",
            "PostMutation",
            "PostAuthorDocument",
            "PostBlocks",
            "Hero",
            "DocumentNode",
            "DocumentMutation",
        ] {
            find(&doc, name);
        }

        match find(&doc, "PostDocument") {
            Definition::Object(def) => {
                assert_eq!(def.interfaces, vec!["Node", "Document"]);
                let names: Vec<_> = def.fields.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["id", "sys", "data", "values", "dataJSON", "form"]);
            }
            other => panic!("unexpected {:?}", other),
        }

        match find(&doc, "PostAuthorDocument") {
            Definition::Union(def) => assert_eq!(def.members, vec!["AuthorDocument"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_polymorphic_collection_is_a_union() {
        let doc = build_schema_ast(&schema(BLOG));
        match find(&doc, "Page") {
            Definition::Union(def) => assert_eq!(def.members, vec!["Hero"]),
            other => panic!("unexpected {:?}", other),
        }
        match find(&doc, "PageMutation") {
            Definition::InputObject(def) => {
                assert_eq!(def.fields[0].name, "hero");
                assert_eq!(def.fields[0].ty, Type::named("HeroMutation"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_names_are_unique() {
        let doc = build_schema_ast(&schema(BLOG));
        let mut names: Vec<_> = doc.definitions.iter().filter_map(|d| d.name()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_root_fields() {
        let doc = build_schema_ast(&schema(BLOG));
        let fields = |name| match find(&doc, name) {
            Definition::Object(def) => def.fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>(),
            other => panic!("unexpected {:?}", other),
        };
        let query = fields("Query");
        assert!(query.contains(&"getPostDocument".to_string()));
        assert!(query.contains(&"getPostList".to_string()));
        assert!(query.contains(&"getDocumentFields".to_string()));
        let mutation = fields("Mutation");
        assert!(mutation.contains(&"addPendingDocument".to_string()));
        assert!(mutation.contains(&"createPageDocument".to_string()));
    }

    #[test]
    fn test_print_is_stable() {
        let first = mdgql::print(&build_schema_ast(&schema(BLOG)));
        let second = mdgql::print(&build_schema_ast(&schema(BLOG)));
        assert_eq!(first, second);
        assert!(first.contains("union PostBlocks = Hero"));
    }
}
