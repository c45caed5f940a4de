//! Runtime lookup of generated types
//!
//! Built once per compile and handed to the resolver by reference. It answers
//! three questions the executor has while walking a selection:
//! which root operation a field name routes to, what a data field holds
//! (scalar, reference or nested object) and which concrete types an
//! abstract type covers. Serialized as `_lookup.json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::namer;
use crate::schema::{Collection, Field, FieldKind, FieldShape, Schema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRegistry {
    pub version: String,
    /// Abstract type → concrete object types
    pub possible_types: BTreeMap<String, Vec<String>>,
    pub collections: BTreeMap<String, CollectionTypes>,
    /// Data object type → field name → hint
    pub types: BTreeMap<String, BTreeMap<String, FieldHint>>,
    pub query: BTreeMap<String, RootField>,
    pub mutation: BTreeMap<String, RootField>,
}

/// Generated type names of one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionTypes {
    pub document: String,
    pub connection: String,
    pub edges: String,
    pub data: DataType,
}

/// An object-valued position in the data tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataType {
    Object {
        #[serde(rename = "typeName")]
        type_name: String,
    },
    Union {
        #[serde(rename = "typeName")]
        type_name: String,
        /// Template name → object type
        templates: BTreeMap<String, String>,
    },
}

impl DataType {
    /// Concrete object type of a value tagged with `template`
    pub fn concrete(&self, template: Option<&str>) -> Option<&str> {
        match self {
            DataType::Object { type_name } => Some(type_name),
            DataType::Union { templates, .. } => template.and_then(|t| templates.get(t)).map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldHint {
    Scalar,
    /// Stored value is a document path, resolved lazily within `collections`
    Reference { collections: Vec<String> },
    Object { data: DataType },
}

/// What a root field does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "collection", rename_all = "camelCase")]
pub enum RootField {
    GetCollection,
    GetCollections,
    Node,
    GetDocument,
    GetDocumentList,
    GetDocumentFields,
    CollectionDocument(String),
    CollectionList(String),
    AddPendingDocument,
    CreateDocument,
    UpdateDocument,
    DeleteDocument,
    CreateCollectionDocument(String),
    UpdateCollectionDocument(String),
}

impl TypeRegistry {
    pub fn from_schema(schema: &Schema) -> Self {
        let mut registry = TypeRegistry {
            version: schema.version.clone(),
            ..Default::default()
        };

        let mut documents = Vec::new();
        let mut connections = Vec::new();
        for collection in &schema.collections {
            let types = registry.collection(schema, collection);
            documents.push(types.document.clone());
            connections.push(types.connection.clone());
            registry.collections.insert(collection.name.clone(), types);
        }
        connections.push("DocumentConnection".to_string());

        for name in ["Node", "Document", "DocumentNode"] {
            registry.possible_types.insert(name.to_string(), documents.clone());
        }
        registry.possible_types.insert("Connection".to_string(), connections);

        registry.roots(schema);
        registry
    }

    fn collection(&mut self, schema: &Schema, collection: &Collection) -> CollectionTypes {
        let ns = &collection.namespace;
        CollectionTypes {
            document: namer::document_type_name(ns),
            connection: namer::connection_type_name(ns),
            edges: namer::connection_edges_type_name(ns),
            data: self.shape(schema, &collection.shape, ns),
        }
    }

    fn shape(&mut self, schema: &Schema, shape: &FieldShape, namespace: &[String]) -> DataType {
        let type_name = namer::type_name(namespace);
        match shape {
            FieldShape::Flat { fields } => {
                self.fields(schema, &type_name, fields);
                DataType::Object { type_name }
            }
            FieldShape::Polymorphic { .. } => {
                let mut templates = BTreeMap::new();
                for template in schema.shape_templates(shape) {
                    let concrete = namer::type_name(&template.namespace);
                    if !self.types.contains_key(&concrete) {
                        self.fields(schema, &concrete, &template.fields);
                    }
                    templates.insert(template.name.clone(), concrete);
                }
                self.possible_types
                    .insert(type_name.clone(), templates.values().cloned().collect());
                DataType::Union { type_name, templates }
            }
        }
    }

    fn fields(&mut self, schema: &Schema, type_name: &str, fields: &[Field]) {
        // Registered before recursing so self-referencing templates stop here
        self.types.insert(type_name.to_string(), BTreeMap::new());
        let mut hints = BTreeMap::new();
        for field in fields {
            let hint = match &field.kind {
                FieldKind::Reference { collections } => {
                    let members = collections
                        .iter()
                        .filter_map(|c| schema.collection(c))
                        .map(|c| namer::document_type_name(&c.namespace))
                        .collect();
                    self.possible_types
                        .insert(namer::reference_type_name(&field.namespace), members);
                    FieldHint::Reference {
                        collections: collections.clone(),
                    }
                }
                FieldKind::Object { shape } => FieldHint::Object {
                    data: self.shape(schema, shape, &field.namespace),
                },
                _ => FieldHint::Scalar,
            };
            hints.insert(field.name.clone(), hint);
        }
        self.types.insert(type_name.to_string(), hints);
    }

    fn roots(&mut self, schema: &Schema) {
        use RootField::*;
        for (name, root) in [
            ("getCollection", GetCollection),
            ("getCollections", GetCollections),
            ("node", Node),
            ("getDocument", GetDocument),
            ("getDocumentList", GetDocumentList),
            ("getDocumentFields", GetDocumentFields),
        ] {
            self.query.insert(name.to_string(), root);
        }
        for (name, root) in [
            ("addPendingDocument", AddPendingDocument),
            ("createDocument", CreateDocument),
            ("updateDocument", UpdateDocument),
            ("deleteDocument", DeleteDocument),
        ] {
            self.mutation.insert(name.to_string(), root);
        }
        for collection in &schema.collections {
            let ns = &collection.namespace;
            let name = collection.name.clone();
            self.query
                .insert(namer::query_document_name(ns), CollectionDocument(name.clone()));
            self.query.insert(namer::query_list_name(ns), CollectionList(name.clone()));
            self.mutation
                .insert(namer::create_mutation_name(ns), CreateCollectionDocument(name.clone()));
            self.mutation
                .insert(namer::update_mutation_name(ns), UpdateCollectionDocument(name));
        }
    }

    pub fn query_field(&self, name: &str) -> Option<&RootField> {
        self.query.get(name)
    }

    pub fn mutation_field(&self, name: &str) -> Option<&RootField> {
        self.mutation.get(name)
    }

    pub fn collection_types(&self, collection: &str) -> Option<&CollectionTypes> {
        self.collections.get(collection)
    }

    pub fn field_hint(&self, type_name: &str, field: &str) -> Option<&FieldHint> {
        self.types.get(type_name).and_then(|fields| fields.get(field))
    }

    /// Whether a fragment on `condition` applies to an object of type `concrete`
    pub fn fragment_applies(&self, condition: &str, concrete: &str) -> bool {
        condition == concrete
            || self
                .possible_types
                .get(condition)
                .map(|types| types.iter().any(|t| t == concrete))
                .unwrap_or(false)
    }

    /// The collection whose document type is `type_name`
    pub fn collection_of_document(&self, type_name: &str) -> Option<&str> {
        self.collections
            .iter()
            .find(|(_, types)| types.document == type_name)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, parse_source};

    fn registry() -> TypeRegistry {
        let schema = normalize(
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
      - name: seo
        type: object
        fields:
          - { name: description, type: string }
      - name: sections
        type: object
        list: true
        templates: [section]
"#,
                false,
            )
            .unwrap(),
        )
        .unwrap();
        TypeRegistry::from_schema(&schema)
    }

    #[test]
    fn test_root_routing() {
        let registry = registry();
        assert_eq!(
            registry.query_field("getPostDocument"),
            Some(&RootField::CollectionDocument("post".into()))
        );
        assert_eq!(
            registry.mutation_field("updateAuthorDocument"),
            Some(&RootField::UpdateCollectionDocument("author".into()))
        );
        assert_eq!(registry.query_field("node"), Some(&RootField::Node));
        assert!(registry.query_field("nope").is_none());
    }

    #[test]
    fn test_field_hints() {
        let registry = registry();
        assert_eq!(registry.field_hint("Post", "title"), Some(&FieldHint::Scalar));
        assert_eq!(
            registry.field_hint("Post", "author"),
            Some(&FieldHint::Reference {
                collections: vec!["author".to_string()]
            })
        );
        match registry.field_hint("Post", "seo") {
            Some(FieldHint::Object { data }) => assert_eq!(data.concrete(None), Some("PostSeo")),
            other => panic!("unexpected {:?}", other),
        }
        match registry.field_hint("Section", "children") {
            Some(FieldHint::Object { data }) => assert_eq!(data.concrete(Some("section")), Some("Section")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fragment_matching() {
        let registry = registry();
        assert!(registry.fragment_applies("PostDocument", "PostDocument"));
        assert!(registry.fragment_applies("Document", "AuthorDocument"));
        assert!(registry.fragment_applies("PostAuthorDocument", "AuthorDocument"));
        assert!(registry.fragment_applies("Connection", "DocumentConnection"));
        assert!(!registry.fragment_applies("PostAuthorDocument", "PostDocument"));
        assert_eq!(registry.collection_of_document("AuthorDocument"), Some("author"));
    }

    #[test]
    fn test_serializes_as_lookup() {
        let json = serde_json::to_value(registry()).unwrap();
        assert_eq!(json["query"]["getPostList"]["kind"], "collectionList");
        assert_eq!(json["query"]["getPostList"]["collection"], "post");
        assert_eq!(json["collections"]["post"]["data"]["typeName"], "Post");
    }
}
