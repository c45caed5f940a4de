//! Selection-set execution
//!
//! Every value the executor can select fields on is a [`Node`]. Root fields
//! are routed through the [`TypeRegistry`], data fields are interpreted with
//! its field hints, and fragments match on its possible types. A failing
//! field is reported with its response path and resolves to `null` without
//! affecting its siblings.

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

use mdgql::{Directive, Field, OperationDefinition, OperationType, Selection, SelectionSet};

use super::{filter, mutation, GraphQLError};
use crate::compiler::{DataType, FieldHint, RootField, TypeRegistry};
use crate::database::{Database, Document, ListOptions, Snapshot};
use crate::error::{Error, Result};
use crate::schema::{Collection, FieldShape, TEMPLATE_KEY};
use crate::store::{PageInfo, StoreEdge};

#[derive(Debug, Clone)]
enum Node {
    Root(OperationType),
    Document(Arc<Document>),
    Sys(Arc<Document>),
    /// An object in a document's data tree
    Data {
        type_name: String,
        value: Map<String, Value>,
    },
    Collection(String),
    Connection {
        type_name: String,
        edges_type: String,
        edges: Vec<StoreEdge>,
        page_info: PageInfo,
    },
    Edge {
        type_name: String,
        edge: StoreEdge,
    },
    PageInfo(PageInfo),
}

fn document(doc: Document) -> Node {
    Node::Document(Arc::new(doc))
}

pub(crate) struct Executor<'a> {
    db: &'a Database,
    snapshot: Arc<Snapshot>,
    document: &'a mdgql::Document,
    variables: Map<String, Value>,
    errors: Mutex<Vec<GraphQLError>>,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(
        db: &'a Database,
        snapshot: Arc<Snapshot>,
        document: &'a mdgql::Document,
        variables: Map<String, Value>,
    ) -> Self {
        Self {
            db,
            snapshot,
            document,
            variables,
            errors: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn execute(&self, operation: &OperationDefinition) -> Value {
        if operation.operation == OperationType::Subscription {
            self.error(Error::unsupported("subscription"), Vec::new());
            return Value::Null;
        }
        self.selection_set(&operation.selection_set, Node::Root(operation.operation), Vec::new())
            .await
    }

    pub(crate) fn into_errors(self) -> Vec<GraphQLError> {
        self.errors.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn registry(&self) -> &TypeRegistry {
        &self.snapshot.compiled.registry
    }

    fn error(&self, error: Error, path: Vec<Value>) {
        tracing::debug!(error = %error, "field error");
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(GraphQLError::new(error.to_string(), path));
    }

    // ========================================================================
    // Selection sets
    // ========================================================================

    fn typename(&self, node: &Node) -> String {
        match node {
            Node::Root(OperationType::Mutation) => "Mutation".to_string(),
            Node::Root(_) => "Query".to_string(),
            Node::Document(doc) => self
                .registry()
                .collection_types(&doc.sys.collection)
                .map(|types| types.document.clone())
                .unwrap_or_else(|| "Document".to_string()),
            Node::Sys(_) => "SystemInfo".to_string(),
            Node::Data { type_name, .. } => type_name.clone(),
            Node::Collection(_) => "Collection".to_string(),
            Node::Connection { type_name, .. } | Node::Edge { type_name, .. } => type_name.clone(),
            Node::PageInfo(_) => "PageInfo".to_string(),
        }
    }

    fn selection_set<'b>(&'b self, set: &'b SelectionSet, node: Node, path: Vec<Value>) -> BoxFuture<'b, Value> {
        async move {
            let typename = self.typename(&node);
            let mut fields = Vec::new();
            self.collect_fields(set, &typename, &mut fields, &mut Vec::new());

            let mut out = Map::new();
            for (key, field) in fields {
                let mut field_path = path.clone();
                field_path.push(Value::String(key.clone()));
                let value = if field.name == "__typename" {
                    Value::String(typename.clone())
                } else {
                    match self.field(&node, &field, field_path.clone()).await {
                        Ok(value) => value,
                        Err(e) => {
                            self.error(e, field_path);
                            Value::Null
                        }
                    }
                };
                out.insert(key, value);
            }
            Value::Object(out)
        }
        .boxed()
    }

    /// Flatten fragments into fields keyed by response name
    ///
    /// Fields sharing a response key have their selection sets merged.
    fn collect_fields(&self, set: &SelectionSet, typename: &str, out: &mut Vec<(String, Field)>, visited: &mut Vec<String>) {
        for selection in &set.items {
            match selection {
                Selection::Field(field) => {
                    if !self.included(&field.directives) {
                        continue;
                    }
                    let key = field.response_key().to_string();
                    match out.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, existing)) => existing
                            .selection_set
                            .items
                            .extend(field.selection_set.items.iter().cloned()),
                        None => out.push((key, field.clone())),
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.included(&spread.directives) || visited.contains(&spread.name) {
                        continue;
                    }
                    match self.document.fragment(&spread.name) {
                        Some(fragment) => {
                            if self.registry().fragment_applies(&fragment.type_condition, typename) {
                                visited.push(spread.name.clone());
                                self.collect_fields(&fragment.selection_set, typename, out, visited);
                            }
                        }
                        None => self.error(Error::query(format!("Unknown fragment '{}'", spread.name)), Vec::new()),
                    }
                }
                Selection::InlineFragment(inline) => {
                    if !self.included(&inline.directives) {
                        continue;
                    }
                    let applies = inline
                        .type_condition
                        .as_deref()
                        .map(|condition| self.registry().fragment_applies(condition, typename))
                        .unwrap_or(true);
                    if applies {
                        self.collect_fields(&inline.selection_set, typename, out, visited);
                    }
                }
            }
        }
    }

    /// `@skip(if:)` / `@include(if:)`
    fn included(&self, directives: &[Directive]) -> bool {
        directives.iter().all(|directive| {
            let condition = directive
                .argument("if")
                .map(|v| v.to_json(&self.variables))
                .and_then(|v| v.as_bool());
            !matches!(
                (directive.name.as_str(), condition),
                ("skip", Some(true)) | ("include", Some(false))
            )
        })
    }

    fn field<'b>(&'b self, node: &'b Node, field: &'b Field, path: Vec<Value>) -> BoxFuture<'b, Result<Value>> {
        async move {
            match node {
                Node::Root(kind) => self.root_field(*kind, field, path).await,
                Node::Document(doc) => self.document_field(doc, field, path).await,
                Node::Sys(doc) => self.sys_field(doc, field, path).await,
                Node::Data { type_name, value } => self.data_field(type_name, value, field, path).await,
                Node::Collection(name) => self.collection_field(name, field, path).await,
                Node::Connection {
                    type_name,
                    edges_type,
                    edges,
                    page_info,
                } => match field.name.as_str() {
                    "totalCount" => Ok(json!(edges.len())),
                    "pageInfo" => self.complete(Node::PageInfo(page_info.clone()), field, path).await,
                    "edges" => {
                        let nodes = edges
                            .iter()
                            .map(|edge| {
                                Ok(Node::Edge {
                                    type_name: edges_type.clone(),
                                    edge: edge.clone(),
                                })
                            })
                            .collect();
                        self.complete_list(nodes, field, path).await
                    }
                    other => Err(unknown_field(other, type_name)),
                },
                Node::Edge { type_name, edge } => match field.name.as_str() {
                    "cursor" => Ok(Value::String(edge.cursor.clone())),
                    "node" => {
                        let doc = self.db.get_document_by_id(&edge.path).await?;
                        self.complete(document(doc), field, path).await
                    }
                    other => Err(unknown_field(other, type_name)),
                },
                Node::PageInfo(info) => match field.name.as_str() {
                    "hasPreviousPage" => Ok(Value::Bool(info.has_previous_page)),
                    "hasNextPage" => Ok(Value::Bool(info.has_next_page)),
                    "startCursor" => Ok(Value::String(info.start_cursor.clone())),
                    "endCursor" => Ok(Value::String(info.end_cursor.clone())),
                    other => Err(unknown_field(other, "PageInfo")),
                },
            }
        }
        .boxed()
    }

    async fn complete(&self, node: Node, field: &Field, path: Vec<Value>) -> Result<Value> {
        if field.selection_set.is_empty() {
            return Err(missing_selection(field, &self.typename(&node)));
        }
        Ok(self.selection_set(&field.selection_set, node, path).await)
    }

    /// Complete each item on its own; a failing item becomes `null`
    async fn complete_list(&self, nodes: Vec<Result<Node>>, field: &Field, path: Vec<Value>) -> Result<Value> {
        if field.selection_set.is_empty() {
            return Err(missing_selection(field, "list"));
        }
        let mut items = Vec::with_capacity(nodes.len());
        for (i, node) in nodes.into_iter().enumerate() {
            let mut item_path = path.clone();
            item_path.push(Value::from(i));
            match node {
                Ok(node) => items.push(self.selection_set(&field.selection_set, node, item_path).await),
                Err(e) => {
                    self.error(e, item_path);
                    items.push(Value::Null);
                }
            }
        }
        Ok(Value::Array(items))
    }

    // ========================================================================
    // Root fields
    // ========================================================================

    async fn root_field(&self, kind: OperationType, field: &Field, path: Vec<Value>) -> Result<Value> {
        let route = match kind {
            OperationType::Mutation => self.registry().mutation_field(&field.name),
            _ => self.registry().query_field(&field.name),
        }
        .cloned()
        .ok_or_else(|| unknown_field(&field.name, &self.typename(&Node::Root(kind))))?;
        let schema = &self.snapshot.schema;

        match &route {
            RootField::GetCollection => {
                let name = self.string_arg(field, "collection")?;
                schema.require_collection(&name)?;
                self.complete(Node::Collection(name), field, path).await
            }
            RootField::GetCollections => {
                let nodes = schema
                    .collections
                    .iter()
                    .map(|c| Ok(Node::Collection(c.name.clone())))
                    .collect();
                self.complete_list(nodes, field, path).await
            }
            RootField::Node => {
                let id = self.string_arg(field, "id")?;
                let doc = self.db.get_document_by_id(&id).await?;
                self.complete(document(doc), field, path).await
            }
            RootField::GetDocument => {
                let collection = self.string_arg(field, "collection")?;
                let relative_path = self.string_arg(field, "relativePath")?;
                let doc = self.db.get_document(&collection, &relative_path).await?;
                self.complete(document(doc), field, path).await
            }
            RootField::GetDocumentList => {
                let node = self.document_list(None, field).await?;
                self.complete(node, field, path).await
            }
            RootField::GetDocumentFields => {
                let mut fields = Map::new();
                for collection in &schema.collections {
                    fields.insert(collection.name.clone(), self.form(collection)?);
                }
                Ok(Value::Object(fields))
            }
            RootField::CollectionDocument(collection) => {
                let relative_path = self.string_arg(field, "relativePath")?;
                let doc = self.db.get_document(collection, &relative_path).await?;
                self.complete(document(doc), field, path).await
            }
            RootField::CollectionList(collection) => {
                let node = self.collection_list(collection, field).await?;
                self.complete(node, field, path).await
            }
            RootField::AddPendingDocument => {
                let collection = self.string_arg(field, "collection")?;
                let relative_path = self.string_arg(field, "relativePath")?;
                let template = self.optional_string_arg(field, "template");
                let doc = self
                    .db
                    .add_pending_document(&collection, &relative_path, template.as_deref())
                    .await?;
                self.complete(document(doc), field, path).await
            }
            RootField::CreateDocument | RootField::UpdateDocument => {
                let params = self.arg(field, "params");
                let collection = match self.optional_string_arg(field, "collection") {
                    Some(collection) => collection,
                    None => single_key(&params)
                        .ok_or_else(|| Error::query(format!("'{}' needs a collection", field.name)))?,
                };
                let params = params
                    .get(&collection)
                    .and_then(Value::as_object)
                    .ok_or_else(|| Error::query(format!("Missing params for collection '{}'", collection)))?;
                let relative_path = self.string_arg(field, "relativePath")?;
                let create = matches!(route, RootField::CreateDocument);
                let doc = self.write(create, &collection, &relative_path, params).await?;
                self.complete(document(doc), field, path).await
            }
            RootField::DeleteDocument => {
                let collection = self.string_arg(field, "collection")?;
                let relative_path = self.string_arg(field, "relativePath")?;
                let doc = self.db.delete_document(&collection, &relative_path).await?;
                self.complete(document(doc), field, path).await
            }
            RootField::CreateCollectionDocument(collection) | RootField::UpdateCollectionDocument(collection) => {
                let params = self.arg(field, "params");
                let params = params
                    .as_object()
                    .ok_or_else(|| Error::query(format!("'{}' needs params", field.name)))?;
                let relative_path = self.string_arg(field, "relativePath")?;
                let create = matches!(route, RootField::CreateCollectionDocument(_));
                let doc = self.write(create, collection, &relative_path, params).await?;
                self.complete(document(doc), field, path).await
            }
        }
    }

    async fn write(&self, create: bool, collection: &str, relative_path: &str, params: &Map<String, Value>) -> Result<Document> {
        let schema = &self.snapshot.schema;
        let target = schema.require_collection(collection)?;
        let data = mutation::params_to_data(schema, &target.shape, params, &target.name)?;
        if create {
            self.db.create_document(collection, relative_path, data).await
        } else {
            self.db.update_document(collection, relative_path, data).await
        }
    }

    async fn collection_list(&self, name: &str, field: &Field) -> Result<Node> {
        let schema = &self.snapshot.schema;
        let collection = schema.require_collection(name)?;
        let conditions = filter::filter_conditions(schema, collection, &self.arg(field, "filter"))?;
        let options = self.list_options(field, conditions);
        let response = self.db.list_documents(name, &options).await?;
        let types = self
            .registry()
            .collection_types(name)
            .ok_or_else(|| Error::CollectionNotFound { name: name.to_string() })?;
        Ok(Node::Connection {
            type_name: types.connection.clone(),
            edges_type: types.edges.clone(),
            edges: response.edges,
            page_info: response.page_info,
        })
    }

    /// `DocumentConnection` over one collection or all of them
    async fn document_list(&self, collection: Option<&str>, field: &Field) -> Result<Node> {
        let options = self.list_options(field, Vec::new());
        let (edges, page_info) = match collection {
            Some(name) => {
                let response = self.db.list_documents(name, &options).await?;
                (response.edges, response.page_info)
            }
            None => {
                let mut edges = Vec::new();
                for collection in &self.snapshot.schema.collections {
                    let response = self.db.list_documents(&collection.name, &ListOptions::default()).await?;
                    edges.extend(response.edges);
                }
                paginate(edges, &options)
            }
        };
        Ok(Node::Connection {
            type_name: "DocumentConnection".to_string(),
            edges_type: "DocumentConnectionEdges".to_string(),
            edges,
            page_info,
        })
    }

    // ========================================================================
    // Object fields
    // ========================================================================

    async fn document_field(&self, doc: &Arc<Document>, field: &Field, path: Vec<Value>) -> Result<Value> {
        match field.name.as_str() {
            "id" => Ok(Value::String(doc.id.clone())),
            "sys" => self.complete(Node::Sys(doc.clone()), field, path).await,
            "data" => {
                let types = self
                    .registry()
                    .collection_types(&doc.sys.collection)
                    .ok_or_else(|| Error::CollectionNotFound {
                        name: doc.sys.collection.clone(),
                    })?;
                let node = data_node(&types.data, doc.data.clone(), &doc.sys.collection)?;
                self.complete(node, field, path).await
            }
            "values" => Ok(Value::Object(doc.values.clone())),
            "dataJSON" => Ok(Value::Object(doc.data.clone())),
            "form" => self.form(self.snapshot.schema.require_collection(&doc.sys.collection)?),
            other => Err(unknown_field(other, &self.typename(&Node::Document(doc.clone())))),
        }
    }

    async fn sys_field(&self, doc: &Arc<Document>, field: &Field, path: Vec<Value>) -> Result<Value> {
        let sys = &doc.sys;
        match field.name.as_str() {
            "filename" => Ok(Value::String(sys.filename.clone())),
            "basename" => Ok(Value::String(sys.basename.clone())),
            "breadcrumbs" => {
                let exclude_extension = self.arg(field, "excludeExtension").as_bool().unwrap_or(true);
                Ok(json!(sys.breadcrumbs(exclude_extension)))
            }
            "path" => Ok(Value::String(sys.path.clone())),
            "relativePath" => Ok(Value::String(sys.relative_path.clone())),
            "extension" => Ok(Value::String(sys.extension.clone())),
            "template" => Ok(Value::String(sys.template.clone())),
            "collection" => self.complete(Node::Collection(sys.collection.clone()), field, path).await,
            other => Err(unknown_field(other, "SystemInfo")),
        }
    }

    async fn data_field(&self, type_name: &str, value: &Map<String, Value>, field: &Field, path: Vec<Value>) -> Result<Value> {
        let hint = self
            .registry()
            .field_hint(type_name, &field.name)
            .cloned()
            .ok_or_else(|| unknown_field(&field.name, type_name))?;
        let raw = value.get(&field.name).cloned().unwrap_or(Value::Null);

        match hint {
            FieldHint::Scalar => Ok(raw),
            // Resolved only when selected
            FieldHint::Reference { collections } => match raw {
                Value::String(id) if !id.is_empty() => {
                    let doc = self.db.resolve_reference(&id, &collections).await?;
                    self.complete(document(doc), field, path).await
                }
                Value::Array(ids) => {
                    let mut nodes = Vec::with_capacity(ids.len());
                    for id in ids {
                        let node = match id.as_str() {
                            Some(id) => self.db.resolve_reference(id, &collections).await.map(document),
                            None => Err(Error::query(format!("Reference in '{}' must be a document path", field.name))),
                        };
                        nodes.push(node);
                    }
                    self.complete_list(nodes, field, path).await
                }
                _ => Ok(Value::Null),
            },
            FieldHint::Object { data } => match raw {
                Value::Object(object) => {
                    let node = data_node(&data, object, &field.name)?;
                    self.complete(node, field, path).await
                }
                Value::Array(items) => {
                    let nodes = items
                        .into_iter()
                        .map(|item| match item {
                            Value::Object(object) => data_node(&data, object, &field.name),
                            _ => Err(Error::query(format!("Expected objects in '{}'", field.name))),
                        })
                        .collect();
                    self.complete_list(nodes, field, path).await
                }
                _ => Ok(Value::Null),
            },
        }
    }

    async fn collection_field(&self, name: &str, field: &Field, path: Vec<Value>) -> Result<Value> {
        let schema = &self.snapshot.schema;
        let collection = schema.require_collection(name)?;
        match field.name.as_str() {
            "name" | "slug" => Ok(Value::String(collection.name.clone())),
            "label" => Ok(Value::String(collection.label.clone())),
            "path" => Ok(Value::String(collection.path.clone())),
            "format" => Ok(Value::String(collection.format.extension().to_string())),
            "matches" => Ok(Value::String(collection.matches.clone())),
            "fields" => match &collection.shape {
                FieldShape::Flat { fields } => Ok(serde_json::to_value(fields)?),
                FieldShape::Polymorphic { .. } => Ok(Value::Null),
            },
            "templates" => match &collection.shape {
                FieldShape::Flat { .. } => Ok(Value::Null),
                shape @ FieldShape::Polymorphic { .. } => Ok(serde_json::to_value(schema.shape_templates(shape))?),
            },
            "documents" => {
                let node = self.document_list(Some(name), field).await?;
                self.complete(node, field, path).await
            }
            other => Err(unknown_field(other, "Collection")),
        }
    }

    /// Field definitions an editor needs to build a form for `collection`
    fn form(&self, collection: &Collection) -> Result<Value> {
        let mut form = Map::new();
        form.insert("name".to_string(), Value::String(collection.name.clone()));
        form.insert("label".to_string(), Value::String(collection.label.clone()));
        match &collection.shape {
            FieldShape::Flat { fields } => {
                form.insert("fields".to_string(), serde_json::to_value(fields)?);
            }
            shape @ FieldShape::Polymorphic { .. } => {
                let templates = self.snapshot.schema.shape_templates(shape);
                form.insert("templates".to_string(), serde_json::to_value(templates)?);
            }
        }
        Ok(Value::Object(form))
    }

    // ========================================================================
    // Arguments
    // ========================================================================

    fn arg(&self, field: &Field, name: &str) -> Value {
        field
            .argument(name)
            .map(|value| value.to_json(&self.variables))
            .unwrap_or(Value::Null)
    }

    fn string_arg(&self, field: &Field, name: &str) -> Result<String> {
        match self.arg(field, name) {
            Value::String(s) => Ok(s),
            _ => Err(Error::query(format!(
                "Argument '{}' of '{}' must be a string",
                name, field.name
            ))),
        }
    }

    fn optional_string_arg(&self, field: &Field, name: &str) -> Option<String> {
        self.arg(field, name).as_str().map(str::to_string)
    }

    fn count_arg(&self, field: &Field, name: &str) -> Option<usize> {
        self.arg(field, name).as_f64().filter(|n| *n >= 0.0).map(|n| n as usize)
    }

    fn list_options(&self, field: &Field, filter: Vec<crate::store::FilterCondition>) -> ListOptions {
        ListOptions {
            filter,
            sort: self.optional_string_arg(field, "sort"),
            first: self.count_arg(field, "first"),
            last: self.count_arg(field, "last"),
            after: self.optional_string_arg(field, "after"),
            before: self.optional_string_arg(field, "before"),
        }
    }
}

fn data_node(data: &DataType, value: Map<String, Value>, field: &str) -> Result<Node> {
    let template = value.get(TEMPLATE_KEY).and_then(Value::as_str);
    let type_name = data.concrete(template).ok_or_else(|| Error::NoTemplateFound {
        field: field.to_string(),
    })?;
    Ok(Node::Data {
        type_name: type_name.to_string(),
        value,
    })
}

/// Cursor window and `first`/`last` over edges already in order
fn paginate(mut edges: Vec<StoreEdge>, options: &ListOptions) -> (Vec<StoreEdge>, PageInfo) {
    let mut has_previous_page = false;
    let mut has_next_page = false;

    if let Some(after) = &options.after {
        if let Some(pos) = edges.iter().position(|e| &e.cursor == after) {
            edges.drain(..=pos);
            has_previous_page = true;
        }
    }
    if let Some(before) = &options.before {
        if let Some(pos) = edges.iter().position(|e| &e.cursor == before) {
            edges.truncate(pos);
            has_next_page = true;
        }
    }
    if let Some(first) = options.first {
        if edges.len() > first {
            edges.truncate(first);
            has_next_page = true;
        }
    } else if let Some(last) = options.last {
        if edges.len() > last {
            edges.drain(..edges.len() - last);
            has_previous_page = true;
        }
    }

    let page_info = PageInfo {
        has_previous_page,
        has_next_page,
        start_cursor: edges.first().map(|e| e.cursor.clone()).unwrap_or_default(),
        end_cursor: edges.last().map(|e| e.cursor.clone()).unwrap_or_default(),
    };
    (edges, page_info)
}

fn single_key(params: &Value) -> Option<String> {
    let object = params.as_object()?;
    let mut keys = object.keys();
    match (keys.next(), keys.next()) {
        (Some(key), None) => Some(key.clone()),
        _ => None,
    }
}

fn unknown_field(field: &str, type_name: &str) -> Error {
    Error::query(format!("Cannot query field '{}' on type '{}'", field, type_name))
}

fn missing_selection(field: &Field, type_name: &str) -> Error {
    Error::query(format!(
        "Field '{}' of type '{}' must have a selection of subfields",
        field.name, type_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(n: usize) -> Vec<StoreEdge> {
        (0..n)
            .map(|i| StoreEdge {
                cursor: format!("c{}", i),
                path: format!("p{}", i),
            })
            .collect()
    }

    #[test]
    fn test_paginate_first_after() {
        let options = ListOptions {
            first: Some(2),
            after: Some("c0".into()),
            ..Default::default()
        };
        let (page, info) = paginate(edges(5), &options);
        let paths: Vec<_> = page.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["p1", "p2"]);
        assert!(info.has_previous_page);
        assert!(info.has_next_page);
        assert_eq!(info.end_cursor, "c2");
    }

    #[test]
    fn test_paginate_last() {
        let options = ListOptions {
            last: Some(2),
            ..Default::default()
        };
        let (page, info) = paginate(edges(5), &options);
        let paths: Vec<_> = page.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["p3", "p4"]);
        assert!(info.has_previous_page);
        assert!(!info.has_next_page);
    }

    #[test]
    fn test_single_key() {
        assert_eq!(single_key(&json!({"post": {}})), Some("post".to_string()));
        assert_eq!(single_key(&json!({"a": {}, "b": {}})), None);
        assert_eq!(single_key(&Value::Null), None);
    }
}
