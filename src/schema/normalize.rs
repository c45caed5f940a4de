//! Schema normalization
//!
//! Turns a [`SchemaSource`] into the immutable [`Schema`] model: resolves
//! global template references, computes storage keys and discriminators,
//! derives indexes and rejects every structural error up front.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::model::*;
use super::source::*;
use crate::compiler::namer;
use crate::error::{Error, Result};
use crate::validation;

/// Normalize a schema source
pub fn normalize(source: &SchemaSource) -> Result<Schema> {
    let mut normalizer = Normalizer::new(source)?;

    let mut collections = Vec::with_capacity(source.collections.len());
    let mut seen = HashSet::new();
    for collection in &source.collections {
        let path = format!("collections.{}", collection.name);
        if !seen.insert(collection.name.as_str()) {
            return Err(Error::schema(path, format!("duplicate collection name '{}'", collection.name)));
        }
        collections.push(normalizer.collection(collection, &path)?);
    }

    // Unused global templates are still validated
    for template in &source.templates {
        normalizer.global_template(&template.name, "templates")?;
    }

    let schema = Schema {
        version: env!("CARGO_PKG_VERSION").to_string(),
        collections,
        templates: normalizer.templates,
    };
    check_references(&schema)?;
    check_cycles(&schema)?;
    Ok(schema)
}

/// Where a field set is declared
#[derive(Clone, Copy)]
enum Scope {
    /// Top level of a document, either the collection itself or one of its templates
    Document { markdown: bool, template: bool },
    /// Template of a polymorphic object field
    Template,
    /// Flat object field
    Object,
}

struct Normalizer<'s> {
    globals: HashMap<&'s str, &'s TemplateSource>,
    templates: BTreeMap<String, Template>,
    /// Globals currently being normalized, for recursive references
    in_progress: HashSet<String>,
    /// Custom discriminator keys declared by templates
    discriminators: HashMap<String, String>,
    /// Generated type name → owner, to catch collisions between namespaces
    type_names: HashMap<String, String>,
}

impl<'s> Normalizer<'s> {
    fn new(source: &'s SchemaSource) -> Result<Self> {
        let mut globals = HashMap::new();
        for template in &source.templates {
            let path = format!("templates.{}", template.name);
            validation::validate_collection_name(&template.name)
                .map_err(|e| Error::schema(&path, e.to_string()))?;
            if globals.insert(template.name.as_str(), template).is_some() {
                return Err(Error::schema(path, format!("duplicate template name '{}'", template.name)));
            }
        }

        let type_names = namer::BUILTIN_TYPES
            .iter()
            .map(|name| (name.to_string(), "builtin".to_string()))
            .collect();

        Ok(Self {
            globals,
            templates: BTreeMap::new(),
            in_progress: HashSet::new(),
            discriminators: HashMap::new(),
            type_names,
        })
    }

    fn claim(&mut self, name: String, owner: &str, path: &str) -> Result<()> {
        match self.type_names.get(&name) {
            Some(existing) if existing != owner => Err(Error::schema(
                path,
                format!("generated type name '{}' collides with {}", name, existing),
            )),
            _ => {
                self.type_names.insert(name, owner.to_string());
                Ok(())
            }
        }
    }

    fn claim_object_names(&mut self, namespace: &[String], owner: &str, path: &str) -> Result<()> {
        self.claim(namer::type_name(namespace), owner, path)?;
        self.claim(namer::filter_type_name(namespace), owner, path)?;
        self.claim(namer::mutation_type_name(namespace), owner, path)
    }

    fn collection(&mut self, source: &CollectionSource, path: &str) -> Result<Collection> {
        validation::validate_collection_name(&source.name).map_err(|e| Error::schema(path, e.to_string()))?;

        let namespace = vec![source.name.clone()];
        let owner = format!("collection '{}'", source.name);
        self.claim_object_names(&namespace, &owner, path)?;
        self.claim(namer::document_type_name(&namespace), &owner, path)?;
        self.claim(namer::connection_type_name(&namespace), &owner, path)?;
        self.claim(namer::connection_edges_type_name(&namespace), &owner, path)?;

        let dir = source.path.trim_matches('/').to_string();
        if !dir.is_empty() {
            validation::validate_relative_path(&dir)
                .map_err(|e| Error::schema(format!("{}.path", path), e.to_string()))?;
        }

        let format = source.format.unwrap_or_default();
        let markdown = format.is_markdown();
        let shape = match (&source.fields, &source.templates) {
            (Some(fields), None) => FieldShape::Flat {
                fields: self.fields(fields, &namespace, path, Scope::Document { markdown, template: false })?,
            },
            (None, Some(templates)) => {
                self.polymorphic(templates, &namespace, path, Scope::Document { markdown, template: true })?
            }
            (Some(_), Some(_)) => {
                return Err(Error::schema(path, "collection must declare either fields or templates, not both"));
            }
            (None, None) => {
                return Err(Error::schema(path, "collection must declare fields or templates"));
            }
        };

        let indexes = self.indexes(source, &shape, path)?;

        Ok(Collection {
            name: source.name.clone(),
            label: source.label.clone().unwrap_or_else(|| source.name.clone()),
            path: dir,
            format,
            matches: source.matches.clone().unwrap_or_else(|| "**/*".to_string()),
            shape,
            indexes,
            namespace,
        })
    }

    /// Normalize a global template on first use and return its id
    fn global_template(&mut self, name: &str, path: &str) -> Result<String> {
        if self.templates.contains_key(name) || self.in_progress.contains(name) {
            return Ok(name.to_string());
        }
        let source = *self
            .globals
            .get(name)
            .ok_or_else(|| Error::schema(path, format!("unknown template '{}'", name)))?;

        self.in_progress.insert(name.to_string());
        let template_path = format!("templates.{}", name);
        let template = self.template(source, vec![name.to_string()], name.to_string(), &template_path, Scope::Template)?;
        self.in_progress.remove(name);
        self.templates.insert(name.to_string(), template);
        Ok(name.to_string())
    }

    fn template(
        &mut self,
        source: &TemplateSource,
        namespace: Vec<String>,
        id: String,
        path: &str,
        scope: Scope,
    ) -> Result<Template> {
        let owner = format!("template '{}'", id);
        self.claim_object_names(&namespace, &owner, path)?;

        if let Some(key) = source
            .fields
            .iter()
            .find(|f| f.name == TEMPLATE_KEY)
            .and_then(|f| f.alias.clone())
        {
            self.discriminators.insert(id.clone(), key);
        }

        let field_scope = match scope {
            Scope::Document { .. } => scope,
            _ => Scope::Template,
        };
        let fields = self.fields(&source.fields, &namespace, path, field_scope)?;

        Ok(Template {
            id,
            name: source.name.clone(),
            label: source.label.clone().unwrap_or_else(|| source.name.clone()),
            fields,
            namespace,
            matcher: source.matcher.clone(),
        })
    }

    fn polymorphic(&mut self, refs: &[TemplateRef], namespace: &[String], path: &str, scope: Scope) -> Result<FieldShape> {
        if refs.is_empty() {
            return Err(Error::schema(path, "templates must not be empty"));
        }

        let mut ids = Vec::with_capacity(refs.len());
        let mut names = HashSet::new();
        for template_ref in refs {
            let (id, name) = match template_ref {
                TemplateRef::Named(name) => (self.global_template(name, path)?, name.clone()),
                TemplateRef::Inline(source) => {
                    let template_path = format!("{}.templates.{}", path, source.name);
                    validation::validate_collection_name(&source.name)
                        .map_err(|e| Error::schema(&template_path, e.to_string()))?;
                    let mut ns = namespace.to_vec();
                    ns.push(source.name.clone());
                    let id = ns.join(".");
                    let template = self.template(source, ns, id.clone(), &template_path, scope)?;
                    self.templates.insert(id.clone(), template);
                    (id, source.name.clone())
                }
            };
            if !names.insert(name.clone()) {
                return Err(Error::schema(path, format!("duplicate template name '{}'", name)));
            }
            ids.push(id);
        }

        let key = ids
            .first()
            .and_then(|first| self.discriminators.get(first))
            .cloned()
            .unwrap_or_else(|| TEMPLATE_KEY.to_string());

        Ok(FieldShape::Polymorphic { templates: ids, key })
    }

    fn fields(&mut self, sources: &[FieldSource], namespace: &[String], path: &str, scope: Scope) -> Result<Vec<Field>> {
        let mut fields = Vec::with_capacity(sources.len());
        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        let mut has_title = false;
        let mut has_body = false;

        for source in sources {
            let field_path = format!("{}.fields.{}", path, source.name);

            if source.name == TEMPLATE_KEY {
                let in_template = matches!(scope, Scope::Template | Scope::Document { template: true, .. });
                if !in_template || !matches!(source.alias.as_deref(), Some(a) if !a.is_empty()) {
                    return Err(Error::schema(
                        field_path,
                        "'_template' is reserved; declare it only in a template, with an alias, to rename the discriminator",
                    ));
                }
                continue;
            }

            validation::validate_field_name(&source.name).map_err(|e| Error::schema(&field_path, e.to_string()))?;
            if !names.insert(source.name.clone()) {
                return Err(Error::schema(field_path, format!("duplicate field name '{}'", source.name)));
            }

            let mut alias = source.alias.clone().filter(|a| a != &source.name);
            if let Some(a) = &alias {
                if a.is_empty() || validation::RESERVED_KEYS.contains(&a.as_str()) {
                    return Err(Error::schema(field_path, format!("invalid alias '{}'", a)));
                }
            }

            if source.is_title {
                if has_title {
                    return Err(Error::schema(field_path, "only one field may be marked isTitle"));
                }
                if source.field_type != FieldType::String || source.list {
                    return Err(Error::schema(field_path, "isTitle requires a non-list string field"));
                }
                has_title = true;
            }

            if source.is_body {
                if has_body {
                    return Err(Error::schema(field_path, "only one field may be marked isBody"));
                }
                if !matches!(source.field_type, FieldType::String | FieldType::RichText) || source.list {
                    return Err(Error::schema(field_path, "isBody requires a non-list string or rich-text field"));
                }
                if let Scope::Document { markdown: true, .. } = scope {
                    if alias.is_some() {
                        return Err(Error::schema(field_path, "an isBody field cannot declare an alias"));
                    }
                    alias = Some(BODY_KEY.to_string());
                }
                has_body = true;
            }

            let key = alias.clone().unwrap_or_else(|| source.name.clone());
            if !keys.insert(key.clone()) {
                return Err(Error::schema(field_path, format!("duplicate storage key '{}'", key)));
            }

            if !source.options.is_empty() && !matches!(source.field_type, FieldType::String | FieldType::Number) {
                return Err(Error::schema(field_path, "options are only supported on string and number fields"));
            }

            let mut field_ns = namespace.to_vec();
            field_ns.push(source.name.clone());
            let owner = format!("field '{}'", field_ns.join("."));

            let kind = match source.field_type {
                FieldType::String => FieldKind::String,
                FieldType::Number => FieldKind::Number,
                FieldType::Boolean => FieldKind::Boolean,
                FieldType::Datetime => FieldKind::Datetime,
                FieldType::Image => FieldKind::Image,
                FieldType::RichText => {
                    if source.templates.is_some() {
                        tracing::warn!(field = %field_path, "rich-text templates are not supported and will be ignored");
                    }
                    FieldKind::RichText
                }
                FieldType::Reference => {
                    if source.collections.is_empty() {
                        return Err(Error::schema(field_path, "reference fields must list target collections"));
                    }
                    self.claim(namer::reference_type_name(&field_ns), &owner, &field_path)?;
                    FieldKind::Reference {
                        collections: source.collections.clone(),
                    }
                }
                FieldType::Object => {
                    let shape = match (&source.fields, &source.templates) {
                        (Some(nested), None) => {
                            self.claim_object_names(&field_ns, &owner, &field_path)?;
                            FieldShape::Flat {
                                fields: self.fields(nested, &field_ns, &field_path, Scope::Object)?,
                            }
                        }
                        (None, Some(templates)) => {
                            self.claim_object_names(&field_ns, &owner, &field_path)?;
                            self.polymorphic(templates, &field_ns, &field_path, Scope::Template)?
                        }
                        _ => {
                            return Err(Error::schema(
                                field_path,
                                "object fields must declare exactly one of fields or templates",
                            ));
                        }
                    };
                    FieldKind::Object { shape }
                }
            };

            if source.field_type != FieldType::Object && (source.fields.is_some() || (source.templates.is_some() && source.field_type != FieldType::RichText)) {
                return Err(Error::schema(field_path, "only object fields may declare nested fields or templates"));
            }

            fields.push(Field {
                name: source.name.clone(),
                alias,
                label: source.label.clone().unwrap_or_else(|| source.name.clone()),
                description: source.description.clone(),
                kind,
                list: source.list,
                required: source.required,
                options: source.options.clone(),
                is_title: source.is_title,
                is_body: source.is_body,
                namespace: field_ns,
            });
        }

        Ok(fields)
    }

    fn indexes(&self, source: &CollectionSource, shape: &FieldShape, path: &str) -> Result<Vec<IndexDefinition>> {
        // Top-level fields by name; polymorphic collections contribute every template's fields
        let mut top_level: Vec<&Field> = Vec::new();
        match shape {
            FieldShape::Flat { fields } => top_level.extend(fields.iter()),
            FieldShape::Polymorphic { templates, .. } => {
                for id in templates {
                    if let Some(template) = self.templates.get(id) {
                        for field in &template.fields {
                            if !top_level.iter().any(|f| f.name == field.name) {
                                top_level.push(field);
                            }
                        }
                    }
                }
            }
        }

        let mut indexes = Vec::new();
        if let FieldShape::Flat { fields } = shape {
            for field in fields {
                let kind = field.field_type();
                if !field.list && kind.is_indexable() {
                    indexes.push(IndexDefinition {
                        name: field.name.clone(),
                        fields: vec![IndexField { name: field.name.clone(), kind }],
                    });
                }
            }
        }

        let mut declared = HashSet::new();
        for index in &source.indexes {
            let index_path = format!("{}.indexes.{}", path, index.name);
            if index.name.is_empty() || index.name.starts_with("__") || index.name.contains('/') {
                return Err(Error::schema(index_path, "invalid index name"));
            }
            if !declared.insert(index.name.as_str()) {
                return Err(Error::schema(index_path, format!("duplicate index name '{}'", index.name)));
            }
            if index.fields.is_empty() {
                return Err(Error::schema(index_path, "index must list at least one field"));
            }

            let mut fields = Vec::with_capacity(index.fields.len());
            for index_field in &index.fields {
                let field = top_level
                    .iter()
                    .find(|f| f.name == index_field.name)
                    .ok_or_else(|| Error::schema(&index_path, format!("unknown field '{}'", index_field.name)))?;
                let kind = field.field_type();
                if field.list || !kind.is_indexable() {
                    return Err(Error::schema(
                        &index_path,
                        format!("field '{}' is not a scalar and cannot be indexed", field.name),
                    ));
                }
                fields.push(IndexField { name: field.name.clone(), kind });
            }

            indexes.retain(|existing: &IndexDefinition| existing.name != index.name);
            indexes.push(IndexDefinition {
                name: index.name.clone(),
                fields,
            });
        }

        Ok(indexes)
    }
}

// ============================================================================
// Whole-schema checks
// ============================================================================

fn each_field_set<'a>(schema: &'a Schema) -> Vec<(String, &'a [Field])> {
    let mut sets: Vec<(String, &'a [Field])> = Vec::new();
    for collection in &schema.collections {
        if let FieldShape::Flat { fields } = &collection.shape {
            sets.push((format!("collections.{}", collection.name), fields));
        }
    }
    for template in schema.templates.values() {
        sets.push((format!("templates.{}", template.id), &template.fields));
    }
    sets
}

fn check_references(schema: &Schema) -> Result<()> {
    fn walk(schema: &Schema, fields: &[Field], path: &str) -> Result<()> {
        for field in fields {
            let field_path = format!("{}.fields.{}", path, field.name);
            match &field.kind {
                FieldKind::Reference { collections } => {
                    for target in collections {
                        if schema.collection(target).is_none() {
                            return Err(Error::schema(
                                field_path,
                                format!("reference to unknown collection '{}'", target),
                            ));
                        }
                    }
                }
                FieldKind::Object { shape: FieldShape::Flat { fields } } => walk(schema, fields, &field_path)?,
                _ => {}
            }
        }
        Ok(())
    }

    for (path, fields) in each_field_set(schema) {
        walk(schema, fields, &path)?;
    }
    Ok(())
}

/// Reject non-list object nesting that leads back to a template on the stack
fn check_cycles(schema: &Schema) -> Result<()> {
    fn visit_fields(schema: &Schema, fields: &[Field], stack: &mut Vec<String>, path: &str) -> Result<()> {
        for field in fields {
            if field.list {
                continue;
            }
            if let FieldKind::Object { shape } = &field.kind {
                visit_shape(schema, shape, stack, &format!("{}.fields.{}", path, field.name))?;
            }
        }
        Ok(())
    }

    fn visit_shape(schema: &Schema, shape: &FieldShape, stack: &mut Vec<String>, path: &str) -> Result<()> {
        match shape {
            FieldShape::Flat { fields } => visit_fields(schema, fields, stack, path),
            FieldShape::Polymorphic { templates, .. } => {
                for id in templates {
                    if stack.contains(id) {
                        return Err(Error::schema(
                            path,
                            format!("circular object nesting through template '{}' needs a list field", id),
                        ));
                    }
                    if let Some(template) = schema.template(id) {
                        stack.push(id.clone());
                        visit_fields(schema, &template.fields, stack, path)?;
                        stack.pop();
                    }
                }
                Ok(())
            }
        }
    }

    for collection in &schema.collections {
        visit_shape(schema, &collection.shape, &mut Vec::new(), &format!("collections.{}", collection.name))?;
    }
    for template in schema.templates.values() {
        let mut stack = vec![template.id.clone()];
        visit_fields(schema, &template.fields, &mut stack, &format!("templates.{}", template.id))?;
    }
    Ok(())
}
