//! TypeScript types and client SDK
//!
//! Both files are rendered with tera from a flat model computed here, so the
//! templates stay free of type-mapping logic.

use serde::Serialize;
use tera::{Context, Tera};

use mdgql::{Definition, Document, FieldDefinition, InputValueDefinition, OperationDefinition, Type};

use crate::error::Result;

const SCALARS: &[&str] = &["ID", "String", "Boolean", "Int", "Float", "Reference", "JSON"];

const TYPES_TEMPLATE: &str = r#"// Generated by mdgraph. Do not edit.
export type Maybe<T> = T | null;
export type InputMaybe<T> = Maybe<T>;
export type Exact<T extends { [key: string]: unknown }> = { [K in keyof T]: T[K] };

export type Scalars = {
  ID: string;
  String: string;
  Boolean: boolean;
  Int: number;
  Float: number;
  Reference: any;
  JSON: any;
};
{% for object in objects %}
export type {{ object.name }} = {
{%- if object.typename %}
  __typename?: '{{ object.name }}';
{%- endif %}
{%- for field in object.fields %}
  {{ field.name }}{% if field.optional %}?{% endif %}: {{ field.ty }};
{%- endfor %}
};
{% endfor %}
{%- for union in unions %}
export type {{ union.name }} = {{ union.members }};
{% endfor %}
{%- for operation in operations %}
export type {{ operation.type_name }}Variables = Exact<{
{%- for field in operation.variables %}
  {{ field.name }}{% if field.optional %}?{% endif %}: {{ field.ty }};
{%- endfor %}
}>;

export type {{ operation.type_name }} = { __typename?: '{{ operation.root }}' } & Pick<{{ operation.root }}, '{{ operation.field }}'>;
{% endfor -%}
"#;

const CLIENT_TEMPLATE: &str = r#"// Generated by mdgraph. Do not edit.
import type {
{%- for operation in operations %}
  {{ operation.type_name }},
  {{ operation.type_name }}Variables,
{%- endfor %}
} from './types';
{% for fragment in fragments %}
export const {{ fragment.constant }} = `
{{ fragment.document }}
`;
{% endfor %}
{%- for operation in operations %}
export const {{ operation.constant }} = `
{{ operation.document }}
{{ operation.fragment }}`;
{% endfor %}
export type Requester<C = {}> = <R, V>(doc: string, variables?: V, options?: C) => Promise<R>;

export function getSdk<C>(requester: Requester<C>) {
  return {
{%- for operation in operations %}
    {{ operation.name }}(variables{% if operation.optional_variables %}?{% endif %}: {{ operation.type_name }}Variables, options?: C): Promise<{ data: {{ operation.type_name }}; variables: {{ operation.type_name }}Variables; query: string }> {
      return requester<{ data: {{ operation.type_name }}; variables: {{ operation.type_name }}Variables; query: string }, {{ operation.type_name }}Variables>({{ operation.constant }}, variables, options);
    },
{%- endfor %}
  };
}

export type Sdk = ReturnType<typeof getSdk>;
"#;

#[derive(Debug, Serialize)]
struct TsField {
    name: String,
    ty: String,
    optional: bool,
}

#[derive(Debug, Serialize)]
struct TsObject {
    name: String,
    typename: bool,
    fields: Vec<TsField>,
}

#[derive(Debug, Serialize)]
struct TsUnion {
    name: String,
    members: String,
}

#[derive(Debug, Serialize)]
struct TsFragment {
    constant: String,
    document: String,
}

#[derive(Debug, Serialize)]
struct TsOperation {
    name: String,
    type_name: String,
    root: String,
    field: String,
    constant: String,
    fragment: String,
    variables: Vec<TsField>,
    optional_variables: bool,
    document: String,
}

/// Render `types.ts`
pub fn render_types(schema: &Document, queries: &Document) -> Result<String> {
    let mut objects = Vec::new();
    let mut unions = Vec::new();

    for definition in &schema.definitions {
        match definition {
            Definition::Object(def) => {
                objects.push(TsObject {
                    name: def.name.clone(),
                    typename: true,
                    fields: def.fields.iter().map(output_field).collect(),
                });
                for field in def.fields.iter().filter(|f| !f.arguments.is_empty()) {
                    objects.push(TsObject {
                        name: format!("{}{}Args", def.name, capitalize(&field.name)),
                        typename: false,
                        fields: field.arguments.iter().map(input_field).collect(),
                    });
                }
            }
            Definition::Interface(def) => objects.push(TsObject {
                name: def.name.clone(),
                typename: false,
                fields: def.fields.iter().map(output_field).collect(),
            }),
            Definition::InputObject(def) => objects.push(TsObject {
                name: def.name.clone(),
                typename: false,
                fields: def.fields.iter().map(input_field).collect(),
            }),
            Definition::Union(def) => unions.push(TsUnion {
                name: def.name.clone(),
                members: if def.members.is_empty() {
                    "never".to_string()
                } else {
                    def.members.join(" | ")
                },
            }),
            Definition::Enum(def) => unions.push(TsUnion {
                name: def.name.clone(),
                members: def
                    .values
                    .iter()
                    .map(|v| format!("'{}'", v))
                    .collect::<Vec<_>>()
                    .join(" | "),
            }),
            _ => {}
        }
    }

    let mut context = Context::new();
    context.insert("objects", &objects);
    context.insert("unions", &unions);
    context.insert("operations", &operations(queries, &Document::new(Vec::new())));
    render("types.ts", TYPES_TEMPLATE, &context)
}

/// Render `client.ts`
pub fn render_client(fragments: &Document, queries: &Document) -> Result<String> {
    let fragment_model: Vec<TsFragment> = fragments
        .fragments()
        .map(|f| TsFragment {
            constant: fragment_constant(&f.name),
            document: escape_template_literal(&mdgql::print_definition(&Definition::Fragment(f.clone()))),
        })
        .collect();

    let mut context = Context::new();
    context.insert("fragments", &fragment_model);
    context.insert("operations", &operations(queries, fragments));
    render("client.ts", CLIENT_TEMPLATE, &context)
}

fn render(name: &str, template: &str, context: &Context) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template(name, template)?;
    Ok(tera.render(name, context)?)
}

fn operations(queries: &Document, fragments: &Document) -> Vec<TsOperation> {
    queries.operations().filter_map(|op| operation(op, fragments)).collect()
}

fn operation(op: &OperationDefinition, fragments: &Document) -> Option<TsOperation> {
    let name = op.name.clone()?;
    let root = match op.operation {
        mdgql::OperationType::Query => "Query",
        mdgql::OperationType::Mutation => "Mutation",
        mdgql::OperationType::Subscription => return None,
    };
    let field = op.selection_set.items.iter().find_map(|s| match s {
        mdgql::Selection::Field(f) => Some(f.name.clone()),
        _ => None,
    })?;
    let variables: Vec<TsField> = op
        .variable_definitions
        .iter()
        .map(|v| TsField {
            name: v.name.clone(),
            ty: ts_type(&v.ty, "InputMaybe"),
            optional: !matches!(v.ty, Type::NonNull(_)) || v.default_value.is_some(),
        })
        .collect();
    let type_name = format!("{}{}", capitalize(&name), root);
    let fragment = spreads(&op.selection_set)
        .into_iter()
        .find(|spread| fragments.fragment(spread).is_some())
        .map(|spread| format!("${{{}}}", fragment_constant(&spread)))
        .unwrap_or_default();

    Some(TsOperation {
        constant: format!("{}Document", type_name),
        optional_variables: variables.iter().all(|v| v.optional),
        document: escape_template_literal(&mdgql::print_definition(&Definition::Operation(op.clone()))),
        name,
        type_name,
        root: root.to_string(),
        field,
        fragment,
        variables,
    })
}

/// Names of the fragments spread anywhere in a selection set
fn spreads(set: &mdgql::SelectionSet) -> Vec<String> {
    let mut names = Vec::new();
    for selection in &set.items {
        match selection {
            mdgql::Selection::Field(f) => names.extend(spreads(&f.selection_set)),
            mdgql::Selection::FragmentSpread(spread) => names.push(spread.name.clone()),
            mdgql::Selection::InlineFragment(inline) => names.extend(spreads(&inline.selection_set)),
        }
    }
    names
}

fn output_field(field: &FieldDefinition) -> TsField {
    TsField {
        name: field.name.clone(),
        ty: ts_type(&field.ty, "Maybe"),
        optional: !matches!(field.ty, Type::NonNull(_)),
    }
}

fn input_field(field: &InputValueDefinition) -> TsField {
    TsField {
        name: field.name.clone(),
        ty: ts_type(&field.ty, "InputMaybe"),
        optional: !matches!(field.ty, Type::NonNull(_)),
    }
}

/// `[String!]` → `Maybe<Array<Scalars['String']>>`
fn ts_type(ty: &Type, maybe: &str) -> String {
    match ty {
        Type::NonNull(inner) => ts_non_null(inner, maybe),
        other => format!("{}<{}>", maybe, ts_non_null(other, maybe)),
    }
}

fn ts_non_null(ty: &Type, maybe: &str) -> String {
    match ty {
        Type::NonNull(inner) => ts_non_null(inner, maybe),
        Type::List(inner) => format!("Array<{}>", ts_type(inner, maybe)),
        Type::Named(name) if SCALARS.contains(&name.as_str()) => format!("Scalars['{}']", name),
        Type::Named(name) => name.clone(),
    }
}

fn fragment_constant(fragment: &str) -> String {
    format!("{}FragmentDoc", fragment)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn escape_template_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('`', "\\`").replace("${", "\\${")
}
