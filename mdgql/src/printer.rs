//! Deterministic GraphQL printer
//!
//! Prints executable and type-system documents with two-space indentation.
//! The same AST always prints to the same bytes.

use crate::ast::*;

/// Print a whole document, definitions separated by a blank line
pub fn print_document(doc: &Document) -> String {
    let mut out = doc
        .definitions
        .iter()
        .map(print_definition)
        .collect::<Vec<_>>()
        .join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

pub fn print_definition(def: &Definition) -> String {
    match def {
        Definition::Operation(op) => print_operation(op),
        Definition::Fragment(frag) => format!(
            "fragment {} on {}{} {}",
            frag.name,
            frag.type_condition,
            print_directives(&frag.directives),
            print_selection_set(&frag.selection_set, 0)
        ),
        Definition::Scalar(s) => format!("{}scalar {}", print_description(&s.description, 0), s.name),
        Definition::Object(obj) => {
            let implements = if obj.interfaces.is_empty() {
                String::new()
            } else {
                format!(" implements {}", obj.interfaces.join(" & "))
            };
            format!(
                "{}type {}{} {}",
                print_description(&obj.description, 0),
                obj.name,
                implements,
                print_field_definitions(&obj.fields)
            )
        }
        Definition::Interface(iface) => format!(
            "{}interface {} {}",
            print_description(&iface.description, 0),
            iface.name,
            print_field_definitions(&iface.fields)
        ),
        Definition::Union(u) => format!(
            "{}union {} = {}",
            print_description(&u.description, 0),
            u.name,
            u.members.join(" | ")
        ),
        Definition::Enum(e) => {
            let values: Vec<String> = e.values.iter().map(|v| format!("  {}", v)).collect();
            format!(
                "{}enum {} {{\n{}\n}}",
                print_description(&e.description, 0),
                e.name,
                values.join("\n")
            )
        }
        Definition::InputObject(input) => {
            let fields: Vec<String> = input
                .fields
                .iter()
                .map(|f| format!("  {}", print_input_value(f)))
                .collect();
            format!(
                "{}input {} {{\n{}\n}}",
                print_description(&input.description, 0),
                input.name,
                fields.join("\n")
            )
        }
    }
}

fn print_operation(op: &OperationDefinition) -> String {
    let anonymous_query = op.operation == OperationType::Query
        && op.name.is_none()
        && op.variable_definitions.is_empty()
        && op.directives.is_empty();
    if anonymous_query {
        return print_selection_set(&op.selection_set, 0);
    }

    let mut head = op.operation.as_str().to_string();
    if let Some(name) = &op.name {
        head.push(' ');
        head.push_str(name);
    }
    if !op.variable_definitions.is_empty() {
        let vars: Vec<String> = op
            .variable_definitions
            .iter()
            .map(|v| match &v.default_value {
                Some(default) => format!("${}: {} = {}", v.name, v.ty, print_value(default)),
                None => format!("${}: {}", v.name, v.ty),
            })
            .collect();
        head.push_str(&format!("({})", vars.join(", ")));
    }
    head.push_str(&print_directives(&op.directives));
    format!("{} {}", head, print_selection_set(&op.selection_set, 0))
}

fn print_field_definitions(fields: &[FieldDefinition]) -> String {
    let lines: Vec<String> = fields
        .iter()
        .map(|f| {
            let args = if f.arguments.is_empty() {
                String::new()
            } else {
                let args: Vec<String> = f.arguments.iter().map(print_input_value).collect();
                format!("({})", args.join(", "))
            };
            format!("{}  {}{}: {}", print_description(&f.description, 1), f.name, args, f.ty)
        })
        .collect();
    format!("{{\n{}\n}}", lines.join("\n"))
}

fn print_input_value(v: &InputValueDefinition) -> String {
    match &v.default_value {
        Some(default) => format!("{}: {} = {}", v.name, v.ty, print_value(default)),
        None => format!("{}: {}", v.name, v.ty),
    }
}

fn print_description(description: &Option<String>, depth: usize) -> String {
    match description {
        Some(text) => format!("{}{}\n", "  ".repeat(depth), print_string(text)),
        None => String::new(),
    }
}

pub fn print_selection_set(set: &SelectionSet, depth: usize) -> String {
    let indent = "  ".repeat(depth + 1);
    let lines: Vec<String> = set
        .items
        .iter()
        .map(|item| format!("{}{}", indent, print_selection(item, depth + 1)))
        .collect();
    format!("{{\n{}\n{}}}", lines.join("\n"), "  ".repeat(depth))
}

fn print_selection(selection: &Selection, depth: usize) -> String {
    match selection {
        Selection::Field(field) => {
            let mut out = String::new();
            if let Some(alias) = &field.alias {
                out.push_str(alias);
                out.push_str(": ");
            }
            out.push_str(&field.name);
            out.push_str(&print_arguments(&field.arguments));
            out.push_str(&print_directives(&field.directives));
            if !field.selection_set.is_empty() {
                out.push(' ');
                out.push_str(&print_selection_set(&field.selection_set, depth));
            }
            out
        }
        Selection::FragmentSpread(spread) => {
            format!("...{}{}", spread.name, print_directives(&spread.directives))
        }
        Selection::InlineFragment(inline) => {
            let condition = inline
                .type_condition
                .as_ref()
                .map(|t| format!(" on {}", t))
                .unwrap_or_default();
            format!(
                "...{}{} {}",
                condition,
                print_directives(&inline.directives),
                print_selection_set(&inline.selection_set, depth)
            )
        }
    }
}

fn print_arguments(args: &[Argument]) -> String {
    if args.is_empty() {
        return String::new();
    }
    let args: Vec<String> = args
        .iter()
        .map(|a| format!("{}: {}", a.name, print_value(&a.value)))
        .collect();
    format!("({})", args.join(", "))
}

fn print_directives(directives: &[Directive]) -> String {
    directives
        .iter()
        .map(|d| format!(" @{}{}", d.name, print_arguments(&d.arguments)))
        .collect()
}

pub fn print_value(value: &Value) -> String {
    match value {
        Value::Variable(name) => format!("${}", name),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => {
            let s = f.to_string();
            if s.contains(['.', 'e', 'E']) || !f.is_finite() {
                s
            } else {
                format!("{}.0", s)
            }
        }
        Value::String(s) => print_string(s),
        Value::Boolean(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Enum(e) => e.clone(),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(print_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(fields) => {
            let fields: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{}: {}", k, print_value(v)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
    }
}

fn print_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    #[test]
    fn test_print_type_system() {
        let doc = Document::new(vec![
            Definition::Scalar(ScalarTypeDefinition { name: "JSON".into(), description: None }),
            Definition::Object(ObjectTypeDefinition {
                name: "PostDocument".into(),
                description: None,
                interfaces: vec!["Node".into(), "Document".into()],
                fields: vec![
                    FieldDefinition::new("id", Type::named("ID").non_null()),
                    FieldDefinition::new("tags", Type::named("String").list()).with_arguments(vec![
                        InputValueDefinition {
                            name: "first".into(),
                            ty: Type::named("Float"),
                            default_value: Some(Value::Int(10)),
                        },
                    ]),
                ],
            }),
            Definition::Union(UnionTypeDefinition {
                name: "DocumentNode".into(),
                description: None,
                members: vec!["PostDocument".into(), "AuthorDocument".into()],
            }),
        ]);

        let expected = "scalar JSON\n\n\
            type PostDocument implements Node & Document {\n  id: ID!\n  tags(first: Float = 10): [String]\n}\n\n\
            union DocumentNode = PostDocument | AuthorDocument\n";
        assert_eq!(print_document(&doc), expected);
    }

    #[test]
    fn test_print_reparses_to_same_ast() {
        let source = r#"query getPostList($after: String, $first: Float = 10) {
  getPostList(after: $after, first: $first, filter: {title: {eq: "a\nb"}}) {
    totalCount
    edges {
      node {
        ...PostParts
        ... on Document {
          id
        }
      }
    }
  }
}

fragment PostParts on Post {
  title
  renamed: date @skip(if: false)
}
"#;
        let doc = parse_document(source).unwrap();
        let printed = print_document(&doc);
        assert_eq!(printed, source);
        assert_eq!(parse_document(&printed).unwrap(), doc);
    }

    #[test]
    fn test_print_float() {
        assert_eq!(print_value(&Value::Float(2.0)), "2.0");
        assert_eq!(print_value(&Value::Float(1.5)), "1.5");
    }
}
