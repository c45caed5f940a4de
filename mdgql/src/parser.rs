//! GraphQL parser using nom
//!
//! Parses executable documents (operations and fragments) into AST nodes.
//! Commas, whitespace and `#` comments are insignificant between tokens.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::ast::*;
use crate::error::ParseError;

/// Parse a complete executable document
pub fn parse_document(input: &str) -> Result<Document, ParseError> {
    match all_consuming(terminated(many1(ws(definition)), ignored))(input) {
        Ok((_, definitions)) => Ok(Document { definitions }),
        Err(e) => Err(ParseError::from_nom(input, e)),
    }
}

/// Parse a single input value literal
pub fn parse_value(input: &str) -> Result<Value, ParseError> {
    match all_consuming(terminated(ws(value_literal), ignored))(input) {
        Ok((_, v)) => Ok(v),
        Err(e) => Err(ParseError::from_nom(input, e)),
    }
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn ignored(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), char(',')),
            value((), char('\u{feff}')),
            value((), pair(char('#'), not_line_ending)),
        ))),
    )(input)
}

/// Skip insignificant tokens before `inner`
fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    preceded(ignored, inner)
}

fn punct<'a>(c: char) -> impl FnMut(&'a str) -> IResult<&'a str, char> {
    ws(char(c))
}

/// A keyword that is not the prefix of a longer name
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(kw), not(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_')))
}

fn name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn owned_name(input: &str) -> IResult<&str, String> {
    map(name, String::from)(input)
}

// ============================================================================
// Definitions
// ============================================================================

fn definition(input: &str) -> IResult<&str, Definition> {
    alt((
        map(operation_definition, Definition::Operation),
        map(fragment_definition, Definition::Fragment),
    ))(input)
}

fn operation_definition(input: &str) -> IResult<&str, OperationDefinition> {
    alt((
        map(selection_set, |selection_set| OperationDefinition {
            operation: OperationType::Query,
            name: None,
            variable_definitions: Vec::new(),
            directives: Vec::new(),
            selection_set,
        }),
        full_operation,
    ))(input)
}

fn full_operation(input: &str) -> IResult<&str, OperationDefinition> {
    let (input, operation) = operation_type(input)?;
    let (input, name) = opt(ws(owned_name))(input)?;
    let (input, variable_definitions) = opt(variable_definitions)(input)?;
    let (input, directives) = directives(input)?;
    let (input, selection_set) = ws(selection_set)(input)?;

    Ok((input, OperationDefinition {
        operation,
        name,
        variable_definitions: variable_definitions.unwrap_or_default(),
        directives,
        selection_set,
    }))
}

fn operation_type(input: &str) -> IResult<&str, OperationType> {
    alt((
        value(OperationType::Query, keyword("query")),
        value(OperationType::Mutation, keyword("mutation")),
        value(OperationType::Subscription, keyword("subscription")),
    ))(input)
}

fn variable_definitions(input: &str) -> IResult<&str, Vec<VariableDefinition>> {
    delimited(punct('('), many1(ws(variable_definition)), punct(')'))(input)
}

fn variable_definition(input: &str) -> IResult<&str, VariableDefinition> {
    let (input, name) = preceded(char('$'), owned_name)(input)?;
    let (input, _) = punct(':')(input)?;
    let (input, ty) = ws(type_ref)(input)?;
    let (input, default_value) = opt(preceded(punct('='), ws(value_literal)))(input)?;
    let (input, _) = directives(input)?;

    Ok((input, VariableDefinition { name, ty, default_value }))
}

fn fragment_definition(input: &str) -> IResult<&str, FragmentDefinition> {
    let (input, _) = keyword("fragment")(input)?;
    let (input, name) = ws(fragment_name)(input)?;
    let (input, _) = ws(keyword("on"))(input)?;
    let (input, type_condition) = ws(owned_name)(input)?;
    let (input, directives) = directives(input)?;
    let (input, selection_set) = ws(selection_set)(input)?;

    Ok((input, FragmentDefinition {
        name,
        type_condition,
        directives,
        selection_set,
    }))
}

/// Any name except `on`
fn fragment_name(input: &str) -> IResult<&str, String> {
    let (rest, n) = name(input)?;
    if n == "on" {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Tag)));
    }
    Ok((rest, n.to_string()))
}

// ============================================================================
// Selections
// ============================================================================

fn selection_set(input: &str) -> IResult<&str, SelectionSet> {
    map(
        delimited(char('{'), many1(ws(selection)), punct('}')),
        SelectionSet::new,
    )(input)
}

fn selection(input: &str) -> IResult<&str, Selection> {
    alt((
        map(fragment_spread, Selection::FragmentSpread),
        map(inline_fragment, Selection::InlineFragment),
        map(field, Selection::Field),
    ))(input)
}

fn field(input: &str) -> IResult<&str, Field> {
    let (input, (alias, name)) = alt((
        map(
            tuple((owned_name, punct(':'), ws(owned_name))),
            |(alias, _, name)| (Some(alias), name),
        ),
        map(owned_name, |name| (None, name)),
    ))(input)?;
    let (input, arguments) = opt(arguments)(input)?;
    let (input, directives) = directives(input)?;
    let (input, selection_set) = opt(ws(selection_set))(input)?;

    Ok((input, Field {
        alias,
        name,
        arguments: arguments.unwrap_or_default(),
        directives,
        selection_set: selection_set.unwrap_or_default(),
    }))
}

fn fragment_spread(input: &str) -> IResult<&str, FragmentSpread> {
    let (input, _) = tag("...")(input)?;
    let (input, name) = ws(fragment_name)(input)?;
    let (input, directives) = directives(input)?;

    Ok((input, FragmentSpread { name, directives }))
}

fn inline_fragment(input: &str) -> IResult<&str, InlineFragment> {
    let (input, _) = tag("...")(input)?;
    let (input, type_condition) = opt(preceded(ws(keyword("on")), ws(owned_name)))(input)?;
    let (input, directives) = directives(input)?;
    let (input, selection_set) = ws(selection_set)(input)?;

    Ok((input, InlineFragment {
        type_condition,
        directives,
        selection_set,
    }))
}

fn arguments(input: &str) -> IResult<&str, Vec<Argument>> {
    delimited(punct('('), many0(ws(argument)), punct(')'))(input)
}

fn argument(input: &str) -> IResult<&str, Argument> {
    let (input, name) = owned_name(input)?;
    let (input, _) = punct(':')(input)?;
    let (input, value) = ws(value_literal)(input)?;

    Ok((input, Argument { name, value }))
}

fn directives(input: &str) -> IResult<&str, Vec<Directive>> {
    many0(ws(directive))(input)
}

fn directive(input: &str) -> IResult<&str, Directive> {
    let (input, name) = preceded(char('@'), owned_name)(input)?;
    let (input, arguments) = opt(arguments)(input)?;

    Ok((input, Directive {
        name,
        arguments: arguments.unwrap_or_default(),
    }))
}

// ============================================================================
// Types
// ============================================================================

fn type_ref(input: &str) -> IResult<&str, Type> {
    let (input, base) = alt((
        map(delimited(char('['), ws(type_ref), punct(']')), |t| Type::List(Box::new(t))),
        map(owned_name, Type::Named),
    ))(input)?;
    let (input, bang) = opt(punct('!'))(input)?;

    Ok((input, if bang.is_some() { base.non_null() } else { base }))
}

// ============================================================================
// Values
// ============================================================================

fn value_literal(input: &str) -> IResult<&str, Value> {
    alt((
        map(preceded(char('$'), owned_name), Value::Variable),
        map(float_literal, Value::Float),
        map(int_literal, Value::Int),
        map(block_string, Value::String),
        map(string_literal, Value::String),
        value(Value::Boolean(true), keyword("true")),
        value(Value::Boolean(false), keyword("false")),
        value(Value::Null, keyword("null")),
        map(owned_name, Value::Enum),
        map(delimited(char('['), many0(ws(value_literal)), punct(']')), Value::List),
        map(delimited(char('{'), many0(ws(object_field)), punct('}')), Value::Object),
    ))(input)
}

fn object_field(input: &str) -> IResult<&str, (String, Value)> {
    let (input, name) = owned_name(input)?;
    let (input, _) = punct(':')(input)?;
    let (input, value) = ws(value_literal)(input)?;
    Ok((input, (name, value)))
}

fn int_literal(input: &str) -> IResult<&str, i64> {
    map_res(
        terminated(
            recognize(pair(opt(char('-')), digit1)),
            not(one_of(".eE")),
        ),
        str::parse::<i64>,
    )(input)
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn float_literal(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            alt((
                recognize(pair(pair(char('.'), digit1), opt(exponent))),
                exponent,
            )),
        ))),
        str::parse::<f64>,
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None | Some('\n') | Some('\r') => {
                return Err(nom::Err::Failure(NomError::new(rest, ErrorKind::Char)));
            }
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => {
                let escaped = match chars.next() {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('/') => '/',
                    Some('b') => '\u{8}',
                    Some('f') => '\u{c}',
                    Some('n') => '\n',
                    Some('r') => '\r',
                    Some('t') => '\t',
                    Some('u') => {
                        let hex: String = chars.by_ref().take(4).collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(c) => c,
                            None => return Err(nom::Err::Failure(NomError::new(rest, ErrorKind::Char))),
                        }
                    }
                    _ => return Err(nom::Err::Failure(NomError::new(rest, ErrorKind::Char))),
                };
                out.push(escaped);
            }
            Some(c) => out.push(c),
        }
        rest = chars.as_str();
    }
}

fn block_string(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = tag("\"\"\"")(input)?;
    let mut raw = String::new();
    loop {
        if let Some(after) = rest.strip_prefix("\"\"\"") {
            return Ok((after, dedent_block(&raw)));
        }
        if let Some(after) = rest.strip_prefix("\\\"\"\"") {
            raw.push_str("\"\"\"");
            rest = after;
            continue;
        }
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) => raw.push(c),
            None => return Err(nom::Err::Failure(NomError::new(rest, ErrorKind::Tag))),
        }
        rest = chars.as_str();
    }
}

/// Strip common indentation and surrounding blank lines from a block string
fn dedent_block(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let common = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, l)| if i == 0 || l.len() < common { l.trim_start() } else { &l[common..] })
        .collect();
    while out.first().map(|l| l.trim().is_empty()).unwrap_or(false) {
        out.remove(0);
    }
    while out.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
        out.pop();
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_field(doc: &Document) -> &Field {
        let op = doc.operation(None).unwrap();
        match &op.selection_set.items[0] {
            Selection::Field(f) => f,
            other => panic!("Expected field, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_shorthand_query() {
        let doc = parse_document("{ getCollections { name } }").unwrap();
        let op = doc.operation(None).unwrap();
        assert_eq!(op.operation, OperationType::Query);
        assert!(op.name.is_none());
        let f = only_field(&doc);
        assert_eq!(f.name, "getCollections");
        assert_eq!(f.selection_set.items.len(), 1);
    }

    #[test]
    fn test_parse_named_operation_with_variables() {
        let doc = parse_document(
            "query getPostDocument($relativePath: String!, $first: Float = 10) {
                getPostDocument(relativePath: $relativePath) { id }
            }",
        )
        .unwrap();
        let op = doc.operation(Some("getPostDocument")).unwrap();
        assert_eq!(op.variable_definitions.len(), 2);
        assert_eq!(op.variable_definitions[0].ty, Type::named("String").non_null());
        assert_eq!(op.variable_definitions[1].default_value, Some(Value::Int(10)));
        let f = only_field(&doc);
        assert_eq!(f.argument("relativePath"), Some(&Value::Variable("relativePath".into())));
    }

    #[test]
    fn test_parse_alias_and_arguments() {
        let doc = parse_document(
            r#"{ posts: getPostList(filter: {title: {eq: "A \"quoted\" title"}}, sort: "date", first: -2, ratio: 1.5e2, draft: false, tags: [a, null]) { totalCount } }"#,
        )
        .unwrap();
        let f = only_field(&doc);
        assert_eq!(f.alias.as_deref(), Some("posts"));
        assert_eq!(f.response_key(), "posts");
        assert_eq!(f.argument("first"), Some(&Value::Int(-2)));
        assert_eq!(f.argument("ratio"), Some(&Value::Float(150.0)));
        assert_eq!(f.argument("draft"), Some(&Value::Boolean(false)));
        assert_eq!(
            f.argument("tags"),
            Some(&Value::List(vec![Value::Enum("a".into()), Value::Null]))
        );
        if let Some(Value::Object(fields)) = f.argument("filter") {
            if let Value::Object(inner) = &fields[0].1 {
                assert_eq!(inner[0].1, Value::String("A \"quoted\" title".into()));
            } else {
                panic!("Expected nested object");
            }
        } else {
            panic!("Expected object argument");
        }
    }

    #[test]
    fn test_parse_fragments() {
        let doc = parse_document(
            "query { getPostDocument(relativePath: \"a.md\") { ...PostParts ... on Document { id } ... @include(if: true) { sys { filename } } } }
             fragment PostParts on Post { title }",
        )
        .unwrap();
        assert_eq!(doc.fragments().count(), 1);
        let f = only_field(&doc);
        assert!(matches!(&f.selection_set.items[0], Selection::FragmentSpread(s) if s.name == "PostParts"));
        assert!(matches!(&f.selection_set.items[1], Selection::InlineFragment(i) if i.type_condition.as_deref() == Some("Document")));
        assert!(matches!(&f.selection_set.items[2], Selection::InlineFragment(i) if i.type_condition.is_none() && i.directives.len() == 1));
    }

    #[test]
    fn test_parse_comments_and_block_string() {
        let doc = parse_document(
            "# leading comment\nmutation { updatePostDocument(relativePath: \"a.md\", params: {body: \"\"\"\n    Hello\n      world\n    \"\"\"}) { id } }",
        )
        .unwrap();
        let op = doc.operation(None).unwrap();
        assert_eq!(op.operation, OperationType::Mutation);
        if let Some(Value::Object(fields)) = only_field(&doc).argument("params") {
            assert_eq!(fields[0].1, Value::String("Hello\n  world".into()));
        } else {
            panic!("Expected params object");
        }
    }

    #[test]
    fn test_keyword_prefixed_names() {
        let doc = parse_document("{ nullable trueish onward }").unwrap();
        let op = doc.operation(None).unwrap();
        assert_eq!(op.selection_set.items.len(), 3);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_document("").is_err());
        assert!(parse_document("{ a ").is_err());
        assert!(parse_document("query { a } trailing").is_err());
        let err = parse_document("{\n  a(x: \"unterminated\n}").unwrap_err();
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("[1, 2.5, \"x\"]").unwrap(), Value::List(vec![
            Value::Int(1),
            Value::Float(2.5),
            Value::String("x".into()),
        ]));
    }
}
