//! Path expressions over JSON documents
//!
//! Supports the subset filters need: `$.a.b`, `a.b`, `a[*]`, `a[0]` and
//! `a[?(@._template=="hero")]`. Arrays met along the way are flattened, so
//! `blocks.title` yields the title of every block.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Wildcard,
    Index(usize),
    Filter { key: String, value: String },
}

fn parse(path: &str) -> Option<Vec<Segment>> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut segments = Vec::new();
    let mut chars = path.chars().peekable();
    let mut current = String::new();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                let mut in_quotes = false;
                loop {
                    let next = chars.next()?;
                    if next == '"' {
                        in_quotes = !in_quotes;
                    }
                    if next == ']' && !in_quotes {
                        break;
                    }
                    inner.push(next);
                }
                segments.push(parse_bracket(inner.trim())?);
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(Segment::Key(current));
    }
    Some(segments)
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    if let Ok(index) = inner.parse::<usize>() {
        return Some(Segment::Index(index));
    }
    let expr = inner.strip_prefix("?(")?.strip_suffix(')')?;
    let (lhs, rhs) = expr.split_once("==")?;
    let key = lhs.trim().strip_prefix("@.")?.to_string();
    let rhs = rhs.trim();
    let value = rhs
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| rhs.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
        .unwrap_or(rhs)
        .to_string();
    Some(Segment::Filter { key, value })
}

/// Resolve every value at `path`. An invalid path resolves to nothing.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let segments = match parse(path) {
        Some(segments) => segments,
        None => return Vec::new(),
    };

    let mut current = vec![root];
    for segment in &segments {
        let mut next = Vec::new();
        for value in current {
            apply(segment, value, &mut next);
        }
        current = next;
    }

    // Final arrays flatten into their elements
    let mut out = Vec::new();
    for value in current {
        match value {
            Value::Array(items) => out.extend(items.iter()),
            Value::Null => {}
            other => out.push(other),
        }
    }
    out
}

fn apply<'a>(segment: &Segment, value: &'a Value, out: &mut Vec<&'a Value>) {
    match (segment, value) {
        (Segment::Key(key), Value::Object(map)) => {
            if let Some(v) = map.get(key) {
                out.push(v);
            }
        }
        (Segment::Key(_), Value::Array(items)) => {
            for item in items {
                apply(segment, item, out);
            }
        }
        (Segment::Wildcard, Value::Array(items)) => out.extend(items.iter()),
        (Segment::Wildcard, Value::Object(map)) => out.extend(map.values()),
        (Segment::Index(i), Value::Array(items)) => {
            if let Some(v) = items.get(*i) {
                out.push(v);
            }
        }
        (Segment::Filter { .. }, Value::Array(items)) => {
            for item in items {
                apply(segment, item, out);
            }
        }
        (Segment::Filter { key, value: expected }, Value::Object(map)) => {
            if map.get(key).and_then(Value::as_str) == Some(expected.as_str()) {
                out.push(value);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "title": "Hello",
            "tags": ["a", "b"],
            "seo": {"title": "SEO"},
            "blocks": [
                {"_template": "hero", "headline": "Big"},
                {"_template": "cta", "label": "Go"},
                {"_template": "hero", "headline": "Bigger"}
            ]
        })
    }

    #[test]
    fn test_simple_paths() {
        let d = doc();
        assert_eq!(resolve(&d, "title"), vec![&json!("Hello")]);
        assert_eq!(resolve(&d, "$.seo.title"), vec![&json!("SEO")]);
        assert!(resolve(&d, "missing.path").is_empty());
    }

    #[test]
    fn test_arrays_flatten() {
        let d = doc();
        assert_eq!(resolve(&d, "tags"), vec![&json!("a"), &json!("b")]);
        assert_eq!(resolve(&d, "tags[1]"), vec![&json!("b")]);
        assert_eq!(resolve(&d, "blocks[*].label"), vec![&json!("Go")]);
        assert_eq!(resolve(&d, "blocks.headline").len(), 2);
    }

    #[test]
    fn test_template_filter() {
        let d = doc();
        let found = resolve(&d, r#"blocks[?(@._template=="hero")].headline"#);
        assert_eq!(found, vec![&json!("Big"), &json!("Bigger")]);
        let none = resolve(&d, r#"$[?(@._template=="article")].title"#);
        assert!(none.is_empty());
    }

    #[test]
    fn test_invalid_path() {
        assert!(resolve(&doc(), "blocks[?bad").is_empty());
    }
}
