//! YAML front matter parsing and rendering
//!
//! Markdown documents keep their fields in front matter delimited by `---`:
//!
//! ```markdown
//! ---
//! title: My Post
//! tags: [rust, graphql]
//! ---
//!
//! # Body content here
//! ```

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Split markdown content into front matter fields and body
pub fn parse(content: &str) -> Result<(Map<String, Value>, String)> {
    let content = content.trim_start_matches('\u{feff}');
    let trimmed = content.trim_start();

    if !trimmed.starts_with("---") {
        return Ok((Map::new(), content.to_string()));
    }

    let rest = &trimmed[3..];
    let end_pos = rest.find("\n---").ok_or_else(|| Error::YamlParseError {
        message: "Unclosed front matter: missing closing ---".to_string(),
    })?;

    let yaml_content = rest[..end_pos].trim();
    let after = &rest[end_pos + 4..];
    // Rest of the closing delimiter line
    let body = match after.find('\n') {
        Some(newline) => &after[newline + 1..],
        None => "",
    };
    let body = body.trim_start_matches('\n').to_string();

    if yaml_content.is_empty() {
        return Ok((Map::new(), body));
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(yaml_content)?;
    match yaml_to_json(yaml)? {
        Value::Object(fields) => Ok((fields, body)),
        Value::Null => Ok((Map::new(), body)),
        _ => Err(Error::YamlParseError {
            message: "Front matter must be a YAML mapping".to_string(),
        }),
    }
}

/// Render fields and body back to markdown with front matter
pub fn render(fields: &Map<String, Value>, body: &str) -> Result<String> {
    if fields.is_empty() {
        return Ok(body.to_string());
    }
    let yaml = serde_yaml::to_string(fields)?;
    if body.is_empty() {
        Ok(format!("---\n{}---\n", yaml))
    } else {
        Ok(format!("---\n{}---\n\n{}", yaml, body))
    }
}

/// Convert YAML into JSON, keeping only string-keyed mappings
pub fn yaml_to_json(value: serde_yaml::Value) -> Result<Value> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64().and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect::<Result<_>>()?),
        serde_yaml::Value::Mapping(map) => {
            let mut obj = Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    _ => {
                        return Err(Error::YamlParseError {
                            message: "Non-scalar key in front matter".to_string(),
                        })
                    }
                };
                obj.insert(key, yaml_to_json(v)?);
            }
            Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}
