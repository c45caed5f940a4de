//! Glob patterns over `/`-separated paths
//!
//! `*` and `?` never cross a `/`, `**` does, and `{a,b}` picks one of its
//! alternatives.

use regex::Regex;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&to_regex(pattern)).map_err(|e| Error::Other(format!("Invalid glob '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Longest directory prefix without glob characters
    pub fn base(&self) -> &str {
        let magic = self
            .pattern
            .find(|c| matches!(c, '*' | '?' | '{' | '['))
            .unwrap_or(self.pattern.len());
        match self.pattern[..magic].rfind('/') {
            Some(slash) => &self.pattern[..slash],
            None if magic == self.pattern.len() => self.pattern.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(""),
            None => "",
        }
    }
}

fn to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    let mut in_group = false;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out.push('$');
    out
}
