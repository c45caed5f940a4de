//! Error types for GraphQL parsing

/// Error that occurred during parsing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Syntax Error: {message}{}", location_suffix(.line, .column))]
pub struct ParseError {
    pub message: String,
    pub position: Option<usize>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(col)) => format!(" ({}:{})", line, col),
        _ => String::new(),
    }
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            line: None,
            column: None,
        }
    }

    /// Attach the location of `remaining` inside `source`
    pub fn at(mut self, source: &str, remaining: &str) -> Self {
        let pos = source.len().saturating_sub(remaining.len());
        let consumed = &source[..pos];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed.rfind('\n').map(|i| pos - i).unwrap_or(pos + 1);
        self.position = Some(pos);
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Convert a nom error, locating it in the original source
    pub(crate) fn from_nom(source: &str, err: nom::Err<nom::error::Error<&str>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => ParseError::new("Unexpected end of input"),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                let near: String = e.input.chars().take(20).collect();
                let message = if near.is_empty() {
                    "Unexpected end of input".to_string()
                } else {
                    format!("Unexpected input near {:?}", near)
                };
                ParseError::new(message).at(source, e.input)
            }
        }
    }
}
