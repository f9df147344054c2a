use serde_json::Value as JsonValue;
use thiserror::Error;

/// Front matter lifted off the top of a documentation page.
#[derive(Debug)]
pub struct Frontmatter {
    /// Parsed YAML mapping as a JSON value.
    pub metadata: JsonValue,
    /// Byte offset where the page body begins.
    pub body_start: usize,
}

impl Frontmatter {
    fn empty() -> Self {
        Self {
            metadata: JsonValue::Object(Default::default()),
            body_start: 0,
        }
    }

    /// The `title` entry, when present and a string.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(JsonValue::as_str)
    }
}

/// Errors emitted while reading front matter.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    /// Opening `---` fence with no closing fence.
    #[error("unterminated front matter block: expected closing '---'")]
    Unterminated,
    /// YAML failed to parse.
    #[error("front matter parse error: {0}")]
    Parse(String),
    /// Top-level YAML node was not a mapping.
    #[error("front matter must be a YAML mapping at the top level")]
    InvalidRootType,
}

/// Extracts the leading `---` fenced YAML block from a page.
///
/// Pages without a fence yield empty metadata with `body_start` 0. A
/// UTF-8 BOM and blank lines before the opening fence are tolerated.
pub fn extract_frontmatter(input: &str) -> Result<Frontmatter, FrontmatterError> {
    let (text, bom_len) = match input.strip_prefix('\u{feff}') {
        Some(stripped) => (stripped, '\u{feff}'.len_utf8()),
        None => (input, 0),
    };

    let mut cursor = 0usize;
    let opening = loop {
        let Some((line, after)) = next_line(text, cursor) else {
            return Ok(Frontmatter::empty());
        };
        if line.trim().is_empty() {
            cursor = after;
            continue;
        }
        if line.trim_end_matches('\r') != "---" {
            return Ok(Frontmatter::empty());
        }
        break after;
    };

    let mut scan = opening;
    loop {
        let Some((line, after)) = next_line(text, scan) else {
            return Err(FrontmatterError::Unterminated);
        };
        if line.trim_end_matches('\r') == "---" {
            let block = text[opening..scan].trim_end_matches(['\r', '\n']);
            let metadata = parse_mapping(block)?;
            return Ok(Frontmatter {
                metadata,
                body_start: bom_len + after,
            });
        }
        scan = after;
    }
}

fn parse_mapping(block: &str) -> Result<JsonValue, FrontmatterError> {
    if block.trim().is_empty() {
        return Ok(JsonValue::Object(Default::default()));
    }

    let yaml: serde_yaml::Value =
        serde_yaml::from_str(block).map_err(|err| FrontmatterError::Parse(err.to_string()))?;
    let json =
        serde_json::to_value(yaml).map_err(|err| FrontmatterError::Parse(err.to_string()))?;

    match json {
        JsonValue::Null => Ok(JsonValue::Object(Default::default())),
        JsonValue::Object(_) => Ok(json),
        _ => Err(FrontmatterError::InvalidRootType),
    }
}

fn next_line(input: &str, start: usize) -> Option<(&str, usize)> {
    if start >= input.len() {
        return None;
    }

    let bytes = &input.as_bytes()[start..];
    match bytes.iter().position(|b| *b == b'\n') {
        Some(pos) => {
            let line_end = start + pos;
            Some((&input[start..line_end], line_end + 1))
        }
        None => Some((&input[start..], input.len())),
    }
}
