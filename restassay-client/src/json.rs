//! JSON documents queried with a small path language.
//!
//! Supported syntax: `$` (root), `.key`, `['key']` or `["key"]`, `[index]`,
//! and the wildcards `.*` and `[*]`. A path without a leading `$` is read
//! relative to the root, so `data.user.id` equals `$.data.user.id`.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::{Error, Result};

/// An immutable, parsed JSON document.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    value: Arc<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

impl JsonDocument {
    /// Parse JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        let value = serde_json::from_str(text)
            .map_err(|e| Error::Document(format!("malformed JSON: {}", e)))?;
        Ok(Self::from_value(value))
    }

    /// Wrap an already parsed value.
    pub fn from_value(value: Value) -> Self {
        Self {
            value: Arc::new(value),
        }
    }

    /// The document root.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Evaluate a path and return matches as strings. String values are
    /// returned unquoted; everything else is returned as compact JSON.
    pub fn json(&self, query: &str) -> Result<Vec<String>> {
        Ok(self
            .select(query)?
            .into_iter()
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect())
    }

    /// Evaluate a path and return each match as its own document.
    pub fn nodes(&self, query: &str) -> Result<Vec<JsonDocument>> {
        Ok(self
            .select(query)?
            .into_iter()
            .map(|value| Self::from_value(value.clone()))
            .collect())
    }

    fn select(&self, query: &str) -> Result<Vec<&Value>> {
        let segments = parse_path(query)?;
        let mut current = vec![self.value.as_ref()];
        for segment in &segments {
            current = current
                .into_iter()
                .flat_map(|value| step(value, segment))
                .collect();
        }
        Ok(current)
    }
}

impl fmt::Display for JsonDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

fn step<'v>(value: &'v Value, segment: &Segment) -> Vec<&'v Value> {
    match (segment, value) {
        (Segment::Key(key), Value::Object(map)) => map.get(key).into_iter().collect(),
        (Segment::Index(index), Value::Array(items)) => items.get(*index).into_iter().collect(),
        (Segment::Wildcard, Value::Array(items)) => items.iter().collect(),
        (Segment::Wildcard, Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    }
}

fn parse_path(query: &str) -> Result<Vec<Segment>> {
    let invalid = |reason: &str| Error::Document(format!("invalid JSON path '{}': {}", query, reason));

    let path = query.trim();
    let mut rest = match path.strip_prefix('$') {
        Some(rest) => rest,
        None if path.is_empty() => return Err(invalid("empty path")),
        // Relative paths start with a bare key.
        None => path,
    };
    let mut segments = Vec::new();
    let mut first = !path.starts_with('$');

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(|| invalid("unclosed '['"))?;
            let inner = after[..close].trim();
            segments.push(bracket_segment(inner).ok_or_else(|| invalid("bad bracket expression"))?);
            rest = &after[close + 1..];
        } else {
            let body = match rest.strip_prefix('.') {
                Some(body) => body,
                None if first => rest,
                None => return Err(invalid("expected '.' or '['")),
            };
            let end = body.find(['.', '[']).unwrap_or(body.len());
            let key = &body[..end];
            if key.is_empty() {
                return Err(invalid("empty key"));
            }
            segments.push(if key == "*" {
                Segment::Wildcard
            } else {
                Segment::Key(key.to_string())
            });
            rest = &body[end..];
        }
        first = false;
    }
    Ok(segments)
}

fn bracket_segment(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if let Some(key) = inner
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return Some(Segment::Key(key.to_string()));
        }
    }
    inner.parse().ok().map(Segment::Index)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "data": {
            "user": {"id": 42, "name": "John", "active": true},
            "tags": ["a", "b", "c"],
            "items": [{"sku": "x1", "qty": 2}, {"sku": "x2", "qty": 5}]
        }
    }"#;

    fn doc() -> JsonDocument {
        JsonDocument::parse(DOC).unwrap()
    }

    #[test]
    fn test_parse_path() {
        assert!(parse_path("$").unwrap().is_empty());
        assert_eq!(
            parse_path("$.data['user'][0].*").unwrap(),
            vec![
                Segment::Key("data".into()),
                Segment::Key("user".into()),
                Segment::Index(0),
                Segment::Wildcard,
            ]
        );
        assert_eq!(parse_path("data.tags[*]").unwrap().len(), 3);
        assert!(parse_path("").is_err());
        assert!(parse_path("$.data[").is_err());
        assert!(parse_path("$..data").is_err());
        assert!(parse_path("$data").is_err());
    }

    #[test]
    fn test_scalars() {
        let document = doc();
        assert_eq!(document.json("$.data.user.name").unwrap(), vec!["John"]);
        assert_eq!(document.json("$.data.user.id").unwrap(), vec!["42"]);
        assert_eq!(document.json("data.user.active").unwrap(), vec!["true"]);
        assert_eq!(document.json("$.data.tags[1]").unwrap(), vec!["b"]);
    }

    #[test]
    fn test_wildcards() {
        let document = doc();
        assert_eq!(document.json("$.data.tags[*]").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(document.json("$.data.items[*].sku").unwrap(), vec!["x1", "x2"]);
        assert_eq!(document.json("$.data.items.*.qty").unwrap(), vec!["2", "5"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let document = doc();
        assert!(document.json("$.data.missing").unwrap().is_empty());
        assert!(document.json("$.data.tags[9]").unwrap().is_empty());
        assert!(document.json("$.data.user[0]").unwrap().is_empty());
    }

    #[test]
    fn test_nodes() {
        let document = doc();
        let items = document.nodes("$.data.items[*]").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].json("$.qty").unwrap(), vec!["5"]);
        assert_eq!(items[0].value(), &serde_json::json!({"sku": "x1", "qty": 2}));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(JsonDocument::parse("{\"a\":"), Err(Error::Document(_))));
    }
}
