//! Field-path parsing and resolution
//!
//! Rule conditions address the design specification with dotted paths that
//! may traverse arrays: `setbacks.front`, `spaces[*].area`,
//! `spaces[?(@.type=='bedroom')].area`, `floors[0].height`. Paths are parsed
//! once into a small AST when the rule set is loaded and resolved many times
//! during validation; resolution never fails on missing data.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Error raised while parsing a path string (load time only)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field path '{path}': {message}")]
pub struct PathParseError {
    pub path: String,
    pub message: String,
}

/// Comparison operator inside a `[?(@.key==value)]` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// One step of a parsed path
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Object key lookup (`setbacks`)
    Field(String),
    /// Every element of an array (`[*]`)
    Wildcard,
    /// A single array element (`[0]`)
    Index(usize),
    /// Array elements whose `key` matches a literal (`[?(@.type=='bedroom')]`)
    Filter {
        key: String,
        op: FilterOp,
        literal: Value,
    },
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a path string into its segment AST.
    pub fn parse(raw: &str) -> Result<Self, PathParseError> {
        let err = |message: &str| PathParseError {
            path: raw.to_string(),
            message: message.to_string(),
        };

        if raw.trim().is_empty() {
            return Err(err("path is empty"));
        }

        let mut segments = Vec::new();
        let mut rest = raw;
        loop {
            // Field name runs up to the next '.' or '['
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            let name = &rest[..end];
            if name.is_empty() {
                return Err(err("expected a field name"));
            }
            segments.push(Segment::Field(name.to_string()));
            rest = &rest[end..];

            // Bracket suffixes: [*], [n], [?(@.key==value)]
            while let Some(after) = rest.strip_prefix('[') {
                let close = after.find(']').ok_or_else(|| err("unterminated '['"))?;
                segments.push(parse_bracket(&after[..close]).map_err(|m| err(&m))?);
                rest = &after[close + 1..];
            }

            if rest.is_empty() {
                break;
            }
            rest = rest
                .strip_prefix('.')
                .ok_or_else(|| err("expected '.' between segments"))?;
            if rest.is_empty() {
                return Err(err("trailing '.'"));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The original path string.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Resolve the path against a document, returning every matched value.
    ///
    /// Missing intermediate keys, array syntax applied to non-arrays, and
    /// out-of-range indexes all yield an empty result rather than an error.
    /// Matches are returned in document order.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![doc];
        for segment in &self.segments {
            let mut next = Vec::new();
            match segment {
                Segment::Field(name) => {
                    for value in current {
                        if let Some(child) = value.get(name.as_str()) {
                            next.push(child);
                        }
                    }
                }
                Segment::Wildcard => {
                    for value in current {
                        if let Value::Array(items) = value {
                            next.extend(items.iter());
                        }
                    }
                }
                Segment::Index(index) => {
                    for value in current {
                        if let Some(child) = value.get(*index) {
                            next.push(child);
                        }
                    }
                }
                Segment::Filter { key, op, literal } => {
                    for value in current {
                        if let Value::Array(items) = value {
                            next.extend(items.iter().filter(|item| {
                                let equal = item
                                    .get(key.as_str())
                                    .map(|found| values_equal(found, literal))
                                    .unwrap_or(false);
                                match op {
                                    FilterOp::Eq => equal,
                                    FilterOp::Ne => !equal,
                                }
                            }));
                        }
                    }
                }
            }
            if next.is_empty() {
                return Vec::new();
            }
            current = next;
        }
        current
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Parse the inside of one `[...]` suffix.
fn parse_bracket(inner: &str) -> Result<Segment, String> {
    let inner = inner.trim();
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    if inner.chars().all(|c| c.is_ascii_digit()) && !inner.is_empty() {
        return inner
            .parse()
            .map(Segment::Index)
            .map_err(|_| format!("index '{}' out of range", inner));
    }
    if let Some(predicate) = inner
        .strip_prefix("?(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let predicate = predicate
            .trim()
            .strip_prefix("@.")
            .ok_or_else(|| "filter predicate must start with '@.'".to_string())?;
        let (key, op, literal) = if let Some(idx) = predicate.find("==") {
            (&predicate[..idx], FilterOp::Eq, &predicate[idx + 2..])
        } else if let Some(idx) = predicate.find("!=") {
            (&predicate[..idx], FilterOp::Ne, &predicate[idx + 2..])
        } else {
            return Err("filter predicate must use '==' or '!='".to_string());
        };
        let key = key.trim();
        if key.is_empty() {
            return Err("filter predicate is missing a key".to_string());
        }
        return Ok(Segment::Filter {
            key: key.to_string(),
            op,
            literal: parse_literal(literal.trim())?,
        });
    }
    Err(format!("unrecognized bracket expression '[{}]'", inner))
}

/// Parse a filter literal: quoted string, number, or boolean.
fn parse_literal(text: &str) -> Result<Value, String> {
    if text.len() >= 2
        && ((text.starts_with('\'') && text.ends_with('\''))
            || (text.starts_with('"') && text.ends_with('"')))
    {
        return Ok(Value::String(text[1..text.len() - 1].to_string()));
    }
    match text {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(number) = text.parse::<f64>() {
        return serde_json::Number::from_f64(number)
            .map(Value::Number)
            .ok_or_else(|| format!("non-finite number literal '{}'", text));
    }
    Err(format!("unrecognized filter literal '{}'", text))
}

/// Value equality that compares numbers numerically (so `9 == 9.0`).
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn resolve(path: &str, doc: &Value) -> Vec<Value> {
        FieldPath::parse(path)
            .unwrap()
            .resolve(doc)
            .into_iter()
            .cloned()
            .collect()
    }

    #[test]
    fn test_parse_dotted() {
        let path = FieldPath::parse("setbacks.front").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Field("setbacks".to_string()),
                Segment::Field("front".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_wildcard_and_index() {
        let path = FieldPath::parse("spaces[*].area").unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.segments()[1], Segment::Wildcard);

        let path = FieldPath::parse("floors[2].height").unwrap();
        assert_eq!(path.segments()[1], Segment::Index(2));
    }

    #[test]
    fn test_parse_filter() {
        let path = FieldPath::parse("spaces[?(@.type=='bedroom')].area").unwrap();
        assert_eq!(
            path.segments()[1],
            Segment::Filter {
                key: "type".to_string(),
                op: FilterOp::Eq,
                literal: Value::String("bedroom".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_filter_literals() {
        let path = FieldPath::parse("spaces[?(@.floor==2)].area").unwrap();
        assert!(matches!(
            &path.segments()[1],
            Segment::Filter { literal, .. } if literal.as_f64() == Some(2.0)
        ));

        let path = FieldPath::parse("spaces[?(@.accessible==true)]").unwrap();
        assert!(matches!(
            &path.segments()[1],
            Segment::Filter { literal, .. } if literal == &Value::Bool(true)
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("   ").is_err());
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse("a.").is_err());
        assert!(FieldPath::parse("spaces[").is_err());
        assert!(FieldPath::parse("spaces[?(type=='x')]").is_err());
        assert!(FieldPath::parse("spaces[?(@.type~'x')]").is_err());
        assert!(FieldPath::parse("spaces[oops]").is_err());
    }

    #[test]
    fn test_resolve_dotted() {
        let doc = json!({"setbacks": {"front": 4.5, "rear": 3.0}});
        assert_eq!(resolve("setbacks.front", &doc), vec![json!(4.5)]);
    }

    #[test]
    fn test_resolve_missing_is_empty() {
        let doc = json!({"building": {"floors": 2}});
        assert!(resolve("setbacks.front", &doc).is_empty());
        assert!(resolve("building.height.meters", &doc).is_empty());
    }

    #[test]
    fn test_resolve_wildcard_preserves_order() {
        let doc = json!({"spaces": [
            {"type": "bedroom", "area": 8.0},
            {"type": "kitchen", "area": 12.0},
            {"type": "bedroom", "area": 10.0},
        ]});
        assert_eq!(
            resolve("spaces[*].area", &doc),
            vec![json!(8.0), json!(12.0), json!(10.0)]
        );
    }

    #[test]
    fn test_resolve_filter() {
        let doc = json!({"spaces": [
            {"type": "bedroom", "area": 8.0},
            {"type": "kitchen", "area": 12.0},
            {"type": "bedroom", "area": 10.0},
        ]});
        assert_eq!(
            resolve("spaces[?(@.type=='bedroom')].area", &doc),
            vec![json!(8.0), json!(10.0)]
        );
        assert_eq!(
            resolve("spaces[?(@.type!='bedroom')].area", &doc),
            vec![json!(12.0)]
        );
    }

    #[test]
    fn test_resolve_numeric_filter_matches_int_and_float() {
        let doc = json!({"spaces": [
            {"floor": 2, "area": 9.0},
            {"floor": 1, "area": 11.0},
        ]});
        assert_eq!(resolve("spaces[?(@.floor==2)].area", &doc), vec![json!(9.0)]);
    }

    #[test]
    fn test_resolve_array_syntax_on_non_array_is_empty() {
        let doc = json!({"spaces": {"type": "bedroom"}});
        assert!(resolve("spaces[*].type", &doc).is_empty());
        assert!(resolve("spaces[0]", &doc).is_empty());
        assert!(resolve("spaces[?(@.type=='bedroom')]", &doc).is_empty());
    }

    #[test]
    fn test_resolve_index() {
        let doc = json!({"floors": [{"height": 2.4}, {"height": 2.7}]});
        assert_eq!(resolve("floors[1].height", &doc), vec![json!(2.7)]);
        assert!(resolve("floors[5].height", &doc).is_empty());
    }

    #[test]
    fn test_values_equal() {
        assert!(values_equal(&json!(9), &json!(9.0)));
        assert!(values_equal(&json!("a"), &json!("a")));
        assert!(!values_equal(&json!("9"), &json!(9)));
    }
}
