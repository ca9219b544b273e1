//! Field path resolution over schema-less JSON payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single step in a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Key(String),
    Index(i64),
    Wildcard,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{k}"),
            Segment::Index(i) => write!(f, "{i}"),
            Segment::Wildcard => write!(f, "*"),
        }
    }
}

/// An ordered list of path segments selecting a value out of a nested payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct FieldPath(pub Vec<Segment>);

impl FieldPath {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn wildcard_count(&self) -> usize {
        self.0
            .iter()
            .filter(|s| matches!(s, Segment::Wildcard))
            .count()
    }

    pub fn has_wildcard(&self) -> bool {
        self.wildcard_count() > 0
    }

    /// Replace wildcard segments, in order, with concrete indices taken
    /// during resolution — used to build `matched_field` diagnostics.
    fn concretize(&self, taken: &[usize]) -> FieldPath {
        let mut taken_iter = taken.iter();
        let segments = self
            .0
            .iter()
            .map(|seg| match seg {
                Segment::Wildcard => Segment::Index(*taken_iter.next().unwrap_or(&0) as i64),
                other => other.clone(),
            })
            .collect();
        FieldPath(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "[{}]", rendered.join("."))
    }
}

/// One resolved (concrete path, value) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    pub path: FieldPath,
    pub value: &'a Value,
}

/// Resolve a field path against a payload.
///
/// Returns every `(concrete_path, value)` pair reachable by the path;
/// wildcard segments fan out, so a path with wildcards may yield more than
/// one entry. A path without wildcards yields 0 or 1 entries. Any
/// non-applicable step (string key on an array, missing object key, null
/// intermediate, out-of-bounds index) simply drops that branch rather than
/// erroring — the caller interprets an empty result as "missing".
pub fn resolve<'a>(path: &FieldPath, payload: &'a Value) -> Vec<Resolved<'a>> {
    let mut out = Vec::new();
    walk(&path.0, payload, &mut Vec::new(), &mut out);
    out.into_iter()
        .map(|(taken, value)| Resolved {
            path: path.concretize(&taken),
            value,
        })
        .collect()
}

fn walk<'a>(
    segments: &[Segment],
    current: &'a Value,
    taken: &mut Vec<usize>,
    out: &mut Vec<(Vec<usize>, &'a Value)>,
) {
    let Some((head, rest)) = segments.split_first() else {
        out.push((taken.clone(), current));
        return;
    };

    match head {
        Segment::Key(key) => {
            if let Value::Object(map) = current {
                if let Some(next) = map.get(key) {
                    walk(rest, next, taken, out);
                }
            }
        }
        Segment::Index(idx) => {
            if let Value::Array(items) = current {
                if let Some(resolved_idx) = non_negative(*idx, items.len()) {
                    walk(rest, &items[resolved_idx], taken, out);
                }
            }
        }
        Segment::Wildcard => match current {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    taken.push(i);
                    walk(rest, item, taken, out);
                    taken.pop();
                }
            }
            Value::Object(map) => {
                for (i, (_, item)) in map.iter().enumerate() {
                    taken.push(i);
                    walk(rest, item, taken, out);
                    taken.pop();
                }
            }
            _ => {}
        },
    }
}

fn non_negative(idx: i64, len: usize) -> Option<usize> {
    if idx < 0 {
        return None;
    }
    let idx = idx as usize;
    (idx < len).then_some(idx)
}

/// A resolved value is null-like if it is JSON `null`, or if resolution
/// produced no entries at all (missing path).
pub fn is_null_like(value: &Value) -> bool {
    value.is_null()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(s: &str) -> Segment {
        Segment::Key(s.to_string())
    }

    #[test]
    fn resolves_simple_key() {
        let payload = json!({"temperature": 105});
        let path = FieldPath::new(vec![key("temperature")]);
        let resolved = resolve(&path, &payload);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].value, &json!(105));
    }

    #[test]
    fn missing_key_yields_empty() {
        let payload = json!({"a": 1});
        let path = FieldPath::new(vec![key("b")]);
        assert!(resolve(&path, &payload).is_empty());
    }

    #[test]
    fn negative_and_out_of_bounds_index_is_missing() {
        let payload = json!([1, 2, 3]);
        let neg = FieldPath::new(vec![Segment::Index(-1)]);
        let oob = FieldPath::new(vec![Segment::Index(10)]);
        assert!(resolve(&neg, &payload).is_empty());
        assert!(resolve(&oob, &payload).is_empty());
    }

    #[test]
    fn wildcard_fans_out_over_array() {
        let payload = json!({"readings": [{"temp": 50}, {"temp": 105}, {"temp": 200}]});
        let path = FieldPath::new(vec![key("readings"), Segment::Wildcard, key("temp")]);
        let resolved = resolve(&path, &payload);
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[1].value, &json!(105));
        assert_eq!(
            resolved[1].path,
            FieldPath::new(vec![key("readings"), Segment::Index(1), key("temp")])
        );
    }

    #[test]
    fn wildcard_over_empty_array_is_missing() {
        let payload = json!({"readings": []});
        let path = FieldPath::new(vec![key("readings"), Segment::Wildcard]);
        assert!(resolve(&path, &payload).is_empty());
    }

    #[test]
    fn string_segment_on_array_is_missing() {
        let payload = json!([1, 2, 3]);
        let path = FieldPath::new(vec![key("x")]);
        assert!(resolve(&path, &payload).is_empty());
    }

    #[test]
    fn null_intermediate_is_missing() {
        let payload = json!({"a": null});
        let path = FieldPath::new(vec![key("a"), key("b")]);
        assert!(resolve(&path, &payload).is_empty());
    }

    #[test]
    fn wildcard_count_counts_all_wildcard_segments() {
        let path = FieldPath::new(vec![Segment::Wildcard, key("a"), Segment::Wildcard]);
        assert_eq!(path.wildcard_count(), 2);
    }
}
