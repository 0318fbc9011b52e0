use genome_core::{expand_field, GenomeError, Result};
use regex::Regex;
use serde_json::Value;

/// A structured filter tree over node projections.
///
/// Wire forms accepted:
/// - compound: `{"and": [...]}`, `{"or": [...]}`, `{"not": {...}}`
/// - leaves: `{"field": "criticality", "op": "gt", "value": 0.5}`,
///   `{"field": "file", "regex": "^src/"}`, `{"field": "type", "in": [..]}`,
///   `{"field": "criticality", "between": [0.2, 0.8]}`
/// - shorthand: `{"type": "function", "language": "Python"}` is an
///   implicit AND of equality leaves.
#[derive(Debug, Clone)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Leaf(Leaf),
    True,
}

#[derive(Debug, Clone)]
pub struct Leaf {
    pub field: String,
    pub op: LeafOp,
}

#[derive(Debug, Clone)]
pub enum LeafOp {
    Eq(Value),
    Ne(Value),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    Regex(Regex),
    In(Vec<Value>),
    Between(f64, f64),
}

fn number(value: &Value, context: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| GenomeError::InvalidInput(format!("{context} expects a number")))
}

fn parse_leaf(object: &serde_json::Map<String, Value>) -> Result<Predicate> {
    let field = object
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| GenomeError::InvalidInput("leaf predicate requires a field".into()))?;
    let field = expand_field(field).to_string();

    if let Some(pattern) = object.get("regex") {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| GenomeError::InvalidInput("regex must be a string".into()))?;
        let regex = Regex::new(pattern)
            .map_err(|e| GenomeError::InvalidInput(format!("invalid regex: {e}")))?;
        return Ok(Predicate::Leaf(Leaf {
            field,
            op: LeafOp::Regex(regex),
        }));
    }
    if let Some(values) = object.get("in") {
        let values = values
            .as_array()
            .ok_or_else(|| GenomeError::InvalidInput("in expects an array".into()))?;
        return Ok(Predicate::Leaf(Leaf {
            field,
            op: LeafOp::In(values.clone()),
        }));
    }
    if let Some(range) = object.get("between") {
        let range = range
            .as_array()
            .filter(|r| r.len() == 2)
            .ok_or_else(|| GenomeError::InvalidInput("between expects [lo, hi]".into()))?;
        return Ok(Predicate::Leaf(Leaf {
            field,
            op: LeafOp::Between(number(&range[0], "between")?, number(&range[1], "between")?),
        }));
    }

    let op = object.get("op").and_then(Value::as_str).unwrap_or("eq");
    let value = object.get("value").cloned().unwrap_or(Value::Null);
    let op = match op {
        "eq" => LeafOp::Eq(value),
        "ne" => LeafOp::Ne(value),
        "gt" => LeafOp::Gt(number(&value, "gt")?),
        "gte" => LeafOp::Gte(number(&value, "gte")?),
        "lt" => LeafOp::Lt(number(&value, "lt")?),
        "lte" => LeafOp::Lte(number(&value, "lte")?),
        other => {
            return Err(GenomeError::InvalidInput(format!("unknown operator '{other}'")));
        }
    };
    Ok(Predicate::Leaf(Leaf {
        field,
        op,
    }))
}

impl Predicate {
    pub fn parse(value: &Value) -> Result<Predicate> {
        match value {
            Value::Null => Ok(Predicate::True),
            Value::Object(object) if object.is_empty() => Ok(Predicate::True),
            Value::Object(object) => {
                if let Some(children) = object.get("and") {
                    return Self::parse_compound(children).map(Predicate::And);
                }
                if let Some(children) = object.get("or") {
                    return Self::parse_compound(children).map(Predicate::Or);
                }
                if let Some(child) = object.get("not") {
                    return Ok(Predicate::Not(Box::new(Self::parse(child)?)));
                }
                if object.contains_key("field") {
                    return parse_leaf(object);
                }
                // Shorthand object: implicit AND of equality leaves.
                let mut leaves = Vec::new();
                for (key, value) in object {
                    leaves.push(Predicate::Leaf(Leaf {
                        field: expand_field(key).to_string(),
                        op: LeafOp::Eq(value.clone()),
                    }));
                }
                Ok(Predicate::And(leaves))
            }
            _ => Err(GenomeError::InvalidInput(
                "predicate must be an object".into(),
            )),
        }
    }

    fn parse_compound(children: &Value) -> Result<Vec<Predicate>> {
        let children = children
            .as_array()
            .ok_or_else(|| GenomeError::InvalidInput("and/or expect an array".into()))?;
        children.iter().map(Self::parse).collect()
    }

    /// Evaluate against a node projection (which includes its `id`).
    pub fn matches(&self, node: &Value) -> bool {
        match self {
            Predicate::True => true,
            Predicate::And(children) => children.iter().all(|c| c.matches(node)),
            Predicate::Or(children) => children.iter().any(|c| c.matches(node)),
            Predicate::Not(child) => !child.matches(node),
            Predicate::Leaf(leaf) => leaf.matches(node),
        }
    }

    /// Canonical serialized form for cache keys: operators and fields in a
    /// stable order, regexes by their pattern text.
    pub fn cache_key(&self) -> String {
        match self {
            Predicate::True => "true".to_string(),
            Predicate::And(children) => {
                let mut keys: Vec<String> = children.iter().map(|c| c.cache_key()).collect();
                keys.sort();
                format!("and({})", keys.join(","))
            }
            Predicate::Or(children) => {
                let mut keys: Vec<String> = children.iter().map(|c| c.cache_key()).collect();
                keys.sort();
                format!("or({})", keys.join(","))
            }
            Predicate::Not(child) => format!("not({})", child.cache_key()),
            Predicate::Leaf(leaf) => {
                let op = match &leaf.op {
                    LeafOp::Eq(v) => format!("eq:{v}"),
                    LeafOp::Ne(v) => format!("ne:{v}"),
                    LeafOp::Gt(v) => format!("gt:{v}"),
                    LeafOp::Gte(v) => format!("gte:{v}"),
                    LeafOp::Lt(v) => format!("lt:{v}"),
                    LeafOp::Lte(v) => format!("lte:{v}"),
                    LeafOp::Regex(r) => format!("re:{}", r.as_str()),
                    LeafOp::In(values) => format!(
                        "in:{}",
                        values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("|")
                    ),
                    LeafOp::Between(lo, hi) => format!("between:{lo}:{hi}"),
                };
                format!("{}={op}", leaf.field)
            }
        }
    }
}

impl Leaf {
    fn matches(&self, node: &Value) -> bool {
        let found = node.get(&self.field).unwrap_or(&Value::Null);
        match &self.op {
            LeafOp::Eq(expected) => loose_eq(found, expected),
            LeafOp::Ne(expected) => !loose_eq(found, expected),
            LeafOp::Gt(bound) => found.as_f64().is_some_and(|v| v > *bound),
            LeafOp::Gte(bound) => found.as_f64().is_some_and(|v| v >= *bound),
            LeafOp::Lt(bound) => found.as_f64().is_some_and(|v| v < *bound),
            LeafOp::Lte(bound) => found.as_f64().is_some_and(|v| v <= *bound),
            LeafOp::Regex(regex) => found.as_str().is_some_and(|s| regex.is_match(s)),
            LeafOp::In(values) => values.iter().any(|v| loose_eq(found, v)),
            LeafOp::Between(lo, hi) => found.as_f64().is_some_and(|v| v >= *lo && v <= *hi),
        }
    }
}

/// Equality tolerant of string/number representation differences on the
/// wire (`"0.5"` vs `0.5`), and case-insensitive for language tags.
fn loose_eq(found: &Value, expected: &Value) -> bool {
    if found == expected {
        return true;
    }
    match (found.as_str(), expected.as_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => match (found.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node() -> Value {
        json!({
            "id": "auth/login.authenticate",
            "type": "function",
            "file": "auth/login.py",
            "language": "Python",
            "visibility": "public",
            "criticality": 0.6
        })
    }

    #[test]
    fn shorthand_object_is_implicit_and() {
        let predicate =
            Predicate::parse(&json!({"type": "function", "language": "Python"})).unwrap();
        assert!(predicate.matches(&node()));

        let predicate = Predicate::parse(&json!({"type": "class"})).unwrap();
        assert!(!predicate.matches(&node()));
    }

    #[test]
    fn compound_and_or_not() {
        let predicate = Predicate::parse(&json!({
            "or": [
                {"field": "type", "op": "eq", "value": "class"},
                {"not": {"field": "language", "op": "eq", "value": "Rust"}}
            ]
        }))
        .unwrap();
        assert!(predicate.matches(&node()));
    }

    #[test]
    fn numeric_operators() {
        let gt = Predicate::parse(&json!({"field": "criticality", "op": "gt", "value": 0.5}))
            .unwrap();
        assert!(gt.matches(&node()));
        let between =
            Predicate::parse(&json!({"field": "c", "between": [0.5, 0.7]})).unwrap();
        assert!(between.matches(&node()));
        let lt = Predicate::parse(&json!({"field": "criticality", "op": "lt", "value": 0.5}))
            .unwrap();
        assert!(!lt.matches(&node()));
    }

    #[test]
    fn regex_and_in() {
        let regex = Predicate::parse(&json!({"field": "f", "regex": "^auth/"})).unwrap();
        assert!(regex.matches(&node()));
        let is_in =
            Predicate::parse(&json!({"field": "type", "in": ["function", "class"]})).unwrap();
        assert!(is_in.matches(&node()));
    }

    #[test]
    fn aliases_expand_in_leaves() {
        let predicate = Predicate::parse(&json!({"t": "function"})).unwrap();
        assert!(predicate.matches(&node()));
    }

    #[test]
    fn invalid_regex_is_invalid_input() {
        let err = Predicate::parse(&json!({"field": "f", "regex": "("})).unwrap_err();
        assert_eq!(err.code(), "invalid-input");
    }

    #[test]
    fn cache_key_is_order_insensitive_for_and() {
        let a = Predicate::parse(&json!({"type": "function", "language": "Python"})).unwrap();
        let b = Predicate::parse(&json!({"language": "Python", "type": "function"})).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }
}
