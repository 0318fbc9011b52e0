use serde_json::Value;

/// Normative short aliases from the compact field table. Projection
/// requests accept either form; responses echo the requested spelling.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("t", "type"),
    ("f", "file"),
    ("lang", "language"),
    ("v", "visibility"),
    ("s", "summary"),
    ("c", "criticality"),
    ("fr", "from"),
    ("to", "to"),
    ("ep", "entry_points"),
    ("cd", "core_domains"),
    ("cs", "churn_score"),
    ("rs", "risk_score"),
];

/// Expand a (possibly aliased) field name to its canonical long form.
pub fn expand_field(field: &str) -> &str {
    FIELD_ALIASES
        .iter()
        .find(|(short, _)| *short == field)
        .map(|(_, long)| *long)
        .unwrap_or(field)
}

/// Project a JSON object onto the requested fields. Unknown fields are
/// silently omitted; `id` is always preserved when present. Keys in the
/// output use the caller's spelling (short or long).
pub fn project_fields(value: &Value, fields: &[String]) -> Value {
    let Some(object) = value.as_object() else {
        return value.clone();
    };

    let mut out = serde_json::Map::new();
    if let Some(id) = object.get("id") {
        out.insert("id".to_string(), id.clone());
    }
    for requested in fields {
        if requested == "id" {
            continue;
        }
        let canonical = expand_field(requested);
        if let Some(found) = object.get(canonical).or_else(|| object.get(requested.as_str())) {
            out.insert(requested.clone(), found.clone());
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_expand() {
        assert_eq!(expand_field("t"), "type");
        assert_eq!(expand_field("cs"), "churn_score");
        assert_eq!(expand_field("file"), "file");
        assert_eq!(expand_field("unknown"), "unknown");
    }

    #[test]
    fn projection_keeps_id_and_requested_fields() {
        let node = json!({
            "id": "main.hello",
            "type": "function",
            "file": "main.py",
            "language": "Python",
            "criticality": 0.2
        });
        let projected = project_fields(&node, &["f".to_string(), "type".to_string()]);
        let object = projected.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["id"], "main.hello");
        assert_eq!(object["f"], "main.py");
        assert_eq!(object["type"], "function");
    }

    #[test]
    fn unknown_fields_are_omitted() {
        let node = json!({ "id": "x", "type": "file" });
        let projected = project_fields(&node, &["nope".to_string()]);
        assert_eq!(projected.as_object().unwrap().len(), 1);
    }
}
