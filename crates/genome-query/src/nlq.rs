use crate::predicate::Predicate;
use genome_core::Result;
use serde_json::{json, Value};

/// Node-type keywords recognized by the translator.
const TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("function", "function"),
    ("functions", "function"),
    ("method", "function"),
    ("methods", "function"),
    ("class", "class"),
    ("classes", "class"),
    ("test", "test"),
    ("tests", "test"),
    ("file", "file"),
    ("files", "file"),
    ("config", "config"),
    ("configs", "config"),
    ("module", "module"),
    ("modules", "module"),
];

const LANGUAGE_KEYWORDS: &[(&str, &str)] = &[
    ("python", "Python"),
    ("typescript", "TypeScript"),
    ("javascript", "JavaScript"),
    ("rust", "Rust"),
    ("go", "Go"),
    ("java", "Java"),
    ("shell", "Shell"),
    ("markdown", "Markdown"),
    ("json", "JSON"),
    ("yaml", "YAML"),
];

/// Stop words never used as residual filters.
const STOP_WORDS: &[&str] = &[
    "a", "all", "an", "and", "any", "are", "find", "for", "get", "in", "is", "list", "me", "of",
    "on", "show", "that", "the", "to", "with",
];

/// Deterministic keyword-to-predicate translation. No inference: a fixed
/// keyword table maps to type/language filters, and leftover words become
/// substring filters over id and file path.
pub fn translate_query(text: &str) -> Result<Predicate> {
    let mut clauses: Vec<Value> = Vec::new();
    let mut residual: Vec<String> = Vec::new();

    for raw in text.split_whitespace() {
        let word: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.' || *c == '/')
            .collect::<String>()
            .to_ascii_lowercase();
        if word.is_empty() || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }

        if let Some((_, node_type)) = TYPE_KEYWORDS.iter().find(|(kw, _)| *kw == word) {
            clauses.push(json!({"field": "type", "op": "eq", "value": node_type}));
            continue;
        }
        if let Some((_, language)) = LANGUAGE_KEYWORDS.iter().find(|(kw, _)| *kw == word) {
            clauses.push(json!({"field": "language", "op": "eq", "value": language}));
            continue;
        }
        residual.push(word);
    }

    for word in residual {
        let escaped = regex::escape(&word);
        clauses.push(json!({
            "or": [
                {"field": "id", "regex": format!("(?i){escaped}")},
                {"field": "file", "regex": format!("(?i){escaped}")}
            ]
        }));
    }

    if clauses.is_empty() {
        return Predicate::parse(&Value::Null);
    }
    Predicate::parse(&json!({ "and": clauses }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn auth_function() -> Value {
        json!({
            "id": "auth/login.authenticate",
            "type": "function",
            "file": "auth/login.py",
            "language": "Python"
        })
    }

    #[test]
    fn type_and_language_keywords_filter() {
        let predicate = translate_query("python functions").unwrap();
        assert!(predicate.matches(&auth_function()));

        let predicate = translate_query("rust functions").unwrap();
        assert!(!predicate.matches(&auth_function()));
    }

    #[test]
    fn residual_words_match_ids_and_paths() {
        let predicate = translate_query("find auth functions").unwrap();
        assert!(predicate.matches(&auth_function()));

        let predicate = translate_query("find billing functions").unwrap();
        assert!(!predicate.matches(&auth_function()));
    }

    #[test]
    fn translation_is_deterministic() {
        let a = translate_query("python auth functions").unwrap().cache_key();
        let b = translate_query("python auth functions").unwrap().cache_key();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_query_matches_everything() {
        let predicate = translate_query("show me all the").unwrap();
        assert!(predicate.matches(&auth_function()));
    }
}
