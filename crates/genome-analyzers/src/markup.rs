//! Analyzers for documentation and configuration formats. These are
//! line-oriented or document-parser based; nothing here needs an AST.

use crate::types::{Diagnostic, EdgeDecl, ExtractionResult, NodeDecl};
use genome_core::{NodeType, Visibility};
use regex::Regex;
use std::sync::OnceLock;

const MAX_CONFIG_KEYS: usize = 32;

fn config_key_decl(key: &str, line: usize) -> NodeDecl {
    NodeDecl {
        name: key.to_string(),
        node_type: NodeType::Config,
        visibility: Visibility::Public,
        summary: None,
        line,
        entry_point: false,
    }
}

/// Markdown: first heading becomes the file summary, relative links become
/// reference edges. Headings do not become nodes; concept grouping belongs
/// to IntentAtlas.
pub fn extract_markdown(content: &str) -> ExtractionResult {
    static LINK: OnceLock<Regex> = OnceLock::new();
    let link = LINK.get_or_init(|| Regex::new(r"\[[^\]]*\]\(([^)\s]+)\)").expect("link regex"));

    let mut result = ExtractionResult::default();

    for line in content.lines() {
        if result.file_summary.is_none() {
            if let Some(heading) = line.strip_prefix('#') {
                let text = heading.trim_start_matches('#').trim();
                if !text.is_empty() {
                    result.file_summary = Some(text.chars().take(200).collect());
                }
            }
        }
        for capture in link.captures_iter(line) {
            let target = &capture[1];
            let external = target.contains("://") || target.starts_with('#')
                || target.starts_with("mailto:");
            if !external {
                let target = target.split('#').next().unwrap_or(target);
                if !target.is_empty() {
                    result.edges.push(EdgeDecl::Reference {
                        target: target.to_string(),
                    });
                }
            }
        }
    }

    result
}

/// JSON: top-level object keys become config nodes (bounded).
pub fn extract_json(content: &str) -> ExtractionResult {
    let mut result = ExtractionResult::default();
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(serde_json::Value::Object(map)) => {
            for key in map.keys().take(MAX_CONFIG_KEYS) {
                result.nodes.push(config_key_decl(key, 0));
            }
        }
        Ok(_) => {}
        Err(err) => result
            .diagnostics
            .push(Diagnostic::warning(format!("invalid JSON: {err}"))),
    }
    result
}

/// YAML: top-level mapping keys become config nodes (bounded).
pub fn extract_yaml(content: &str) -> ExtractionResult {
    let mut result = ExtractionResult::default();
    match serde_yaml::from_str::<serde_yaml::Value>(content) {
        Ok(serde_yaml::Value::Mapping(map)) => {
            for key in map.keys().take(MAX_CONFIG_KEYS) {
                if let serde_yaml::Value::String(key) = key {
                    result.nodes.push(config_key_decl(key, 0));
                }
            }
        }
        Ok(_) => {}
        Err(err) => result
            .diagnostics
            .push(Diagnostic::warning(format!("invalid YAML: {err}"))),
    }
    result
}

/// TOML: top-level tables and keys become config nodes (bounded).
pub fn extract_toml(content: &str) -> ExtractionResult {
    let mut result = ExtractionResult::default();
    match content.parse::<toml::Value>() {
        Ok(toml::Value::Table(table)) => {
            for key in table.keys().take(MAX_CONFIG_KEYS) {
                result.nodes.push(config_key_decl(key, 0));
            }
        }
        Ok(_) => {}
        Err(err) => result
            .diagnostics
            .push(Diagnostic::warning(format!("invalid TOML: {err}"))),
    }
    result
}

/// Shell: `name() {` and `function name {` definitions become functions.
pub fn extract_shell(content: &str) -> ExtractionResult {
    static FUNCTION: OnceLock<Regex> = OnceLock::new();
    let function = FUNCTION.get_or_init(|| {
        Regex::new(r"^\s*(?:function\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*\(\)\s*\{")
            .expect("shell function regex")
    });

    let mut result = ExtractionResult::default();
    for (index, line) in content.lines().enumerate() {
        if let Some(capture) = function.captures(line) {
            let mut decl = NodeDecl::function(&capture[1], index + 1);
            decl.visibility = Visibility::Internal;
            result.nodes.push(decl);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_summary_and_links() {
        let content = "# Project Title\n\nSee [the docs](docs/guide.md) and [site](https://example.com).\n";
        let result = extract_markdown(content);
        assert_eq!(result.file_summary.as_deref(), Some("Project Title"));
        let targets: Vec<&str> = result
            .edges
            .iter()
            .filter_map(|e| match e {
                EdgeDecl::Reference { target } => Some(target.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec!["docs/guide.md"]);
    }

    #[test]
    fn json_top_level_keys() {
        let result = extract_json(r#"{"name": "demo", "scripts": {"build": "x"}}"#);
        let names: Vec<&str> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["name", "scripts"]);
        assert_eq!(result.nodes[0].node_type, NodeType::Config);
    }

    #[test]
    fn invalid_json_is_a_diagnostic_not_a_failure() {
        let result = extract_json("{ nope");
        assert!(result.nodes.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn yaml_top_level_keys() {
        let result = extract_yaml("name: demo\njobs:\n  build: {}\n");
        let names: Vec<&str> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["name", "jobs"]);
    }

    #[test]
    fn toml_top_level_keys() {
        let result = extract_toml("[package]\nname = \"demo\"\n\n[dependencies]\nserde = \"1\"\n");
        let names: Vec<&str> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["dependencies", "package"]);
    }

    #[test]
    fn shell_functions() {
        let content = "#!/bin/bash\n\nsetup() {\n  echo hi\n}\n\nfunction deploy() {\n  setup\n}\n";
        let result = extract_shell(content);
        let names: Vec<&str> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["setup", "deploy"]);
    }
}
