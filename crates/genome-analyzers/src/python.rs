use crate::types::{Diagnostic, EdgeDecl, ExtractionResult, NodeDecl};
use genome_core::{NodeType, Visibility};
use tree_sitter::{Node, Parser};

const MAX_SUMMARY_LEN: usize = 200;

fn node_text<'a>(node: Node, content: &'a str) -> &'a str {
    content.get(node.byte_range()).unwrap_or("")
}

fn visibility_from_name(name: &str) -> Visibility {
    if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

/// First statement of a suite, when it is a string literal: the docstring.
fn docstring(body: Node, content: &str) -> Option<String> {
    let mut cursor = body.walk();
    let first = body.named_children(&mut cursor).next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let raw = node_text(string, content)
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    let line = raw.lines().next()?.trim();
    if line.is_empty() {
        return None;
    }
    Some(line.chars().take(MAX_SUMMARY_LEN).collect())
}

fn function_decl(def: Node, content: &str) -> Option<NodeDecl> {
    let name = node_text(def.child_by_field_name("name")?, content).to_string();
    let summary = def.child_by_field_name("body").and_then(|b| docstring(b, content));
    Some(NodeDecl {
        visibility: visibility_from_name(&name),
        summary,
        line: def.start_position().row + 1,
        entry_point: name == "main",
        node_type: NodeType::Function,
        name,
    })
}

fn class_decl(def: Node, content: &str) -> Option<NodeDecl> {
    let name = node_text(def.child_by_field_name("name")?, content).to_string();
    let summary = def.child_by_field_name("body").and_then(|b| docstring(b, content));
    Some(NodeDecl {
        visibility: visibility_from_name(&name),
        summary,
        line: def.start_position().row + 1,
        entry_point: false,
        node_type: NodeType::Class,
        name,
    })
}

fn import_sources(statement: Node, content: &str, out: &mut Vec<EdgeDecl>) {
    match statement.kind() {
        "import_statement" => {
            let mut cursor = statement.walk();
            for child in statement.named_children(&mut cursor) {
                let source = match child.kind() {
                    "dotted_name" => node_text(child, content).to_string(),
                    "aliased_import" => child
                        .child_by_field_name("name")
                        .map(|n| node_text(n, content).to_string())
                        .unwrap_or_default(),
                    _ => continue,
                };
                if !source.is_empty() {
                    out.push(EdgeDecl::Import { source });
                }
            }
        }
        "import_from_statement" => {
            if let Some(module) = statement.child_by_field_name("module_name") {
                let source = node_text(module, content).to_string();
                if !source.is_empty() {
                    out.push(EdgeDecl::Import { source });
                }
            }
        }
        _ => {}
    }
}

/// Collect calls inside `scope`, attributed to `caller`. Nested function
/// definitions keep the outer caller: flows stay at top-level granularity.
fn collect_calls(scope: Node, content: &str, caller: Option<&str>, out: &mut Vec<EdgeDecl>) {
    if scope.kind() == "call" {
        if let Some(function) = scope.child_by_field_name("function") {
            let callee = match function.kind() {
                "identifier" | "attribute" => node_text(function, content).to_string(),
                _ => String::new(),
            };
            if !callee.is_empty() {
                out.push(EdgeDecl::Call {
                    caller: caller.map(str::to_string),
                    callee,
                });
            }
        }
    }
    let mut cursor = scope.walk();
    for child in scope.children(&mut cursor) {
        collect_calls(child, content, caller, out);
    }
}

pub fn extract(content: &str) -> ExtractionResult {
    let mut result = ExtractionResult::default();

    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .is_err()
    {
        result
            .diagnostics
            .push(Diagnostic::error("failed to load Python grammar"));
        return result;
    }
    let Some(tree) = parser.parse(content, None) else {
        result
            .diagnostics
            .push(Diagnostic::error("Python parse failed"));
        return result;
    };

    let root = tree.root_node();
    result.file_summary = docstring(root, content);

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        let statement = if child.kind() == "decorated_definition" {
            child.child_by_field_name("definition").unwrap_or(child)
        } else {
            child
        };

        match statement.kind() {
            "function_definition" => {
                if let Some(decl) = function_decl(statement, content) {
                    collect_calls(statement, content, Some(&decl.name), &mut result.edges);
                    result.nodes.push(decl);
                }
            }
            "class_definition" => {
                if let Some(decl) = class_decl(statement, content) {
                    result.nodes.push(decl);
                }
            }
            "import_statement" | "import_from_statement" => {
                import_sources(statement, content, &mut result.edges);
            }
            "if_statement" => {
                let condition = statement
                    .child_by_field_name("condition")
                    .map(|c| node_text(c, content))
                    .unwrap_or("");
                if condition.contains("__name__") {
                    result.file_is_entry = true;
                    collect_calls(statement, content, None, &mut result.edges);
                }
            }
            "expression_statement" => {
                collect_calls(statement, content, None, &mut result.edges);
            }
            _ => {}
        }
    }

    if root.has_error() {
        result
            .diagnostics
            .push(Diagnostic::warning("Python source contains syntax errors"));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_functions_classes_and_entry() {
        let source = r#"
"""Demo module."""
import os
from util import helper


def hello():
    """Say hello."""
    helper()


class Greeter:
    """Greets people."""

    def greet(self):
        hello()


def _private():
    pass


if __name__ == "__main__":
    hello()
"#;
        let result = extract(source);
        let names: Vec<&str> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["hello", "Greeter", "_private"]);
        assert_eq!(result.nodes[0].node_type, NodeType::Function);
        assert_eq!(result.nodes[0].summary.as_deref(), Some("Say hello."));
        assert_eq!(result.nodes[1].node_type, NodeType::Class);
        assert_eq!(result.nodes[2].visibility, Visibility::Private);
        assert!(result.file_is_entry);
        assert_eq!(result.file_summary.as_deref(), Some("Demo module."));

        let imports: Vec<&str> = result
            .edges
            .iter()
            .filter_map(|e| match e {
                EdgeDecl::Import { source } => Some(source.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(imports, vec!["os", "util"]);

        // Module-level call under the __main__ guard has no caller.
        assert!(result.edges.iter().any(|e| matches!(
            e,
            EdgeDecl::Call { caller: None, callee } if callee == "hello"
        )));
        // Call inside a function is attributed to it.
        assert!(result.edges.iter().any(|e| matches!(
            e,
            EdgeDecl::Call { caller: Some(c), callee } if c == "hello" && callee == "helper"
        )));
    }

    #[test]
    fn attribute_calls_keep_module_prefix() {
        let source = "import b\n\nb.greet()\n";
        let result = extract(source);
        assert!(result.edges.iter().any(|e| matches!(
            e,
            EdgeDecl::Call { caller: None, callee } if callee == "b.greet"
        )));
    }

    #[test]
    fn empty_file_yields_empty_result() {
        let result = extract("");
        assert!(result.nodes.is_empty());
        assert!(result.edges.is_empty());
        assert!(!result.file_is_entry);
    }
}
