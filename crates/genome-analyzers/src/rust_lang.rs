use crate::types::{Diagnostic, EdgeDecl, ExtractionResult, NodeDecl};
use genome_core::{NodeType, Visibility};
use tree_sitter::{Node, Parser};

fn node_text<'a>(node: Node, content: &'a str) -> &'a str {
    content.get(node.byte_range()).unwrap_or("")
}

fn item_visibility(item: Node) -> Visibility {
    let mut cursor = item.walk();
    for child in item.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            return Visibility::Public;
        }
    }
    Visibility::Private
}

fn named_item(item: Node, content: &str, node_type: NodeType) -> Option<NodeDecl> {
    let name = node_text(item.child_by_field_name("name")?, content).to_string();
    Some(NodeDecl {
        entry_point: node_type == NodeType::Function && name == "main",
        visibility: item_visibility(item),
        summary: None,
        line: item.start_position().row + 1,
        node_type,
        name,
    })
}

fn collect_calls(scope: Node, content: &str, caller: Option<&str>, out: &mut Vec<EdgeDecl>) {
    if scope.kind() == "call_expression" {
        if let Some(function) = scope.child_by_field_name("function") {
            let callee = match function.kind() {
                "identifier" | "scoped_identifier" | "field_expression" => {
                    node_text(function, content).to_string()
                }
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
        .set_language(&tree_sitter_rust::LANGUAGE.into())
        .is_err()
    {
        result
            .diagnostics
            .push(Diagnostic::error("failed to load Rust grammar"));
        return result;
    }
    let Some(tree) = parser.parse(content, None) else {
        result.diagnostics.push(Diagnostic::error("Rust parse failed"));
        return result;
    };

    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "function_item" => {
                if let Some(decl) = named_item(child, content, NodeType::Function) {
                    collect_calls(child, content, Some(&decl.name), &mut result.edges);
                    if decl.entry_point {
                        result.file_is_entry = true;
                    }
                    result.nodes.push(decl);
                }
            }
            "struct_item" | "enum_item" | "trait_item" | "union_item" => {
                if let Some(decl) = named_item(child, content, NodeType::Class) {
                    result.nodes.push(decl);
                }
            }
            "use_declaration" => {
                if let Some(argument) = child.child_by_field_name("argument") {
                    let source = node_text(argument, content).to_string();
                    if !source.is_empty() {
                        result.edges.push(EdgeDecl::Import { source });
                    }
                }
            }
            _ => {}
        }
    }

    if root.has_error() {
        result
            .diagnostics
            .push(Diagnostic::warning("Rust source contains syntax errors"));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_items_and_entry() {
        let source = r#"
use std::collections::HashMap;
use crate::store::Store;

pub struct Config {
    workers: usize,
}

pub fn run(config: &Config) {
    setup();
}

fn setup() {}

fn main() {
    run(&Config { workers: 2 });
}
"#;
        let result = extract(source);
        let names: Vec<&str> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Config", "run", "setup", "main"]);
        assert_eq!(result.nodes[0].node_type, NodeType::Class);
        assert_eq!(result.nodes[0].visibility, Visibility::Public);
        assert_eq!(result.nodes[2].visibility, Visibility::Private);
        assert!(result.file_is_entry);

        let imports: Vec<&str> = result
            .edges
            .iter()
            .filter_map(|e| match e {
                EdgeDecl::Import { source } => Some(source.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(imports, vec!["std::collections::HashMap", "crate::store::Store"]);

        assert!(result.edges.iter().any(|e| matches!(
            e,
            EdgeDecl::Call { caller: Some(c), callee } if c == "main" && callee == "run"
        )));
    }
}
