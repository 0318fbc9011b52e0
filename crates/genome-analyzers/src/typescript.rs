use crate::types::{Diagnostic, EdgeDecl, ExtractionResult, NodeDecl};
use genome_core::{NodeType, Visibility};
use tree_sitter::{Node, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    JavaScript,
}

fn node_text<'a>(node: Node, content: &'a str) -> &'a str {
    content.get(node.byte_range()).unwrap_or("")
}

fn declaration(node: Node, content: &str, exported: bool) -> Option<NodeDecl> {
    let visibility = if exported {
        Visibility::Public
    } else {
        Visibility::Private
    };
    let line = node.start_position().row + 1;
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            let name = node_text(node.child_by_field_name("name")?, content).to_string();
            Some(NodeDecl {
                entry_point: name == "main",
                node_type: NodeType::Function,
                visibility,
                summary: None,
                line,
                name,
            })
        }
        "class_declaration" | "abstract_class_declaration" => {
            let name = node_text(node.child_by_field_name("name")?, content).to_string();
            Some(NodeDecl {
                entry_point: false,
                node_type: NodeType::Class,
                visibility,
                summary: None,
                line,
                name,
            })
        }
        // const f = () => {} / const f = function () {}
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let value_kind = declarator
                    .child_by_field_name("value")
                    .map(|v| v.kind())
                    .unwrap_or("");
                if matches!(value_kind, "arrow_function" | "function_expression" | "function") {
                    let name =
                        node_text(declarator.child_by_field_name("name")?, content).to_string();
                    return Some(NodeDecl {
                        entry_point: name == "main",
                        node_type: NodeType::Function,
                        visibility,
                        summary: None,
                        line,
                        name,
                    });
                }
            }
            None
        }
        _ => None,
    }
}

fn collect_calls(scope: Node, content: &str, caller: Option<&str>, out: &mut Vec<EdgeDecl>) {
    if scope.kind() == "call_expression" {
        if let Some(function) = scope.child_by_field_name("function") {
            let callee = match function.kind() {
                "identifier" | "member_expression" => node_text(function, content).to_string(),
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

pub fn extract(content: &str, dialect: Dialect) -> ExtractionResult {
    let mut result = ExtractionResult::default();

    let language: tree_sitter::Language = match dialect {
        Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
    };

    let mut parser = Parser::new();
    if parser.set_language(&language).is_err() {
        result
            .diagnostics
            .push(Diagnostic::error("failed to load grammar"));
        return result;
    }
    let Some(tree) = parser.parse(content, None) else {
        result.diagnostics.push(Diagnostic::error("parse failed"));
        return result;
    };

    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        let (statement, exported) = if child.kind() == "export_statement" {
            match child.child_by_field_name("declaration") {
                Some(inner) => (inner, true),
                None => continue,
            }
        } else {
            (child, false)
        };

        match statement.kind() {
            "import_statement" => {
                if let Some(source) = statement.child_by_field_name("source") {
                    let module = node_text(source, content).trim_matches(['"', '\'']).to_string();
                    if !module.is_empty() {
                        result.edges.push(EdgeDecl::Import { source: module });
                    }
                }
            }
            _ => {
                if let Some(decl) = declaration(statement, content, exported) {
                    collect_calls(statement, content, Some(&decl.name), &mut result.edges);
                    result.nodes.push(decl);
                } else {
                    // Module-level statements: calls with no caller, plus
                    // CommonJS requires treated as imports.
                    let mut calls = Vec::new();
                    collect_calls(statement, content, None, &mut calls);
                    for call in calls {
                        if let EdgeDecl::Call { callee, .. } = &call {
                            if callee == "require" {
                                if let Some(module) = first_string_argument(statement, content) {
                                    result.edges.push(EdgeDecl::Import { source: module });
                                    continue;
                                }
                            }
                        }
                        result.edges.push(call);
                    }
                }
            }
        }
    }

    // Server bootstrap or argv handling marks the file as an entry point.
    if content.contains(".listen(") || content.contains("process.argv") {
        result.file_is_entry = true;
    }
    if root.has_error() {
        result
            .diagnostics
            .push(Diagnostic::warning("source contains syntax errors"));
    }

    result
}

fn first_string_argument(scope: Node, content: &str) -> Option<String> {
    if scope.kind() == "string" {
        let text = node_text(scope, content).trim_matches(['"', '\'']).to_string();
        return Some(text);
    }
    let mut cursor = scope.walk();
    for child in scope.children(&mut cursor) {
        if let Some(found) = first_string_argument(child, content) {
            return Some(found);
        }
    }
    None
}
