use crate::sources::FilesystemSource;
use crate::spider::BaseGraph;
use genome_core::{Flow, SideEffect};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::OnceLock;

const MAX_DEPTH: usize = 8;
const MAX_FLOWS: usize = 64;

/// Confidence for flows derived purely from static call edges.
const STATIC_CONFIDENCE: f32 = 0.8;

/// Traces execution paths from entry points along `calls` edges and tags
/// them with side effects detected in the touched files.
pub struct FlowWeaver;

fn side_effect_patterns() -> &'static [(SideEffect, Regex)] {
    static PATTERNS: OnceLock<Vec<(SideEffect, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table: &[(SideEffect, &str)] = &[
            (
                SideEffect::DbRead,
                r"(?i)SELECT\s+.+\s+FROM|\.query\(|\bfind_one\(|db\.(get|find|query)",
            ),
            (
                SideEffect::DbWrite,
                r"(?i)INSERT\s+INTO|UPDATE\s+\w+\s+SET|DELETE\s+FROM|\.(insert|save|commit)\(",
            ),
            (
                SideEffect::NetOut,
                r"requests\.(get|post|put|delete)|\bfetch\(|urlopen\(|reqwest::|http[s]?://",
            ),
            (
                SideEffect::FsRead,
                r#"open\([^)]*['"]r['"]|read_to_string|readFile|\.read\("#,
            ),
            (
                SideEffect::FsWrite,
                r#"open\([^)]*['"][wa]['"]|writeFile|write_all|\.write\("#,
            ),
            (SideEffect::Cache, r"(?i)\bcache\b|memoize|\blru\b"),
            (SideEffect::Emit, r"\bemit\(|\bpublish\(|\bdispatch\("),
        ];
        table
            .iter()
            .map(|(effect, pattern)| (*effect, Regex::new(pattern).expect("side-effect regex")))
            .collect()
    })
}

fn detect_side_effects(content: &str) -> BTreeSet<SideEffect> {
    side_effect_patterns()
        .iter()
        .filter(|(_, regex)| regex.is_match(content))
        .map(|(effect, _)| *effect)
        .collect()
}

impl FlowWeaver {
    /// Contract: every emitted flow starts at an entry point; every
    /// consecutive pair on the path has a `calls` edge in the base graph.
    pub fn weave(base: &BaseGraph, fs: &dyn FilesystemSource) -> Vec<Flow> {
        let call_graph = base.call_graph();
        let mut effects_by_file: BTreeMap<String, BTreeSet<SideEffect>> = BTreeMap::new();
        let mut flows = Vec::new();

        for entry in &base.entry_points {
            if flows.len() >= MAX_FLOWS {
                break;
            }
            let mut visited: HashSet<&str> = HashSet::new();
            Self::trace(
                entry,
                entry,
                &mut vec![],
                &mut visited,
                &call_graph,
                base,
                fs,
                &mut effects_by_file,
                &mut flows,
            );
        }

        flows.truncate(MAX_FLOWS);
        flows
    }

    #[allow(clippy::too_many_arguments)]
    fn trace<'a>(
        entry: &str,
        node: &'a str,
        path: &mut Vec<String>,
        visited: &mut HashSet<&'a str>,
        call_graph: &BTreeMap<&'a str, Vec<&'a str>>,
        base: &'a BaseGraph,
        fs: &dyn FilesystemSource,
        effects_by_file: &mut BTreeMap<String, BTreeSet<SideEffect>>,
        flows: &mut Vec<Flow>,
    ) {
        if flows.len() >= MAX_FLOWS || path.len() >= MAX_DEPTH || !visited.insert(node) {
            return;
        }
        path.push(node.to_string());

        let callees: Vec<&'a str> = call_graph
            .get(node)
            .map(|targets| {
                targets
                    .iter()
                    .copied()
                    .filter(|t| !visited.contains(t))
                    .collect()
            })
            .unwrap_or_default();
        if callees.is_empty() {
            let mut side_effects: BTreeSet<SideEffect> = BTreeSet::new();
            for id in path.iter() {
                if let Some(file) = base.nodes.get(id).and_then(|n| n.file.clone()) {
                    let effects = effects_by_file.entry(file.clone()).or_insert_with(|| {
                        fs.read(&file)
                            .ok()
                            .map(|bytes| detect_side_effects(&String::from_utf8_lossy(&bytes)))
                            .unwrap_or_default()
                    });
                    side_effects.extend(effects.iter().copied());
                }
            }
            flows.push(Flow {
                entry: entry.to_string(),
                path: path.clone(),
                side_effects: side_effects.into_iter().collect(),
                confidence: STATIC_CONFIDENCE,
            });
        } else {
            for callee in callees {
                Self::trace(
                    entry,
                    callee,
                    path,
                    visited,
                    call_graph,
                    base,
                    fs,
                    effects_by_file,
                    flows,
                );
            }
        }

        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genome_core::{Edge, EdgeType, Node};
    use std::path::Path;

    struct StaticFs;
    impl FilesystemSource for StaticFs {
        fn root(&self) -> &Path {
            Path::new(".")
        }
        fn enumerate(&self) -> genome_core::Result<Vec<String>> {
            Ok(vec!["main.py".into()])
        }
        fn read(&self, _rel: &str) -> genome_core::Result<Vec<u8>> {
            Ok(b"import requests\nrequests.get('http://x')\n".to_vec())
        }
    }

    fn base_with_chain() -> BaseGraph {
        let mut base = BaseGraph::default();
        base.nodes
            .insert("main.py".into(), Node::file_node("main.py", Some("Python".into())));
        for name in ["main.run", "main.step"] {
            base.nodes.insert(
                name.into(),
                Node {
                    node_type: genome_core::NodeType::Function,
                    file: Some("main.py".into()),
                    language: Some("Python".into()),
                    visibility: genome_core::Visibility::Public,
                    summary: None,
                    criticality: 0.0,
                },
            );
        }
        base.edges.push(Edge::new("main.py", "main.run", EdgeType::Calls));
        base.edges.push(Edge::new("main.run", "main.step", EdgeType::Calls));
        base.entry_points = vec!["main.py".into()];
        base
    }

    #[test]
    fn flows_follow_call_edges_from_entry() {
        let base = base_with_chain();
        let flows = FlowWeaver::weave(&base, &StaticFs);
        assert_eq!(flows.len(), 1);
        let flow = &flows[0];
        assert_eq!(flow.entry, "main.py");
        assert_eq!(flow.path, vec!["main.py", "main.run", "main.step"]);
        assert!((flow.confidence - 0.8).abs() < f32::EPSILON);
        assert!(flow.side_effects.contains(&SideEffect::NetOut));
    }

    #[test]
    fn entry_without_calls_yields_single_node_flow() {
        let mut base = BaseGraph::default();
        base.nodes
            .insert("cli.py".into(), Node::file_node("cli.py", Some("Python".into())));
        base.entry_points = vec!["cli.py".into()];
        let flows = FlowWeaver::weave(&base, &StaticFs);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].path, vec!["cli.py"]);
    }

    #[test]
    fn cycles_do_not_loop() {
        let mut base = base_with_chain();
        base.edges.push(Edge::new("main.step", "main.run", EdgeType::Calls));
        let flows = FlowWeaver::weave(&base, &StaticFs);
        assert!(!flows.is_empty());
        assert!(flows.len() <= MAX_FLOWS);
    }
}
