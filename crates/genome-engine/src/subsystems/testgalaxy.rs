use crate::spider::BaseGraph;
use genome_core::{Edge, EdgeType, NodeType, TestsSummary};
use std::collections::BTreeSet;

/// Links test nodes to the production code they exercise.
pub struct TestGalaxy;

fn is_test_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    let lowered = name.to_ascii_lowercase();
    lowered.starts_with("test_")
        || lowered.contains("_test.")
        || lowered.contains(".test.")
        || lowered.contains(".spec.")
        || path.starts_with("tests/")
        || path.contains("/tests/")
        || path.contains("__tests__/")
}

/// `test_parse_header` -> `parse_header`; `testLogin` -> `Login`.
fn tested_name(test_fn: &str) -> Option<&str> {
    test_fn
        .strip_prefix("test_")
        .or_else(|| test_fn.strip_prefix("test"))
        .filter(|rest| !rest.is_empty())
}

impl TestGalaxy {
    /// Returns `(tests edges, tests summary, test file ids)`. The merger
    /// retypes the returned file ids to `NodeType::Test`.
    pub fn link(base: &BaseGraph) -> (Vec<Edge>, TestsSummary, BTreeSet<String>) {
        let mut test_files: BTreeSet<String> = BTreeSet::new();
        let mut edges = Vec::new();

        for (id, node) in &base.nodes {
            let Some(file) = node.file.as_deref() else {
                continue;
            };
            if !is_test_file(file) {
                continue;
            }
            if node.file.as_deref() == Some(id.as_str()) {
                test_files.insert(id.clone());
                continue;
            }
            if node.node_type != NodeType::Function {
                continue;
            }

            let name = id.rsplit('.').next().unwrap_or(id);
            let Some(target_name) = tested_name(name) else {
                continue;
            };

            // Prefer a symbol with the exact name outside test files; the
            // suffix form handles `test_parse` -> `config.parse`.
            let mut candidates: Vec<&String> = base
                .nodes
                .iter()
                .filter(|(cid, cnode)| {
                    cnode.file.as_deref().is_some_and(|f| !is_test_file(f))
                        && matches!(
                            cnode.node_type,
                            NodeType::Function | NodeType::Class
                        )
                        && cid
                            .rsplit('.')
                            .next()
                            .is_some_and(|n| n == target_name)
                })
                .map(|(cid, _)| cid)
                .collect();
            candidates.sort();
            if let Some(target) = candidates.first() {
                edges.push(Edge::new(id.clone(), (*target).clone(), EdgeType::Tests));
            }
        }

        let summary = TestsSummary {
            test_files: test_files.iter().cloned().collect(),
        };
        (edges, summary, test_files)
    }
}
