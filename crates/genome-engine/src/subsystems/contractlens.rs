use crate::spider::BaseGraph;
use genome_core::{ContractEntry, EdgeType, NodeType, Visibility};
use std::collections::{BTreeMap, BTreeSet};

const API_ID_KEYWORDS: &[&str] = &["route", "endpoint", "handler", "api"];
const API_PATH_KEYWORDS: &[&str] = &["api", "public", "export", "interface", "lib"];

/// Identifies the public API surface and scores breaking-change risk as a
/// pure function of the graph.
pub struct ContractLens;

impl ContractLens {
    pub fn inspect(base: &BaseGraph) -> BTreeMap<String, ContractEntry> {
        let mut fan_in: BTreeMap<&str, usize> = BTreeMap::new();
        for edge in &base.edges {
            if matches!(edge.edge_type, EdgeType::Calls | EdgeType::Imports) {
                *fan_in.entry(edge.to.as_str()).or_insert(0) += 1;
            }
        }

        let mut contracts = BTreeMap::new();
        for (id, node) in &base.nodes {
            if !matches!(node.node_type, NodeType::Function | NodeType::Class) {
                continue;
            }
            if node.visibility != Visibility::Public {
                continue;
            }

            let id_lower = id.to_ascii_lowercase();
            let path_lower = node.file.as_deref().unwrap_or("").to_ascii_lowercase();
            let looks_public = API_ID_KEYWORDS.iter().any(|kw| id_lower.contains(kw))
                || API_PATH_KEYWORDS
                    .iter()
                    .any(|kw| path_lower.split(['/', '_', '.']).any(|seg| seg == *kw));
            if !looks_public {
                continue;
            }

            let depends_on: BTreeSet<String> = base
                .edges
                .iter()
                .filter(|e| {
                    e.from == *id && matches!(e.edge_type, EdgeType::Calls | EdgeType::Imports)
                })
                .map(|e| e.to.clone())
                .collect();

            let incoming = fan_in.get(id.as_str()).copied().unwrap_or(0);
            contracts.insert(
                id.clone(),
                ContractEntry {
                    depends_on: depends_on.into_iter().collect(),
                    breaking_change_risk: (incoming as f32 / 10.0).min(1.0),
                },
            );
        }
        contracts
    }
}
