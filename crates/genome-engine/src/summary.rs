use genome_core::{ContractEntry, Edge, EdgeType, HistoryEntry, Node, NodeType, RiskEntry, Summary};
use std::collections::BTreeMap;

const API_KEYWORDS: &[&str] = &["route", "endpoint", "api", "handler"];
const HIGH_CHURN: f32 = 0.7;
const CRITICAL_HOTSPOT: f32 = 0.8;

fn dependency_fan_in(edges: &[Edge]) -> BTreeMap<&str, usize> {
    let mut fan_in: BTreeMap<&str, usize> = BTreeMap::new();
    for edge in edges {
        if matches!(edge.edge_type, EdgeType::Calls | EdgeType::Imports) {
            *fan_in.entry(edge.to.as_str()).or_insert(0) += 1;
        }
    }
    fan_in
}

/// Closed-set architectural tags inferred from node/edge patterns.
fn architectural_style(nodes: &BTreeMap<String, Node>) -> Vec<String> {
    let mut styles = Vec::new();
    let lower_ids: Vec<String> = nodes.keys().map(|id| id.to_ascii_lowercase()).collect();
    let any = |needle: &str| lower_ids.iter().any(|id| id.contains(needle));

    if any("model") && any("view") && any("controller") {
        styles.push("MVC".to_string());
    }
    if any("service") && (any("data") || any("dao") || any("store")) {
        styles.push("Layered".to_string());
    }
    let has_api = nodes.iter().any(|(id, node)| {
        node.node_type == NodeType::Function
            && API_KEYWORDS
                .iter()
                .any(|kw| id.to_ascii_lowercase().contains(kw))
    });
    if has_api {
        styles.push("API-First".to_string());
    }
    if styles.is_empty() {
        styles.push("Monolithic".to_string());
    }
    styles
}

/// Derive the agent boot summary from the genome content itself.
pub fn derive_summary(
    nodes: &BTreeMap<String, Node>,
    entry_points: Vec<String>,
    core_domains: Vec<String>,
    hotspots: Vec<String>,
    legacy_patterns: &[String],
) -> Summary {
    let mut do_not_touch: Vec<String> = Vec::new();
    for (id, node) in nodes {
        let Some(file) = node.file.as_deref() else {
            continue;
        };
        let lower = file.to_ascii_lowercase();
        if legacy_patterns.iter().any(|p| lower.contains(p.as_str())) {
            do_not_touch.push(id.clone());
        }
    }
    for hotspot in &hotspots {
        if let Some(node) = nodes.get(hotspot) {
            if node.criticality > CRITICAL_HOTSPOT {
                do_not_touch.push(hotspot.clone());
            }
        }
    }
    do_not_touch.sort();
    do_not_touch.dedup();

    Summary {
        entry_points,
        architectural_style: architectural_style(nodes),
        core_domains,
        hotspots,
        do_not_touch,
    }
}

/// Per-node risk from fan-in, churn, and public-API membership. Each
/// input is capped so the sum stays within [0, 1].
pub fn derive_risk(
    nodes: &BTreeMap<String, Node>,
    edges: &[Edge],
    history: &BTreeMap<String, HistoryEntry>,
    contracts: &BTreeMap<String, ContractEntry>,
) -> BTreeMap<String, RiskEntry> {
    let fan_in = dependency_fan_in(edges);
    let mut risk: BTreeMap<String, RiskEntry> = BTreeMap::new();

    for id in nodes.keys() {
        let mut reasons = Vec::new();
        let mut score = 0.0f32;

        let incoming = fan_in.get(id.as_str()).copied().unwrap_or(0);
        if incoming > 5 {
            reasons.push(format!("High fan-in ({incoming})"));
            score += (incoming as f32 / 20.0).min(0.4);
        }

        let churn = history
            .get(id)
            .or_else(|| {
                nodes
                    .get(id)
                    .and_then(|n| n.file.as_ref())
                    .and_then(|f| history.get(f))
            })
            .map(|h| h.churn_score)
            .unwrap_or(0.0);
        if churn > HIGH_CHURN {
            reasons.push("High churn".to_string());
            score += 0.3;
        }

        if contracts.contains_key(id) {
            reasons.push("Public API".to_string());
            score += 0.2;
        }

        if !reasons.is_empty() {
            risk.insert(
                id.clone(),
                RiskEntry {
                    risk_score: score.min(1.0),
                    reasons,
                },
            );
        }
    }
    risk
}

/// Log-normalized fan-in criticality, written onto the nodes in place.
pub fn apply_criticality(nodes: &mut BTreeMap<String, Node>, edges: &[Edge]) {
    let mut fan_in: BTreeMap<&str, usize> = BTreeMap::new();
    for edge in edges {
        *fan_in.entry(edge.to.as_str()).or_insert(0) += 1;
    }
    let fan_in: BTreeMap<String, usize> = fan_in
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

    for (id, node) in nodes.iter_mut() {
        let incoming = fan_in.get(id).copied().unwrap_or(0);
        node.criticality = if incoming == 0 {
            0.0
        } else {
            (((incoming + 1) as f32).ln() / 11.0f32.ln()).min(1.0)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genome_core::Visibility;

    fn function(id_file: &str) -> Node {
        Node {
            node_type: NodeType::Function,
            file: Some(id_file.into()),
            language: None,
            visibility: Visibility::Public,
            summary: None,
            criticality: 0.0,
        }
    }

    #[test]
    fn api_nodes_imply_api_first() {
        let mut nodes = BTreeMap::new();
        nodes.insert("api/routes.get_user".to_string(), function("api/routes.py"));
        let summary = derive_summary(&nodes, vec![], vec![], vec![], &[]);
        assert!(summary
            .architectural_style
            .contains(&"API-First".to_string()));
    }

    #[test]
    fn plain_repo_is_monolithic() {
        let mut nodes = BTreeMap::new();
        nodes.insert("lib.helper".to_string(), function("lib.py"));
        let summary = derive_summary(&nodes, vec![], vec![], vec![], &[]);
        assert_eq!(summary.architectural_style, vec!["Monolithic".to_string()]);
    }

    #[test]
    fn legacy_paths_are_do_not_touch() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "legacy/old_billing.py".to_string(),
            Node::file_node("legacy/old_billing.py", None),
        );
        let summary = derive_summary(&nodes, vec![], vec![], vec![], &["legacy".to_string()]);
        assert_eq!(summary.do_not_touch, vec!["legacy/old_billing.py".to_string()]);
    }

    #[test]
    fn risk_combines_fan_in_churn_and_contracts() {
        let mut nodes = BTreeMap::new();
        nodes.insert("auth.login".to_string(), function("auth.py"));
        let edges: Vec<Edge> = (0..12)
            .map(|i| Edge::new(format!("c{i}"), "auth.login", EdgeType::Calls))
            .collect();
        let mut history = BTreeMap::new();
        history.insert(
            "auth.py".to_string(),
            HistoryEntry {
                churn_score: 0.9,
                ..Default::default()
            },
        );
        let mut contracts = BTreeMap::new();
        contracts.insert("auth.login".to_string(), ContractEntry::default());

        let risk = derive_risk(&nodes, &edges, &history, &contracts);
        let entry = &risk["auth.login"];
        assert_eq!(entry.reasons.len(), 3);
        assert!(entry.risk_score > 0.7 && entry.risk_score <= 1.0);
    }

    #[test]
    fn criticality_grows_with_fan_in() {
        let mut nodes = BTreeMap::new();
        nodes.insert("core.util".to_string(), function("core.py"));
        nodes.insert("core.rare".to_string(), function("core.py"));
        let mut edges: Vec<Edge> = (0..10)
            .map(|i| Edge::new(format!("c{i}"), "core.util", EdgeType::Calls))
            .collect();
        edges.push(Edge::new("c0", "core.rare", EdgeType::Calls));

        apply_criticality(&mut nodes, &edges);
        assert!(nodes["core.util"].criticality > nodes["core.rare"].criticality);
        assert!(nodes["core.util"].criticality <= 1.0);
    }
}
