use genome_core::{EdgeType, Genome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fan-in at which a node is considered maximally load-bearing.
const FAN_IN_SATURATION: f32 = 15.0;
const APPROVAL_RISK: f32 = 0.7;
const APPROVAL_FLOW_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImpactReport {
    /// Worst-case risk over the affected nodes, in [0, 1].
    pub risk: f32,
    /// Entry points of flows that traverse an affected node.
    pub affected_flows: Vec<String>,
    /// Contract signatures depending on an affected node.
    pub affected_contracts: Vec<String>,
    pub affected_nodes_count: usize,
    pub requires_approval: bool,
    pub operation: String,
}

/// Simulate the blast radius of a proposed change before it happens.
/// Risk combines the stored risk section with structural fan-in; delete
/// operations weigh heavier than modifications.
pub fn analyze_impact(genome: &Genome, affected_nodes: &[String], operation: &str) -> ImpactReport {
    let mut flows: BTreeSet<String> = BTreeSet::new();
    let mut contracts: BTreeSet<String> = BTreeSet::new();
    let mut risk = 0.0f32;

    let operation_weight = match operation {
        "delete" => 1.25,
        "add" => 0.5,
        _ => 1.0,
    };

    for id in affected_nodes {
        if !genome.nodes.contains_key(id) {
            continue;
        }

        for flow in &genome.flows {
            if flow.entry == *id || flow.path.iter().any(|step| step == id) {
                flows.insert(flow.entry.clone());
            }
        }
        for (signature, contract) in &genome.contracts {
            if signature == id || contract.depends_on.iter().any(|dep| dep == id) {
                contracts.insert(signature.clone());
            }
        }

        let fan_in = genome.dependency_fan_in(id) as f32;
        let structural = (fan_in / FAN_IN_SATURATION).min(1.0);
        let stored = genome.risk.get(id).map(|r| r.risk_score).unwrap_or(0.0);
        let node_risk = (structural.max(stored) * operation_weight).min(1.0);
        risk = risk.max(node_risk);
    }

    let requires_approval =
        risk > APPROVAL_RISK || flows.len() > APPROVAL_FLOW_COUNT || !contracts.is_empty();

    ImpactReport {
        risk,
        affected_flows: flows.into_iter().collect(),
        affected_contracts: contracts.into_iter().collect(),
        affected_nodes_count: affected_nodes.len(),
        requires_approval,
        operation: operation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genome_core::{Edge, Flow, Node, NodeType, Visibility};

    fn genome_with_hub() -> Genome {
        let mut genome = Genome::default();
        genome
            .nodes
            .insert("auth.py".into(), Node::file_node("auth.py", Some("Python".into())));
        genome.nodes.insert(
            "auth.login_user".into(),
            Node {
                node_type: NodeType::Function,
                file: Some("auth.py".into()),
                language: Some("Python".into()),
                visibility: Visibility::Public,
                summary: None,
                criticality: 0.9,
            },
        );
        for i in 0..12 {
            let caller = format!("caller{i}.py");
            genome
                .nodes
                .insert(caller.clone(), Node::file_node(&caller, Some("Python".into())));
            genome
                .edges
                .push(Edge::new(caller, "auth.login_user", EdgeType::Calls));
        }
        genome.flows.push(Flow {
            entry: "caller0.py".into(),
            path: vec!["caller0.py".into(), "auth.login_user".into()],
            side_effects: vec![],
            confidence: 0.8,
        });
        genome
    }

    #[test]
    fn deleting_a_hub_requires_approval() {
        let genome = genome_with_hub();
        let report = analyze_impact(&genome, &["auth.login_user".to_string()], "delete");
        assert!(report.risk >= 0.7, "risk was {}", report.risk);
        assert!(!report.affected_flows.is_empty());
        assert!(report.requires_approval);
    }

    #[test]
    fn unknown_nodes_contribute_nothing() {
        let genome = genome_with_hub();
        let report = analyze_impact(&genome, &["ghost".to_string()], "modify");
        assert_eq!(report.risk, 0.0);
        assert!(!report.requires_approval);
    }

    #[test]
    fn adds_are_cheaper_than_deletes() {
        let genome = genome_with_hub();
        let delete = analyze_impact(&genome, &["auth.login_user".to_string()], "delete");
        let add = analyze_impact(&genome, &["auth.login_user".to_string()], "add");
        assert!(add.risk < delete.risk);
    }
}
