use crate::schema::{is_virtual_id, Edge, Genome, NodeType, SCHEMA_VERSION};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single invariant violation: which rule failed and for which id.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    pub invariant: String,
    pub offender: String,
    pub message: String,
}

impl Violation {
    fn new(invariant: &str, offender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            invariant: invariant.to_string(),
            offender: offender.into(),
            message: message.into(),
        }
    }
}

fn check_bounded(violations: &mut Vec<Violation>, offender: &str, field: &str, value: f32) {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        violations.push(Violation::new(
            "bounded-scalars",
            offender,
            format!("{field} = {value} is outside [0, 1]"),
        ));
    }
}

/// Check every global genome invariant. Returns all violations rather than
/// failing fast so callers can report the complete picture.
pub fn validate(genome: &Genome) -> Vec<Violation> {
    let mut violations = Vec::new();

    // Invariant 5: schema version within the supported range.
    if genome.metadata.schema_version != SCHEMA_VERSION {
        violations.push(Violation::new(
            "schema-version",
            "metadata",
            format!(
                "schema_version {} not supported (engine speaks {})",
                genome.metadata.schema_version, SCHEMA_VERSION
            ),
        ));
    }

    // Invariant 1: edge closure. Every referenced id resolves to a node or
    // is a well-formed virtual id.
    for id in genome.referenced_ids() {
        if !genome.nodes.contains_key(id) && !is_virtual_id(id) {
            violations.push(Violation::new(
                "edge-closure",
                id,
                "referenced id has no node entry and is not a virtual id",
            ));
        }
    }

    // Invariant 2: no duplicate (from, to, type) tuple.
    let mut seen: HashSet<&Edge> = HashSet::new();
    for edge in &genome.edges {
        if !seen.insert(edge) {
            violations.push(Violation::new(
                "edge-uniqueness",
                format!("{} -> {} ({})", edge.from, edge.to, edge.edge_type.as_str()),
                "duplicate edge tuple",
            ));
        }
    }

    // Invariant 3: bounded scalar fields.
    for (id, node) in &genome.nodes {
        check_bounded(&mut violations, id, "criticality", node.criticality);
    }
    for flow in &genome.flows {
        check_bounded(&mut violations, &flow.entry, "confidence", flow.confidence);
    }
    for (id, entry) in &genome.history {
        check_bounded(&mut violations, id, "churn_score", entry.churn_score);
    }
    for (id, entry) in &genome.risk {
        check_bounded(&mut violations, id, "risk_score", entry.risk_score);
    }
    for (id, entry) in &genome.contracts {
        check_bounded(
            &mut violations,
            id,
            "breaking_change_risk",
            entry.breaking_change_risk,
        );
    }

    // Invariant 4: non-concept nodes carry a file path (virtual external
    // modules excepted; the classifier is total over real paths).
    for (id, node) in &genome.nodes {
        if node.node_type != NodeType::Concept && !is_virtual_id(id) {
            match &node.file {
                Some(path) if !path.is_empty() => {}
                _ => violations.push(Violation::new(
                    "file-resolves",
                    id,
                    "non-concept node has no file path",
                )),
            }
        }
    }

    // Invariant 6: a file defining a symbol carries the defines edge.
    let defines: HashSet<(&str, &str)> = genome
        .edges
        .iter()
        .filter(|e| e.edge_type == crate::schema::EdgeType::Defines)
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    for (id, node) in &genome.nodes {
        let symbol = matches!(
            node.node_type,
            NodeType::Function | NodeType::Class | NodeType::Config
        );
        if !symbol || is_virtual_id(id) {
            continue;
        }
        if let Some(file) = &node.file {
            if genome.nodes.contains_key(file) && !defines.contains(&(file.as_str(), id.as_str()))
            {
                violations.push(Violation::new(
                    "defines-edge",
                    id,
                    format!("file '{file}' defines this symbol but has no defines edge"),
                ));
            }
        }
    }

    violations
}
