use crate::error::{GenomeError, Result};
use crate::schema::{
    Concept, ContractEntry, Edge, Flow, Genome, GenomeDiff, HistoryEntry, Node, RiskEntry,
    Summary, TestsSummary,
};
use crate::validate::validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole-section replacements carried by a delta. Sections are single-owner
/// (one subsystem writes each), so a patch replaces the section outright.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionPatches {
    pub flows: Option<Vec<Flow>>,
    pub concepts: Option<BTreeMap<String, Concept>>,
    pub history: Option<BTreeMap<String, HistoryEntry>>,
    pub risk: Option<BTreeMap<String, RiskEntry>>,
    pub contracts: Option<BTreeMap<String, ContractEntry>>,
    pub summary: Option<Summary>,
    pub tests: Option<TestsSummary>,
}

/// Minimal set of changes transforming one genome into another.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenomeDelta {
    pub nodes_add: BTreeMap<String, Node>,
    pub nodes_remove: Vec<String>,
    pub nodes_replace: BTreeMap<String, Node>,
    pub edges_add: Vec<Edge>,
    pub edges_remove: Vec<Edge>,
    pub section_patches: SectionPatches,
}

/// Apply a delta atomically: the result is validated before being returned,
/// and the input genome is never modified. Apply order is removes,
/// replaces, adds; edges last.
pub fn apply_delta(genome: &Genome, delta: &GenomeDelta) -> Result<Genome> {
    let mut next = genome.clone();

    for id in &delta.nodes_remove {
        next.nodes.remove(id);
        next.history.remove(id);
        next.risk.remove(id);
        next.contracts.remove(id);
    }
    for (id, node) in &delta.nodes_replace {
        next.nodes.insert(id.clone(), node.clone());
    }
    for (id, node) in &delta.nodes_add {
        next.nodes.insert(id.clone(), node.clone());
    }

    // Edges last: removals may reference nodes dropped above.
    next.edges.retain(|edge| {
        !delta.edges_remove.contains(edge)
            && !delta.nodes_remove.contains(&edge.from)
            && !delta.nodes_remove.contains(&edge.to)
    });
    for edge in &delta.edges_add {
        next.add_edge(edge.clone());
    }
    next.canonicalize_edges();

    let patches = &delta.section_patches;
    if let Some(flows) = &patches.flows {
        next.flows = flows.clone();
    }
    if let Some(concepts) = &patches.concepts {
        next.concepts = concepts.clone();
    }
    if let Some(history) = &patches.history {
        next.history = history.clone();
    }
    if let Some(risk) = &patches.risk {
        next.risk = risk.clone();
    }
    if let Some(contracts) = &patches.contracts {
        next.contracts = contracts.clone();
    }
    if let Some(summary) = &patches.summary {
        next.summary = summary.clone();
    }
    if let Some(tests) = &patches.tests {
        next.tests = Some(tests.clone());
    }

    let violations = validate(&next);
    if let Some(first) = violations.into_iter().next() {
        return Err(GenomeError::Invariant {
            invariant: first.invariant,
            offender: first.offender,
            message: first.message,
        });
    }
    Ok(next)
}

/// Compute the node/edge diff between two genome versions.
pub fn diff_genomes(old: &Genome, new: &Genome) -> GenomeDiff {
    let mut diff = GenomeDiff::default();

    for (id, node) in &new.nodes {
        match old.nodes.get(id) {
            None => diff.added_nodes.push(id.clone()),
            Some(prev) if prev != node => diff.modified_nodes.push(id.clone()),
            Some(_) => {}
        }
    }
    for id in old.nodes.keys() {
        if !new.nodes.contains_key(id) {
            diff.removed_nodes.push(id.clone());
        }
    }

    for edge in &new.edges {
        if !old.edges.contains(edge) {
            diff.added_edges.push(edge.clone());
        }
    }
    for edge in &old.edges {
        if !new.edges.contains(edge) {
            diff.removed_edges.push(edge.clone());
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EdgeType, NodeType, Visibility, SCHEMA_VERSION};
    use pretty_assertions::assert_eq;

    fn base() -> Genome {
        let mut genome = Genome::default();
        genome.metadata.schema_version = SCHEMA_VERSION;
        genome
            .nodes
            .insert("b.py".into(), Node::file_node("b.py", Some("Python".into())));
        genome.nodes.insert(
            "b.greet".into(),
            Node {
                node_type: NodeType::Function,
                file: Some("b.py".into()),
                language: Some("Python".into()),
                visibility: Visibility::Public,
                summary: None,
                criticality: 0.0,
            },
        );
        genome
            .edges
            .push(Edge::new("b.py", "b.greet", EdgeType::Defines));
        genome
    }

    #[test]
    fn apply_adds_node_and_edge() {
        let genome = base();
        let mut delta = GenomeDelta::default();
        delta.nodes_add.insert(
            "b.bye".into(),
            Node {
                node_type: NodeType::Function,
                file: Some("b.py".into()),
                language: Some("Python".into()),
                visibility: Visibility::Public,
                summary: None,
                criticality: 0.0,
            },
        );
        delta
            .edges_add
            .push(Edge::new("b.py", "b.bye", EdgeType::Defines));

        let next = apply_delta(&genome, &delta).unwrap();
        assert!(next.nodes.contains_key("b.bye"));
        assert_eq!(next.edges.len(), 2);
        // Input untouched.
        assert!(!genome.nodes.contains_key("b.bye"));
    }

    #[test]
    fn remove_drops_incident_edges() {
        let genome = base();
        let delta = GenomeDelta {
            nodes_remove: vec!["b.greet".into()],
            ..Default::default()
        };
        let next = apply_delta(&genome, &delta).unwrap();
        assert!(!next.nodes.contains_key("b.greet"));
        assert!(next.edges.is_empty());
    }

    #[test]
    fn invalid_delta_leaves_genome_untouched() {
        let genome = base();
        let mut delta = GenomeDelta::default();
        // Edge to a node that does not exist and is not virtual.
        delta
            .edges_add
            .push(Edge::new("b.greet", "ghost.fn", EdgeType::Calls));
        let err = apply_delta(&genome, &delta).unwrap_err();
        assert_eq!(err.code(), "invariant-violation");
        assert_eq!(genome.edges.len(), 1);
    }

    #[test]
    fn diff_reports_all_change_kinds() {
        let old = base();
        let mut new = base();
        new.nodes.get_mut("b.greet").unwrap().criticality = 0.5;
        new.nodes.insert(
            "b.bye".into(),
            Node {
                node_type: NodeType::Function,
                file: Some("b.py".into()),
                language: Some("Python".into()),
                visibility: Visibility::Public,
                summary: None,
                criticality: 0.0,
            },
        );
        new.edges.push(Edge::new("b.py", "b.bye", EdgeType::Defines));

        let diff = diff_genomes(&old, &new);
        assert_eq!(diff.added_nodes, vec!["b.bye".to_string()]);
        assert_eq!(diff.modified_nodes, vec!["b.greet".to_string()]);
        assert_eq!(diff.added_edges.len(), 1);
        assert!(diff.removed_nodes.is_empty());
        assert!(diff.removed_edges.is_empty());
    }
}
