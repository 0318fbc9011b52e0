use crate::config::ScanConfig;
use crate::spider::BaseGraph;
use crate::summary::{apply_criticality, derive_risk, derive_summary};
use genome_core::{
    validate, Concept, ContractEntry, Edge, Flow, Genome, GenomeError, HistoryEntry, Metadata,
    NodeType, Result, TestsSummary,
};
use std::collections::{BTreeMap, BTreeSet};

/// Subsystem outputs handed to the merger. `None` means the subsystem was
/// disabled (or masked off during an incremental run) and its section is
/// carried over unchanged by the caller.
#[derive(Debug, Default)]
pub struct MergeInputs {
    pub flows: Option<Vec<Flow>>,
    pub concepts: Option<(BTreeMap<String, Concept>, Vec<String>)>,
    pub history: Option<(BTreeMap<String, HistoryEntry>, Vec<String>)>,
    pub contracts: Option<BTreeMap<String, ContractEntry>>,
    pub tests: Option<(Vec<Edge>, TestsSummary, BTreeSet<String>)>,
}

/// Per-language file counts, sorted by count then name, for metadata.
fn derive_languages(genome: &Genome) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (id, node) in &genome.nodes {
        if node.file.as_deref() == Some(id.as_str()) {
            if let Some(language) = node.language.as_deref() {
                *counts.entry(language).or_insert(0) += 1;
            }
        }
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().map(|(lang, _)| lang.to_string()).collect()
}

/// Combine the base graph and subsystem outputs into a validated Genome.
///
/// The merger is the single owner of the genome value while it is built:
/// union of nodes, edge dedup, single-owner section writes, a compaction
/// pass, then the validator. A validation failure aborts the merge.
pub fn merge(
    base: BaseGraph,
    inputs: MergeInputs,
    mut metadata: Metadata,
    config: &ScanConfig,
) -> Result<Genome> {
    let mut genome = Genome {
        nodes: base.nodes,
        edges: base.edges,
        ..Genome::default()
    };

    // Tests edges arrive from their own subsystem; test files are retyped.
    if let Some((tests_edges, tests_summary, test_files)) = inputs.tests {
        for id in &test_files {
            if let Some(node) = genome.nodes.get_mut(id) {
                node.node_type = NodeType::Test;
            }
        }
        for edge in tests_edges {
            genome.add_edge(edge);
        }
        genome.tests = Some(tests_summary);
    }
    genome.canonicalize_edges();

    apply_criticality(&mut genome.nodes, &genome.edges);

    // Compaction: drop isolated nodes unless they are files or entry
    // points. Virtual externals with no remaining importer go too.
    let mut connected: BTreeSet<&str> = BTreeSet::new();
    for edge in &genome.edges {
        connected.insert(edge.from.as_str());
        connected.insert(edge.to.as_str());
    }
    let keep: BTreeSet<String> = genome
        .nodes
        .iter()
        .filter(|(id, node)| {
            connected.contains(id.as_str())
                || node.file.as_deref() == Some(id.as_str())
                || base.entry_points.contains(id)
        })
        .map(|(id, _)| id.clone())
        .collect();
    genome.nodes.retain(|id, _| keep.contains(id));

    // Section writers are single-owner; filter to surviving node ids so
    // compaction cannot break edge closure.
    let exists = |id: &str| genome.nodes.contains_key(id);

    if let Some(flows) = inputs.flows {
        genome.flows = flows
            .into_iter()
            .filter(|flow| exists(&flow.entry) && flow.path.iter().all(|id| exists(id)))
            .collect();
    }

    let mut core_domains = Vec::new();
    if let Some((mut concepts, domains)) = inputs.concepts {
        for concept in concepts.values_mut() {
            concept.nodes.retain(|id| exists(id));
        }
        concepts.retain(|_, concept| !concept.nodes.is_empty());
        genome.concepts = concepts;
        core_domains = domains;
    }

    let mut hotspots = Vec::new();
    if let Some((mut history, spots)) = inputs.history {
        history.retain(|id, _| exists(id));
        genome.history = history;
        hotspots = spots.into_iter().filter(|id| exists(id)).collect();
    }

    if let Some(mut contracts) = inputs.contracts {
        contracts.retain(|id, _| exists(id));
        genome.contracts = contracts;
    }

    genome.summary = derive_summary(
        &genome.nodes,
        base.entry_points,
        core_domains,
        hotspots,
        &config.legacy_patterns,
    );
    genome.risk = derive_risk(&genome.nodes, &genome.edges, &genome.history, &genome.contracts);

    metadata.languages = derive_languages(&genome);
    metadata.fingerprints = base.fingerprints;
    metadata.partial = base.had_errors;
    genome.metadata = metadata;

    let violations = validate(&genome);
    if let Some(first) = violations.into_iter().next() {
        return Err(GenomeError::Invariant {
            invariant: first.invariant,
            offender: first.offender,
            message: first.message,
        });
    }
    Ok(genome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use genome_core::{EdgeType, Node, Visibility, SCHEMA_VERSION};

    fn metadata() -> Metadata {
        Metadata {
            schema_version: SCHEMA_VERSION,
            generated_at: "2026-01-01T00:00:00Z".into(),
            repo_hash: "sha256:x".into(),
            engine_version: "0.8.0".into(),
            ..Default::default()
        }
    }

    fn base() -> BaseGraph {
        let mut base = BaseGraph::default();
        base.nodes
            .insert("main.py".into(), Node::file_node("main.py", Some("Python".into())));
        base.nodes.insert(
            "main.hello".into(),
            Node {
                node_type: NodeType::Function,
                file: Some("main.py".into()),
                language: Some("Python".into()),
                visibility: Visibility::Public,
                summary: None,
                criticality: 0.0,
            },
        );
        base.edges
            .push(Edge::new("main.py", "main.hello", EdgeType::Defines));
        base.entry_points = vec!["main.py".into()];
        base
    }

    #[test]
    fn merge_produces_valid_genome() {
        let genome = merge(base(), MergeInputs::default(), metadata(), &ScanConfig::default())
            .expect("merge");
        assert!(genome.nodes.contains_key("main.hello"));
        assert_eq!(genome.metadata.languages, vec!["Python".to_string()]);
        assert_eq!(genome.summary.entry_points, vec!["main.py".to_string()]);
    }

    #[test]
    fn compaction_drops_isolated_non_files() {
        let mut b = base();
        // Isolated external module: no edges reference it.
        b.nodes
            .insert("ext:orphan".into(), Node::external_module());
        let genome = merge(b, MergeInputs::default(), metadata(), &ScanConfig::default())
            .expect("merge");
        assert!(!genome.nodes.contains_key("ext:orphan"));
    }

    #[test]
    fn duplicate_edges_are_merged() {
        let mut b = base();
        b.edges
            .push(Edge::new("main.py", "main.hello", EdgeType::Defines));
        let genome = merge(b, MergeInputs::default(), metadata(), &ScanConfig::default())
            .expect("merge");
        assert_eq!(genome.edges.len(), 1);
    }

    #[test]
    fn concept_membership_is_filtered_to_surviving_nodes() {
        let mut concepts = BTreeMap::new();
        concepts.insert(
            "concept:demo".to_string(),
            Concept {
                nodes: vec!["main.py".into(), "gone.py".into()],
                description: None,
            },
        );
        let genome = merge(
            base(),
            MergeInputs {
                concepts: Some((concepts, vec!["demo".into()])),
                ..Default::default()
            },
            metadata(),
            &ScanConfig::default(),
        )
        .expect("merge");
        assert_eq!(
            genome.concepts["concept:demo"].nodes,
            vec!["main.py".to_string()]
        );
    }
}
