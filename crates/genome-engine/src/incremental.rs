use crate::config::SubsystemToggles;
use genome_analyzers::{classify, FileKind};
use genome_core::{Edge, EdgeType, Genome, GenomeDelta, Node, SectionPatches};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// File-level change sets produced by fingerprint comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Compare the stored fingerprint table against the current one.
pub fn detect_changes(
    old: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> ChangeSet {
    let mut changes = ChangeSet::default();
    for (path, fingerprint) in current {
        match old.get(path) {
            None => changes.added.push(path.clone()),
            Some(previous) if previous != fingerprint => changes.modified.push(path.clone()),
            Some(_) => {}
        }
    }
    for path in old.keys() {
        if !current.contains_key(path) {
            changes.removed.push(path.clone());
        }
    }
    changes
}

/// Which subsystems must re-run for a change set. Skipped subsystems keep
/// their prior section verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubsystemMask {
    pub flows: bool,
    pub concepts: bool,
    pub history: bool,
    pub contracts: bool,
    pub tests: bool,
}

/// Normative mask rules: structural (defines/imports/calls) changes re-run
/// FlowWeaver, ContractLens and TestGalaxy; file add/remove re-runs
/// IntentAtlas; any change re-runs ChronoMap.
pub fn subsystem_mask(changes: &ChangeSet, toggles: &SubsystemToggles) -> SubsystemMask {
    if changes.is_empty() {
        return SubsystemMask::default();
    }
    let code_changed = changes
        .added
        .iter()
        .chain(&changes.modified)
        .chain(&changes.removed)
        .any(|path| classify(Path::new(path), None).kind == FileKind::Code);
    let membership_changed = !changes.added.is_empty() || !changes.removed.is_empty();

    SubsystemMask {
        flows: toggles.flows && code_changed,
        concepts: toggles.concepts && membership_changed,
        history: toggles.history,
        contracts: toggles.contracts && code_changed,
        tests: toggles.tests && code_changed,
    }
}

/// Files whose analysis must be refreshed: the changed files themselves
/// plus files whose import edges cross into changed, removed, or newly
/// added paths (their resolutions may have shifted).
pub fn affected_files(changes: &ChangeSet, old: &Genome, current_files: &[String]) -> Vec<String> {
    let current: BTreeSet<&str> = current_files.iter().map(String::as_str).collect();
    let mut targets: BTreeSet<String> = BTreeSet::new();
    for path in changes.added.iter().chain(&changes.modified).chain(&changes.removed) {
        targets.insert(path.clone());
        // An added file may capture imports that previously resolved to an
        // external virtual module with the same top-level name.
        if let Some(stem) = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
        {
            targets.insert(format!("ext:{stem}"));
        }
    }

    let mut affected: BTreeSet<String> = changes
        .added
        .iter()
        .chain(&changes.modified)
        .filter(|path| current.contains(path.as_str()))
        .cloned()
        .collect();

    for edge in &old.edges {
        if edge.edge_type == EdgeType::Imports && targets.contains(&edge.to) {
            if current.contains(edge.from.as_str()) {
                affected.insert(edge.from.clone());
            }
        }
    }

    affected.into_iter().collect()
}

/// Node ids owned by the given file set (the file nodes plus every symbol
/// they define).
pub fn owned_node_ids(genome: &Genome, files: &BTreeSet<String>) -> BTreeSet<String> {
    genome
        .nodes
        .iter()
        .filter(|(_, node)| {
            node.file
                .as_deref()
                .is_some_and(|file| files.contains(file))
        })
        .map(|(id, _)| id.clone())
        .collect()
}

/// Build the structural delta replacing analysis results for the affected
/// files. Old sections are filtered (not recomputed) here so the delta
/// validates; masked subsystems rebuild them afterwards.
pub fn structural_delta(
    old: &Genome,
    affected_and_removed: &BTreeSet<String>,
    new_nodes: &BTreeMap<String, Node>,
    new_edges: &[Edge],
) -> GenomeDelta {
    let stale_ids = owned_node_ids(old, affected_and_removed);

    let mut delta = GenomeDelta::default();
    for (id, node) in new_nodes {
        if old.nodes.contains_key(id) {
            delta.nodes_replace.insert(id.clone(), node.clone());
        } else {
            delta.nodes_add.insert(id.clone(), node.clone());
        }
    }
    for id in &stale_ids {
        if !new_nodes.contains_key(id) {
            delta.nodes_remove.push(id.clone());
        }
    }

    // Edges are owned by the file whose analysis emitted them: drop every
    // edge originating from a stale file, keep cross edges from untouched
    // files, and add the fresh subset.
    for edge in &old.edges {
        let owner = old
            .nodes
            .get(&edge.from)
            .and_then(|node| node.file.clone())
            .unwrap_or_else(|| edge.from.clone());
        if affected_and_removed.contains(&owner) {
            delta.edges_remove.push(edge.clone());
        }
    }
    delta.edges_add = new_edges.to_vec();

    let surviving = |id: &str| -> bool {
        (old.nodes.contains_key(id) || new_nodes.contains_key(id) || genome_core::is_virtual_id(id))
            && !delta.nodes_remove.iter().any(|removed| removed == id)
    };

    delta.section_patches = SectionPatches {
        flows: Some(
            old.flows
                .iter()
                .filter(|flow| surviving(&flow.entry) && flow.path.iter().all(|id| surviving(id)))
                .cloned()
                .collect(),
        ),
        concepts: Some(
            old.concepts
                .iter()
                .map(|(id, concept)| {
                    let mut concept = concept.clone();
                    concept.nodes.retain(|node| surviving(node));
                    (id.clone(), concept)
                })
                .filter(|(_, concept)| !concept.nodes.is_empty())
                .collect(),
        ),
        history: Some(
            old.history
                .iter()
                .filter(|(id, _)| surviving(id))
                .map(|(id, entry)| (id.clone(), entry.clone()))
                .collect(),
        ),
        risk: Some(
            old.risk
                .iter()
                .filter(|(id, _)| surviving(id))
                .map(|(id, entry)| (id.clone(), entry.clone()))
                .collect(),
        ),
        contracts: Some(
            old.contracts
                .iter()
                .filter(|(id, _)| surviving(id))
                .map(|(id, entry)| (id.clone(), entry.clone()))
                .collect(),
        ),
        summary: None,
        tests: None,
    };

    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn detects_added_modified_removed() {
        let old = table(&[("a.py", "1"), ("b.py", "2"), ("c.py", "3")]);
        let current = table(&[("a.py", "1"), ("b.py", "9"), ("d.py", "4")]);
        let changes = detect_changes(&old, &current);
        assert_eq!(changes.added, vec!["d.py".to_string()]);
        assert_eq!(changes.modified, vec!["b.py".to_string()]);
        assert_eq!(changes.removed, vec!["c.py".to_string()]);
    }

    #[test]
    fn no_change_yields_empty_mask() {
        let mask = subsystem_mask(&ChangeSet::default(), &SubsystemToggles::default());
        assert_eq!(mask, SubsystemMask::default());
    }

    #[test]
    fn code_modification_reruns_flows_and_contracts_but_not_concepts() {
        let changes = ChangeSet {
            modified: vec!["b.py".into()],
            ..Default::default()
        };
        let mask = subsystem_mask(&changes, &SubsystemToggles::default());
        assert!(mask.flows);
        assert!(mask.contracts);
        assert!(mask.history);
        assert!(!mask.concepts);
    }

    #[test]
    fn doc_only_change_skips_structural_subsystems() {
        let changes = ChangeSet {
            modified: vec!["README.md".into()],
            ..Default::default()
        };
        let mask = subsystem_mask(&changes, &SubsystemToggles::default());
        assert!(!mask.flows);
        assert!(!mask.contracts);
        assert!(mask.history);
    }

    #[test]
    fn file_addition_reruns_concepts() {
        let changes = ChangeSet {
            added: vec!["new.py".into()],
            ..Default::default()
        };
        let mask = subsystem_mask(&changes, &SubsystemToggles::default());
        assert!(mask.concepts);
    }

    #[test]
    fn importers_of_changed_files_are_affected() {
        let mut old = Genome::default();
        old.nodes
            .insert("a.py".into(), Node::file_node("a.py", Some("Python".into())));
        old.nodes
            .insert("b.py".into(), Node::file_node("b.py", Some("Python".into())));
        old.edges.push(Edge::new("a.py", "b.py", EdgeType::Imports));

        let changes = ChangeSet {
            modified: vec!["b.py".into()],
            ..Default::default()
        };
        let current = vec!["a.py".to_string(), "b.py".to_string()];
        let affected = affected_files(&changes, &old, &current);
        assert_eq!(affected, vec!["a.py".to_string(), "b.py".to_string()]);
    }

    #[test]
    fn added_file_pulls_in_ext_importers() {
        let mut old = Genome::default();
        old.nodes
            .insert("a.py".into(), Node::file_node("a.py", Some("Python".into())));
        old.nodes.insert("ext:b".into(), Node::external_module());
        old.edges.push(Edge::new("a.py", "ext:b", EdgeType::Imports));

        let changes = ChangeSet {
            added: vec!["b.py".into()],
            ..Default::default()
        };
        let current = vec!["a.py".to_string(), "b.py".to_string()];
        let affected = affected_files(&changes, &old, &current);
        assert_eq!(affected, vec!["a.py".to_string(), "b.py".to_string()]);
    }
}
