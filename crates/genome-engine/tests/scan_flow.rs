//! End-to-end scan scenarios over real scratch repositories.

use genome_core::{CompactionMode, EdgeType};
use genome_engine::{GenomeGenerator, ScanConfig};
use pretty_assertions::assert_eq;
use std::path::Path;

fn generator(root: &Path) -> GenomeGenerator {
    GenomeGenerator::new(root, ScanConfig::default())
}

fn has_edge(genome: &genome_core::Genome, from: &str, to: &str, edge_type: EdgeType) -> bool {
    genome
        .edges
        .iter()
        .any(|e| e.from == from && e.to == to && e.edge_type == edge_type)
}

/// Serialized form with the volatile fields cleared, for byte comparisons.
fn normalized(genome: &genome_core::Genome) -> String {
    let mut genome = genome.clone();
    genome.metadata.generated_at = String::new();
    genome.diff = None;
    let value = genome_core::to_mode_value(&genome, CompactionMode::Standard).unwrap();
    serde_json::to_string_pretty(&value).unwrap()
}

#[tokio::test]
async fn single_file_repo_produces_expected_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("main.py"),
        "def hello():\n    pass\n\n\nif __name__ == \"__main__\":\n    hello()\n",
    )
    .unwrap();

    let (genome, stats) = generator(dir.path()).full_scan().await.unwrap();

    assert!(genome.nodes.contains_key("main.py"));
    assert!(genome.nodes.contains_key("main.hello"));
    assert!(has_edge(&genome, "main.py", "main.hello", EdgeType::Defines));
    assert!(has_edge(&genome, "main.py", "main.hello", EdgeType::Calls));
    assert!(genome
        .summary
        .entry_points
        .contains(&"main.py".to_string()));
    assert_eq!(stats.files, 1);
    assert!(genome_core::validate(&genome).is_empty());
}

#[tokio::test]
async fn two_file_import_links_files_and_symbols() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.py"), "import b\n\nb.greet()\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "def greet():\n    pass\n").unwrap();

    let (genome, _) = generator(dir.path()).full_scan().await.unwrap();

    assert!(has_edge(&genome, "a.py", "b.py", EdgeType::Imports));
    assert!(has_edge(&genome, "a.py", "b.greet", EdgeType::Calls));
    assert!(genome.nodes.contains_key("b.greet"));
}

#[tokio::test]
async fn incremental_modify_adds_exactly_the_new_symbol() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.py"), "import b\n\nb.greet()\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "def greet():\n    pass\n").unwrap();

    let engine = generator(dir.path());
    let (before, _) = engine.full_scan().await.unwrap();

    std::fs::write(
        dir.path().join("b.py"),
        "def greet():\n    pass\n\n\ndef bye():\n    pass\n",
    )
    .unwrap();

    let (after, stats) = engine.incremental(&before).await.unwrap();

    assert!(after.nodes.contains_key("b.bye"));
    assert!(has_edge(&after, "b.py", "b.bye", EdgeType::Defines));

    let diff = after.diff.as_ref().expect("diff recorded");
    assert_eq!(diff.added_nodes, vec!["b.bye".to_string()]);
    assert!(diff.removed_nodes.is_empty());

    // Everything owned by a.py is untouched.
    for (id, node) in before.nodes.iter().filter(|(id, _)| id.starts_with("a.")) {
        assert_eq!(after.nodes.get(id), Some(node), "node {id} changed");
    }
    assert_eq!(before.history.get("a.py"), after.history.get("a.py"));
    // Only the changed file and its importer were re-analyzed.
    assert_eq!(stats.files, 2);
    assert!(genome_core::validate(&after).is_empty());
}

#[tokio::test]
async fn rescan_without_changes_is_idempotent() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.py"), "def hello():\n    pass\n").unwrap();

    let engine = generator(dir.path());
    let (first, _) = engine.full_scan().await.unwrap();
    let (second, stats) = engine.incremental(&first).await.unwrap();

    assert_eq!(normalized(&first), normalized(&second));
    assert_eq!(stats.files, 0);
}

#[tokio::test]
async fn incremental_matches_full_scan_after_change() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.py"), "import b\n\nb.greet()\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "def greet():\n    pass\n").unwrap();

    let engine = generator(dir.path());
    let (before, _) = engine.full_scan().await.unwrap();

    std::fs::write(
        dir.path().join("b.py"),
        "def greet():\n    pass\n\n\ndef bye():\n    pass\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("c.py"), "def extra():\n    pass\n").unwrap();

    let (incremental, _) = engine.incremental(&before).await.unwrap();
    let (full, _) = engine.full_scan().await.unwrap();

    assert_eq!(normalized(&full), normalized(&incremental));
}

#[tokio::test]
async fn removed_file_drops_its_nodes() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.py"), "import b\n\nb.greet()\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "def greet():\n    pass\n").unwrap();

    let engine = generator(dir.path());
    let (before, _) = engine.full_scan().await.unwrap();

    std::fs::remove_file(dir.path().join("b.py")).unwrap();
    let (after, _) = engine.incremental(&before).await.unwrap();

    assert!(!after.nodes.contains_key("b.py"));
    assert!(!after.nodes.contains_key("b.greet"));
    // The dangling import re-resolves to an external module.
    assert!(has_edge(&after, "a.py", "ext:b", EdgeType::Imports));
    assert!(genome_core::validate(&after).is_empty());
}

#[tokio::test]
async fn analyzer_failures_mark_partial_but_do_not_abort() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("good.py"), "def ok():\n    pass\n").unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let (genome, stats) = generator(dir.path()).full_scan().await.unwrap();
    assert!(genome.nodes.contains_key("good.ok"));
    assert!(genome.nodes.contains_key("broken.json"));
    assert!(!stats.errors.is_empty());
}
