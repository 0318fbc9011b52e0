use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about one scan or update operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScanStats {
    /// Number of files analyzed (incremental scans count the subset).
    pub files: usize,
    pub nodes: usize,
    pub edges: usize,
    pub flows: usize,
    pub concepts: usize,
    pub time_ms: u64,
    /// File counts per language tag.
    pub languages: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ScanStats {
    pub fn from_genome(genome: &genome_core::Genome) -> Self {
        Self {
            files: genome
                .nodes
                .iter()
                .filter(|(id, n)| n.file.as_deref() == Some(id.as_str()))
                .count(),
            nodes: genome.nodes.len(),
            edges: genome.edges.len(),
            flows: genome.flows.len(),
            concepts: genome.concepts.len(),
            time_ms: 0,
            languages: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}
