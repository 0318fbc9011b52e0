//! # Genome Export
//!
//! Lossy projections of the genome graph for external tooling: GraphML
//! for graph editors, Graphviz DOT, paired node/edge CSVs, a Cypher
//! import script, and a PlantUML component listing. The standard JSON
//! artifact remains the only lossless representation.

mod cypher;
mod dot;
mod graphml;
mod plantuml;
mod tabular;

use genome_core::{CompactionMode, Genome, GenomeError, Result};
use std::path::{Path, PathBuf};

pub use cypher::export_cypher;
pub use dot::export_dot;
pub use graphml::export_graphml;
pub use plantuml::export_plantuml;
pub use tabular::{export_csv, CsvPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Graphml,
    Dot,
    Csv,
    Cypher,
    Plantuml,
}

impl std::str::FromStr for ExportFormat {
    type Err = GenomeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "graphml" => Ok(ExportFormat::Graphml),
            "dot" | "graphviz" => Ok(ExportFormat::Dot),
            "csv" => Ok(ExportFormat::Csv),
            "cypher" => Ok(ExportFormat::Cypher),
            "plantuml" | "puml" => Ok(ExportFormat::Plantuml),
            other => Err(GenomeError::InvalidInput(format!(
                "unknown export format '{other}'"
            ))),
        }
    }
}

/// Write the genome in the requested format. CSV produces a node/edge
/// file pair next to `output_path`. Returns the written paths and total
/// byte count.
pub fn export(genome: &Genome, format: ExportFormat, output_path: &Path) -> Result<(Vec<PathBuf>, u64)> {
    match format {
        ExportFormat::Json => {
            let bytes =
                genome_core::save_genome(genome, output_path, CompactionMode::Standard, false)?;
            Ok((vec![output_path.to_path_buf()], bytes))
        }
        ExportFormat::Graphml => write_single(output_path, export_graphml(genome)),
        ExportFormat::Dot => write_single(output_path, export_dot(genome)),
        ExportFormat::Cypher => write_single(output_path, export_cypher(genome)),
        ExportFormat::Plantuml => write_single(output_path, export_plantuml(genome)),
        ExportFormat::Csv => {
            let CsvPair { nodes, edges } = export_csv(genome);
            let nodes_path = sibling(output_path, "nodes.csv");
            let edges_path = sibling(output_path, "edges.csv");
            std::fs::write(&nodes_path, &nodes)?;
            std::fs::write(&edges_path, &edges)?;
            let total = (nodes.len() + edges.len()) as u64;
            Ok((vec![nodes_path, edges_path], total))
        }
    }
}

fn write_single(path: &Path, content: String) -> Result<(Vec<PathBuf>, u64)> {
    std::fs::write(path, &content)?;
    Ok((vec![path.to_path_buf()], content.len() as u64))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("genome");
    path.with_file_name(format!("{stem}.{suffix}"))
}
