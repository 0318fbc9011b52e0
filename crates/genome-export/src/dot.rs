use genome_core::Genome;

fn escape_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn escape_label(label: &str) -> String {
    label.replace('"', "\\\"").replace('\n', "\\n")
}

/// Graphviz DOT projection: every node as a labelled box, edges labelled
/// by relation type.
pub fn export_dot(genome: &Genome) -> String {
    let mut lines = vec![
        "digraph RepoGenome {".to_string(),
        "  rankdir=\"LR\";".to_string(),
        "  node [shape=box];".to_string(),
    ];

    for (id, node) in &genome.nodes {
        let short = id.rsplit('/').next().unwrap_or(id);
        let label = format!("{short}\\n({})", node.node_type.as_str());
        lines.push(format!(
            "  \"{}\" [label=\"{}\"];",
            escape_id(id),
            escape_label(&label)
        ));
    }
    for edge in &genome.edges {
        lines.push(format!(
            "  \"{}\" -> \"{}\" [label=\"{}\"];",
            escape_id(&edge.from),
            escape_id(&edge.to),
            edge.edge_type.as_str()
        ));
    }

    lines.push("}".to_string());
    lines.join("\n")
}
