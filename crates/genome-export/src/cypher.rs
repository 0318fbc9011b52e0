use genome_core::Genome;

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

fn label(node_type: &str) -> String {
    let mut chars = node_type.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => "Node".to_string(),
    }
}

/// Cypher import script: one MERGE per node, one MATCH+MERGE per edge,
/// relation types upper-cased Neo4j style.
pub fn export_cypher(genome: &Genome) -> String {
    let mut lines = vec!["// RepoGenome import script".to_string()];

    for (id, node) in &genome.nodes {
        let mut properties = vec![format!("id: '{}'", escape(id))];
        if let Some(file) = &node.file {
            properties.push(format!("file: '{}'", escape(file)));
        }
        if let Some(language) = &node.language {
            properties.push(format!("language: '{}'", escape(language)));
        }
        properties.push(format!("criticality: {}", node.criticality));
        lines.push(format!(
            "MERGE (:{} {{{}}});",
            label(node.node_type.as_str()),
            properties.join(", ")
        ));
    }

    for edge in &genome.edges {
        lines.push(format!(
            "MATCH (a {{id: '{}'}}), (b {{id: '{}'}}) MERGE (a)-[:{}]->(b);",
            escape(&edge.from),
            escape(&edge.to),
            edge.edge_type.as_str().to_ascii_uppercase()
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use genome_core::{Edge, EdgeType, Node};

    #[test]
    fn merges_nodes_then_edges() {
        let mut genome = Genome::default();
        genome
            .nodes
            .insert("o'brien.py".into(), Node::file_node("o'brien.py", None));
        genome
            .nodes
            .insert("b.py".into(), Node::file_node("b.py", None));
        genome
            .edges
            .push(Edge::new("o'brien.py", "b.py", EdgeType::DependsOn));

        let cypher = export_cypher(&genome);
        assert!(cypher.contains("MERGE (:File {id: 'b.py'"));
        assert!(cypher.contains("o\\'brien.py"));
        assert!(cypher.contains("MERGE (a)-[:DEPENDS_ON]->(b);"));
    }
}
