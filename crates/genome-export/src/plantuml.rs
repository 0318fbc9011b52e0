use genome_core::{Genome, NodeType};
use std::collections::BTreeSet;

fn component_alias(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// PlantUML component listing: file-level components with their import
/// and dependency relations. Symbol-level detail is deliberately lossy.
pub fn export_plantuml(genome: &Genome) -> String {
    let mut lines = vec!["@startuml".to_string()];

    let files: BTreeSet<&String> = genome
        .nodes
        .iter()
        .filter(|(id, node)| {
            node.file.as_deref() == Some(id.as_str())
                || node.node_type == NodeType::Module
        })
        .map(|(id, _)| id)
        .collect();

    for id in &files {
        lines.push(format!("component \"{}\" as {}", id, component_alias(id)));
    }
    for edge in &genome.edges {
        if files.contains(&edge.from) && files.contains(&edge.to) {
            lines.push(format!(
                "{} --> {} : {}",
                component_alias(&edge.from),
                component_alias(&edge.to),
                edge.edge_type.as_str()
            ));
        }
    }

    lines.push("@enduml".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use genome_core::{Edge, EdgeType, Node};

    #[test]
    fn components_are_files_only() {
        let mut genome = Genome::default();
        genome
            .nodes
            .insert("src/app.py".into(), Node::file_node("src/app.py", None));
        genome
            .nodes
            .insert("src/db.py".into(), Node::file_node("src/db.py", None));
        genome.nodes.insert(
            "src/app.main".into(),
            Node {
                node_type: NodeType::Function,
                file: Some("src/app.py".into()),
                language: None,
                visibility: genome_core::Visibility::Public,
                summary: None,
                criticality: 0.0,
            },
        );
        genome
            .edges
            .push(Edge::new("src/app.py", "src/db.py", EdgeType::Imports));
        genome
            .edges
            .push(Edge::new("src/app.py", "src/app.main", EdgeType::Defines));

        let uml = export_plantuml(&genome);
        assert!(uml.contains("component \"src/app.py\""));
        assert!(!uml.contains("src/app.main"));
        assert!(uml.contains("src_app_py --> src_db_py : imports"));
    }
}
