use genome_core::Genome;

pub struct CsvPair {
    pub nodes: String,
    pub edges: String,
}

fn csv_cell(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Paired node/edge CSVs suitable for spreadsheet or bulk-import use.
pub fn export_csv(genome: &Genome) -> CsvPair {
    let mut nodes = String::from("id,type,file,language,visibility,criticality\n");
    for (id, node) in &genome.nodes {
        let visibility = serde_visibility(node.visibility);
        nodes.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_cell(id),
            node.node_type.as_str(),
            csv_cell(node.file.as_deref().unwrap_or("")),
            csv_cell(node.language.as_deref().unwrap_or("")),
            visibility,
            node.criticality
        ));
    }

    let mut edges = String::from("from,to,type\n");
    for edge in &genome.edges {
        edges.push_str(&format!(
            "{},{},{}\n",
            csv_cell(&edge.from),
            csv_cell(&edge.to),
            edge.edge_type.as_str()
        ));
    }

    CsvPair { nodes, edges }
}

fn serde_visibility(visibility: genome_core::Visibility) -> &'static str {
    match visibility {
        genome_core::Visibility::Public => "public",
        genome_core::Visibility::Internal => "internal",
        genome_core::Visibility::Private => "private",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genome_core::{Edge, EdgeType, Node};

    #[test]
    fn headers_and_escaping() {
        let mut genome = Genome::default();
        genome
            .nodes
            .insert("a,b.py".into(), Node::file_node("a,b.py", Some("Python".into())));
        genome
            .nodes
            .insert("c.py".into(), Node::file_node("c.py", None));
        genome.edges.push(Edge::new("a,b.py", "c.py", EdgeType::Imports));

        let pair = export_csv(&genome);
        assert!(pair.nodes.starts_with("id,type,file,language,visibility,criticality\n"));
        assert!(pair.nodes.contains("\"a,b.py\""));
        assert!(pair.edges.contains("\"a,b.py\",c.py,imports\n"));
    }
}
