use genome_core::Genome;

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// GraphML projection with type/language/criticality node attributes and
/// a relation attribute on edges.
pub fn export_graphml(genome: &Genome) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"d0\" for=\"node\" attr.name=\"type\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"d1\" for=\"node\" attr.name=\"language\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"d2\" for=\"node\" attr.name=\"criticality\" attr.type=\"double\"/>\n");
    out.push_str("  <key id=\"d3\" for=\"edge\" attr.name=\"relation\" attr.type=\"string\"/>\n");
    out.push_str("  <graph id=\"G\" edgedefault=\"directed\">\n");

    for (id, node) in &genome.nodes {
        out.push_str(&format!("    <node id=\"{}\">\n", escape_xml(id)));
        out.push_str(&format!(
            "      <data key=\"d0\">{}</data>\n",
            node.node_type.as_str()
        ));
        if let Some(language) = &node.language {
            out.push_str(&format!(
                "      <data key=\"d1\">{}</data>\n",
                escape_xml(language)
            ));
        }
        out.push_str(&format!(
            "      <data key=\"d2\">{}</data>\n",
            node.criticality
        ));
        out.push_str("    </node>\n");
    }

    for (index, edge) in genome.edges.iter().enumerate() {
        out.push_str(&format!(
            "    <edge id=\"e{index}\" source=\"{}\" target=\"{}\">\n",
            escape_xml(&edge.from),
            escape_xml(&edge.to)
        ));
        out.push_str(&format!(
            "      <data key=\"d3\">{}</data>\n",
            edge.edge_type.as_str()
        ));
        out.push_str("    </edge>\n");
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}
