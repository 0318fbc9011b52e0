use crate::predicate::Predicate;
use genome_core::{project_fields, Edge, EdgeType, Genome, GenomeError, Node, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction as PetDirection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;
const MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
    Both,
}

impl std::str::FromStr for Direction {
    type Err = GenomeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            "both" => Ok(Direction::Both),
            other => Err(GenomeError::InvalidInput(format!(
                "direction must be in|out|both, got '{other}'"
            ))),
        }
    }
}

/// Options accepted by `query`. Also part of the result-cache key, so it
/// serializes deterministically.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryOptions {
    pub page: usize,
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub ids_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_summary_length: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            fields: None,
            ids_only: false,
            max_summary_length: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Page {
    pub items: Vec<Value>,
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubgraphNode {
    pub id: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NodeView {
    pub node: Value,
    pub incoming_edges: Vec<Edge>,
    pub outgoing_edges: Vec<Edge>,
    /// Neighborhood reached by BFS when `max_depth >= 2`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<SubgraphNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DependencyView {
    pub root: String,
    pub direction: Direction,
    pub nodes: Vec<SubgraphNode>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldDiff {
    pub field: String,
    pub a: Value,
    pub b: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompareResult {
    pub a: String,
    pub b: String,
    pub field_changes: Vec<FieldDiff>,
    pub edges_only_in_a: Vec<Edge>,
    pub edges_only_in_b: Vec<Edge>,
}

/// Read-side query engine over one immutable genome snapshot. Builds a
/// petgraph adjacency index once; traversal queries run over it without
/// touching the edge list again.
pub struct QueryEngine {
    genome: Arc<Genome>,
    graph: DiGraph<String, EdgeType>,
    indices: HashMap<String, NodeIndex>,
}

impl QueryEngine {
    pub fn new(genome: Arc<Genome>) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::with_capacity(genome.nodes.len());
        for id in genome.nodes.keys() {
            let index = graph.add_node(id.clone());
            indices.insert(id.clone(), index);
        }
        for edge in &genome.edges {
            if let (Some(&from), Some(&to)) = (indices.get(&edge.from), indices.get(&edge.to)) {
                graph.add_edge(from, to, edge.edge_type);
            }
        }
        Self {
            genome,
            graph,
            indices,
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Flatten a node into its wire projection, id included.
    pub fn node_json(&self, id: &str, node: &Node, max_summary: Option<usize>) -> Value {
        let mut value = serde_json::to_value(node).unwrap_or(Value::Null);
        if let Some(object) = value.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.to_string()));
            if let Some(max) = max_summary {
                if let Some(summary) = object.get("summary").and_then(Value::as_str) {
                    if summary.chars().count() > max {
                        let truncated: String = summary.chars().take(max).collect();
                        object.insert("summary".to_string(), Value::String(truncated));
                    }
                }
            }
        }
        value
    }

    /// Filtered, paginated, field-projected node query. Deterministic for
    /// a fixed genome: nodes iterate in id order.
    pub fn query(&self, predicate: &Predicate, options: &QueryOptions) -> Result<Page> {
        let page = options.page.max(1);
        let page_size = options.page_size.clamp(1, MAX_PAGE_SIZE);

        let mut matches: Vec<(&String, &Node)> = Vec::new();
        for (id, node) in &self.genome.nodes {
            let value = self.node_json(id, node, options.max_summary_length);
            if predicate.matches(&value) {
                matches.push((id, node));
            }
        }

        let total_count = matches.len();
        let total_pages = total_count.div_ceil(page_size);
        let start = (page - 1).saturating_mul(page_size);

        let items: Vec<Value> = matches
            .into_iter()
            .skip(start)
            .take(page_size)
            .map(|(id, node)| {
                if options.ids_only {
                    Value::String(id.clone())
                } else {
                    let value = self.node_json(id, node, options.max_summary_length);
                    match &options.fields {
                        Some(fields) => project_fields(&value, fields),
                        None => value,
                    }
                }
            })
            .collect();

        Ok(Page {
            items,
            page,
            page_size,
            total_count,
            total_pages,
        })
    }

    /// Node with its direct relationships; `max_depth >= 2` BFS-expands
    /// the neighborhood.
    pub fn get_node(
        &self,
        id: &str,
        max_depth: usize,
        include_edges: bool,
        edge_types: Option<&[EdgeType]>,
        fields: Option<&[String]>,
    ) -> Result<NodeView> {
        let node = self
            .genome
            .nodes
            .get(id)
            .ok_or_else(|| GenomeError::NotFound(format!("node '{id}'")))?;

        let mut value = self.node_json(id, node, None);
        if let Some(fields) = fields {
            value = project_fields(&value, fields);
        }

        let wanted = |edge_type: EdgeType| -> bool {
            edge_types.map_or(true, |allowed| allowed.contains(&edge_type))
        };

        let (incoming, outgoing) = if include_edges && max_depth >= 1 {
            let incoming = self
                .genome
                .edges_to(id)
                .filter(|e| wanted(e.edge_type))
                .cloned()
                .collect();
            let outgoing = self
                .genome
                .edges_from(id)
                .filter(|e| wanted(e.edge_type))
                .cloned()
                .collect();
            (incoming, outgoing)
        } else {
            (Vec::new(), Vec::new())
        };

        let related = if max_depth >= 2 {
            self.bfs(id, Direction::Both, max_depth.min(MAX_DEPTH), edge_types)?
                .into_iter()
                .filter(|n| n.id != id)
                .collect()
        } else {
            Vec::new()
        };

        Ok(NodeView {
            node: value,
            incoming_edges: incoming,
            outgoing_edges: outgoing,
            related,
        })
    }

    fn bfs(
        &self,
        start: &str,
        direction: Direction,
        depth: usize,
        edge_types: Option<&[EdgeType]>,
    ) -> Result<Vec<SubgraphNode>> {
        let &start_index = self
            .indices
            .get(start)
            .ok_or_else(|| GenomeError::NotFound(format!("node '{start}'")))?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        visited.insert(start_index);
        queue.push_back((start_index, 0));

        while let Some((index, distance)) = queue.pop_front() {
            out.push(SubgraphNode {
                id: self.graph[index].clone(),
                depth: distance,
            });
            if distance >= depth {
                continue;
            }

            let mut neighbors: Vec<NodeIndex> = Vec::new();
            if matches!(direction, Direction::Out | Direction::Both) {
                for edge in self.graph.edges_directed(index, PetDirection::Outgoing) {
                    if edge_types.map_or(true, |allowed| allowed.contains(edge.weight())) {
                        neighbors.push(edge.target());
                    }
                }
            }
            if matches!(direction, Direction::In | Direction::Both) {
                for edge in self.graph.edges_directed(index, PetDirection::Incoming) {
                    if edge_types.map_or(true, |allowed| allowed.contains(edge.weight())) {
                        neighbors.push(edge.source());
                    }
                }
            }
            neighbors.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
            for neighbor in neighbors {
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, distance + 1));
                }
            }
        }
        Ok(out)
    }

    /// Dependency subgraph around a node. Depth 0 is empty; depth is
    /// capped. Cycles are handled by the visited set.
    pub fn dependencies(&self, id: &str, direction: Direction, depth: usize) -> Result<DependencyView> {
        if !self.genome.nodes.contains_key(id) {
            return Err(GenomeError::NotFound(format!("node '{id}'")));
        }
        if depth == 0 {
            return Ok(DependencyView {
                root: id.to_string(),
                direction,
                nodes: Vec::new(),
                edges: Vec::new(),
            });
        }

        let nodes = self.bfs(id, direction, depth.min(MAX_DEPTH), None)?;
        let members: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges = self
            .genome
            .edges
            .iter()
            .filter(|e| members.contains(e.from.as_str()) && members.contains(e.to.as_str()))
            .cloned()
            .collect();

        Ok(DependencyView {
            root: id.to_string(),
            direction,
            nodes,
            edges,
        })
    }

    /// Shortest path over the whitelisted edge types, or `NotReachable`
    /// within `max_len` hops.
    pub fn find_path(
        &self,
        from: &str,
        to: &str,
        max_len: usize,
        whitelist: Option<&[EdgeType]>,
    ) -> Result<Vec<String>> {
        let &start = self
            .indices
            .get(from)
            .ok_or_else(|| GenomeError::NotFound(format!("node '{from}'")))?;
        let &goal = self
            .indices
            .get(to)
            .ok_or_else(|| GenomeError::NotFound(format!("node '{to}'")))?;

        let mut parents: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        queue.push_back((start, 0));
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        visited.insert(start);

        while let Some((index, distance)) = queue.pop_front() {
            if index == goal {
                let mut path = vec![self.graph[index].clone()];
                let mut cursor = index;
                while let Some(&parent) = parents.get(&cursor) {
                    path.push(self.graph[parent].clone());
                    cursor = parent;
                }
                path.reverse();
                return Ok(path);
            }
            if distance >= max_len {
                continue;
            }
            let mut neighbors: Vec<NodeIndex> = Vec::new();
            for edge in self.graph.edges_directed(index, PetDirection::Outgoing) {
                if whitelist.map_or(true, |allowed| allowed.contains(edge.weight())) {
                    neighbors.push(edge.target());
                }
            }
            neighbors.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
            for neighbor in neighbors {
                if visited.insert(neighbor) {
                    parents.insert(neighbor, index);
                    queue.push_back((neighbor, distance + 1));
                }
            }
        }

        Err(GenomeError::NotReachable {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Field-by-field diff of two node refs, plus their relationship
    /// difference. Either side may come from a prior genome.
    pub fn compare(
        &self,
        a_id: &str,
        a_genome: Option<&Genome>,
        b_id: &str,
        b_genome: Option<&Genome>,
    ) -> Result<CompareResult> {
        let a_genome = a_genome.unwrap_or(&self.genome);
        let b_genome = b_genome.unwrap_or(&self.genome);

        let a_node = a_genome
            .nodes
            .get(a_id)
            .ok_or_else(|| GenomeError::NotFound(format!("node '{a_id}'")))?;
        let b_node = b_genome
            .nodes
            .get(b_id)
            .ok_or_else(|| GenomeError::NotFound(format!("node '{b_id}'")))?;

        let a_value = serde_json::to_value(a_node)?;
        let b_value = serde_json::to_value(b_node)?;
        let mut fields: BTreeMap<&str, ()> = BTreeMap::new();
        if let (Some(a_object), Some(b_object)) = (a_value.as_object(), b_value.as_object()) {
            fields.extend(a_object.keys().map(|k| (k.as_str(), ())));
            fields.extend(b_object.keys().map(|k| (k.as_str(), ())));
        }

        let mut field_changes = Vec::new();
        for (field, ()) in fields {
            let a = a_value.get(field).cloned().unwrap_or(Value::Null);
            let b = b_value.get(field).cloned().unwrap_or(Value::Null);
            if a != b {
                field_changes.push(FieldDiff {
                    field: field.to_string(),
                    a,
                    b,
                });
            }
        }

        let a_edges: HashSet<Edge> = a_genome
            .edges
            .iter()
            .filter(|e| e.from == a_id || e.to == a_id)
            .cloned()
            .collect();
        let b_edges: HashSet<Edge> = b_genome
            .edges
            .iter()
            .filter(|e| e.from == b_id || e.to == b_id)
            .cloned()
            .collect();

        // Compare relationships modulo the node's own name so that the
        // same node across two genome versions lines up.
        let rename = |edge: &Edge, own: &str| -> Edge {
            let mut edge = edge.clone();
            if edge.from == own {
                edge.from = "<self>".to_string();
            }
            if edge.to == own {
                edge.to = "<self>".to_string();
            }
            edge
        };
        let a_normalized: HashSet<Edge> = a_edges.iter().map(|e| rename(e, a_id)).collect();
        let b_normalized: HashSet<Edge> = b_edges.iter().map(|e| rename(e, b_id)).collect();

        let mut edges_only_in_a: Vec<Edge> = a_normalized
            .difference(&b_normalized)
            .cloned()
            .collect();
        let mut edges_only_in_b: Vec<Edge> = b_normalized
            .difference(&a_normalized)
            .cloned()
            .collect();
        edges_only_in_a.sort();
        edges_only_in_b.sort();

        Ok(CompareResult {
            a: a_id.to_string(),
            b: b_id.to_string(),
            field_changes,
            edges_only_in_a,
            edges_only_in_b,
        })
    }
}
