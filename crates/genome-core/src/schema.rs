use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Engine version advertised in `metadata.engine_version`.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current artifact schema version. Loaders reject other major versions.
pub const SCHEMA_VERSION: u32 = 2;

/// Types of nodes in the repository graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Module,
    Function,
    Class,
    Test,
    Config,
    Resource,
    Concept,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Module => "module",
            NodeType::Function => "function",
            NodeType::Class => "class",
            NodeType::Test => "test",
            NodeType::Config => "config",
            NodeType::Resource => "resource",
            NodeType::Concept => "concept",
        }
    }
}

/// Types of relationships between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Defines,
    Imports,
    Calls,
    References,
    DependsOn,
    Mutates,
    Emits,
    Tests,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Defines => "defines",
            EdgeType::Imports => "imports",
            EdgeType::Calls => "calls",
            EdgeType::References => "references",
            EdgeType::DependsOn => "depends_on",
            EdgeType::Mutates => "mutates",
            EdgeType::Emits => "emits",
            EdgeType::Tests => "tests",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Internal,
    Private,
}

/// Closed side-effect tag set for flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SideEffect {
    #[serde(rename = "db.read")]
    DbRead,
    #[serde(rename = "db.write")]
    DbWrite,
    #[serde(rename = "net.out")]
    NetOut,
    #[serde(rename = "fs.read")]
    FsRead,
    #[serde(rename = "fs.write")]
    FsWrite,
    #[serde(rename = "cache")]
    Cache,
    #[serde(rename = "emit")]
    Emit,
}

/// A node in the repository graph.
///
/// Keyed externally by a stable string id: files use their repo-relative
/// POSIX path, symbols use `<file-stem-path>.<name>`, concepts use
/// `concept:<slug>`, and unresolved imports use `ext:<module>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Repo-relative path. `None` only for concept and external nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Bounded [0, 1]; derived from fan-in.
    #[serde(default)]
    pub criticality: f32,
}

impl Node {
    pub fn file_node(path: &str, language: Option<String>) -> Self {
        Self {
            node_type: NodeType::File,
            file: Some(path.to_string()),
            language,
            visibility: Visibility::Public,
            summary: None,
            criticality: 0.0,
        }
    }

    /// Virtual node for an import that resolved outside the repository.
    pub fn external_module() -> Self {
        Self {
            node_type: NodeType::Module,
            file: None,
            language: None,
            visibility: Visibility::Public,
            summary: None,
            criticality: 0.0,
        }
    }
}

/// A directed typed relation. `(from, to, type)` is unique per genome.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            edge_type,
        }
    }
}

/// An advisory runtime execution path derived from the call graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Flow {
    pub entry: String,
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub side_effects: Vec<SideEffect>,
    pub confidence: f32,
}

/// A domain concept grouping existing nodes. Introduces no edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Concept {
    pub nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Temporal evolution data for a file node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryEntry {
    pub churn_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_major_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RiskEntry {
    pub risk_score: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

/// A public API contract keyed by signature (node id).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContractEntry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub breaking_change_risk: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestsSummary {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_files: Vec<String>,
}

/// High-level summary for the agent boot section, derived from the genome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub architectural_style: Vec<String>,
    #[serde(default)]
    pub core_domains: Vec<String>,
    #[serde(default)]
    pub hotspots: Vec<String>,
    #[serde(default)]
    pub do_not_touch: Vec<String>,
}

/// Repository metadata and generation information.
///
/// `repo_hash` fingerprints the analyzed tree state (content hashes, not
/// mtimes); the `fingerprints` table drives incremental change detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub repo_hash: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub engine_version: String,
    #[serde(default)]
    pub schema_version: u32,
    /// Serialization mode tag used by the loader to auto-detect compaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Per-file `sha256:` content fingerprints.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fingerprints: BTreeMap<String, String>,
    /// Set when one or more analyzers failed and coverage is best-effort.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

/// Diff between two genome versions, embedded after incremental updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenomeDiff {
    #[serde(default)]
    pub added_nodes: Vec<String>,
    #[serde(default)]
    pub removed_nodes: Vec<String>,
    #[serde(default)]
    pub modified_nodes: Vec<String>,
    #[serde(default)]
    pub added_edges: Vec<Edge>,
    #[serde(default)]
    pub removed_edges: Vec<Edge>,
}

impl GenomeDiff {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }
}

/// The persisted repository genome.
///
/// Ordered maps and a canonically sorted edge list keep serialization
/// byte-deterministic, which the idempotent-scan property depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Genome {
    pub metadata: Metadata,
    pub summary: Summary,
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<Flow>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub concepts: BTreeMap<String, Concept>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub history: BTreeMap<String, HistoryEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub risk: BTreeMap<String, RiskEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contracts: BTreeMap<String, ContractEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestsSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<GenomeDiff>,
}

impl Genome {
    /// Insert an edge, preserving `(from, to, type)` uniqueness.
    pub fn add_edge(&mut self, edge: Edge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Sort edges into canonical order and drop duplicates.
    pub fn canonicalize_edges(&mut self) {
        self.edges.sort();
        self.edges.dedup();
    }

    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    pub fn edges_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// Fan-in over `calls`/`imports` edges, the input to criticality and
    /// contract risk.
    pub fn dependency_fan_in(&self, id: &str) -> usize {
        self.edges
            .iter()
            .filter(|e| {
                e.to == id && matches!(e.edge_type, EdgeType::Calls | EdgeType::Imports)
            })
            .count()
    }

    /// All node ids referenced anywhere in the genome (edges, flows,
    /// concepts, history, risk, contracts).
    pub fn referenced_ids(&self) -> BTreeSet<&str> {
        let mut ids: BTreeSet<&str> = BTreeSet::new();
        for edge in &self.edges {
            ids.insert(edge.from.as_str());
            ids.insert(edge.to.as_str());
        }
        for flow in &self.flows {
            ids.insert(flow.entry.as_str());
            ids.extend(flow.path.iter().map(String::as_str));
        }
        for concept in self.concepts.values() {
            ids.extend(concept.nodes.iter().map(String::as_str));
        }
        ids.extend(self.history.keys().map(String::as_str));
        ids.extend(self.risk.keys().map(String::as_str));
        for contract in self.contracts.values() {
            ids.extend(contract.depends_on.iter().map(String::as_str));
        }
        ids
    }
}

/// Well-formed virtual ids are permitted in references without a backing
/// node entry: external modules and concept groupings.
pub fn is_virtual_id(id: &str) -> bool {
    id.starts_with("ext:") || id.starts_with("concept:")
}
