//! Tool input schemas. Field names and defaults mirror the wire protocol;
//! descriptions surface in the MCP tool inventory.

use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ScanRequest {
    /// Scan scope: full, structure, flows, history.
    #[schemars(description = "Scan scope: full | structure | flows | history")]
    pub scope: Option<String>,

    /// Reuse the previous genome and re-analyze only changed files.
    #[schemars(description = "Incremental update when a previous genome exists")]
    pub incremental: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueryRequest {
    /// Structured predicate tree, or a shorthand field/value object.
    #[schemars(description = "Predicate tree: and/or/not compounds over field leaves")]
    pub predicate: Option<serde_json::Value>,

    #[schemars(description = "1-based page number")]
    pub page: Option<usize>,

    #[schemars(description = "Items per page (default 50, capped)")]
    pub page_size: Option<usize>,

    /// Explicit projection; accepts long names and compact aliases.
    #[schemars(description = "Fields to project (long names or compact aliases)")]
    pub fields: Option<Vec<String>>,

    #[schemars(description = "Return bare node ids instead of projections")]
    pub ids_only: Option<bool>,

    #[schemars(description = "Truncate summaries to this many characters")]
    pub max_summary_length: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetNodeRequest {
    #[schemars(description = "Node id")]
    pub id: String,

    #[schemars(description = "0 = node only, 1 = direct edges, >=2 BFS-expanded")]
    pub max_depth: Option<usize>,

    #[schemars(description = "Include incoming/outgoing edge lists")]
    pub include_edges: Option<bool>,

    #[schemars(description = "Restrict edges to these types")]
    pub edge_types: Option<Vec<String>>,

    #[schemars(description = "Fields to project")]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    #[schemars(description = "Free-text query routed through the keyword translator")]
    pub query: String,

    #[schemars(description = "Restrict to one node type")]
    pub node_type: Option<String>,

    #[schemars(description = "Restrict to one language tag")]
    pub language: Option<String>,

    #[schemars(description = "Substring filter over file paths")]
    pub file_pattern: Option<String>,

    #[schemars(description = "Maximum results (default 20)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DependenciesRequest {
    #[schemars(description = "Node id to expand around")]
    pub id: String,

    #[schemars(description = "Traversal direction: in | out | both")]
    pub direction: Option<String>,

    #[schemars(description = "BFS depth (capped)")]
    pub depth: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExportRequest {
    #[schemars(description = "Format: json | graphml | dot | csv | cypher | plantuml")]
    pub format: String,

    #[schemars(description = "Output path (defaults next to the artifact)")]
    pub output_path: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImpactRequest {
    #[schemars(description = "Node ids the proposed change touches")]
    pub affected_nodes: Vec<String>,

    #[schemars(description = "Operation: modify | delete | add | read")]
    pub operation: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateRequest {
    #[schemars(description = "Why the repository changed")]
    pub reason: String,

    #[schemars(description = "Node ids the client reports as added")]
    pub added: Option<Vec<String>>,

    #[schemars(description = "Node ids the client reports as removed")]
    pub removed: Option<Vec<String>>,

    #[schemars(description = "Node ids the client reports as updated")]
    pub updated: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BuildContextRequest {
    #[schemars(description = "Task goal, e.g. 'refactor authentication flow'")]
    pub goal: String,

    #[schemars(description = "Token budget for the selection (default 2000)")]
    pub budget_tokens: Option<usize>,

    #[schemars(description = "Node ids that must be included")]
    pub must_include: Option<Vec<String>>,

    #[schemars(description = "Node ids to exclude")]
    pub exclude: Option<Vec<String>>,

    #[schemars(description = "Session id whose memory should be consulted")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ContextIdRequest {
    #[schemars(description = "Context version id returned by build_context")]
    pub context_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetSessionRequest {
    #[schemars(description = "Client session id")]
    pub session_id: String,

    /// Shape: `{ "facts": [..], "pinned": [..] }`.
    #[schemars(description = "Session memory: facts and pinned node ids")]
    pub state: serde_json::Value,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CompareRequest {
    #[schemars(description = "First node id")]
    pub a: String,

    #[schemars(description = "Second node id")]
    pub b: String,

    #[schemars(description = "Optional path to a prior genome for side a")]
    pub a_genome_path: Option<String>,

    #[schemars(description = "Optional path to a prior genome for side b")]
    pub b_genome_path: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FindPathRequest {
    #[schemars(description = "Start node id")]
    pub from: String,

    #[schemars(description = "Target node id")]
    pub to: String,

    #[schemars(description = "Maximum path length in hops (default 6)")]
    pub max_len: Option<usize>,

    #[schemars(description = "Edge-type whitelist (default: all types)")]
    pub edge_types: Option<Vec<String>>,
}
