use crate::contract::{ContractState, ImpactRecord, ToolClass};
use crate::schemas::*;
use crate::storage::GenomeStore;
use genome_context::{ContextAssembler, ContextRequest, ContextStore, SessionStore};
use genome_core::{
    load_genome, to_mode_value, CompactionMode, EdgeType, ErrorEnvelope, Genome, GenomeError,
};
use genome_engine::{
    file_fingerprint, repo_hash, FilesystemSource, GenomeGenerator, ScanConfig, SubsystemToggles,
    WalkSource,
};
use genome_export::ExportFormat;
use genome_query::{
    analyze_impact, translate_query, CacheConfig, Direction, Predicate, QueryCache, QueryEngine,
    QueryOptions,
};
use rmcp::handler::server::tool::{Parameters, ToolRouter};
use std::future::Future;
use rmcp::model::{
    AnnotateAble, CallToolResult, Content, Implementation, ListResourcesResult,
    PaginatedRequestParam, RawResource, ReadResourceRequestParam, ReadResourceResult,
    ResourceContents, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DEFAULT_CONTEXT_BUDGET: usize = 2_000;
const DEFAULT_SEARCH_LIMIT: usize = 20;
const SCAN_DEADLINE: Duration = Duration::from_secs(300);

struct ServiceState {
    root: PathBuf,
    base_config: ScanConfig,
    store: GenomeStore,
    contract: Mutex<ContractState>,
    cache: QueryCache,
    contexts: ContextStore,
    sessions: SessionStore,
}

/// Repo Genome MCP service: resources expose read-only genome views,
/// tools run scans, queries, impact analysis, and context assembly. The
/// agent contract is enforced before every tool body runs.
#[derive(Clone)]
pub struct GenomeService {
    state: Arc<ServiceState>,
    tool_router: ToolRouter<Self>,
}

fn ok_json<T: serde::Serialize>(value: &T) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )])
}

fn fail(err: &GenomeError) -> CallToolResult {
    let envelope = ErrorEnvelope::from(err);
    CallToolResult::error(vec![Content::text(
        serde_json::to_string_pretty(&envelope).unwrap_or_default(),
    )])
}

fn parse_edge_types(raw: Option<&[String]>) -> Result<Option<Vec<EdgeType>>, GenomeError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let mut parsed = Vec::with_capacity(raw.len());
    for name in raw {
        let edge_type: EdgeType = serde_json::from_value(Value::String(name.clone()))
            .map_err(|_| GenomeError::InvalidInput(format!("unknown edge type '{name}'")))?;
        parsed.push(edge_type);
    }
    Ok(Some(parsed))
}

impl GenomeService {
    pub fn new(root: PathBuf, base_config: ScanConfig) -> Self {
        let store = GenomeStore::new(&root, base_config.gzip);
        Self {
            state: Arc::new(ServiceState {
                root,
                base_config,
                store,
                contract: Mutex::new(ContractState::default()),
                cache: QueryCache::new(CacheConfig::default()),
                contexts: ContextStore::new(),
                sessions: SessionStore::new(),
            }),
            tool_router: Self::tool_router(),
        }
    }

    fn gate(&self, class: ToolClass) -> Result<(), GenomeError> {
        self.state
            .contract
            .lock()
            .map_err(|_| GenomeError::InvalidInput("contract state poisoned".into()))?
            .check(class)
    }

    fn snapshot(&self) -> Result<Arc<Genome>, GenomeError> {
        self.state.store.snapshot_or_load()
    }

    fn scan_config(&self, scope: Option<&str>) -> Result<ScanConfig, GenomeError> {
        let mut config = self.state.base_config.clone();
        config.subsystems = match scope.unwrap_or("full") {
            "full" => SubsystemToggles::default(),
            "structure" => SubsystemToggles::structure_only(),
            "flows" => SubsystemToggles {
                flows: true,
                ..SubsystemToggles::structure_only()
            },
            "history" => SubsystemToggles {
                history: true,
                ..SubsystemToggles::structure_only()
            },
            other => {
                return Err(GenomeError::InvalidInput(format!(
                    "unknown scan scope '{other}'"
                )))
            }
        };
        config.deadline = Some(Instant::now() + SCAN_DEADLINE);
        Ok(config)
    }

    async fn run_scan(&self, scope: Option<&str>, incremental: bool) -> Result<Value, GenomeError> {
        let config = self.scan_config(scope)?;
        let generator = GenomeGenerator::new(&self.state.root, config);

        let _writer = self.state.store.writer_lock().await;
        let previous = self.state.store.snapshot();
        let (genome, stats) = match (incremental, previous) {
            (true, Some(old)) => generator.incremental(&old).await?,
            _ => generator.full_scan().await?,
        };
        let generation = self.state.store.install(genome)?;
        Ok(json!({ "stats": stats, "generation": generation }))
    }

    /// Query results feed the context feedback loop.
    fn observe_ids(&self, items: &[Value]) {
        let ids: Vec<String> = items
            .iter()
            .filter_map(|item| match item {
                Value::String(id) => Some(id.clone()),
                Value::Object(object) => object
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect();
        if !ids.is_empty() {
            self.state.contexts.observe(&ids);
        }
    }

    fn run_query(&self, request: &QueryRequest, require_predicate: bool) -> Result<Value, GenomeError> {
        let predicate_value = request.predicate.clone().unwrap_or(Value::Null);
        if require_predicate && predicate_value.is_null() {
            return Err(GenomeError::InvalidInput("filter requires a predicate".into()));
        }
        let predicate = Predicate::parse(&predicate_value)?;
        let options = QueryOptions {
            page: request.page.unwrap_or(1),
            page_size: request.page_size.unwrap_or(50),
            fields: request.fields.clone(),
            ids_only: request.ids_only.unwrap_or(false),
            max_summary_length: request.max_summary_length,
        };

        let generation = self.state.store.generation();
        let options_json = serde_json::to_string(&options)?;
        let key = QueryCache::key(generation, &predicate.cache_key(), &options_json);
        if let Some(cached) = self.state.cache.get(key) {
            return Ok(cached);
        }

        let snapshot = self.snapshot()?;
        let engine = QueryEngine::new(snapshot);
        let page = engine.query(&predicate, &options)?;
        self.observe_ids(&page.items);

        let value = serde_json::to_value(&page)?;
        self.state.cache.put(key, &value);
        Ok(value)
    }

    fn stats_value(genome: &Genome) -> Value {
        let mut node_types: BTreeMap<&str, usize> = BTreeMap::new();
        let mut languages: BTreeMap<String, usize> = BTreeMap::new();
        let mut criticality_sum = 0.0f64;
        for (id, node) in &genome.nodes {
            *node_types.entry(node.node_type.as_str()).or_insert(0) += 1;
            criticality_sum += node.criticality as f64;
            if node.file.as_deref() == Some(id.as_str()) {
                if let Some(language) = node.language.clone() {
                    *languages.entry(language).or_insert(0) += 1;
                }
            }
        }
        let mut edge_types: BTreeMap<&str, usize> = BTreeMap::new();
        for edge in &genome.edges {
            *edge_types.entry(edge.edge_type.as_str()).or_insert(0) += 1;
        }
        let avg_criticality = if genome.nodes.is_empty() {
            0.0
        } else {
            criticality_sum / genome.nodes.len() as f64
        };

        json!({
            "nodes": genome.nodes.len(),
            "edges": genome.edges.len(),
            "flows": genome.flows.len(),
            "concepts": genome.concepts.len(),
            "contracts": genome.contracts.len(),
            "node_types": node_types,
            "edge_types": edge_types,
            "languages": languages,
            "avg_criticality": avg_criticality,
            "generated_at": genome.metadata.generated_at,
            "repo_hash": genome.metadata.repo_hash,
        })
    }
}

// ============================================================================
// Tools
// ============================================================================

#[tool_router]
impl GenomeService {
    #[tool(description = "Scan the repository and (re)generate the genome. Incremental mode re-analyzes only changed files.")]
    pub async fn scan(
        &self,
        Parameters(request): Parameters<ScanRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Scan) {
            return Ok(fail(&err));
        }
        match self
            .run_scan(request.scope.as_deref(), request.incremental.unwrap_or(true))
            .await
        {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Query nodes with a structured predicate: and/or/not compounds, comparisons, regex, in, between. Paginated and field-projectable.")]
    pub async fn query(
        &self,
        Parameters(request): Parameters<QueryRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        match self.run_query(&request, false) {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Rich predicate filter over nodes; same surface as query but the predicate is required.")]
    pub async fn filter(
        &self,
        Parameters(request): Parameters<QueryRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        match self.run_query(&request, true) {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Fetch one node with its incoming/outgoing edges; max_depth >= 2 expands the neighborhood.")]
    pub async fn get_node(
        &self,
        Parameters(request): Parameters<GetNodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        let run = || -> Result<Value, GenomeError> {
            let edge_types = parse_edge_types(request.edge_types.as_deref())?;
            let snapshot = self.snapshot()?;
            let engine = QueryEngine::new(snapshot);
            let view = engine.get_node(
                &request.id,
                request.max_depth.unwrap_or(1),
                request.include_edges.unwrap_or(true),
                edge_types.as_deref(),
                request.fields.as_deref(),
            )?;
            self.observe_ids(std::slice::from_ref(&view.node));
            Ok(serde_json::to_value(&view)?)
        };
        match run() {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Free-text search routed through the deterministic keyword translator, with optional type/language/path filters.")]
    pub async fn search(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        let run = || -> Result<Value, GenomeError> {
            let mut clauses = vec![];
            if let Some(node_type) = &request.node_type {
                clauses.push(json!({"field": "type", "op": "eq", "value": node_type}));
            }
            if let Some(language) = &request.language {
                clauses.push(json!({"field": "language", "op": "eq", "value": language}));
            }
            if let Some(pattern) = &request.file_pattern {
                clauses.push(json!({"field": "file", "regex": regex_escape_glob(pattern)}));
            }
            let translated = translate_query(&request.query)?;
            let predicate = if clauses.is_empty() {
                translated
            } else {
                Predicate::And(vec![translated, Predicate::parse(&json!({"and": clauses}))?])
            };

            let options = QueryOptions {
                page_size: request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
                ..Default::default()
            };
            let snapshot = self.snapshot()?;
            let engine = QueryEngine::new(snapshot);
            let page = engine.query(&predicate, &options)?;
            self.observe_ids(&page.items);
            Ok(serde_json::to_value(&page)?)
        };
        match run() {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Dependency subgraph around a node: BFS over in/out/both edges with cycle detection and capped depth.")]
    pub async fn dependencies(
        &self,
        Parameters(request): Parameters<DependenciesRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        let run = || -> Result<Value, GenomeError> {
            let direction: Direction = request
                .direction
                .as_deref()
                .unwrap_or("out")
                .parse()?;
            let snapshot = self.snapshot()?;
            let engine = QueryEngine::new(snapshot);
            let view = engine.dependencies(&request.id, direction, request.depth.unwrap_or(2))?;
            Ok(serde_json::to_value(&view)?)
        };
        match run() {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Counts, language distribution, and averages for the current genome.")]
    pub async fn stats(&self) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        match self.snapshot() {
            Ok(snapshot) => Ok(ok_json(&Self::stats_value(&snapshot))),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Export the genome as json, graphml, dot, csv, cypher, or plantuml. Projections other than json are lossy.")]
    pub async fn export(
        &self,
        Parameters(request): Parameters<ExportRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        let run = || -> Result<Value, GenomeError> {
            let format: ExportFormat = request.format.parse()?;
            let snapshot = self.snapshot()?;
            let output = match &request.output_path {
                Some(path) => {
                    let path = PathBuf::from(path);
                    if path.is_absolute() {
                        path
                    } else {
                        self.state.root.join(path)
                    }
                }
                None => self
                    .state
                    .root
                    .join(format!("repogenome.{}", request.format.to_ascii_lowercase())),
            };
            let (paths, bytes) = genome_export::export(&snapshot, format, &output)?;
            Ok(json!({
                "paths": paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                "bytes": bytes,
            }))
        };
        match run() {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Pre-edit impact simulation: risk, affected flows and contracts, and whether approval is required. Records the check for the session contract.")]
    pub async fn impact(
        &self,
        Parameters(request): Parameters<ImpactRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Impact) {
            return Ok(fail(&err));
        }
        let run = || -> Result<Value, GenomeError> {
            let snapshot = self.snapshot()?;
            let operation = request.operation.as_deref().unwrap_or("modify");
            let report = analyze_impact(&snapshot, &request.affected_nodes, operation);
            if let Ok(mut contract) = self.state.contract.lock() {
                contract.record_impact(ImpactRecord {
                    nodes: request.affected_nodes.clone(),
                    operation: operation.to_string(),
                    risk: report.risk,
                });
            }
            Ok(serde_json::to_value(&report)?)
        };
        match run() {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Post-edit synchronization: re-scan incrementally and record the reason. Required after impact-checked edits.")]
    pub async fn update(
        &self,
        Parameters(request): Parameters<UpdateRequest>,
    ) -> Result<CallToolResult, McpError> {
        {
            let contract = self
                .state
                .contract
                .lock()
                .map_err(|_| McpError::internal_error("contract state poisoned", None))?;
            if let Err(err) = contract.check_update() {
                return Ok(fail(&err));
            }
        }

        match self.run_scan(Some("full"), true).await {
            Ok(mut value) => {
                if let Ok(mut contract) = self.state.contract.lock() {
                    contract.mark_updated();
                }
                if let Some(object) = value.as_object_mut() {
                    object.insert("reason".to_string(), Value::String(request.reason));
                    let diff = self
                        .state
                        .store
                        .snapshot()
                        .and_then(|genome| serde_json::to_value(&genome.diff).ok())
                        .unwrap_or(Value::Null);
                    object.insert("diff".to_string(), diff);
                }
                Ok(ok_json(&value))
            }
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Validate the genome: invariants, artifact freshness against the working tree, and the session contract state.")]
    pub async fn validate(&self) -> Result<CallToolResult, McpError> {
        let run = async {
            let snapshot = self.snapshot()?;

            let root = self.state.root.clone();
            let exclude = self.state.base_config.exclude.clone();
            let current_hash = tokio::task::spawn_blocking(move || -> Result<String, GenomeError> {
                let fs = WalkSource::new(&root, exclude);
                let mut table = BTreeMap::new();
                for path in fs.enumerate()? {
                    let bytes = fs.read(&path).unwrap_or_default();
                    table.insert(path.clone(), file_fingerprint(&path, &bytes));
                }
                Ok(repo_hash(&table))
            })
            .await
            .map_err(|e| GenomeError::Analysis {
                message: format!("validation task panicked: {e}"),
                diagnostics: vec![],
            })??;

            let violations = genome_core::validate(&snapshot);
            let stale = current_hash != snapshot.metadata.repo_hash;
            let ok = violations.is_empty() && !stale;

            let contract_status = {
                let mut contract = self
                    .state
                    .contract
                    .lock()
                    .map_err(|_| GenomeError::InvalidInput("contract state poisoned".into()))?;
                contract.set_validation(ok);
                contract.status()
            };

            Ok::<Value, GenomeError>(json!({
                "ok": ok,
                "stale": stale,
                "violations": violations,
                "contract": contract_status,
                "hint": (!ok).then_some("run `scan incremental=true` to refresh the genome"),
            }))
        };
        match run.await {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Goal-driven context assembly under a token budget: seeded, graph-expanded, folded, and greedily packed. Returns items plus a skeleton.")]
    pub async fn build_context(
        &self,
        Parameters(request): Parameters<BuildContextRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        let run = || -> Result<Value, GenomeError> {
            let snapshot = self.snapshot()?;
            let context_request = ContextRequest {
                goal: request.goal.clone(),
                budget_tokens: request.budget_tokens.unwrap_or(DEFAULT_CONTEXT_BUDGET),
                must_include: request.must_include.clone().unwrap_or_default(),
                exclude: request.exclude.clone().unwrap_or_default(),
                session_id: request.session_id.clone(),
            };
            let session = request
                .session_id
                .as_deref()
                .and_then(|id| self.state.sessions.get(id));
            let assembler = ContextAssembler::new(&snapshot);
            let context = assembler.build(&context_request, session.as_ref())?;
            self.state.contexts.record(&context);
            Ok(serde_json::to_value(&context)?)
        };
        match run() {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Decision trace for a previously built context: seeds, expansion, folding, packing, and drops.")]
    pub async fn explain_context(
        &self,
        Parameters(request): Parameters<ContextIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        match self.state.contexts.explain(&request.context_id) {
            Some(trace) => Ok(ok_json(&trace)),
            None => Ok(fail(&GenomeError::NotFound(format!(
                "context '{}'",
                request.context_id
            )))),
        }
    }

    #[tool(description = "Skeleton-only context build: entry points, top concepts, folded clusters. Fast first response.")]
    pub async fn get_context_skeleton(
        &self,
        Parameters(request): Parameters<BuildContextRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        let run = || -> Result<Value, GenomeError> {
            let snapshot = self.snapshot()?;
            let context_request = ContextRequest {
                goal: request.goal.clone(),
                budget_tokens: request.budget_tokens.unwrap_or(DEFAULT_CONTEXT_BUDGET),
                must_include: request.must_include.clone().unwrap_or_default(),
                exclude: request.exclude.clone().unwrap_or_default(),
                session_id: request.session_id.clone(),
            };
            let assembler = ContextAssembler::new(&snapshot);
            Ok(serde_json::to_value(assembler.skeleton(&context_request)?)?)
        };
        match run() {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Hit/miss counters for a context: how often later query results landed inside its selection.")]
    pub async fn get_context_feedback(
        &self,
        Parameters(request): Parameters<ContextIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        match self.state.contexts.feedback(&request.context_id) {
            Some(feedback) => Ok(ok_json(&feedback)),
            None => Ok(fail(&GenomeError::NotFound(format!(
                "context '{}'",
                request.context_id
            )))),
        }
    }

    #[tool(description = "Store client session memory (facts, pinned node ids) consulted by later build_context calls.")]
    pub async fn set_context_session(
        &self,
        Parameters(request): Parameters<SetSessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Writer) {
            return Ok(fail(&err));
        }
        let state: genome_context::SessionState = match serde_json::from_value(request.state) {
            Ok(state) => state,
            Err(err) => {
                return Ok(fail(&GenomeError::InvalidInput(format!(
                    "malformed session state: {err}"
                ))))
            }
        };
        self.state.sessions.set(&request.session_id, state);
        Ok(ok_json(&json!({ "ok": true })))
    }

    #[tool(description = "Field-by-field and relationship diff between two nodes, optionally across prior genome versions.")]
    pub async fn compare(
        &self,
        Parameters(request): Parameters<CompareRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        let run = || -> Result<Value, GenomeError> {
            let snapshot = self.snapshot()?;
            let engine = QueryEngine::new(snapshot);
            let a_prior = request
                .a_genome_path
                .as_deref()
                .map(|path| load_genome(std::path::Path::new(path)).map(|(g, _)| g))
                .transpose()?;
            let b_prior = request
                .b_genome_path
                .as_deref()
                .map(|path| load_genome(std::path::Path::new(path)).map(|(g, _)| g))
                .transpose()?;
            let result = engine.compare(
                &request.a,
                a_prior.as_ref(),
                &request.b,
                b_prior.as_ref(),
            )?;
            Ok(serde_json::to_value(&result)?)
        };
        match run() {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }

    #[tool(description = "Shortest path between two nodes over an edge-type whitelist; fails with not-reachable when none exists within max_len.")]
    pub async fn find_path(
        &self,
        Parameters(request): Parameters<FindPathRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(err) = self.gate(ToolClass::Reader) {
            return Ok(fail(&err));
        }
        let run = || -> Result<Value, GenomeError> {
            let edge_types = parse_edge_types(request.edge_types.as_deref())?;
            let snapshot = self.snapshot()?;
            let engine = QueryEngine::new(snapshot);
            let path = engine.find_path(
                &request.from,
                &request.to,
                request.max_len.unwrap_or(6),
                edge_types.as_deref(),
            )?;
            Ok(json!({ "path": path, "length": path.len().saturating_sub(1) }))
        };
        match run() {
            Ok(value) => Ok(ok_json(&value)),
            Err(err) => Ok(fail(&err)),
        }
    }
}

fn regex_escape_glob(pattern: &str) -> String {
    // File patterns are substrings with optional '*' wildcards.
    let mut out = String::from("(?i)");
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            c if "\\.+?()[]{}|^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// Resources
// ============================================================================

const RESOURCE_URIS: &[(&str, &str, &str)] = &[
    ("genome://current", "Current Genome", "Full, up-to-date repository genome"),
    ("genome://current/brief", "Current Genome (lite)", "Lite encoding: required fields only"),
    ("genome://current/detailed", "Current Genome (detailed)", "Standard encoding plus derived metrics"),
    ("genome://summary", "Summary", "Agent boot section: entry points, hotspots, domains"),
    ("genome://diff", "Diff", "Delta since the last persisted genome"),
    ("genome://stats", "Statistics", "Counts, language distribution, averages"),
];

struct ResourceQuery {
    path: String,
    fields: Option<Vec<String>>,
    mode: Option<String>,
}

fn parse_resource_uri(uri: &str) -> ResourceQuery {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    };
    let param = |name: &str| -> Option<String> {
        query.and_then(|query| {
            query.split('&').find_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                (key == name).then(|| value.to_string())
            })
        })
    };
    let fields = param("fields").map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    });
    ResourceQuery {
        path: path.trim_end_matches('/').to_string(),
        fields,
        mode: param("mode"),
    }
}

impl GenomeService {
    /// Resolve a resource URI to its JSON value. Reading `current` (any
    /// variant) or `summary` satisfies the contract's load requirement.
    pub fn read_resource_value(&self, uri: &str) -> Result<Value, GenomeError> {
        let query = parse_resource_uri(uri);

        if let Some(id) = query.path.strip_prefix("genome://nodes/") {
            let snapshot = self.snapshot()?;
            let engine = QueryEngine::new(snapshot);
            let view = engine.get_node(id, 1, true, None, query.fields.as_deref())?;
            return Ok(serde_json::to_value(view)?);
        }

        let value = match query.path.as_str() {
            "genome://current" => {
                let snapshot = self.snapshot()?;
                self.mark_loaded();
                to_mode_value(&snapshot, CompactionMode::Standard)?
            }
            "genome://current/brief" => {
                let snapshot = self.snapshot()?;
                self.mark_loaded();
                to_mode_value(&snapshot, CompactionMode::Lite)?
            }
            "genome://current/detailed" => {
                let snapshot = self.snapshot()?;
                self.mark_loaded();
                let mut value = to_mode_value(&snapshot, CompactionMode::Standard)?;
                if let Some(object) = value.as_object_mut() {
                    object.insert("_metrics".to_string(), Self::stats_value(&snapshot));
                }
                value
            }
            "genome://summary" => {
                let snapshot = self.snapshot()?;
                self.mark_loaded();
                match query.mode.as_deref() {
                    Some("brief") => json!({
                        "entry_points": snapshot.summary.entry_points,
                        "core_domains": snapshot.summary.core_domains,
                    }),
                    Some("detailed") => {
                        let mut value = serde_json::to_value(&snapshot.summary)?;
                        if let Some(object) = value.as_object_mut() {
                            object.insert("_metrics".to_string(), Self::stats_value(&snapshot));
                        }
                        value
                    }
                    _ => serde_json::to_value(&snapshot.summary)?,
                }
            }
            "genome://diff" => {
                let snapshot = self.snapshot()?;
                match &snapshot.diff {
                    Some(diff) => serde_json::to_value(diff)?,
                    None => {
                        return Err(GenomeError::NotFound(
                            "no diff recorded; diffs appear after incremental updates".into(),
                        ))
                    }
                }
            }
            "genome://stats" => {
                let snapshot = self.snapshot()?;
                Self::stats_value(&snapshot)
            }
            other => {
                return Err(GenomeError::NotFound(format!("resource '{other}'")));
            }
        };

        Ok(match query.fields {
            Some(fields) => genome_core::project_fields(&value, &fields),
            None => value,
        })
    }

    fn mark_loaded(&self) {
        if let Ok(mut contract) = self.state.contract.lock() {
            contract.mark_loaded();
        }
    }
}

#[tool_handler]
impl ServerHandler for GenomeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Repo Genome serves a typed graph of this repository. Load genome://current \
                 (or genome://summary) first, run `scan` to build or refresh it, `impact` \
                 before edits, and `update` after them. Query tools: query, search, get_node, \
                 dependencies, find_path, compare; context tools: build_context and friends."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = RESOURCE_URIS
            .iter()
            .map(|(uri, name, description)| {
                let mut raw = RawResource::new(*uri, name.to_string());
                raw.description = Some(description.to_string());
                raw.mime_type = Some("application/json".to_string());
                raw.no_annotation()
            })
            .collect();
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match self.read_resource_value(&uri) {
            Ok(value) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(
                    serde_json::to_string_pretty(&value).unwrap_or_default(),
                    uri,
                )],
            }),
            Err(err) => {
                let envelope = ErrorEnvelope::from(&err);
                let data = serde_json::to_value(&envelope).ok();
                Err(McpError::resource_not_found(envelope.message, data))
            }
        }
    }
}
