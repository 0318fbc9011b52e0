use crate::config::ScanConfig;
use crate::fingerprint::file_fingerprint;
use crate::sources::FilesystemSource;
use genome_analyzers::{
    classify, resolve_import, AnalyzerKind, AnalyzerRegistry, EdgeDecl, ExtractionResult,
    FileKind, Resolution, Severity,
};
use genome_core::{Edge, EdgeType, GenomeError, Node, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Nodes and edges derivable from local per-file analysis, before any
/// auxiliary subsystem runs.
#[derive(Debug, Default)]
pub struct BaseGraph {
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
    /// Node ids flagged as entry points by analyzers (sorted, deduped).
    pub entry_points: Vec<String>,
    /// Formatted `path: message` diagnostics from analyzers.
    pub diagnostics: Vec<String>,
    /// True when at least one diagnostic has error severity.
    pub had_errors: bool,
    pub fingerprints: BTreeMap<String, String>,
}

impl BaseGraph {
    /// Adjacency over `calls` edges with sorted targets; DFS consumers
    /// stay deterministic.
    pub fn call_graph(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for edge in &self.edges {
            if edge.edge_type == EdgeType::Calls {
                graph.entry(&edge.from).or_default().push(&edge.to);
            }
        }
        for targets in graph.values_mut() {
            targets.sort();
            targets.dedup();
        }
        graph
    }
}

struct PerFile {
    path: String,
    language: Option<&'static str>,
    kind: FileKind,
    capability: Option<AnalyzerKind>,
    fingerprint: String,
    extraction: ExtractionResult,
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(8192)].contains(&0)
}

fn analyze_one(
    fs: &dyn FilesystemSource,
    registry: &AnalyzerRegistry,
    path: &str,
    config: &ScanConfig,
) -> PerFile {
    let bytes = match fs.read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            let mut extraction = ExtractionResult::default();
            extraction
                .diagnostics
                .push(genome_analyzers::Diagnostic::error(format!("read failed: {err}")));
            return PerFile {
                path: path.to_string(),
                language: None,
                kind: FileKind::Other,
                capability: None,
                fingerprint: file_fingerprint(path, &[]),
                extraction,
            };
        }
    };

    let fingerprint = file_fingerprint(path, &bytes);
    let oversized = bytes.len() as u64 > config.max_file_bytes;
    let binary = oversized || looks_binary(&bytes);

    let content;
    let first_line;
    if binary {
        content = String::new();
        first_line = None;
    } else {
        content = String::from_utf8_lossy(&bytes).into_owned();
        first_line = content.lines().next().map(str::to_string);
    }

    let classification = classify(std::path::Path::new(path), first_line.as_deref());
    let extraction = if binary {
        ExtractionResult::default()
    } else {
        match registry.resolve(&classification) {
            Some(analyzer) => analyzer.extract(path, &content),
            None => ExtractionResult::default(),
        }
    };

    PerFile {
        path: path.to_string(),
        language: classification.language,
        kind: classification.kind,
        capability: classification.capability,
        fingerprint,
        extraction,
    }
}

/// Strip the final extension for code files; other kinds keep the full
/// path so `config.json.key` style ids stay unambiguous.
fn symbol_stem(path: &str, kind: FileKind) -> &str {
    if kind != FileKind::Code {
        return path;
    }
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(dot) => &path[..name_start + dot],
        None => path,
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// Collapse `.` and `..` segments of a joined relative path.
fn normalize_path(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

fn truncate(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        text
    } else {
        text.chars().take(max).collect()
    }
}

/// Walks the repository, runs analyzers in parallel chunks, and collects
/// the base graph through a single-threaded collector.
#[derive(Clone, Default)]
pub struct RepoSpider {
    registry: AnalyzerRegistry,
}

impl RepoSpider {
    pub fn new(registry: AnalyzerRegistry) -> Self {
        Self { registry }
    }

    /// Analyze every included file.
    pub async fn crawl(
        &self,
        fs: Arc<dyn FilesystemSource>,
        config: &ScanConfig,
    ) -> Result<BaseGraph> {
        let files = fs.enumerate()?;
        self.crawl_files(fs, config, files.clone(), files).await
    }

    /// Analyze only `subset`, resolving imports against `all_files`. This
    /// is the bounded re-analysis entry point used by incremental updates.
    pub async fn crawl_files(
        &self,
        fs: Arc<dyn FilesystemSource>,
        config: &ScanConfig,
        mut subset: Vec<String>,
        all_files: Vec<String>,
    ) -> Result<BaseGraph> {
        subset.sort();
        subset.dedup();

        let chunk_size = config.chunk_size(subset.len());
        let mut handles = Vec::new();
        for chunk in subset.chunks(chunk_size) {
            if config.deadline_elapsed() {
                return Err(GenomeError::Timeout);
            }
            let fs = Arc::clone(&fs);
            let registry = self.registry.clone();
            let chunk: Vec<String> = chunk.to_vec();
            let config = config.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                chunk
                    .iter()
                    .map(|path| analyze_one(fs.as_ref(), &registry, path, &config))
                    .collect::<Vec<_>>()
            }));
        }

        let mut analyzed = Vec::with_capacity(subset.len());
        for handle in handles {
            if config.deadline_elapsed() {
                return Err(GenomeError::Timeout);
            }
            let batch = handle
                .await
                .map_err(|e| GenomeError::Analysis {
                    message: format!("analysis task panicked: {e}"),
                    diagnostics: vec![],
                })?;
            analyzed.extend(batch);
        }

        let file_set: HashSet<String> = all_files.into_iter().collect();
        let graph = collect(analyzed, &file_set, config);
        log::info!(
            "analyzed {} files: {} nodes, {} edges",
            subset.len(),
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }
}

/// Single collector turning per-file results into the base graph. All
/// writes happen here, serialized.
fn collect(mut analyzed: Vec<PerFile>, file_set: &HashSet<String>, config: &ScanConfig) -> BaseGraph {
    analyzed.sort_by(|a, b| a.path.cmp(&b.path));

    let mut graph = BaseGraph::default();
    let mut entry_points: Vec<String> = Vec::new();
    // (file, caller symbol name, callee) awaiting the full node map.
    let mut pending_calls: Vec<(usize, Option<String>, String)> = Vec::new();
    // Per file: import source -> resolved repo file.
    let mut import_maps: Vec<Vec<(String, String)>> = Vec::new();

    for (index, file) in analyzed.iter().enumerate() {
        let path = &file.path;
        let stem = symbol_stem(path, file.kind);
        graph.fingerprints.insert(path.clone(), file.fingerprint.clone());

        let mut file_node = Node::file_node(path, file.language.map(str::to_string));
        if let Some(summary) = &file.extraction.file_summary {
            file_node.summary = Some(truncate(summary.clone(), config.max_summary_len));
        }
        graph.nodes.insert(path.clone(), file_node);

        for diagnostic in &file.extraction.diagnostics {
            if diagnostic.severity == Severity::Error {
                graph.had_errors = true;
            }
            graph.diagnostics.push(format!("{path}: {}", diagnostic.message));
        }

        if file.extraction.file_is_entry {
            entry_points.push(path.clone());
        }

        // Symbols: first declaration wins on name collisions (source order).
        let mut seen_names: HashSet<&str> = HashSet::new();
        for decl in &file.extraction.nodes {
            if decl.name.is_empty() || !seen_names.insert(&decl.name) {
                continue;
            }
            let id = format!("{stem}.{}", decl.name);
            graph.nodes.insert(
                id.clone(),
                Node {
                    node_type: decl.node_type,
                    file: Some(path.clone()),
                    language: file.language.map(str::to_string),
                    visibility: decl.visibility,
                    summary: decl
                        .summary
                        .clone()
                        .map(|s| truncate(s, config.max_summary_len)),
                    criticality: 0.0,
                },
            );
            graph.edges.push(Edge::new(path.clone(), id.clone(), EdgeType::Defines));
            if decl.entry_point {
                entry_points.push(id);
            }
        }

        let mut imports: Vec<(String, String)> = Vec::new();
        for edge_decl in &file.extraction.edges {
            match edge_decl {
                EdgeDecl::Import { source } => {
                    let kind = file.capability.unwrap_or(AnalyzerKind::Python);
                    match resolve_import(file_set, path, source, kind) {
                        Resolution::File(target) => {
                            if &target != path {
                                graph
                                    .edges
                                    .push(Edge::new(path.clone(), target.clone(), EdgeType::Imports));
                                imports.push((source.clone(), target));
                            }
                        }
                        Resolution::External(key) => {
                            let id = format!("ext:{key}");
                            graph
                                .nodes
                                .entry(id.clone())
                                .or_insert_with(Node::external_module);
                            graph.edges.push(Edge::new(path.clone(), id, EdgeType::Imports));
                        }
                    }
                }
                EdgeDecl::Reference { target } => {
                    let joined = normalize_path(&format!("{}/{target}", parent_dir(path)));
                    let resolved = if file_set.contains(target.as_str()) {
                        Some(target.clone())
                    } else if file_set.contains(joined.as_str()) {
                        Some(joined)
                    } else {
                        None
                    };
                    if let Some(resolved) = resolved {
                        if &resolved != path {
                            graph
                                .edges
                                .push(Edge::new(path.clone(), resolved, EdgeType::References));
                        }
                    }
                }
                EdgeDecl::Call { caller, callee } => {
                    pending_calls.push((index, caller.clone(), callee.clone()));
                }
            }
        }
        import_maps.push(imports);
    }

    // Second pass: calls resolve against the complete node map.
    for (index, caller, callee) in pending_calls {
        let file = &analyzed[index];
        let stem = symbol_stem(&file.path, file.kind);
        let imports = &import_maps[index];

        let from = caller
            .map(|name| format!("{stem}.{name}"))
            .filter(|id| graph.nodes.contains_key(id))
            .unwrap_or_else(|| file.path.clone());

        let target = resolve_callee(&callee, stem, imports, &graph.nodes);
        if let Some(to) = target {
            if to != from {
                graph.edges.push(Edge::new(from, to, EdgeType::Calls));
            }
        }
    }

    graph.edges.sort();
    graph.edges.dedup();

    entry_points.sort();
    entry_points.dedup();
    graph.entry_points = entry_points;

    graph
}

fn resolve_callee(
    callee: &str,
    stem: &str,
    imports: &[(String, String)],
    nodes: &BTreeMap<String, Node>,
) -> Option<String> {
    // Module-qualified attribute call: `b.greet()` where `b` was imported.
    if let Some((head, rest)) = callee.split_once('.') {
        for (source, target_file) in imports {
            let top = source.split('.').next().unwrap_or(source);
            if top == head {
                let target_stem = symbol_stem(target_file, FileKind::Code);
                let candidate = format!("{target_stem}.{rest}");
                if nodes.contains_key(&candidate) {
                    return Some(candidate);
                }
            }
        }
    }

    // Rust paths: resolve the trailing segment within the same file.
    let simple = callee.rsplit("::").next().unwrap_or(callee);
    let simple = simple.rsplit('.').next().unwrap_or(simple);

    let local = format!("{stem}.{simple}");
    if nodes.contains_key(&local) {
        return Some(local);
    }

    // Bare name imported via `from x import f` style: probe imported files.
    for (_, target_file) in imports {
        let target_stem = symbol_stem(target_file, FileKind::Code);
        let candidate = format!("{target_stem}.{simple}");
        if nodes.contains_key(&candidate) {
            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_stem_strips_code_extensions_only() {
        assert_eq!(symbol_stem("src/main.py", FileKind::Code), "src/main");
        assert_eq!(symbol_stem("a.tar.py", FileKind::Code), "a.tar");
        assert_eq!(symbol_stem("config.json", FileKind::Config), "config.json");
        assert_eq!(symbol_stem("Makefile", FileKind::Code), "Makefile");
    }

    #[test]
    fn normalize_path_collapses_dots() {
        assert_eq!(normalize_path("docs/../README.md"), "README.md");
        assert_eq!(normalize_path("./a/b/../c.md"), "a/c.md");
    }
}
