use crate::config::ScanConfig;
use crate::fingerprint::{file_fingerprint, repo_hash};
use crate::incremental::{
    affected_files, detect_changes, structural_delta, subsystem_mask,
};
use crate::merger::{merge, MergeInputs};
use crate::sources::{Clock, FilesystemSource, GitHistory, HistorySource, SystemClock, WalkSource};
use crate::spider::{BaseGraph, RepoSpider};
use crate::stats::ScanStats;
use crate::subsystems::{ChronoMap, ContractLens, FlowWeaver, IntentAtlas, TestGalaxy};
use genome_analyzers::AnalyzerRegistry;
use genome_core::{
    apply_delta, diff_genomes, Genome, GenomeError, Metadata, Result, ENGINE_VERSION,
    SCHEMA_VERSION,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Coordinates full scans and incremental updates over the capability
/// interfaces. The generator never mutates an existing genome in place;
/// callers swap the returned value in atomically.
pub struct GenomeGenerator {
    fs: Arc<dyn FilesystemSource>,
    history: Arc<dyn HistorySource>,
    clock: Arc<dyn Clock>,
    spider: RepoSpider,
    config: ScanConfig,
}

impl GenomeGenerator {
    /// Production wiring: ignore-aware walk, git history, system clock.
    pub fn new(root: impl AsRef<Path>, config: ScanConfig) -> Self {
        let root = root.as_ref();
        Self::with_sources(
            Arc::new(WalkSource::new(root, config.exclude.clone())),
            Arc::new(GitHistory::new(root)),
            Arc::new(SystemClock),
            AnalyzerRegistry::new(),
            config,
        )
    }

    pub fn with_sources(
        fs: Arc<dyn FilesystemSource>,
        history: Arc<dyn HistorySource>,
        clock: Arc<dyn Clock>,
        registry: AnalyzerRegistry,
        config: ScanConfig,
    ) -> Self {
        Self {
            fs,
            history,
            clock,
            spider: RepoSpider::new(registry),
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn metadata(&self, fingerprints: &BTreeMap<String, String>) -> Metadata {
        Metadata {
            generated_at: self.clock.now_rfc3339(),
            repo_hash: repo_hash(fingerprints),
            languages: Vec::new(),
            frameworks: detect_frameworks(self.fs.as_ref()),
            engine_version: ENGINE_VERSION.to_string(),
            schema_version: SCHEMA_VERSION,
            mode: None,
            fingerprints: BTreeMap::new(),
            partial: false,
        }
    }

    fn run_subsystems(&self, base: &BaseGraph) -> MergeInputs {
        let toggles = &self.config.subsystems;
        MergeInputs {
            flows: toggles
                .flows
                .then(|| FlowWeaver::weave(base, self.fs.as_ref())),
            concepts: toggles.concepts.then(|| IntentAtlas::chart(base)),
            history: toggles.history.then(|| {
                ChronoMap::survey(base, self.history.as_ref(), self.config.hotspot_limit)
            }),
            contracts: toggles.contracts.then(|| ContractLens::inspect(base)),
            tests: toggles.tests.then(|| TestGalaxy::link(base)),
        }
    }

    /// Full scan: classify and analyze every included file, run the
    /// enabled subsystems, and merge.
    pub async fn full_scan(&self) -> Result<(Genome, ScanStats)> {
        let started = Instant::now();
        let base = self.spider.crawl(Arc::clone(&self.fs), &self.config).await?;

        let metadata = self.metadata(&base.fingerprints);
        let mut stats = ScanStats {
            files: base.fingerprints.len(),
            errors: base.diagnostics.clone(),
            ..Default::default()
        };

        let inputs = self.run_subsystems(&base);
        let genome = merge(base, inputs, metadata, &self.config)?;

        finish_stats(&mut stats, &genome, started);
        Ok((genome, stats))
    }

    /// Incremental update: detect changes by fingerprint, re-analyze the
    /// affected subset, and rebuild only the masked subsystem sections.
    /// Fails without touching `old`.
    pub async fn incremental(&self, old: &Genome) -> Result<(Genome, ScanStats)> {
        let started = Instant::now();
        let current_files = self.fs.enumerate()?;

        let fingerprints = {
            let fs = Arc::clone(&self.fs);
            let files = current_files.clone();
            tokio::task::spawn_blocking(move || {
                let mut table = BTreeMap::new();
                for path in files {
                    let bytes = fs.read(&path).unwrap_or_default();
                    table.insert(path.clone(), file_fingerprint(&path, &bytes));
                }
                table
            })
            .await
            .map_err(|e| GenomeError::Analysis {
                message: format!("fingerprint task panicked: {e}"),
                diagnostics: vec![],
            })?
        };

        let changes = detect_changes(&old.metadata.fingerprints, &fingerprints);
        log::info!(
            "change detection: {} added, {} modified, {} removed",
            changes.added.len(),
            changes.modified.len(),
            changes.removed.len()
        );
        if changes.is_empty() {
            let mut unchanged = old.clone();
            unchanged.metadata.generated_at = self.clock.now_rfc3339();
            let mut stats = ScanStats::from_genome(&unchanged);
            stats.files = 0;
            stats.time_ms = started.elapsed().as_millis() as u64;
            return Ok((unchanged, stats));
        }

        let affected = affected_files(&changes, old, &current_files);
        let subset = self
            .spider
            .crawl_files(
                Arc::clone(&self.fs),
                &self.config,
                affected.clone(),
                current_files.clone(),
            )
            .await?;

        let mut stale: BTreeSet<String> = affected.iter().cloned().collect();
        stale.extend(changes.removed.iter().cloned());

        let delta = structural_delta(old, &stale, &subset.nodes, &subset.edges);
        let intermediate = apply_delta(old, &delta)?;

        // Entry points: carry those owned by untouched files, add fresh.
        let mut entry_points: Vec<String> = old
            .summary
            .entry_points
            .iter()
            .filter(|id| {
                intermediate.nodes.get(*id).is_some_and(|node| {
                    node.file
                        .as_deref()
                        .is_some_and(|file| !stale.contains(file))
                })
            })
            .cloned()
            .collect();
        entry_points.extend(subset.entry_points.iter().cloned());
        entry_points.sort();
        entry_points.dedup();

        let merged_base = BaseGraph {
            nodes: intermediate.nodes.clone(),
            edges: intermediate.edges.clone(),
            entry_points,
            diagnostics: subset.diagnostics.clone(),
            had_errors: subset.had_errors,
            fingerprints: fingerprints.clone(),
        };

        let mask = subsystem_mask(&changes, &self.config.subsystems);
        let toggles = &self.config.subsystems;
        let inputs = MergeInputs {
            flows: toggles.flows.then(|| {
                if mask.flows {
                    FlowWeaver::weave(&merged_base, self.fs.as_ref())
                } else {
                    intermediate.flows.clone()
                }
            }),
            concepts: toggles.concepts.then(|| {
                if mask.concepts {
                    IntentAtlas::chart(&merged_base)
                } else {
                    (
                        intermediate.concepts.clone(),
                        old.summary.core_domains.clone(),
                    )
                }
            }),
            history: toggles.history.then(|| {
                if mask.history {
                    ChronoMap::survey(&merged_base, self.history.as_ref(), self.config.hotspot_limit)
                } else {
                    (
                        intermediate.history.clone(),
                        old.summary
                            .hotspots
                            .iter()
                            .filter(|id| intermediate.nodes.contains_key(*id))
                            .cloned()
                            .collect(),
                    )
                }
            }),
            contracts: toggles.contracts.then(|| {
                if mask.contracts {
                    ContractLens::inspect(&merged_base)
                } else {
                    intermediate.contracts.clone()
                }
            }),
            tests: toggles.tests.then(|| {
                if mask.tests {
                    TestGalaxy::link(&merged_base)
                } else {
                    (
                        Vec::new(),
                        intermediate.tests.clone().unwrap_or_default(),
                        BTreeSet::new(),
                    )
                }
            }),
        };

        let metadata = self.metadata(&fingerprints);
        let mut stats = ScanStats {
            files: affected.len(),
            errors: subset.diagnostics.clone(),
            ..Default::default()
        };

        let mut genome = merge(merged_base, inputs, metadata, &self.config)?;
        genome.diff = Some(diff_genomes(old, &genome));

        finish_stats(&mut stats, &genome, started);
        Ok((genome, stats))
    }
}

fn finish_stats(stats: &mut ScanStats, genome: &Genome, started: Instant) {
    stats.nodes = genome.nodes.len();
    stats.edges = genome.edges.len();
    stats.flows = genome.flows.len();
    stats.concepts = genome.concepts.len();
    stats.time_ms = started.elapsed().as_millis() as u64;
    for (id, node) in &genome.nodes {
        if node.file.as_deref() == Some(id.as_str()) {
            if let Some(language) = node.language.clone() {
                *stats.languages.entry(language).or_insert(0) += 1;
            }
        }
    }
}

/// Framework probes over dependency manifests, mirroring the language
/// detection: cheap, best-effort, never fatal.
fn detect_frameworks(fs: &dyn FilesystemSource) -> Vec<String> {
    let mut frameworks = BTreeSet::new();

    let text = |rel: &str| -> Option<String> {
        fs.read(rel)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).to_ascii_lowercase())
    };

    for manifest in ["requirements.txt", "pyproject.toml"] {
        if let Some(content) = text(manifest) {
            for (needle, name) in [
                ("fastapi", "FastAPI"),
                ("uvicorn", "FastAPI"),
                ("flask", "Flask"),
                ("django", "Django"),
            ] {
                if content.contains(needle) {
                    frameworks.insert(name.to_string());
                }
            }
        }
    }
    if let Some(content) = text("package.json") {
        for (needle, name) in [
            ("\"react\"", "React"),
            ("\"next\"", "Next.js"),
            ("\"express\"", "Express"),
            ("\"vue\"", "Vue"),
            ("\"@angular/core\"", "Angular"),
        ] {
            if content.contains(needle) {
                frameworks.insert(name.to_string());
            }
        }
    }
    if let Some(content) = text("Cargo.toml") {
        for (needle, name) in [("axum", "Axum"), ("actix-web", "Actix"), ("tokio", "Tokio")] {
            if content.contains(needle) {
                frameworks.insert(name.to_string());
            }
        }
    }

    frameworks.into_iter().collect()
}
