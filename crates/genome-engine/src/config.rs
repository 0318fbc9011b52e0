use std::time::Instant;

/// Per-subsystem enable switches. Disabling a subsystem omits its genome
/// section; the remaining invariants still hold.
#[derive(Debug, Clone, Copy)]
pub struct SubsystemToggles {
    pub flows: bool,
    pub concepts: bool,
    pub history: bool,
    pub contracts: bool,
    pub tests: bool,
}

impl Default for SubsystemToggles {
    fn default() -> Self {
        Self {
            flows: true,
            concepts: true,
            history: true,
            contracts: true,
            tests: true,
        }
    }
}

impl SubsystemToggles {
    /// Structure only: the base graph without any auxiliary section.
    pub fn structure_only() -> Self {
        Self {
            flows: false,
            concepts: false,
            history: false,
            contracts: false,
            tests: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Worker pool size for parallel file analysis.
    pub workers: usize,
    pub subsystems: SubsystemToggles,
    /// Extra exclusion globs on top of VCS ignore rules.
    pub exclude: Vec<String>,
    /// Path fragments that mark legacy code for `summary.do_not_touch`.
    pub legacy_patterns: Vec<String>,
    /// Top-k files reported as hotspots.
    pub hotspot_limit: usize,
    pub max_summary_len: usize,
    /// Files above this size are recorded but not content-analyzed.
    pub max_file_bytes: u64,
    /// Cooperative cancellation point, checked at chunk boundaries.
    pub deadline: Option<Instant>,
    /// Persist the artifact gzipped.
    pub gzip: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            subsystems: SubsystemToggles::default(),
            exclude: Vec::new(),
            legacy_patterns: vec![
                "legacy".into(),
                "deprecated".into(),
                "_old".into(),
                "backup".into(),
            ],
            hotspot_limit: 20,
            max_summary_len: 200,
            max_file_bytes: 10 * 1024 * 1024,
            deadline: None,
            gzip: false,
        }
    }
}

impl ScanConfig {
    /// Chunk size balancing scheduling overhead against stragglers.
    pub fn chunk_size(&self, file_count: usize) -> usize {
        std::cmp::max(1, file_count / (4 * self.workers.max(1)))
    }

    pub fn deadline_elapsed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
