use genome_core::{load_genome, save_genome, CompactionMode, Genome, GenomeError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub const ARTIFACT_NAME: &str = "repogenome.json";

/// Snapshot-swap store for the current genome.
///
/// Readers clone an `Arc` snapshot and keep seeing their version until
/// they drop it; writers serialize through `writer_lock` and publish with
/// an atomic swap that bumps the generation counter. The generation feeds
/// the query cache keys, making invalidation O(1).
pub struct GenomeStore {
    artifact: PathBuf,
    gzip: bool,
    current: RwLock<Option<Arc<Genome>>>,
    generation: AtomicU64,
    writer: tokio::sync::Mutex<()>,
}

impl GenomeStore {
    pub fn new(root: &Path, gzip: bool) -> Self {
        let artifact = if gzip {
            root.join(format!("{ARTIFACT_NAME}.gz"))
        } else {
            root.join(ARTIFACT_NAME)
        };
        Self {
            artifact,
            gzip,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Immutable snapshot of the current genome, if any.
    pub fn snapshot(&self) -> Option<Arc<Genome>> {
        self.current.read().ok()?.clone()
    }

    /// Snapshot, falling back to the persisted artifact on cold start.
    pub fn snapshot_or_load(&self) -> Result<Arc<Genome>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }
        if !self.artifact.exists() {
            return Err(GenomeError::NotFound(format!(
                "no genome at {} (run `scan` first)",
                self.artifact.display()
            )));
        }
        let (genome, _) = load_genome(&self.artifact)?;
        let snapshot = Arc::new(genome);
        if let Ok(mut current) = self.current.write() {
            if current.is_none() {
                *current = Some(Arc::clone(&snapshot));
                self.generation.fetch_add(1, Ordering::AcqRel);
            }
        }
        Ok(snapshot)
    }

    /// Exclusive writer gate. Hold the guard across detect/analyze/merge
    /// so writer operations are totally ordered.
    pub async fn writer_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Persist and publish a new genome; returns the new generation.
    pub fn install(&self, genome: Genome) -> Result<u64> {
        save_genome(&genome, &self.artifact, CompactionMode::Standard, self.gzip)?;
        let snapshot = Arc::new(genome);
        if let Ok(mut current) = self.current.write() {
            *current = Some(snapshot);
        }
        Ok(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }
}
