//! # Genome Core
//!
//! The Genome is the single persisted artifact of the engine: a versioned,
//! typed graph of a repository fused from structural, behavioral, temporal
//! and semantic analysis.
//!
//! ```text
//! Genome
//!   ├─ metadata   generation info, repo hash, fingerprint table
//!   ├─ summary    agent boot section (entry points, hotspots, ...)
//!   ├─ nodes      id -> typed entity (file/function/class/...)
//!   ├─ edges      directed typed relations, unique on (from, to, type)
//!   ├─ flows      advisory execution paths with side-effect tags
//!   ├─ concepts   domain groupings over existing nodes
//!   ├─ history    per-file churn and change notes
//!   ├─ risk       per-node bounded risk assessments
//!   └─ contracts  public API surface with breaking-change risk
//! ```
//!
//! This crate owns the schema, the three serialization modes
//! (standard / compact / lite, optionally gzipped), the invariant
//! validator, and atomic delta application. It performs no analysis.

mod codec;
mod delta;
mod error;
mod fields;
mod schema;
mod validate;

pub use codec::{detect_mode, load_genome, load_genome_bytes, save_genome, to_mode_value, CompactionMode};
pub use delta::{apply_delta, diff_genomes, GenomeDelta, SectionPatches};
pub use error::{ErrorEnvelope, GenomeError, Result};
pub use fields::{expand_field, project_fields, FIELD_ALIASES};
pub use schema::{
    is_virtual_id, Concept, ContractEntry, Edge, EdgeType, Flow, Genome, GenomeDiff,
    HistoryEntry, Metadata, Node, NodeType, RiskEntry, SideEffect, Summary, TestsSummary,
    Visibility, ENGINE_VERSION, SCHEMA_VERSION,
};
pub use validate::{validate, Violation};
