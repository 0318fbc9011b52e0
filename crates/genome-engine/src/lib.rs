//! # Genome Engine
//!
//! Orchestrates the scan pipeline that turns a repository into a Genome:
//!
//! ```text
//! repository root
//!     │
//!     ├──> RepoSpider            parallel per-file analysis -> base graph
//!     │
//!     ├──> Subsystems            (disjoint genome sections)
//!     │      ├─ FlowWeaver       entry-point flows + side effects
//!     │      ├─ IntentAtlas      domain concepts + core domains
//!     │      ├─ ChronoMap        churn history + hotspots
//!     │      ├─ ContractLens     public API contracts
//!     │      └─ TestGalaxy       test-to-code edges
//!     │
//!     ├──> Merger                union + compaction + validation
//!     │
//!     └──> Incremental           fingerprint diff -> bounded re-analysis
//! ```
//!
//! The engine consumes capability interfaces (`FilesystemSource`,
//! `HistorySource`, `Clock`) so version-control introspection and the
//! filesystem stay pluggable.

mod config;
mod fingerprint;
mod generator;
mod incremental;
mod merger;
mod sources;
mod spider;
mod stats;
mod subsystems;
mod summary;

pub use config::{ScanConfig, SubsystemToggles};
pub use fingerprint::{file_fingerprint, repo_hash};
pub use generator::GenomeGenerator;
pub use incremental::{detect_changes, subsystem_mask, ChangeSet, SubsystemMask};
pub use merger::{merge, MergeInputs};
pub use sources::{Clock, FileActivity, FilesystemSource, GitHistory, NullHistory, SystemClock, WalkSource};
pub use spider::{BaseGraph, RepoSpider};
pub use stats::ScanStats;
pub use subsystems::{ChronoMap, ContractLens, FlowWeaver, IntentAtlas, TestGalaxy};
pub use summary::{apply_criticality, derive_risk, derive_summary};
