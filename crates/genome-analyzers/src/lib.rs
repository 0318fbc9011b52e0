//! # Genome Analyzers
//!
//! Per-file structural extraction behind a uniform capability:
//!
//! ```text
//! path ──> Classifier ──> (language, kind, capability)
//!                              │
//!                              ▼
//!          AnalyzerRegistry ──> Analyzer::extract(path, content)
//!                              │
//!                              ▼
//!          ExtractionResult { nodes, edges, diagnostics }
//! ```
//!
//! Analyzers are side-effect free: they read nothing but the content they
//! are handed, which makes them safe to run in parallel. Failures surface
//! as diagnostics, never as aborts.

mod classifier;
mod markup;
mod python;
mod registry;
mod resolve;
mod rust_lang;
mod typescript;
mod types;

pub use classifier::{classify, Classification, FileKind};
pub use registry::{Analyzer, AnalyzerKind, AnalyzerRegistry, CustomAnalyzer};
pub use resolve::{resolve_import, Resolution};
pub use types::{Diagnostic, EdgeDecl, ExtractionResult, NodeDecl, Severity};
