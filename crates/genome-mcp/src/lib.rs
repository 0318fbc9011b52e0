//! # Genome MCP
//!
//! Stdio-framed MCP server over the repository genome. Resources expose
//! read-only genome views; tools cover scanning, querying, traversal,
//! impact analysis, context assembly, and export. A per-session agent
//! contract (load before use, impact before edit, update after edit,
//! honor validation) gates every tool call.

pub mod contract;
pub mod schemas;
pub mod service;
pub mod storage;

pub use service::GenomeService;
pub use storage::{GenomeStore, ARTIFACT_NAME};
