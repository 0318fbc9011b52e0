use genome_core::{NodeType, Visibility};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A problem encountered while analyzing one file. Diagnostics never abort
/// the surrounding scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// A top-level symbol declared by the analyzed file. The extractor turns
/// these into graph nodes with normalized ids.
#[derive(Debug, Clone)]
pub struct NodeDecl {
    pub name: String,
    pub node_type: NodeType,
    pub visibility: Visibility,
    pub summary: Option<String>,
    pub line: usize,
    /// Marks symbols like `fn main` that start an execution flow.
    pub entry_point: bool,
}

impl NodeDecl {
    pub fn function(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            node_type: NodeType::Function,
            visibility: Visibility::Public,
            summary: None,
            line,
            entry_point: false,
        }
    }

    pub fn class(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            node_type: NodeType::Class,
            visibility: Visibility::Public,
            summary: None,
            line,
            entry_point: false,
        }
    }
}

/// A relation declared by the analyzed file, in file-local terms. Import
/// sources and call targets are resolved to node ids by the extractor.
#[derive(Debug, Clone)]
pub enum EdgeDecl {
    /// `import x` / `use x`; source string as written.
    Import { source: String },
    /// A statically visible call. `caller` is the enclosing top-level
    /// symbol, or `None` for module-level code.
    Call {
        caller: Option<String>,
        callee: String,
    },
    /// A document-level link to another repository path.
    Reference { target: String },
}

/// Uniform result of `Analyzer::extract`.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub nodes: Vec<NodeDecl>,
    pub edges: Vec<EdgeDecl>,
    pub diagnostics: Vec<Diagnostic>,
    /// Set when the file itself is an entry point (`__main__` guard,
    /// server bootstrap, executable script).
    pub file_is_entry: bool,
    /// One-line description of the file when the format provides one.
    pub file_summary: Option<String>,
}
