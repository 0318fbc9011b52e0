use crate::markup;
use crate::python;
use crate::rust_lang;
use crate::typescript::{self, Dialect};
use crate::types::ExtractionResult;
use crate::Classification;
use std::collections::HashMap;
use std::sync::Arc;

/// Capability tag resolved by the classifier; keys the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerKind {
    Python,
    TypeScript,
    JavaScript,
    Rust,
    Markdown,
    Json,
    Yaml,
    Toml,
    Shell,
}

/// User-provided analyzers plug in behind the same capability.
pub trait CustomAnalyzer: Send + Sync {
    fn extract(&self, path: &str, content: &str) -> ExtractionResult;
}

/// A dispatchable analyzer. Built-ins are a closed tagged set (no string
/// dispatch); external analyzers are the explicit escape hatch.
#[derive(Clone)]
pub enum Analyzer {
    Python,
    TypeScript,
    JavaScript,
    Rust,
    Markdown,
    Json,
    Yaml,
    Toml,
    Shell,
    External(Arc<dyn CustomAnalyzer>),
}

impl Analyzer {
    /// Extract nodes, edges and diagnostics from one file. Reads nothing
    /// but the provided content; reentrant and safe to call in parallel.
    pub fn extract(&self, path: &str, content: &str) -> ExtractionResult {
        match self {
            Analyzer::Python => python::extract(content),
            Analyzer::TypeScript => typescript::extract(content, Dialect::TypeScript),
            Analyzer::JavaScript => typescript::extract(content, Dialect::JavaScript),
            Analyzer::Rust => rust_lang::extract(content),
            Analyzer::Markdown => markup::extract_markdown(content),
            Analyzer::Json => markup::extract_json(content),
            Analyzer::Yaml => markup::extract_yaml(content),
            Analyzer::Toml => markup::extract_toml(content),
            Analyzer::Shell => markup::extract_shell(content),
            Analyzer::External(custom) => custom.extract(path, content),
        }
    }
}

/// Maps classifier capabilities to analyzers. External analyzers override
/// built-ins for their capability.
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    external: HashMap<AnalyzerKind, Arc<dyn CustomAnalyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_external(&mut self, kind: AnalyzerKind, analyzer: Arc<dyn CustomAnalyzer>) {
        self.external.insert(kind, analyzer);
    }

    /// Resolve the analyzer for a classification, if any.
    pub fn resolve(&self, classification: &Classification) -> Option<Analyzer> {
        let kind = classification.capability?;
        if let Some(custom) = self.external.get(&kind) {
            return Some(Analyzer::External(Arc::clone(custom)));
        }
        Some(match kind {
            AnalyzerKind::Python => Analyzer::Python,
            AnalyzerKind::TypeScript => Analyzer::TypeScript,
            AnalyzerKind::JavaScript => Analyzer::JavaScript,
            AnalyzerKind::Rust => Analyzer::Rust,
            AnalyzerKind::Markdown => Analyzer::Markdown,
            AnalyzerKind::Json => Analyzer::Json,
            AnalyzerKind::Yaml => Analyzer::Yaml,
            AnalyzerKind::Toml => Analyzer::Toml,
            AnalyzerKind::Shell => Analyzer::Shell,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use std::path::Path;

    #[test]
    fn resolves_builtin_for_python() {
        let registry = AnalyzerRegistry::new();
        let classification = classify(Path::new("a.py"), None);
        let analyzer = registry.resolve(&classification).expect("python analyzer");
        let result = analyzer.extract("a.py", "def f():\n    pass\n");
        assert_eq!(result.nodes.len(), 1);
    }

    #[test]
    fn no_analyzer_for_unknown_files() {
        let registry = AnalyzerRegistry::new();
        let classification = classify(Path::new("blob.bin"), None);
        assert!(registry.resolve(&classification).is_none());
    }

    struct Stub;
    impl CustomAnalyzer for Stub {
        fn extract(&self, _path: &str, _content: &str) -> ExtractionResult {
            let mut result = ExtractionResult::default();
            result.file_summary = Some("stub".into());
            result
        }
    }

    #[test]
    fn external_overrides_builtin() {
        let mut registry = AnalyzerRegistry::new();
        registry.register_external(AnalyzerKind::Python, Arc::new(Stub));
        let classification = classify(Path::new("a.py"), None);
        let analyzer = registry.resolve(&classification).unwrap();
        let result = analyzer.extract("a.py", "def f():\n    pass\n");
        assert_eq!(result.file_summary.as_deref(), Some("stub"));
    }
}
