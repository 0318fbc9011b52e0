use crate::registry::AnalyzerKind;
use std::path::Path;

/// Coarse file kinds used by the extractor and the summary derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Code,
    Doc,
    Config,
    Web,
    Data,
    Other,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Code => "code",
            FileKind::Doc => "doc",
            FileKind::Config => "config",
            FileKind::Web => "web",
            FileKind::Data => "data",
            FileKind::Other => "other",
        }
    }
}

/// Result of classifying a path: language tag, coarse kind, and the
/// analyzer capability to run (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub language: Option<&'static str>,
    pub kind: FileKind,
    pub capability: Option<AnalyzerKind>,
}

impl Classification {
    const fn new(
        language: Option<&'static str>,
        kind: FileKind,
        capability: Option<AnalyzerKind>,
    ) -> Self {
        Self {
            language,
            kind,
            capability,
        }
    }

    const fn other() -> Self {
        Self::new(None, FileKind::Other, None)
    }
}

fn by_extension(ext: &str) -> Option<Classification> {
    use AnalyzerKind as A;
    use FileKind as K;
    let classification = match ext {
        "py" | "pyw" => Classification::new(Some("Python"), K::Code, Some(A::Python)),
        "ts" | "tsx" => Classification::new(Some("TypeScript"), K::Code, Some(A::TypeScript)),
        "js" | "mjs" | "cjs" | "jsx" => {
            Classification::new(Some("JavaScript"), K::Code, Some(A::JavaScript))
        }
        "rs" => Classification::new(Some("Rust"), K::Code, Some(A::Rust)),
        "go" => Classification::new(Some("Go"), K::Code, None),
        "java" => Classification::new(Some("Java"), K::Code, None),
        "c" | "h" => Classification::new(Some("C"), K::Code, None),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => {
            Classification::new(Some("C++"), K::Code, None)
        }
        "cs" => Classification::new(Some("C#"), K::Code, None),
        "rb" => Classification::new(Some("Ruby"), K::Code, None),
        "php" | "phtml" => Classification::new(Some("PHP"), K::Code, None),
        "swift" => Classification::new(Some("Swift"), K::Code, None),
        "kt" | "kts" => Classification::new(Some("Kotlin"), K::Code, None),
        "scala" => Classification::new(Some("Scala"), K::Code, None),
        "sh" | "bash" | "zsh" => Classification::new(Some("Shell"), K::Code, Some(A::Shell)),
        "sql" => Classification::new(Some("SQL"), K::Code, None),
        "md" | "markdown" => Classification::new(Some("Markdown"), K::Doc, Some(A::Markdown)),
        "rst" => Classification::new(Some("reStructuredText"), K::Doc, None),
        "txt" => Classification::new(Some("Text"), K::Doc, None),
        "json" => Classification::new(Some("JSON"), K::Config, Some(A::Json)),
        "yaml" | "yml" => Classification::new(Some("YAML"), K::Config, Some(A::Yaml)),
        "toml" => Classification::new(Some("TOML"), K::Config, Some(A::Toml)),
        "ini" | "cfg" | "conf" => Classification::new(Some("Config"), K::Config, None),
        "xml" => Classification::new(Some("XML"), K::Data, None),
        "csv" => Classification::new(Some("CSV"), K::Data, None),
        "html" | "htm" => Classification::new(Some("HTML"), K::Web, None),
        "css" | "scss" | "sass" | "less" => Classification::new(Some("CSS"), K::Web, None),
        _ => return None,
    };
    Some(classification)
}

fn by_shebang(first_line: &str) -> Option<Classification> {
    if !first_line.starts_with("#!") {
        return None;
    }
    let line = first_line.to_ascii_lowercase();
    if line.contains("python") {
        return Some(Classification::new(
            Some("Python"),
            FileKind::Code,
            Some(AnalyzerKind::Python),
        ));
    }
    if line.contains("node") {
        return Some(Classification::new(
            Some("JavaScript"),
            FileKind::Code,
            Some(AnalyzerKind::JavaScript),
        ));
    }
    if line.contains("bash") || line.contains("/sh") || line.contains("zsh") {
        return Some(Classification::new(
            Some("Shell"),
            FileKind::Code,
            Some(AnalyzerKind::Shell),
        ));
    }
    None
}

fn by_content(first_line: &str) -> Option<Classification> {
    let trimmed = first_line.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(Classification::new(
            Some("JSON"),
            FileKind::Config,
            Some(AnalyzerKind::Json),
        ));
    }
    if trimmed.starts_with("<?xml") {
        return Some(Classification::new(Some("XML"), FileKind::Data, None));
    }
    if trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") {
        return Some(Classification::new(Some("HTML"), FileKind::Web, None));
    }
    None
}

/// Resolve a path to its language, kind, and analyzer capability.
///
/// Resolution order is extension, then shebang, then a first-line content
/// sniff. The function is pure and total: unknown files classify as
/// `kind = other` with no analyzer.
pub fn classify(path: &Path, first_line: Option<&str>) -> Classification {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if let Some(classification) = by_extension(&ext.to_ascii_lowercase()) {
            return classification;
        }
    }
    if let Some(line) = first_line {
        if let Some(classification) = by_shebang(line) {
            return classification;
        }
        if let Some(classification) = by_content(line) {
            return classification;
        }
    }
    Classification::other()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_by_extension() {
        let c = classify(Path::new("src/main.py"), None);
        assert_eq!(c.language, Some("Python"));
        assert_eq!(c.kind, FileKind::Code);
        assert_eq!(c.capability, Some(AnalyzerKind::Python));

        let c = classify(Path::new("README.md"), None);
        assert_eq!(c.kind, FileKind::Doc);

        let c = classify(Path::new("config.yaml"), None);
        assert_eq!(c.kind, FileKind::Config);
    }

    #[test]
    fn extension_is_case_insensitive() {
        let c = classify(Path::new("Main.PY"), None);
        assert_eq!(c.language, Some("Python"));
    }

    #[test]
    fn shebang_beats_content_sniff() {
        let c = classify(Path::new("bin/run"), Some("#!/usr/bin/env python3"));
        assert_eq!(c.language, Some("Python"));

        let c = classify(Path::new("scripts/deploy"), Some("#!/bin/bash"));
        assert_eq!(c.capability, Some(AnalyzerKind::Shell));
    }

    #[test]
    fn content_sniff_catches_json() {
        let c = classify(Path::new(".babelrc2"), Some("{ \"presets\": [] }"));
        assert_eq!(c.language, Some("JSON"));
    }

    #[test]
    fn unknown_files_are_other() {
        let c = classify(Path::new("data.bin"), Some("\u{0}\u{1}"));
        assert_eq!(c.kind, FileKind::Other);
        assert_eq!(c.capability, None);
        assert_eq!(c.language, None);
    }
}
