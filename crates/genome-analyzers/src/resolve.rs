use crate::registry::AnalyzerKind;
use std::collections::HashSet;

/// Outcome of mapping an import source string onto the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Resolved to a file inside the repository (node id = path).
    File(String),
    /// Resolved outside the repository; the key names the external module
    /// and becomes an `ext:<key>` virtual node.
    External(String),
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{dir}/{rest}")
    }
}

fn first_existing(files: &HashSet<String>, candidates: impl IntoIterator<Item = String>) -> Option<String> {
    candidates.into_iter().find(|c| files.contains(c))
}

fn python_candidates(base: &str, module_path: &str) -> Vec<String> {
    let rel = module_path.replace('.', "/");
    vec![
        join(base, &format!("{rel}.py")),
        join(base, &format!("{rel}/__init__.py")),
    ]
}

fn resolve_python(files: &HashSet<String>, from_file: &str, source: &str) -> Resolution {
    if let Some(stripped) = source.strip_prefix('.') {
        // Relative import: one leading dot is the current package, each
        // further dot walks one level up.
        let mut dir = parent_dir(from_file).to_string();
        let mut rest = stripped;
        while let Some(more) = rest.strip_prefix('.') {
            dir = parent_dir(&dir).to_string();
            rest = more;
        }
        if !rest.is_empty() {
            if let Some(hit) = first_existing(files, python_candidates(&dir, rest)) {
                return Resolution::File(hit);
            }
        }
        return Resolution::External(format!("rel:{source}"));
    }

    // Absolute: repo root first, then the importing file's own directory
    // (flat script layouts).
    if let Some(hit) = first_existing(files, python_candidates("", source)) {
        return Resolution::File(hit);
    }
    let sibling_base = parent_dir(from_file);
    if !sibling_base.is_empty() {
        if let Some(hit) = first_existing(files, python_candidates(sibling_base, source)) {
            return Resolution::File(hit);
        }
    }

    let key = source.split('.').next().unwrap_or(source);
    Resolution::External(key.to_string())
}

fn resolve_typescript(files: &HashSet<String>, from_file: &str, source: &str) -> Resolution {
    if !source.starts_with('.') {
        let key = source.split('/').next().unwrap_or(source);
        return Resolution::External(key.to_string());
    }

    let mut dir = parent_dir(from_file).to_string();
    let mut rest = source;
    if let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    while let Some(stripped) = rest.strip_prefix("../") {
        dir = parent_dir(&dir).to_string();
        rest = stripped;
    }

    let mut candidates = vec![join(&dir, rest)];
    for ext in ["ts", "tsx", "js", "jsx", "mjs", "cjs"] {
        candidates.push(join(&dir, &format!("{rest}.{ext}")));
    }
    for ext in ["ts", "tsx", "js", "jsx"] {
        candidates.push(join(&dir, &format!("{rest}/index.{ext}")));
    }
    match first_existing(files, candidates) {
        Some(hit) => Resolution::File(hit),
        None => Resolution::External(format!("rel:{source}")),
    }
}

fn resolve_rust(files: &HashSet<String>, from_file: &str, source: &str) -> Resolution {
    let segments: Vec<&str> = source.split("::").map(str::trim).collect();
    let Some((&head, tail)) = segments.split_first() else {
        return Resolution::External(source.to_string());
    };

    if head == "crate" || head == "super" || head == "self" {
        let base = if head == "crate" {
            // Conventional single-crate layout.
            "src".to_string()
        } else if head == "super" {
            parent_dir(parent_dir(from_file)).to_string()
        } else {
            parent_dir(from_file).to_string()
        };

        // Trailing segments may be types or functions, not modules; try the
        // longest module path first and back off.
        for take in (1..=tail.len()).rev() {
            let rel = tail[..take].join("/");
            let candidates = vec![
                join(&base, &format!("{rel}.rs")),
                join(&base, &format!("{rel}/mod.rs")),
            ];
            if let Some(hit) = first_existing(files, candidates) {
                return Resolution::File(hit);
            }
        }
        return Resolution::External(format!("rel:{source}"));
    }

    Resolution::External(head.to_string())
}

/// Best-effort mapping from an import source string to a repository file.
/// Unresolved imports become external virtual modules, never errors.
pub fn resolve_import(
    files: &HashSet<String>,
    from_file: &str,
    source: &str,
    kind: AnalyzerKind,
) -> Resolution {
    match kind {
        AnalyzerKind::Python => resolve_python(files, from_file, source),
        AnalyzerKind::TypeScript | AnalyzerKind::JavaScript => {
            resolve_typescript(files, from_file, source)
        }
        AnalyzerKind::Rust => resolve_rust(files, from_file, source),
        _ => Resolution::External(source.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn files(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn python_root_module() {
        let fs = files(&["a.py", "b.py"]);
        assert_eq!(
            resolve_import(&fs, "a.py", "b", AnalyzerKind::Python),
            Resolution::File("b.py".into())
        );
    }

    #[test]
    fn python_package_and_relative() {
        let fs = files(&["pkg/__init__.py", "pkg/util.py", "pkg/sub/mod.py"]);
        assert_eq!(
            resolve_import(&fs, "main.py", "pkg.util", AnalyzerKind::Python),
            Resolution::File("pkg/util.py".into())
        );
        // One dot: same package. Two dots: one level up.
        assert_eq!(
            resolve_import(&fs, "pkg/sub/mod.py", ".util", AnalyzerKind::Python),
            Resolution::External("rel:.util".into())
        );
        assert_eq!(
            resolve_import(&fs, "pkg/sub/mod.py", "..util", AnalyzerKind::Python),
            Resolution::File("pkg/util.py".into())
        );
    }

    #[test]
    fn python_unresolved_is_external_top_module() {
        let fs = files(&["a.py"]);
        assert_eq!(
            resolve_import(&fs, "a.py", "requests.sessions", AnalyzerKind::Python),
            Resolution::External("requests".into())
        );
    }

    #[test]
    fn typescript_relative_with_extension_probe() {
        let fs = files(&["src/app.ts", "src/util.ts", "src/lib/index.ts"]);
        assert_eq!(
            resolve_import(&fs, "src/app.ts", "./util", AnalyzerKind::TypeScript),
            Resolution::File("src/util.ts".into())
        );
        assert_eq!(
            resolve_import(&fs, "src/app.ts", "./lib", AnalyzerKind::TypeScript),
            Resolution::File("src/lib/index.ts".into())
        );
        assert_eq!(
            resolve_import(&fs, "src/app.ts", "react", AnalyzerKind::TypeScript),
            Resolution::External("react".into())
        );
    }

    #[test]
    fn rust_crate_paths() {
        let fs = files(&["src/main.rs", "src/store.rs", "src/net/mod.rs"]);
        assert_eq!(
            resolve_import(&fs, "src/main.rs", "crate::store::Store", AnalyzerKind::Rust),
            Resolution::File("src/store.rs".into())
        );
        assert_eq!(
            resolve_import(&fs, "src/main.rs", "crate::net::client", AnalyzerKind::Rust),
            Resolution::File("src/net/mod.rs".into())
        );
        assert_eq!(
            resolve_import(&fs, "src/main.rs", "std::collections::HashMap", AnalyzerKind::Rust),
            Resolution::External("std".into())
        );
    }
}
