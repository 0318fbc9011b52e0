use crate::spider::BaseGraph;
use genome_core::Concept;
use std::collections::{BTreeMap, BTreeSet};

const MAX_CONCEPTS: usize = 32;
const MIN_CONCEPT_NODES: usize = 2;
const CORE_DOMAIN_LIMIT: usize = 5;

/// Domain keywords recognized in paths and ids, with their slug.
const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    ("auth", &["auth", "login", "session", "token"]),
    ("user", &["user", "account", "profile"]),
    ("payment", &["payment", "billing", "invoice"]),
    ("api", &["api", "endpoint", "route", "handler"]),
    ("database", &["database", "db", "sql", "storage", "store"]),
    ("config", &["config", "settings"]),
    ("search", &["search", "query", "index"]),
    ("cache", &["cache"]),
    ("notification", &["notification", "email", "webhook"]),
];

/// Extracts domain concepts from directory structure and naming patterns.
/// Concepts group file nodes only, so pure content edits never shift
/// concept membership.
pub struct IntentAtlas;

impl IntentAtlas {
    /// Returns `(concepts keyed by concept:<slug>, core domain slugs)`.
    pub fn chart(base: &BaseGraph) -> (BTreeMap<String, Concept>, Vec<String>) {
        let file_ids: Vec<&String> = base
            .nodes
            .iter()
            .filter(|(id, node)| node.file.as_deref() == Some(id.as_str()))
            .map(|(id, _)| id)
            .collect();

        let mut groups: BTreeMap<String, (BTreeSet<String>, String)> = BTreeMap::new();

        // Directory-derived concepts: the first path segment names a
        // candidate domain.
        for id in &file_ids {
            if let Some((dir, _)) = id.split_once('/') {
                let slug = dir.to_ascii_lowercase();
                if slug.is_empty() {
                    continue;
                }
                let entry = groups
                    .entry(slug.clone())
                    .or_insert_with(|| (BTreeSet::new(), format!("Files under {dir}/")));
                entry.0.insert((*id).clone());
            }
        }

        // Naming-derived concepts: domain keywords in the path.
        for id in &file_ids {
            let lower = id.to_ascii_lowercase();
            for (slug, keywords) in DOMAIN_KEYWORDS {
                if keywords.iter().any(|kw| lower.contains(kw)) {
                    let entry = groups.entry((*slug).to_string()).or_insert_with(|| {
                        (BTreeSet::new(), format!("{slug} domain"))
                    });
                    entry.0.insert((*id).clone());
                }
            }
        }

        let mut concepts: BTreeMap<String, Concept> = BTreeMap::new();
        for (slug, (nodes, description)) in groups {
            if nodes.len() < MIN_CONCEPT_NODES {
                continue;
            }
            if concepts.len() >= MAX_CONCEPTS {
                break;
            }
            concepts.insert(
                format!("concept:{slug}"),
                Concept {
                    nodes: nodes.into_iter().collect(),
                    description: Some(description),
                },
            );
        }

        // Core domains: top concepts by node count, ties by name.
        let mut ranked: Vec<(&String, usize)> = concepts
            .iter()
            .map(|(id, concept)| (id, concept.nodes.len()))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let core_domains = ranked
            .into_iter()
            .take(CORE_DOMAIN_LIMIT)
            .map(|(id, _)| id.trim_start_matches("concept:").to_string())
            .collect();

        (concepts, core_domains)
    }
}
