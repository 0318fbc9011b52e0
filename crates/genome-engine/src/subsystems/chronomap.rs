use crate::sources::HistorySource;
use crate::spider::BaseGraph;
use genome_core::HistoryEntry;
use std::collections::BTreeMap;

const BUG_KEYWORDS: &[&str] = &["fix", "bug", "error", "issue", "patch", "hotfix"];

/// Derives per-file churn history from the `HistorySource` capability and
/// surfaces the top-k hotspots.
pub struct ChronoMap;

/// Log-normalized change frequency: ~30 changes in the window saturate
/// the score.
fn churn_score(change_count: usize) -> f32 {
    (((change_count + 1) as f32).ln() / 31.0f32.ln()).min(1.0)
}

impl ChronoMap {
    /// Returns `(history entries keyed by file id, hotspot file ids)`.
    pub fn survey(
        base: &BaseGraph,
        history: &dyn HistorySource,
        hotspot_limit: usize,
    ) -> (BTreeMap<String, HistoryEntry>, Vec<String>) {
        let mut entries: BTreeMap<String, HistoryEntry> = BTreeMap::new();
        if !history.available() {
            return (entries, Vec::new());
        }

        for (id, node) in &base.nodes {
            if node.file.as_deref() != Some(id.as_str()) {
                continue;
            }
            let Some(activity) = history.file_activity(id) else {
                continue;
            };

            let bug_count = activity
                .recent_messages
                .iter()
                .filter(|message| {
                    let lower = message.to_ascii_lowercase();
                    BUG_KEYWORDS.iter().any(|kw| lower.contains(kw))
                })
                .count();
            let notes = (!activity.recent_messages.is_empty()
                && bug_count * 2 > activity.recent_messages.len())
            .then(|| "Frequent bug fixes".to_string());

            entries.insert(
                id.clone(),
                HistoryEntry {
                    churn_score: churn_score(activity.change_count),
                    last_major_change: activity.last_change,
                    notes,
                },
            );
        }

        let mut ranked: Vec<(&String, f32)> = entries
            .iter()
            .filter(|(_, entry)| entry.churn_score > 0.0)
            .map(|(id, entry)| (id, entry.churn_score))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        let hotspots = ranked
            .into_iter()
            .take(hotspot_limit)
            .map(|(id, _)| id.clone())
            .collect();

        (entries, hotspots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FileActivity;
    use genome_core::Node;

    struct FakeHistory;
    impl HistorySource for FakeHistory {
        fn available(&self) -> bool {
            true
        }
        fn file_activity(&self, rel: &str) -> Option<FileActivity> {
            match rel {
                "hot.py" => Some(FileActivity {
                    change_count: 40,
                    last_change: Some("2026-07-01".into()),
                    recent_messages: vec![
                        "fix crash".into(),
                        "fix overflow".into(),
                        "add feature".into(),
                    ],
                }),
                "calm.py" => Some(FileActivity {
                    change_count: 1,
                    last_change: Some("2026-02-01".into()),
                    recent_messages: vec!["initial".into()],
                }),
                _ => None,
            }
        }
    }

    fn base() -> BaseGraph {
        let mut base = BaseGraph::default();
        for path in ["hot.py", "calm.py", "untracked.py"] {
            base.nodes
                .insert(path.into(), Node::file_node(path, Some("Python".into())));
        }
        base
    }

    #[test]
    fn churn_is_bounded_and_monotone() {
        assert_eq!(churn_score(0), 0.0);
        assert!(churn_score(5) < churn_score(30));
        assert!(churn_score(10_000) <= 1.0);
    }

    #[test]
    fn hotspots_rank_by_churn() {
        let (entries, hotspots) = ChronoMap::survey(&base(), &FakeHistory, 10);
        assert_eq!(entries.len(), 2);
        assert_eq!(hotspots.first().map(String::as_str), Some("hot.py"));
        assert_eq!(
            entries["hot.py"].notes.as_deref(),
            Some("Frequent bug fixes")
        );
        assert!(entries["calm.py"].notes.is_none());
    }

    #[test]
    fn unavailable_history_yields_nothing() {
        let (entries, hotspots) = ChronoMap::survey(&base(), &crate::sources::NullHistory, 10);
        assert!(entries.is_empty());
        assert!(hotspots.is_empty());
    }
}
