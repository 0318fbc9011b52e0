use crate::assembler::{AssembledContext, DecisionTrace};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Hit/miss counters for one assembled context: how often later query
/// results landed inside (or outside) its selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContextFeedback {
    pub hits: u64,
    pub misses: u64,
}

struct StoredContext {
    trace: DecisionTrace,
    member_ids: HashSet<String>,
    feedback: ContextFeedback,
}

/// Keeps decision traces and feedback counters per context version id.
#[derive(Default)]
pub struct ContextStore {
    contexts: Mutex<HashMap<String, StoredContext>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, context: &AssembledContext) {
        let member_ids = context
            .items
            .iter()
            .flat_map(|item| {
                std::iter::once(item.id.clone()).chain(item.folded_members.iter().cloned())
            })
            .collect();
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.insert(
                context.context_id.clone(),
                StoredContext {
                    trace: context.trace.clone(),
                    member_ids,
                    feedback: ContextFeedback::default(),
                },
            );
        }
    }

    pub fn explain(&self, context_id: &str) -> Option<DecisionTrace> {
        self.contexts
            .lock()
            .ok()?
            .get(context_id)
            .map(|stored| stored.trace.clone())
    }

    pub fn feedback(&self, context_id: &str) -> Option<ContextFeedback> {
        self.contexts
            .lock()
            .ok()?
            .get(context_id)
            .map(|stored| stored.feedback.clone())
    }

    /// Called by the serving layer with the node ids a later query
    /// returned; updates every stored context's counters.
    pub fn observe(&self, returned_ids: &[String]) {
        let Ok(mut contexts) = self.contexts.lock() else {
            return;
        };
        for stored in contexts.values_mut() {
            for id in returned_ids {
                if stored.member_ids.contains(id) {
                    stored.feedback.hits += 1;
                } else {
                    stored.feedback.misses += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{ContextItem, Skeleton};

    fn context(id: &str, items: &[&str]) -> AssembledContext {
        AssembledContext {
            context_id: id.to_string(),
            items: items
                .iter()
                .map(|item_id| ContextItem {
                    id: item_id.to_string(),
                    node_type: "function".into(),
                    file: None,
                    summary: None,
                    relevance: 1.0,
                    tokens: 10,
                    folded_members: vec![],
                    reason: "test".into(),
                })
                .collect(),
            skeleton: Skeleton {
                entry_points: vec![],
                top_concepts: vec![],
                clusters: vec![],
            },
            budget_tokens: 100,
            tokens_used: 10,
            trace: DecisionTrace {
                goal: "g".into(),
                keywords: vec![],
                seeds: 1,
                expanded: 0,
                folded: 0,
                packed: 1,
                dropped: 0,
                budget_tokens: 100,
                tokens_used: 10,
            },
        }
    }

    #[test]
    fn explain_returns_the_trace() {
        let store = ContextStore::new();
        store.record(&context("ctx_1", &["a"]));
        assert_eq!(store.explain("ctx_1").unwrap().goal, "g");
        assert!(store.explain("ctx_missing").is_none());
    }

    #[test]
    fn observe_updates_hits_and_misses() {
        let store = ContextStore::new();
        store.record(&context("ctx_1", &["a", "b"]));
        store.observe(&["a".to_string(), "z".to_string()]);
        let feedback = store.feedback("ctx_1").unwrap();
        assert_eq!(feedback.hits, 1);
        assert_eq!(feedback.misses, 1);
    }
}
