use crate::session::SessionState;
use crate::tokens::estimate_tokens;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use genome_core::{EdgeType, Genome, GenomeError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

const SEED_FLOOR: f32 = 0.05;
const FOLD_FLOOR: f32 = 0.15;
const EXPAND_HOPS: usize = 2;
const EXPAND_DECAY: f32 = 0.5;
const PROXIMITY_HOPS: usize = 4;

// Monotone weights: lexical matches dominate, then graph proximity,
// criticality, concept membership.
const W_LEXICAL: f32 = 0.4;
const W_PROXIMITY: f32 = 0.3;
const W_CRITICALITY: f32 = 0.2;
const W_CONCEPT: f32 = 0.1;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "fix", "for", "how", "implement", "in", "of", "refactor", "the", "to",
    "understand", "with",
];

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ContextRequest {
    pub goal: String,
    pub budget_tokens: usize,
    #[serde(default)]
    pub must_include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContextItem {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub relevance: f32,
    pub tokens: usize,
    /// Present when this entry folds several low-relevance siblings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folded_members: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FoldedCluster {
    pub label: String,
    pub member_count: usize,
}

/// First-stage compact form: entry points, top concepts, folded clusters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Skeleton {
    pub entry_points: Vec<String>,
    pub top_concepts: Vec<String>,
    pub clusters: Vec<FoldedCluster>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DecisionTrace {
    pub goal: String,
    pub keywords: Vec<String>,
    pub seeds: usize,
    pub expanded: usize,
    pub folded: usize,
    pub packed: usize,
    pub dropped: usize,
    pub budget_tokens: usize,
    pub tokens_used: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssembledContext {
    pub context_id: String,
    pub items: Vec<ContextItem>,
    pub skeleton: Skeleton,
    pub budget_tokens: usize,
    pub tokens_used: usize,
    #[serde(skip)]
    pub trace: DecisionTrace,
}

/// Goal-driven selection over one genome snapshot.
pub struct ContextAssembler<'a> {
    genome: &'a Genome,
}

fn keywords_of(goal: &str) -> Vec<String> {
    let mut keywords: Vec<String> = goal
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .map(str::to_ascii_lowercase)
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(&w.as_str()))
        .collect();
    keywords.dedup();
    keywords
}

fn edge_weight(edge_type: EdgeType) -> f32 {
    match edge_type {
        EdgeType::Defines | EdgeType::Calls | EdgeType::Imports => 1.0,
        EdgeType::References | EdgeType::DependsOn | EdgeType::Emits => 0.6,
        EdgeType::Tests | EdgeType::Mutates => 0.3,
    }
}

impl<'a> ContextAssembler<'a> {
    pub fn new(genome: &'a Genome) -> Self {
        Self { genome }
    }

    pub fn build(
        &self,
        request: &ContextRequest,
        session: Option<&SessionState>,
    ) -> Result<AssembledContext> {
        if request.budget_tokens == 0 {
            return Err(GenomeError::InvalidInput(
                "budget_tokens must be positive".into(),
            ));
        }
        let keywords = keywords_of(&request.goal);
        let excluded: HashSet<&str> = request.exclude.iter().map(String::as_str).collect();

        let mut anchors: Vec<String> = request.must_include.clone();
        if let Some(session) = session {
            anchors.extend(session.pinned.iter().cloned());
        }
        anchors.retain(|id| self.genome.nodes.contains_key(id));

        // 1. Seed scores.
        let proximity = self.proximity_map(&anchors);
        let concept_hits = self.concept_keyword_members(&keywords);
        let mut scores: BTreeMap<&str, f32> = BTreeMap::new();
        for (id, node) in &self.genome.nodes {
            if excluded.contains(id.as_str()) {
                continue;
            }
            let lexical = self.lexical_score(id, node.summary.as_deref(), &keywords);
            let near = proximity.get(id.as_str()).copied().unwrap_or(0.0);
            let concept = if concept_hits.contains(id.as_str()) { 1.0 } else { 0.0 };
            let score = W_LEXICAL * lexical
                + W_PROXIMITY * near
                + W_CRITICALITY * node.criticality
                + W_CONCEPT * concept;
            if score > SEED_FLOOR {
                scores.insert(id, score);
            }
        }
        let seeds = scores.len();

        // 2. Expand around seeds along weighted structural edges.
        let adjacency = self.adjacency();
        let seed_ids: Vec<&str> = scores.keys().copied().collect();
        for seed in seed_ids {
            let base = scores[seed];
            let mut frontier: Vec<(&str, f32)> = vec![(seed, base)];
            for _ in 0..EXPAND_HOPS {
                let mut next = Vec::new();
                for (id, score) in frontier {
                    for (neighbor, edge_type) in adjacency.get(id).into_iter().flatten() {
                        if excluded.contains(neighbor) {
                            continue;
                        }
                        let propagated = score * EXPAND_DECAY * edge_weight(*edge_type);
                        let entry = scores.entry(*neighbor).or_insert(0.0);
                        if propagated > *entry {
                            *entry = propagated;
                            next.push((*neighbor, propagated));
                        }
                    }
                }
                frontier = next;
            }
        }
        let expanded = scores.len().saturating_sub(seeds);

        // Anchors are always candidates, regardless of score.
        for anchor in &anchors {
            scores.entry(anchor.as_str()).or_insert(1.0);
        }

        // 3. Fold sub-floor siblings into their parent file.
        let mut strong: Vec<(&str, f32)> = Vec::new();
        let mut folded_groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (id, score) in &scores {
            let is_anchor = anchors.iter().any(|a| a == id);
            if *score >= FOLD_FLOOR || is_anchor {
                strong.push((*id, *score));
                continue;
            }
            let parent = self
                .genome
                .nodes
                .get(*id)
                .and_then(|n| n.file.as_deref())
                .filter(|file| *file != *id);
            if let Some(parent) = parent {
                folded_groups.entry(parent).or_default().push(*id);
            }
        }
        folded_groups.retain(|_, members| members.len() >= 2);
        let folded = folded_groups.values().map(|m| m.len()).sum::<usize>();

        // 4. Greedy knapsack by relevance per token.
        let mut candidates: Vec<ContextItem> = Vec::new();
        for (id, score) in &strong {
            candidates.push(self.item(id, *score, &anchors, &keywords));
        }
        for (parent, members) in &folded_groups {
            let relevance = members
                .iter()
                .filter_map(|m| scores.get(*m))
                .fold(0.0f32, |a, b| a.max(*b));
            let mut item = self.item(parent, relevance, &anchors, &keywords);
            item.folded_members = members.iter().map(|m| m.to_string()).collect();
            item.tokens = estimate_tokens(&json!({
                "id": parent,
                "folded": item.folded_members,
            }));
            item.reason = format!("folds {} low-relevance siblings", members.len());
            candidates.push(item);
        }

        candidates.sort_by(|a, b| {
            let a_anchor = anchors.contains(&a.id);
            let b_anchor = anchors.contains(&b.id);
            b_anchor
                .cmp(&a_anchor)
                .then_with(|| {
                    let a_density = a.relevance / a.tokens.max(1) as f32;
                    let b_density = b.relevance / b.tokens.max(1) as f32;
                    b_density.partial_cmp(&a_density).unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    let a_crit = self.criticality(&a.id);
                    let b_crit = self.criticality(&b.id);
                    b_crit.partial_cmp(&a_crit).unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut items: Vec<ContextItem> = Vec::new();
        let mut tokens_used = 0usize;
        let mut dropped = 0usize;
        let mut selected: HashSet<String> = HashSet::new();
        for item in candidates {
            if selected.contains(&item.id) {
                continue;
            }
            if tokens_used + item.tokens <= request.budget_tokens {
                tokens_used += item.tokens;
                selected.insert(item.id.clone());
                items.push(item);
            } else {
                dropped += 1;
            }
        }

        // 5. Skeleton: first-page view.
        let clusters = items
            .iter()
            .filter(|item| !item.folded_members.is_empty())
            .map(|item| FoldedCluster {
                label: item.id.clone(),
                member_count: item.folded_members.len(),
            })
            .collect();
        let skeleton = Skeleton {
            entry_points: self.genome.summary.entry_points.clone(),
            top_concepts: self.genome.summary.core_domains.clone(),
            clusters,
        };

        let trace = DecisionTrace {
            goal: request.goal.clone(),
            keywords,
            seeds,
            expanded,
            folded,
            packed: items.len(),
            dropped,
            budget_tokens: request.budget_tokens,
            tokens_used,
        };

        Ok(AssembledContext {
            context_id: context_id(&request.goal, request.budget_tokens, self.genome),
            items,
            skeleton,
            budget_tokens: request.budget_tokens,
            tokens_used,
            trace,
        })
    }

    /// Skeleton-only variant for low-latency first responses.
    pub fn skeleton(&self, request: &ContextRequest) -> Result<Skeleton> {
        let context = self.build(request, None)?;
        Ok(context.skeleton)
    }

    fn criticality(&self, id: &str) -> f32 {
        self.genome.nodes.get(id).map(|n| n.criticality).unwrap_or(0.0)
    }

    fn lexical_score(&self, id: &str, summary: Option<&str>, keywords: &[String]) -> f32 {
        if keywords.is_empty() {
            return 0.0;
        }
        let haystack = format!("{} {}", id, summary.unwrap_or("")).to_ascii_lowercase();
        let hits = keywords.iter().filter(|kw| haystack.contains(kw.as_str())).count();
        hits as f32 / keywords.len() as f32
    }

    /// 1/(1+d) proximity to the anchor set via undirected BFS.
    fn proximity_map(&self, anchors: &[String]) -> HashMap<String, f32> {
        let mut best: HashMap<String, f32> = HashMap::new();
        if anchors.is_empty() {
            return best;
        }
        let adjacency = self.undirected_adjacency();
        for anchor in anchors {
            let mut queue = VecDeque::new();
            let mut visited: HashSet<&str> = HashSet::new();
            queue.push_back((anchor.as_str(), 0usize));
            visited.insert(anchor);
            while let Some((id, distance)) = queue.pop_front() {
                let score = 1.0 / (1.0 + distance as f32);
                let entry = best.entry(id.to_string()).or_insert(0.0);
                if score > *entry {
                    *entry = score;
                }
                if distance >= PROXIMITY_HOPS {
                    continue;
                }
                for neighbor in adjacency.get(id).into_iter().flatten() {
                    if visited.insert(neighbor) {
                        queue.push_back((neighbor, distance + 1));
                    }
                }
            }
        }
        best
    }

    fn adjacency(&self) -> HashMap<&str, Vec<(&str, EdgeType)>> {
        let mut adjacency: HashMap<&str, Vec<(&str, EdgeType)>> = HashMap::new();
        for edge in &self.genome.edges {
            adjacency
                .entry(edge.from.as_str())
                .or_default()
                .push((edge.to.as_str(), edge.edge_type));
        }
        adjacency
    }

    fn undirected_adjacency(&self) -> HashMap<&str, Vec<&str>> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.genome.edges {
            adjacency
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.as_str());
            adjacency
                .entry(edge.to.as_str())
                .or_default()
                .push(edge.from.as_str());
        }
        adjacency
    }

    fn concept_keyword_members(&self, keywords: &[String]) -> HashSet<&str> {
        let mut members: HashSet<&str> = HashSet::new();
        for (concept_id, concept) in &self.genome.concepts {
            let slug = concept_id.trim_start_matches("concept:");
            if keywords.iter().any(|kw| slug.contains(kw.as_str())) {
                members.extend(concept.nodes.iter().map(String::as_str));
            }
        }
        members
    }

    fn item(&self, id: &str, relevance: f32, anchors: &[String], keywords: &[String]) -> ContextItem {
        let node = self.genome.nodes.get(id);
        let summary = node.and_then(|n| n.summary.clone());
        let file = node.and_then(|n| n.file.clone());
        let node_type = node
            .map(|n| n.node_type.as_str().to_string())
            .unwrap_or_else(|| "file".to_string());

        let reason = if anchors.iter().any(|a| a == id) {
            "pinned by request".to_string()
        } else if keywords.iter().any(|kw| id.to_ascii_lowercase().contains(kw.as_str())) {
            "matches goal keywords".to_string()
        } else {
            "reached by graph expansion".to_string()
        };

        let payload = json!({
            "id": id,
            "type": node_type,
            "file": file,
            "summary": summary,
        });
        ContextItem {
            id: id.to_string(),
            node_type,
            file,
            summary,
            relevance,
            tokens: estimate_tokens(&payload),
            folded_members: Vec::new(),
            reason,
        }
    }
}

/// Opaque, reproducible context version id for a (goal, budget, genome)
/// triple.
fn context_id(goal: &str, budget: usize, genome: &Genome) -> String {
    let mut hasher = Sha256::new();
    hasher.update(goal.as_bytes());
    hasher.update(budget.to_be_bytes());
    hasher.update(genome.metadata.repo_hash.as_bytes());
    let digest = hasher.finalize();
    format!("ctx_{}", URL_SAFE_NO_PAD.encode(&digest[..12]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use genome_core::{Concept, Edge, Node, NodeType, Visibility};
    use pretty_assertions::assert_eq;

    fn function(file: &str, criticality: f32) -> Node {
        Node {
            node_type: NodeType::Function,
            file: Some(file.into()),
            language: Some("Python".into()),
            visibility: Visibility::Public,
            summary: None,
            criticality,
        }
    }

    fn sample() -> Genome {
        let mut genome = Genome::default();
        genome.metadata.repo_hash = "sha256:test".into();
        genome
            .nodes
            .insert("auth/login.py".into(), Node::file_node("auth/login.py", None));
        genome
            .nodes
            .insert("billing/pay.py".into(), Node::file_node("billing/pay.py", None));
        genome
            .nodes
            .insert("auth/login.authenticate".into(), function("auth/login.py", 0.8));
        genome
            .nodes
            .insert("auth/login.check_token".into(), function("auth/login.py", 0.2));
        genome
            .nodes
            .insert("billing/pay.charge".into(), function("billing/pay.py", 0.5));
        genome.edges = vec![
            Edge::new("auth/login.py", "auth/login.authenticate", EdgeType::Defines),
            Edge::new("auth/login.py", "auth/login.check_token", EdgeType::Defines),
            Edge::new("billing/pay.py", "billing/pay.charge", EdgeType::Defines),
            Edge::new("auth/login.authenticate", "auth/login.check_token", EdgeType::Calls),
        ];
        genome.concepts.insert(
            "concept:auth".into(),
            Concept {
                nodes: vec!["auth/login.py".into()],
                description: None,
            },
        );
        genome.summary.entry_points = vec!["auth/login.py".into()];
        genome.summary.core_domains = vec!["auth".into()];
        genome
    }

    fn request(goal: &str, budget: usize) -> ContextRequest {
        ContextRequest {
            goal: goal.into(),
            budget_tokens: budget,
            ..Default::default()
        }
    }

    #[test]
    fn goal_keywords_select_matching_nodes() {
        let genome = sample();
        let assembler = ContextAssembler::new(&genome);
        let context = assembler.build(&request("refactor auth login", 2000), None).unwrap();
        let ids: Vec<&str> = context.items.iter().map(|i| i.id.as_str()).collect();
        assert!(ids.contains(&"auth/login.authenticate"), "got {ids:?}");
        assert!(context.tokens_used <= 2000);
    }

    #[test]
    fn budget_is_respected() {
        let genome = sample();
        let assembler = ContextAssembler::new(&genome);
        let generous = assembler.build(&request("auth login billing pay", 5000), None).unwrap();
        let tight = assembler.build(&request("auth login billing pay", 30), None).unwrap();
        assert!(tight.items.len() < generous.items.len());
        assert!(tight.tokens_used <= 30);
    }

    #[test]
    fn must_include_is_always_packed_first() {
        let genome = sample();
        let assembler = ContextAssembler::new(&genome);
        let mut req = request("billing", 60);
        req.must_include = vec!["auth/login.check_token".into()];
        let context = assembler.build(&req, None).unwrap();
        assert_eq!(context.items[0].id, "auth/login.check_token");
    }

    #[test]
    fn excluded_nodes_never_appear() {
        let genome = sample();
        let assembler = ContextAssembler::new(&genome);
        let mut req = request("auth login", 2000);
        req.exclude = vec!["auth/login.check_token".into()];
        let context = assembler.build(&req, None).unwrap();
        assert!(context.items.iter().all(|i| i.id != "auth/login.check_token"));
    }

    #[test]
    fn higher_criticality_wins_ties() {
        let genome = sample();
        let assembler = ContextAssembler::new(&genome);
        let context = assembler.build(&request("auth login", 5000), None).unwrap();
        let authenticate = context
            .items
            .iter()
            .position(|i| i.id == "auth/login.authenticate")
            .unwrap();
        let check = context
            .items
            .iter()
            .position(|i| i.id == "auth/login.check_token")
            .unwrap();
        assert!(authenticate < check);
    }

    #[test]
    fn skeleton_carries_entries_and_concepts() {
        let genome = sample();
        let assembler = ContextAssembler::new(&genome);
        let skeleton = assembler.skeleton(&request("auth", 1000)).unwrap();
        assert_eq!(skeleton.entry_points, vec!["auth/login.py".to_string()]);
        assert_eq!(skeleton.top_concepts, vec!["auth".to_string()]);
    }

    #[test]
    fn context_id_is_reproducible() {
        let genome = sample();
        let assembler = ContextAssembler::new(&genome);
        let a = assembler.build(&request("auth", 500), None).unwrap();
        let b = assembler.build(&request("auth", 500), None).unwrap();
        assert_eq!(a.context_id, b.context_id);
        let c = assembler.build(&request("billing", 500), None).unwrap();
        assert_ne!(a.context_id, c.context_id);
    }

    #[test]
    fn zero_budget_is_invalid_input() {
        let genome = sample();
        let assembler = ContextAssembler::new(&genome);
        let err = assembler.build(&request("auth", 0), None).unwrap_err();
        assert_eq!(err.code(), "invalid-input");
    }

    #[test]
    fn session_pins_act_as_anchors() {
        let genome = sample();
        let assembler = ContextAssembler::new(&genome);
        let session = SessionState {
            facts: vec![],
            pinned: vec!["billing/pay.charge".into()],
        };
        let context = assembler
            .build(&request("auth login", 2000), Some(&session))
            .unwrap();
        assert!(context.items.iter().any(|i| i.id == "billing/pay.charge"));
    }
}
