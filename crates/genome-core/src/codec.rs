use crate::error::{GenomeError, Result};
use crate::schema::{
    Concept, ContractEntry, Edge, EdgeType, Flow, Genome, GenomeDiff, HistoryEntry, Metadata,
    Node, NodeType, RiskEntry, Summary, TestsSummary, Visibility, SCHEMA_VERSION,
};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Serialization modes for the persisted artifact.
///
/// All modes round-trip losslessly within their field set; the loader
/// auto-detects the mode from `metadata.mode` and gzip from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionMode {
    /// All fields, long key names.
    Standard,
    /// Closed-set short keys from the compact field table.
    Compact,
    /// Required fields only: metadata, summary, nodes {id,type,file},
    /// edges {from,to,type}.
    Lite,
}

impl CompactionMode {
    pub fn tag(self) -> Option<&'static str> {
        match self {
            CompactionMode::Standard => None,
            CompactionMode::Compact => Some("compact"),
            CompactionMode::Lite => Some("lite"),
        }
    }

    fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("compact") => CompactionMode::Compact,
            Some("lite") => CompactionMode::Lite,
            _ => CompactionMode::Standard,
        }
    }
}

// Compact mirrors use the normative short aliases: t=type, f=file,
// lang=language, v=visibility, s=summary, c=criticality, fr=from,
// ep=entry_points, cd=core_domains, cs=churn_score, rs=risk_score.

#[derive(Serialize, Deserialize)]
struct CompactNode {
    t: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    f: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lang: Option<String>,
    #[serde(default)]
    v: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    s: Option<String>,
    #[serde(default)]
    c: f32,
}

#[derive(Serialize, Deserialize)]
struct CompactEdge {
    fr: String,
    to: String,
    t: EdgeType,
}

#[derive(Serialize, Deserialize)]
struct CompactSummary {
    #[serde(default)]
    ep: Vec<String>,
    #[serde(default)]
    architectural_style: Vec<String>,
    #[serde(default)]
    cd: Vec<String>,
    #[serde(default)]
    hotspots: Vec<String>,
    #[serde(default)]
    do_not_touch: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct CompactHistory {
    cs: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_major_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct CompactRisk {
    rs: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    reasons: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct CompactGenome {
    metadata: Metadata,
    summary: CompactSummary,
    nodes: BTreeMap<String, CompactNode>,
    edges: Vec<CompactEdge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    flows: Vec<Flow>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    concepts: BTreeMap<String, Concept>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    history: BTreeMap<String, CompactHistory>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    risk: BTreeMap<String, CompactRisk>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    contracts: BTreeMap<String, ContractEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tests: Option<TestsSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    diff: Option<GenomeDiff>,
}

#[derive(Serialize, Deserialize)]
struct LiteNode {
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct LiteGenome {
    metadata: Metadata,
    summary: Summary,
    nodes: BTreeMap<String, LiteNode>,
    edges: Vec<Edge>,
}

fn to_compact(genome: &Genome) -> CompactGenome {
    CompactGenome {
        metadata: genome.metadata.clone(),
        summary: CompactSummary {
            ep: genome.summary.entry_points.clone(),
            architectural_style: genome.summary.architectural_style.clone(),
            cd: genome.summary.core_domains.clone(),
            hotspots: genome.summary.hotspots.clone(),
            do_not_touch: genome.summary.do_not_touch.clone(),
        },
        nodes: genome
            .nodes
            .iter()
            .map(|(id, n)| {
                (
                    id.clone(),
                    CompactNode {
                        t: n.node_type,
                        f: n.file.clone(),
                        lang: n.language.clone(),
                        v: n.visibility,
                        s: n.summary.clone(),
                        c: n.criticality,
                    },
                )
            })
            .collect(),
        edges: genome
            .edges
            .iter()
            .map(|e| CompactEdge {
                fr: e.from.clone(),
                to: e.to.clone(),
                t: e.edge_type,
            })
            .collect(),
        flows: genome.flows.clone(),
        concepts: genome.concepts.clone(),
        history: genome
            .history
            .iter()
            .map(|(id, h)| {
                (
                    id.clone(),
                    CompactHistory {
                        cs: h.churn_score,
                        last_major_change: h.last_major_change.clone(),
                        notes: h.notes.clone(),
                    },
                )
            })
            .collect(),
        risk: genome
            .risk
            .iter()
            .map(|(id, r)| {
                (
                    id.clone(),
                    CompactRisk {
                        rs: r.risk_score,
                        reasons: r.reasons.clone(),
                    },
                )
            })
            .collect(),
        contracts: genome.contracts.clone(),
        tests: genome.tests.clone(),
        diff: genome.diff.clone(),
    }
}

fn from_compact(compact: CompactGenome) -> Genome {
    Genome {
        metadata: compact.metadata,
        summary: Summary {
            entry_points: compact.summary.ep,
            architectural_style: compact.summary.architectural_style,
            core_domains: compact.summary.cd,
            hotspots: compact.summary.hotspots,
            do_not_touch: compact.summary.do_not_touch,
        },
        nodes: compact
            .nodes
            .into_iter()
            .map(|(id, n)| {
                (
                    id,
                    Node {
                        node_type: n.t,
                        file: n.f,
                        language: n.lang,
                        visibility: n.v,
                        summary: n.s,
                        criticality: n.c,
                    },
                )
            })
            .collect(),
        edges: compact
            .edges
            .into_iter()
            .map(|e| Edge {
                from: e.fr,
                to: e.to,
                edge_type: e.t,
            })
            .collect(),
        flows: compact.flows,
        concepts: compact.concepts,
        history: compact
            .history
            .into_iter()
            .map(|(id, h)| {
                (
                    id,
                    HistoryEntry {
                        churn_score: h.cs,
                        last_major_change: h.last_major_change,
                        notes: h.notes,
                    },
                )
            })
            .collect(),
        risk: compact
            .risk
            .into_iter()
            .map(|(id, r)| {
                (
                    id,
                    RiskEntry {
                        risk_score: r.rs,
                        reasons: r.reasons,
                    },
                )
            })
            .collect(),
        contracts: compact.contracts,
        tests: compact.tests,
        diff: compact.diff,
    }
}

fn to_lite(genome: &Genome) -> LiteGenome {
    LiteGenome {
        metadata: genome.metadata.clone(),
        summary: genome.summary.clone(),
        nodes: genome
            .nodes
            .iter()
            .map(|(id, n)| {
                (
                    id.clone(),
                    LiteNode {
                        node_type: n.node_type,
                        file: n.file.clone(),
                    },
                )
            })
            .collect(),
        edges: genome.edges.clone(),
    }
}

fn from_lite(lite: LiteGenome) -> Genome {
    Genome {
        metadata: lite.metadata,
        summary: lite.summary,
        nodes: lite
            .nodes
            .into_iter()
            .map(|(id, n)| {
                (
                    id,
                    Node {
                        node_type: n.node_type,
                        file: n.file,
                        language: None,
                        visibility: Visibility::default(),
                        summary: None,
                        criticality: 0.0,
                    },
                )
            })
            .collect(),
        edges: lite.edges,
        ..Genome::default()
    }
}

/// Render the genome as a JSON value in the requested mode. The mode tag is
/// stamped into `metadata.mode` so the loader can round-trip it.
pub fn to_mode_value(genome: &Genome, mode: CompactionMode) -> Result<serde_json::Value> {
    let mut stamped = genome.clone();
    stamped.metadata.mode = mode.tag().map(str::to_string);
    let value = match mode {
        CompactionMode::Standard => serde_json::to_value(&stamped)?,
        CompactionMode::Compact => serde_json::to_value(to_compact(&stamped))?,
        CompactionMode::Lite => serde_json::to_value(to_lite(&stamped))?,
    };
    Ok(value)
}

/// Detect the compaction mode of raw (non-gzipped) artifact bytes.
pub fn detect_mode(value: &serde_json::Value) -> CompactionMode {
    let tag = value
        .get("metadata")
        .and_then(|m| m.get("mode"))
        .and_then(|m| m.as_str());
    CompactionMode::from_tag(tag)
}

/// Save a genome artifact. Gzip is applied when `gzip` is set or the path
/// ends in `.gz`. The write is atomic (tmp + rename). Returns bytes written.
pub fn save_genome(genome: &Genome, path: &Path, mode: CompactionMode, gzip: bool) -> Result<u64> {
    let value = to_mode_value(genome, mode)?;
    let json = serde_json::to_vec_pretty(&value)?;

    let gzip = gzip || path.extension().is_some_and(|ext| ext == "gz");
    let bytes = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        encoder.finish()?
    } else {
        json
    };

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(bytes.len() as u64)
}

/// Load a genome artifact from disk, auto-detecting gzip and mode.
pub fn load_genome(path: &Path) -> Result<(Genome, CompactionMode)> {
    let bytes = std::fs::read(path)?;
    load_genome_bytes(&bytes)
}

/// Load a genome from raw bytes, auto-detecting gzip and mode. Rejects
/// artifacts with an unsupported schema major version.
pub fn load_genome_bytes(bytes: &[u8]) -> Result<(Genome, CompactionMode)> {
    let raw = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        out
    } else {
        bytes.to_vec()
    };

    let value: serde_json::Value = serde_json::from_slice(&raw)?;
    let mode = detect_mode(&value);

    let mut genome = match mode {
        CompactionMode::Standard => serde_json::from_value::<Genome>(value)?,
        CompactionMode::Compact => from_compact(serde_json::from_value(value)?),
        CompactionMode::Lite => from_lite(serde_json::from_value(value)?),
    };

    let loaded_version = genome.metadata.schema_version;
    if loaded_version != 0 && loaded_version != SCHEMA_VERSION {
        return Err(GenomeError::Stale(format!(
            "artifact schema version {loaded_version} is outside the supported range ({SCHEMA_VERSION})"
        )));
    }

    // The tag belongs to the serialized form, not the in-memory value.
    genome.metadata.mode = None;
    Ok((genome, mode))
}
