//! # Genome Context
//!
//! Turns "goal + token budget" into a curated slice of the genome:
//!
//! 1. seed nodes scored by lexical match, proximity, criticality, and
//!    concept membership,
//! 2. weighted BFS expansion along structural edges,
//! 3. low-relevance siblings folded into per-file clusters,
//! 4. greedy relevance-per-token packing into the budget,
//! 5. a compact skeleton for low-latency first responses.
//!
//! Every build records its decision trace under a context id for
//! `explain_context`; feedback counters track how often later queries hit
//! the selected nodes.

mod assembler;
mod feedback;
mod session;
mod tokens;

pub use assembler::{
    AssembledContext, ContextAssembler, ContextItem, ContextRequest, DecisionTrace, FoldedCluster,
    Skeleton,
};
pub use feedback::{ContextFeedback, ContextStore};
pub use session::{SessionState, SessionStore};
pub use tokens::estimate_tokens;
