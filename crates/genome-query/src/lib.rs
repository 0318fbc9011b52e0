//! # Genome Query
//!
//! Read-side engine over a frozen genome snapshot: structured predicate
//! queries with pagination and field projection, graph traversal
//! (neighbors, dependency subgraphs, shortest paths), node comparison,
//! impact analysis, and a generation-keyed result cache.
//!
//! Query operations are CPU-bound and perform no I/O; callers hand the
//! engine an immutable snapshot and may run any number of readers
//! concurrently.

mod cache;
mod engine;
mod impact;
mod nlq;
mod predicate;

pub use cache::{CacheConfig, QueryCache};
pub use engine::{
    CompareResult, DependencyView, Direction, FieldDiff, NodeView, Page, QueryEngine,
    QueryOptions, SubgraphNode,
};
pub use impact::{analyze_impact, ImpactReport};
pub use nlq::translate_query;
pub use predicate::Predicate;
