//! Auxiliary subsystems. Each consumes an immutable view of the base
//! graph (plus capability inputs) and writes exactly one genome section;
//! the merger is the only place that crosses section boundaries.

mod chronomap;
mod contractlens;
mod flowweaver;
mod intentatlas;
mod testgalaxy;

pub use chronomap::ChronoMap;
pub use contractlens::ContractLens;
pub use flowweaver::FlowWeaver;
pub use intentatlas::IntentAtlas;
pub use testgalaxy::TestGalaxy;
