//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The orchestrator
//! and the draft cache depend only on these traits, not on concrete backends.

mod data_source;

pub use data_source::{DataSource, PairDeltaMap};
