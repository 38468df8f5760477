//! Vouch Runtime - Score aggregation over the trust graph
//!
//! Wires the edge store, the propagation solver and the external
//! collaborators together:
//! - Neighborhood-scoped scoring with fan-out to every data source
//! - Full-graph recomputation with best-effort score write-back
//! - Validated path and connection queries

pub mod aggregator;
pub mod config;

pub use aggregator::*;
pub use config::*;
