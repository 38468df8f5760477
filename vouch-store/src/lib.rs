//! Vouch Store - Edge store adapter for the trust graph
//!
//! Provides:
//! - The `EdgeStore` contract the scoring runtime consumes
//! - An in-memory directed weighted multigraph with upsert semantics
//! - JSON snapshot persistence for that graph

pub mod store;
pub mod memory;
pub mod snapshot;

pub use store::*;
pub use memory::*;
pub use snapshot::*;
