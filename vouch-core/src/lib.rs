//! Vouch Core - Trust graph model and algorithms for address reputation
//!
//! This crate provides the foundational primitives:
//! - Addresses, trust edges, paths and neighborhoods
//! - The global-trust propagation solver (power iteration)
//! - Path finding and neighborhood extraction over edge snapshots
//! - Trust factors, trust levels and the final score record

pub mod address;
pub mod edge;
pub mod factor;
pub mod interpret;
pub mod paths;
pub mod propagation;

pub use address::*;
pub use edge::*;
pub use factor::*;
pub use interpret::*;
pub use paths::*;
pub use propagation::*;

/// Default decay factor (weight of network opinion vs. pre-trust)
pub const DEFAULT_DECAY: f64 = 0.85;

/// Default L1 convergence threshold
pub const DEFAULT_THRESHOLD: f64 = 1e-4;

/// Default maximum solver iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Default neighborhood depth for scoring
pub const DEFAULT_DEPTH: usize = 3;

/// Default maximum hops for path queries
pub const DEFAULT_MAX_HOPS: usize = 4;

/// Minimum factor score
pub const MIN_SCORE: f64 = 0.0;

/// Maximum factor score
pub const MAX_SCORE: f64 = 100.0;
