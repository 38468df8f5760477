//! Vouch Sources - External collaborators of the scoring engine
//!
//! - **Attestations**: sentiment and stake from a knowledge-graph API
//! - **Activity**: on-chain history from Etherscan-compatible explorers
//! - **Narration**: natural-language explanations, templated or LLM-backed
//!
//! Each collaborator is a trait with an HTTP implementation and a static
//! implementation for offline runs and tests.

pub mod traits;
pub mod attestation;
pub mod activity;
pub mod backend;
pub mod narrator;

pub use traits::*;
pub use attestation::*;
pub use activity::*;
pub use backend::*;
pub use narrator::*;
