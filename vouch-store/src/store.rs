//! Edge store contract
//!
//! Addresses passed to any method are case-normalized by the implementation
//! before lookup.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use vouch_core::{
    DirectConnections, GraphNeighborhood, GraphPath, GraphStats, Node, NodeId, Traversal,
    TrustEdge, TrustVector,
};

/// Errors from the edge store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Edge store unavailable: {0}")]
    Unavailable(String),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Persisted directed weighted multigraph of trust edges
#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// Snapshot of every known edge
    async fn get_all_edges(&self) -> Result<Vec<TrustEdge>, StoreError>;

    /// Nodes within `depth` hops of `address`, plus every edge among them
    async fn get_neighborhood(
        &self,
        address: &str,
        depth: usize,
        traversal: Traversal,
    ) -> Result<GraphNeighborhood, StoreError>;

    /// Fewest-hop directed path within `max_hops`
    async fn find_trust_path(
        &self,
        from: &str,
        to: &str,
        max_hops: usize,
    ) -> Result<Option<GraphPath>, StoreError>;

    async fn get_direct_connections(&self, address: &str) -> Result<DirectConnections, StoreError>;

    /// Insert or supersede edges keyed by `(from, to, source)`; returns how many were written
    async fn upsert_edges_batch(&self, edges: Vec<TrustEdge>) -> Result<usize, StoreError>;

    /// Persist global trust values onto nodes (last write wins)
    async fn store_scores(&self, scores: &TrustVector) -> Result<usize, StoreError>;

    async fn get_stats(&self) -> Result<GraphStats, StoreError>;

    async fn get_node(&self, address: &str) -> Result<Option<Node>, StoreError>;

    /// Externally designated trust anchors
    async fn pre_trusted(&self) -> Result<HashSet<NodeId>, StoreError>;
}

/// Thread-safe reference to an edge store
pub type SharedStore = Arc<dyn EdgeStore>;
