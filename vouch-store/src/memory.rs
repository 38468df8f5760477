//! In-memory edge store
//!
//! Edges live behind a read-write lock keyed by `(from, to, source)`; global
//! scores sit in a concurrent map so recomputations can write them without
//! blocking readers of the edge set.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use vouch_core::{
    direct_connections, find_path, neighborhood, node_ids, normalize_node_id, DirectConnections,
    EdgeKey, GraphNeighborhood, GraphPath, GraphStats, Node, NodeId, Traversal, TrustEdge,
    TrustVector,
};

use crate::{EdgeStore, GraphSnapshot, StoreError};

/// Edge store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryEdgeStore {
    edges: RwLock<HashMap<EdgeKey, TrustEdge>>,
    scores: DashMap<NodeId, f64>,
    pre_trusted: RwLock<HashSet<NodeId>>,
}

impl MemoryEdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted snapshot
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let store = Self::new();
        store.upsert(snapshot.edges);
        store.mark_pre_trusted(snapshot.pre_trusted.iter().map(String::as_str));
        for (node, score) in snapshot.scores {
            store.scores.insert(normalize_node_id(&node), score);
        }
        store
    }

    /// Capture the current state for persistence
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let mut pre_trusted: Vec<NodeId> = self.pre_trusted.read().iter().cloned().collect();
        pre_trusted.sort();

        GraphSnapshot {
            edges: self.snapshot(),
            pre_trusted,
            scores: self
                .scores
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            saved_at: None,
        }
    }

    /// Add nodes to the pre-trusted set
    pub fn mark_pre_trusted<'a>(&self, nodes: impl IntoIterator<Item = &'a str>) {
        let mut pre_trusted = self.pre_trusted.write();
        pre_trusted.extend(nodes.into_iter().map(normalize_node_id));
    }

    /// Edges sorted by key, so solver input order is stable
    fn snapshot(&self) -> Vec<TrustEdge> {
        let edges = self.edges.read();
        let mut keys: Vec<&EdgeKey> = edges.keys().collect();
        keys.sort();
        keys.into_iter().map(|key| edges[key].clone()).collect()
    }

    fn upsert(&self, incoming: Vec<TrustEdge>) -> usize {
        let mut edges = self.edges.write();
        let mut written = 0;

        for mut edge in incoming {
            edge.from = normalize_node_id(&edge.from);
            edge.to = normalize_node_id(&edge.to);

            let key = edge.key();
            let replace = match edges.get(&key) {
                Some(existing) => edge.supersedes(existing),
                None => true,
            };
            if replace {
                edges.insert(key, edge);
                written += 1;
            } else {
                debug!("Ignoring stale edge {}", edge.fingerprint());
            }
        }

        written
    }
}

#[async_trait]
impl EdgeStore for MemoryEdgeStore {
    async fn get_all_edges(&self) -> Result<Vec<TrustEdge>, StoreError> {
        Ok(self.snapshot())
    }

    async fn get_neighborhood(
        &self,
        address: &str,
        depth: usize,
        traversal: Traversal,
    ) -> Result<GraphNeighborhood, StoreError> {
        let center = normalize_node_id(address);
        Ok(neighborhood(&self.snapshot(), &center, depth, traversal))
    }

    async fn find_trust_path(
        &self,
        from: &str,
        to: &str,
        max_hops: usize,
    ) -> Result<Option<GraphPath>, StoreError> {
        let from = normalize_node_id(from);
        let to = normalize_node_id(to);
        Ok(find_path(&self.snapshot(), &from, &to, max_hops))
    }

    async fn get_direct_connections(&self, address: &str) -> Result<DirectConnections, StoreError> {
        let address = normalize_node_id(address);
        Ok(direct_connections(&self.snapshot(), &address))
    }

    async fn upsert_edges_batch(&self, edges: Vec<TrustEdge>) -> Result<usize, StoreError> {
        let received = edges.len();
        let written = self.upsert(edges);
        debug!("Upserted {}/{} edges", written, received);
        Ok(written)
    }

    async fn store_scores(&self, scores: &TrustVector) -> Result<usize, StoreError> {
        for (node, score) in scores {
            self.scores.insert(normalize_node_id(node), *score);
        }
        Ok(scores.len())
    }

    async fn get_stats(&self) -> Result<GraphStats, StoreError> {
        let edges = self.snapshot();
        Ok(GraphStats {
            node_count: node_ids(&edges).len(),
            edge_count: edges.len(),
        })
    }

    async fn get_node(&self, address: &str) -> Result<Option<Node>, StoreError> {
        let id = normalize_node_id(address);
        let known = self
            .edges
            .read()
            .values()
            .any(|e| e.from == id || e.to == id);

        if !known {
            return Ok(None);
        }

        Ok(Some(Node {
            global_trust_score: self.scores.get(&id).map(|s| *s),
            is_pre_trusted: self.pre_trusted.read().contains(&id),
            id,
        }))
    }

    async fn pre_trusted(&self) -> Result<HashSet<NodeId>, StoreError> {
        Ok(self.pre_trusted.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn edge(from: &str, to: &str, weight: f64) -> TrustEdge {
        TrustEdge::new(from, to, weight, "test")
    }

    #[tokio::test]
    async fn test_upsert_supersedes_same_key() {
        let store = MemoryEdgeStore::new();
        let first = edge("a", "b", 0.2);
        let later = edge("a", "b", 0.9).at(first.timestamp + Duration::seconds(10));

        assert_eq!(store.upsert_edges_batch(vec![first.clone()]).await.unwrap(), 1);
        assert_eq!(store.upsert_edges_batch(vec![later]).await.unwrap(), 1);
        // Older observation never overwrites a newer one
        assert_eq!(store.upsert_edges_batch(vec![first]).await.unwrap(), 0);

        let edges = store.get_all_edges().await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 0.9);
    }

    #[tokio::test]
    async fn test_distinct_sources_coexist() {
        let store = MemoryEdgeStore::new();
        store
            .upsert_edges_batch(vec![
                TrustEdge::new("a", "b", 0.2, "registry"),
                TrustEdge::new("a", "b", 0.7, "manual"),
            ])
            .await
            .unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.node_count, 2);
    }

    #[tokio::test]
    async fn test_lookups_are_case_insensitive() {
        let store = MemoryEdgeStore::new();
        let mut raw = edge("a", "b", 1.0);
        raw.from = "0xABC".to_string();
        raw.to = "0xDEF".to_string();
        store.upsert_edges_batch(vec![raw]).await.unwrap();

        let connections = store.get_direct_connections("0XdEf").await.unwrap();
        assert_eq!(connections.trustors, vec!["0xabc"]);

        let path = store.find_trust_path("0xAbc", "0xDeF", 1).await.unwrap();
        assert!(path.is_some());
    }

    #[tokio::test]
    async fn test_neighborhood_and_path() {
        let store = MemoryEdgeStore::new();
        store
            .upsert_edges_batch(vec![edge("a", "b", 1.0), edge("b", "c", 1.0), edge("c", "a", 1.0)])
            .await
            .unwrap();

        let n = store.get_neighborhood("a", 1, Traversal::Outgoing).await.unwrap();
        assert_eq!(n.nodes, vec!["a", "b"]);

        let path = store.find_trust_path("a", "c", 2).await.unwrap().unwrap();
        assert_eq!(path.hops, 2);
        assert!(store.find_trust_path("a", "c", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_scores_and_get_node() {
        let store = MemoryEdgeStore::new();
        store.upsert_edges_batch(vec![edge("a", "b", 1.0)]).await.unwrap();
        store.mark_pre_trusted(["A"]);

        let scores = TrustVector::from([("a".to_string(), 0.4), ("b".to_string(), 0.6)]);
        assert_eq!(store.store_scores(&scores).await.unwrap(), 2);

        let node = store.get_node("A").await.unwrap().unwrap();
        assert_eq!(node.global_trust_score, Some(0.4));
        assert!(node.is_pre_trusted);

        let b = store.get_node("b").await.unwrap().unwrap();
        assert!(!b.is_pre_trusted);

        assert!(store.get_node("zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scores_last_write_wins() {
        let store = MemoryEdgeStore::new();
        store.upsert_edges_batch(vec![edge("a", "b", 1.0)]).await.unwrap();

        store.store_scores(&TrustVector::from([("a".to_string(), 0.1)])).await.unwrap();
        store.store_scores(&TrustVector::from([("a".to_string(), 0.3)])).await.unwrap();

        let node = store.get_node("a").await.unwrap().unwrap();
        assert_eq!(node.global_trust_score, Some(0.3));
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryEdgeStore::new();
        assert!(store.get_all_edges().await.unwrap().is_empty());
        assert_eq!(store.get_stats().await.unwrap(), GraphStats::default());
        assert!(store.pre_trusted().await.unwrap().is_empty());
    }
}
