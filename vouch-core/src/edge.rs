//! Trust edges and the graph shapes built from them
//!
//! An edge `from -> to` is a directed trust assertion carrying a weight,
//! a provenance tag and an observation time. Negative weights express
//! distrust; propagation only ever sees the weight clamped at zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::normalize_node_id;

/// Node identifier (lowercase address in production, any label in tests)
pub type NodeId = String;

/// Identity of an edge for upsert purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from: NodeId,
    pub to: NodeId,
    pub source: String,
}

/// A directed, weighted trust assertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: f64,
    /// Provenance of the signal (attestation registry, manual import, ...)
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_source() -> String {
    "import".to_string()
}

impl TrustEdge {
    /// Create an edge observed now; endpoints are lowercased
    pub fn new(from: &str, to: &str, weight: f64, source: &str) -> Self {
        Self {
            from: normalize_node_id(from),
            to: normalize_node_id(to),
            weight,
            source: source.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Weight as seen by propagation: negative and non-finite weights become zero
    pub fn propagation_weight(&self) -> f64 {
        if self.weight.is_finite() {
            self.weight.max(0.0)
        } else {
            0.0
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            from: self.from.clone(),
            to: self.to.clone(),
            source: self.source.clone(),
        }
    }

    /// Short content hash of the edge identity
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.from.as_bytes());
        hasher.update(b"->");
        hasher.update(self.to.as_bytes());
        hasher.update(b"#");
        hasher.update(self.source.as_bytes());
        format!("{:x}", hasher.finalize())[..16].to_string()
    }

    /// Whether this observation should replace `existing` under upsert rules
    pub fn supersedes(&self, existing: &TrustEdge) -> bool {
        self.key() == existing.key() && self.timestamp >= existing.timestamp
    }
}

/// A node as derived from the edge set, plus externally supplied state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Only meaningful after a full-graph solver run
    pub global_trust_score: Option<f64>,
    pub is_pre_trusted: bool,
}

/// An ordered walk through the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<TrustEdge>,
    /// Arithmetic mean of the edge weights along the path
    pub total_weight: f64,
    pub hops: usize,
}

impl GraphPath {
    /// Build a path from consecutive edges. Returns `None` if the edges are
    /// empty or do not chain head-to-tail.
    pub fn from_edges(edges: Vec<TrustEdge>) -> Option<Self> {
        let first = edges.first()?;
        let mut nodes = vec![first.from.clone()];
        for edge in &edges {
            if nodes.last() != Some(&edge.from) {
                return None;
            }
            nodes.push(edge.to.clone());
        }

        let total_weight = edges.iter().map(|e| e.weight).sum::<f64>() / edges.len() as f64;
        let hops = edges.len();

        Some(Self {
            nodes,
            edges,
            total_weight,
            hops,
        })
    }

    pub fn source(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }

    pub fn target(&self) -> Option<&str> {
        self.nodes.last().map(String::as_str)
    }
}

/// Bounded induced subgraph around a center node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNeighborhood {
    pub center: NodeId,
    pub nodes: Vec<NodeId>,
    /// Every edge whose endpoints are both in `nodes`
    pub edges: Vec<TrustEdge>,
    pub depth: usize,
}

impl GraphNeighborhood {
    pub fn contains(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }
}

/// Direct trustors (edges into a node) and trustees (edges out of it)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectConnections {
    pub trustors: Vec<NodeId>,
    pub trustees: Vec<NodeId>,
}

/// Edge store size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propagation_weight_clamps() {
        assert_eq!(TrustEdge::new("a", "b", -0.7, "test").propagation_weight(), 0.0);
        assert_eq!(TrustEdge::new("a", "b", f64::NAN, "test").propagation_weight(), 0.0);
        assert_eq!(TrustEdge::new("a", "b", 0.4, "test").propagation_weight(), 0.4);
    }

    #[test]
    fn test_endpoints_lowercased() {
        let edge = TrustEdge::new("0xABC", "0xDEF", 1.0, "test");
        assert_eq!(edge.from, "0xabc");
        assert_eq!(edge.to, "0xdef");
    }

    #[test]
    fn test_fingerprint_ignores_weight() {
        let a = TrustEdge::new("a", "b", 0.2, "registry");
        let b = TrustEdge::new("a", "b", 0.9, "registry");
        let c = TrustEdge::new("a", "b", 0.9, "manual");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_supersedes_requires_newer_same_key() {
        let old = TrustEdge::new("a", "b", 0.2, "registry");
        let newer = TrustEdge::new("a", "b", 0.9, "registry")
            .at(old.timestamp + chrono::Duration::seconds(5));
        let other_source = TrustEdge::new("a", "b", 0.9, "manual")
            .at(old.timestamp + chrono::Duration::seconds(5));

        assert!(newer.supersedes(&old));
        assert!(!old.supersedes(&newer));
        assert!(!other_source.supersedes(&old));
    }

    #[test]
    fn test_deserialize_defaults() {
        let edge: TrustEdge = serde_json::from_str(r#"{"from":"a","to":"b","weight":0.5}"#).unwrap();
        assert_eq!(edge.source, "import");
    }

    #[test]
    fn test_path_from_edges() {
        let path = GraphPath::from_edges(vec![
            TrustEdge::new("a", "b", 0.8, "test"),
            TrustEdge::new("b", "c", 0.4, "test"),
        ])
        .unwrap();

        assert_eq!(path.nodes, vec!["a", "b", "c"]);
        assert_eq!(path.hops, 2);
        assert_eq!(path.edges.len(), path.nodes.len() - 1);
        assert!((path.total_weight - 0.6).abs() < 1e-12);
        assert_eq!(path.source(), Some("a"));
        assert_eq!(path.target(), Some("c"));
    }

    #[test]
    fn test_deserialized_empty_path_has_no_endpoints() {
        let path: GraphPath =
            serde_json::from_str(r#"{"nodes":[],"edges":[],"total_weight":0.0,"hops":0}"#).unwrap();
        assert_eq!(path.source(), None);
        assert_eq!(path.target(), None);
    }

    #[test]
    fn test_path_rejects_broken_chain() {
        assert!(GraphPath::from_edges(vec![]).is_none());
        assert!(GraphPath::from_edges(vec![
            TrustEdge::new("a", "b", 1.0, "test"),
            TrustEdge::new("c", "d", 1.0, "test"),
        ])
        .is_none());
    }
}
