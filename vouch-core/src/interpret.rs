//! Qualitative labels for edges and paths
//!
//! Presentation heuristics only; nothing in the solver or path finder
//! depends on them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::GraphPath;

/// Strength of a single trust edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStrength {
    Strong,
    Moderate,
    Weak,
}

impl EdgeStrength {
    pub fn classify(weight: f64) -> Self {
        if weight >= 0.7 {
            EdgeStrength::Strong
        } else if weight >= 0.4 {
            EdgeStrength::Moderate
        } else {
            EdgeStrength::Weak
        }
    }
}

impl fmt::Display for EdgeStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EdgeStrength::Strong => "strong",
            EdgeStrength::Moderate => "moderate",
            EdgeStrength::Weak => "weak",
        })
    }
}

/// How direct a trust path is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStrength {
    /// At most two hops with mean weight >= 0.6
    Strong,
    /// At most three hops
    Moderate,
    Indirect,
}

impl PathStrength {
    pub fn classify(path: &GraphPath) -> Self {
        if path.hops <= 2 && path.total_weight >= 0.6 {
            PathStrength::Strong
        } else if path.hops <= 3 {
            PathStrength::Moderate
        } else {
            PathStrength::Indirect
        }
    }
}

impl fmt::Display for PathStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathStrength::Strong => "strong",
            PathStrength::Moderate => "moderate",
            PathStrength::Indirect => "long/indirect",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrustEdge;

    fn path(weights: &[f64]) -> GraphPath {
        let edges = weights
            .iter()
            .enumerate()
            .map(|(i, w)| TrustEdge::new(&format!("n{}", i), &format!("n{}", i + 1), *w, "test"))
            .collect();
        GraphPath::from_edges(edges).unwrap()
    }

    #[test]
    fn test_edge_strength_thresholds() {
        assert_eq!(EdgeStrength::classify(0.7), EdgeStrength::Strong);
        assert_eq!(EdgeStrength::classify(0.69), EdgeStrength::Moderate);
        assert_eq!(EdgeStrength::classify(0.4), EdgeStrength::Moderate);
        assert_eq!(EdgeStrength::classify(0.39), EdgeStrength::Weak);
        assert_eq!(EdgeStrength::classify(-1.0), EdgeStrength::Weak);
    }

    #[test]
    fn test_path_strength() {
        assert_eq!(PathStrength::classify(&path(&[0.9, 0.5])), PathStrength::Strong);
        assert_eq!(PathStrength::classify(&path(&[0.5, 0.5])), PathStrength::Moderate);
        assert_eq!(PathStrength::classify(&path(&[0.9, 0.9, 0.9])), PathStrength::Moderate);
        assert_eq!(PathStrength::classify(&path(&[0.9, 0.9, 0.9, 0.9])), PathStrength::Indirect);
    }
}
