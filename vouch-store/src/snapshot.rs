//! JSON snapshot persistence for the in-memory store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use vouch_core::{NodeId, TrustEdge};

use crate::StoreError;

/// On-disk form of the trust graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub edges: Vec<TrustEdge>,
    #[serde(default)]
    pub pre_trusted: Vec<NodeId>,
    /// Global trust values from the last full recomputation
    #[serde(default)]
    pub scores: BTreeMap<NodeId, f64>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl GraphSnapshot {
    /// Load a snapshot; a missing file is an empty graph
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)?;
        info!(
            "Loaded {} edges from {}",
            snapshot.edges.len(),
            path.display()
        );
        Ok(snapshot)
    }

    /// Write the snapshot via a temporary file and rename
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        self.saved_at = Some(Utc::now());

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;

        info!("Saved {} edges to {}", self.edges.len(), path.display());
        Ok(())
    }

    /// Parse a bare JSON array of edges, or a full snapshot object
    pub fn parse_edges(content: &str) -> Result<Vec<TrustEdge>, StoreError> {
        match serde_json::from_str::<Vec<TrustEdge>>(content) {
            Ok(edges) => Ok(edges),
            Err(_) => Ok(serde_json::from_str::<Self>(content)?.edges),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EdgeStore, MemoryEdgeStore};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("vouch-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let snapshot = GraphSnapshot::load(temp_path("missing")).unwrap();
        assert!(snapshot.edges.is_empty());
        assert!(snapshot.saved_at.is_none());
    }

    #[tokio::test]
    async fn test_save_and_reload_store() {
        let path = temp_path("roundtrip");

        let store = MemoryEdgeStore::new();
        store
            .upsert_edges_batch(vec![
                TrustEdge::new("a", "b", 0.8, "test"),
                TrustEdge::new("b", "c", -0.3, "test"),
            ])
            .await
            .unwrap();
        store.mark_pre_trusted(["a"]);

        let mut snapshot = store.to_snapshot();
        snapshot.save(&path).unwrap();

        let restored = MemoryEdgeStore::from_snapshot(GraphSnapshot::load(&path).unwrap());
        assert_eq!(restored.get_all_edges().await.unwrap(), store.get_all_edges().await.unwrap());
        assert!(restored.pre_trusted().await.unwrap().contains("a"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_parse_edges_accepts_array_or_snapshot() {
        let array = r#"[{"from":"a","to":"b","weight":1.0}]"#;
        assert_eq!(GraphSnapshot::parse_edges(array).unwrap().len(), 1);

        let object = r#"{"edges":[{"from":"a","to":"b","weight":1.0,"source":"x"}],"pre_trusted":["a"]}"#;
        assert_eq!(GraphSnapshot::parse_edges(object).unwrap()[0].source, "x");

        assert!(GraphSnapshot::parse_edges("not json").is_err());
    }
}
