//! Collaborator contracts and the data they return

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use vouch_core::{NodeId, TrustEdge};

/// Errors from external collaborators
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// One attestation about a subject address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationData {
    pub attester: NodeId,
    pub subject: NodeId,
    #[serde(default)]
    pub predicate: String,
    /// Sentiment in [-1, 1]
    pub value: f64,
    #[serde(default)]
    pub stake: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl AttestationData {
    pub fn sentiment(&self) -> f64 {
        if self.value.is_nan() {
            0.0
        } else {
            self.value.clamp(-1.0, 1.0)
        }
    }

    /// The trust edge this attestation asserts: attester -> subject
    pub fn to_edge(&self) -> TrustEdge {
        let source = if self.predicate.is_empty() {
            "attestation".to_string()
        } else {
            format!("attestation:{}", self.predicate)
        };
        TrustEdge::new(&self.attester, &self.subject, self.sentiment(), &source).at(self.created_at)
    }
}

/// Aggregate account data from the attestation registry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    pub attestation_count: u32,
    pub total_staked: f64,
}

/// On-chain history summary for one address on one chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub transaction_count: u32,
    pub unique_interactions: u32,
    pub contracts_deployed: u32,
    pub age_days: u32,
}

/// Supplier of attestations
#[async_trait]
pub trait AttestationSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_attestations_for_address(
        &self,
        address: &str,
    ) -> Result<Vec<AttestationData>, SourceError>;

    /// `None` when the registry has no account for the address
    async fn get_account_stats(&self, address: &str) -> Result<Option<AccountStats>, SourceError>;
}

/// Supplier of on-chain activity
#[async_trait]
pub trait ActivitySource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_activity(&self, address: &str, chain: &str) -> Result<ActivityStats, SourceError>;
}

pub type SharedAttestationSource = Arc<dyn AttestationSource>;
pub type SharedActivitySource = Arc<dyn ActivitySource>;

/// Score for `value` from a table of `(minimum, score)` rows in ascending order
pub(crate) fn tier(value: f64, table: &[(f64, f64)]) -> f64 {
    table
        .iter()
        .rev()
        .find(|(minimum, _)| value >= *minimum)
        .map(|(_, score)| *score)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_lookup() {
        let table = [(1.0, 20.0), (10.0, 50.0), (100.0, 100.0)];
        assert_eq!(tier(0.0, &table), 0.0);
        assert_eq!(tier(1.0, &table), 20.0);
        assert_eq!(tier(99.0, &table), 50.0);
        assert_eq!(tier(1000.0, &table), 100.0);
    }

    #[test]
    fn test_attestation_to_edge() {
        let attestation = AttestationData {
            attester: "0xAAA".to_string(),
            subject: "0xBBB".to_string(),
            predicate: "trusts".to_string(),
            value: 1.7,
            stake: 0.0,
            created_at: Utc::now(),
        };

        let edge = attestation.to_edge();
        assert_eq!(edge.from, "0xaaa");
        assert_eq!(edge.to, "0xbbb");
        assert_eq!(edge.weight, 1.0);
        assert_eq!(edge.source, "attestation:trusts");
        assert_eq!(edge.timestamp, attestation.created_at);
    }

    #[test]
    fn test_negative_attestation_keeps_sign() {
        let attestation: AttestationData =
            serde_json::from_str(r#"{"attester":"a","subject":"b","value":-0.5}"#).unwrap();
        assert_eq!(attestation.to_edge().weight, -0.5);
        assert_eq!(attestation.to_edge().source, "attestation");
    }
}
