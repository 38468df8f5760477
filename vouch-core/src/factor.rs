//! Trust factors and the final score record
//!
//! Every data source (graph, attestations, on-chain activity) contributes
//! zero or more weighted factors; the aggregator folds them into one score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::{Address, MAX_SCORE, MIN_SCORE};

/// Data-source category a factor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorSource {
    Graph,
    Attestation,
    OnChain,
}

impl fmt::Display for FactorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FactorSource::Graph => "graph",
            FactorSource::Attestation => "attestation",
            FactorSource::OnChain => "on_chain",
        };
        f.write_str(name)
    }
}

/// One weighted input to the final score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustFactor {
    pub name: String,
    /// 0 - 100
    pub score: f64,
    /// 0 - 1; weights need not sum to 1 across factors
    pub weight: f64,
    pub description: String,
    pub source: FactorSource,
}

impl TrustFactor {
    pub fn new(name: &str, score: f64, weight: f64, description: &str, source: FactorSource) -> Self {
        Self {
            name: name.to_string(),
            score: clamp_or(score, MIN_SCORE, MAX_SCORE),
            weight: clamp_or(weight, 0.0, 1.0),
            description: description.to_string(),
            source,
        }
    }
}

fn clamp_or(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// Weight-weighted average of factor scores, rounded; 0 without factors
pub fn combine_factors(factors: &[TrustFactor]) -> u32 {
    let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
    if factors.is_empty() || total_weight <= 0.0 {
        return 0;
    }

    let weighted: f64 = factors.iter().map(|f| f.score * f.weight).sum();
    (weighted / total_weight).round().clamp(MIN_SCORE, MAX_SCORE) as u32
}

/// Number of distinct source categories that produced at least one factor
pub fn contributing_sources(factors: &[TrustFactor]) -> usize {
    factors
        .iter()
        .map(|f| f.source)
        .collect::<BTreeSet<_>>()
        .len()
}

/// Confidence from source coverage alone
pub fn confidence_for(sources: usize) -> f64 {
    match sources {
        0 => 0.1,
        1 => 0.5,
        2 => 0.75,
        _ => 0.95,
    }
}

/// Qualitative tier of a final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Unknown,
    Suspicious,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl TrustLevel {
    /// Tier lower bounds are inclusive: 10 is suspicious, 85 is very high
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=9 => TrustLevel::Unknown,
            10..=29 => TrustLevel::Suspicious,
            30..=49 => TrustLevel::Low,
            50..=69 => TrustLevel::Moderate,
            70..=84 => TrustLevel::High,
            _ => TrustLevel::VeryHigh,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrustLevel::Unknown => "unknown",
            TrustLevel::Suspicious => "suspicious",
            TrustLevel::Low => "low",
            TrustLevel::Moderate => "moderate",
            TrustLevel::High => "high",
            TrustLevel::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the neighborhood solver run looked like for the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub raw_score: f64,
    pub normalized_score: f64,
    pub node_count: usize,
    pub edge_count: usize,
    pub iterations: usize,
    pub converged: bool,
}

/// Final reputation record for one address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub id: Uuid,
    pub address: Address,
    pub chain: String,
    /// 0 - 100
    pub score: u32,
    pub level: TrustLevel,
    pub confidence: f64,
    pub factors: Vec<TrustFactor>,
    pub graph: Option<GraphSummary>,
    /// Collaborators that failed during this run
    pub degraded_sources: Vec<FactorSource>,
    pub computed_at: DateTime<Utc>,
}

impl ScoreResult {
    /// Fold factors into a score, level and confidence
    pub fn from_factors(
        address: Address,
        chain: &str,
        factors: Vec<TrustFactor>,
        graph: Option<GraphSummary>,
        degraded_sources: Vec<FactorSource>,
    ) -> Self {
        let score = combine_factors(&factors);
        let confidence = confidence_for(contributing_sources(&factors));

        Self {
            id: Uuid::new_v4(),
            address,
            chain: chain.to_string(),
            score,
            level: TrustLevel::from_score(score),
            confidence,
            factors,
            graph,
            degraded_sources,
            computed_at: Utc::now(),
        }
    }

    pub fn factors_from(&self, source: FactorSource) -> impl Iterator<Item = &TrustFactor> {
        self.factors.iter().filter(move |f| f.source == source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(score: f64, weight: f64, source: FactorSource) -> TrustFactor {
        TrustFactor::new("test", score, weight, "", source)
    }

    #[test]
    fn test_combine_weighted_average() {
        let factors = vec![
            factor(80.0, 0.4, FactorSource::Graph),
            factor(50.0, 0.2, FactorSource::Attestation),
        ];
        // (32 + 10) / 0.6 = 70
        assert_eq!(combine_factors(&factors), 70);
    }

    #[test]
    fn test_combine_rounds_to_nearest() {
        let factors = vec![factor(66.5, 1.0, FactorSource::Graph)];
        assert_eq!(combine_factors(&factors), 67);
        let factors = vec![factor(66.4, 1.0, FactorSource::Graph)];
        assert_eq!(combine_factors(&factors), 66);
    }

    #[test]
    fn test_combine_empty_is_zero() {
        assert_eq!(combine_factors(&[]), 0);
        assert_eq!(combine_factors(&[factor(90.0, 0.0, FactorSource::Graph)]), 0);
    }

    #[test]
    fn test_factor_clamps() {
        let f = TrustFactor::new("x", 140.0, 2.0, "", FactorSource::OnChain);
        assert_eq!(f.score, 100.0);
        assert_eq!(f.weight, 1.0);
        let f = TrustFactor::new("x", f64::NAN, -1.0, "", FactorSource::OnChain);
        assert_eq!(f.score, 0.0);
        assert_eq!(f.weight, 0.0);
    }

    #[test]
    fn test_level_boundaries_inclusive_lower() {
        assert_eq!(TrustLevel::from_score(0), TrustLevel::Unknown);
        assert_eq!(TrustLevel::from_score(9), TrustLevel::Unknown);
        assert_eq!(TrustLevel::from_score(10), TrustLevel::Suspicious);
        assert_eq!(TrustLevel::from_score(29), TrustLevel::Suspicious);
        assert_eq!(TrustLevel::from_score(30), TrustLevel::Low);
        assert_eq!(TrustLevel::from_score(50), TrustLevel::Moderate);
        assert_eq!(TrustLevel::from_score(69), TrustLevel::Moderate);
        assert_eq!(TrustLevel::from_score(70), TrustLevel::High);
        assert_eq!(TrustLevel::from_score(84), TrustLevel::High);
        assert_eq!(TrustLevel::from_score(85), TrustLevel::VeryHigh);
        assert_eq!(TrustLevel::from_score(100), TrustLevel::VeryHigh);
    }

    #[test]
    fn test_confidence_by_sources() {
        assert_eq!(confidence_for(0), 0.1);
        assert_eq!(confidence_for(1), 0.5);
        assert_eq!(confidence_for(2), 0.75);
        assert_eq!(confidence_for(3), 0.95);
    }

    #[test]
    fn test_contributing_sources_counts_categories() {
        let factors = vec![
            factor(10.0, 0.1, FactorSource::OnChain),
            factor(20.0, 0.1, FactorSource::OnChain),
            factor(30.0, 0.1, FactorSource::Attestation),
        ];
        assert_eq!(contributing_sources(&factors), 2);
    }

    #[test]
    fn test_score_result_from_factors() {
        let address = Address::parse("0x742d35cc6634c0532925a3b844bc9e7595f2bd1e").unwrap();
        let result = ScoreResult::from_factors(
            address,
            "ethereum",
            vec![
                factor(90.0, 0.4, FactorSource::Graph),
                factor(90.0, 0.3, FactorSource::Attestation),
                factor(90.0, 0.1, FactorSource::OnChain),
            ],
            None,
            vec![],
        );

        assert_eq!(result.score, 90);
        assert_eq!(result.level, TrustLevel::VeryHigh);
        assert_eq!(result.confidence, 0.95);
        assert_eq!(result.factors_from(FactorSource::Graph).count(), 1);
    }

    #[test]
    fn test_score_result_without_factors() {
        let address = Address::parse("0x742d35cc6634c0532925a3b844bc9e7595f2bd1e").unwrap();
        let result = ScoreResult::from_factors(address, "ethereum", vec![], None, vec![FactorSource::Graph]);

        assert_eq!(result.score, 0);
        assert_eq!(result.level, TrustLevel::Unknown);
        assert_eq!(result.confidence, 0.1);
    }
}
