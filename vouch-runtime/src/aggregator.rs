//! Score Aggregator
//!
//! Fans out to the three data sources (graph, attestations, on-chain
//! activity), waits for all of them and folds whatever came back into one
//! score. A failing source is logged and recorded as degraded; it never
//! aborts the other two.

use thiserror::Error;
use tracing::{debug, info, warn};

use vouch_core::{
    validate_path_endpoints, Address, CoreError, DirectConnections, FactorSource, GraphPath,
    GraphSummary, PropagationResult, ScoreResult, TrustFactor, TrustSolver,
};
use vouch_sources::{
    activity_factors, attestation_factors, SharedActivitySource, SharedAttestationSource,
    SourceError,
};
use vouch_store::{SharedStore, StoreError};

use crate::{ScoringConfig, VouchConfig};

/// Errors surfaced by the aggregator
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Graph factors for one target, plus the run that produced them
type GraphOutcome = (Vec<TrustFactor>, Option<GraphSummary>);

/// Combines graph, attestation and activity signals into address scores
pub struct ScoreAggregator {
    store: SharedStore,
    attestations: Option<SharedAttestationSource>,
    activity: Option<SharedActivitySource>,
    solver: TrustSolver,
    scoring: ScoringConfig,
}

impl ScoreAggregator {
    /// Create an aggregator over `store`; external sources are attached separately
    pub fn new(store: SharedStore, config: &VouchConfig) -> Self {
        Self {
            store,
            attestations: None,
            activity: None,
            solver: TrustSolver::new(config.propagation),
            scoring: config.scoring,
        }
    }

    pub fn with_attestation_source(mut self, source: SharedAttestationSource) -> Self {
        info!("Attestation source: {}", source.name());
        self.attestations = Some(source);
        self
    }

    pub fn with_activity_source(mut self, source: SharedActivitySource) -> Self {
        info!("Activity source: {}", source.name());
        self.activity = Some(source);
        self
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Score `target` on `chain`, using a neighborhood of `depth` hops
    /// (configured default when `None`).
    pub async fn score(
        &self,
        target: &str,
        chain: &str,
        depth: Option<usize>,
    ) -> Result<ScoreResult, AggregatorError> {
        let address = Address::parse(target)?;
        let depth = depth.unwrap_or(self.scoring.default_depth);
        debug!("Scoring {} on {} (depth {})", address, chain, depth);

        let (graph, attestations, activity) = tokio::join!(
            self.graph_factors(&address, depth),
            self.attestation_factors(&address),
            self.activity_factors(&address, chain),
        );

        let mut factors = Vec::new();
        let mut summary = None;
        let mut degraded = Vec::new();

        match graph {
            Ok((graph_factors, graph_summary)) => {
                factors.extend(graph_factors);
                summary = graph_summary;
            }
            Err(e) => {
                warn!("Graph source failed for {}: {}", address, e);
                degraded.push(FactorSource::Graph);
            }
        }

        match attestations {
            Ok(attestation_factors) => factors.extend(attestation_factors),
            Err(e) => {
                warn!("Attestation source failed for {}: {}", address, e);
                degraded.push(FactorSource::Attestation);
            }
        }

        match activity {
            Ok(activity_factors) => factors.extend(activity_factors),
            Err(e) => {
                warn!("Activity source failed for {} on {}: {}", address, chain, e);
                degraded.push(FactorSource::OnChain);
            }
        }

        let result = ScoreResult::from_factors(address, chain, factors, summary, degraded);
        info!(
            "Scored {}: {} ({}, confidence {:.2}, {} factors)",
            result.address.short(),
            result.score,
            result.level,
            result.confidence,
            result.factors.len()
        );
        Ok(result)
    }

    /// Solve over the whole graph and write the vector back onto nodes.
    ///
    /// The write-back is best effort: a failed write is logged and the
    /// computed result is still returned.
    pub async fn recompute_global_scores(&self) -> Result<PropagationResult, AggregatorError> {
        let edges = self.store.get_all_edges().await?;
        let pre_trusted = self.store.pre_trusted().await?;

        let result = self.solver.compute(&edges, &pre_trusted);
        info!(
            "Global recomputation: {} nodes from {} edges, {} iterations (converged: {})",
            result.scores.len(),
            edges.len(),
            result.iterations,
            result.converged
        );

        if !result.is_empty() {
            match self.store.store_scores(&result.scores).await {
                Ok(written) => debug!("Stored {} global scores", written),
                Err(e) => warn!("Failed to store global scores: {}", e),
            }
        }

        Ok(result)
    }

    /// Fewest-hop trust path; malformed or identical endpoints are rejected
    pub async fn find_trust_path(
        &self,
        from: &str,
        to: &str,
        max_hops: Option<usize>,
    ) -> Result<Option<GraphPath>, AggregatorError> {
        let (from, to) = validate_path_endpoints(from, to)?;
        let max_hops = max_hops.unwrap_or(self.scoring.default_max_hops);

        let path = self
            .store
            .find_trust_path(from.as_str(), to.as_str(), max_hops)
            .await?;
        match &path {
            Some(path) => debug!("Path {} -> {}: {} hops", from.short(), to.short(), path.hops),
            None => debug!("No path {} -> {} within {} hops", from.short(), to.short(), max_hops),
        }
        Ok(path)
    }

    pub async fn direct_connections(
        &self,
        address: &str,
    ) -> Result<DirectConnections, AggregatorError> {
        let address = Address::parse(address)?;
        Ok(self.store.get_direct_connections(address.as_str()).await?)
    }

    async fn graph_factors(&self, address: &Address, depth: usize) -> Result<GraphOutcome, StoreError> {
        let neighborhood = self
            .store
            .get_neighborhood(address.as_str(), depth, self.scoring.traversal)
            .await?;
        // Distrust and self-loops carry no mass; without a positive edge the
        // solver would only echo the pre-trust vector
        let carries_trust = neighborhood
            .edges
            .iter()
            .any(|e| !e.is_self_loop() && e.propagation_weight() > 0.0);
        if !carries_trust {
            debug!("{} has no positive trust edges in reach", address);
            return Ok((Vec::new(), None));
        }

        let pre_trusted = self.store.pre_trusted().await?;
        let result = self.solver.compute(&neighborhood.edges, &pre_trusted);

        let Some(factor) = result.trust_factor(address.as_str(), self.scoring.graph_weight) else {
            return Ok((Vec::new(), None));
        };

        let summary = GraphSummary {
            raw_score: result.score_for(address.as_str()),
            normalized_score: factor.score,
            node_count: result.scores.len(),
            edge_count: neighborhood.edges.len(),
            iterations: result.iterations,
            converged: result.converged,
        };
        Ok((vec![factor], Some(summary)))
    }

    async fn attestation_factors(&self, address: &Address) -> Result<Vec<TrustFactor>, SourceError> {
        let Some(source) = &self.attestations else {
            return Ok(Vec::new());
        };

        let (attestations, account) = tokio::try_join!(
            source.fetch_attestations_for_address(address.as_str()),
            source.get_account_stats(address.as_str()),
        )?;
        debug!(
            "{}: {} attestations for {}",
            source.name(),
            attestations.len(),
            address.short()
        );
        Ok(attestation_factors(&attestations, account.as_ref()))
    }

    async fn activity_factors(
        &self,
        address: &Address,
        chain: &str,
    ) -> Result<Vec<TrustFactor>, SourceError> {
        let Some(source) = &self.activity else {
            return Ok(Vec::new());
        };

        let stats = source.fetch_activity(address.as_str(), chain).await?;
        debug!(
            "{}: {} transactions for {} on {}",
            source.name(),
            stats.transaction_count,
            address.short(),
            chain
        );
        Ok(activity_factors(&stats, chain))
    }
}
