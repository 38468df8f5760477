//! Attestation collaborator
//!
//! Fetches attestations about an address from a knowledge-graph API and
//! turns them into trust factors:
//! - **Attestation Sentiment**: mean sentiment mapped from [-1, 1] to [0, 100]
//! - **Attestation Volume**: how many attestations the address has received
//! - **Stake Backing**: total stake behind the account

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use vouch_core::{normalize_node_id, FactorSource, TrustEdge, TrustFactor};

use crate::traits::{tier, AccountStats, AttestationData, AttestationSource, SourceError};

pub const SENTIMENT_WEIGHT: f64 = 0.3;
pub const VOLUME_WEIGHT: f64 = 0.1;
pub const STAKE_WEIGHT: f64 = 0.1;

const VOLUME_TABLE: &[(f64, f64)] = &[(1.0, 20.0), (5.0, 40.0), (10.0, 60.0), (25.0, 80.0), (50.0, 100.0)];
const STAKE_TABLE: &[(f64, f64)] = &[(f64::MIN_POSITIVE, 30.0), (1.0, 50.0), (10.0, 70.0), (100.0, 90.0)];

/// Derive attestation factors; no attestations and no account means no factors
pub fn attestation_factors(
    attestations: &[AttestationData],
    account: Option<&AccountStats>,
) -> Vec<TrustFactor> {
    let mut factors = Vec::new();

    if !attestations.is_empty() {
        let mean = attestations.iter().map(|a| a.sentiment()).sum::<f64>() / attestations.len() as f64;
        let positive = attestations.iter().filter(|a| a.sentiment() > 0.0).count();
        factors.push(TrustFactor::new(
            "Attestation Sentiment",
            (mean + 1.0) / 2.0 * 100.0,
            SENTIMENT_WEIGHT,
            &format!(
                "{} of {} attestations positive (mean sentiment {:+.2})",
                positive,
                attestations.len(),
                mean
            ),
            FactorSource::Attestation,
        ));
    }

    let count = account
        .map(|a| a.attestation_count as usize)
        .unwrap_or(0)
        .max(attestations.len());
    if count > 0 {
        factors.push(TrustFactor::new(
            "Attestation Volume",
            tier(count as f64, VOLUME_TABLE),
            VOLUME_WEIGHT,
            &format!("{} attestations received", count),
            FactorSource::Attestation,
        ));
    }

    if let Some(account) = account.filter(|a| a.total_staked > 0.0) {
        factors.push(TrustFactor::new(
            "Stake Backing",
            tier(account.total_staked, STAKE_TABLE),
            STAKE_WEIGHT,
            &format!("{:.4} staked on this account", account.total_staked),
            FactorSource::Attestation,
        ));
    }

    factors
}

/// Configuration for the knowledge-graph API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttestationConfig {
    /// API root, e.g. `https://api.example.org/v1`
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Page size for attestation queries
    pub max_results: usize,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("VOUCH_ATTESTATION_URL").ok(),
            api_key: std::env::var("VOUCH_ATTESTATION_KEY").ok(),
            timeout_secs: 30,
            max_results: 100,
        }
    }
}

impl AttestationConfig {
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }
}

/// Attestation source backed by a JSON HTTP API
pub struct HttpAttestationSource {
    config: AttestationConfig,
    base_url: String,
    client: Client,
}

impl HttpAttestationSource {
    pub fn new(config: AttestationConfig) -> Result<Self, SourceError> {
        let base_url = config
            .base_url
            .clone()
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| SourceError::NotConfigured("attestation API base URL".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("vouch/0.1")
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url).header("Accept", "application/json");
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl AttestationSource for HttpAttestationSource {
    fn name(&self) -> &str {
        "attestation-api"
    }

    async fn fetch_attestations_for_address(
        &self,
        address: &str,
    ) -> Result<Vec<AttestationData>, SourceError> {
        let url = format!(
            "{}/attestations?subject={}&limit={}",
            self.base_url,
            urlencoding::encode(&normalize_node_id(address)),
            self.config.max_results
        );

        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Attestation API error: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "Attestation API returned status: {}",
                response.status()
            )));
        }

        let page: AttestationPage = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse attestations: {}", e)))?;

        debug!("Fetched {} attestations", page.attestations.len());
        Ok(page.attestations)
    }

    async fn get_account_stats(&self, address: &str) -> Result<Option<AccountStats>, SourceError> {
        let url = format!(
            "{}/accounts/{}",
            self.base_url,
            urlencoding::encode(&normalize_node_id(address))
        );

        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Attestation API error: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| SourceError::Parse(format!("Failed to parse account stats: {}", e))),
            status => Err(SourceError::Unavailable(format!(
                "Attestation API returned status: {}",
                status
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AttestationPage {
    #[serde(default)]
    attestations: Vec<AttestationData>,
}

/// Attestations held in memory, e.g. loaded from a JSON file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticAttestationSource {
    #[serde(default)]
    attestations: Vec<AttestationData>,
    #[serde(default)]
    accounts: HashMap<String, AccountStats>,
}

impl StaticAttestationSource {
    pub fn new(attestations: Vec<AttestationData>) -> Self {
        Self {
            attestations,
            accounts: HashMap::new(),
        }
    }

    pub fn with_account(mut self, address: &str, stats: AccountStats) -> Self {
        self.accounts.insert(normalize_node_id(address), stats);
        self
    }

    /// Load `{"attestations": [...], "accounts": {"0x..": {...}}}`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", path.as_ref().display(), e)))?;
        let source: Self = serde_json::from_str(&content)
            .map_err(|e| SourceError::Parse(format!("Invalid attestation file: {}", e)))?;
        let accounts = source
            .accounts
            .into_iter()
            .map(|(address, stats)| (normalize_node_id(&address), stats))
            .collect();
        Ok(Self {
            attestations: source.attestations,
            accounts,
        })
    }

    /// Every held attestation as a graph edge, attester -> subject
    pub fn edges(&self) -> Vec<TrustEdge> {
        self.attestations.iter().map(AttestationData::to_edge).collect()
    }
}

#[async_trait]
impl AttestationSource for StaticAttestationSource {
    fn name(&self) -> &str {
        "static-attestations"
    }

    async fn fetch_attestations_for_address(
        &self,
        address: &str,
    ) -> Result<Vec<AttestationData>, SourceError> {
        let subject = normalize_node_id(address);
        Ok(self
            .attestations
            .iter()
            .filter(|a| normalize_node_id(&a.subject) == subject)
            .cloned()
            .collect())
    }

    async fn get_account_stats(&self, address: &str) -> Result<Option<AccountStats>, SourceError> {
        Ok(self.accounts.get(&normalize_node_id(address)).copied())
    }
}
