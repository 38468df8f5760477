//! On-chain activity collaborator
//!
//! Summarizes an address's transaction history from an Etherscan-compatible
//! explorer and scores it with fixed tables.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use vouch_core::{normalize_node_id, FactorSource, TrustFactor};

use crate::traits::{tier, ActivitySource, ActivityStats, SourceError};

const TX_TABLE: &[(f64, f64)] = &[(1.0, 20.0), (10.0, 40.0), (50.0, 60.0), (100.0, 80.0), (500.0, 100.0)];
const DIVERSITY_TABLE: &[(f64, f64)] = &[(1.0, 20.0), (5.0, 40.0), (20.0, 60.0), (50.0, 80.0), (100.0, 100.0)];
const AGE_TABLE: &[(f64, f64)] = &[(1.0, 20.0), (30.0, 40.0), (90.0, 60.0), (180.0, 80.0), (365.0, 100.0)];
const DEPLOY_TABLE: &[(f64, f64)] = &[(1.0, 60.0), (5.0, 80.0), (10.0, 100.0)];

/// Derive on-chain factors; an address with no transactions yields none
pub fn activity_factors(stats: &ActivityStats, chain: &str) -> Vec<TrustFactor> {
    if stats.transaction_count == 0 {
        return Vec::new();
    }

    let mut factors = vec![
        TrustFactor::new(
            "Transaction History",
            tier(stats.transaction_count as f64, TX_TABLE),
            0.1,
            &format!("{} transactions on {}", stats.transaction_count, chain),
            FactorSource::OnChain,
        ),
        TrustFactor::new(
            "Interaction Diversity",
            tier(stats.unique_interactions as f64, DIVERSITY_TABLE),
            0.05,
            &format!("{} distinct counterparties", stats.unique_interactions),
            FactorSource::OnChain,
        ),
        TrustFactor::new(
            "Account Age",
            tier(stats.age_days as f64, AGE_TABLE),
            0.1,
            &format!("First seen {} days ago", stats.age_days),
            FactorSource::OnChain,
        ),
    ];

    if stats.contracts_deployed > 0 {
        factors.push(TrustFactor::new(
            "Contract Deployment",
            tier(stats.contracts_deployed as f64, DEPLOY_TABLE),
            0.05,
            &format!("{} contracts deployed", stats.contracts_deployed),
            FactorSource::OnChain,
        ));
    }

    factors
}

/// Configuration for explorer access
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Etherscan API key (optional, increases rate limits)
    pub etherscan_api_key: Option<String>,
    pub timeout_secs: u64,
    /// Chain name -> explorer API endpoint
    pub explorers: BTreeMap<String, String>,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        let explorers = [
            ("ethereum", "https://api.etherscan.io/api"),
            ("base", "https://api.basescan.org/api"),
            ("arbitrum", "https://api.arbiscan.io/api"),
            ("optimism", "https://api-optimistic.etherscan.io/api"),
            ("polygon", "https://api.polygonscan.com/api"),
        ]
        .into_iter()
        .map(|(chain, url)| (chain.to_string(), url.to_string()))
        .collect();

        Self {
            etherscan_api_key: std::env::var("ETHERSCAN_API_KEY").ok(),
            timeout_secs: 30,
            explorers,
        }
    }
}

/// Activity source backed by Etherscan-compatible explorers
pub struct EtherscanActivitySource {
    config: ActivityConfig,
    client: Client,
}

impl EtherscanActivitySource {
    pub fn new(config: ActivityConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("vouch/0.1")
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn explorer(&self, chain: &str) -> Result<&str, SourceError> {
        self.config
            .explorers
            .get(&chain.to_ascii_lowercase())
            .map(String::as_str)
            .ok_or_else(|| SourceError::NotConfigured(format!("no explorer for chain {}", chain)))
    }
}

#[async_trait]
impl ActivitySource for EtherscanActivitySource {
    fn name(&self) -> &str {
        "etherscan"
    }

    async fn fetch_activity(&self, address: &str, chain: &str) -> Result<ActivityStats, SourceError> {
        let address = normalize_node_id(address);
        let api_key = self.config.etherscan_api_key.as_deref().unwrap_or("");

        let url = format!(
            "{}?module=account&action=txlist&address={}&startblock=0&endblock=99999999&sort=asc&apikey={}",
            self.explorer(chain)?,
            address,
            api_key
        );

        let response: ExplorerResponse = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Explorer error: {}", e)))?
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse explorer response: {}", e)))?;

        let txs = response.into_transactions()?;
        debug!("Explorer returned {} transactions on {}", txs.len(), chain);

        Ok(summarize_transactions(&address, &txs, chrono::Utc::now().timestamp()))
    }
}

/// Reduce a transaction list to activity stats as of `now` (unix seconds)
pub fn summarize_transactions(address: &str, txs: &[ExplorerTx], now: i64) -> ActivityStats {
    let address = normalize_node_id(address);
    let mut counterparties = HashSet::new();
    let mut contracts_deployed = 0u32;

    for tx in txs {
        let from = normalize_node_id(&tx.from);
        let to = tx.to.as_deref().map(normalize_node_id).unwrap_or_default();

        let deployed = from == address && (to.is_empty() || !tx.contract_address.is_empty());
        if deployed {
            contracts_deployed += 1;
        }

        let other = if from == address { to } else { from };
        if !other.is_empty() && other != address {
            counterparties.insert(other);
        }
    }

    let first_seen = txs.iter().filter_map(|tx| tx.time_stamp.parse::<i64>().ok()).min();
    let age_days = first_seen
        .map(|first| ((now - first).max(0) / 86_400) as u32)
        .unwrap_or(0);

    ActivityStats {
        transaction_count: txs.len() as u32,
        unique_interactions: counterparties.len() as u32,
        contracts_deployed,
        age_days,
    }
}

/// Explorer envelope; `result` is a list on success and a message otherwise
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

impl ExplorerResponse {
    fn into_transactions(self) -> Result<Vec<ExplorerTx>, SourceError> {
        match self.result {
            serde_json::Value::Array(_) => serde_json::from_value(self.result)
                .map_err(|e| SourceError::Parse(format!("Malformed transaction list: {}", e))),
            _ if self.status == "0" && self.message.starts_with("No transactions") => Ok(Vec::new()),
            other => Err(SourceError::Unavailable(format!(
                "Explorer error ({}): {}",
                self.message, other
            ))),
        }
    }
}

/// One transaction as reported by the explorer
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerTx {
    #[serde(rename = "timeStamp")]
    pub time_stamp: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(rename = "contractAddress", default)]
    pub contract_address: String,
}

/// Activity held in memory, keyed by chain and address
#[derive(Debug, Clone, Default)]
pub struct StaticActivitySource {
    stats: HashMap<(String, String), ActivityStats>,
}

impl StaticActivitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(mut self, chain: &str, address: &str, stats: ActivityStats) -> Self {
        self.stats
            .insert((chain.to_ascii_lowercase(), normalize_node_id(address)), stats);
        self
    }
}

#[async_trait]
impl ActivitySource for StaticActivitySource {
    fn name(&self) -> &str {
        "static-activity"
    }

    async fn fetch_activity(&self, address: &str, chain: &str) -> Result<ActivityStats, SourceError> {
        Ok(self
            .stats
            .get(&(chain.to_ascii_lowercase(), normalize_node_id(address)))
            .copied()
            .unwrap_or_default())
    }
}
