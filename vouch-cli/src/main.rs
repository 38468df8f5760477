//! Vouch CLI
//!
//! Graph-propagated reputation scoring for on-chain addresses.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use vouch_core::EdgeStrength;
use vouch_runtime::{ScoreAggregator, VouchConfig};
use vouch_sources::{
    create_backend, BackendConfig, EtherscanActivitySource, HttpAttestationSource, LlmNarrator,
    LlmProvider, Narrator, SharedAttestationSource, StaticAttestationSource, TemplateNarrator,
};
use vouch_store::{EdgeStore, GraphSnapshot, MemoryEdgeStore};

#[derive(Parser)]
#[command(name = "vouch")]
#[command(author, version, about = "Vouch: graph-propagated address reputation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Trust graph snapshot (JSON)
    #[arg(short, long, global = true, default_value = "vouch-graph.json")]
    graph: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, default_value = "vouch.toml")]
    config: PathBuf,

    /// Verbosity level (0-3)
    #[arg(short, long, global = true, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Score an address from graph, attestation and on-chain signals
    Score {
        /// Address to score (0x + 40 hex chars)
        address: String,

        /// Chain for on-chain activity lookups
        #[arg(long, default_value = "ethereum")]
        chain: String,

        /// Neighborhood depth (default from config)
        #[arg(short, long)]
        depth: Option<usize>,

        /// Attestations from a local JSON file instead of the API
        #[arg(long)]
        attestations: Option<PathBuf>,

        /// Skip network-backed sources
        #[arg(long)]
        offline: bool,

        /// Print the full score record as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        narration: NarrationArgs,
    },

    /// Find the fewest-hop trust path between two addresses
    Path {
        from: String,
        to: String,

        /// Maximum hops (default from config)
        #[arg(long)]
        max_hops: Option<usize>,

        #[command(flatten)]
        narration: NarrationArgs,
    },

    /// List who trusts an address and whom it trusts
    Connections {
        address: String,

        #[command(flatten)]
        narration: NarrationArgs,
    },

    /// Recompute global trust over the whole graph and save it
    Recompute {
        /// Number of top nodes to print
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Show graph statistics
    Stats,

    /// Import trust edges from a JSON file into the snapshot
    Import {
        /// JSON array of edges, or a snapshot object
        #[arg(required_unless_present = "attestations")]
        file: Option<PathBuf>,

        /// Attestation file whose attestations become attester -> subject edges
        #[arg(long)]
        attestations: Option<PathBuf>,

        /// Mark addresses as pre-trusted anchors
        #[arg(long)]
        pre_trusted: Vec<String>,
    },
}

#[derive(Args)]
struct NarrationArgs {
    /// Print a plain-language explanation
    #[arg(long)]
    explain: bool,

    /// Write the explanation with an LLM instead of the template
    #[arg(long, requires = "explain")]
    llm: bool,

    /// LLM model to use
    #[arg(short, long, default_value = "claude-sonnet-4-20250514")]
    model: String,

    /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_key: Option<String>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_key: Option<String>,

    /// OpenRouter API key (or set OPENROUTER_API_KEY env var)
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    openrouter_key: Option<String>,

    /// Use OpenAI instead of Anthropic
    #[arg(long)]
    openai: bool,

    /// Use OpenRouter instead of Anthropic
    #[arg(long)]
    openrouter: bool,
}

impl NarrationArgs {
    fn narrator(&self) -> Result<Option<Box<dyn Narrator>>> {
        if !self.explain {
            return Ok(None);
        }
        if !self.llm {
            return Ok(Some(Box::new(TemplateNarrator)));
        }

        // Default: Anthropic
        let (provider, key, var) = if self.openrouter {
            (LlmProvider::OpenRouter, &self.openrouter_key, "OPENROUTER_API_KEY")
        } else if self.openai {
            (LlmProvider::OpenAi, &self.openai_key, "OPENAI_API_KEY")
        } else {
            (LlmProvider::Anthropic, &self.anthropic_key, "ANTHROPIC_API_KEY")
        };
        let key = key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("{:?} API key required. Set {}", provider, var))?;

        let backend = create_backend(BackendConfig::new(provider, key, &self.model))?;
        Ok(Some(Box::new(LlmNarrator::new(backend))))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = VouchConfig::load(&cli.config)?;
    let store = Arc::new(MemoryEdgeStore::from_snapshot(GraphSnapshot::load(&cli.graph)?));

    match cli.command {
        Commands::Score {
            address,
            chain,
            depth,
            attestations,
            offline,
            json,
            narration,
        } => {
            let narrator = narration.narrator()?;
            let mut aggregator = ScoreAggregator::new(store, &config);

            if let Some(source) = attestation_source(&config, attestations.as_deref(), offline)? {
                aggregator = aggregator.with_attestation_source(source);
            }
            if !offline {
                let activity = EtherscanActivitySource::new(config.activity.clone())?;
                aggregator = aggregator.with_activity_source(Arc::new(activity));
            }

            let result = aggregator.score(&address, &chain, depth).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("📊 {} on {}", result.address, result.chain);
                println!("   Score: {}/100 ({})", result.score, result.level);
                println!("   Confidence: {:.2}", result.confidence);
                for factor in &result.factors {
                    println!(
                        "   - {} [{}]: {:.0} (weight {:.2})",
                        factor.name, factor.source, factor.score, factor.weight
                    );
                }
                if !result.degraded_sources.is_empty() {
                    println!("⚠️  Degraded sources: {:?}", result.degraded_sources);
                }
            }

            if let Some(narrator) = narrator {
                println!("\n{}", narrator.explain_score(&result).await);
            }
        }
        Commands::Path {
            from,
            to,
            max_hops,
            narration,
        } => {
            let narrator = narration.narrator()?;
            let aggregator = ScoreAggregator::new(store, &config);
            let path = aggregator.find_trust_path(&from, &to, max_hops).await?;

            match &path {
                Some(path) => {
                    println!("🔗 {} hops (mean weight {:.2})", path.hops, path.total_weight);
                    for edge in &path.edges {
                        println!(
                            "   {} -> {} {:.2} ({}, via {})",
                            edge.from,
                            edge.to,
                            edge.weight,
                            EdgeStrength::classify(edge.weight),
                            edge.source
                        );
                    }
                }
                None => println!("❌ No trust path within the hop limit"),
            }

            if let Some(narrator) = narrator {
                println!("\n{}", narrator.explain_path(&from, &to, path.as_ref()).await);
            }
        }
        Commands::Connections { address, narration } => {
            let narrator = narration.narrator()?;
            let aggregator = ScoreAggregator::new(store, &config);
            let connections = aggregator.direct_connections(&address).await?;

            println!("⬅️  Trusted by ({}):", connections.trustors.len());
            for trustor in &connections.trustors {
                println!("   {}", trustor);
            }
            println!("➡️  Trusts ({}):", connections.trustees.len());
            for trustee in &connections.trustees {
                println!("   {}", trustee);
            }

            if let Some(narrator) = narrator {
                println!("\n{}", narrator.explain_connections(&address, &connections).await);
            }
        }
        Commands::Recompute { top } => {
            let aggregator = ScoreAggregator::new(store.clone(), &config);
            let result = aggregator.recompute_global_scores().await?;

            if !result.converged {
                warn!("Stopped after {} iterations without converging", result.iterations);
            }
            println!(
                "🌐 {} nodes, {} iterations (converged: {})",
                result.scores.len(),
                result.iterations,
                result.converged
            );
            for (rank, (node, score)) in result.top_n(top).into_iter().enumerate() {
                println!("   {:>3}. {} {:.6}", rank + 1, node, score);
            }

            save(&store, &cli.graph)?;
        }
        Commands::Stats => {
            let stats = store.get_stats().await?;
            let pre_trusted = store.pre_trusted().await?;
            println!("📊 Graph: {}", cli.graph.display());
            println!("   Nodes: {}", stats.node_count);
            println!("   Edges: {}", stats.edge_count);
            println!("   Pre-trusted: {}", pre_trusted.len());
        }
        Commands::Import {
            file,
            attestations,
            pre_trusted,
        } => {
            let mut edges = Vec::new();
            if let Some(file) = &file {
                let content = std::fs::read_to_string(file)?;
                let imported = GraphSnapshot::parse_edges(&content)?;
                info!("Read {} edges from {}", imported.len(), file.display());
                edges.extend(imported);
            }
            if let Some(path) = &attestations {
                let attested = StaticAttestationSource::from_file(path)?.edges();
                info!("Read {} attestation edges from {}", attested.len(), path.display());
                edges.extend(attested);
            }
            let received = edges.len();

            let written = store.upsert_edges_batch(edges).await?;
            store.mark_pre_trusted(pre_trusted.iter().map(String::as_str));
            info!("Imported {}/{} edges", written, received);

            let stats = store.get_stats().await?;
            println!(
                "✅ Imported {} of {} edges ({} nodes, {} edges total)",
                written, received, stats.node_count, stats.edge_count
            );

            save(&store, &cli.graph)?;
        }
    }

    Ok(())
}

/// Local file beats the configured API; offline runs without a file get none
fn attestation_source(
    config: &VouchConfig,
    file: Option<&Path>,
    offline: bool,
) -> Result<Option<SharedAttestationSource>> {
    if let Some(file) = file {
        return Ok(Some(Arc::new(StaticAttestationSource::from_file(file)?)));
    }
    if offline || config.attestation.base_url.is_none() {
        return Ok(None);
    }
    Ok(Some(Arc::new(HttpAttestationSource::new(
        config.attestation.clone(),
    )?)))
}

fn save(store: &MemoryEdgeStore, path: &Path) -> Result<()> {
    store.to_snapshot().save(path)?;
    println!("💾 Saved {}", path.display());
    Ok(())
}
