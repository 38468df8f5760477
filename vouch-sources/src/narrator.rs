//! Text interpretation layer
//!
//! Turns score records, paths and connection sets into prose. Purely
//! downstream of the engine: nothing here feeds back into scoring.

use async_trait::async_trait;
use tracing::{debug, warn};

use vouch_core::{DirectConnections, EdgeStrength, GraphPath, PathStrength, ScoreResult};

use crate::SharedBackend;

const NARRATOR_SYSTEM_PROMPT: &str = r#"
You explain blockchain address reputation reports to non-specialists.

Rules:
1. Use only the facts in the report; never invent numbers or addresses
2. Lead with the overall verdict, then the strongest supporting factors
3. Mention low confidence explicitly when confidence is below 0.6
4. At most 5 sentences, plain text, no markdown

Report:
"#;

/// Produces human-facing explanations
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn explain_score(&self, result: &ScoreResult) -> String;

    async fn explain_path(&self, from: &str, to: &str, path: Option<&GraphPath>) -> String;

    async fn explain_connections(&self, address: &str, connections: &DirectConnections) -> String;
}

/// Deterministic, template-based narration
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn score_text(&self, result: &ScoreResult) -> String {
        let mut text = format!(
            "{} scores {}/100 on {} ({} trust, confidence {:.2}).",
            result.address, result.score, result.chain, result.level, result.confidence
        );

        if result.factors.is_empty() {
            text.push_str(" No reputation data was found for this address.");
        }

        let mut factors: Vec<_> = result.factors.iter().collect();
        factors.sort_by(|a, b| (b.score * b.weight).total_cmp(&(a.score * a.weight)));
        for factor in factors {
            text.push_str(&format!(
                "\n- {} [{}]: {:.0}/100 (weight {:.2}) - {}",
                factor.name, factor.source, factor.score, factor.weight, factor.description
            ));
        }

        if let Some(graph) = &result.graph {
            text.push_str(&format!(
                "\nNeighborhood: {} nodes, {} edges, {} iterations{}.",
                graph.node_count,
                graph.edge_count,
                graph.iterations,
                if graph.converged { "" } else { " (did not converge)" }
            ));
        }

        if !result.degraded_sources.is_empty() {
            let names: Vec<String> = result.degraded_sources.iter().map(|s| s.to_string()).collect();
            text.push_str(&format!("\nUnavailable sources: {}.", names.join(", ")));
        }

        text
    }

    pub fn path_text(&self, from: &str, to: &str, path: Option<&GraphPath>) -> String {
        let Some(path) = path else {
            return format!("No trust path from {} to {} within the hop limit.", from, to);
        };

        let mut text = format!(
            "{} trust path ({} hops, mean weight {:.2}): {}",
            capitalize(&PathStrength::classify(path).to_string()),
            path.hops,
            path.total_weight,
            path.nodes.join(" -> ")
        );
        for edge in &path.edges {
            text.push_str(&format!(
                "\n- {} -> {}: {} ({:.2}, via {})",
                edge.from,
                edge.to,
                EdgeStrength::classify(edge.weight),
                edge.weight,
                edge.source
            ));
        }
        text
    }

    pub fn connections_text(&self, address: &str, connections: &DirectConnections) -> String {
        format!(
            "{} is trusted by {} address(es) and trusts {} address(es).",
            address,
            connections.trustors.len(),
            connections.trustees.len()
        )
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl Narrator for TemplateNarrator {
    async fn explain_score(&self, result: &ScoreResult) -> String {
        self.score_text(result)
    }

    async fn explain_path(&self, from: &str, to: &str, path: Option<&GraphPath>) -> String {
        self.path_text(from, to, path)
    }

    async fn explain_connections(&self, address: &str, connections: &DirectConnections) -> String {
        self.connections_text(address, connections)
    }
}

/// LLM-written narration; falls back to the template text when the backend fails
pub struct LlmNarrator {
    backend: SharedBackend,
    fallback: TemplateNarrator,
}

impl LlmNarrator {
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            fallback: TemplateNarrator,
        }
    }

    async fn rewrite(&self, report: String) -> String {
        debug!("Narrating with {}", self.backend.model_name());
        match self.backend.generate(NARRATOR_SYSTEM_PROMPT, &report).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Narration backend failed, using template: {}", e);
                report
            }
        }
    }
}

#[async_trait]
impl Narrator for LlmNarrator {
    async fn explain_score(&self, result: &ScoreResult) -> String {
        self.rewrite(self.fallback.score_text(result)).await
    }

    async fn explain_path(&self, from: &str, to: &str, path: Option<&GraphPath>) -> String {
        self.rewrite(self.fallback.path_text(from, to, path)).await
    }

    async fn explain_connections(&self, address: &str, connections: &DirectConnections) -> String {
        self.rewrite(self.fallback.connections_text(address, connections))
            .await
    }
}
