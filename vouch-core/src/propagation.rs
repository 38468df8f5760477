//! Global trust propagation
//!
//! Power iteration over the row-stochastic transition matrix of the trust
//! graph, blended with a pre-trust distribution `p` at every step:
//!
//! ```text
//! t(k+1) = (1 - a) * p + a * Cᵀ t(k)
//! ```
//!
//! The matrix is held sparse (one normalized adjacency row per node), so an
//! iteration costs O(edges). Rows with no positive outgoing weight are
//! dangling and spread their mass uniformly over every node, which keeps the
//! trust vector summing to one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use crate::{
    FactorSource, NodeId, TrustEdge, TrustFactor, DEFAULT_DECAY, DEFAULT_MAX_ITERATIONS,
    DEFAULT_THRESHOLD, MAX_SCORE,
};

/// Node id -> non-negative trust; sums to ~1 for any non-empty graph
pub type TrustVector = HashMap<NodeId, f64>;

/// Solver parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Weight of the network's transitive opinion vs. the pre-trust baseline (0.0 - 1.0)
    pub decay: f64,
    /// Stop once the L1 distance between successive iterates drops below this
    pub threshold: f64,
    /// Hard cap on iterations; hitting it reports `converged = false`
    pub max_iterations: usize,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            decay: DEFAULT_DECAY,
            threshold: DEFAULT_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl PropagationConfig {
    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay.clamp(0.0, 1.0);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.max(0.0);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Same config with out-of-range values pulled back into range
    fn sanitized(self) -> Self {
        let decay = if self.decay.is_finite() {
            self.decay.clamp(0.0, 1.0)
        } else {
            DEFAULT_DECAY
        };
        let threshold = if self.threshold.is_finite() {
            self.threshold.max(0.0)
        } else {
            DEFAULT_THRESHOLD
        };
        Self {
            decay,
            threshold,
            max_iterations: self.max_iterations,
        }
    }
}

/// Output of one solver run. Never mutated after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationResult {
    pub scores: TrustVector,
    pub iterations: usize,
    pub converged: bool,
}

impl PropagationResult {
    /// "Nothing to score": distinct from a failed run
    pub fn empty() -> Self {
        Self {
            scores: TrustVector::new(),
            iterations: 0,
            converged: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Trust value for a node, or 0 when the node is not in the result
    pub fn score_for(&self, node: &str) -> f64 {
        self.scores.get(node).copied().unwrap_or(0.0)
    }

    /// The `n` highest-scoring nodes, descending; ties ordered by node id
    pub fn top_n(&self, n: usize) -> Vec<(NodeId, f64)> {
        let mut ranked: Vec<(NodeId, f64)> = self
            .scores
            .iter()
            .map(|(id, score)| (id.clone(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    pub fn max_score(&self) -> f64 {
        self.scores.values().copied().fold(0.0, f64::max)
    }

    pub fn total_mass(&self) -> f64 {
        self.scores.values().sum()
    }

    /// Rescale a node's value from `[0, max observed]` to `[0, 100]`.
    ///
    /// Only comparable within this result.
    pub fn normalized_score(&self, node: &str) -> f64 {
        let max = self.max_score();
        if max <= 0.0 {
            return 0.0;
        }
        (self.score_for(node) / max * MAX_SCORE).clamp(0.0, MAX_SCORE)
    }

    /// Graph-derived trust factor for `node`, if the node took part in the run
    pub fn trust_factor(&self, node: &str, weight: f64) -> Option<TrustFactor> {
        let raw = *self.scores.get(node)?;
        let normalized = self.normalized_score(node);
        Some(TrustFactor::new(
            "Network Trust",
            normalized,
            weight,
            &format!(
                "Propagated trust {:.4} across {} nodes ({} iterations{})",
                raw,
                self.scores.len(),
                self.iterations,
                if self.converged { "" } else { ", not converged" }
            ),
            FactorSource::Graph,
        ))
    }
}

/// Sparse row-normalized transition matrix
struct TransitionMatrix {
    rows: Vec<Vec<(usize, f64)>>,
    dangling: Vec<usize>,
}

impl TransitionMatrix {
    fn build(edges: &[TrustEdge], index: &HashMap<&str, usize>) -> Self {
        let n = index.len();
        let mut raw: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];

        for edge in edges {
            if edge.is_self_loop() {
                continue;
            }
            let weight = edge.propagation_weight();
            if weight <= 0.0 {
                continue;
            }
            let (Some(&i), Some(&j)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
            else {
                continue;
            };
            // Parallel edges from different sources add up
            *raw[i].entry(j).or_insert(0.0) += weight;
        }

        let mut rows = Vec::with_capacity(n);
        let mut dangling = Vec::new();

        for (i, row) in raw.into_iter().enumerate() {
            let sum: f64 = row.values().sum();
            if sum == 0.0 || !sum.is_finite() {
                dangling.push(i);
                rows.push(Vec::new());
            } else {
                rows.push(row.into_iter().map(|(j, w)| (j, w / sum)).collect());
            }
        }

        Self { rows, dangling }
    }

    /// `out = Cᵀ t`, with dangling rows treated as uniform
    fn propagate(&self, t: &[f64], out: &mut [f64]) {
        let n = out.len();
        let dangling_mass: f64 = self.dangling.iter().map(|&i| t[i]).sum();
        let spread = dangling_mass / n as f64;

        out.iter_mut().for_each(|v| *v = spread);
        for (i, row) in self.rows.iter().enumerate() {
            let mass = t[i];
            if mass == 0.0 {
                continue;
            }
            for &(j, w) in row {
                out[j] += w * mass;
            }
        }
    }
}

/// Iterative global-trust solver. Pure and synchronous; every call owns its
/// own matrix, so one solver can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct TrustSolver {
    config: PropagationConfig,
}

impl TrustSolver {
    pub fn new(config: PropagationConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Compute global trust over `edges`, anchored on `pre_trusted`
    /// (uniform pre-trust when the set is empty).
    pub fn compute(&self, edges: &[TrustEdge], pre_trusted: &HashSet<NodeId>) -> PropagationResult {
        let ids: Vec<&str> = edges
            .iter()
            .flat_map(|e| [e.from.as_str(), e.to.as_str()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if ids.is_empty() {
            return PropagationResult::empty();
        }

        let n = ids.len();
        let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let matrix = TransitionMatrix::build(edges, &index);
        let pre_trust = pre_trust_vector(&ids, pre_trusted);

        let decay = self.config.decay;
        let mut current = pre_trust.clone();
        let mut next = vec![0.0; n];
        let mut iterations = 0;
        let mut converged = false;
        let mut delta = f64::INFINITY;

        while iterations < self.config.max_iterations {
            matrix.propagate(&current, &mut next);
            for (value, p) in next.iter_mut().zip(&pre_trust) {
                *value = (1.0 - decay) * p + decay * *value;
            }

            delta = current.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
            std::mem::swap(&mut current, &mut next);
            iterations += 1;

            if delta < self.config.threshold {
                converged = true;
                break;
            }
        }

        if converged {
            debug!(
                "Trust propagation converged: {} nodes, {} dangling, {} iterations",
                n,
                matrix.dangling.len(),
                iterations
            );
        } else {
            warn!(
                "Trust propagation did not converge: {} nodes, {} iterations, last delta {:.2e}",
                n, iterations, delta
            );
        }

        let scores = ids
            .into_iter()
            .zip(current)
            .map(|(id, score)| (id.to_string(), score))
            .collect();

        PropagationResult {
            scores,
            iterations,
            converged,
        }
    }
}

/// Pre-trust distribution: uniform over the pre-trusted nodes present in the
/// graph, or uniform over every node when none are
fn pre_trust_vector(ids: &[&str], pre_trusted: &HashSet<NodeId>) -> Vec<f64> {
    let anchored = ids.iter().filter(|id| pre_trusted.contains(**id)).count();

    if anchored == 0 {
        let uniform = 1.0 / ids.len() as f64;
        return vec![uniform; ids.len()];
    }

    let share = 1.0 / anchored as f64;
    ids.iter()
        .map(|id| if pre_trusted.contains(*id) { share } else { 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn edge(from: &str, to: &str, weight: f64) -> TrustEdge {
        TrustEdge::new(from, to, weight, "test")
    }

    fn solve(edges: &[TrustEdge]) -> PropagationResult {
        TrustSolver::default().compute(edges, &HashSet::new())
    }

    fn solve_with(edges: &[TrustEdge], pre_trusted: &[&str]) -> PropagationResult {
        let set = pre_trusted.iter().map(|s| s.to_string()).collect();
        TrustSolver::default().compute(edges, &set)
    }

    fn assert_mass_conserved(result: &PropagationResult) {
        let total = result.total_mass();
        assert!((total - 1.0).abs() < 1e-6, "mass drifted to {}", total);
    }

    #[test]
    fn test_empty_graph() {
        let result = solve(&[]);
        assert!(result.scores.is_empty());
        assert_eq!(result.iterations, 0);
        assert!(result.converged);
    }

    #[test]
    fn test_mass_conservation_fixed_graphs() {
        let graphs = vec![
            vec![edge("a", "b", 1.0)],
            vec![edge("a", "b", 1.0), edge("b", "c", 0.5), edge("c", "a", 0.2)],
            vec![edge("a", "b", -1.0), edge("b", "b", 3.0)],
            vec![edge("a", "b", 0.3), edge("c", "d", 0.9), edge("d", "c", 0.1)],
        ];

        for edges in graphs {
            assert_mass_conserved(&solve(&edges));
        }
    }

    #[test]
    fn test_mass_conservation_random_graphs() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..25 {
            let nodes = rng.gen_range(2..30);
            let edge_count = rng.gen_range(1..80);
            let edges: Vec<TrustEdge> = (0..edge_count)
                .map(|_| {
                    let from = format!("n{}", rng.gen_range(0..nodes));
                    let to = format!("n{}", rng.gen_range(0..nodes));
                    edge(&from, &to, rng.gen_range(-1.0..2.0))
                })
                .collect();

            let pre_trusted: HashSet<NodeId> = if rng.gen_bool(0.5) {
                HashSet::from([format!("n{}", rng.gen_range(0..nodes))])
            } else {
                HashSet::new()
            };

            let result = TrustSolver::default().compute(&edges, &pre_trusted);
            assert_mass_conserved(&result);
            assert!(result.scores.values().all(|v| v.is_finite() && *v >= 0.0));
        }
    }

    #[test]
    fn test_three_cycle_is_symmetric() {
        let result = solve(&[edge("a", "b", 1.0), edge("b", "c", 1.0), edge("c", "a", 1.0)]);

        let a = result.score_for("a");
        assert!((a - result.score_for("b")).abs() < 0.05);
        assert!((a - result.score_for("c")).abs() < 0.05);
        assert!(result.converged);
    }

    #[test]
    fn test_hub_with_reciprocal_trustors() {
        let result = solve(&[
            edge("a", "hub", 1.0),
            edge("b", "hub", 1.0),
            edge("c", "hub", 1.0),
            edge("hub", "a", 1.0),
            edge("hub", "b", 1.0),
            edge("hub", "c", 1.0),
        ]);

        let hub = result.score_for("hub");
        for trustor in ["a", "b", "c"] {
            assert!(hub > result.score_for(trustor));
        }
    }

    #[test]
    fn test_pre_trust_raises_score() {
        let edges = [edge("a", "b", 1.0), edge("b", "c", 1.0), edge("c", "a", 1.0)];

        let baseline = solve(&edges);
        let anchored = solve_with(&edges, &["a"]);

        assert!(anchored.score_for("a") > baseline.score_for("a"));
        assert_mass_conserved(&anchored);
    }

    #[test]
    fn test_unknown_pre_trusted_falls_back_to_uniform() {
        let edges = [edge("a", "b", 1.0), edge("b", "c", 0.5)];

        let baseline = solve(&edges);
        let ghost = solve_with(&edges, &["zz"]);

        assert_eq!(baseline, ghost);
    }

    #[test]
    fn test_weight_split_favors_heavier_edge() {
        let result = solve(&[edge("a", "b", 0.9), edge("a", "c", 0.1)]);
        assert!(result.score_for("b") > result.score_for("c"));
    }

    #[test]
    fn test_negative_edges_carry_no_mass() {
        let result = solve(&[edge("a", "b", -1.0), edge("a", "c", 1.0)]);

        let b = result.score_for("b");
        assert!(b.is_finite());
        assert!(b > 0.0);
        assert!(result.score_for("c") > b);
    }

    #[test]
    fn test_negative_only_edge_uses_dangling_fallback() {
        let result = solve(&[edge("a", "b", -0.8)]);

        let b = result.score_for("b");
        assert!(!b.is_nan());
        assert!((b - 0.5).abs() < 1e-9);
        assert_mass_conserved(&result);
    }

    #[test]
    fn test_self_loops_ignored() {
        let with_loop = solve(&[edge("a", "a", 5.0), edge("a", "b", 1.0), edge("b", "a", 1.0)]);
        let without = solve(&[edge("a", "b", 1.0), edge("b", "a", 1.0)]);

        assert_eq!(with_loop, without);
    }

    #[test]
    fn test_parallel_edges_summed() {
        let result = solve(&[
            TrustEdge::new("a", "b", 0.5, "registry"),
            TrustEdge::new("a", "b", 0.5, "manual"),
            edge("a", "c", 1.0),
        ]);

        assert!((result.score_for("b") - result.score_for("c")).abs() < 1e-9);
    }

    #[test]
    fn test_top_n_sorted_descending() {
        let result = solve(&[
            edge("a", "d", 1.0),
            edge("b", "d", 1.0),
            edge("c", "d", 1.0),
            edge("d", "a", 1.0),
        ]);

        let top = result.top_n(3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].0, "d");
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_top_n_ties_are_stable() {
        let result = solve(&[edge("a", "b", 1.0), edge("b", "c", 1.0), edge("c", "a", 1.0)]);

        let first = result.top_n(10);
        let second = result.top_n(10);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_score_for_unknown_is_zero() {
        let result = solve(&[edge("a", "b", 1.0)]);
        assert_eq!(result.score_for("nobody"), 0.0);
        assert_eq!(PropagationResult::empty().score_for("nobody"), 0.0);
    }

    #[test]
    fn test_ring_converges() {
        let edges: Vec<TrustEdge> = (0..20)
            .map(|i| edge(&format!("n{}", i), &format!("n{}", (i + 1) % 20), 1.0))
            .collect();

        let result = solve(&edges);
        assert!(result.converged);
        assert!(result.iterations <= DEFAULT_MAX_ITERATIONS);
        assert_eq!(result.scores.len(), 20);
    }

    #[test]
    fn test_star_scenario() {
        let result = solve(&[
            edge("a", "d", 1.0),
            edge("b", "d", 1.0),
            edge("c", "d", 1.0),
            edge("d", "a", 1.0),
        ]);

        assert!(result.score_for("d") > result.score_for("a"));
        assert!(result.score_for("d") > result.score_for("b"));
    }

    #[test]
    fn test_non_convergence_reported() {
        let solver = TrustSolver::new(PropagationConfig::default().with_max_iterations(1));
        let result = solver.compute(&[edge("a", "b", 1.0), edge("c", "b", 1.0)], &HashSet::new());

        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
        assert_mass_conserved(&result);
    }

    #[test]
    fn test_deterministic() {
        let edges = [edge("x", "y", 0.3), edge("y", "z", 0.7), edge("z", "x", 0.1), edge("x", "z", 0.9)];
        assert_eq!(solve(&edges), solve(&edges));
    }

    #[test]
    fn test_normalized_and_factor() {
        let result = solve(&[
            edge("a", "d", 1.0),
            edge("b", "d", 1.0),
            edge("c", "d", 1.0),
            edge("d", "a", 1.0),
        ]);

        assert!((result.normalized_score("d") - 100.0).abs() < 1e-9);
        assert!(result.normalized_score("b") < 100.0);

        let factor = result.trust_factor("d", 0.4).unwrap();
        assert_eq!(factor.source, FactorSource::Graph);
        assert!((factor.score - 100.0).abs() < 1e-9);
        assert!(result.trust_factor("missing", 0.4).is_none());
    }

    #[test]
    fn test_config_sanitized() {
        let config = PropagationConfig {
            decay: 3.0,
            threshold: f64::NAN,
            max_iterations: 10,
        };
        let solver = TrustSolver::new(config);
        assert_eq!(solver.config().decay, 1.0);
        assert_eq!(solver.config().threshold, DEFAULT_THRESHOLD);
    }
}
