//! Path finding and neighborhood extraction over an edge snapshot
//!
//! All queries are structural: they follow edges regardless of weight.
//! Iteration runs over ordered maps so results are reproducible.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::{DirectConnections, GraphNeighborhood, GraphPath, NodeId, TrustEdge};

/// Which edge orientations a neighborhood walk follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Traversal {
    /// Only `center -> ...` (trustees, their trustees, ...)
    #[default]
    Outgoing,
    /// Only `... -> center` (trustors, their trustors, ...)
    Incoming,
    /// Either orientation
    Both,
}

/// Every distinct endpoint in the edge set
pub fn node_ids(edges: &[TrustEdge]) -> BTreeSet<NodeId> {
    edges
        .iter()
        .flat_map(|e| [e.from.clone(), e.to.clone()])
        .collect()
}

/// Prefer the heavier of two parallel edges; ties go to the smaller source name
fn preferred<'a>(current: &'a TrustEdge, candidate: &'a TrustEdge) -> &'a TrustEdge {
    match candidate.weight.total_cmp(&current.weight) {
        std::cmp::Ordering::Greater => candidate,
        std::cmp::Ordering::Less => current,
        std::cmp::Ordering::Equal if candidate.source < current.source => candidate,
        std::cmp::Ordering::Equal => current,
    }
}

/// Fewest-hop directed path from `from` to `to` using at most `max_hops` edges.
///
/// Returns `None` when no such path exists, when `max_hops` is zero, or when
/// the endpoints coincide (a trivial non-path, not a zero-length path).
pub fn find_path(edges: &[TrustEdge], from: &str, to: &str, max_hops: usize) -> Option<GraphPath> {
    if from == to || max_hops == 0 {
        return None;
    }

    let mut adjacency: BTreeMap<&str, BTreeMap<&str, &TrustEdge>> = BTreeMap::new();
    for edge in edges.iter().filter(|e| !e.is_self_loop()) {
        adjacency
            .entry(edge.from.as_str())
            .or_default()
            .entry(edge.to.as_str())
            .and_modify(|best| *best = preferred(*best, edge))
            .or_insert(edge);
    }

    let mut parent: HashMap<&str, &TrustEdge> = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::from([from]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(from, 0)]);

    while let Some((node, hops)) = queue.pop_front() {
        if hops == max_hops {
            continue;
        }
        let Some(neighbors) = adjacency.get(node) else {
            continue;
        };

        for (&next, &edge) in neighbors {
            if !visited.insert(next) {
                continue;
            }
            parent.insert(next, edge);

            if next == to {
                return GraphPath::from_edges(trace_back(&parent, from, to));
            }
            queue.push_back((next, hops + 1));
        }
    }

    None
}

fn trace_back<'a>(
    parent: &HashMap<&'a str, &'a TrustEdge>,
    from: &'a str,
    to: &'a str,
) -> Vec<TrustEdge> {
    let mut chain = Vec::new();
    let mut cursor = to;
    while cursor != from {
        match parent.get(cursor) {
            Some(&edge) => {
                chain.push(edge.clone());
                cursor = edge.from.as_str();
            }
            None => break,
        }
    }
    chain.reverse();
    chain
}

/// Nodes with an edge into `address` and nodes `address` points to,
/// deduplicated and sorted. Self-loops are not connections.
pub fn direct_connections(edges: &[TrustEdge], address: &str) -> DirectConnections {
    let mut trustors = BTreeSet::new();
    let mut trustees = BTreeSet::new();

    for edge in edges.iter().filter(|e| !e.is_self_loop()) {
        if edge.to == address {
            trustors.insert(edge.from.clone());
        }
        if edge.from == address {
            trustees.insert(edge.to.clone());
        }
    }

    DirectConnections {
        trustors: trustors.into_iter().collect(),
        trustees: trustees.into_iter().collect(),
    }
}

/// Induced subgraph of nodes within `depth` hops of `center`.
///
/// `edges` of the result holds every edge whose endpoints are both inside the
/// node set, not only the edges the walk used, so a solver run on the
/// neighborhood sees reciprocal and cross edges.
pub fn neighborhood(
    edges: &[TrustEdge],
    center: &str,
    depth: usize,
    traversal: Traversal,
) -> GraphNeighborhood {
    let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for edge in edges {
        if matches!(traversal, Traversal::Outgoing | Traversal::Both) {
            adjacency.entry(edge.from.as_str()).or_default().insert(edge.to.as_str());
        }
        if matches!(traversal, Traversal::Incoming | Traversal::Both) {
            adjacency.entry(edge.to.as_str()).or_default().insert(edge.from.as_str());
        }
    }

    let mut order: Vec<&str> = vec![center];
    let mut visited: HashSet<&str> = HashSet::from([center]);
    let mut frontier: Vec<&str> = vec![center];

    for _ in 0..depth {
        let mut next_frontier = Vec::new();
        for node in frontier {
            for &next in adjacency.get(node).into_iter().flatten() {
                if visited.insert(next) {
                    order.push(next);
                    next_frontier.push(next);
                }
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    let induced = edges
        .iter()
        .filter(|e| visited.contains(e.from.as_str()) && visited.contains(e.to.as_str()))
        .cloned()
        .collect();

    GraphNeighborhood {
        center: center.to_string(),
        nodes: order.into_iter().map(str::to_string).collect(),
        edges: induced,
        depth,
    }
}
