//! Community detection.
//!
//! This module provides:
//! - Louvain algorithm (multi-level modularity optimization) over the
//!   undirected, weighted projection of the transaction graph
//! - Weakly connected components, used when the graph is too large
//! - Modularity score calculation
//!
//! Community ids are metadata for investigators and the graph view; they do
//! not affect scoring.

use crate::centrality::edge_weight;
use crate::types::TransactionGraph;
use flowtrace_core::config::{CommunityConfig, EdgeWeighting};
use flowtrace_core::detector::{DetectorFamily, DetectorMetadata};
use flowtrace_core::notes::{ProcessingNote, Subsystem};
use flowtrace_core::traits::Detector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Undirected Weighted Graph
// ============================================================================

/// Undirected weighted graph used by Louvain levels.
#[derive(Debug, Clone, Default)]
pub struct WeightedGraph {
    /// Neighbours with edge weight; each edge appears at both endpoints.
    pub adj: Vec<Vec<(usize, f64)>>,
    /// Self-loop weight per node.
    pub self_loops: Vec<f64>,
    /// Total edge weight `m`.
    pub total_weight: f64,
}

impl WeightedGraph {
    /// Collapse the directed graph; `u -> v` and `v -> u` add up.
    #[must_use]
    pub fn from_transactions(graph: &TransactionGraph, weighting: EdgeWeighting) -> Self {
        let n = graph.node_count();
        let mut pairs: Vec<HashMap<usize, f64>> = vec![HashMap::new(); n];
        let mut order: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (e, edge) in graph.edges.iter().enumerate() {
            let w = edge_weight(graph, e, weighting).max(0.0);
            for (a, b) in [(edge.source, edge.target), (edge.target, edge.source)] {
                let slot = pairs[a].entry(b).or_insert_with(|| {
                    order[a].push(b);
                    0.0
                });
                *slot += w;
            }
        }

        let adj: Vec<Vec<(usize, f64)>> = (0..n)
            .map(|a| order[a].iter().map(|&b| (b, pairs[a][&b])).collect())
            .collect();
        let total_weight = adj.iter().flatten().map(|(_, w)| w).sum::<f64>() / 2.0;

        Self {
            adj,
            self_loops: vec![0.0; n],
            total_weight,
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adj.len()
    }

    /// True when there are no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adj.is_empty()
    }

    /// Weighted degree, self-loops counted twice.
    #[must_use]
    pub fn degree(&self, node: usize) -> f64 {
        self.adj[node].iter().map(|(_, w)| w).sum::<f64>() + 2.0 * self.self_loops[node]
    }

    /// Modularity of an assignment.
    ///
    /// Q = Σ_c [ in_c / 2m - (tot_c / 2m)² ]
    #[must_use]
    pub fn modularity(&self, communities: &[usize]) -> f64 {
        let two_m = 2.0 * self.total_weight;
        if two_m <= 0.0 {
            return 0.0;
        }

        let k = communities.iter().copied().max().map_or(0, |c| c + 1);
        let mut internal = vec![0.0; k];
        let mut total = vec![0.0; k];

        for u in 0..self.len() {
            let cu = communities[u];
            total[cu] += self.degree(u);
            internal[cu] += 2.0 * self.self_loops[u];
            for &(v, w) in &self.adj[u] {
                if communities[v] == cu {
                    internal[cu] += w;
                }
            }
        }

        internal
            .iter()
            .zip(&total)
            .map(|(i, t)| i / two_m - (t / two_m).powi(2))
            .sum()
    }

    /// Collapse each community into one node. `communities` must be dense.
    fn aggregate(&self, communities: &[usize], count: usize) -> Self {
        let mut self_loops = vec![0.0; count];
        let mut links: BTreeMap<(usize, usize), f64> = BTreeMap::new();

        for u in 0..self.len() {
            let cu = communities[u];
            self_loops[cu] += self.self_loops[u];
            for &(v, w) in &self.adj[u] {
                let cv = communities[v];
                if cu == cv {
                    self_loops[cu] += w / 2.0;
                } else {
                    *links.entry((cu, cv)).or_insert(0.0) += w;
                }
            }
        }

        let mut adj = vec![Vec::new(); count];
        for ((a, b), w) in links {
            adj[a].push((b, w));
        }

        Self {
            adj,
            self_loops,
            total_weight: self.total_weight,
        }
    }
}

// ============================================================================
// Community Result
// ============================================================================

/// Community assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunityResult {
    /// Community id per node, numbered by first appearance.
    pub assignments: Vec<usize>,
    /// Number of communities.
    pub num_communities: usize,
    /// Modularity of the assignment on the projected graph.
    pub modularity: f64,
    /// Aggregation levels that improved modularity.
    pub levels: usize,
    /// Fallback note, if any.
    pub notes: Vec<ProcessingNote>,
}

// ============================================================================
// Louvain Community Detection Kernel
// ============================================================================

/// Louvain community detector.
#[derive(Debug, Clone)]
pub struct CommunityDetector {
    metadata: DetectorMetadata,
}

impl Default for CommunityDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityDetector {
    /// Create a new community detector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: DetectorMetadata::new("graph/louvain", DetectorFamily::Network)
                .with_description("Louvain modularity clustering on the undirected projection"),
        }
    }

    /// Detect communities.
    pub fn compute(graph: &TransactionGraph, config: &CommunityConfig) -> CommunityResult {
        let n = graph.node_count();
        if n == 0 {
            return CommunityResult::default();
        }

        if n > config.max_nodes {
            let assignments = weakly_connected_components(graph);
            let num_communities = assignments.iter().copied().max().map_or(0, |c| c + 1);
            let note = ProcessingNote::guard_tripped(
                Subsystem::Community,
                format!(
                    "{} accounts exceed the Louvain limit of {}; using weakly connected components",
                    n, config.max_nodes
                ),
            )
            .logged();
            let modularity = WeightedGraph::from_transactions(graph, config.weighting)
                .modularity(&assignments);
            return CommunityResult {
                assignments,
                num_communities,
                modularity,
                levels: 0,
                notes: vec![note],
            };
        }

        let base = WeightedGraph::from_transactions(graph, config.weighting);
        let (assignments, levels) = Self::louvain(&base, config);
        let num_communities = assignments.iter().copied().max().map_or(0, |c| c + 1);
        let modularity = base.modularity(&assignments);

        tracing::debug!(
            communities = num_communities,
            levels,
            modularity,
            "community detection complete"
        );

        CommunityResult {
            assignments,
            num_communities,
            modularity,
            levels,
            notes: Vec::new(),
        }
    }

    /// Multi-level Louvain. Returns dense assignments and the levels run.
    pub fn louvain(base: &WeightedGraph, config: &CommunityConfig) -> (Vec<usize>, usize) {
        let n = base.len();
        let mut assignments: Vec<usize> = (0..n).collect();
        if base.total_weight <= 0.0 {
            return (assignments, 0);
        }

        let mut level_graph = base.clone();
        let mut levels = 0;

        while levels < config.max_levels {
            let (local, moved) = Self::local_moving(&level_graph, config);
            if !moved {
                break;
            }

            let (dense, count) = renumber(&local);
            for c in assignments.iter_mut() {
                *c = dense[*c];
            }
            levels += 1;

            if count == level_graph.len() {
                break;
            }
            level_graph = level_graph.aggregate(&dense, count);
        }

        let (dense, _) = renumber(&assignments);
        (dense, levels)
    }

    /// One level of greedy local moves. Returns the assignment and whether
    /// any node changed community.
    fn local_moving(graph: &WeightedGraph, config: &CommunityConfig) -> (Vec<usize>, bool) {
        let n = graph.len();
        let two_m = 2.0 * graph.total_weight;
        let degrees: Vec<f64> = (0..n).map(|u| graph.degree(u)).collect();

        let mut community: Vec<usize> = (0..n).collect();
        let mut tot: Vec<f64> = degrees.clone();
        let mut link_weight = vec![0.0; n];
        let mut is_touched = vec![false; n];
        let mut touched: Vec<usize> = Vec::new();
        let mut any_move = false;

        for _ in 0..config.max_sweeps {
            let mut moved = false;

            for u in 0..n {
                let cur = community[u];
                let ku = degrees[u];

                for &(v, w) in &graph.adj[u] {
                    let c = community[v];
                    if !is_touched[c] {
                        is_touched[c] = true;
                        touched.push(c);
                    }
                    link_weight[c] += w;
                }

                tot[cur] -= ku;
                let mut best = cur;
                let mut best_gain = link_weight[cur] - tot[cur] * ku / two_m;

                for &c in &touched {
                    if c == cur {
                        continue;
                    }
                    let gain = link_weight[c] - tot[c] * ku / two_m;
                    if gain > best_gain + config.min_gain {
                        best = c;
                        best_gain = gain;
                    }
                }

                tot[best] += ku;
                if best != cur {
                    community[u] = best;
                    moved = true;
                }

                for &c in &touched {
                    link_weight[c] = 0.0;
                    is_touched[c] = false;
                }
                touched.clear();
            }

            if !moved {
                break;
            }
            any_move = true;
        }

        (community, any_move)
    }
}

impl Detector for CommunityDetector {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

/// Renumber labels by first appearance. Returns the map and the count.
fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut map: HashMap<usize, usize> = HashMap::new();
    let dense = labels
        .iter()
        .map(|l| {
            let next = map.len();
            *map.entry(*l).or_insert(next)
        })
        .collect();
    (dense, map.len())
}

/// Weakly connected components, numbered by first appearance.
#[must_use]
pub fn weakly_connected_components(graph: &TransactionGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut component = vec![usize::MAX; n];
    let mut next = 0;
    let mut stack = Vec::new();

    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        component[start] = next;
        stack.push(start);
        while let Some(v) = stack.pop() {
            for w in graph.successors(v).chain(graph.predecessors(v)) {
                if component[w] == usize::MAX {
                    component[w] = next;
                    stack.push(w);
                }
            }
        }
        next += 1;
    }
    component
}
