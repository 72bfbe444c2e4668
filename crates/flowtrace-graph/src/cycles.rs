//! Circular flow detection.
//!
//! Money that leaves an account and returns to it through two to four
//! intermediaries is a classic layering signature. Detection runs in two
//! stages:
//! - Tarjan SCC (iterative) isolates the parts of the graph where any cycle
//!   can exist
//! - Bounded DFS inside each SCC enumerates simple cycles of 3-5 edges
//!
//! Cycles sharing an account are merged into one ring.

use crate::types::TransactionGraph;
use flowtrace_core::config::CycleConfig;
use flowtrace_core::detector::{DetectorFamily, DetectorMetadata};
use flowtrace_core::notes::{ProcessingNote, Subsystem};
use flowtrace_core::traits::Detector;

// ============================================================================
// Strongly Connected Components
// ============================================================================

const UNVISITED: usize = usize::MAX;

/// Tarjan's SCC algorithm with an explicit call stack.
///
/// Each component is sorted ascending; components are ordered by their
/// smallest node.
#[must_use]
pub fn strongly_connected_components(graph: &TransactionGraph) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut call: Vec<(usize, usize)> = Vec::new();
    let mut counter = 0usize;
    let mut sccs = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }

        index[root] = counter;
        lowlink[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;
        call.push((root, 0));

        while let Some(frame) = call.last_mut() {
            let v = frame.0;
            if let Some(&e) = graph.out_edges[v].get(frame.1) {
                frame.1 += 1;
                let w = graph.edges[e].target;
                if index[w] == UNVISITED {
                    index[w] = counter;
                    lowlink[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            call.pop();
            if let Some(&(parent, _)) = call.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }

            if lowlink[v] == index[v] {
                let mut scc = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }
                scc.sort_unstable();
                sccs.push(scc);
            }
        }
    }

    sccs.sort_by_key(|scc| scc[0]);
    sccs
}

// ============================================================================
// Cycle Result
// ============================================================================

/// Output of the cycle detector. All ids are node indices.
#[derive(Debug, Clone, Default)]
pub struct CycleResult {
    /// Enumerated cycles, each starting at its smallest node.
    pub cycles: Vec<Vec<usize>>,
    /// Every account lying on a detected cycle, in detection order.
    pub cycle_nodes: Vec<usize>,
    /// Merged cycle groups, members in detection order.
    pub rings: Vec<Vec<usize>>,
    /// SCCs of at least `min_length` nodes.
    pub components_searched: usize,
    /// Guard events.
    pub notes: Vec<ProcessingNote>,
}

// ============================================================================
// Cycle Detector
// ============================================================================

/// Bounded-length cycle detector.
#[derive(Debug, Clone)]
pub struct CycleDetector {
    metadata: DetectorMetadata,
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleDetector {
    /// Create a new cycle detector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: DetectorMetadata::new("graph/cycles", DetectorFamily::Structural)
                .with_description("Simple cycles of 3-5 hops inside strongly connected components")
                .with_rings(),
        }
    }

    /// Detect cycles.
    pub fn compute(graph: &TransactionGraph, config: &CycleConfig) -> CycleResult {
        let mut result = CycleResult::default();
        let mut in_scc = vec![false; graph.node_count()];
        let mut flagged = vec![false; graph.node_count()];
        // Cleared by backtracking, so one buffer serves every component.
        let mut on_path = vec![false; graph.node_count()];

        for scc in strongly_connected_components(graph) {
            if scc.len() < config.min_length {
                continue;
            }
            result.components_searched += 1;

            for &v in &scc {
                in_scc[v] = true;
            }

            if scc.len() <= config.max_scc_size {
                let mut search = CycleSearch::new(graph, &in_scc, &mut on_path, config);
                for &root in &scc {
                    search.root = root;
                    search.path.push(root);
                    search.on_path[root] = true;
                    search.extend(root);
                    search.on_path[root] = false;
                    search.path.pop();
                    if search.truncated {
                        break;
                    }
                }

                if search.truncated {
                    result.notes.push(
                        ProcessingNote::guard_tripped(
                            Subsystem::Cycles,
                            format!(
                                "cycle enumeration stopped at {} cycles in a component of {} accounts",
                                config.max_cycles_per_scc,
                                scc.len()
                            ),
                        )
                        .logged(),
                    );
                }

                for cycle in &search.found {
                    for &v in cycle {
                        if !flagged[v] {
                            flagged[v] = true;
                            result.cycle_nodes.push(v);
                        }
                    }
                }
                result.cycles.extend(search.found);
            } else {
                let mut hits = 0usize;
                for &v in &scc {
                    if lies_on_short_cycle(graph, &in_scc, v, config) {
                        hits += 1;
                        if !flagged[v] {
                            flagged[v] = true;
                            result.cycle_nodes.push(v);
                        }
                    }
                }
                result.notes.push(
                    ProcessingNote::guard_tripped(
                        Subsystem::Cycles,
                        format!(
                            "component of {} accounts exceeds the exhaustive search limit of {}; \
                             {} accounts flagged by bounded search, no rings formed",
                            scc.len(),
                            config.max_scc_size,
                            hits
                        ),
                    )
                    .logged(),
                );
            }

            for &v in &scc {
                in_scc[v] = false;
            }
        }

        result.rings = merge_cycles(graph.node_count(), &result.cycles);

        tracing::debug!(
            components = result.components_searched,
            cycles = result.cycles.len(),
            accounts = result.cycle_nodes.len(),
            rings = result.rings.len(),
            "cycle detection complete"
        );

        result
    }
}

impl Detector for CycleDetector {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

// ----------------------------------------------------------------------------
// Enumeration
// ----------------------------------------------------------------------------

struct CycleSearch<'a> {
    graph: &'a TransactionGraph,
    in_scc: &'a [bool],
    min_length: usize,
    max_length: usize,
    cap: usize,
    root: usize,
    path: Vec<usize>,
    on_path: &'a mut [bool],
    found: Vec<Vec<usize>>,
    truncated: bool,
}

impl<'a> CycleSearch<'a> {
    fn new(
        graph: &'a TransactionGraph,
        in_scc: &'a [bool],
        on_path: &'a mut [bool],
        config: &CycleConfig,
    ) -> Self {
        Self {
            graph,
            in_scc,
            min_length: config.min_length,
            max_length: config.max_length,
            cap: config.max_cycles_per_scc,
            root: 0,
            path: Vec::with_capacity(config.max_length),
            on_path,
            found: Vec::new(),
            truncated: false,
        }
    }

    /// Extend the current path from `v`. Only nodes above the root are
    /// visited, so every cycle is found once, from its smallest node.
    fn extend(&mut self, v: usize) {
        let graph = self.graph;
        for &e in &graph.out_edges[v] {
            if self.truncated {
                return;
            }
            let w = graph.edges[e].target;

            if w == self.root {
                if self.path.len() >= self.min_length {
                    if self.found.len() >= self.cap {
                        self.truncated = true;
                        return;
                    }
                    self.found.push(self.path.clone());
                }
                continue;
            }

            if w < self.root || !self.in_scc[w] || self.on_path[w] {
                continue;
            }
            if self.path.len() >= self.max_length {
                continue;
            }

            self.path.push(w);
            self.on_path[w] = true;
            self.extend(w);
            self.on_path[w] = false;
            self.path.pop();
        }
    }
}

/// Bounded search for a simple cycle of allowed length through `start`.
fn lies_on_short_cycle(
    graph: &TransactionGraph,
    in_scc: &[bool],
    start: usize,
    config: &CycleConfig,
) -> bool {
    fn walk(
        graph: &TransactionGraph,
        in_scc: &[bool],
        start: usize,
        v: usize,
        path: &mut Vec<usize>,
        config: &CycleConfig,
        budget: &mut usize,
    ) -> bool {
        for &e in &graph.out_edges[v] {
            if *budget == 0 {
                return false;
            }
            *budget -= 1;

            let w = graph.edges[e].target;
            if w == start {
                if path.len() >= config.min_length {
                    return true;
                }
                continue;
            }
            if !in_scc[w] || path.len() >= config.max_length || path.contains(&w) {
                continue;
            }
            path.push(w);
            if walk(graph, in_scc, start, w, path, config, budget) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut path = vec![start];
    let mut budget = config.fallback_step_budget;
    walk(graph, in_scc, start, start, &mut path, config, &mut budget)
}

/// Union-find merge of cycles that share a node.
fn merge_cycles(node_count: usize, cycles: &[Vec<usize>]) -> Vec<Vec<usize>> {
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut parent: Vec<usize> = (0..node_count).collect();
    for cycle in cycles {
        let head = cycle[0];
        for &v in &cycle[1..] {
            let a = find(&mut parent, head);
            let b = find(&mut parent, v);
            if a != b {
                parent[b] = a;
            }
        }
    }

    let mut group_of_root: std::collections::HashMap<usize, usize> = Default::default();
    let mut placed = vec![false; node_count];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for cycle in cycles {
        for &v in cycle {
            if placed[v] {
                continue;
            }
            placed[v] = true;
            let root = find(&mut parent, v);
            let g = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(v);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_graph;
    use crate::types::Transaction;

    fn graph_of(edges: &[(&str, &str)]) -> TransactionGraph {
        let txs: Vec<Transaction> = edges
            .iter()
            .enumerate()
            .map(|(i, (a, b))| Transaction::new(format!("T{i}"), *a, *b, 100.0, i as i64))
            .collect();
        build_graph(&txs).unwrap().0
    }

    fn ids(graph: &TransactionGraph, nodes: &[usize]) -> Vec<String> {
        nodes.iter().map(|&n| graph.account_id(n).to_string()).collect()
    }

    #[test]
    fn test_scc_iterative() {
        let graph = graph_of(&[("A", "B"), ("B", "C"), ("C", "A"), ("C", "D")]);
        let sccs = strongly_connected_components(&graph);
        assert_eq!(sccs, vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_scc_deep_chain_no_overflow() {
        let names: Vec<String> = (0..200_000).map(|i| format!("N{i}")).collect();
        let mut txs: Vec<Transaction> = names
            .windows(2)
            .enumerate()
            .map(|(i, w)| Transaction::new(format!("T{i}"), &w[0], &w[1], 1.0, 0))
            .collect();
        txs.push(Transaction::new("back", "N199999", "N0", 1.0, 0));
        let (graph, _) = build_graph(&txs).unwrap();

        let sccs = strongly_connected_components(&graph);
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].len(), 200_000);
    }

    #[test]
    fn test_lone_triangle() {
        let graph = graph_of(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let result = CycleDetector::compute(&graph, &CycleConfig::default());

        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.rings.len(), 1);
        assert_eq!(ids(&graph, &result.rings[0]), vec!["A", "B", "C"]);
        assert_eq!(result.cycle_nodes.len(), 3);
        assert!(result.notes.is_empty());
    }

    #[test]
    fn test_two_cycle_ignored() {
        let graph = graph_of(&[("A", "B"), ("B", "A")]);
        let result = CycleDetector::compute(&graph, &CycleConfig::default());
        assert!(result.cycles.is_empty());
        assert!(result.rings.is_empty());
    }

    #[test]
    fn test_length_bounds() {
        // Five-hop loop is found, six-hop loop is not.
        let five = graph_of(&[("A", "B"), ("B", "C"), ("C", "D"), ("D", "E"), ("E", "A")]);
        assert_eq!(CycleDetector::compute(&five, &CycleConfig::default()).cycles.len(), 1);

        let six = graph_of(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "D"),
            ("D", "E"),
            ("E", "F"),
            ("F", "A"),
        ]);
        let result = CycleDetector::compute(&six, &CycleConfig::default());
        assert!(result.cycles.is_empty());
        assert!(result.cycle_nodes.is_empty());
    }

    #[test]
    fn test_each_cycle_once() {
        // Complete digraph on 4 nodes: 8 three-cycles and 6 four-cycles.
        let mut edges = Vec::new();
        let names = ["A", "B", "C", "D"];
        for a in names {
            for b in names {
                if a != b {
                    edges.push((a, b));
                }
            }
        }
        let graph = graph_of(&edges);
        let result = CycleDetector::compute(&graph, &CycleConfig::default());
        assert_eq!(result.cycles.len(), 14);
        assert_eq!(result.rings.len(), 1);
    }

    #[test]
    fn test_shared_node_merges_rings() {
        let graph = graph_of(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "A"),
            ("C", "D"),
            ("D", "E"),
            ("E", "C"),
            ("X", "Y"),
            ("Y", "Z"),
            ("Z", "X"),
        ]);
        let result = CycleDetector::compute(&graph, &CycleConfig::default());
        assert_eq!(result.rings.len(), 2);
        assert_eq!(ids(&graph, &result.rings[0]), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(ids(&graph, &result.rings[1]), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_cycle_cap_emits_note() {
        let mut edges = Vec::new();
        let names = ["A", "B", "C", "D"];
        for a in names {
            for b in names {
                if a != b {
                    edges.push((a, b));
                }
            }
        }
        let graph = graph_of(&edges);
        let config = CycleConfig {
            max_cycles_per_scc: 3,
            ..Default::default()
        };
        let result = CycleDetector::compute(&graph, &config);
        assert_eq!(result.cycles.len(), 3);
        assert_eq!(result.notes.len(), 1);
    }

    #[test]
    fn test_components_after_truncated_search() {
        // A capped K4 leaves no stale path state for the triangles after it.
        let mut edges = Vec::new();
        let names = ["A", "B", "C", "D"];
        for a in names {
            for b in names {
                if a != b {
                    edges.push((a, b));
                }
            }
        }
        edges.extend([
            ("P", "Q"),
            ("Q", "R"),
            ("R", "P"),
            ("S", "T"),
            ("T", "U"),
            ("U", "S"),
            ("X", "Y"),
            ("Y", "Z"),
            ("Z", "X"),
        ]);
        let graph = graph_of(&edges);
        let config = CycleConfig {
            max_cycles_per_scc: 3,
            ..Default::default()
        };
        let result = CycleDetector::compute(&graph, &config);

        assert_eq!(result.components_searched, 4);
        assert_eq!(result.cycles.len(), 6);
        assert_eq!(result.rings.len(), 4);
        assert_eq!(result.notes.len(), 1);
        for name in ["P", "Q", "R", "S", "T", "U", "X", "Y", "Z"] {
            let node = graph.index[name];
            assert!(result.cycle_nodes.contains(&node), "{name} missed");
        }
    }

    #[test]
    fn test_oversized_scc_flags_without_rings() {
        // Square with a chord: every node lies on a 3- or 4-cycle.
        let graph = graph_of(&[("A", "B"), ("B", "C"), ("C", "D"), ("D", "A"), ("C", "A")]);
        let config = CycleConfig {
            max_scc_size: 3,
            ..Default::default()
        };
        let result = CycleDetector::compute(&graph, &config);

        assert!(result.cycles.is_empty());
        assert!(result.rings.is_empty());
        assert_eq!(result.cycle_nodes.len(), 4);
        assert_eq!(result.notes.len(), 1);
        assert!(result.notes[0].message.contains("4 accounts"));
    }

    #[test]
    fn test_metadata() {
        let detector = CycleDetector::new();
        assert_eq!(detector.id(), "graph/cycles");
        assert!(detector.metadata().forms_rings);
    }
}
