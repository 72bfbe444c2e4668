//! Shell account and layering chain detection.
//!
//! A shell account touches very few transactions and passes almost all of
//! what it receives straight on. Chains of such relays between an origin
//! and a destination are the layering stage of laundering.

use crate::types::ShellResult;
use flowtrace_core::config::ShellConfig;
use flowtrace_core::detector::{DetectorFamily, DetectorMetadata};
use flowtrace_core::traits::Detector;
use flowtrace_graph::temporal::{FlowDirection, TemporalIndex};
use flowtrace_graph::types::TransactionGraph;
use std::collections::{HashMap, HashSet};

// ============================================================================
// Shell Chain Detector
// ============================================================================

/// Shell account and chain detector.
#[derive(Debug, Clone)]
pub struct ShellChainDetector {
    metadata: DetectorMetadata,
}

impl Default for ShellChainDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellChainDetector {
    /// Create a new shell chain detector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: DetectorMetadata::new("compliance/shell-chains", DetectorFamily::Structural)
                .with_description("Low-activity pass-through accounts and the chains they form")
                .with_rings(),
        }
    }

    /// Whether `node` behaves like a shell account.
    pub fn is_shell(
        graph: &TransactionGraph,
        index: &TemporalIndex,
        node: usize,
        config: &ShellConfig,
    ) -> bool {
        let account = &graph.nodes[node];
        if account.tx_count < config.min_tx_count || account.tx_count > config.max_tx_count {
            return false;
        }
        if account.inbound_volume <= 0.0 || account.inbound_volume <= config.min_inbound_volume {
            return false;
        }

        let ratio = account.outbound_volume / account.inbound_volume;
        if ratio < config.min_pass_through || ratio > config.max_pass_through {
            return false;
        }

        // Money must arrive before it leaves.
        let first_in = index.events(node, FlowDirection::Inbound).first();
        let last_out = index.events(node, FlowDirection::Outbound).last();
        match (first_in, last_out) {
            (Some(i), Some(o)) => i.timestamp <= o.timestamp,
            _ => false,
        }
    }

    /// Detect shell accounts and chains.
    pub fn compute(graph: &TransactionGraph, index: &TemporalIndex, config: &ShellConfig) -> ShellResult {
        let n = graph.node_count();
        let is_shell: Vec<bool> = (0..n)
            .map(|v| Self::is_shell(graph, index, v, config))
            .collect();
        let shell_nodes: Vec<usize> = (0..n).filter(|&v| is_shell[v]).collect();

        let mut chains = Vec::new();
        if !shell_nodes.is_empty() {
            let mut walker = ChainWalker {
                graph,
                is_shell: &is_shell,
                min_hops: config.min_chain_hops,
                max_depth: config.max_depth,
                path: Vec::new(),
                on_path: vec![false; n],
                chains: &mut chains,
            };

            // Chains start at their origin: an ordinary account paying a shell.
            for start in 0..n {
                if is_shell[start] || !graph.successors(start).any(|s| is_shell[s]) {
                    continue;
                }
                walker.path.push(start);
                walker.on_path[start] = true;
                walker.walk(start);
                walker.on_path[start] = false;
                walker.path.pop();
            }
        }

        let rings = merge_chains(&chains);

        tracing::debug!(
            shells = shell_nodes.len(),
            chains = chains.len(),
            rings = rings.len(),
            "shell chain detection complete"
        );

        ShellResult {
            shell_nodes,
            chains,
            rings,
        }
    }
}

impl Detector for ShellChainDetector {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

struct ChainWalker<'a> {
    graph: &'a TransactionGraph,
    is_shell: &'a [bool],
    min_hops: usize,
    max_depth: usize,
    path: Vec<usize>,
    on_path: Vec<bool>,
    chains: &'a mut Vec<Vec<usize>>,
}

impl ChainWalker<'_> {
    /// Extend the path from its last node. Only shells are ever pushed past
    /// the start, so every intermediate is a shell.
    fn walk(&mut self, v: usize) {
        let graph = self.graph;
        for w in graph.successors(v) {
            if self.on_path[w] {
                continue;
            }

            // Path holds source + intermediates; taking w adds one hop.
            let hops = self.path.len();
            let can_continue = self.is_shell[w] && hops < self.max_depth;
            if can_continue {
                self.path.push(w);
                self.on_path[w] = true;
                self.walk(w);
                self.on_path[w] = false;
                self.path.pop();
            } else if hops >= self.min_hops && self.path.len() > 1 {
                let mut chain = self.path.clone();
                chain.push(w);
                self.chains.push(chain);
            }
        }
    }
}

/// Merge chains that share an intermediate node.
fn merge_chains(chains: &[Vec<usize>]) -> Vec<Vec<usize>> {
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut parent: Vec<usize> = (0..chains.len()).collect();
    let mut owner: HashMap<usize, usize> = HashMap::new();
    for (c, chain) in chains.iter().enumerate() {
        for &v in &chain[1..chain.len() - 1] {
            match owner.get(&v) {
                Some(&other) => {
                    let a = find(&mut parent, other);
                    let b = find(&mut parent, c);
                    if a != b {
                        parent[b.max(a)] = a.min(b);
                    }
                }
                None => {
                    owner.insert(v, c);
                }
            }
        }
    }

    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut placed: HashSet<(usize, usize)> = HashSet::new();
    for (c, chain) in chains.iter().enumerate() {
        let root = find(&mut parent, c);
        let g = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        for &v in chain {
            if placed.insert((g, v)) {
                groups[g].push(v);
            }
        }
    }
    groups
}
