//! Visualization graph export.
//!
//! A node/edge list for rendering. Large graphs are cut down to the
//! highest-risk accounts so a browser can still draw them.

use flowtrace_compliance::types::ScoringResult;
use flowtrace_core::config::VisualizationConfig;
use flowtrace_core::notes::{ProcessingNote, Subsystem};
use flowtrace_core::pattern::{PatternSet, PatternTag};
use flowtrace_graph::centrality::InfluenceResult;
use flowtrace_graph::community::CommunityResult;
use flowtrace_graph::types::TransactionGraph;
use serde::{Deserialize, Serialize};

/// Display class of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Fan-in aggregator or fan-out source.
    Hub,
    /// Pass-through shell account.
    Shell,
    /// Cycle member, fan contributor or fan recipient.
    Mule,
    /// High-influence account.
    Source,
    /// Nothing detected.
    Normal,
}

impl NodeKind {
    /// Class of an account with the given tags. Earlier classes win.
    #[must_use]
    pub fn classify(tags: PatternSet) -> Self {
        if tags.contains(PatternTag::FanInAggregator) || tags.contains(PatternTag::FanOutSource) {
            NodeKind::Hub
        } else if tags.contains(PatternTag::ShellAccount) {
            NodeKind::Shell
        } else if tags.contains(PatternTag::Cycle)
            || tags.contains(PatternTag::FanInContributor)
            || tags.contains(PatternTag::FanOutRecipient)
        {
            NodeKind::Mule
        } else if tags.contains(PatternTag::Source) {
            NodeKind::Source
        } else {
            NodeKind::Normal
        }
    }
}

/// Account in the visualization graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewNode {
    /// Account id.
    pub id: String,
    /// Suspicion score.
    pub risk_score: f64,
    /// Display class.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Community id.
    pub community: usize,
    /// PageRank score.
    pub pagerank: f64,
}

/// Aggregated edge in the visualization graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewEdge {
    /// Sender account id.
    pub source: String,
    /// Receiver account id.
    pub target: String,
    /// Total amount.
    pub amount: f64,
    /// Transaction count.
    pub count: u32,
}

/// Node/edge list for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    /// Accounts in node order.
    pub nodes: Vec<ViewNode>,
    /// Edges between kept accounts, in edge order.
    pub edges: Vec<ViewEdge>,
    /// Size guard note, if the graph was cut down.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<ProcessingNote>,
}

impl GraphView {
    /// Build the view from a finished run.
    pub fn build(
        graph: &TransactionGraph,
        scoring: &ScoringResult,
        influence: &InfluenceResult,
        community: &CommunityResult,
        config: &VisualizationConfig,
    ) -> Self {
        let n = graph.node_count();
        let score = |v: usize| scoring.node_scores.get(v).copied().unwrap_or(0.0);
        let pagerank = |v: usize| influence.scores.get(v).copied().unwrap_or(0.0);

        let mut notes = Vec::new();
        let mut keep = vec![true; n];
        if n > config.max_nodes {
            // Suspicious accounts first, then by influence.
            let mut ranked: Vec<usize> = (0..n).collect();
            ranked.sort_by(|&a, &b| {
                score(b)
                    .total_cmp(&score(a))
                    .then_with(|| pagerank(b).total_cmp(&pagerank(a)))
                    .then(a.cmp(&b))
            });
            keep = vec![false; n];
            for &v in ranked.iter().take(config.max_nodes) {
                keep[v] = true;
            }
            notes.push(
                ProcessingNote::guard_tripped(
                    Subsystem::Visualization,
                    format!(
                        "graph of {n} accounts trimmed to the {} highest-risk accounts",
                        config.max_nodes
                    ),
                )
                .logged(),
            );
        }

        let nodes = (0..n)
            .filter(|&v| keep[v])
            .map(|v| ViewNode {
                id: graph.account_id(v).to_string(),
                risk_score: score(v),
                kind: NodeKind::classify(
                    scoring.node_patterns.get(v).copied().unwrap_or_default(),
                ),
                community: community.assignments.get(v).copied().unwrap_or(v),
                pagerank: pagerank(v),
            })
            .collect();

        let edges = graph
            .edges
            .iter()
            .filter(|e| keep[e.source] && keep[e.target])
            .map(|e| ViewEdge {
                source: graph.account_id(e.source).to_string(),
                target: graph.account_id(e.target).to_string(),
                amount: e.total_amount,
                count: e.tx_count,
            })
            .collect();

        Self { nodes, edges, notes }
    }

    /// Look up a node by account id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&ViewNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
