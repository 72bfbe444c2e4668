//! Influence analysis.
//!
//! Weighted PageRank over the aggregated transaction graph. Accounts whose
//! score stands far above the rest are surfaced as candidate orchestrators
//! (`source`). The signal is advisory and never forms a ring.

use crate::types::TransactionGraph;
use flowtrace_core::config::{EdgeWeighting, InfluenceConfig};
use flowtrace_core::detector::{DetectorFamily, DetectorMetadata};
use flowtrace_core::notes::{ProcessingNote, Subsystem};
use flowtrace_core::traits::Detector;
use serde::{Deserialize, Serialize};

/// Edge weight under a weighting scheme.
#[must_use]
pub fn edge_weight(graph: &TransactionGraph, edge: usize, weighting: EdgeWeighting) -> f64 {
    let e = &graph.edges[edge];
    match weighting {
        EdgeWeighting::Volume => e.total_amount,
        EdgeWeighting::Count => f64::from(e.tx_count),
    }
}

// ============================================================================
// Influence Result
// ============================================================================

/// PageRank scores and derived source candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfluenceResult {
    /// Score per node; sums to 1 for a non-empty graph.
    pub scores: Vec<f64>,
    /// Power iterations run.
    pub iterations: usize,
    /// Whether the L1 change fell below tolerance.
    pub converged: bool,
    /// Score an account needed to become a source.
    pub cutoff: f64,
    /// Source candidates, highest score first.
    pub sources: Vec<usize>,
    /// Non-convergence note, if any.
    pub notes: Vec<ProcessingNote>,
}

// ============================================================================
// PageRank Kernel
// ============================================================================

/// Weighted PageRank influence analyzer.
#[derive(Debug, Clone)]
pub struct InfluenceAnalyzer {
    metadata: DetectorMetadata,
}

impl Default for InfluenceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl InfluenceAnalyzer {
    /// Create a new influence analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: DetectorMetadata::new("graph/pagerank", DetectorFamily::Network)
                .with_description("Weighted PageRank with dangling-mass redistribution"),
        }
    }

    /// Run PageRank and pick sources.
    pub fn compute(graph: &TransactionGraph, config: &InfluenceConfig) -> InfluenceResult {
        let n = graph.node_count();
        if n == 0 {
            return InfluenceResult {
                converged: true,
                ..Default::default()
            };
        }

        let (scores, iterations, converged) = Self::pagerank(graph, config);

        let mut notes = Vec::new();
        if !converged {
            notes.push(
                ProcessingNote::not_converged(
                    Subsystem::Influence,
                    format!(
                        "PageRank did not reach tolerance {:e} within {} iterations",
                        config.tolerance, config.max_iterations
                    ),
                )
                .logged(),
            );
        }

        let cutoff = percentile(&scores, config.source_percentile);
        let floor = config.min_lift / n as f64;

        let mut sources: Vec<usize> = if n >= config.min_graph_size {
            (0..n)
                .filter(|&i| scores[i] >= cutoff && scores[i] >= floor)
                .collect()
        } else {
            Vec::new()
        };
        sources.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

        tracing::debug!(
            iterations,
            converged,
            cutoff,
            sources = sources.len(),
            "pagerank complete"
        );

        InfluenceResult {
            scores,
            iterations,
            converged,
            cutoff,
            sources,
            notes,
        }
    }

    /// Power iteration. Returns scores, iterations run and convergence.
    pub fn pagerank(graph: &TransactionGraph, config: &InfluenceConfig) -> (Vec<f64>, usize, bool) {
        let n = graph.node_count();
        let d = config.damping;
        let uniform = 1.0 / n as f64;

        let out_weight: Vec<f64> = (0..n)
            .map(|v| {
                graph.out_edges[v]
                    .iter()
                    .map(|&e| edge_weight(graph, e, config.weighting))
                    .sum()
            })
            .collect();

        let mut scores = vec![uniform; n];
        let mut prev_scores = vec![0.0; n];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < config.max_iterations {
            std::mem::swap(&mut scores, &mut prev_scores);

            let dangling: f64 = (0..n)
                .filter(|&v| out_weight[v] <= 0.0)
                .map(|v| prev_scores[v])
                .sum();
            let base = (1.0 - d) * uniform + d * dangling * uniform;

            for s in scores.iter_mut() {
                *s = base;
            }
            for (v, &w_out) in out_weight.iter().enumerate() {
                if w_out <= 0.0 {
                    continue;
                }
                let share = d * prev_scores[v] / w_out;
                for &e in &graph.out_edges[v] {
                    scores[graph.edges[e].target] += share * edge_weight(graph, e, config.weighting);
                }
            }

            iterations += 1;
            let delta: f64 = scores
                .iter()
                .zip(&prev_scores)
                .map(|(a, b)| (a - b).abs())
                .sum();
            if delta < config.tolerance {
                converged = true;
                break;
            }
        }

        (scores, iterations, converged)
    }
}

impl Detector for InfluenceAnalyzer {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

/// Nearest-rank percentile, `p` in `[0, 1]`.
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
